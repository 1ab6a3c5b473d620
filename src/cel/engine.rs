//! CEL-backed condition evaluator with compiled-program caching

use cel_interpreter::objects::Value as CelValue;
use cel_interpreter::{Context, Program};
use dashmap::DashMap;
use std::sync::Arc;

use crate::cel::{
    context::EvalContext,
    convert::json_to_cel,
    error::{CelError, Result},
    ConditionEvaluator,
};

/// Condition evaluator backed by the CEL interpreter
///
/// Expressions are compiled once and the compiled program is cached keyed
/// by source text, so repeated evaluations of the same rule only pay the
/// interpretation cost.
pub struct CelEvaluator {
    /// Compiled program cache (thread-safe)
    program_cache: Arc<DashMap<String, Arc<Program>>>,
}

impl CelEvaluator {
    /// Create a new evaluator with an empty program cache
    pub fn new() -> Self {
        Self {
            program_cache: Arc::new(DashMap::new()),
        }
    }

    /// Compile an expression, returning the cached program when available
    pub fn compile(&self, expr: &str) -> Result<Arc<Program>> {
        if let Some(program) = self.program_cache.get(expr) {
            return Ok(program.clone());
        }

        let program = Program::compile(expr)
            .map_err(|e| CelError::Compilation(format!("{:?}", e)))?;

        let program = Arc::new(program);
        self.program_cache
            .insert(expr.to_string(), program.clone());

        Ok(program)
    }

    /// Evaluate a compiled program against the given context
    pub fn evaluate(&self, program: &Program, ctx: &EvalContext) -> Result<bool> {
        let mut cel_context = Context::default();

        for (key, value) in ctx.to_variables() {
            let _ = cel_context.add_variable(key, json_to_cel(&value));
        }

        let result = program
            .execute(&cel_context)
            .map_err(|e| CelError::Evaluation(format!("{:?}", e)))?;

        match result {
            CelValue::Bool(b) => Ok(b),
            _ => Err(CelError::NonBooleanResult),
        }
    }

    /// Drop every cached program
    pub fn clear_cache(&self) {
        self.program_cache.clear();
    }

    /// Number of cached programs
    pub fn cached_programs(&self) -> usize {
        self.program_cache.len()
    }
}

impl ConditionEvaluator for CelEvaluator {
    fn evaluate_bool(&self, expr: &str, ctx: &EvalContext) -> Result<bool> {
        let program = self.compile(expr)?;
        self.evaluate(&program, ctx)
    }
}

impl Default for CelEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

// Thread safety: the evaluator only holds the DashMap-backed program cache
unsafe impl Send for CelEvaluator {}
unsafe impl Sync for CelEvaluator {}
