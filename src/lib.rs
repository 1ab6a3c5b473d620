//! # verdict
//!
//! A policy-based authorization decision engine (PDP): given a principal, a
//! resource, and a set of actions, it answers "may P perform A on R?" by
//! evaluating declarative policies with derived roles, hierarchical scope
//! inheritance, and CEL conditions.
//!
//! ## Pipeline
//!
//! ```text
//! CheckRequest → decision cache → derived roles → scope walk
//!              → candidate policies → rule evaluation → CheckResponse
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use verdict::engine::{DecisionEngine, EngineConfig};
//! use verdict::policy::{PolicyStore, ResourcePolicy, Rule};
//! use verdict::types::{CheckRequest, Effect, Principal, Resource};
//!
//! # fn main() -> verdict::error::Result<()> {
//! let store = Arc::new(PolicyStore::new());
//! store.add(
//!     ResourcePolicy::new("doc-access", "document")
//!         .with_rule(
//!             Rule::new("readers", vec!["read".to_string()], Effect::Allow)
//!                 .with_roles(vec!["viewer".to_string()]),
//!         )
//!         .into(),
//! )?;
//!
//! let engine = DecisionEngine::new(EngineConfig::default(), store);
//!
//! let request = CheckRequest::new(
//!     Principal::new("alice").with_role("viewer"),
//!     Resource::new("document", "d1"),
//!     vec!["read".to_string()],
//! );
//!
//! let response = engine.check(&request)?;
//! assert!(response.is_allowed("read"));
//! # Ok(())
//! # }
//! ```

pub mod cel;
pub mod derived_roles;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod policy;
pub mod scope;
pub mod types;

// Re-export commonly used types
pub use cel::{CelEvaluator, ConditionEvaluator, EvalContext};
pub use derived_roles::DerivedRole;
pub use engine::{DecisionEngine, EngineConfig};
pub use error::{EngineError, Result};
pub use policy::{
    DerivedRolesPolicy, Policy, PolicyStore, PrincipalPolicy, PrincipalSelector, ResourcePolicy,
    ResourceSelector, Rule,
};
pub use types::{
    CancelToken, CheckRequest, CheckResponse, Decision, Effect, Principal, Resource,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
