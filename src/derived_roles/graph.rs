//! Dependency graph for derived roles with DFS cycle detection
//!
//! A derived role depends on another derived role when one of its parent
//! patterns is a literal naming that role. Wildcard parents never introduce
//! edges. The graph is stored as a flat arena indexed by dense integer ids
//! (a `Vec` of nodes plus a name-to-id map), which keeps the structure free
//! of ownership cycles.
//!
//! Cycle detection is depth-first search with three-color marking: white
//! (unvisited), grey (on the current DFS stack), black (fully explored).
//! Reaching a grey node closes a cycle; the error carries the full path.

use std::collections::HashMap;

use super::types::DerivedRole;
use crate::error::{EngineError, Result};

#[derive(Debug)]
struct Node {
    name: String,
    /// Dense ids of derived roles this node's literal parents name
    deps: Vec<usize>,
}

/// Dependency graph over a set of derived-role definitions
#[derive(Debug)]
pub struct RoleGraph {
    nodes: Vec<Node>,
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Grey,
    Black,
}

impl RoleGraph {
    /// Build the graph for the given definitions
    ///
    /// Only literal parents that name another derived role contribute
    /// edges; base roles and wildcard patterns do not.
    pub fn build(definitions: &[DerivedRole]) -> Self {
        let ids: HashMap<&str, usize> = definitions
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.as_str(), i))
            .collect();

        let nodes = definitions
            .iter()
            .map(|definition| {
                let mut deps: Vec<usize> = definition
                    .parent_roles
                    .iter()
                    .filter_map(|parent| ids.get(parent.as_str()).copied())
                    .collect();
                deps.dedup();
                Node {
                    name: definition.name.clone(),
                    deps,
                }
            })
            .collect();

        Self { nodes }
    }

    /// Verify the graph is acyclic
    ///
    /// Returns [`EngineError::CircularDependency`] naming the cycle path
    /// (e.g. `"a -> b -> a"`) when a cycle exists.
    pub fn check_acyclic(&self) -> Result<()> {
        let mut colors = vec![Color::White; self.nodes.len()];
        let mut path: Vec<usize> = Vec::new();

        for start in 0..self.nodes.len() {
            if colors[start] == Color::White {
                self.visit(start, &mut colors, &mut path)?;
            }
        }
        Ok(())
    }

    fn visit(&self, node: usize, colors: &mut [Color], path: &mut Vec<usize>) -> Result<()> {
        colors[node] = Color::Grey;
        path.push(node);

        for &dep in &self.nodes[node].deps {
            match colors[dep] {
                Color::Grey => {
                    // Cycle: everything on the path from `dep` onward is in it
                    let start = path
                        .iter()
                        .position(|&n| n == dep)
                        .unwrap_or(path.len() - 1);
                    let cycle: Vec<&str> = path[start..]
                        .iter()
                        .map(|&n| self.nodes[n].name.as_str())
                        .chain(std::iter::once(self.nodes[dep].name.as_str()))
                        .collect();
                    return Err(EngineError::CircularDependency {
                        path: cycle.join(" -> "),
                    });
                }
                Color::White => self.visit(dep, colors, path)?,
                Color::Black => {}
            }
        }

        colors[node] = Color::Black;
        path.pop();
        Ok(())
    }
}
