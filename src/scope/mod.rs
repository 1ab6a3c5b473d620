//! Hierarchical scope resolution
//!
//! A scope is a dot-separated path (`"acme.corp.engineering"`). A policy at
//! scope `X` applies to requests at `X` or any descendant of `X` when no
//! more-specific policy exists. The resolver walks from the full scope
//! toward the root, one segment at a time, and falls back to the global
//! (empty-scope) policies of the resource kind.

mod resolver;

pub use resolver::{resolve, ScopeWalk, GLOBAL_SCOPE};
