//! Derived roles: definitions, dependency graph, resolver, and cache
//!
//! A derived role is computed at request time from the principal's base
//! roles plus an optional condition. Parent patterns use AND semantics
//! (every pattern must match at least one held role) and support the
//! wildcard forms of [`crate::pattern`]. Dependencies between derived
//! roles (literal parents naming other derived roles) must be acyclic;
//! cycles abort the request.

pub mod cache;
pub mod graph;
pub mod resolver;
pub mod types;

pub use cache::{fingerprint, RoleCache};
pub use graph::RoleGraph;
pub use resolver::DerivedRoleResolver;
pub use types::DerivedRole;
