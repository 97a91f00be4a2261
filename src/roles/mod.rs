//! Role table and fixed-point expansion
//!
//! A role grants its scopes to any principal holding a scope that covers
//! the role's `assume:<roleId>` activation pattern. Expansion turns each
//! role into a [`ClosedRole`] whose scope set is closed under activation;
//! cycles are handled by condensing the activation graph.

mod expander;
mod graph;
mod types;

pub use expander::{expand_roles, RejectedRole};
pub use types::{ClosedRole, Role};
