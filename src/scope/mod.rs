//! Scope algebra: comparison, satisfaction, normalization, and merge
//!
//! The shared primitive of the whole crate. Scope sets in normal form are
//! sorted by [`scope_compare`] and carry no member covered by another; the
//! merge of two normal-form sets is again in normal form.

mod algebra;

pub use algebra::{
    is_valid_scope, merge_scope_sets, normalize_scope_set, satisfies, satisfies_scope,
    scope_compare, validate_scope, ScopeError, ScopeResult,
};
