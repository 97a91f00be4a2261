//! # Meridian AuthZ
//!
//! Scope resolution and request-signature validation core for the
//! Meridian platform. Principals hold sets of scope strings; roles grant
//! further scopes when assumed; authorization reduces to whether a
//! principal's expanded scope set satisfies a required pattern.
//!
//! ## Components
//!
//! - **Scope algebra** (`scope`): wildcard-aware comparison, satisfaction,
//!   normalization, and linear merge of scope sets.
//! - **Role expansion** (`roles`): fixed-point expansion of the role
//!   table, cycle-tolerant, producing closed roles.
//! - **Resolver** (`resolver`): closed roles compiled into a character
//!   DFA; query scopes resolve in one transition per character. The active
//!   resolver is a single atomically swappable snapshot.
//! - **Signature validation** (`auth`): MAC- and bewit-authenticated
//!   requests, temporary-certificate delegation chains, and the resulting
//!   authorized scope set.
//!
//! ## Example
//!
//! ```rust
//! use meridian_authz::{Role, ScopeResolver};
//!
//! let resolver = ScopeResolver::new();
//! resolver.load_roles(&[
//!     Role::new("ci/*", vec!["queue:create-task".to_string()]),
//! ]);
//!
//! let expanded = resolver
//!     .expand_scopes(&["assume:ci/builds".to_string()])
//!     .unwrap();
//! assert!(expanded.contains(&"queue:create-task".to_string()));
//! ```

pub mod auth;
pub mod error;
pub mod resolver;
pub mod roles;
pub mod scope;
pub mod types;

pub use auth::{AuthRequest, Authentication, SignatureValidator};
pub use error::{AuthzError, Result};
pub use resolver::{BuildReport, CacheStats, CompiledResolver, ScopeResolver};
pub use roles::{ClosedRole, RejectedRole, Role};
pub use types::{Client, ClientLoader, InMemoryClientLoader};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
