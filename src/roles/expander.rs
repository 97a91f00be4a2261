//! Fixed-point expansion of role scope sets
//!
//! Each role's closed scope set is the least fixed point of
//! `F(R) = R.scopes ∪ ⋃ { R'.scopes : some s ∈ R.scopes covers R''s activation }`.
//! The expansion condenses the activation graph and folds successor
//! components into each component's union, so cyclic role tables terminate
//! without special casing.

use tracing::{debug, warn};

use super::graph::ActivationGraph;
use super::types::{ClosedRole, Role};
use crate::scope::{merge_scope_sets, normalize_scope_set};

/// A role excluded from expansion at table-load time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRole {
    /// The offending role's id (possibly malformed itself)
    pub role_id: String,

    /// Human-readable reason for the rejection
    pub reason: String,
}

/// Expands a role table into closed roles.
///
/// Malformed roles (empty or newline-bearing scopes, `*` anywhere but the
/// final character) and duplicate `roleId`s are excluded and reported back;
/// they never poison the rest of the table.
pub fn expand_roles(roles: &[Role]) -> (Vec<ClosedRole>, Vec<RejectedRole>) {
    let mut valid: Vec<Role> = Vec::with_capacity(roles.len());
    let mut rejected: Vec<RejectedRole> = Vec::new();

    for role in roles {
        if let Err(err) = role.validate() {
            warn!(role_id = %role.role_id, error = %err, "rejecting malformed role");
            rejected.push(RejectedRole {
                role_id: role.role_id.clone(),
                reason: err.to_string(),
            });
            continue;
        }
        if valid.iter().any(|r| r.role_id == role.role_id) {
            warn!(role_id = %role.role_id, "rejecting duplicate role");
            rejected.push(RejectedRole {
                role_id: role.role_id.clone(),
                reason: "duplicate roleId".to_string(),
            });
            continue;
        }
        valid.push(role.clone());
    }

    let condensation = ActivationGraph::build(&valid).condensation();

    // Components arrive successors-first, so each component's closure is
    // its members' scopes merged with already-final successor closures.
    let mut component_scopes: Vec<Vec<String>> = Vec::with_capacity(condensation.components.len());
    for (ci, component) in condensation.components.iter().enumerate() {
        let mut scopes: Vec<String> = Vec::new();
        for &member in component {
            scopes = merge_scope_sets(&scopes, &normalize_scope_set(&valid[member].scopes));
        }
        for &successor in &condensation.successors[ci] {
            scopes = merge_scope_sets(&scopes, &component_scopes[successor]);
        }
        component_scopes.push(scopes);
    }

    let closed: Vec<ClosedRole> = valid
        .iter()
        .enumerate()
        .map(|(i, role)| ClosedRole {
            role_id: role.role_id.clone(),
            activation: role.activation(),
            scopes: component_scopes[condensation.component_of[i]].clone(),
        })
        .collect();

    debug!(
        roles = closed.len(),
        rejected = rejected.len(),
        components = condensation.components.len(),
        "expanded role table"
    );

    (closed, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{satisfies, satisfies_scope};

    fn role(id: &str, scopes: &[&str]) -> Role {
        Role::new(id, scopes.iter().map(|s| s.to_string()).collect())
    }

    fn closed_for<'a>(closed: &'a [ClosedRole], id: &str) -> &'a ClosedRole {
        closed.iter().find(|r| r.role_id == id).unwrap()
    }

    #[test]
    fn test_leaf_role_keeps_own_scopes() {
        let (closed, rejected) = expand_roles(&[role("leaf", &["queue:a", "queue:b"])]);
        assert!(rejected.is_empty());
        assert_eq!(
            closed_for(&closed, "leaf").scopes,
            vec!["queue:a".to_string(), "queue:b".to_string()]
        );
    }

    #[test]
    fn test_chain_expansion() {
        let (closed, _) = expand_roles(&[
            role("top", &["assume:mid"]),
            role("mid", &["assume:leaf"]),
            role("leaf", &["special-scope"]),
        ]);
        let top = closed_for(&closed, "top");
        assert!(top.scopes.contains(&"assume:mid".to_string()));
        assert!(top.scopes.contains(&"assume:leaf".to_string()));
        assert!(top.scopes.contains(&"special-scope".to_string()));
    }

    #[test]
    fn test_cyclic_roles_share_a_closure() {
        let (closed, _) = expand_roles(&[
            role("ping", &["assume:pong", "p1"]),
            role("pong", &["assume:ping", "p2"]),
        ]);
        let ping = closed_for(&closed, "ping");
        let pong = closed_for(&closed, "pong");
        assert_eq!(ping.scopes, pong.scopes);
        assert!(ping.scopes.contains(&"p1".to_string()));
        assert!(ping.scopes.contains(&"p2".to_string()));
    }

    #[test]
    fn test_pattern_scope_pulls_in_covered_roles() {
        let (closed, _) = expand_roles(&[
            role("spender", &["assume:payments/*"]),
            role("payments/charge", &["charge"]),
            role("payments/refund", &["refund"]),
            role("ledger", &["read"]),
        ]);
        let spender = closed_for(&closed, "spender");
        assert!(spender.scopes.contains(&"charge".to_string()));
        assert!(spender.scopes.contains(&"refund".to_string()));
        assert!(!spender.scopes.contains(&"read".to_string()));
    }

    #[test]
    fn test_closed_sets_are_fixed_points() {
        let roles = vec![
            role("a", &["assume:b", "assume:c*"]),
            role("b", &["assume:a", "b-scope"]),
            role("c1", &["c1-scope"]),
            role("c2", &["assume:b", "c2-scope"]),
        ];
        let (closed, _) = expand_roles(&roles);

        // Re-activating any member of a closed set must add nothing.
        for cr in &closed {
            for scope in &cr.scopes {
                for other in &closed {
                    if satisfies_scope(scope, &other.activation) {
                        assert!(
                            satisfies(&cr.scopes, &other.scopes),
                            "role `{}` is not closed under `{}`",
                            cr.role_id,
                            other.role_id
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_malformed_roles_are_rejected_not_fatal() {
        let (closed, rejected) = expand_roles(&[
            role("good", &["queue:a"]),
            role("bad", &["em*bedded"]),
            role("worse\n", &[]),
        ]);
        assert_eq!(closed.len(), 1);
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].role_id, "bad");
    }

    #[test]
    fn test_duplicate_role_ids_are_rejected() {
        let (closed, rejected) = expand_roles(&[
            role("dup", &["queue:a"]),
            role("dup", &["queue:b"]),
        ]);
        assert_eq!(closed.len(), 1);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].reason, "duplicate roleId");
    }

    #[test]
    fn test_long_chain() {
        let mut roles: Vec<Role> = (0..500)
            .map(|i| role(&format!("ch-{i}"), &[&format!("assume:ch-{}", i + 1)]))
            .collect();
        roles.push(role("ch-500", &["special-scope"]));

        let (closed, rejected) = expand_roles(&roles);
        assert!(rejected.is_empty());

        let head = closed_for(&closed, "ch-0");
        assert!(head.scopes.contains(&"special-scope".to_string()));
        assert!(head.scopes.contains(&"assume:ch-500".to_string()));
        assert_eq!(head.scopes.len(), 501);
    }
}
