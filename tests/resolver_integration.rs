//! Integration tests for role expansion and the compiled resolver
//!
//! Covers literal and patterned queries, wildcard roles, long role chains,
//! snapshot swapping, and equivalence between the compiled automaton and a
//! naive scan over the closed role list.

use meridian_authz::roles::expand_roles;
use meridian_authz::scope::{merge_scope_sets, normalize_scope_set, satisfies_scope};
use meridian_authz::{CompiledResolver, Role, ScopeResolver};

fn set(scopes: &[&str]) -> Vec<String> {
    scopes.iter().map(|s| s.to_string()).collect()
}

fn role(id: &str, scopes: &[&str]) -> Role {
    Role::new(id, set(scopes))
}

fn expand(roles: &[Role], queries: &[&str]) -> Vec<String> {
    let (compiled, report) = CompiledResolver::compile(roles);
    assert!(report.rejected.is_empty());
    compiled.expand_scopes(&set(queries)).unwrap()
}

#[test]
fn prefix_roles_and_a_patterned_query() {
    let roles = [role("a", &["A"]), role("ab", &["AB"]), role("abc", &["ABC"])];
    assert_eq!(
        expand(&roles, &["assume:ab*"]),
        set(&["AB", "ABC", "assume:ab*"])
    );
}

#[test]
fn universal_role_swallows_the_query() {
    let roles = [role("*", &["*"])];
    assert_eq!(expand(&roles, &["assume:client-id:tester"]), set(&["*"]));
    assert_eq!(expand(&roles, &["assume:client-id:*"]), set(&["*"]));
}

#[test]
fn wildcard_roles_matching_a_literal_query() {
    let roles = [
        role("a*", &["ASTAR"]),
        role("ab*", &["ABSTAR"]),
        role("ac*", &["ACSTAR"]),
        role("d", &["D"]),
    ];
    assert_eq!(
        expand(&roles, &["assume:ab"]),
        set(&["ABSTAR", "ASTAR", "assume:ab"])
    );
}

#[test]
fn five_hundred_role_chain() {
    let mut roles: Vec<Role> = (0..500)
        .map(|i| role(&format!("ch-{i}"), &[&format!("assume:ch-{}", i + 1)]))
        .collect();
    roles.push(role("ch-500", &["special-scope"]));

    let expanded = expand(&roles, &["assume:ch-0"]);
    assert_eq!(expanded.len(), 502);
    assert!(expanded.contains(&"special-scope".to_string()));
    for i in 0..=500 {
        assert!(expanded.contains(&format!("assume:ch-{i}")), "missing ch-{i}");
    }
}

#[test]
fn queries_not_under_assume_pass_through_untouched() {
    let roles = [role("thing", &["granted"])];
    assert_eq!(
        expand(&roles, &["queue:random", "index:*"]),
        set(&["index:*", "queue:random"])
    );
}

#[test]
fn indirect_roles_via_assume_scopes() {
    let roles = [
        role("client-id:builder", &["assume:project-admin"]),
        role("project-admin", &["project:*", "assume:secrets-reader"]),
        role("secrets-reader", &["secrets:get"]),
    ];
    let expanded = expand(&roles, &["assume:client-id:builder"]);
    assert!(expanded.contains(&"project:*".to_string()));
    assert!(expanded.contains(&"secrets:get".to_string()));
    assert!(expanded.contains(&"assume:project-admin".to_string()));
}

#[test]
fn resolution_is_order_independent() {
    let forward = [role("a", &["one"]), role("b*", &["two"]), role("bc", &["three"])];
    let mut backward = forward.to_vec();
    backward.reverse();

    for query in ["assume:a", "assume:bc", "assume:b*", "assume:*", "other"] {
        assert_eq!(
            expand(&forward, &[query]),
            expand(&backward, &[query]),
            "query {query}"
        );
    }
}

#[test]
fn rebuilds_swap_atomically_under_readers() {
    use std::sync::Arc;
    use std::thread;

    let resolver = Arc::new(ScopeResolver::new());
    resolver.load_roles(&[role("stable", &["v1"])]);

    let reader = {
        let resolver = Arc::clone(&resolver);
        thread::spawn(move || {
            for _ in 0..200 {
                let expanded = resolver.expand_scopes(&set(&["assume:stable"])).unwrap();
                // Every observation is one snapshot or the other, never a mix.
                assert!(
                    expanded == set(&["assume:stable", "v1"])
                        || expanded == set(&["assume:stable", "v2"])
                );
            }
        })
    };

    for _ in 0..20 {
        resolver.load_roles(&[role("stable", &["v2"])]);
        resolver.load_roles(&[role("stable", &["v1"])]);
    }
    reader.join().unwrap();
}

// -- equivalence against a naive scan ------------------------------------

/// Non-empty intersection of two scope patterns: either side's wildcard
/// may open the match.
fn intersects(a: &str, b: &str) -> bool {
    satisfies_scope(a, b) || satisfies_scope(b, a)
}

fn naive_expand(roles: &[Role], queries: &[String]) -> Vec<String> {
    let (closed, _) = expand_roles(roles);
    let mut result = normalize_scope_set(queries);
    for cr in &closed {
        if queries.iter().any(|q| intersects(&cr.activation, q)) {
            result = merge_scope_sets(&result, &normalize_scope_set(&cr.scopes));
        }
    }
    result
}

fn assert_equivalent(roles: &[Role], queries: &[&str]) {
    let (compiled, _) = CompiledResolver::compile(roles);
    for query in queries {
        let q = vec![query.to_string()];
        assert_eq!(
            compiled.expand_scopes(&q).unwrap(),
            naive_expand(roles, &q),
            "query {query}"
        );
    }
}

#[test]
fn dfa_matches_naive_scan_on_dense_prefix_tables() {
    // Every roleId over {a, b} up to length 2, plus starred variants.
    let mut roles = Vec::new();
    let mut i = 0;
    for id in ["a", "b", "aa", "ab", "ba", "bb"] {
        roles.push(role(id, &[&format!("lit-{i}")]));
        roles.push(role(&format!("{id}*"), &[&format!("pat-{i}")]));
        i += 1;
    }
    roles.push(role("*", &["universal"]));

    let mut queries = vec![
        "*", "a*", "as*", "assum*", "assume*", "assume:*", "other-scope",
    ];
    let tails = [
        "a", "b", "aa", "ab", "ba", "bb", "aaa", "abb", "c", "abc",
    ];
    let mut owned = Vec::new();
    for tail in tails {
        owned.push(format!("assume:{tail}"));
        owned.push(format!("assume:{tail}*"));
    }
    queries.extend(owned.iter().map(String::as_str));

    assert_equivalent(&roles, &queries);
}

#[test]
fn dfa_matches_naive_scan_on_a_generated_table() {
    // Deterministic generator; no seeds, no flakiness.
    let mut next = 0x2545_f491u64;
    let mut rng = move |bound: usize| {
        next ^= next << 13;
        next ^= next >> 7;
        next ^= next << 17;
        (next % bound as u64) as usize
    };

    let alphabet = [b'a', b'b', b'c', b'/'];
    let mut roles = Vec::new();
    for i in 0..60 {
        let len = 1 + rng(5);
        let mut id: String = (0..len)
            .map(|_| alphabet[rng(alphabet.len())] as char)
            .collect();
        if rng(3) == 0 {
            id.push('*');
        }
        let scopes = match rng(4) {
            0 => vec![format!("grant:{i}"), format!("assume:{}", "a")],
            1 => vec![format!("grant:{i}"), "assume:b*".to_string()],
            _ => vec![format!("grant:{i}")],
        };
        roles.push(Role::new(id, scopes));
    }
    // Duplicates are rejected at load time by both sides identically, so
    // generation does not bother deduplicating.

    let mut queries: Vec<String> = Vec::new();
    for _ in 0..200 {
        let len = 1 + rng(6);
        let mut q: String = (0..len)
            .map(|_| alphabet[rng(alphabet.len())] as char)
            .collect();
        if rng(2) == 0 {
            q.push('*');
        }
        queries.push(format!("assume:{q}"));
    }
    queries.push("assume:*".to_string());
    queries.push("*".to_string());

    let refs: Vec<&str> = queries.iter().map(String::as_str).collect();
    assert_equivalent(&roles, &refs);
}

#[test]
fn expansion_results_are_in_normal_form() {
    let roles = [
        role("wide", &["queue:*"]),
        role("narrow", &["queue:create-task", "queue:route:x"]),
    ];
    let expanded = expand(&roles, &["assume:wide", "assume:narrow"]);
    assert_eq!(expanded, normalize_scope_set(&expanded));
    // queue:* swallows the narrow role's scopes
    assert!(expanded.contains(&"queue:*".to_string()));
    assert!(!expanded.contains(&"queue:create-task".to_string()));
}
