//! Compiled scope resolver with atomic snapshot swap and expansion cache
//!
//! [`CompiledResolver`] is the immutable artifact built from a role-table
//! snapshot: closed roles compiled into a character DFA. [`ScopeResolver`]
//! is the shared front: it holds the active compiled resolver behind a
//! single swappable reference, rebuilds on role-table changes while
//! readers keep their captured snapshot, and caches expansions until the
//! next reload.

mod dfa;
mod sets;

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use dashmap::DashMap;
use tracing::info;

use crate::error::Result;
use crate::roles::{expand_roles, ClosedRole, RejectedRole, Role};
use crate::scope::{merge_scope_sets, normalize_scope_set, validate_scope};
use crate::types::Client;

use dfa::Dfa;

/// Default bound on the expansion cache
const DEFAULT_MAX_CACHE_SIZE: usize = 10_000;

/// Outcome of compiling a role table
#[derive(Debug)]
pub struct BuildReport {
    /// Roles admitted into the build
    pub roles: usize,

    /// Roles excluded at load time, with reasons
    pub rejected: Vec<RejectedRole>,

    /// DFA states allocated
    pub states: usize,

    /// Distinct accept sets in the shared table
    pub sets: usize,
}

/// Immutable resolver compiled from one role-table snapshot.
///
/// Safe to share across any number of concurrent readers; the answer for
/// a query depends only on the snapshot and the query.
#[derive(Debug)]
pub struct CompiledResolver {
    dfa: Dfa,
    closed: Vec<ClosedRole>,
}

impl CompiledResolver {
    /// Compiles a role table. Malformed roles are excluded and reported in
    /// the [`BuildReport`]; they never fail the build.
    pub fn compile(roles: &[Role]) -> (Self, BuildReport) {
        let started = Instant::now();
        let (closed, rejected) = expand_roles(roles);
        let dfa = Dfa::build(&closed);

        let report = BuildReport {
            roles: closed.len(),
            rejected,
            states: dfa.state_count(),
            sets: dfa.set_count(),
        };
        info!(
            roles = report.roles,
            rejected = report.rejected.len(),
            states = report.states,
            sets = report.sets,
            elapsed_us = started.elapsed().as_micros() as u64,
            "compiled scope resolver"
        );

        (Self { dfa, closed }, report)
    }

    /// Expands a set of query scopes: the normalized union of the queries
    /// themselves and the closed scope set of every role whose activation
    /// pattern intersects one of them.
    ///
    /// Queries must be valid scopes; in particular `*` anywhere but the
    /// final character is rejected.
    pub fn expand_scopes(&self, scopes: &[String]) -> Result<Vec<String>> {
        for scope in scopes {
            validate_scope(scope)?;
        }

        let mut result = normalize_scope_set(scopes);
        let mut matched = Vec::new();
        for query in scopes {
            self.dfa.matched_sets(query, &mut matched);
        }
        matched.sort_unstable();
        matched.dedup();
        for id in matched {
            result = merge_scope_sets(&result, self.dfa.set(id));
        }
        Ok(result)
    }

    /// The closed roles this resolver was compiled from
    pub fn closed_roles(&self) -> &[ClosedRole] {
        &self.closed
    }
}

/// Statistics for the expansion cache
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,

    /// Number of cache misses
    pub misses: u64,

    /// Current number of cached expansions
    pub entries: usize,

    /// Maximum number of cached expansions
    pub max_size: usize,
}

impl CacheStats {
    /// Calculates the cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Shared resolver front: atomically swappable active resolver plus a
/// bounded expansion cache.
///
/// # Thread safety
///
/// Reads clone the active `Arc` and evaluate against that snapshot;
/// [`ScopeResolver::load_roles`] builds a replacement off to the side and
/// swaps it in, leaving in-flight readers on the old snapshot.
pub struct ScopeResolver {
    active: RwLock<Arc<CompiledResolver>>,
    /// Expansions keyed by query set, tagged with the generation they were
    /// computed against
    cache: DashMap<Vec<String>, (u64, Vec<String>)>,
    /// Bumped on every reload; guards the cache against entries computed
    /// on a snapshot that has since been swapped out
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    max_cache_size: usize,
}

impl ScopeResolver {
    /// Creates a resolver over an empty role table
    pub fn new() -> Self {
        Self::with_cache_size(DEFAULT_MAX_CACHE_SIZE)
    }

    /// Creates a resolver with a custom expansion-cache bound
    pub fn with_cache_size(max_cache_size: usize) -> Self {
        let (compiled, _) = CompiledResolver::compile(&[]);
        Self {
            active: RwLock::new(Arc::new(compiled)),
            cache: DashMap::new(),
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            max_cache_size,
        }
    }

    /// Compiles the given role table and swaps it in as the active
    /// resolver, invalidating the expansion cache.
    pub fn load_roles(&self, roles: &[Role]) -> BuildReport {
        let (compiled, report) = CompiledResolver::compile(roles);
        *self
            .active
            .write()
            .expect("resolver lock poisoned") = Arc::new(compiled);
        self.generation.fetch_add(1, AtomicOrdering::SeqCst);
        self.cache.clear();
        report
    }

    /// Captures the active compiled resolver
    pub fn snapshot(&self) -> Arc<CompiledResolver> {
        self.active.read().expect("resolver lock poisoned").clone()
    }

    /// Expands query scopes against the active snapshot, with caching
    pub fn expand_scopes(&self, scopes: &[String]) -> Result<Vec<String>> {
        let mut key = scopes.to_vec();
        key.sort();
        key.dedup();

        let generation = self.generation.load(AtomicOrdering::SeqCst);
        if let Some(hit) = self.cache.get(&key) {
            let (cached_generation, expanded) = hit.value();
            if *cached_generation == generation {
                self.hits.fetch_add(1, AtomicOrdering::Relaxed);
                return Ok(expanded.clone());
            }
        }
        self.misses.fetch_add(1, AtomicOrdering::Relaxed);

        let expanded = self.snapshot().expand_scopes(scopes)?;
        // A reload may have raced the computation; entries are only kept
        // for the generation they were computed against.
        if self.cache.len() < self.max_cache_size
            && self.generation.load(AtomicOrdering::SeqCst) == generation
        {
            self.cache.insert(key, (generation, expanded.clone()));
        }
        Ok(expanded)
    }

    /// Expands a client's effective scopes, treating the client as owner
    /// of the role `client-id:<clientId>`.
    pub fn expand_client(&self, client: &Client) -> Result<Vec<String>> {
        let mut scopes = client.scopes.clone();
        scopes.push(format!("assume:client-id:{}", client.client_id));
        self.expand_scopes(&scopes)
    }

    /// Returns cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(AtomicOrdering::Relaxed),
            misses: self.misses.load(AtomicOrdering::Relaxed),
            entries: self.cache.len(),
            max_size: self.max_cache_size,
        }
    }
}

impl Default for ScopeResolver {
    fn default() -> Self {
        Self::new()
    }
}
