//! Character DFA over role activation patterns
//!
//! Compiles a list of closed roles into a deterministic automaton that,
//! given a query scope, yields the accept sets of every role whose
//! activation pattern intersects the query. Literal queries resolve in one
//! transition per character; a query ending in `*` unions every accept set
//! reachable from the state its literal prefix leads to.
//!
//! Construction sweeps a window of the role list sorted so that at any
//! shared prefix a wildcard sibling comes first, then a terminating role,
//! then longer continuations in byte order. Wildcard roles join an
//! inherited set carried down to every descendant state, which also backs
//! the fallback state reached on characters no role continues with.

use std::collections::HashMap;

use super::sets::{SetId, SetTable};
use crate::roles::ClosedRole;
use crate::scope::scope_compare;

const NO_SET: SetId = SetId::MAX;

#[derive(Debug)]
struct State {
    /// Explicit transitions, sorted by byte
    edges: Vec<(u8, u32)>,

    /// State reached on any byte without an explicit transition
    default: u32,

    /// Accept set, `NO_SET` when empty
    accept: SetId,
}

/// Compiled automaton plus its shared set table
#[derive(Debug)]
pub(crate) struct Dfa {
    states: Vec<State>,
    sets: SetTable,
    root: u32,
}

impl Dfa {
    pub(crate) fn build(roles: &[ClosedRole]) -> Self {
        let mut order: Vec<u32> = (0..roles.len() as u32).collect();
        // Wildcard siblings and terminating roles must be swept before
        // longer continuations; the scope order provides exactly that.
        order.sort_by(|&x, &y| {
            scope_compare(&roles[x as usize].activation, &roles[y as usize].activation)
        });

        let mut builder = Builder {
            roles,
            acts: order
                .iter()
                .map(|&i| roles[i as usize].activation.as_bytes())
                .collect(),
            role_of: order,
            states: Vec::new(),
            sets: SetTable::new(),
            fallbacks: HashMap::new(),
        };

        let n = builder.acts.len();
        let root = builder.construct(0, n, 0, &[]);

        Dfa {
            states: builder.states,
            sets: builder.sets,
            root,
        }
    }

    fn step(&self, state: u32, byte: u8) -> u32 {
        let st = &self.states[state as usize];
        match st.edges.binary_search_by_key(&byte, |e| e.0) {
            Ok(k) => st.edges[k].1,
            Err(_) => st.default,
        }
    }

    /// Collects the accept-set ids matched by a query scope.
    ///
    /// Ids may repeat across calls; callers deduplicate before merging.
    pub(crate) fn matched_sets(&self, query: &str, out: &mut Vec<SetId>) {
        let bytes = query.as_bytes();
        let mut state = self.root;

        for (i, &byte) in bytes.iter().enumerate() {
            if byte == b'*' && i + 1 == bytes.len() {
                // The query wildcard admits every continuation, including
                // ending right here.
                self.collect_reachable(state, out);
                return;
            }
            state = self.step(state, byte);
        }

        let accept = self.states[state as usize].accept;
        if accept != NO_SET {
            out.push(accept);
        }
    }

    fn collect_reachable(&self, from: u32, out: &mut Vec<SetId>) {
        let mut seen = vec![false; self.states.len()];
        let mut stack = vec![from];
        while let Some(state) = stack.pop() {
            if seen[state as usize] {
                continue;
            }
            seen[state as usize] = true;

            let st = &self.states[state as usize];
            if st.accept != NO_SET {
                out.push(st.accept);
            }
            for &(_, target) in &st.edges {
                stack.push(target);
            }
            stack.push(st.default);
        }
    }

    pub(crate) fn set(&self, id: SetId) -> &[String] {
        self.sets.get(id)
    }

    pub(crate) fn state_count(&self) -> usize {
        self.states.len()
    }

    pub(crate) fn set_count(&self) -> usize {
        self.sets.len()
    }
}

struct Builder<'a> {
    roles: &'a [ClosedRole],
    /// Activation byte strings, in construction order
    acts: Vec<&'a [u8]>,
    /// Original role index of each ordered position
    role_of: Vec<u32>,
    states: Vec<State>,
    sets: SetTable,
    /// Fallback states keyed by their (normalized) inherited contributors
    fallbacks: HashMap<Vec<u32>, u32>,
}

impl<'a> Builder<'a> {
    /// Builds the state for the window `[lo, hi)` of roles sharing their
    /// first `depth` activation bytes, returning its id. `inherited` holds
    /// the wildcard roles whose match zone covers this state.
    fn construct(&mut self, lo: usize, hi: usize, depth: usize, inherited: &[u32]) -> u32 {
        let mut contributors: Vec<u32> = inherited.to_vec();
        let mut child_inherited: Vec<u32> = inherited.to_vec();
        let mut k = lo;

        // A wildcard at this depth accepts here and everywhere below.
        while k < hi && self.acts[k].len() == depth + 1 && self.acts[k][depth] == b'*' {
            contributors.push(self.role_of[k]);
            child_inherited.push(self.role_of[k]);
            k += 1;
        }

        // A role terminating at this depth accepts here only.
        while k < hi && self.acts[k].len() == depth {
            contributors.push(self.role_of[k]);
            k += 1;
        }

        let mut edges: Vec<(u8, u32)> = Vec::new();
        let mut i = k;
        while i < hi {
            let byte = self.acts[i][depth];
            let mut j = i + 1;
            while j < hi && self.acts[j][depth] == byte {
                j += 1;
            }
            let child = self.construct(i, j, depth + 1, &child_inherited);
            edges.push((byte, child));
            i = j;
        }

        let default = self.fallback(&child_inherited);
        let accept = if contributors.is_empty() {
            NO_SET
        } else {
            self.sets.intern(contributors, self.roles)
        };

        let id = self.states.len() as u32;
        self.states.push(State {
            edges,
            default,
            accept,
        });
        id
    }

    /// State entered on bytes no role continues with: it loops on itself
    /// and accepts exactly the inherited wildcard sets. With nothing
    /// inherited this is the dead state.
    fn fallback(&mut self, inherited: &[u32]) -> u32 {
        let mut key: Vec<u32> = inherited.to_vec();
        key.sort_unstable();
        key.dedup();

        if let Some(&id) = self.fallbacks.get(&key) {
            return id;
        }

        let accept = if key.is_empty() {
            NO_SET
        } else {
            self.sets.intern(key.clone(), self.roles)
        };
        let id = self.states.len() as u32;
        self.states.push(State {
            edges: Vec::new(),
            default: id,
            accept,
        });
        self.fallbacks.insert(key, id);
        id
    }
}
