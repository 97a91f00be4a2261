//! Shared accept-set table for the resolver DFA
//!
//! Every DFA state's accept set is an index into this table. Sets are
//! interned twice over: by the combination of contributing roles (cheap,
//! hit first) and by the merged contents (structural equality), so a build
//! producing many states but few distinct sets allocates only the distinct
//! ones.

use std::collections::HashMap;

use crate::roles::ClosedRole;
use crate::scope::merge_scope_sets;

/// Index of an interned scope set
pub(crate) type SetId = u32;

#[derive(Debug, Default)]
pub(crate) struct SetTable {
    sets: Vec<Vec<String>>,
    by_contributors: HashMap<Vec<u32>, SetId>,
    by_content: HashMap<Vec<String>, SetId>,
}

impl SetTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Interns the merged scope set of the given contributing roles.
    ///
    /// Contributor lists are normalized (sorted, deduplicated) before
    /// lookup; two combinations that merge to identical contents share one
    /// table entry.
    pub(crate) fn intern(&mut self, mut contributors: Vec<u32>, roles: &[ClosedRole]) -> SetId {
        contributors.sort_unstable();
        contributors.dedup();

        if let Some(&id) = self.by_contributors.get(&contributors) {
            return id;
        }

        let mut merged: Vec<String> = Vec::new();
        for &r in &contributors {
            merged = merge_scope_sets(&merged, &roles[r as usize].scopes);
        }

        let id = match self.by_content.get(&merged) {
            Some(&id) => id,
            None => {
                let id = self.sets.len() as SetId;
                self.by_content.insert(merged.clone(), id);
                self.sets.push(merged);
                id
            }
        };
        self.by_contributors.insert(contributors, id);
        id
    }

    pub(crate) fn get(&self, id: SetId) -> &[String] {
        &self.sets[id as usize]
    }

    /// Number of distinct sets in the table
    pub(crate) fn len(&self) -> usize {
        self.sets.len()
    }
}
