//! Activation graph over roles
//!
//! Roles form a directed graph: an edge `R -> R'` exists when one of R's
//! scopes covers R''s activation pattern. Cycles are legal (mutually
//! assuming roles), so instead of rejecting them the graph is condensed
//! into strongly connected components; the expander processes components
//! in reverse topological order, successors first.

use std::collections::HashSet;

use super::types::Role;
use crate::scope::satisfies_scope;

/// Adjacency over role indices: `edges[i]` lists the roles activated by
/// some scope of role `i`.
#[derive(Debug)]
pub(crate) struct ActivationGraph {
    edges: Vec<Vec<usize>>,
}

impl ActivationGraph {
    /// Builds the graph from the roles' declared scopes.
    ///
    /// Activation matching treats the activating scope as held and the
    /// target role's `assume:<roleId>` pattern as required, so a held
    /// pattern such as `assume:b*` (or `*`) activates every role it
    /// covers, while a held literal activates only roles whose activation
    /// it equals.
    pub(crate) fn build(roles: &[Role]) -> Self {
        let activations: Vec<String> = roles.iter().map(Role::activation).collect();

        let mut edges = Vec::with_capacity(roles.len());
        for role in roles {
            let mut targets = Vec::new();
            for (j, activation) in activations.iter().enumerate() {
                if role
                    .scopes
                    .iter()
                    .any(|scope| satisfies_scope(scope, activation))
                {
                    targets.push(j);
                }
            }
            edges.push(targets);
        }

        Self { edges }
    }

    /// Condenses the graph into strongly connected components using an
    /// iterative Tarjan traversal. Components are returned sinks-first
    /// (reverse topological order of the condensation), so every component
    /// a member can reach appears earlier in the list.
    pub(crate) fn condensation(&self) -> Condensation {
        let n = self.edges.len();
        let mut index = vec![usize::MAX; n];
        let mut low = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut next_index = 0usize;
        let mut components: Vec<Vec<usize>> = Vec::new();

        for root in 0..n {
            if index[root] != usize::MAX {
                continue;
            }

            index[root] = next_index;
            low[root] = next_index;
            next_index += 1;
            stack.push(root);
            on_stack[root] = true;

            // Explicit call stack of (node, next child offset); role chains
            // can be long enough to overflow the real one.
            let mut call: Vec<(usize, usize)> = vec![(root, 0)];
            while let Some(frame) = call.last_mut() {
                let v = frame.0;
                if frame.1 < self.edges[v].len() {
                    let w = self.edges[v][frame.1];
                    frame.1 += 1;
                    if index[w] == usize::MAX {
                        index[w] = next_index;
                        low[w] = next_index;
                        next_index += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        call.push((w, 0));
                    } else if on_stack[w] {
                        low[v] = low[v].min(index[w]);
                    }
                } else {
                    call.pop();
                    if let Some(parent) = call.last() {
                        let p = parent.0;
                        low[p] = low[p].min(low[v]);
                    }
                    if low[v] == index[v] {
                        let mut component = Vec::new();
                        loop {
                            let w = stack.pop().expect("Tarjan stack must contain the root");
                            on_stack[w] = false;
                            component.push(w);
                            if w == v {
                                break;
                            }
                        }
                        components.push(component);
                    }
                }
            }
        }

        let mut component_of = vec![0usize; n];
        for (ci, component) in components.iter().enumerate() {
            for &member in component {
                component_of[member] = ci;
            }
        }

        // Deduplicated cross-component successor lists.
        let mut successors: Vec<Vec<usize>> = Vec::with_capacity(components.len());
        for (ci, component) in components.iter().enumerate() {
            let mut seen = HashSet::new();
            for &member in component {
                for &target in &self.edges[member] {
                    let tc = component_of[target];
                    if tc != ci {
                        seen.insert(tc);
                    }
                }
            }
            successors.push(seen.into_iter().collect());
        }

        Condensation {
            components,
            component_of,
            successors,
        }
    }
}

/// Strongly-connected-component condensation of an [`ActivationGraph`]
#[derive(Debug)]
pub(crate) struct Condensation {
    /// Components in reverse topological order: every successor of a
    /// component has a smaller index
    pub components: Vec<Vec<usize>>,

    /// Component index of each role
    pub component_of: Vec<usize>,

    /// Cross-component edges, deduplicated
    pub successors: Vec<Vec<usize>>,
}
