//! Threshold replication and the coincident n-tuple search.
//!
//! The search works on a per-slide coincidence graph: one node per trigger
//! from the instruments participating in the slide, one edge per
//! cross-instrument pair that is both time-compatible and accepted by the
//! pairwise coincidence test. Coincident n-tuples are the maximal cliques of
//! that graph, enumerated lazily by [`CoincidentNtuples`].

use std::collections::HashMap;

use itertools::Itertools;
use log::debug;

use crate::event::TriggerEvent;
use crate::eventlist::{EventList, StateError};
use crate::gps::GpsTime;

/// Coincidence threshold per ordered instrument pair.
pub type ThresholdTable = HashMap<(String, String), f64>;

/// From a single threshold and a list of instruments, build a table whose
/// keys are every instrument pair (both orders) and whose values are all the
/// same single threshold.
///
/// # Example
/// ```
/// # use thinca::replicate_threshold;
/// let thresholds = replicate_threshold(6.0, &["H1".to_string(), "H2".to_string()]);
/// assert_eq!(thresholds[&("H1".to_string(), "H2".to_string())], 6.0);
/// assert_eq!(thresholds[&("H2".to_string(), "H1".to_string())], 6.0);
/// assert_eq!(thresholds.len(), 2);
/// ```
pub fn replicate_threshold(threshold: f64, instruments: &[String]) -> ThresholdTable {
    instruments
        .iter()
        .tuple_combinations()
        .flat_map(|(a, b)| {
            [
                ((a.clone(), b.clone()), threshold),
                ((b.clone(), a.clone()), threshold),
            ]
        })
        .collect()
}

/// Index into the flattened per-slide pool of candidate triggers.
type NodeId = usize;

/// Pairwise coincidence results for one time slide.
///
/// Building the graph evaluates every time-compatible cross-instrument
/// trigger pair exactly once; the clique search below reuses the stored
/// edges instead of re-running the pairwise test.
pub(crate) struct CoincidenceGraph<'a> {
    nodes: Vec<&'a TriggerEvent>,
    adjacency: Vec<Vec<NodeId>>,
}

impl<'a> CoincidenceGraph<'a> {
    /// Build the graph over the given (indexed, offset) event lists.
    ///
    /// `thresholds` must contain both orderings of every instrument pair
    /// among `lists`, as produced by [`replicate_threshold`].
    pub(crate) fn build<C>(
        lists: &[&'a EventList],
        thresholds: &ThresholdTable,
        window: GpsTime,
        is_coincident: &C,
    ) -> Result<Self, StateError>
    where
        C: Fn(&TriggerEvent, &TriggerEvent, f64) -> bool,
    {
        let mut nodes = Vec::new();
        let mut base = Vec::with_capacity(lists.len());
        for list in lists {
            base.push(nodes.len());
            nodes.extend(list.events().iter());
        }
        let mut adjacency: Vec<Vec<NodeId>> = vec![Vec::new(); nodes.len()];

        let mut edges = 0usize;
        for ((i, list_a), (j, list_b)) in lists.iter().enumerate().tuple_combinations() {
            let threshold = thresholds[&(
                list_a.instrument().to_string(),
                list_b.instrument().to_string(),
            )];
            for (m, event_a) in list_a.events().iter().enumerate() {
                for n in list_b.coincident_range(event_a.end(), window)? {
                    let event_b = &list_b.events()[n];
                    if is_coincident(event_a, event_b, threshold) {
                        adjacency[base[i] + m].push(base[j] + n);
                        adjacency[base[j] + n].push(base[i] + m);
                        edges += 1;
                    }
                }
            }
        }
        for neighbors in &mut adjacency {
            neighbors.sort_unstable();
        }
        debug!(
            "coincidence graph: {} candidates, {} coincident pairs",
            nodes.len(),
            edges
        );

        Ok(Self { nodes, adjacency })
    }
}

/// One branch of the backtracking clique search: the growing clique `r`,
/// the candidates `p` still able to extend it, the excluded set `x` already
/// explored, and the pivot-pruned candidate list to branch on.
struct Frame {
    r: Vec<NodeId>,
    p: Vec<NodeId>,
    x: Vec<NodeId>,
    candidates: Vec<NodeId>,
    cursor: usize,
}

impl Frame {
    fn new(r: Vec<NodeId>, p: Vec<NodeId>, x: Vec<NodeId>, adjacency: &[Vec<NodeId>]) -> Self {
        // branch only on candidates outside the pivot's neighborhood; the
        // pivot is the vertex covering the most of p
        let pivot = p
            .iter()
            .chain(x.iter())
            .copied()
            .max_by_key(|&u| intersection_len(&adjacency[u], &p));
        let candidates = match pivot {
            Some(u) => sorted_difference(&p, &adjacency[u]),
            None => Vec::new(),
        };
        Self {
            r,
            p,
            x,
            candidates,
            cursor: 0,
        }
    }
}

/// Lazy enumeration of all maximal coincident n-tuples (n ≥ 2) for one time
/// slide.
///
/// The sequence is finite, non-restartable and consumed exactly once. The
/// policy toward sub-tuples is maximality: a tuple is emitted iff it is a
/// maximal clique of the coincidence graph, so a fully coincident triple
/// yields one 3-tuple and none of its pairs, while a chain A–B–C missing the
/// A–C edge yields the two pairs {A, B} and {B, C}. Since triggers from the
/// same instrument are never adjacent, a tuple holds at most one trigger per
/// instrument.
///
/// Implemented as an explicit-stack Bron–Kerbosch search with pivoting.
pub(crate) struct CoincidentNtuples<'a> {
    graph: CoincidenceGraph<'a>,
    stack: Vec<Frame>,
}

impl<'a> CoincidentNtuples<'a> {
    pub(crate) fn new(graph: CoincidenceGraph<'a>) -> Self {
        let p: Vec<NodeId> = (0..graph.nodes.len()).collect();
        let root = Frame::new(Vec::new(), p, Vec::new(), &graph.adjacency);
        Self {
            graph,
            stack: vec![root],
        }
    }
}

impl<'a> Iterator for CoincidentNtuples<'a> {
    type Item = Vec<&'a TriggerEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        let graph = &self.graph;
        while let Some(frame) = self.stack.last_mut() {
            if frame.p.is_empty() && frame.x.is_empty() {
                // r is maximal; report it if it spans at least two triggers
                let mut r = std::mem::take(&mut frame.r);
                self.stack.pop();
                if r.len() >= 2 {
                    r.sort_unstable();
                    return Some(r.into_iter().map(|node| graph.nodes[node]).collect());
                }
                continue;
            }
            if frame.cursor >= frame.candidates.len() {
                self.stack.pop();
                continue;
            }

            let v = frame.candidates[frame.cursor];
            frame.cursor += 1;
            let neighbors = &graph.adjacency[v];
            let mut r = frame.r.clone();
            r.push(v);
            let p = sorted_intersection(&frame.p, neighbors);
            let x = sorted_intersection(&frame.x, neighbors);
            // v moves from the candidates to the excluded set of this branch
            frame.p.retain(|&u| u != v);
            if let Err(pos) = frame.x.binary_search(&v) {
                frame.x.insert(pos, v);
            }
            let child = Frame::new(r, p, x, &graph.adjacency);
            self.stack.push(child);
        }
        None
    }
}

fn sorted_intersection(a: &[NodeId], b: &[NodeId]) -> Vec<NodeId> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

fn intersection_len(a: &[NodeId], b: &[NodeId]) -> usize {
    let mut count = 0;
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                count += 1;
                i += 1;
                j += 1;
            }
        }
    }
    count
}

fn sorted_difference(a: &[NodeId], b: &[NodeId]) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut j = 0;
    for &v in a {
        while j < b.len() && b[j] < v {
            j += 1;
        }
        if j >= b.len() || b[j] != v {
            out.push(v);
        }
    }
    out
}
