use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::{AHashMap, AHashSet};
use nalgebra::Point3;

use crate::quadric::Quadric;

/// A candidate edge contraction: merge `drop` into `keep` at cost
/// `error`. `seq` is the insertion counter breaking error ties
/// deterministically.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub error: f64,
    pub seq: u64,
    pub keep: u32,
    pub drop: u32,
}

// Heap entries carry only the ordering key; candidate state lives in
// the seq-keyed arena so invalidation never has to touch the heap.
#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapEntry {
    error: f64,
    seq: u64,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap, we want min-(error, seq)
        other
            .error
            .total_cmp(&self.error)
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of candidate contractions with lazy invalidation.
///
/// The heap orders (error, seq) keys; whether a candidate is still
/// live is decided by its presence in the arena. Invalidation is O(1)
/// through the per-vertex and per-edge back-indexes and never
/// rearranges the heap; stale entries are discarded when popped.
#[derive(Debug)]
pub struct ContractionQueue {
    heap: BinaryHeap<HeapEntry>,
    live: AHashMap<u64, Candidate>,
    by_vertex: Vec<AHashSet<u64>>,
    by_edge: AHashMap<(u32, u32), u64>,
    next_seq: u64,
}

impl ContractionQueue {
    pub fn new(vertex_count: usize) -> Self {
        ContractionQueue {
            heap: BinaryHeap::new(),
            live: AHashMap::new(),
            by_vertex: vec![AHashSet::new(); vertex_count],
            by_edge: AHashMap::new(),
            next_seq: 0,
        }
    }

    fn edge_key(u: u32, v: u32) -> (u32, u32) {
        if u < v {
            (u, v)
        } else {
            (v, u)
        }
    }

    /// Queue a candidate for the edge (u, v) unless one is already
    /// live. The endpoint whose position evaluates lower under the
    /// summed endpoint quadrics survives the contraction.
    pub fn generate(&mut self, u: u32, v: u32, quadrics: &[Quadric], vertices: &[Point3<f64>]) {
        assert_ne!(u, v, "candidate edge endpoints coincide");
        let key = Self::edge_key(u, v);
        if self.by_edge.contains_key(&key) {
            return;
        }
        let (lo, hi) = key;
        let q = quadrics[lo as usize] + quadrics[hi as usize];
        let e_lo = q.eval(vertices[lo as usize]);
        let e_hi = q.eval(vertices[hi as usize]);

        let seq = self.next_seq;
        self.next_seq += 1;
        let candidate = if e_lo < e_hi {
            Candidate {
                error: e_lo,
                seq,
                keep: lo,
                drop: hi,
            }
        } else {
            Candidate {
                error: e_hi,
                seq,
                keep: hi,
                drop: lo,
            }
        };

        self.heap.push(HeapEntry {
            error: candidate.error,
            seq,
        });
        self.live.insert(seq, candidate);
        self.by_vertex[lo as usize].insert(seq);
        self.by_vertex[hi as usize].insert(seq);
        self.by_edge.insert(key, seq);
    }

    /// Pop the best live candidate, discarding stale heap entries on
    /// the way. The returned candidate stays registered until an
    /// endpoint invalidation removes it, so callers work from the
    /// returned copy.
    pub fn pop_valid(&mut self) -> Option<Candidate> {
        while let Some(entry) = self.heap.pop() {
            if let Some(&candidate) = self.live.get(&entry.seq) {
                return Some(candidate);
            }
        }
        None
    }

    /// Invalidate every live candidate touching `v`.
    pub fn invalidate_vertex(&mut self, v: u32) {
        let seqs = std::mem::take(&mut self.by_vertex[v as usize]);
        for seq in seqs {
            let candidate = self
                .live
                .remove(&seq)
                .unwrap_or_else(|| panic!("back-index names a dead candidate {seq}"));
            let other = if candidate.keep == v {
                candidate.drop
            } else {
                candidate.keep
            };
            self.by_vertex[other as usize].remove(&seq);
            self.by_edge.remove(&Self::edge_key(v, other));
        }
    }

    /// Vertex compaction: retarget every candidate of the current last
    /// vertex to the slot `dst` it is moving into, then shrink.
    pub fn relabel_last_vertex(&mut self, dst: u32) {
        let last = (self.by_vertex.len() - 1) as u32;
        let seqs = self
            .by_vertex
            .pop()
            .expect("no vertex slots left to relabel");
        for &seq in &seqs {
            let candidate = self
                .live
                .get_mut(&seq)
                .unwrap_or_else(|| panic!("back-index names a dead candidate {seq}"));
            let other = if candidate.keep == last {
                candidate.keep = dst;
                candidate.drop
            } else {
                assert_eq!(candidate.drop, last, "candidate does not touch vertex {last}");
                candidate.drop = dst;
                candidate.keep
            };
            self.by_edge.remove(&Self::edge_key(other, last));
            self.by_edge.insert(Self::edge_key(other, dst), seq);
        }
        let old = std::mem::replace(&mut self.by_vertex[dst as usize], seqs);
        assert!(old.is_empty(), "vertex slot {dst} still has live candidates");
    }

    /// Drop the last vertex slot, which must have no live candidates.
    pub fn pop_isolated_last(&mut self) {
        let last = self.by_vertex.pop().expect("no vertex slots left to pop");
        assert!(last.is_empty(), "dropped vertex still has live candidates");
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}
