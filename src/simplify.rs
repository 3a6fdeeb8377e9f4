use ahash::{AHashMap, AHashSet};
use anyhow::Result;
use itertools::Itertools;
use log::debug;
use nalgebra::Point3;

use crate::adjacency::Adjacency;
use crate::attributes::AttributeTable;
use crate::mesh::{ChannelData, MeshData};
use crate::progress::{NoProgress, Progress};
use crate::quadric::{boundary_quadric, triangle_quadric, Quadric};
use crate::queue::{Candidate, ContractionQueue};

/// One entry of the contraction history. All indices are original
/// indices, so records stay meaningful as the live arrays shrink.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractionRecord {
    /// Original index of the dropped vertex.
    pub source: u32,
    /// Original index of the surviving vertex.
    pub target: u32,
    /// Original indices of the triangles this contraction deleted.
    pub deleted_triangles: Vec<u32>,
    /// Original index of each deleted triangle's opposite-corner vertex.
    pub deleted_opposite: Vec<u32>,
    /// Corner positions (source, target, opposite) in each deleted triangle.
    pub deleted_perm: Vec<[u8; 3]>,
    /// Original indices of the surviving triangles rewritten to the survivor.
    pub changed_triangles: Vec<u32>,
}

/// A live attribute channel: per-triangle source triples kept parallel
/// to the live triangle array, the compacted source table with its
/// original-index map, and the per-source incident triangle sets.
#[derive(Debug)]
pub(crate) struct Channel {
    pub(crate) triangles: Vec<[u32; 3]>,
    pub(crate) sources: AttributeTable,
    pub(crate) source_orig: Vec<u32>,
    incident: Vec<AHashSet<u32>>,

    // immutable input copies, indexed by original indices; the PM
    // builder reads deleted triples and orphaned source values here
    pub(crate) original_triangles: Vec<[u32; 3]>,
    pub(crate) original_sources: AttributeTable,
}

impl Channel {
    fn new(data: ChannelData) -> Self {
        let mut incident: Vec<AHashSet<u32>> = vec![AHashSet::new(); data.sources.len()];
        for (t, triple) in data.triangles.iter().enumerate() {
            for &a in triple {
                incident[a as usize].insert(t as u32);
            }
        }
        Channel {
            original_triangles: data.triangles.clone(),
            original_sources: data.sources.clone(),
            source_orig: (0..data.sources.len() as u32).collect(),
            triangles: data.triangles,
            sources: data.sources,
            incident,
        }
    }

    /// Exchange two triangle slots, keeping the incident sets aligned.
    fn swap_triangles(&mut self, t1: u32, t2: u32) {
        let mut attrs: Vec<u32> = self.triangles[t1 as usize]
            .iter()
            .chain(self.triangles[t2 as usize].iter())
            .copied()
            .collect();
        attrs.sort_unstable();
        attrs.dedup();
        for a in attrs {
            let set = &mut self.incident[a as usize];
            let has1 = set.contains(&t1);
            let has2 = set.contains(&t2);
            assert!(has1 || has2, "attribute {a} incident to neither swapped triangle");
            if has1 != has2 {
                if has1 {
                    set.remove(&t1);
                    set.insert(t2);
                } else {
                    set.remove(&t2);
                    set.insert(t1);
                }
            }
        }
        self.triangles.swap(t1 as usize, t2 as usize);
    }

    /// Pop the last triangle's triple and compact away any source it
    /// orphaned: swap each orphan into the tail of the source table,
    /// then pop.
    fn delete_last_triangle(&mut self, last: u32) {
        let triple = self
            .triangles
            .pop()
            .expect("channel triangle array out of sync with the mesh");
        let mut orphans: Vec<u32> = Vec::new();
        for &a in &triple {
            let set = &mut self.incident[a as usize];
            // a triple may repeat a source; the second removal is a no-op
            if set.remove(&last) && set.is_empty() {
                orphans.push(a);
            }
        }
        orphans.sort_unstable_by(|x, y| y.cmp(x));
        let top = self.sources.len();
        for (i, &a) in orphans.iter().enumerate() {
            self.swap_sources(a, (top - 1 - i) as u32);
        }
        for _ in 0..orphans.len() {
            assert!(
                self.incident.last().is_some_and(|s| s.is_empty()),
                "compacted attribute source still has incident triangles"
            );
            self.incident.pop();
            self.sources.pop();
            self.source_orig.pop();
        }
    }

    /// Exchange two source slots, rewriting every triple referencing
    /// either one.
    fn swap_sources(&mut self, a1: u32, a2: u32) {
        if a1 == a2 {
            return;
        }
        let mut tris: Vec<u32> = self.incident[a1 as usize]
            .iter()
            .chain(self.incident[a2 as usize].iter())
            .copied()
            .collect();
        tris.sort_unstable();
        tris.dedup();
        for t in tris {
            for slot in self.triangles[t as usize].iter_mut() {
                if *slot == a1 {
                    *slot = a2;
                } else if *slot == a2 {
                    *slot = a1;
                }
            }
        }
        self.incident.swap(a1 as usize, a2 as usize);
        self.sources.swap(a1 as usize, a2 as usize);
        self.source_orig.swap(a1 as usize, a2 as usize);
    }

    /// The incident sets match the live triples exactly and no source
    /// is orphaned.
    fn is_consistent(&self) -> bool {
        if self.sources.len() != self.incident.len()
            || self.sources.len() != self.source_orig.len()
        {
            return false;
        }
        let mut rebuilt: Vec<AHashSet<u32>> = vec![AHashSet::new(); self.incident.len()];
        for (t, triple) in self.triangles.iter().enumerate() {
            for &a in triple {
                match rebuilt.get_mut(a as usize) {
                    Some(set) => {
                        set.insert(t as u32);
                    }
                    None => return false,
                }
            }
        }
        rebuilt == self.incident && self.incident.iter().all(|set| !set.is_empty())
    }
}

/// Greedy quadric-error edge-contraction engine.
///
/// Construction ingests the mesh, indexes adjacency, accumulates
/// per-vertex quadrics (with a boundary-preservation term), and seeds
/// one candidate per edge. Each [`contract_once`](Self::contract_once)
/// pops the cheapest valid candidate and applies it, appending a
/// reversible record to the history; [`generate_pm`](Self::generate_pm)
/// turns the history into a vertex-split stream.
#[derive(Debug)]
pub struct Simplifier {
    vertices: Vec<Point3<f64>>,
    pub(crate) vertex_orig: Vec<u32>,
    triangles: Vec<[u32; 3]>,
    pub(crate) triangle_orig: Vec<u32>,
    pub(crate) channels: Vec<Channel>,
    adjacency: Adjacency,
    quadrics: Vec<Quadric>,
    queue: ContractionQueue,
    pub(crate) history: Vec<ContractionRecord>,

    pub(crate) original_vertices: Vec<Point3<f64>>,
    pub(crate) original_triangle_count: usize,
}

impl Simplifier {
    pub fn new(mesh: MeshData) -> Result<Self> {
        Self::with_progress(mesh, &mut NoProgress)
    }

    /// Build the engine, ticking `progress` once per triangle in the
    /// quadric and seeding passes and once per vertex in the
    /// vertex-quadric pass.
    pub fn with_progress(mesh: MeshData, progress: &mut dyn Progress) -> Result<Self> {
        mesh.validate()?;
        let MeshData {
            vertices,
            triangles,
            channels,
        } = mesh;
        let vertex_count = vertices.len();
        let triangle_count = triangles.len();

        let mut adjacency = Adjacency::new(vertex_count);
        // opposite-corner lists per undirected edge; a boundary edge is
        // one with a single entry. Only needed during initialization.
        let mut edge_opp: AHashMap<(u32, u32), Vec<u32>> = AHashMap::new();
        for (t, tri) in triangles.iter().enumerate() {
            adjacency.add_triangle(t as u32, *tri);
            let [a, b, c] = *tri;
            for (x1, x2, x3) in [(a, b, c), (a, c, b), (b, c, a)] {
                let key = if x1 < x2 { (x1, x2) } else { (x2, x1) };
                edge_opp.entry(key).or_default().push(x3);
            }
        }

        let channels: Vec<Channel> = channels.into_iter().map(Channel::new).collect();

        let mut tri_quadrics = Vec::with_capacity(triangle_count);
        for tri in &triangles {
            progress.step();
            tri_quadrics.push(triangle_quadric(
                vertices[tri[0] as usize],
                vertices[tri[1] as usize],
                vertices[tri[2] as usize],
            ));
        }
        let avg_area = if triangle_count == 0 {
            0.0
        } else {
            tri_quadrics.iter().map(|(_, area, _)| area).sum::<f64>() / triangle_count as f64
        };

        let mut quadrics = Vec::with_capacity(vertex_count);
        for v in 0..vertex_count as u32 {
            progress.step();
            let mut q = Quadric::zero();
            for (t, _) in adjacency.incident_sorted(v) {
                let (tri_q, _, normal) = tri_quadrics[t as usize];
                for &other in &triangles[t as usize] {
                    if other == v {
                        continue;
                    }
                    let key = if v < other { (v, other) } else { (other, v) };
                    if edge_opp[&key].len() == 1 {
                        q += boundary_quadric(
                            vertices[v as usize],
                            vertices[other as usize],
                            normal,
                            avg_area,
                        );
                    }
                }
                q += tri_q.scaled(1.0 / 3.0);
            }
            quadrics.push(q);
        }
        drop(edge_opp);
        drop(tri_quadrics);

        let mut queue = ContractionQueue::new(vertex_count);
        for tri in &triangles {
            progress.step();
            for (&u, &v) in tri.iter().tuple_combinations() {
                queue.generate(u, v, &quadrics, &vertices);
            }
        }

        debug!(
            "simplifier ready: {} vertices, {} triangles, {} channels, {} candidates, avg area {:.6}",
            vertex_count,
            triangle_count,
            channels.len(),
            queue.live_count(),
            avg_area
        );

        Ok(Simplifier {
            original_vertices: vertices.clone(),
            original_triangle_count: triangle_count,
            vertex_orig: (0..vertex_count as u32).collect(),
            triangle_orig: (0..triangle_count as u32).collect(),
            vertices,
            triangles,
            channels,
            adjacency,
            quadrics,
            queue,
            history: Vec::new(),
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// The contraction history so far, oldest first.
    pub fn history(&self) -> &[ContractionRecord] {
        &self.history
    }

    /// Pop the best valid candidate and apply it. Returns false when
    /// no valid candidate is left.
    pub fn contract_once(&mut self) -> bool {
        match self.queue.pop_valid() {
            Some(candidate) => {
                self.do_contraction(candidate);
                true
            }
            None => false,
        }
    }

    /// Contract until the live triangle count reaches
    /// `target_tri_count` or the queue drains.
    pub fn contract_to(&mut self, target_tri_count: usize) {
        while self.triangles.len() > target_tri_count && self.contract_once() {}
    }

    /// A dense snapshot of the live mesh.
    pub fn current_mesh(&self) -> MeshData {
        MeshData {
            vertices: self.vertices.clone(),
            triangles: self.triangles.clone(),
            channels: self
                .channels
                .iter()
                .map(|channel| ChannelData {
                    triangles: channel.triangles.clone(),
                    sources: channel.sources.clone(),
                })
                .collect(),
        }
    }

    /// The vertex-split stream restoring the original mesh from the
    /// current live mesh, in application order.
    pub fn generate_pm(&self) -> Vec<crate::pm::PmEntry> {
        crate::pm::generate(self)
    }

    /// Debug invariant check: adjacency round-trips against the
    /// triangle array, no triangle repeats a vertex, and every channel
    /// incident set matches the triples referencing it.
    pub fn is_valid(&self) -> bool {
        self.adjacency.is_consistent(&self.triangles)
            && self
                .triangles
                .iter()
                .all(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2])
            && self.channels.iter().all(Channel::is_consistent)
    }

    fn do_contraction(&mut self, candidate: Candidate) {
        // snapshot the endpoints; the invalidation below retires the
        // candidate record itself
        let Candidate {
            error,
            keep: i1,
            drop: i2,
            ..
        } = candidate;
        debug!(
            "contract #{}: keep {i1} drop {i2} error {error:.6e}",
            self.history.len()
        );

        let mut record = ContractionRecord {
            source: self.vertex_orig[i2 as usize],
            target: self.vertex_orig[i1 as usize],
            deleted_triangles: Vec::new(),
            deleted_opposite: Vec::new(),
            deleted_perm: Vec::new(),
            changed_triangles: Vec::new(),
        };

        let dropped = self.quadrics[i2 as usize];
        self.quadrics[i1 as usize] += dropped;

        self.queue.invalidate_vertex(i2);

        // Partition the triangles at i2: those also containing i1
        // collapse to zero area and are deleted; the rest have their
        // i2 corner rewritten to i1 and reseed their edges.
        let mut to_delete: Vec<u32> = Vec::new();
        for (t, corner) in self.adjacency.incident_sorted(i2) {
            if self.adjacency.contains(i1, t) {
                to_delete.push(t);
                record
                    .deleted_triangles
                    .push(self.triangle_orig[t as usize]);
                let tri = self.triangles[t as usize];
                let mut perm = [u8::MAX; 3];
                let mut opposite = u32::MAX;
                for (c, &v) in tri.iter().enumerate() {
                    if v == i2 {
                        perm[0] = c as u8;
                    } else if v == i1 {
                        perm[1] = c as u8;
                    } else {
                        perm[2] = c as u8;
                        opposite = v;
                    }
                }
                assert!(
                    perm.iter().all(|&c| c < 3),
                    "triangle {t} does not span both endpoints and an opposite corner"
                );
                record
                    .deleted_opposite
                    .push(self.vertex_orig[opposite as usize]);
                record.deleted_perm.push(perm);
            } else {
                record
                    .changed_triangles
                    .push(self.triangle_orig[t as usize]);
                self.adjacency.rewrite_corner(t, i2, i1);
                self.triangles[t as usize][corner as usize] = i1;
                let tri = self.triangles[t as usize];
                for (&u, &v) in tri.iter().tuple_combinations() {
                    self.queue.generate(u, v, &self.quadrics, &self.vertices);
                }
            }
        }

        self.history.push(record);

        // Swap each degenerate triangle into the tail, then pop.
        // Descending order keeps earlier swaps from disturbing the
        // remaining targets.
        to_delete.sort_unstable_by(|a, b| b.cmp(a));
        let top = self.triangles.len();
        for (i, &t) in to_delete.iter().enumerate() {
            self.swap_triangle_slots(t, (top - 1 - i) as u32);
        }
        for _ in 0..to_delete.len() {
            let last = (self.triangles.len() - 1) as u32;
            assert!(
                self.adjacency.contains(i1, last),
                "degenerate triangle {last} is not incident to the survivor {i1}"
            );
            self.delete_last_triangle();
        }

        self.compact_vertex(i2);
    }

    fn swap_triangle_slots(&mut self, t1: u32, t2: u32) {
        if t1 == t2 {
            return;
        }
        let corners1 = self.triangles[t1 as usize];
        let corners2 = self.triangles[t2 as usize];
        self.adjacency.swap_triangles(t1, t2, corners1, corners2);
        self.triangles.swap(t1 as usize, t2 as usize);
        self.triangle_orig.swap(t1 as usize, t2 as usize);
        for channel in &mut self.channels {
            channel.swap_triangles(t1, t2);
        }
    }

    fn delete_last_triangle(&mut self) {
        let last = (self.triangles.len() - 1) as u32;
        let corners = self.triangles[last as usize];
        self.adjacency.remove_triangle(last, corners);
        self.triangles.pop();
        self.triangle_orig.pop();
        for channel in &mut self.channels {
            channel.delete_last_triangle(last);
        }
    }

    /// Compact the vertex arrays by moving the last slot into `i2`.
    /// External references to the moved vertex (queued candidates and
    /// triangle corners) are updated before the slot is overwritten.
    fn compact_vertex(&mut self, i2: u32) {
        let last = (self.vertices.len() - 1) as u32;
        if i2 == last {
            self.vertices.pop();
            self.vertex_orig.pop();
            self.adjacency.pop_isolated_last();
            self.queue.pop_isolated_last();
            self.quadrics.pop();
        } else {
            self.queue.relabel_last_vertex(i2);
            for (t, corner) in self.adjacency.incident_sorted(last) {
                self.triangles[t as usize][corner as usize] = i2;
            }
            let moved = self
                .vertices
                .pop()
                .expect("vertex array empty during compaction");
            self.vertices[i2 as usize] = moved;
            let moved = self
                .vertex_orig
                .pop()
                .expect("vertex index array empty during compaction");
            self.vertex_orig[i2 as usize] = moved;
            self.adjacency.move_last_into(i2);
            let moved = self
                .quadrics
                .pop()
                .expect("quadric array empty during compaction");
            self.quadrics[i2 as usize] = moved;
        }
    }
}
