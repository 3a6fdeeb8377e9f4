use ahash::AHashMap;
use rayon::prelude::*;

/// Incidence index from each live vertex to the triangles containing
/// it, mapping the triangle index to the corner position holding the
/// vertex.
///
/// The index never reads the triangle array itself; callers pass the
/// vertex triples of the triangles involved in every update, and the
/// invariant `triangles[t][vtri[v][t]] == v` holds between operations.
#[derive(Debug, Default)]
pub struct Adjacency {
    vtri: Vec<AHashMap<u32, u8>>,
}

impl Adjacency {
    pub fn new(vertex_count: usize) -> Self {
        Adjacency {
            vtri: vec![AHashMap::new(); vertex_count],
        }
    }

    pub fn add_triangle(&mut self, t: u32, corners: [u32; 3]) {
        for (c, &v) in corners.iter().enumerate() {
            self.vtri[v as usize].insert(t, c as u8);
        }
    }

    pub fn remove_triangle(&mut self, t: u32, corners: [u32; 3]) {
        for &v in &corners {
            self.vtri[v as usize].remove(&t);
        }
    }

    pub fn contains(&self, v: u32, t: u32) -> bool {
        self.vtri[v as usize].contains_key(&t)
    }

    /// Triangles incident to `v` with the corner holding it, in
    /// ascending triangle order. Hash maps do not iterate in a stable
    /// order; sorting keeps the contraction history deterministic.
    pub fn incident_sorted(&self, v: u32) -> Vec<(u32, u8)> {
        let mut out: Vec<(u32, u8)> = self.vtri[v as usize]
            .iter()
            .map(|(&t, &c)| (t, c))
            .collect();
        out.sort_unstable_by_key(|&(t, _)| t);
        out
    }

    /// Move the back-reference for triangle `t` from `old_v` to
    /// `new_v`, keeping the corner position.
    pub fn rewrite_corner(&mut self, t: u32, old_v: u32, new_v: u32) {
        let c = self.vtri[old_v as usize]
            .remove(&t)
            .unwrap_or_else(|| panic!("triangle {t} is not incident to vertex {old_v}"));
        self.vtri[new_v as usize].insert(t, c);
    }

    /// Exchange two triangle slots. `corners1` and `corners2` are the
    /// vertex triples currently stored at `t1` and `t2`.
    pub fn swap_triangles(&mut self, t1: u32, t2: u32, corners1: [u32; 3], corners2: [u32; 3]) {
        if t1 == t2 {
            return;
        }
        let mut vertices: Vec<u32> = corners1.iter().chain(corners2.iter()).copied().collect();
        vertices.sort_unstable();
        vertices.dedup();
        for v in vertices {
            let map = &mut self.vtri[v as usize];
            match (map.remove(&t1), map.remove(&t2)) {
                (Some(c1), Some(c2)) => {
                    map.insert(t1, c2);
                    map.insert(t2, c1);
                }
                (Some(c1), None) => {
                    map.insert(t2, c1);
                }
                (None, Some(c2)) => {
                    map.insert(t1, c2);
                }
                (None, None) => panic!("vertex {v} is incident to neither swapped triangle"),
            }
        }
    }

    /// Vertex compaction: move the last vertex's incidence map into
    /// slot `dst`, whose own map must already be empty.
    pub fn move_last_into(&mut self, dst: u32) {
        let moved = self.vtri.pop().expect("no vertex slots left to move");
        let old = std::mem::replace(&mut self.vtri[dst as usize], moved);
        assert!(
            old.is_empty(),
            "vertex slot {dst} still has incident triangles"
        );
    }

    /// Drop the last vertex slot, which must have no incident
    /// triangles left.
    pub fn pop_isolated_last(&mut self) {
        let last = self.vtri.pop().expect("no vertex slots left to pop");
        assert!(last.is_empty(), "dropped vertex still has incident triangles");
    }

    /// Both directions of the incidence invariant: every back-reference
    /// resolves through the triangle array, and every triangle corner
    /// resolves back.
    pub fn is_consistent(&self, triangles: &[[u32; 3]]) -> bool {
        let forward = self.vtri.par_iter().enumerate().all(|(v, map)| {
            map.iter().all(|(&t, &c)| {
                triangles
                    .get(t as usize)
                    .is_some_and(|tri| tri[c as usize] == v as u32)
            })
        });
        let backward = triangles.par_iter().enumerate().all(|(t, tri)| {
            tri.iter().enumerate().all(|(c, &v)| {
                self.vtri
                    .get(v as usize)
                    .is_some_and(|map| map.get(&(t as u32)) == Some(&(c as u8)))
            })
        });
        forward && backward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let triangles = vec![[0u32, 1, 2], [1, 3, 2]];
        let mut adjacency = Adjacency::new(4);
        for (t, tri) in triangles.iter().enumerate() {
            adjacency.add_triangle(t as u32, *tri);
        }
        assert!(adjacency.is_consistent(&triangles));
        assert_eq!(adjacency.incident_sorted(1), vec![(0, 1), (1, 0)]);
        assert_eq!(adjacency.incident_sorted(2), vec![(0, 2), (1, 2)]);
    }

    #[test]
    fn test_swap_and_remove() {
        let mut triangles = vec![[0u32, 1, 2], [1, 3, 2], [3, 4, 2]];
        let mut adjacency = Adjacency::new(5);
        for (t, tri) in triangles.iter().enumerate() {
            adjacency.add_triangle(t as u32, *tri);
        }

        adjacency.swap_triangles(0, 2, triangles[0], triangles[2]);
        triangles.swap(0, 2);
        assert!(adjacency.is_consistent(&triangles));

        let last = triangles.pop().unwrap();
        adjacency.remove_triangle(2, last);
        assert!(adjacency.is_consistent(&triangles));
    }

    #[test]
    fn test_rewrite_corner() {
        let mut triangles = vec![[0u32, 1, 2]];
        let mut adjacency = Adjacency::new(4);
        adjacency.add_triangle(0, triangles[0]);

        adjacency.rewrite_corner(0, 1, 3);
        triangles[0][1] = 3;
        assert!(adjacency.is_consistent(&triangles));
        assert!(adjacency.incident_sorted(1).is_empty());
    }
}
