//! Progressive-mesh stream generation and application.
//!
//! The simplifier's history is walked in reverse and re-expressed in
//! terms of the live indices of the simplified mesh, yielding a list
//! of vertex-split records. Applying the records in order to the
//! simplified mesh restores the original mesh exactly, up to the index
//! relabeling implied by the splits.

use nalgebra::Point3;

use crate::attributes::AttributeValue;
use crate::mesh::MeshData;
use crate::simplify::Simplifier;

/// One slot of a reintroduced triangle's attribute triple: either a
/// live index into the channel's source table, or a source value that
/// becomes live (at the next free index) when this slot is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttrSlot {
    Index(u32),
    Source(AttributeValue),
}

/// A vertex-split record, the inverse of one edge contraction.
#[derive(Debug, Clone, PartialEq)]
pub struct PmEntry {
    /// Live vertex index to split from.
    pub split_index: u32,
    /// Position of the reintroduced vertex.
    pub restored_position: Point3<f64>,
    /// Surviving triangles whose corner flips back to the new vertex.
    pub changed_triangles: Vec<u32>,
    /// Live opposite-vertex index per reintroduced triangle.
    pub new_opposite: Vec<u32>,
    /// Winding flip bit per reintroduced triangle.
    pub new_flip: Vec<bool>,
    /// Per channel, per reintroduced triangle, the attribute triple.
    pub new_attr: Vec<Vec<[AttrSlot; 3]>>,
}

const NOT_LIVE: u32 = u32::MAX;

/// Permutations (source, target, opposite) under which the
/// reintroduced triangle's winding must be flipped to match the
/// original: exactly the odd permutations of (0, 1, 2).
fn is_odd_permutation(perm: [u8; 3]) -> bool {
    matches!(perm, [0, 2, 1] | [2, 1, 0] | [1, 0, 2])
}

pub(crate) fn generate(simplifier: &Simplifier) -> Vec<PmEntry> {
    // original -> live translation tables, extended as the reverse
    // walk reintroduces vertices, triangles, and sources
    let mut new_v = vec![NOT_LIVE; simplifier.original_vertices.len()];
    for (live, &orig) in simplifier.vertex_orig.iter().enumerate() {
        new_v[orig as usize] = live as u32;
    }
    let mut num_v = simplifier.vertex_orig.len() as u32;

    let mut new_t = vec![NOT_LIVE; simplifier.original_triangle_count];
    for (live, &orig) in simplifier.triangle_orig.iter().enumerate() {
        new_t[orig as usize] = live as u32;
    }
    let mut num_t = simplifier.triangle_orig.len() as u32;

    let mut new_a: Vec<Vec<u32>> = simplifier
        .channels
        .iter()
        .map(|channel| {
            let mut map = vec![NOT_LIVE; channel.original_sources.len()];
            for (live, &orig) in channel.source_orig.iter().enumerate() {
                map[orig as usize] = live as u32;
            }
            map
        })
        .collect();
    let mut num_a: Vec<u32> = simplifier
        .channels
        .iter()
        .map(|channel| channel.sources.len() as u32)
        .collect();

    let mut entries = Vec::with_capacity(simplifier.history.len());
    for record in simplifier.history.iter().rev() {
        let split_index = new_v[record.target as usize];
        assert_ne!(
            split_index, NOT_LIVE,
            "history names a dead split vertex {}",
            record.target
        );
        let restored_position = simplifier.original_vertices[record.source as usize];

        let changed_triangles = record
            .changed_triangles
            .iter()
            .map(|&orig| {
                let live = new_t[orig as usize];
                assert_ne!(live, NOT_LIVE, "history names a dead changed triangle {orig}");
                live
            })
            .collect();
        let new_opposite = record
            .deleted_opposite
            .iter()
            .map(|&orig| {
                let live = new_v[orig as usize];
                assert_ne!(live, NOT_LIVE, "history names a dead opposite vertex {orig}");
                live
            })
            .collect();

        let mut new_flip = Vec::with_capacity(record.deleted_perm.len());
        let mut new_attr: Vec<Vec<[AttrSlot; 3]>> =
            vec![Vec::with_capacity(record.deleted_perm.len()); simplifier.channels.len()];
        for (j, &perm) in record.deleted_perm.iter().enumerate() {
            let flip = is_odd_permutation(perm);
            new_flip.push(flip);

            let tri_orig = record.deleted_triangles[j] as usize;
            let [s, t, o] = perm;
            // corner order of the reintroduced triangle; corner 0 is
            // the split vertex when flipped, the new vertex otherwise
            let order = if flip { [t, s, o] } else { [s, t, o] };
            for (k, channel) in simplifier.channels.iter().enumerate() {
                let triple = channel.original_triangles[tri_orig];
                let mut slots = [AttrSlot::Index(0); 3];
                for (slot, &corner) in slots.iter_mut().zip(order.iter()) {
                    let a = triple[corner as usize] as usize;
                    *slot = if new_a[k][a] == NOT_LIVE {
                        new_a[k][a] = num_a[k];
                        num_a[k] += 1;
                        AttrSlot::Source(channel.original_sources.value_at(a))
                    } else {
                        AttrSlot::Index(new_a[k][a])
                    };
                }
                new_attr[k].push(slots);
            }
        }

        entries.push(PmEntry {
            split_index,
            restored_position,
            changed_triangles,
            new_opposite,
            new_flip,
            new_attr,
        });

        new_v[record.source as usize] = num_v;
        num_v += 1;
        for &tri_orig in &record.deleted_triangles {
            new_t[tri_orig as usize] = num_t;
            num_t += 1;
        }
    }
    entries
}

/// Replay a progressive-mesh stream onto its simplified base mesh,
/// restoring the vertices, triangles, and attribute sources the
/// contractions removed.
pub fn apply_entries(mesh: &mut MeshData, entries: &[PmEntry]) {
    for entry in entries {
        assert_eq!(
            entry.new_attr.len(),
            mesh.channels.len(),
            "entry channel count does not match the mesh"
        );

        let new_vertex = mesh.vertices.len() as u32;
        mesh.vertices.push(entry.restored_position);

        for &t in &entry.changed_triangles {
            let tri = &mut mesh.triangles[t as usize];
            let corner = tri
                .iter()
                .position(|&v| v == entry.split_index)
                .unwrap_or_else(|| panic!("changed triangle {t} does not touch the split vertex"));
            tri[corner] = new_vertex;
        }

        for (j, (&opposite, &flip)) in entry.new_opposite.iter().zip(&entry.new_flip).enumerate() {
            mesh.triangles.push(if flip {
                [entry.split_index, new_vertex, opposite]
            } else {
                [new_vertex, entry.split_index, opposite]
            });
            for (k, channel) in mesh.channels.iter_mut().enumerate() {
                let slots = entry.new_attr[k][j];
                let mut triple = [0u32; 3];
                for (dst, slot) in triple.iter_mut().zip(slots.iter()) {
                    *dst = match *slot {
                        AttrSlot::Index(index) => index,
                        AttrSlot::Source(value) => {
                            let index = channel.sources.len() as u32;
                            channel.sources.push_value(value);
                            index
                        }
                    };
                }
                channel.triangles.push(triple);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributeTable, AttributeValue};
    use crate::creation::{create_box, create_icosahedron, create_tetrahedron};
    use crate::mesh::ChannelData;
    use nalgebra::{Vector2, Vector3};

    fn value_bits(value: AttributeValue) -> Vec<u64> {
        match value {
            AttributeValue::Uv(v) => vec![v.x.to_bits(), v.y.to_bits()],
            AttributeValue::Normal(v) => vec![v.x.to_bits(), v.y.to_bits(), v.z.to_bits()],
            AttributeValue::Color(v) => v.iter().map(|&c| c as u64).collect(),
        }
    }

    // Encode a triangle (corner positions plus per-channel corner
    // values) as the lexicographically smallest of its three
    // rotations. Positions flow through contraction and splitting
    // untouched, so two meshes compare bit-exactly as multisets up to
    // index relabeling, while reversed winding still shows up as a
    // difference.
    fn canonical_triangles(mesh: &MeshData) -> Vec<Vec<u64>> {
        let mut out: Vec<Vec<u64>> = mesh
            .triangles
            .iter()
            .enumerate()
            .map(|(t, tri)| {
                let corner = |c: usize| -> Vec<u64> {
                    let p = mesh.vertices[tri[c] as usize];
                    let mut bits = vec![p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
                    for channel in &mesh.channels {
                        let a = channel.triangles[t][c] as usize;
                        bits.extend(value_bits(channel.sources.value_at(a)));
                    }
                    bits
                };
                (0..3)
                    .map(|r| {
                        let mut encoded = Vec::new();
                        for c in 0..3 {
                            encoded.extend(corner((c + r) % 3));
                        }
                        encoded
                    })
                    .min()
                    .unwrap()
            })
            .collect();
        out.sort();
        out
    }

    fn canonical_vertices(mesh: &MeshData) -> Vec<[u64; 3]> {
        let mut out: Vec<[u64; 3]> = mesh
            .vertices
            .iter()
            .map(|p| [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()])
            .collect();
        out.sort();
        out
    }

    /// Simplify by up to `steps` contractions, emit the PM, apply it
    /// to the simplified mesh, and require the original back.
    fn assert_round_trip(original: &MeshData, steps: usize) {
        let mut simplifier = Simplifier::new(original.clone()).unwrap();
        let mut applied = 0usize;
        while applied < steps && simplifier.contract_once() {
            applied += 1;
        }
        let entries = simplifier.generate_pm();
        assert_eq!(entries.len(), applied);

        let mut mesh = simplifier.current_mesh();
        apply_entries(&mut mesh, &entries);

        assert_eq!(canonical_vertices(&mesh), canonical_vertices(original));
        assert_eq!(canonical_triangles(&mesh), canonical_triangles(original));
    }

    fn seam_pair() -> MeshData {
        let mut mesh = MeshData::from_slice(
            &[
                0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, //
                1.0, 1.0, 0.0,
            ],
            &[0, 1, 2, 1, 3, 2],
        )
        .unwrap();
        // a fully split UV seam: each triangle carries its own sources
        mesh.channels.push(ChannelData {
            triangles: vec![[0, 1, 2], [3, 4, 5]],
            sources: AttributeTable::Uv(vec![
                Vector2::new(0.0, 0.0),
                Vector2::new(1.0, 0.0),
                Vector2::new(0.0, 1.0),
                Vector2::new(0.9, 0.1),
                Vector2::new(0.9, 0.9),
                Vector2::new(0.1, 0.9),
            ]),
        });
        // an independent per-vertex normal channel
        mesh.channels.push(ChannelData {
            triangles: vec![[0, 1, 2], [1, 3, 2]],
            sources: AttributeTable::Normal(vec![
                Vector3::new(0.0, 0.0, 1.0),
                Vector3::new(0.1, 0.0, 1.0),
                Vector3::new(0.0, 0.1, 1.0),
                Vector3::new(0.1, 0.1, 1.0),
            ]),
        });
        mesh
    }

    #[test]
    fn test_odd_permutations_flip() {
        assert!(is_odd_permutation([0, 2, 1]));
        assert!(is_odd_permutation([2, 1, 0]));
        assert!(is_odd_permutation([1, 0, 2]));
        assert!(!is_odd_permutation([0, 1, 2]));
        assert!(!is_odd_permutation([1, 2, 0]));
        assert!(!is_odd_permutation([2, 0, 1]));
    }

    #[test]
    fn test_tetrahedron_single_step_round_trip() {
        assert_round_trip(&create_tetrahedron(), 1);
    }

    #[test]
    fn test_tetrahedron_full_drain_round_trip() {
        assert_round_trip(&create_tetrahedron(), usize::MAX);
    }

    #[test]
    fn test_strip_round_trip_at_every_depth() {
        let mesh = MeshData::from_slice(
            &[
                0.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, //
                1.0, 1.0, 0.0, //
                2.0, 0.0, 0.0, //
                2.0, 1.0, 0.0,
            ],
            &[0, 1, 2, 1, 3, 2, 1, 4, 3, 4, 5, 3],
        )
        .unwrap();
        for steps in 1..=8 {
            assert_round_trip(&mesh, steps);
        }
    }

    #[test]
    fn test_single_triangle_drain_round_trip() {
        let mesh =
            MeshData::from_slice(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], &[0, 1, 2])
                .unwrap();
        assert_round_trip(&mesh, usize::MAX);
    }

    #[test]
    fn test_seam_round_trip() {
        let mesh = seam_pair();
        assert_round_trip(&mesh, 1);
        assert_round_trip(&mesh, usize::MAX);
    }

    #[test]
    fn test_box_full_drain_round_trip() {
        assert_round_trip(&create_box(&[1.0, 2.0, 3.0]), usize::MAX);
    }

    #[test]
    fn test_icosahedron_full_drain_round_trip() {
        assert_round_trip(&create_icosahedron(), usize::MAX);
    }

    #[test]
    fn test_pm_split_indices_are_live() {
        let mut simplifier = Simplifier::new(create_icosahedron()).unwrap();
        simplifier.contract_to(8);
        let entries = simplifier.generate_pm();

        // every split index must be resolvable against the mesh state
        // at its point in the replay
        let mut vertex_count = simplifier.vertex_count() as u32;
        for entry in &entries {
            assert!(entry.split_index < vertex_count);
            vertex_count += 1;
        }
    }
}

