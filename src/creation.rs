//! Deterministic fixture meshes.

use crate::mesh::MeshData;

/// Create a closed box mesh centered at the origin with the given
/// axis-aligned extents. Every edge is shared by exactly two of its
/// 12 triangles.
pub fn create_box(extents: &[f64; 3]) -> MeshData {
    let h = [extents[0] / 2.0, extents[1] / 2.0, extents[2] / 2.0];

    // corner i sits on the positive side of axis k iff bit k of i is set
    let mut vertices = Vec::with_capacity(24);
    for corner in 0..8u32 {
        for (axis, half) in h.iter().enumerate() {
            let sign = if corner >> axis & 1 == 1 { 1.0 } else { -1.0 };
            vertices.push(sign * half);
        }
    }

    // each face as a quad wound counter-clockwise seen from outside,
    // split along its 0-2 diagonal
    let quads: [[u32; 4]; 6] = [
        [0, 2, 3, 1], // z = -h
        [4, 5, 7, 6], // z = +h
        [0, 1, 5, 4], // y = -h
        [2, 6, 7, 3], // y = +h
        [0, 4, 6, 2], // x = -h
        [1, 3, 7, 5], // x = +h
    ];
    let mut triangles = Vec::with_capacity(36);
    for [a, b, c, d] in quads {
        triangles.extend([a, b, c, a, c, d]);
    }

    MeshData::from_slice(&vertices, &triangles).unwrap()
}

/// The unit-corner tetrahedron: four vertices, four triangles.
pub fn create_tetrahedron() -> MeshData {
    MeshData::from_slice(
        &[
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0,
        ],
        &[
            0, 1, 2, //
            0, 1, 3, //
            0, 2, 3, //
            1, 2, 3,
        ],
    )
    .unwrap()
}

/// A regular icosahedron: 12 vertices, 20 triangles, closed.
pub fn create_icosahedron() -> MeshData {
    // golden ratio
    let t = (1.0 + 5.0_f64.sqrt()) / 2.0;

    let vertices = vec![
        -1.0, t, 0.0, //
        1.0, t, 0.0, //
        -1.0, -t, 0.0, //
        1.0, -t, 0.0, //
        0.0, -1.0, t, //
        0.0, 1.0, t, //
        0.0, -1.0, -t, //
        0.0, 1.0, -t, //
        t, 0.0, -1.0, //
        t, 0.0, 1.0, //
        -t, 0.0, -1.0, //
        -t, 0.0, 1.0,
    ];

    let triangles = vec![
        0, 11, 5, 0, 5, 1, 0, 1, 7, 0, 7, 10, 0, 10, 11, //
        1, 5, 9, 5, 11, 4, 11, 10, 2, 10, 7, 6, 7, 1, 8, //
        3, 9, 4, 3, 4, 2, 3, 2, 6, 3, 6, 8, 3, 8, 9, //
        4, 9, 5, 2, 4, 11, 6, 2, 10, 8, 6, 7, 9, 8, 1,
    ];

    MeshData::from_slice(&vertices, &triangles).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashMap;

    // every undirected edge of a closed mesh belongs to exactly two
    // triangles
    fn edge_counts(mesh: &MeshData) -> AHashMap<(u32, u32), usize> {
        let mut counts = AHashMap::new();
        for tri in &mesh.triangles {
            for (a, b) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[0], tri[2])] {
                let key = (a.min(b), a.max(b));
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        counts
    }

    #[test]
    fn test_box_is_closed() {
        let mesh = create_box(&[1.0, 1.0, 1.0]);
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.triangles.len(), 12);
        let counts = edge_counts(&mesh);
        assert_eq!(counts.len(), 18);
        assert!(counts.values().all(|&c| c == 2));
    }

    #[test]
    fn test_tetrahedron_is_closed() {
        let mesh = create_tetrahedron();
        assert_eq!(mesh.triangles.len(), 4);
        let counts = edge_counts(&mesh);
        assert_eq!(counts.len(), 6);
        assert!(counts.values().all(|&c| c == 2));
    }

    #[test]
    fn test_icosahedron_is_closed() {
        let mesh = create_icosahedron();
        assert_eq!(mesh.vertices.len(), 12);
        assert_eq!(mesh.triangles.len(), 20);
        let counts = edge_counts(&mesh);
        assert_eq!(counts.len(), 30);
        assert!(counts.values().all(|&c| c == 2));
    }
}
