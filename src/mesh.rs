use anyhow::{bail, Result};
use nalgebra::Point3;
use rayon::prelude::*;

use crate::attributes::AttributeTable;

/// One per-corner attribute channel: an index triple per triangle
/// pointing into the channel's own source table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelData {
    pub triangles: Vec<[u32; 3]>,
    pub sources: AttributeTable,
}

/// An owned triangle mesh with zero or more per-corner attribute
/// channels. Used both as the simplifier input and as its dense live
/// view.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Point3<f64>>,
    pub triangles: Vec<[u32; 3]>,
    pub channels: Vec<ChannelData>,
}

impl MeshData {
    pub fn new(
        vertices: Vec<Point3<f64>>,
        triangles: Vec<[u32; 3]>,
        channels: Vec<ChannelData>,
    ) -> Result<Self> {
        let mesh = Self {
            vertices,
            triangles,
            channels,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Create a mesh with no attribute channels from flat slices of
    /// coordinates and indices.
    pub fn from_slice(vertices: &[f64], triangles: &[u32]) -> Result<Self> {
        if vertices.len() % 3 != 0 {
            bail!("vertex buffer length must be a multiple of 3");
        }
        if triangles.len() % 3 != 0 {
            bail!("triangle buffer length must be a multiple of 3");
        }

        // with nalgebra's bytemuck support a well-aligned coordinate
        // buffer reinterprets directly as points, making the copy a
        // single memcpy; the chunked path covers exotic alignment
        let vertices: Vec<Point3<f64>> = match bytemuck::try_cast_slice::<f64, Point3<f64>>(vertices)
        {
            Ok(points) => points.to_vec(),
            Err(_) => vertices
                .chunks_exact(3)
                .map(|c| Point3::new(c[0], c[1], c[2]))
                .collect(),
        };

        let triangles = triangles
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();

        Self::new(vertices, triangles, Vec::new())
    }

    /// Reject structurally malformed input before any engine state is
    /// built: out-of-range or repeated indices, or channels whose
    /// triangle count does not match the mesh.
    pub fn validate(&self) -> Result<()> {
        if self.vertices.len() > u32::MAX as usize || self.triangles.len() > u32::MAX as usize {
            bail!("mesh exceeds the u32 index range");
        }

        let vertex_count = self.vertices.len() as u32;
        if !self
            .triangles
            .par_iter()
            .all(|t| t.iter().all(|&v| v < vertex_count))
        {
            bail!("triangle references an out-of-range vertex");
        }
        if !self
            .triangles
            .par_iter()
            .all(|t| t[0] != t[1] && t[1] != t[2] && t[0] != t[2])
        {
            bail!("triangle repeats a vertex index");
        }

        for (k, channel) in self.channels.iter().enumerate() {
            if channel.triangles.len() != self.triangles.len() {
                bail!(
                    "channel {k} has {} attribute triples for {} triangles",
                    channel.triangles.len(),
                    self.triangles.len()
                );
            }
            if channel.sources.len() > u32::MAX as usize {
                bail!("channel {k} exceeds the u32 index range");
            }
            let source_count = channel.sources.len() as u32;
            if !channel
                .triangles
                .par_iter()
                .all(|t| t.iter().all(|&a| a < source_count))
            {
                bail!("channel {k} references an out-of-range attribute source");
            }

            // every source must be referenced; the engine maintains
            // non-empty incidence for each live source
            let mut referenced = vec![false; channel.sources.len()];
            for triple in &channel.triangles {
                for &a in triple {
                    referenced[a as usize] = true;
                }
            }
            if !referenced.iter().all(|&r| r) {
                bail!("channel {k} has attribute sources referenced by no triangle");
            }
        }
        Ok(())
    }
}
