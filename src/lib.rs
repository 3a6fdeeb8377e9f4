//! Progressive-mesh simplification: greedy quadric-error edge
//! contraction with a reversible history, and the vertex-split stream
//! that replays the history back into the original mesh.

mod adjacency;
mod attributes;
pub mod creation;
mod mesh;
pub mod pm;
mod progress;
mod quadric;
mod queue;
mod simplify;

pub use attributes::{AttributeTable, AttributeValue};
pub use mesh::{ChannelData, MeshData};
pub use pm::{apply_entries, AttrSlot, PmEntry};
pub use progress::{NoProgress, Progress};
pub use quadric::Quadric;
pub use simplify::{ContractionRecord, Simplifier};
