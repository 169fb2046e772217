pub mod md3_model;
pub mod obj_model;

pub use md3_model::Md3Model;
pub use obj_model::ObjModel;

use std::{error::Error, fmt};

use crate::geom::{BoundingBox, MeshVertex};

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
//                                     Errors arising when assembling meshes                                         //
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone)]
pub enum ModelError {
    SurfaceOutOfRange { surface: usize, count: usize },
    FrameOutOfRange { frame: usize, count: usize },
    IndexOutOfRange { surface: usize, index: u32, verts: u32 },
    TooManyVertices { surface: usize },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SurfaceOutOfRange { surface, count } => {
                write!(f, "surface {surface} out of range ({count} surfaces)")
            }
            Self::FrameOutOfRange { frame, count } => {
                write!(f, "frame {frame} out of range ({count} frames)")
            }
            Self::IndexOutOfRange {
                surface,
                index,
                verts,
            } => write!(
                f,
                "surface {surface}: triangle index {index} out of range ({verts} vertices)"
            ),
            Self::TooManyVertices { surface } => {
                write!(f, "surface {surface}: too many vertices for 16-bit indices")
            }
        }
    }
}
impl Error for ModelError {}

/// A decoded model that can hand out mesh arrays, one mesh per surface.
pub trait MeshSource {
    fn mesh_count(&self) -> usize;

    /// Interleaved vertices for one surface.
    fn vertices(&self, surface: usize) -> Result<Vec<MeshVertex>, ModelError>;

    /// Flat triangle index triples into the surface's vertex array.
    fn indices(&self, surface: usize) -> Result<Vec<u16>, ModelError>;

    /// Bounds of the whole model (for animated formats, of its rest frame).
    fn bounds(&self) -> BoundingBox;
}
