use glam::{Vec2, Vec3};

/// Interleaved vertex format shared by every loader output.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct MeshVertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub texcoord: Vec2,
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3, texcoord: Vec2) -> Self {
        Self {
            position,
            normal: normal.normalize_or_zero(),
            texcoord,
        }
    }
}
