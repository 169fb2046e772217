use std::{error::Error, fs, io::Cursor, path::Path};

use glam::{Vec2, Vec3};

use crate::{
    file_formats::md3::{decode_normal, Frame, Md3, Surface, Tag, MD3_XYZ_SCALE},
    geom::{BoundingBox, MeshVertex},
    model::{MeshSource, ModelError},
};

/// Wraps a decoded [`Md3`] and assembles renderable mesh arrays from it:
/// quantized positions are scaled to world units, packed normals decoded and
/// texture coordinates paired up by vertex index.
#[derive(Debug, Clone)]
pub struct Md3Model {
    file: Md3,
}

impl Md3Model {
    pub fn new(file: Md3) -> Self {
        Self { file }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let data = fs::read(path)?;
        Ok(Self::new(Md3::from_reader(&mut Cursor::new(&data))?))
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }

    pub fn frame_count(&self) -> usize {
        self.file.frames.len()
    }

    pub fn frame(&self, frame: usize) -> Result<&Frame, ModelError> {
        self.file.frames.get(frame).ok_or(ModelError::FrameOutOfRange {
            frame,
            count: self.file.frames.len(),
        })
    }

    pub fn tags(&self) -> &[Tag] {
        &self.file.tags
    }

    pub fn surface_name(&self, surface: usize) -> Result<&str, ModelError> {
        Ok(&self.surface(surface)?.name)
    }

    /// Interleaved vertices of `surface` in animation frame `frame`.
    pub fn vertices_at(&self, surface: usize, frame: usize) -> Result<Vec<MeshVertex>, ModelError> {
        let surf = self.surface(surface)?;
        let frames = surf.num_frames as usize;
        if frame >= frames {
            return Err(ModelError::FrameOutOfRange {
                frame,
                count: frames,
            });
        }

        let verts = surf.num_verts as usize;
        let base = frame * verts;

        let mut out = Vec::with_capacity(verts);
        for i in 0..verts {
            let record = &surf.vertices[base + i];
            let st = &surf.texcoords[i];
            out.push(MeshVertex::new(
                Vec3::new(record.x as f32, record.y as f32, record.z as f32) * MD3_XYZ_SCALE,
                decode_normal(record.normal),
                Vec2::new(st.u, st.v),
            ));
        }
        Ok(out)
    }

    /// Bounds of one animation frame, as recorded in the file.
    pub fn bounds_at(&self, frame: usize) -> Result<BoundingBox, ModelError> {
        let frame = self.frame(frame)?;
        Ok(BoundingBox::new(frame.min_bounds, frame.max_bounds))
    }

    fn surface(&self, surface: usize) -> Result<&Surface, ModelError> {
        self.file
            .surfaces
            .get(surface)
            .ok_or(ModelError::SurfaceOutOfRange {
                surface,
                count: self.file.surfaces.len(),
            })
    }
}

impl MeshSource for Md3Model {
    fn mesh_count(&self) -> usize {
        self.file.surfaces.len()
    }

    fn vertices(&self, surface: usize) -> Result<Vec<MeshVertex>, ModelError> {
        self.vertices_at(surface, 0)
    }

    fn indices(&self, surface: usize) -> Result<Vec<u16>, ModelError> {
        let surf = self.surface(surface)?;

        let mut out = Vec::with_capacity(surf.triangles.len() * 3);
        for triangle in &surf.triangles {
            for &index in &triangle.indices {
                // The file stores 32-bit indices; the output is 16-bit, so
                // both range checks matter.
                if index >= surf.num_verts || index > u16::MAX as u32 {
                    return Err(ModelError::IndexOutOfRange {
                        surface,
                        index,
                        verts: surf.num_verts,
                    });
                }
                out.push(index as u16);
            }
        }
        Ok(out)
    }

    fn bounds(&self) -> BoundingBox {
        match self.file.frames.first() {
            Some(frame) => BoundingBox::new(frame.min_bounds, frame.max_bounds),
            None => BoundingBox::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_formats::md3::{TexCoord, Triangle, VertexRecord};

    fn record(x: i16, y: i16, z: i16, normal: u16) -> VertexRecord {
        VertexRecord { x, y, z, normal }
    }

    // Two frames, three vertices; frame 1 shifts everything up by 64 units.
    fn two_frame_model() -> Md3Model {
        let frames = vec![
            Frame {
                min_bounds: Vec3::new(-1.0, -1.0, 0.0),
                max_bounds: Vec3::new(2.0, 1.0, 0.5),
                local_origin: Vec3::ZERO,
                radius: 2.0,
                name: "idle".to_string(),
            },
            Frame {
                min_bounds: Vec3::new(-1.0, -1.0, 1.0),
                max_bounds: Vec3::new(2.0, 1.0, 1.5),
                local_origin: Vec3::ZERO,
                radius: 2.0,
                name: "jump".to_string(),
            },
        ];

        let surface = Surface {
            name: "body".to_string(),
            flags: 0,
            num_frames: 2,
            num_verts: 3,
            shaders: Vec::new(),
            triangles: vec![Triangle {
                indices: [0, 1, 2],
            }],
            texcoords: vec![
                TexCoord { u: 0.0, v: 0.0 },
                TexCoord { u: 1.0, v: 0.0 },
                TexCoord { u: 1.0, v: 1.0 },
            ],
            vertices: vec![
                record(0, 0, 0, 0x0000),
                record(64, 0, 0, 0x0040),
                record(128, 64, 0, 0x4040),
                record(0, 0, 64, 0x0000),
                record(64, 0, 64, 0x0040),
                record(128, 64, 64, 0x4040),
            ],
        };

        Md3Model::new(Md3 {
            name: "probe".to_string(),
            frames,
            tags: Vec::new(),
            surfaces: vec![surface],
        })
    }

    #[test]
    fn scales_positions_and_decodes_normals() {
        let model = two_frame_model();
        let verts = model.vertices(0).unwrap();

        assert_eq!(verts.len(), 3);
        assert_eq!(verts[1].position, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(verts[2].position, Vec3::new(2.0, 1.0, 0.0));
        assert!((verts[0].normal - Vec3::Z).length() < 1e-6);
        assert!((verts[1].normal - Vec3::X).length() < 1e-6);
        assert_eq!(verts[2].texcoord, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn extracts_requested_frame() {
        let model = two_frame_model();

        let rest = model.vertices_at(0, 0).unwrap();
        let jump = model.vertices_at(0, 1).unwrap();

        assert_eq!(rest[0].position.z, 0.0);
        assert_eq!(jump[0].position.z, 1.0);
        assert_eq!(rest[1].position.x, jump[1].position.x);
    }

    #[test]
    fn emits_index_triples() {
        let model = two_frame_model();
        assert_eq!(model.indices(0).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn rejects_out_of_range_triangle_index() {
        let mut model = two_frame_model();
        model.file.surfaces[0].triangles.push(Triangle {
            indices: [0, 1, 9],
        });

        let err = model.indices(0).unwrap_err();
        assert!(matches!(err, ModelError::IndexOutOfRange { index: 9, .. }));
    }

    #[test]
    fn rejects_bad_surface_and_frame() {
        let model = two_frame_model();

        assert!(matches!(
            model.vertices(1),
            Err(ModelError::SurfaceOutOfRange { surface: 1, count: 1 })
        ));
        assert!(matches!(
            model.vertices_at(0, 2),
            Err(ModelError::FrameOutOfRange { frame: 2, count: 2 })
        ));
    }

    #[test]
    fn frame_bounds() {
        let model = two_frame_model();

        assert_eq!(model.bounds(), model.bounds_at(0).unwrap());
        assert_eq!(model.bounds_at(1).unwrap().min.z, 1.0);
        assert!(model.bounds_at(2).is_err());
    }
}
