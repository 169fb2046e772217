use std::{collections::HashMap, error::Error, fs::File, io::BufReader, path::Path};

use glam::{Vec2, Vec3};

use crate::{
    file_formats::obj::{Obj, Surface},
    geom::{BoundingBox, MeshVertex},
    model::{MeshSource, ModelError},
};

/// Wraps a parsed [`Obj`] and assembles one mesh per surface: face corners
/// are flattened in face order, with identical corners (same position,
/// texcoord and normal indices) deduplicated within the surface.
#[derive(Debug, Clone)]
pub struct ObjModel {
    file: Obj,
}

impl ObjModel {
    pub fn new(file: Obj) -> Self {
        Self { file }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let reader = BufReader::new(File::open(path)?);
        Ok(Self::new(Obj::from_reader(reader)?))
    }

    pub fn surface_name(&self, surface: usize) -> Result<&str, ModelError> {
        Ok(&self.surface(surface)?.name)
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

    fn assemble(&self, surface: usize) -> Result<(Vec<MeshVertex>, Vec<u16>), ModelError> {
        let surf = self.surface(surface)?;
        let faces = &self.file.faces[surf.face_begin..surf.face_begin + surf.face_count];

        let mut vertices = Vec::new();
        let mut indices = Vec::with_capacity(faces.len() * 3);
        let mut corner_ids = HashMap::new();

        for face in faces {
            for corner in &face.vertices {
                let id = match corner_ids.get(corner) {
                    Some(&id) => id,
                    None => {
                        let id = u16::try_from(vertices.len())
                            .map_err(|_| ModelError::TooManyVertices { surface })?;

                        // Indices were range checked at parse time; missing
                        // attributes fall back to zero.
                        vertices.push(MeshVertex::new(
                            self.file.positions[corner.position],
                            corner
                                .normal
                                .map_or(Vec3::ZERO, |i| self.file.normals[i]),
                            corner
                                .texcoord
                                .map_or(Vec2::ZERO, |i| self.file.texcoords[i]),
                        ));
                        corner_ids.insert(*corner, id);
                        id
                    }
                };
                indices.push(id);
            }
        }

        Ok((vertices, indices))
    }
}

impl MeshSource for ObjModel {
    fn mesh_count(&self) -> usize {
        self.file.surfaces.len()
    }

    fn vertices(&self, surface: usize) -> Result<Vec<MeshVertex>, ModelError> {
        Ok(self.assemble(surface)?.0)
    }

    fn indices(&self, surface: usize) -> Result<Vec<u16>, ModelError> {
        Ok(self.assemble(surface)?.1)
    }

    fn bounds(&self) -> BoundingBox {
        BoundingBox::from_points(
            self.file
                .faces
                .iter()
                .flat_map(|face| face.vertices.iter())
                .map(|corner| self.file.positions[corner.position]),
        )
    }
}
