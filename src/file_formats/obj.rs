use std::{error::Error, fmt, io::BufRead};

use glam::{Vec2, Vec3};

/// Face corner with all indices resolved to 0-based positions in the
/// attribute arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceVertex {
    pub position: usize,
    pub texcoord: Option<usize>,
    pub normal: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct Face {
    pub vertices: [FaceVertex; 3],
}

/// A run of faces belonging to one `g`/`o`/`usemtl` group.
#[derive(Debug, Clone)]
pub struct Surface {
    pub name: String,
    pub face_begin: usize,
    pub face_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Obj {
    pub positions: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub faces: Vec<Face>,
    pub surfaces: Vec<Surface>,
}

#[derive(Debug)]
pub enum ObjError {
    Io(std::io::Error),
    Parse { line: usize, message: String },
}

impl fmt::Display for ObjError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "i/o error: {err}"),
            Self::Parse { line, message } => write!(f, "line {line}: {message}"),
        }
    }
}
impl Error for ObjError {}

impl From<std::io::Error> for ObjError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

// Open surface run while parsing; only committed once it holds faces, so
// consecutive grouping statements do not leave empty surfaces behind.
struct SurfaceRun {
    name: String,
    face_begin: usize,
}

impl Obj {
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ObjError> {
        let mut obj = Self::default();
        let mut run = SurfaceRun {
            name: String::new(),
            face_begin: 0,
        };

        for (number, line) in reader.lines().enumerate() {
            let number = number + 1;
            let line = line?;
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut parts = trimmed.split_whitespace();
            let Some(keyword) = parts.next() else {
                continue;
            };

            match keyword {
                "v" => obj.positions.push(read_vec3(parts, number)?),
                "vt" => obj.texcoords.push(read_vec2(parts, number)?),
                "vn" => obj.normals.push(read_vec3(parts, number)?),
                "f" => obj.read_face(parts, number)?,
                "g" | "o" => {
                    let name = parts.next().unwrap_or_default().to_string();
                    obj.close_run(&mut run, name);
                }
                "usemtl" => {
                    // A material change splits the surface but keeps its name
                    let name = run.name.clone();
                    obj.close_run(&mut run, name);
                }
                _ => {
                    // mtllib, s, and anything else we do not resolve
                }
            }
        }

        let name = run.name.clone();
        obj.close_run(&mut run, name);

        Ok(obj)
    }

    fn close_run(&mut self, run: &mut SurfaceRun, next_name: String) {
        if self.faces.len() > run.face_begin {
            self.surfaces.push(Surface {
                name: std::mem::take(&mut run.name),
                face_begin: run.face_begin,
                face_count: self.faces.len() - run.face_begin,
            });
        }
        run.name = next_name;
        run.face_begin = self.faces.len();
    }

    fn read_face<'a>(
        &mut self,
        parts: impl Iterator<Item = &'a str>,
        number: usize,
    ) -> Result<(), ObjError> {
        let mut corners = Vec::new();
        for corner in parts {
            corners.push(self.read_face_vertex(corner, number)?);
        }

        if corners.len() < 3 {
            return Err(ObjError::Parse {
                line: number,
                message: format!("face needs at least 3 vertices, got {}", corners.len()),
            });
        }

        // Fan triangulation around the first corner
        for i in 1..corners.len() - 1 {
            self.faces.push(Face {
                vertices: [corners[0], corners[i], corners[i + 1]],
            });
        }

        Ok(())
    }

    fn read_face_vertex(&self, corner: &str, number: usize) -> Result<FaceVertex, ObjError> {
        let mut parts = corner.split('/');

        let position_str = parts.next().unwrap_or_default();
        if position_str.is_empty() {
            return Err(ObjError::Parse {
                line: number,
                message: format!("face vertex \"{corner}\" is missing a position index"),
            });
        }

        let position = resolve_index(position_str, self.positions.len(), "position", number)?;

        let texcoord = parts
            .next()
            .filter(|value| !value.is_empty())
            .map(|value| resolve_index(value, self.texcoords.len(), "texcoord", number))
            .transpose()?;

        let normal = parts
            .next()
            .filter(|value| !value.is_empty())
            .map(|value| resolve_index(value, self.normals.len(), "normal", number))
            .transpose()?;

        Ok(FaceVertex {
            position,
            texcoord,
            normal,
        })
    }
}

fn parse_f32(value: &str, label: &str, number: usize) -> Result<f32, ObjError> {
    value.parse::<f32>().map_err(|err| ObjError::Parse {
        line: number,
        message: format!("invalid {label} \"{value}\": {err}"),
    })
}

fn read_vec3<'a>(
    mut parts: impl Iterator<Item = &'a str>,
    number: usize,
) -> Result<Vec3, ObjError> {
    let mut components = [0f32; 3];
    for component in components.iter_mut() {
        let Some(value) = parts.next() else {
            return Err(ObjError::Parse {
                line: number,
                message: "expected 3 components".to_string(),
            });
        };
        *component = parse_f32(value, "component", number)?;
    }
    // Extra components (e.g. a w coordinate) are tolerated
    Ok(Vec3::from_array(components))
}

fn read_vec2<'a>(
    mut parts: impl Iterator<Item = &'a str>,
    number: usize,
) -> Result<Vec2, ObjError> {
    let mut components = [0f32; 2];
    for component in components.iter_mut() {
        let Some(value) = parts.next() else {
            return Err(ObjError::Parse {
                line: number,
                message: "expected 2 components".to_string(),
            });
        };
        *component = parse_f32(value, "component", number)?;
    }
    Ok(Vec2::from_array(components))
}

/// Resolves a 1-based (or negative, counting from the end) OBJ index against
/// the `len` attributes read so far.
fn resolve_index(value: &str, len: usize, label: &str, number: usize) -> Result<usize, ObjError> {
    let raw = value.parse::<isize>().map_err(|err| ObjError::Parse {
        line: number,
        message: format!("invalid {label} index \"{value}\": {err}"),
    })?;

    if raw == 0 {
        return Err(ObjError::Parse {
            line: number,
            message: format!("{label} index 0 (indices are 1-based)"),
        });
    }

    let len = len as isize;
    let resolved = if raw > 0 { raw - 1 } else { len + raw };

    if resolved < 0 || resolved >= len {
        return Err(ObjError::Parse {
            line: number,
            message: format!("{label} index {raw} out of range ({len} available)"),
        });
    }

    Ok(resolved as usize)
}
