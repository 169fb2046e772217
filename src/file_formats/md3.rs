use binrw::{binread, BinRead};
use byteorder::{ReadBytesExt, LE};
use std::{
    error::Error,
    fmt,
    io::{Read, Seek, SeekFrom},
};

use glam::Vec3;

pub const MD3_MAGIC: [u8; 4] = *b"IDP3";
pub const MD3_VERSION: u32 = 15;

/// Vertex coordinates are stored as 64ths of a world unit.
pub const MD3_XYZ_SCALE: f32 = 1.0 / 64.0;

const LATLNG_SCALE: f32 = std::f32::consts::PI / 128.0;

/// Decodes a spherical coordinate system encoded normal.
/// https://icculus.org/homepages/phaethon/q3a/formats/md3format.html#Normals
/// The high byte is the latitude, the low byte the longitude, each covering
/// [0, 2*PI) in 256 steps.
pub fn decode_normal(packed: u16) -> Vec3 {
    let lat = LATLNG_SCALE * (packed >> 8) as f32;
    let lng = LATLNG_SCALE * (packed & 0xFF) as f32;

    Vec3::new(lat.cos() * lng.sin(), lat.sin() * lng.sin(), lng.cos())
}

// Name fields are fixed-size NUL padded buffers
fn padded_str(raw: &[u8]) -> Result<String, std::string::FromUtf8Error> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8(raw[..end].to_vec())
}

#[binread]
#[br(little)]
#[allow(dead_code)]
struct Header {
    #[br(try_map = |raw: [u8; 64]| padded_str(&raw))]
    name: String,
    flags: i32,
    num_frames: u32,
    num_tags: u32,
    num_surfaces: u32,
    num_skins: u32,
    ofs_frames: u32,
    ofs_tags: u32,
    ofs_surfaces: u32,
    ofs_eof: u32,
}

/// Per-frame metadata: the bounds and origin of the model in that frame.
#[binread]
#[br(little)]
#[derive(Debug, Clone)]
pub struct Frame {
    #[br(map = |raw: [f32; 3]| Vec3::from_array(raw))]
    pub min_bounds: Vec3,
    #[br(map = |raw: [f32; 3]| Vec3::from_array(raw))]
    pub max_bounds: Vec3,
    #[br(map = |raw: [f32; 3]| Vec3::from_array(raw))]
    pub local_origin: Vec3,
    pub radius: f32,
    #[br(try_map = |raw: [u8; 16]| padded_str(&raw))]
    pub name: String,
}

/// Attachment point: an origin and an orthonormal basis.
#[binread]
#[br(little)]
#[derive(Debug, Clone)]
pub struct Tag {
    #[br(try_map = |raw: [u8; 64]| padded_str(&raw))]
    pub name: String,
    #[br(map = |raw: [f32; 3]| Vec3::from_array(raw))]
    pub origin: Vec3,
    #[br(map = |raw: [[f32; 3]; 3]| raw.map(Vec3::from_array))]
    pub axis: [Vec3; 3],
}

#[binread]
#[br(little)]
struct SurfaceHeader {
    #[br(try_map = |raw: [u8; 64]| padded_str(&raw))]
    name: String,
    flags: i32,
    num_frames: u32,
    num_shaders: u32,
    num_verts: u32,
    num_triangles: u32,
    ofs_triangles: u32,
    ofs_shaders: u32,
    ofs_st: u32,
    ofs_xyznormal: u32,
    ofs_end: u32,
}

#[binread]
#[br(little)]
#[derive(Debug, Clone)]
pub struct Shader {
    #[br(try_map = |raw: [u8; 64]| padded_str(&raw))]
    pub name: String,
    pub index: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub indices: [u32; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct TexCoord {
    pub u: f32,
    pub v: f32,
}

/// Raw vertex record: quantized position plus a packed normal.
#[derive(Debug, Clone, Copy)]
pub struct VertexRecord {
    pub x: i16,
    pub y: i16,
    pub z: i16,
    pub normal: u16,
}

#[derive(Debug, Clone)]
pub struct Surface {
    pub name: String,
    pub flags: i32,
    pub num_frames: u32,
    pub num_verts: u32,
    pub shaders: Vec<Shader>,
    pub triangles: Vec<Triangle>,
    pub texcoords: Vec<TexCoord>,
    /// `num_frames * num_verts` records, frame-major: frame `f` occupies
    /// `[f * num_verts, (f + 1) * num_verts)`.
    pub vertices: Vec<VertexRecord>,
}

#[derive(Debug, Clone)]
pub enum Md3Error {
    BadMagic([u8; 4]),
    BadVersion(u32),
    BadSurfaceMagic { surface: u32, found: [u8; 4] },
}

impl fmt::Display for Md3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic(found) => write!(
                f,
                "bad magic {:?}, expected \"IDP3\"",
                String::from_utf8_lossy(found)
            ),
            Self::BadVersion(found) => {
                write!(f, "unsupported version {found}, expected {MD3_VERSION}")
            }
            Self::BadSurfaceMagic { surface, found } => write!(
                f,
                "surface {}: bad magic {:?}",
                surface,
                String::from_utf8_lossy(found)
            ),
        }
    }
}
impl Error for Md3Error {}

#[derive(Debug, Clone)]
pub struct Md3 {
    pub name: String,
    pub frames: Vec<Frame>,
    pub tags: Vec<Tag>,
    pub surfaces: Vec<Surface>,
}

impl Md3 {
    pub fn from_reader<R: Seek + Read>(reader: &mut R) -> Result<Self, Box<dyn Error>> {
        ///////////////////////////////////////////////////////////////////////////////////////////
        //                               Magic and Version                                       //
        ///////////////////////////////////////////////////////////////////////////////////////////

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MD3_MAGIC {
            return Err(Md3Error::BadMagic(magic).into());
        }

        let version = reader.read_u32::<LE>()?;
        if version != MD3_VERSION {
            return Err(Md3Error::BadVersion(version).into());
        }

        let header = Header::read(reader)?;

        ///////////////////////////////////////////////////////////////////////////////////////////
        //                               Frames and Tags                                         //
        ///////////////////////////////////////////////////////////////////////////////////////////

        reader.seek(SeekFrom::Start(header.ofs_frames.into()))?;
        let mut frames = Vec::with_capacity(header.num_frames as usize);
        for _ in 0..header.num_frames {
            frames.push(Frame::read(reader)?);
        }

        reader.seek(SeekFrom::Start(header.ofs_tags.into()))?;
        let mut tags = Vec::with_capacity(header.num_tags as usize);
        for _ in 0..header.num_tags {
            tags.push(Tag::read(reader)?);
        }

        ///////////////////////////////////////////////////////////////////////////////////////////
        //                                    Surfaces                                           //
        ///////////////////////////////////////////////////////////////////////////////////////////

        // Surface records are variable length; each one states how far to
        // advance to reach the next.
        let mut surfaces = Vec::with_capacity(header.num_surfaces as usize);
        let mut surface_start = header.ofs_surfaces as u64;
        for index in 0..header.num_surfaces {
            let (surface, length) = Surface::from_reader(reader, surface_start, index)?;
            surfaces.push(surface);
            surface_start += length;
        }

        Ok(Self {
            name: header.name,
            frames,
            tags,
            surfaces,
        })
    }
}

impl Surface {
    /// Reads the surface starting at absolute offset `start`. Returns the
    /// surface and its length in bytes.
    fn from_reader<R: Seek + Read>(
        reader: &mut R,
        start: u64,
        index: u32,
    ) -> Result<(Self, u64), Box<dyn Error>> {
        reader.seek(SeekFrom::Start(start))?;

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MD3_MAGIC {
            return Err(Md3Error::BadSurfaceMagic {
                surface: index,
                found: magic,
            }
            .into());
        }

        let header = SurfaceHeader::read(reader)?;

        // Shaders
        reader.seek(SeekFrom::Start(start + header.ofs_shaders as u64))?;
        let mut shaders = Vec::with_capacity(header.num_shaders as usize);
        for _ in 0..header.num_shaders {
            shaders.push(Shader::read(reader)?);
        }

        // Triangles
        reader.seek(SeekFrom::Start(start + header.ofs_triangles as u64))?;
        let mut triangles = Vec::with_capacity(header.num_triangles as usize);
        for _ in 0..header.num_triangles {
            triangles.push(Triangle {
                indices: [
                    reader.read_u32::<LE>()?,
                    reader.read_u32::<LE>()?,
                    reader.read_u32::<LE>()?,
                ],
            });
        }

        // Texture coordinates, one per vertex
        reader.seek(SeekFrom::Start(start + header.ofs_st as u64))?;
        let mut texcoords = Vec::with_capacity(header.num_verts as usize);
        for _ in 0..header.num_verts {
            texcoords.push(TexCoord {
                u: reader.read_f32::<LE>()?,
                v: reader.read_f32::<LE>()?,
            });
        }

        // Vertex records for every frame
        reader.seek(SeekFrom::Start(start + header.ofs_xyznormal as u64))?;
        let record_count = header.num_frames as usize * header.num_verts as usize;
        let mut vertices = Vec::with_capacity(record_count);
        for _ in 0..record_count {
            vertices.push(VertexRecord {
                x: reader.read_i16::<LE>()?,
                y: reader.read_i16::<LE>()?,
                z: reader.read_i16::<LE>()?,
                normal: reader.read_u16::<LE>()?,
            });
        }

        Ok((
            Self {
                name: header.name,
                flags: header.flags,
                num_frames: header.num_frames,
                num_verts: header.num_verts,
                shaders,
                triangles,
                texcoords,
                vertices,
            },
            header.ofs_end as u64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn put_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_i32(buf: &mut Vec<u8>, v: i32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_f32(buf: &mut Vec<u8>, v: f32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_i16(buf: &mut Vec<u8>, v: i16) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_u16(buf: &mut Vec<u8>, v: u16) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn put_name(buf: &mut Vec<u8>, name: &str, size: usize) {
        assert!(name.len() <= size);
        buf.extend_from_slice(name.as_bytes());
        buf.resize(buf.len() + size - name.len(), 0);
    }

    // One surface, two frames, one tag, three vertices, two triangles.
    //
    //   0    magic + version
    //   8    header (100 bytes)
    // 108    frames (2 * 56)
    // 220    tag (112)
    // 332    surface
    //          +108 shader (68)
    //          +176 triangles (24)
    //          +200 texcoords (24)
    //          +224 vertex records (2 frames * 3 verts * 8)
    //          +272 end
    fn fixture() -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(&MD3_MAGIC);
        put_u32(&mut buf, MD3_VERSION);

        put_name(&mut buf, "probe", 64);
        put_i32(&mut buf, 0); // flags
        put_u32(&mut buf, 2); // num_frames
        put_u32(&mut buf, 1); // num_tags
        put_u32(&mut buf, 1); // num_surfaces
        put_u32(&mut buf, 0); // num_skins
        put_u32(&mut buf, 108); // ofs_frames
        put_u32(&mut buf, 220); // ofs_tags
        put_u32(&mut buf, 332); // ofs_surfaces
        put_u32(&mut buf, 604); // ofs_eof

        for f in 0..2u32 {
            let shift = f as f32;
            for v in [-1.0, -2.0, -3.0] {
                put_f32(&mut buf, v - shift); // min_bounds
            }
            for v in [1.0, 2.0, 3.0] {
                put_f32(&mut buf, v + shift); // max_bounds
            }
            for _ in 0..3 {
                put_f32(&mut buf, 0.0); // local_origin
            }
            put_f32(&mut buf, 4.0 + shift); // radius
            put_name(&mut buf, &format!("frame{f}"), 16);
        }

        put_name(&mut buf, "tag_head", 64);
        for v in [10.0, 20.0, 30.0] {
            put_f32(&mut buf, v); // origin
        }
        for axis in 0..3 {
            for c in 0..3 {
                put_f32(&mut buf, if axis == c { 1.0 } else { 0.0 });
            }
        }

        // Surface
        buf.extend_from_slice(&MD3_MAGIC);
        put_name(&mut buf, "body", 64);
        put_i32(&mut buf, 0); // flags
        put_u32(&mut buf, 2); // num_frames
        put_u32(&mut buf, 1); // num_shaders
        put_u32(&mut buf, 3); // num_verts
        put_u32(&mut buf, 2); // num_triangles
        put_u32(&mut buf, 176); // ofs_triangles
        put_u32(&mut buf, 108); // ofs_shaders
        put_u32(&mut buf, 200); // ofs_st
        put_u32(&mut buf, 224); // ofs_xyznormal
        put_u32(&mut buf, 272); // ofs_end

        put_name(&mut buf, "textures/probe/body", 64);
        put_i32(&mut buf, 7); // shader index

        for tri in [[0u32, 1, 2], [2, 1, 0]] {
            for idx in tri {
                put_u32(&mut buf, idx);
            }
        }

        for v in 0..3 {
            put_f32(&mut buf, v as f32 * 0.25); // u
            put_f32(&mut buf, 1.0 - v as f32 * 0.25); // v
        }

        for f in 0..2i16 {
            for v in 0..3i16 {
                put_i16(&mut buf, 64 * (v + 1) + f); // x
                put_i16(&mut buf, -64 * (v + 1)); // y
                put_i16(&mut buf, 32); // z
                put_u16(&mut buf, 0x0040); // normal: +X
            }
        }

        assert_eq!(buf.len(), 604);
        buf
    }

    #[test]
    fn decodes_fixture() {
        let model = Md3::from_reader(&mut Cursor::new(fixture())).unwrap();

        assert_eq!(model.name, "probe");
        assert_eq!(model.frames.len(), 2);
        assert_eq!(model.tags.len(), 1);
        assert_eq!(model.surfaces.len(), 1);

        let frame = &model.frames[1];
        assert_eq!(frame.name, "frame1");
        assert_eq!(frame.min_bounds, Vec3::new(-2.0, -3.0, -4.0));
        assert_eq!(frame.max_bounds, Vec3::new(2.0, 3.0, 4.0));
        assert_eq!(frame.radius, 5.0);

        let tag = &model.tags[0];
        assert_eq!(tag.name, "tag_head");
        assert_eq!(tag.origin, Vec3::new(10.0, 20.0, 30.0));
        assert_eq!(tag.axis[1], Vec3::Y);

        let surface = &model.surfaces[0];
        assert_eq!(surface.name, "body");
        assert_eq!(surface.num_verts, 3);
        assert_eq!(surface.shaders.len(), 1);
        assert_eq!(surface.shaders[0].name, "textures/probe/body");
        assert_eq!(surface.shaders[0].index, 7);
        assert_eq!(surface.triangles.len(), 2);
        assert_eq!(surface.triangles[1].indices, [2, 1, 0]);
        assert_eq!(surface.texcoords.len(), 3);
        assert!((surface.texcoords[2].u - 0.5).abs() < 1e-6);
    }

    #[test]
    fn vertex_records_are_frame_major() {
        let model = Md3::from_reader(&mut Cursor::new(fixture())).unwrap();
        let surface = &model.surfaces[0];

        assert_eq!(surface.vertices.len(), 6);
        // Frame 1 shifts x by one model unit
        assert_eq!(surface.vertices[0].x, 64);
        assert_eq!(surface.vertices[3].x, 65);
        assert_eq!(surface.vertices[3].normal, 0x0040);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut data = fixture();
        data[0] = b'X';

        let err = Md3::from_reader(&mut Cursor::new(data)).unwrap_err();
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn rejects_bad_version() {
        let mut data = fixture();
        data[4] = 14;

        let err = Md3::from_reader(&mut Cursor::new(data)).unwrap_err();
        assert!(err.to_string().contains("unsupported version 14"));
    }

    #[test]
    fn rejects_bad_surface_magic() {
        let mut data = fixture();
        data[332] = b'X';

        let err = Md3::from_reader(&mut Cursor::new(data)).unwrap_err();
        assert!(err.to_string().contains("surface 0"));
    }

    #[test]
    fn rejects_truncated_file() {
        let data = fixture();
        assert!(Md3::from_reader(&mut Cursor::new(&data[..400])).is_err());
    }

    #[test]
    fn decode_normal_axes() {
        assert!((decode_normal(0x0000) - Vec3::Z).length() < 1e-6);
        assert!((decode_normal(0x0040) - Vec3::X).length() < 1e-6);
        assert!((decode_normal(0x4040) - Vec3::Y).length() < 1e-6);
        assert!((decode_normal(0x0080) - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn decoded_normals_are_unit_length() {
        for packed in [0x1234u16, 0xABCD, 0x00FF, 0xFF00] {
            assert!((decode_normal(packed).length() - 1.0).abs() < 1e-5);
        }
    }
}
