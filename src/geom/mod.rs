pub mod bounds;
pub mod vertex;

pub use bounds::BoundingBox;
pub use vertex::MeshVertex;
