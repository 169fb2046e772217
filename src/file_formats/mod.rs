pub mod md3;
pub mod obj;

pub use md3::Md3;
pub use obj::Obj;
