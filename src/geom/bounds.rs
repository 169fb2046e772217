use glam::{Mat4, Vec3};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Expands the box to contain `point`.
    pub fn grow(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Smallest box containing every point. An empty iterator yields the
    /// degenerate box at the origin.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return Self::default();
        };

        let mut bounds = Self::new(first, first);
        for point in points {
            bounds.grow(point);
        }
        bounds
    }

    /// Transform mapping the cube [-1, 1]^3 onto this box:
    /// (-1,-1,-1) lands on `min`, (1,1,1) lands on `max`.
    pub fn transform(&self) -> Mat4 {
        Mat4::from_translation(self.center()) * Mat4::from_scale(self.size() * 0.5)
    }
}
