use glam::{Mat4, Vec3};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut bounds = Self::empty();
        for point in points {
            bounds.expand_to_include(point);
        }
        bounds
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn expand_to_include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn merge(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Bounds of the eight corners after `matrix` is applied.
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let (lo, hi) = (self.min, self.max);
        Aabb::from_points((0..8).map(|corner| {
            let point = Vec3::new(
                if corner & 1 == 0 { lo.x } else { hi.x },
                if corner & 2 == 0 { lo.y } else { hi.y },
                if corner & 4 == 0 { lo.z } else { hi.z },
            );
            matrix.transform_point3(point)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::Aabb;
    use glam::{Mat4, Vec3};

    #[test]
    fn empty_box_has_zero_size_and_merges_cleanly() {
        let mut bounds = Aabb::empty();
        assert!(bounds.is_empty());
        assert_eq!(bounds.size(), Vec3::ZERO);

        bounds.merge(&Aabb::from_points([Vec3::splat(-1.0), Vec3::splat(1.0)]));
        bounds.merge(&Aabb::empty());
        assert_eq!(bounds.center(), Vec3::ZERO);
        assert_eq!(bounds.size(), Vec3::splat(2.0));
    }

    #[test]
    fn transformed_box_covers_rotated_corners() {
        let bounds = Aabb::from_points([Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0)]);
        let matrix = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0))
            * Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let moved = bounds.transformed(&matrix);
        assert!((moved.size().x - 1.0).abs() < 1e-5);
        assert!((moved.size().z - 2.0).abs() < 1e-5);
        assert!((moved.min.x - 10.0).abs() < 1e-5);
    }
}
