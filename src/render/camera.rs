use glam::{Mat4, Vec3, Vec4};
use std::f32::consts::PI;

/// Perspective camera looking at `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    fov_y_deg: f32,
    near: f32,
    far: f32,
    aspect: f32,
    projection: Mat4,
}

impl Camera {
    pub fn new(position: [f32; 3], fov_y_deg: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position: Vec3::from(position),
            target: Vec3::ZERO,
            fov_y_deg,
            near,
            far,
            aspect: 1.0,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection();
        camera
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fov_y_deg(&self) -> f32 {
        self.fov_y_deg
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if !aspect.is_finite() || aspect <= 0.0 {
            log::warn!("Ignoring invalid camera aspect {}", aspect);
            return;
        }
        self.aspect = aspect;
        self.update_projection();
    }

    fn update_projection(&mut self) {
        self.projection =
            Mat4::perspective_rh(self.fov_y_deg.to_radians(), self.aspect, self.near, self.far);
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Horizontal angle of the eye around the target, in radians.
    pub fn azimuth(&self) -> f32 {
        let offset = self.position - self.target;
        offset.x.atan2(offset.z)
    }
}

/// Projects a world point to pixel coordinates (origin top-left) plus depth
/// in `[0, 1]`. Points behind the near plane yield `None`.
pub fn project_with(view_projection: &Mat4, world: Vec3, viewport: [f32; 2]) -> Option<Vec3> {
    let clip = *view_projection * Vec4::new(world.x, world.y, world.z, 1.0);
    if clip.w <= 1e-5 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    Some(Vec3::new(
        (ndc.x * 0.5 + 0.5) * viewport[0],
        (0.5 - ndc.y * 0.5) * viewport[1],
        ndc.z,
    ))
}

/// Orbit around a target with exponential damping: every update applies
/// `delta * damping` and then decays the remaining delta by `1 - damping`.
#[derive(Debug, Clone, Copy)]
pub struct OrbitControls {
    pub damping: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
}

const MIN_POLAR: f32 = 1e-4;
const SETTLED: f32 = 1e-6;

impl OrbitControls {
    pub fn new(damping: f32) -> Self {
        Self {
            damping: damping.clamp(0.0, 1.0),
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.1,
            max_distance: 500.0,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
        }
    }

    /// Pointer drag in pixels; a drag across the full viewport height turns
    /// the view once around.
    pub fn drag(&mut self, dx: f32, dy: f32, viewport_height: f32) {
        let height = viewport_height.max(1.0);
        self.rotate_left(2.0 * PI * dx / height * self.rotate_speed);
        self.rotate_up(2.0 * PI * dy / height * self.rotate_speed);
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    /// Positive steps move the eye closer to the target.
    pub fn zoom(&mut self, steps: f32) {
        self.scale *= 0.95f32.powf(steps * self.zoom_speed);
    }

    pub fn is_settled(&self) -> bool {
        self.delta_theta.abs() < SETTLED
            && self.delta_phi.abs() < SETTLED
            && (self.scale - 1.0).abs() < SETTLED
    }

    /// Advances one frame. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        if self.is_settled() {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.scale = 1.0;
            return false;
        }
        let offset = camera.position - camera.target;
        let mut radius = offset.length();
        if radius < 1e-6 {
            return false;
        }
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        let factor = if self.damping > 0.0 { self.damping } else { 1.0 };
        theta += self.delta_theta * factor;
        phi = (phi + self.delta_phi * factor).clamp(MIN_POLAR, PI - MIN_POLAR);
        radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);

        let sin_phi = phi.sin();
        let position = camera.target
            + Vec3::new(
                radius * sin_phi * theta.sin(),
                radius * phi.cos(),
                radius * sin_phi * theta.cos(),
            );
        let moved = position.distance_squared(camera.position) > SETTLED * SETTLED;
        camera.position = position;

        if self.damping > 0.0 {
            self.delta_theta *= 1.0 - self.damping;
            self.delta_phi *= 1.0 - self.damping;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
        }
        self.scale = 1.0;
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::{project_with, Camera, OrbitControls};
    use glam::Vec3;

    #[test]
    fn target_projects_to_viewport_center() {
        let mut camera = Camera::new([0.0, 0.0, 5.0], 80.0, 0.1, 1000.0);
        camera.set_aspect(16.0 / 9.0);
        let view_projection = camera.view_projection();
        let point = project_with(&view_projection, Vec3::ZERO, [1600.0, 900.0]).unwrap();
        assert!((point.x - 800.0).abs() < 1e-3);
        assert!((point.y - 450.0).abs() < 1e-3);
        assert!(point.z > 0.0 && point.z < 1.0);
        assert!(project_with(&view_projection, Vec3::new(0.0, 0.0, 10.0), [1600.0, 900.0]).is_none());
    }

    #[test]
    fn invalid_aspect_is_ignored() {
        let mut camera = Camera::new([0.0, 0.0, 5.0], 80.0, 0.1, 1000.0);
        camera.set_aspect(2.0);
        let projection = camera.projection();
        camera.set_aspect(0.0);
        camera.set_aspect(f32::NAN);
        assert_eq!(camera.aspect(), 2.0);
        assert_eq!(camera.projection(), projection);
    }

    #[test]
    fn damped_rotation_keeps_distance_and_settles() {
        let mut camera = Camera::new([0.0, 0.0, 5.0], 80.0, 0.1, 1000.0);
        let mut controls = OrbitControls::new(0.05);
        controls.rotate_left(1.0);
        assert!(controls.update(&mut camera));
        let first_step = camera.azimuth().abs();
        assert!((first_step - 0.05).abs() < 1e-4);

        for _ in 0..600 {
            controls.update(&mut camera);
        }
        assert!(controls.is_settled());
        assert!((camera.position.length() - 5.0).abs() < 1e-3);
        // Geometric series of the damped delta sums to the full angle.
        assert!((camera.azimuth().abs() - 1.0).abs() < 1e-2);
    }

    #[test]
    fn zoom_moves_towards_target_within_limits() {
        let mut camera = Camera::new([0.0, 0.0, 5.0], 80.0, 0.1, 1000.0);
        let mut controls = OrbitControls::new(0.05);
        controls.zoom(4.0);
        controls.update(&mut camera);
        assert!(camera.position.length() < 5.0);

        controls.zoom(-10_000.0);
        controls.update(&mut camera);
        assert!((camera.position.length() - controls.max_distance).abs() < 1e-2);
    }
}
