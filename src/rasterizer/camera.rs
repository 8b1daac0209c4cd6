//! Camera: pose, field of view and the matrices derived from them

use super::math::{Matrix4, Quaternion, Vec4};

pub const DEFAULT_FOV_DEGREES: f32 = 50.0;
pub const DEFAULT_Z_NEAR: f32 = 0.69;

/// Camera state. Looks down -Z with +Y up when the rotation is identity.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec4,
    rotation: Quaternion,
    res_x: usize,
    res_y: usize,
    fov: f32,
    z_near: f32,
    perspective: Matrix4,
}

impl Camera {
    pub fn new(res_x: usize, res_y: usize) -> Self {
        Self::with_pose(res_x, res_y, Vec4::ORIGIN, Quaternion::IDENTITY)
    }

    pub fn with_pose(res_x: usize, res_y: usize, position: Vec4, rotation: Quaternion) -> Self {
        let mut cam = Self {
            position: Vec4::point(position.x, position.y, position.z),
            rotation,
            res_x: res_x.max(1),
            res_y: res_y.max(1),
            fov: DEFAULT_FOV_DEGREES,
            z_near: DEFAULT_Z_NEAR,
            perspective: Matrix4::IDENTITY,
        };
        cam.rewrite_perspective();
        cam
    }

    /// World-to-view transform, rebuilt from the current pose.
    pub fn view_matrix(&self) -> Matrix4 {
        Matrix4::view(self.position, self.rotation)
    }

    /// Cached infinite-far projection. Only rebuilt when FOV, near or
    /// resolution change.
    pub fn perspective_matrix(&self) -> &Matrix4 {
        &self.perspective
    }

    pub fn view_projection_matrix(&self) -> Matrix4 {
        self.perspective * self.view_matrix()
    }

    pub fn position(&self) -> Vec4 {
        self.position
    }

    pub fn rotation(&self) -> Quaternion {
        self.rotation
    }

    pub fn move_to(&mut self, pos: Vec4) {
        self.position = Vec4::point(pos.x, pos.y, pos.z);
    }

    pub fn translate_by(&mut self, delta: Vec4) {
        self.position.x += delta.x;
        self.position.y += delta.y;
        self.position.z += delta.z;
    }

    pub fn set_rotation(&mut self, q: Quaternion) {
        self.rotation = q;
    }

    pub fn rotate_by(&mut self, delta: Quaternion) {
        self.rotation = self.rotation * delta;
        self.rotation.normalize();
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    /// Vertical field of view in degrees
    pub fn set_fov(&mut self, fov_degrees: f32) {
        self.fov = fov_degrees;
        self.rewrite_perspective();
    }

    pub fn z_near(&self) -> f32 {
        self.z_near
    }

    pub fn set_z_near(&mut self, z_near: f32) {
        self.z_near = z_near;
        self.rewrite_perspective();
    }

    pub fn resolution(&self) -> (usize, usize) {
        (self.res_x, self.res_y)
    }

    pub fn set_resolution(&mut self, res_x: usize, res_y: usize) {
        self.res_x = res_x.max(1);
        self.res_y = res_y.max(1);
        self.rewrite_perspective();
    }

    /// World-space forward direction (-Z rotated into the world)
    pub fn forward(&self) -> Vec4 {
        Vec4::direction(0.0, 0.0, -1.0)
            .transform(&Matrix4::rotation(self.rotation))
            .normalize()
    }

    fn rewrite_perspective(&mut self) {
        let aspect = self.res_x as f32 / self.res_y as f32;
        self.perspective = Matrix4::perspective_infinite(self.fov, aspect, self.z_near);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_perspective_rebuilt_on_changes() {
        let mut cam = Camera::new(200, 100);
        let before = *cam.perspective_matrix();

        cam.set_fov(90.0);
        assert_abs_diff_eq!(cam.perspective_matrix().m[1][1], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(cam.perspective_matrix().m[0][0], 0.5, epsilon = 1e-5);
        assert_ne!(before, *cam.perspective_matrix());

        cam.set_z_near(0.25);
        assert_abs_diff_eq!(cam.perspective_matrix().m[2][3], -0.5, epsilon = 1e-6);

        cam.set_resolution(100, 100);
        assert_abs_diff_eq!(cam.perspective_matrix().m[0][0], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_forward_follows_rotation() {
        let mut cam = Camera::new(64, 64);
        let f = cam.forward();
        assert_abs_diff_eq!(f.z, -1.0, epsilon = 1e-6);

        // Quarter turn left around +Y: forward becomes -X
        cam.rotate_by(Quaternion::from_axis_angle(
            Vec4::direction(0.0, 1.0, 0.0),
            std::f32::consts::FRAC_PI_2,
        ));
        let f = cam.forward();
        assert_abs_diff_eq!(f.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_view_moves_world_into_camera_space() {
        let mut cam = Camera::new(64, 64);
        cam.move_to(Vec4::point(0.0, 0.0, 5.0));

        let p = Vec4::point(0.0, 0.0, 0.0).transform(&cam.view_matrix());
        assert_abs_diff_eq!(p.z, -5.0, epsilon = 1e-6);
        assert_eq!(p.w, 1.0);
    }
}
