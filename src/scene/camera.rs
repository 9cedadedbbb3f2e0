use glam::{Affine3A, Mat4, Vec3};

/// Perspective camera the effect is rendered for.
///
/// The host owns the camera; the pipeline only borrows it each frame and
/// re-reads near/far every time.
#[derive(Debug, Clone)]
pub struct ViewCamera {
    /// Vertical field of view in radians.
    pub fov_y_radians: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,

    // cached matrices, read-only for the renderer
    pub(crate) world_matrix: Affine3A,
    pub(crate) view_matrix: Mat4,
    pub(crate) projection_matrix: Mat4,
    pub(crate) projection_matrix_inverse: Mat4,
}

impl ViewCamera {
    /// Takes the vertical field of view in degrees, stored as radians.
    #[must_use]
    pub fn new_perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self {
            fov_y_radians: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
            world_matrix: Affine3A::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            projection_matrix_inverse: Mat4::IDENTITY,
        };
        cam.update_projection_matrix();
        cam
    }

    pub fn update_projection_matrix(&mut self) {
        // glam's perspective_rh targets the 0..1 depth range used by wgpu
        self.projection_matrix =
            Mat4::perspective_rh(self.fov_y_radians, self.aspect, self.near, self.far);
        self.projection_matrix_inverse = self.projection_matrix.inverse();
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update_projection_matrix();
    }

    pub fn set_near_far(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
        self.update_projection_matrix();
    }

    pub fn set_world_transform(&mut self, world_transform: Affine3A) {
        self.world_matrix = world_transform;
        self.view_matrix = Mat4::from(world_transform).inverse();
    }

    /// Places the camera at `position` looking toward `target`.
    pub fn look_at(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        let view = Mat4::look_at_rh(position, target, up);
        self.world_matrix = Affine3A::from_mat4(view.inverse());
        self.view_matrix = view;
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.world_matrix.translation)
    }

    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from(self.world_matrix)
    }

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix_inverse(&self) -> Mat4 {
        self.projection_matrix_inverse
    }

    /// Converts a hardware depth value (0 = near, 1 = far) to view-space distance.
    #[must_use]
    pub fn linearize_depth(&self, depth: f32) -> f32 {
        linearize_depth(depth, self.near, self.far)
    }
}

/// Inverse of the `perspective_rh` depth mapping.
#[must_use]
pub fn linearize_depth(depth: f32, near: f32, far: f32) -> f32 {
    near * far / (far - depth * (far - near))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linearize_round_trips_projection() {
        let cam = ViewCamera::new_perspective(60.0, 1.5, 0.5, 200.0);
        for z in [0.5_f32, 1.0, 17.0, 199.0] {
            let clip = cam.projection_matrix() * glam::Vec4::new(0.0, 0.0, -z, 1.0);
            let depth = clip.z / clip.w;
            assert!((cam.linearize_depth(depth) - z).abs() < z * 1e-3);
        }
    }

    #[test]
    fn field_of_view_is_stored_in_radians() {
        let cam = ViewCamera::new_perspective(90.0, 1.0, 0.1, 100.0);
        assert!((cam.fov_y_radians - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        // 90 degrees vertical: y scale of the projection is cot(45deg) = 1
        assert!((cam.projection_matrix().y_axis.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn look_at_moves_position() {
        let mut cam = ViewCamera::new_perspective(45.0, 1.0, 0.1, 100.0);
        cam.look_at(Vec3::new(0.0, 2.0, 10.0), Vec3::ZERO, Vec3::Y);
        assert!((cam.position() - Vec3::new(0.0, 2.0, 10.0)).length() < 1e-4);
    }
}
