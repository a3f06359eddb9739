//! Perspective camera for the weather renderer. Vector and rotation math is
//! `glam`; this only maps world points onto canvas logical coordinates.

pub use glam::{EulerRot, Mat3, Mat4, Vec3};

/// Intrinsic XYZ Euler rotation: `Rx · Ry · Rz`.
pub fn euler_xyz(rotation: Vec3) -> Mat3 {
    Mat3::from_euler(EulerRot::XYZ, rotation.x, rotation.y, rotation.z)
}

/// A point projected onto the canvas, in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    pub x: f32,
    pub y: f32,
    /// Distance along the view axis.
    pub depth: f32,
}

/// Perspective camera looking down its local -Z.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    /// Camera-to-world rotation; columns are right, up, back.
    orientation: Mat3,
    view: Mat3,
    fov_y: f32,
    near: f32,
    far: f32,
}

impl Camera {
    /// `fov_deg` is the vertical field of view.
    pub fn new(fov_deg: f32, near: f32, far: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Mat3::IDENTITY,
            view: Mat3::IDENTITY,
            fov_y: fov_deg.to_radians(),
            near,
            far,
        }
    }

    pub fn set_rotation(&mut self, euler: Vec3) {
        self.set_orientation(euler_xyz(euler));
    }

    pub fn look_at(&mut self, target: Vec3) {
        let forward = target - self.position;
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-12 { Vec3::Z } else { Vec3::Y };
        let view = Mat3::from_mat4(Mat4::look_at_rh(self.position, target, up));
        self.set_orientation(view.transpose());
    }

    fn set_orientation(&mut self, orientation: Mat3) {
        self.orientation = orientation;
        self.view = orientation.transpose();
    }

    fn focal(&self, height: f32) -> f32 {
        height * 0.5 / (self.fov_y * 0.5).tan()
    }

    /// Projects a world point onto a `width`×`height` surface. Points outside
    /// the near/far range are culled; off-screen points are still returned.
    pub fn project(&self, world: Vec3, width: f32, height: f32) -> Option<Projected> {
        let local = self.view * (world - self.position);
        let depth = -local.z;
        if depth < self.near || depth > self.far {
            return None;
        }
        let focal = self.focal(height);
        Some(Projected {
            x: width * 0.5 + local.x * focal / depth,
            y: height * 0.5 - local.y * focal / depth,
            depth,
        })
    }

    /// World-space direction of the ray through surface point (`sx`, `sy`).
    pub fn ray(&self, sx: f32, sy: f32, width: f32, height: f32) -> Vec3 {
        let focal = self.focal(height);
        let local = Vec3::new(sx - width * 0.5, height * 0.5 - sy, -focal);
        (self.orientation * local).normalize()
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn euler_order_is_x_then_y_then_z() {
        let m = euler_xyz(Vec3::new(FRAC_PI_2, FRAC_PI_2, FRAC_PI_2));
        let expected = Mat3::from_rotation_x(FRAC_PI_2) * Mat3::from_rotation_y(FRAC_PI_2) * Mat3::from_rotation_z(FRAC_PI_2);
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert!(close(m * v, expected * v));
    }

    #[test]
    fn point_ahead_projects_to_center() {
        let camera = Camera::new(60.0, 1.0, 1000.0);
        let p = camera.project(Vec3::new(0.0, 0.0, -10.0), 200.0, 100.0).unwrap();
        assert!((p.x - 100.0).abs() < 1e-4);
        assert!((p.y - 50.0).abs() < 1e-4);
        assert!((p.depth - 10.0).abs() < 1e-4);
    }

    #[test]
    fn points_behind_or_too_far_are_culled() {
        let camera = Camera::new(60.0, 1.0, 1000.0);
        assert!(camera.project(Vec3::new(0.0, 0.0, 5.0), 200.0, 100.0).is_none());
        assert!(camera.project(Vec3::new(0.0, 0.0, -0.5), 200.0, 100.0).is_none());
        assert!(camera.project(Vec3::new(0.0, 0.0, -2000.0), 200.0, 100.0).is_none());
    }

    #[test]
    fn up_is_up_on_screen() {
        let camera = Camera::new(60.0, 1.0, 1000.0);
        let p = camera.project(Vec3::new(0.0, 1.0, -10.0), 200.0, 100.0).unwrap();
        assert!(p.y < 50.0);
    }

    #[test]
    fn ray_through_projection_hits_the_point() {
        let mut camera = Camera::new(60.0, 1.0, 1000.0);
        camera.position = Vec3::new(0.0, 0.0, 1.0);
        camera.set_rotation(Vec3::new(1.16, -0.12, 0.27));
        let world = Vec3::new(30.0, 400.0, -50.0);
        let p = camera.project(world, 240.0, 120.0).unwrap();
        let dir = camera.ray(p.x, p.y, 240.0, 120.0);
        let expected = (world - camera.position).normalize();
        assert!(close(dir, expected));
    }

    #[test]
    fn look_at_faces_the_target() {
        let mut camera = Camera::new(75.0, 0.1, 1000.0);
        camera.position = Vec3::new(3.0, 2.0, 5.0);
        camera.look_at(Vec3::ZERO);
        let p = camera.project(Vec3::ZERO, 100.0, 100.0).unwrap();
        assert!((p.x - 50.0).abs() < 1e-3 && (p.y - 50.0).abs() < 1e-3);

        let above = camera.project(Vec3::Y, 100.0, 100.0).unwrap();
        assert!(above.y < 50.0);
    }

    #[test]
    fn look_at_straight_down_stays_finite() {
        let mut camera = Camera::new(75.0, 0.1, 1000.0);
        camera.position = Vec3::new(0.0, 10.0, 0.0);
        camera.look_at(Vec3::ZERO);
        let p = camera.project(Vec3::ZERO, 100.0, 100.0).unwrap();
        assert!(p.x.is_finite() && p.y.is_finite());
        assert!((p.depth - 10.0).abs() < 1e-3);
    }
}
