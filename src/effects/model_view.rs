//! Optional model drawn over the weather as a point cloud, with a damped
//! orbit camera steered by the mouse.

use crate::assets::{AssetPoll, Model, PendingAsset};
use crate::canvas::{Blend, Canvas, Rgb};
use crate::scene::{Camera, Vec3, euler_xyz};
use crossterm::event::{Event, MouseButton, MouseEvent, MouseEventKind};
use std::f32::consts::{PI, TAU};

const MODEL_SCALE: f32 = 0.019;
const MODEL_ROTATION: Vec3 = Vec3::new(-PI / 2.0, PI, PI);
const MODEL_COLOR: Rgb = (205, 205, 215);
const MIN_POLAR: f32 = 1e-3;

/// Spherical orbit around `target`, eased by `damping` every frame.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub radius: f32,
    /// Azimuth around +Y; 0 looks down -Z.
    pub theta: f32,
    /// Angle from +Y.
    pub phi: f32,
    pub damping: f32,
    pub rotate_speed: f32,
    pub zoom_step: f32,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    drag_from: Option<(u16, u16)>,
}

impl OrbitControls {
    /// Starts where `position` sits relative to `target`.
    pub fn new(position: Vec3, target: Vec3) -> Self {
        let offset = position - target;
        let radius = offset.length();
        Self {
            target,
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius.max(f32::EPSILON)).clamp(-1.0, 1.0).acos(),
            damping: 0.1,
            rotate_speed: 0.5,
            zoom_step: 0.95,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            drag_from: None,
        }
    }

    /// Queues a rotation for a drag of (`dx`, `dy`) pixels on a surface `height` pixels tall.
    pub fn rotate_by(&mut self, dx: f32, dy: f32, height: f32) {
        let height = height.max(1.0);
        self.delta_theta -= TAU * dx * self.rotate_speed / height;
        self.delta_phi -= TAU * dy * self.rotate_speed / height;
    }

    pub fn zoom_in(&mut self) {
        self.scale *= self.zoom_step;
    }

    pub fn zoom_out(&mut self) {
        self.scale /= self.zoom_step;
    }

    /// Applies a damped share of the pending motion and returns the camera position.
    pub fn update(&mut self) -> Vec3 {
        self.theta = (self.theta + self.delta_theta * self.damping).rem_euclid(TAU);
        self.phi = (self.phi + self.delta_phi * self.damping).clamp(MIN_POLAR, PI - MIN_POLAR);
        self.radius = (self.radius * self.scale).max(0.5);

        self.delta_theta *= 1.0 - self.damping;
        self.delta_phi *= 1.0 - self.damping;
        self.scale = 1.0;

        self.position()
    }

    pub fn position(&self) -> Vec3 {
        let (sin_phi, cos_phi) = self.phi.sin_cos();
        let (sin_theta, cos_theta) = self.theta.sin_cos();
        self.target
            + Vec3::new(
                self.radius * sin_phi * sin_theta,
                self.radius * cos_phi,
                self.radius * sin_phi * cos_theta,
            )
    }

    /// Feeds a terminal mouse event. `rows` is the raster height in pixels.
    pub fn handle_mouse(&mut self, mouse: &MouseEvent, rows: usize) {
        let at = (mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.drag_from = Some(at),
            MouseEventKind::Drag(MouseButton::Left) => {
                if let Some((col, row)) = self.drag_from {
                    let dx = at.0 as f32 - col as f32;
                    // Each terminal row is two raster rows.
                    let dy = (at.1 as f32 - row as f32) * 2.0;
                    self.rotate_by(dx, dy, rows as f32);
                }
                self.drag_from = Some(at);
            }
            MouseEventKind::Up(MouseButton::Left) => self.drag_from = None,
            MouseEventKind::ScrollUp => self.zoom_in(),
            MouseEventKind::ScrollDown => self.zoom_out(),
            _ => {}
        }
    }
}

enum ModelSlot {
    Empty,
    Loading(PendingAsset<Model>),
    Loaded(Vec<Vec3>),
}

pub struct ModelView {
    slot: ModelSlot,
    camera: Camera,
    controls: OrbitControls,
}

impl ModelView {
    pub fn new(pending: Option<PendingAsset<Model>>) -> Self {
        let mut camera = Camera::new(75.0, 0.1, 1000.0);
        camera.position = Vec3::new(0.0, 0.0, 5.0);
        camera.look_at(Vec3::ZERO);
        Self {
            slot: pending.map_or(ModelSlot::Empty, ModelSlot::Loading),
            controls: OrbitControls::new(camera.position, Vec3::ZERO),
            camera,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.slot, ModelSlot::Loaded(_))
    }

    /// Picks up a finished load and eases the orbit one frame.
    pub fn update(&mut self) {
        if let ModelSlot::Loading(pending) = &self.slot {
            match pending.poll() {
                AssetPoll::Pending => {}
                AssetPoll::Ready(model) => {
                    tracing::info!(asset = pending.label(), vertices = model.vertices.len(), "model loaded");
                    self.slot = ModelSlot::Loaded(place(&model));
                }
                AssetPoll::Failed(err) => {
                    tracing::error!(asset = pending.label(), error = %err, "error loading 3D model");
                    self.slot = ModelSlot::Empty;
                }
            }
        }

        self.camera.position = self.controls.update();
        self.camera.look_at(self.controls.target);
    }

    pub fn handle_event(&mut self, event: &Event, rows: usize) {
        if let Event::Mouse(mouse) = event {
            self.controls.handle_mouse(mouse, rows);
        }
    }

    pub fn draw(&self, canvas: &mut Canvas) {
        let ModelSlot::Loaded(vertices) = &self.slot else {
            return;
        };
        let (width, height) = (canvas.width(), canvas.height());
        for &vertex in vertices {
            if let Some(p) = self.camera.project(vertex, width, height) {
                canvas.plot(p.x, p.y, MODEL_COLOR, 0.9, Blend::SourceOver);
            }
        }
    }
}

/// Scales and turns raw model vertices into the viewer's frame.
fn place(model: &Model) -> Vec<Vec3> {
    let rotation = euler_xyz(MODEL_ROTATION);
    model.vertices.iter().map(|&v| rotation * (v * MODEL_SCALE)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn orbit_starts_at_the_initial_camera() {
        let controls = OrbitControls::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        assert!((controls.position() - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-4);
    }

    #[test]
    fn drag_rotation_is_damped_over_frames() {
        let mut controls = OrbitControls::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        controls.rotate_by(-10.0, 0.0, 100.0);
        let total = TAU * 10.0 * 0.5 / 100.0;

        controls.update();
        assert!((controls.theta - total * 0.1).abs() < 1e-5);
        for _ in 0..200 {
            controls.update();
        }
        assert!((controls.theta - total).abs() < 1e-3);
        assert!((controls.position().length() - 5.0).abs() < 1e-3);
    }

    #[test]
    fn polar_angle_stays_off_the_poles() {
        let mut controls = OrbitControls::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        controls.rotate_by(0.0, 10_000.0, 10.0);
        for _ in 0..100 {
            controls.update();
        }
        assert!(controls.phi >= MIN_POLAR && controls.phi <= PI - MIN_POLAR);
    }

    #[test]
    fn scroll_dollies_in_and_out() {
        let mut controls = OrbitControls::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        controls.handle_mouse(&mouse(MouseEventKind::ScrollUp, 0, 0), 40);
        controls.update();
        assert!((controls.radius - 4.75).abs() < 1e-4);
        controls.handle_mouse(&mouse(MouseEventKind::ScrollDown, 0, 0), 40);
        controls.update();
        assert!((controls.radius - 5.0).abs() < 1e-4);
    }

    #[test]
    fn drag_without_press_is_ignored_until_it_has_an_anchor() {
        let mut controls = OrbitControls::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        controls.handle_mouse(&mouse(MouseEventKind::Drag(MouseButton::Left), 10, 10), 40);
        controls.update();
        assert_eq!(controls.theta, 0.0);

        controls.handle_mouse(&mouse(MouseEventKind::Drag(MouseButton::Left), 14, 10), 40);
        controls.update();
        assert!(controls.theta > PI);
    }

    #[test]
    fn placed_model_is_scaled_down() {
        let model = Model {
            vertices: vec![Vec3::new(100.0, 0.0, 0.0)],
        };
        let placed = place(&model);
        assert!((placed[0].length() - 1.9).abs() < 1e-4);
    }

    #[test]
    fn failed_load_leaves_an_empty_view() {
        let pending = PendingAsset::spawn("broken".to_string(), || {
            Model::load(std::path::Path::new("/nonexistent/model.obj"))
        });
        let mut view = ModelView::new(Some(pending));
        for _ in 0..1000 {
            view.update();
            if !matches!(view.slot, ModelSlot::Loading(_)) {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(matches!(view.slot, ModelSlot::Empty));
        assert!(!view.is_loaded());
    }
}
