use super::Effect;
use super::model_view::ModelView;
use crate::assets::{AssetPoll, Model, PendingAsset, Texture, TextureSource};
use crate::canvas::{Blend, Canvas, Rgb};
use crate::config::WeatherConfig;
use crate::scene::{Camera, Mat3, Vec3, euler_xyz};
use crossterm::event::Event;
use std::f32::consts::{PI, TAU};

const CLOUD_SIZE: f32 = 500.0;
const CLOUD_TILT: (f32, f32) = (1.16, -0.12);
const CAMERA_ROTATION: Vec3 = Vec3::new(1.16, -0.12, 0.27);
const DROP_SIZE: f32 = 0.1;

const AMBIENT: [f32; 3] = [0x55 as f32 / 255.0, 0x55 as f32 / 255.0, 0x55 as f32 / 255.0];
const SUN: [f32; 3] = [1.0, 0xee as f32 / 255.0, 0xdd as f32 / 255.0];
const SUN_DIRECTION: Vec3 = Vec3::Z;
const FLASH_COLOR: [f32; 3] = [0x06 as f32 / 255.0, 0x2d as f32 / 255.0, 0x89 as f32 / 255.0];

/// Fixed-size rain: three coordinates and one fall speed per drop.
#[derive(Debug, Clone)]
pub struct RainCloud {
    positions: Vec<f32>,
    velocities: Vec<f32>,
    /// Whole-cloud drift around Y.
    pub rotation_y: f32,
}

impl RainCloud {
    pub fn new(count: usize, rng: &mut fastrand::Rng) -> Self {
        let mut positions = Vec::with_capacity(count * 3);
        for _ in 0..count {
            positions.push(rng.f32() * 400.0 - 200.0);
            positions.push(rng.f32() * 500.0 - 250.0);
            positions.push(rng.f32() * 400.0 - 200.0);
        }
        Self {
            positions,
            velocities: vec![0.0; count],
            rotation_y: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.velocities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.velocities.is_empty()
    }

    /// Drop position in the cloud's own frame.
    pub fn point(&self, index: usize) -> Vec3 {
        let p = &self.positions[index * 3..index * 3 + 3];
        Vec3::new(p[0], p[1], p[2])
    }

    pub fn velocity(&self, index: usize) -> f32 {
        self.velocities[index]
    }
}

/// Every drop speeds up by a random step; drops below the floor restart at the ceiling.
pub fn advance_rain(rain: &mut RainCloud, rng: &mut fastrand::Rng, config: &WeatherConfig) {
    for (position, velocity) in rain.positions.chunks_exact_mut(3).zip(rain.velocities.iter_mut()) {
        *velocity -= config.rain_accel_min + rng.f32() * config.rain_accel_span;
        position[1] += *velocity;

        if position[1] < config.rain_floor {
            position[1] = config.rain_ceiling;
            *velocity = 0.0;
        }
    }
    rain.rotation_y += config.rain_spin;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloudBillboard {
    pub position: Vec3,
    pub tilt: (f32, f32),
    /// Spin in `0..2π`.
    pub rotation_z: f32,
    pub opacity: f32,
}

impl CloudBillboard {
    pub fn orientation(&self) -> Mat3 {
        euler_xyz(Vec3::new(self.tilt.0, self.tilt.1, self.rotation_z))
    }
}

pub fn spawn_clouds(count: usize, opacity: f32, rng: &mut fastrand::Rng) -> Vec<CloudBillboard> {
    (0..count)
        .map(|_| CloudBillboard {
            position: Vec3::new(rng.f32() * 800.0 - 400.0, 500.0, rng.f32() * 500.0 - 450.0),
            tilt: CLOUD_TILT,
            rotation_z: (rng.f32() * 360.0).rem_euclid(TAU),
            opacity,
        })
        .collect()
}

pub fn spin_clouds(clouds: &mut [CloudBillboard], spin: f32) {
    for cloud in clouds {
        cloud.rotation_z = (cloud.rotation_z - spin).rem_euclid(TAU);
    }
}

/// Lightning point light. Power is intensity over the full sphere.
#[derive(Debug, Clone, PartialEq)]
pub struct Flash {
    pub position: Vec3,
    pub intensity: f32,
    /// Range past which the light contributes nothing.
    pub distance: f32,
    pub decay: f32,
}

impl Default for Flash {
    fn default() -> Self {
        Self {
            position: Vec3::new(200.0, 300.0, 100.0),
            intensity: 30.0,
            distance: 500.0,
            decay: 1.7,
        }
    }
}

impl Flash {
    pub fn power(&self) -> f32 {
        self.intensity * 4.0 * PI
    }

    pub fn set_power(&mut self, power: f32) {
        self.intensity = power / (4.0 * PI);
    }

    pub fn attenuation(&self, distance: f32) -> f32 {
        (1.0 - distance / self.distance).clamp(0.0, 1.0).powf(self.decay)
    }
}

/// Rolls for a strike; a flash already above the threshold keeps flickering in place.
/// Returns whether the power was reassigned.
pub fn strike_lightning(flash: &mut Flash, rng: &mut fastrand::Rng, config: &WeatherConfig) -> bool {
    let roll = rng.f32();
    if roll <= 1.0 - config.flash_chance && flash.power() <= config.flash_threshold {
        return false;
    }

    if flash.power() < config.flash_threshold {
        flash.position = Vec3::new(rng.f32() * 400.0, 300.0 + rng.f32() * 200.0, 100.0);
    }
    flash.set_power(config.flash_power_min + rng.f32() * config.flash_power_span);
    true
}

/// Clouds (and the first frame) wait for the cloud texture.
pub enum SceneState {
    Loading(PendingAsset<Texture>),
    Running(Texture),
    /// The texture never arrived; the scene stays at its initial state.
    Stalled,
}

struct CloudHit {
    distance: f32,
    color: [f32; 3],
    alpha: f32,
}

/// World-to-plane rotation and plane normal of one cloud for the current frame.
#[derive(Debug, Clone, Copy)]
struct CloudPlane {
    inverse: Mat3,
    normal: Vec3,
}

pub struct WeatherEffect {
    canvas: Canvas,
    camera: Camera,
    rain: RainCloud,
    clouds: Vec<CloudBillboard>,
    flash: Flash,
    state: SceneState,
    model: ModelView,
    config: WeatherConfig,
    rng: fastrand::Rng,
    hits: Vec<CloudHit>,
    planes: Vec<CloudPlane>,
    frame: u64,
}

impl WeatherEffect {
    /// Starts loading the texture (and model, if configured) in the background.
    pub fn new(canvas: Canvas, config: WeatherConfig, mut rng: fastrand::Rng) -> Self {
        let source = match &config.texture {
            Some(path) => TextureSource::Image(path.clone()),
            None => TextureSource::Smoke { seed: rng.u32(..) },
        };
        let texture = PendingAsset::spawn(source.label(), move || source.load());
        let model = config.model.clone().map(|path| {
            PendingAsset::spawn(path.display().to_string(), move || Model::load(&path))
        });
        Self::with_assets(canvas, config, rng, texture, model)
    }

    pub fn with_assets(
        mut canvas: Canvas,
        config: WeatherConfig,
        mut rng: fastrand::Rng,
        texture: PendingAsset<Texture>,
        model: Option<PendingAsset<Model>>,
    ) -> Self {
        let mut camera = Camera::new(60.0, 1.0, 1000.0);
        camera.position = Vec3::new(0.0, 0.0, 1.0);
        camera.set_rotation(CAMERA_ROTATION);

        let rain = RainCloud::new(config.rain_count, &mut rng);
        canvas.clear(config.clear_color);

        Self {
            canvas,
            camera,
            rain,
            clouds: Vec::new(),
            flash: Flash::default(),
            state: SceneState::Loading(texture),
            model: ModelView::new(model),
            hits: Vec::with_capacity(config.cloud_count),
            planes: Vec::with_capacity(config.cloud_count),
            config,
            rng,
            frame: 0,
        }
    }

    pub fn state(&self) -> &SceneState {
        &self.state
    }

    pub fn rain(&self) -> &RainCloud {
        &self.rain
    }

    pub fn clouds(&self) -> &[CloudBillboard] {
        &self.clouds
    }

    pub fn flash(&self) -> &Flash {
        &self.flash
    }

    /// Moves `Loading` on once the texture load settles. Returns whether the scene may run.
    fn poll_texture(&mut self) -> bool {
        let next = match &self.state {
            SceneState::Running(_) => return true,
            SceneState::Stalled => return false,
            SceneState::Loading(pending) => match pending.poll() {
                AssetPoll::Pending => return false,
                AssetPoll::Ready(texture) => {
                    tracing::info!(
                        asset = pending.label(),
                        width = texture.width(),
                        height = texture.height(),
                        "cloud texture loaded"
                    );
                    SceneState::Running(texture)
                }
                AssetPoll::Failed(err) => {
                    tracing::error!(asset = pending.label(), error = %err, "cloud texture failed; weather stays frozen");
                    SceneState::Stalled
                }
            },
        };

        let running = matches!(next, SceneState::Running(_));
        if running {
            self.clouds = spawn_clouds(self.config.cloud_count, self.config.cloud_opacity, &mut self.rng);
        }
        self.state = next;
        running
    }

    /// One frame of weather: spin clouds, drop rain, roll lightning, render.
    pub fn step(&mut self) {
        self.frame += 1;
        spin_clouds(&mut self.clouds, self.config.cloud_spin);
        advance_rain(&mut self.rain, &mut self.rng, &self.config);
        if strike_lightning(&mut self.flash, &mut self.rng, &self.config) {
            tracing::trace!(frame = self.frame, power = self.flash.power(), "lightning");
        }
        self.render();
    }

    fn render(&mut self) {
        self.canvas.clear(self.config.clear_color);
        self.draw_clouds();
        self.draw_rain();
        self.model.draw(&mut self.canvas);
    }

    fn draw_rain(&mut self) {
        let (width, height) = (self.canvas.width(), self.canvas.height());
        let spin = Mat3::from_rotation_y(self.rain.rotation_y);
        let scale = self.canvas.scale();

        for index in 0..self.rain.len() {
            let world = spin * self.rain.point(index);
            let Some(p) = self.camera.project(world, width, height) else {
                continue;
            };
            let size = DROP_SIZE * height * 0.5 / p.depth;
            let alpha = (size / scale).powi(2).clamp(self.config.rain_min_alpha, 1.0);
            self.canvas.plot(p.x, p.y, self.config.rain_color, alpha, Blend::SourceOver);
        }
    }

    fn draw_clouds(&mut self) {
        let SceneState::Running(texture) = &self.state else {
            return;
        };
        if self.clouds.is_empty() {
            return;
        }

        self.planes.clear();
        self.planes.extend(self.clouds.iter().map(|cloud| {
            let orientation = cloud.orientation();
            CloudPlane {
                inverse: orientation.transpose(),
                normal: orientation * Vec3::Z,
            }
        }));

        let (width, height) = (self.canvas.width(), self.canvas.height());
        let scale = self.canvas.scale();
        let half = CLOUD_SIZE * 0.5;

        for row in 0..self.canvas.rows() {
            for col in 0..self.canvas.cols() {
                let sx = (col as f32 + 0.5) * scale;
                let sy = (row as f32 + 0.5) * scale;
                let dir = self.camera.ray(sx, sy, width, height);

                self.hits.clear();
                for (cloud, plane) in self.clouds.iter().zip(&self.planes) {
                    let normal = plane.normal;
                    let facing = dir.dot(normal);
                    if facing.abs() < 1e-6 {
                        continue;
                    }
                    let distance = (cloud.position - self.camera.position).dot(normal) / facing;
                    if distance < self.camera.near() || distance > self.camera.far() {
                        continue;
                    }
                    let hit = self.camera.position + dir * distance;
                    let local = plane.inverse * (hit - cloud.position);
                    if local.x.abs() > half || local.y.abs() > half {
                        continue;
                    }

                    let texel = texture.sample(local.x / CLOUD_SIZE + 0.5, 0.5 - local.y / CLOUD_SIZE);
                    let alpha = texel[3] * cloud.opacity;
                    if alpha <= 1.0 / 255.0 {
                        continue;
                    }
                    let toward_camera = if facing > 0.0 { -normal } else { normal };
                    let light = lambert(&self.flash, hit, toward_camera);
                    self.hits.push(CloudHit {
                        distance,
                        color: [texel[0] * light[0], texel[1] * light[1], texel[2] * light[2]],
                        alpha,
                    });
                }

                // Farthest first.
                self.hits.sort_by(|a, b| b.distance.total_cmp(&a.distance));
                for hit in &self.hits {
                    self.canvas
                        .blend_pixel(col as isize, row as isize, to_rgb(hit.color), hit.alpha, Blend::SourceOver);
                }
            }
        }
    }
}

/// Diffuse light reaching `point` on a surface facing `normal`.
fn lambert(flash: &Flash, point: Vec3, normal: Vec3) -> [f32; 3] {
    let sun = normal.dot(SUN_DIRECTION).max(0.0);

    let to_flash = flash.position - point;
    let distance = to_flash.length();
    let flash_term = if distance > 0.0 {
        normal.dot(to_flash * (1.0 / distance)).max(0.0) * flash.intensity * flash.attenuation(distance)
    } else {
        0.0
    };

    let mut light = [0.0; 3];
    for (i, channel) in light.iter_mut().enumerate() {
        *channel = AMBIENT[i] + SUN[i] * sun + FLASH_COLOR[i] * flash_term;
    }
    light
}

fn to_rgb(color: [f32; 3]) -> Rgb {
    let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0) as u8;
    (channel(color[0]), channel(color[1]), channel(color[2]))
}

impl Effect for WeatherEffect {
    fn tick(&mut self) {
        self.model.update();
        if self.poll_texture() {
            self.step();
        } else {
            // Nothing of the weather has rendered yet.
            self.canvas.clear(self.config.clear_color);
            self.model.draw(&mut self.canvas);
        }
    }

    fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    fn resize(&mut self, cols: usize, rows: usize) {
        self.canvas.resize(cols, rows);
        self.canvas.clear(self.config.clear_color);
    }

    fn handle_event(&mut self, event: &Event) {
        self.model.handle_event(event, self.canvas.rows());
    }
}
