use super::Effect;
use crate::canvas::{Blend, Canvas, Rgb};
use crate::config::FireworksConfig;

/// A shell climbing towards its apex.
#[derive(Debug, Clone, PartialEq)]
pub struct Firework {
    pub x: f32,
    pub y: f32,
    pub velocity_y: f32,
    /// Height (from the top of the canvas) at which the shell bursts.
    pub apex: f32,
    pub radius: f32,
    pub color: Rgb,
    pub exploded: bool,
}

/// A burst fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    pub color: Rgb,
    pub alpha: f32,
    pub age: u32,
    pub faded: bool,
}

/// What one frame did, for tests and trace logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub spawned: usize,
    pub exploded: usize,
    pub faded: usize,
}

/// Uniform in `min..min + span`; a zero span yields `min`.
fn uniform(rng: &mut fastrand::Rng, min: f32, span: f32) -> f32 {
    min + rng.f32() * span
}

pub fn spawn_firework(rng: &mut fastrand::Rng, config: &FireworksConfig, width: f32, height: f32) -> Firework {
    let apex_offset = if config.apex_span == 0 { 0 } else { rng.u32(0..config.apex_span) };
    Firework {
        x: rng.f32() * width,
        y: height,
        velocity_y: config.launch_speed,
        apex: (config.apex_min + apex_offset) as f32,
        radius: config.start_radius,
        color: (rng.u8(0..255), rng.u8(0..255), rng.u8(0..255)),
        exploded: false,
    }
}

/// Pushes `burst_size` particles at the shell's current position and color.
pub fn burst(firework: &Firework, rng: &mut fastrand::Rng, config: &FireworksConfig, particles: &mut Vec<Particle>) {
    particles.reserve(config.burst_size);
    for _ in 0..config.burst_size {
        particles.push(Particle {
            x: firework.x,
            y: firework.y,
            radius: uniform(rng, config.particle_radius_min, config.particle_radius_span),
            color: firework.color,
            alpha: 1.0,
            age: 0,
            faded: false,
            vx: uniform(rng, config.particle_speed_min, config.particle_speed_span),
            vy: uniform(rng, config.particle_speed_min, config.particle_speed_span),
        });
    }
}

/// Moves the shell one frame. Returns `true` on the frame it reaches its apex.
pub fn advance_firework(firework: &mut Firework, config: &FireworksConfig) -> bool {
    if firework.exploded {
        return false;
    }
    firework.y -= firework.velocity_y;
    firework.radius = (firework.radius + config.radius_growth).min(config.radius_cap);
    if firework.y <= firework.apex {
        firework.exploded = true;
    }
    firework.exploded
}

pub fn draw_firework(firework: &Firework, config: &FireworksConfig, canvas: &mut Canvas) {
    canvas.stroke_circle(firework.x, firework.apex, firework.radius, firework.color, 1.0);
    canvas.fill_circle(
        firework.x,
        firework.y,
        config.head_radius,
        firework.color,
        1.0,
        Blend::SourceOver,
    );
}

pub fn advance_particle(particle: &mut Particle, config: &FireworksConfig) {
    particle.x += particle.vx;
    particle.y += particle.vy;

    if particle.age < config.gravity_ticks {
        particle.vy += config.gravity;
    }

    // Derived from age so the fade is an exact arithmetic sequence.
    particle.age += 1;
    particle.alpha = 1.0 - config.fade_step * particle.age as f32;
    if particle.alpha < 0.0 {
        particle.faded = true;
    }
}

pub fn draw_particle(particle: &Particle, canvas: &mut Canvas) {
    canvas.fill_circle(
        particle.x,
        particle.y,
        particle.radius,
        particle.color,
        particle.alpha,
        Blend::Screen,
    );
}

pub struct FireworksEffect {
    canvas: Canvas,
    fireworks: Vec<Firework>,
    particles: Vec<Particle>,
    config: FireworksConfig,
    rng: fastrand::Rng,
    frame: u64,
}

impl FireworksEffect {
    pub fn new(canvas: Canvas, config: FireworksConfig, rng: fastrand::Rng) -> Self {
        Self {
            canvas,
            fireworks: Vec::with_capacity(config.max_fireworks + 1),
            particles: Vec::with_capacity(config.burst_size * config.max_fireworks),
            config,
            rng,
            frame: 0,
        }
    }

    pub fn fireworks(&self) -> &[Firework] {
        &self.fireworks
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// One full frame: fade, shells, particles, launch, prune.
    pub fn step(&mut self) -> FrameReport {
        let mut report = FrameReport::default();
        self.frame += 1;

        self.canvas.fill_rect_alpha(self.config.trail_color, self.config.trail_alpha);

        for firework in &mut self.fireworks {
            if advance_firework(firework, &self.config) {
                burst(firework, &mut self.rng, &self.config, &mut self.particles);
                report.exploded += 1;
            }
            draw_firework(firework, &self.config, &mut self.canvas);
        }

        // Includes fragments burst a moment ago.
        for particle in &mut self.particles {
            advance_particle(particle, &self.config);
            draw_particle(particle, &mut self.canvas);
        }

        if self.fireworks.len() < self.config.max_fireworks {
            let firework = spawn_firework(&mut self.rng, &self.config, self.canvas.width(), self.canvas.height());
            self.fireworks.push(firework);
            report.spawned = 1;
        }

        self.fireworks.retain(|f| !f.exploded);
        let before = self.particles.len();
        self.particles.retain(|p| !p.faded);
        report.faded = before - self.particles.len();

        if report.exploded > 0 {
            tracing::trace!(frame = self.frame, exploded = report.exploded, particles = self.particles.len(), "burst");
        }
        report
    }
}

impl Effect for FireworksEffect {
    fn tick(&mut self) {
        self.step();
    }

    fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    fn resize(&mut self, cols: usize, rows: usize) {
        // Entities keep their coordinates; only the surface changes.
        self.canvas.resize(cols, rows);
    }
}
