//! The repeating per-frame task. Each iteration drains terminal events, runs
//! as many fixed-length frames as wall time allows and presents the canvas.

use crate::effects::Effect;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Stops a running [`FrameLoop`] before its next frame. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Fixed-timestep accumulator; never owes more than `max_catch_up` frames.
#[derive(Debug, Clone)]
pub struct FrameClock {
    step: f32,
    accumulator: f32,
    max_catch_up: u32,
}

impl FrameClock {
    pub fn new(fps: u32) -> Self {
        Self {
            step: 1.0 / fps.max(1) as f32,
            accumulator: 0.0,
            max_catch_up: 3,
        }
    }

    pub fn step(&self) -> Duration {
        Duration::from_secs_f32(self.step)
    }

    /// Feeds elapsed wall time and returns how many frames are due.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.accumulator += elapsed.as_secs_f32();
        let frames = (self.accumulator / self.step).floor() as u32;

        if frames > self.max_catch_up {
            self.accumulator = 0.0;
            return self.max_catch_up;
        }
        self.accumulator -= frames as f32 * self.step;
        frames
    }
}

pub struct FrameLoop {
    clock: FrameClock,
    cancel: CancelHandle,
    output_buf: Vec<u8>,
}

impl FrameLoop {
    pub fn new(fps: u32) -> Self {
        Self {
            clock: FrameClock::new(fps),
            cancel: CancelHandle::default(),
            output_buf: Vec::new(),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs until cancelled. The resize listener is this loop's own event
    /// poll, so nothing stays registered once it returns.
    pub fn run<E: Effect, W: Write>(&mut self, effect: &mut E, out: &mut W) -> std::io::Result<u64> {
        let mut frames = 0u64;
        let mut last = Instant::now();

        while !self.cancel.is_cancelled() {
            while event::poll(Duration::from_millis(1))? {
                let event = event::read()?;
                self.dispatch(effect, &event);
            }

            let now = Instant::now();
            let due = self.clock.advance(now.duration_since(last));
            last = now;

            for _ in 0..due {
                if self.cancel.is_cancelled() {
                    break;
                }
                effect.tick();
                frames += 1;
            }

            self.present(effect, out)?;

            if due == 0 {
                std::thread::sleep(self.clock.step() / 4);
            }
        }

        tracing::info!(frames, "frame loop stopped");
        Ok(frames)
    }

    fn dispatch<E: Effect>(&self, effect: &mut E, event: &Event) {
        match event {
            Event::Key(key) if is_quit(key) => self.cancel.cancel(),
            Event::Resize(cols, rows) => {
                tracing::debug!(cols, rows, "terminal resized");
                effect.resize(*cols as usize, *rows as usize * 2);
            }
            _ => effect.handle_event(event),
        }
    }

    fn present<E: Effect, W: Write>(&mut self, effect: &E, out: &mut W) -> std::io::Result<()> {
        self.output_buf.clear();
        effect.canvas().write_half_blocks(&mut self.output_buf)?;
        out.write_all(&self.output_buf)?;
        out.flush()
    }
}

fn is_quit(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('q')
        || key.code == KeyCode::Esc
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::config::FireworksConfig;
    use crate::effects::fireworks::FireworksEffect;

    #[test]
    fn clock_emits_one_frame_per_step() {
        let mut clock = FrameClock::new(60);
        assert_eq!(clock.advance(Duration::from_millis(10)), 0);
        assert_eq!(clock.advance(Duration::from_millis(10)), 1);
    }

    #[test]
    fn clock_caps_catch_up_after_a_stall() {
        let mut clock = FrameClock::new(60);
        assert_eq!(clock.advance(Duration::from_secs(5)), 3);
        assert_eq!(clock.advance(Duration::ZERO), 0);
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let handle = CancelHandle::default();
        let other = handle.clone();
        assert!(!other.is_cancelled());
        handle.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn cancelled_loop_runs_no_frames() {
        let canvas = Canvas::new(8, 4, 6.0, (0, 0, 0));
        let mut effect = FireworksEffect::new(canvas, FireworksConfig::default(), fastrand::Rng::with_seed(1));
        let mut frame_loop = FrameLoop::new(60);
        frame_loop.cancel_handle().cancel();

        let mut out = Vec::new();
        assert_eq!(frame_loop.run(&mut effect, &mut out).unwrap(), 0);
        assert!(out.is_empty());
        assert!(effect.fireworks().is_empty());
    }

    #[test]
    fn quit_key_cancels_through_the_shared_handle() {
        let canvas = Canvas::new(8, 4, 6.0, (0, 0, 0));
        let mut effect = FireworksEffect::new(canvas, FireworksConfig::default(), fastrand::Rng::with_seed(1));
        let frame_loop = FrameLoop::new(60);
        let handle = frame_loop.cancel_handle();

        frame_loop.dispatch(&mut effect, &Event::Key(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::NONE)));
        assert!(!handle.is_cancelled());
        frame_loop.dispatch(&mut effect, &Event::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(handle.is_cancelled());
    }

    #[test]
    fn resize_event_doubles_rows_into_raster_pixels() {
        let canvas = Canvas::new(8, 4, 6.0, (0, 0, 0));
        let mut effect = FireworksEffect::new(canvas, FireworksConfig::default(), fastrand::Rng::with_seed(1));
        FrameLoop::new(60).dispatch(&mut effect, &Event::Resize(20, 7));
        assert_eq!((effect.canvas().cols(), effect.canvas().rows()), (20, 14));
    }

    #[test]
    fn quit_keys() {
        assert!(is_quit(&KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(is_quit(&KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(is_quit(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_quit(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE)));
    }
}
