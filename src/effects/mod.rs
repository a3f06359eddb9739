use crate::canvas::Canvas;
use crossterm::event::Event;

pub mod fireworks;
pub mod model_view;
pub mod weather;

/// One self-contained animation driven by the frame loop.
pub trait Effect {
    /// Advances the animation by exactly one display frame, drawing into the canvas.
    fn tick(&mut self);
    fn canvas(&self) -> &Canvas;
    /// New raster size in pixels (terminal rows × 2).
    fn resize(&mut self, cols: usize, rows: usize);
    fn handle_event(&mut self, _event: &Event) {}
}
