//! Off-screen RGB raster with a logical coordinate space, presented to the
//! terminal as half-block cells (two raster rows per terminal row).

use std::io::Write;

pub type Rgb = (u8, u8, u8);

/// How a source color combines with what is already on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blend {
    SourceOver,
    /// `1 - (1 - dst)(1 - src)` per channel, then mixed in by alpha.
    Screen,
}

pub struct Canvas {
    cols: usize,
    rows: usize,
    scale: f32,
    background: Rgb,
    pixels: Vec<[f32; 3]>,
}

impl Canvas {
    /// `cols`×`rows` raster pixels, each covering `scale` logical pixels per side.
    pub fn new(cols: usize, rows: usize, scale: f32, background: Rgb) -> Self {
        let scale = scale.max(1.0);
        Self {
            cols,
            rows,
            scale,
            background,
            pixels: vec![to_f32(background); cols * rows],
        }
    }

    /// Changes the raster size; like a browser canvas, the content is reset.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        self.cols = cols;
        self.rows = rows;
        self.pixels = vec![to_f32(self.background); cols * rows];
    }

    pub fn width(&self) -> f32 {
        self.cols as f32 * self.scale
    }

    pub fn height(&self) -> f32 {
        self.rows as f32 * self.scale
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn clear(&mut self, color: Rgb) {
        self.pixels.fill(to_f32(color));
    }

    pub fn pixel(&self, col: usize, row: usize) -> Rgb {
        let [r, g, b] = self.pixels[row * self.cols + col];
        (r as u8, g as u8, b as u8)
    }

    /// Source-over fill of the whole canvas; repeated low-alpha fills leave fading trails.
    pub fn fill_rect_alpha(&mut self, color: Rgb, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        let src = to_f32(color);
        for px in &mut self.pixels {
            *px = mix(*px, src, alpha);
        }
    }

    /// Blends one raster pixel. Out-of-range coordinates are ignored.
    pub fn blend_pixel(&mut self, col: isize, row: isize, color: Rgb, alpha: f32, blend: Blend) {
        if col < 0 || row < 0 || col as usize >= self.cols || row as usize >= self.rows {
            return;
        }
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha == 0.0 {
            return;
        }
        let idx = row as usize * self.cols + col as usize;
        let dst = self.pixels[idx];
        let src = to_f32(color);
        let src = match blend {
            Blend::SourceOver => src,
            Blend::Screen => [
                screen(dst[0], src[0]),
                screen(dst[1], src[1]),
                screen(dst[2], src[2]),
            ],
        };
        self.pixels[idx] = mix(dst, src, alpha);
    }

    /// Blends a pixel given in logical coordinates.
    pub fn plot(&mut self, x: f32, y: f32, color: Rgb, alpha: f32, blend: Blend) {
        let col = (x / self.scale).floor() as isize;
        let row = (y / self.scale).floor() as isize;
        self.blend_pixel(col, row, color, alpha, blend);
    }

    /// Filled circle in logical coordinates. A circle smaller than one raster
    /// pixel lands on the pixel under its center, weighted by covered area.
    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgb, alpha: f32, blend: Blend) {
        let radius = radius.max(0.0);
        let mut hits = 0;
        self.for_each_center(cx, cy, radius, |canvas, col, row, dist| {
            if dist <= radius {
                canvas.blend_pixel(col, row, color, alpha, blend);
                hits += 1;
            }
        });

        if hits == 0 {
            let coverage = (std::f32::consts::PI * radius * radius / (self.scale * self.scale)).min(1.0);
            self.plot(cx, cy, color, alpha * coverage, blend);
        }
    }

    /// One-logical-pixel outline, widened to at least one raster pixel.
    pub fn stroke_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgb, alpha: f32) {
        let half_width = self.scale * 0.5;
        let radius = radius.max(0.0);
        let mut hits = 0;
        self.for_each_center(cx, cy, radius + half_width, |canvas, col, row, dist| {
            if (dist - radius).abs() <= half_width {
                canvas.blend_pixel(col, row, color, alpha, Blend::SourceOver);
                hits += 1;
            }
        });

        if hits == 0 {
            self.plot(cx, cy, color, alpha, Blend::SourceOver);
        }
    }

    fn for_each_center<F>(&mut self, cx: f32, cy: f32, reach: f32, mut visit: F)
    where
        F: FnMut(&mut Self, isize, isize, f32),
    {
        let min_col = ((cx - reach) / self.scale).floor().max(0.0) as isize;
        let max_col = ((cx + reach) / self.scale).ceil().min(self.cols as f32) as isize;
        let min_row = ((cy - reach) / self.scale).floor().max(0.0) as isize;
        let max_row = ((cy + reach) / self.scale).ceil().min(self.rows as f32) as isize;

        for row in min_row..max_row {
            let py = (row as f32 + 0.5) * self.scale;
            for col in min_col..max_col {
                let px = (col as f32 + 0.5) * self.scale;
                let dist = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
                visit(self, col, row, dist);
            }
        }
    }

    /// Appends the whole raster as ANSI truecolor half-blocks, homed at the top-left.
    pub fn write_half_blocks(&self, out: &mut Vec<u8>) -> std::io::Result<()> {
        out.extend_from_slice(b"\x1b[H");

        let mut prev_top: Option<Rgb> = None;
        let mut prev_bot: Option<Rgb> = None;

        for row in (0..self.rows).step_by(2) {
            for col in 0..self.cols {
                let top = self.pixel(col, row);
                let bot = if row + 1 < self.rows { self.pixel(col, row + 1) } else { self.background };

                if prev_top != Some(top) {
                    write!(out, "\x1b[48;2;{};{};{}m", top.0, top.1, top.2)?;
                    prev_top = Some(top);
                }
                if prev_bot != Some(bot) {
                    write!(out, "\x1b[38;2;{};{};{}m", bot.0, bot.1, bot.2)?;
                    prev_bot = Some(bot);
                }

                out.extend_from_slice("▄".as_bytes());
            }
            out.extend_from_slice(b"\x1b[0m");
            prev_top = None;
            prev_bot = None;
            if row + 2 < self.rows {
                out.extend_from_slice(b"\r\n");
            }
        }
        Ok(())
    }
}

fn to_f32(color: Rgb) -> [f32; 3] {
    [color.0 as f32, color.1 as f32, color.2 as f32]
}

#[inline]
fn mix(dst: [f32; 3], src: [f32; 3], alpha: f32) -> [f32; 3] {
    [
        dst[0] * (1.0 - alpha) + src[0] * alpha,
        dst[1] * (1.0 - alpha) + src[1] * alpha,
        dst[2] * (1.0 - alpha) + src[2] * alpha,
    ]
}

#[inline]
fn screen(dst: f32, src: f32) -> f32 {
    255.0 - (255.0 - dst) * (255.0 - src) / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_size_follows_scale() {
        let canvas = Canvas::new(40, 20, 6.0, (0, 0, 0));
        assert_eq!(canvas.width(), 240.0);
        assert_eq!(canvas.height(), 120.0);
    }

    #[test]
    fn trail_fade_never_fully_clears() {
        let mut canvas = Canvas::new(1, 1, 1.0, (0, 0, 0));
        canvas.blend_pixel(0, 0, (200, 200, 200), 1.0, Blend::SourceOver);
        for _ in 0..10 {
            canvas.fill_rect_alpha((0, 0, 0), 0.1);
        }
        let (r, _, _) = canvas.pixel(0, 0);
        // 200 * 0.9^10 ≈ 69.7
        assert_eq!(r, 69);
    }

    #[test]
    fn screen_blend_only_brightens() {
        let mut canvas = Canvas::new(1, 1, 1.0, (100, 50, 0));
        canvas.blend_pixel(0, 0, (100, 100, 100), 1.0, Blend::Screen);
        let (r, g, b) = canvas.pixel(0, 0);
        assert!(r >= 100 && g >= 100 && b >= 100);
        assert_eq!(r, 160);
    }

    #[test]
    fn out_of_range_and_negative_alpha_are_ignored() {
        let mut canvas = Canvas::new(2, 2, 1.0, (0, 0, 0));
        canvas.blend_pixel(-1, 0, (255, 255, 255), 1.0, Blend::SourceOver);
        canvas.blend_pixel(0, 5, (255, 255, 255), 1.0, Blend::SourceOver);
        canvas.blend_pixel(0, 0, (255, 255, 255), -0.5, Blend::SourceOver);
        for row in 0..2 {
            for col in 0..2 {
                assert_eq!(canvas.pixel(col, row), (0, 0, 0));
            }
        }
    }

    #[test]
    fn tiny_circle_lands_on_center_pixel() {
        let mut canvas = Canvas::new(10, 10, 6.0, (0, 0, 0));
        canvas.fill_circle(13.0, 13.0, 1.0, (255, 255, 255), 1.0, Blend::SourceOver);
        let lit: Vec<_> = (0..10)
            .flat_map(|row| (0..10).map(move |col| (col, row)))
            .filter(|&(col, row)| canvas.pixel(col, row) != (0, 0, 0))
            .collect();
        assert_eq!(lit, vec![(2, 2)]);
    }

    #[test]
    fn large_circle_covers_its_interior() {
        let mut canvas = Canvas::new(20, 20, 1.0, (0, 0, 0));
        canvas.fill_circle(10.0, 10.0, 5.0, (255, 0, 0), 1.0, Blend::SourceOver);
        assert_eq!(canvas.pixel(10, 10), (255, 0, 0));
        assert_eq!(canvas.pixel(0, 0), (0, 0, 0));
    }

    #[test]
    fn stroke_leaves_center_untouched() {
        let mut canvas = Canvas::new(30, 30, 1.0, (0, 0, 0));
        canvas.stroke_circle(15.0, 15.0, 10.0, (0, 255, 0), 1.0);
        assert_eq!(canvas.pixel(15, 15), (0, 0, 0));
        assert_eq!(canvas.pixel(24, 15), (0, 255, 0));
    }

    #[test]
    fn half_blocks_emit_one_glyph_per_cell() {
        let canvas = Canvas::new(3, 4, 1.0, (1, 2, 3));
        let mut out = Vec::new();
        canvas.write_half_blocks(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("\x1b[H"));
        assert_eq!(text.matches('▄').count(), 6);
        assert_eq!(text.matches("\r\n").count(), 1);
        assert!(text.contains("\x1b[48;2;1;2;3m"));
    }
}
