//! Glyph rasterization.
//!
//! The engine only needs "a dark glyph on a light canvas of a given size";
//! real font shaping lives with the caller, who can plug its own
//! [`GlyphRenderer`]. The built-in [`StrokeGlyphRenderer`] draws each
//! character as a deterministic set of brush strokes derived from its code
//! point, so identical glyphs always produce identical rasters.
use crate::draw::{draw_disk, draw_thick_line};
use crate::error::ConditioningError;
use crate::image::{ImageF32, Raster};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait GlyphRenderer: Send + Sync {
    /// Render `glyph` black-on-white into a `width × height` RGB raster,
    /// scaling the text to fit.
    fn render(&self, glyph: &str, width: u32, height: u32) -> Result<Raster, ConditioningError>;
}

#[derive(Clone, Copy, Debug)]
pub struct StrokeGlyphRenderer {
    /// Fraction of the cell left empty around each character.
    pub margin: f32,
    /// Stroke width relative to the cell size.
    pub stroke_width: f32,
}

impl Default for StrokeGlyphRenderer {
    fn default() -> Self {
        Self {
            margin: 0.12,
            stroke_width: 0.07,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Stroke {
    Horizontal { y: f32, x0: f32, x1: f32 },
    Vertical { x: f32, y0: f32, y1: f32 },
    Falling { from: [f32; 2], to: [f32; 2] },
    Dot { at: [f32; 2] },
}

fn strokes_for(ch: char) -> Vec<Stroke> {
    let mut rng = StdRng::seed_from_u64(ch as u64);
    let count = rng.gen_range(3..=8);
    (0..count)
        .map(|_| match rng.gen_range(0..10) {
            0..=3 => {
                let y = rng.gen_range(0.1..0.9);
                let x0: f32 = rng.gen_range(0.0..0.4);
                Stroke::Horizontal {
                    y,
                    x0,
                    x1: (x0 + rng.gen_range(0.4..0.9)).min(1.0),
                }
            }
            4..=6 => {
                let x = rng.gen_range(0.1..0.9);
                let y0: f32 = rng.gen_range(0.0..0.4);
                Stroke::Vertical {
                    x,
                    y0,
                    y1: (y0 + rng.gen_range(0.4..0.9)).min(1.0),
                }
            }
            7..=8 => {
                let from: [f32; 2] = [rng.gen_range(0.2..0.8), rng.gen_range(0.0..0.5)];
                let dx: f32 = rng.gen_range(0.25..0.5) * if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                let to = [
                    (from[0] + dx).clamp(0.0, 1.0),
                    (from[1] + rng.gen_range(0.3..0.5)).min(1.0),
                ];
                Stroke::Falling { from, to }
            }
            _ => Stroke::Dot {
                at: [rng.gen_range(0.15..0.85), rng.gen_range(0.1..0.9)],
            },
        })
        .collect()
}

impl GlyphRenderer for StrokeGlyphRenderer {
    fn render(&self, glyph: &str, width: u32, height: u32) -> Result<Raster, ConditioningError> {
        if width == 0 || height == 0 {
            return Err(ConditioningError::Render(format!(
                "cannot render into {width}x{height}"
            )));
        }
        let chars: Vec<char> = glyph.chars().collect();
        let (w, h) = (width as usize, height as usize);
        let mut ink = ImageF32::new(w, h);
        if chars.is_empty() {
            return Ok(ink.inverted().to_gray_raster().to_rgb());
        }

        // Auto-fit: square cells laid out in one row, centred.
        let cell = (w as f32 / chars.len() as f32).min(h as f32);
        let inner = cell * (1.0 - 2.0 * self.margin);
        let pen = (cell * self.stroke_width).max(1.0);
        let left = (w as f32 - cell * chars.len() as f32) * 0.5;
        let top = (h as f32 - cell) * 0.5;

        for (i, &ch) in chars.iter().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let ox = left + i as f32 * cell + cell * self.margin;
            let oy = top + cell * self.margin;
            let at = |p: [f32; 2]| [ox + p[0] * inner, oy + p[1] * inner];
            for stroke in strokes_for(ch) {
                match stroke {
                    Stroke::Horizontal { y, x0, x1 } => {
                        draw_thick_line(&mut ink, at([x0, y]), at([x1, y]), pen, 1.0)
                    }
                    Stroke::Vertical { x, y0, y1 } => {
                        draw_thick_line(&mut ink, at([x, y0]), at([x, y1]), pen, 1.0)
                    }
                    Stroke::Falling { from, to } => {
                        draw_thick_line(&mut ink, at(from), at(to), pen, 1.0)
                    }
                    Stroke::Dot { at: p } => draw_disk(&mut ink, at(p), pen * 0.9, 1.0),
                }
            }
        }
        Ok(ink.inverted().to_gray_raster().to_rgb())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_dark_strokes_on_white() {
        let r = StrokeGlyphRenderer::default().render("火", 256, 256).unwrap();
        assert_eq!(r.size(), (256, 256));
        assert_eq!(r.channels(), 3);
        assert_eq!(r.pixel(0, 0), &[255, 255, 255]);
        let dark = r.data().chunks(3).filter(|p| p[0] < 128).count();
        assert!(dark > 200, "only {dark} ink pixels");
    }

    #[test]
    fn stroke_endpoints_stay_inside_the_cell() {
        let unit = |p: [f32; 2]| (0.0..=1.0).contains(&p[0]) && (0.0..=1.0).contains(&p[1]);
        for ch in "火水木金土永".chars() {
            for stroke in strokes_for(ch) {
                let ok = match stroke {
                    Stroke::Horizontal { y, x0, x1 } => unit([x0, y]) && unit([x1, y]) && x0 <= x1,
                    Stroke::Vertical { x, y0, y1 } => unit([x, y0]) && unit([x, y1]) && y0 <= y1,
                    Stroke::Falling { from, to } => unit(from) && unit(to),
                    Stroke::Dot { at } => unit(at),
                };
                assert!(ok, "{ch}: {stroke:?}");
            }
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let renderer = StrokeGlyphRenderer::default();
        let a = renderer.render("好字", 300, 120).unwrap();
        let b = renderer.render("好字", 300, 120).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, renderer.render("林字", 300, 120).unwrap());
    }
}
