//! Display list execution on a tiny-skia pixmap.

use tiny_skia::{
    FillRule, FilterQuality, GradientStop, LinearGradient, Mask, Paint, Path, PathBuilder, Pattern,
    Pixmap, Point, Shader, SpreadMode, Stroke, Transform,
};

use crate::css::color::Rgba;

use super::font;
use super::layout::{Edges, Rect};
use super::paint::{Clip, DisplayItem, Fill, ImageFit, PaintCommand};
use super::vector::rounded_rect_path;

/// Layers used to approximate a blurred shadow.
const SHADOW_STEPS: usize = 4;

fn skia_color(color: Rgba, opacity: f32) -> tiny_skia::Color {
    let alpha = (color.a * opacity).clamp(0.0, 1.0);
    tiny_skia::Color::from_rgba8(color.r, color.g, color.b, (alpha * 255.0).round() as u8)
}

fn solid_paint(color: Rgba, opacity: f32) -> Paint<'static> {
    let mut paint = Paint {
        anti_alias: true,
        ..Default::default()
    };
    paint.set_color(skia_color(color, opacity));
    paint
}

/// Paint `items` onto `pixmap`, with CSS px mapped to device px by `scale`.
pub fn paint_display_list(pixmap: &mut Pixmap, items: &[DisplayItem], scale: f32) {
    let base = Transform::from_scale(scale, scale);
    let mut masks = MaskCache::default();
    for item in items {
        let transform = base.pre_concat(item.transform);
        let mask = item.clip.and_then(|clip| masks.get(pixmap, clip, base));
        let mut target = Target {
            pixmap: &mut *pixmap,
            transform,
            mask,
        };
        target.draw(&item.command, item.opacity);
    }
}

#[derive(Default)]
struct MaskCache {
    clip: Option<Clip>,
    mask: Option<Mask>,
}

impl MaskCache {
    fn get(&mut self, pixmap: &Pixmap, clip: Clip, base: Transform) -> Option<&Mask> {
        if self.clip != Some(clip) {
            self.clip = Some(clip);
            self.mask = rounded_rect_path(clip.rect, clip.radius).and_then(|path| {
                let mut mask = Mask::new(pixmap.width(), pixmap.height())?;
                mask.fill_path(&path, FillRule::Winding, true, base.pre_concat(clip.transform));
                Some(mask)
            });
        }
        self.mask.as_ref()
    }
}

struct Target<'p, 'm> {
    pixmap: &'p mut Pixmap,
    transform: Transform,
    mask: Option<&'m Mask>,
}

impl<'p, 'm> Target<'p, 'm> {
    fn fill(&mut self, path: &Path, paint: &Paint<'_>, rule: FillRule) {
        self.pixmap.fill_path(path, paint, rule, self.transform, self.mask);
    }

    fn draw(&mut self, command: &PaintCommand, opacity: f32) {
        match command {
            PaintCommand::Shadow {
                rect,
                radius,
                color,
                blur,
            } => self.draw_shadow(*rect, *radius, *color, *blur, opacity),
            PaintCommand::Background { rect, radius, fill } => {
                if let Some(path) = rounded_rect_path(*rect, *radius) {
                    if let Some(paint) = fill_paint(fill, *rect, opacity) {
                        self.fill(&path, &paint, FillRule::Winding);
                    }
                }
            }
            PaintCommand::Image {
                rect,
                radius,
                image,
                fit,
            } => self.draw_image(*rect, *radius, image, *fit, opacity),
            PaintCommand::Border {
                rect,
                radius,
                widths,
                colors,
            } => self.draw_border(*rect, *radius, widths, colors, opacity),
            PaintCommand::Text {
                x,
                y,
                text,
                font_size,
                color,
            } => {
                if let Some(path) = font::text_path(text, *x, *y, *font_size) {
                    self.fill(&path, &solid_paint(*color, opacity), FillRule::Winding);
                }
            }
            PaintCommand::Path { path, fill, stroke } => {
                if let Some(color) = fill {
                    self.fill(path, &solid_paint(*color, opacity), FillRule::Winding);
                }
                if let Some((color, width)) = stroke {
                    let stroke = Stroke {
                        width: *width,
                        ..Default::default()
                    };
                    let paint = solid_paint(*color, opacity);
                    self.pixmap
                        .stroke_path(path, &paint, &stroke, self.transform, self.mask);
                }
            }
        }
    }

    fn draw_shadow(&mut self, rect: Rect, radius: f32, color: Rgba, blur: f32, opacity: f32) {
        if blur <= 0.0 {
            if let Some(path) = rounded_rect_path(rect, radius) {
                self.fill(&path, &solid_paint(color, opacity), FillRule::Winding);
            }
            return;
        }
        // Stacked layers from blur/2 inside to blur/2 outside the edge.
        let layer = Rgba::new(color.r, color.g, color.b, color.a / SHADOW_STEPS as f32);
        let paint = solid_paint(layer, opacity);
        for step in 0..SHADOW_STEPS {
            let t = (step as f32 + 0.5) / SHADOW_STEPS as f32;
            let grow = blur * (t - 0.5);
            let r = Rect::new(
                rect.x - grow,
                rect.y - grow,
                rect.width + grow * 2.0,
                rect.height + grow * 2.0,
            );
            if r.is_empty() {
                continue;
            }
            if let Some(path) = rounded_rect_path(r, (radius + grow).max(0.0)) {
                self.fill(&path, &paint, FillRule::Winding);
            }
        }
    }

    fn draw_image(&mut self, dest: Rect, radius: f32, image: &Pixmap, fit: ImageFit, opacity: f32) {
        if dest.is_empty() {
            return;
        }
        let (iw, ih) = (image.width() as f32, image.height() as f32);
        let drawn = fitted_rect(dest, iw, ih, fit);
        let Some(visible) = intersect(dest, drawn) else {
            return;
        };
        let image_ts = Transform::from_row(drawn.width / iw, 0.0, 0.0, drawn.height / ih, drawn.x, drawn.y);
        let paint = Paint {
            shader: Pattern::new(image.as_ref(), SpreadMode::Pad, FilterQuality::Bilinear, opacity, image_ts),
            anti_alias: true,
            ..Default::default()
        };
        let radius = if visible == dest { radius } else { 0.0 };
        if let Some(path) = rounded_rect_path(visible, radius) {
            self.fill(&path, &paint, FillRule::Winding);
        }
    }

    fn draw_border(&mut self, rect: Rect, radius: f32, widths: &Edges, colors: &[Rgba; 4], opacity: f32) {
        let uniform_width = widths.top == widths.right && widths.top == widths.bottom && widths.top == widths.left;
        let uniform_color = colors.iter().all(|c| *c == colors[0]);
        if uniform_width && uniform_color {
            let inner = rect.inset(widths);
            let outer_path = rounded_rect_path(rect, radius);
            let inner_radius = (radius - widths.top).max(0.0);
            let mut pb = PathBuilder::new();
            for path in [outer_path, rounded_rect_path(inner, inner_radius)].into_iter().flatten() {
                pb.push_path(&path);
            }
            if let Some(ring) = pb.finish() {
                self.fill(&ring, &solid_paint(colors[0], opacity), FillRule::EvenOdd);
            }
            return;
        }

        // Mixed sides: one trapezoid per side, corners mitred.
        let (x0, y0, x1, y1) = (rect.x, rect.y, rect.right(), rect.bottom());
        let inner = rect.inset(widths);
        let (ix0, iy0, ix1, iy1) = (inner.x, inner.y, inner.right(), inner.bottom());
        let sides = [
            [(x0, y0), (x1, y0), (ix1, iy0), (ix0, iy0)],
            [(x1, y0), (x1, y1), (ix1, iy1), (ix1, iy0)],
            [(x1, y1), (x0, y1), (ix0, iy1), (ix1, iy1)],
            [(x0, y1), (x0, y0), (ix0, iy0), (ix0, iy1)],
        ];
        let side_widths = [widths.top, widths.right, widths.bottom, widths.left];
        for ((quad, color), width) in sides.iter().zip(colors).zip(side_widths) {
            if width <= 0.0 || color.is_transparent() {
                continue;
            }
            let mut pb = PathBuilder::new();
            pb.move_to(quad[0].0, quad[0].1);
            for &(x, y) in &quad[1..] {
                pb.line_to(x, y);
            }
            pb.close();
            if let Some(path) = pb.finish() {
                self.fill(&path, &solid_paint(*color, opacity), FillRule::Winding);
            }
        }
    }
}

fn fill_paint(fill: &Fill, rect: Rect, opacity: f32) -> Option<Paint<'static>> {
    match fill {
        Fill::Solid(color) => Some(solid_paint(*color, opacity)),
        Fill::LinearGradient { angle, stops } => {
            let (start, end) = gradient_line(rect, *angle);
            let stops = stops
                .iter()
                .map(|(offset, color)| GradientStop::new(*offset, skia_color(*color, opacity)))
                .collect();
            let shader: Shader<'static> =
                LinearGradient::new(start, end, stops, SpreadMode::Pad, Transform::identity())?;
            Some(Paint {
                shader,
                anti_alias: true,
                ..Default::default()
            })
        }
    }
}

/// Start and end of a CSS gradient line for `angle` across `rect`.
fn gradient_line(rect: Rect, angle: f32) -> (Point, Point) {
    let rad = angle.to_radians();
    let (sin, cos) = rad.sin_cos();
    let half = (rect.width * sin.abs() + rect.height * cos.abs()) / 2.0;
    let (cx, cy) = (rect.x + rect.width / 2.0, rect.y + rect.height / 2.0);
    let (dx, dy) = (sin * half, -cos * half);
    (Point::from_xy(cx - dx, cy - dy), Point::from_xy(cx + dx, cy + dy))
}

/// Where an `iw`x`ih` image lands inside `dest` for the given fit.
pub(crate) fn fitted_rect(dest: Rect, iw: f32, ih: f32, fit: ImageFit) -> Rect {
    let centered = |w: f32, h: f32| Rect::new(dest.x + (dest.width - w) / 2.0, dest.y + (dest.height - h) / 2.0, w, h);
    let sx = dest.width / iw;
    let sy = dest.height / ih;
    match fit {
        ImageFit::Fill => dest,
        ImageFit::Contain => {
            let s = sx.min(sy);
            centered(iw * s, ih * s)
        }
        ImageFit::Cover => {
            let s = sx.max(sy);
            centered(iw * s, ih * s)
        }
        ImageFit::ScaleDown => {
            let s = sx.min(sy).min(1.0);
            centered(iw * s, ih * s)
        }
        ImageFit::None => Rect::new(dest.x, dest.y, iw, ih),
    }
}

fn intersect(a: Rect, b: Rect) -> Option<Rect> {
    let x = a.x.max(b.x);
    let y = a.y.max(b.y);
    let r = Rect::new(x, y, a.right().min(b.right()) - x, a.bottom().min(b.bottom()) - y);
    (!r.is_empty()).then_some(r)
}
