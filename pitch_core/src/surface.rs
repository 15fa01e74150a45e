//! Drawable 2-D pixel surface.
//!
//! Renderers only talk to [`Surface`], which carries the operations a
//! browser canvas offers: raw pixel writes, scaled blits, path strokes and
//! filled rectangles. [`ImageSurface`] implements it over an in-memory
//! `RgbaImage` so frames can be produced headless and encoded to PNG.

use std::collections::BTreeSet;

use image::{imageops, imageops::FilterType, Pixel, Rgba, RgbaImage};

pub trait Surface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Write a pixel buffer at the origin, replacing what is there.
    fn put_image(&mut self, image: &RgbaImage);

    /// Copy `image` stretched over the whole surface (nearest neighbour).
    fn draw_image_scaled(&mut self, image: &RgbaImage);

    fn begin_path(&mut self);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    /// Stroke the current path. The path is kept until the next `begin_path`.
    fn stroke(&mut self, color: Rgba<u8>, line_width: f64);

    /// Fill a rectangle, alpha-blending `color` over the existing pixels.
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgba<u8>);
}

#[derive(Debug, Clone)]
pub struct ImageSurface {
    image: RgbaImage,
    path: Vec<Vec<(f64, f64)>>,
}

impl ImageSurface {
    /// A transparent surface of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
            path: Vec::new(),
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        Self { image, path: Vec::new() }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    fn blend(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        if color.0[3] == 255 {
            self.image.put_pixel(x, y, color);
        } else {
            self.image.get_pixel_mut(x, y).blend(&color);
        }
    }
}

impl Surface for ImageSurface {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn put_image(&mut self, image: &RgbaImage) {
        if image.dimensions() == self.image.dimensions() {
            self.image.copy_from_slice(image.as_raw());
        } else {
            // Clipped to the surface; uncovered pixels are left as they are.
            imageops::replace(&mut self.image, image, 0, 0);
        }
    }

    fn draw_image_scaled(&mut self, image: &RgbaImage) {
        let (w, h) = self.image.dimensions();
        if image.dimensions() == (w, h) {
            self.put_image(image);
        } else if w > 0 && h > 0 && image.width() > 0 && image.height() > 0 {
            let scaled = imageops::resize(image, w, h, FilterType::Nearest);
            imageops::replace(&mut self.image, &scaled, 0, 0);
        }
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.path.push(vec![(x, y)]);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        match self.path.last_mut() {
            Some(sub) => sub.push((x, y)),
            // Canvas semantics: a line_to with no current point acts as move_to.
            None => self.path.push(vec![(x, y)]),
        }
    }

    fn stroke(&mut self, color: Rgba<u8>, line_width: f64) {
        let radius = (line_width / 2.0).max(0.5);
        let (w, h) = (self.image.width() as f64, self.image.height() as f64);
        let mut covered: BTreeSet<(u32, u32)> = BTreeSet::new();

        for sub in &self.path {
            for seg in sub.windows(2) {
                let Some((a, b)) = clip_segment(seg[0], seg[1], -radius, -radius, w + radius, h + radius) else {
                    continue;
                };
                stamp_segment(a, b, radius, w, h, &mut covered);
            }
        }

        // Each pixel is blended once even where segments overlap.
        for (x, y) in covered {
            self.blend(x, y, color);
        }
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgba<u8>) {
        if !(x.is_finite() && y.is_finite() && w.is_finite() && h.is_finite()) {
            return;
        }
        let (x0, x1) = if w < 0.0 { (x + w, x) } else { (x, x + w) };
        let (y0, y1) = if h < 0.0 { (y + h, y) } else { (y, y + h) };

        let px0 = x0.floor().max(0.0) as u32;
        let py0 = y0.floor().max(0.0) as u32;
        let px1 = (x1.ceil().max(0.0) as u32).min(self.image.width());
        let py1 = (y1.ceil().max(0.0) as u32).min(self.image.height());

        for py in py0..py1 {
            for px in px0..px1 {
                self.blend(px, py, color);
            }
        }
    }
}

/// Liang-Barsky clip of segment `a -> b` against a rectangle.
fn clip_segment(
    a: (f64, f64),
    b: (f64, f64),
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
) -> Option<((f64, f64), (f64, f64))> {
    if !(a.0.is_finite() && a.1.is_finite() && b.0.is_finite() && b.1.is_finite()) {
        return None;
    }
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;

    for (p, q) in [
        (-dx, a.0 - xmin),
        (dx, xmax - a.0),
        (-dy, a.1 - ymin),
        (dy, ymax - a.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else {
            let r = q / p;
            if p < 0.0 {
                t0 = t0.max(r);
            } else {
                t1 = t1.min(r);
            }
            if t0 > t1 {
                return None;
            }
        }
    }

    Some((
        (a.0 + t0 * dx, a.1 + t0 * dy),
        (a.0 + t1 * dx, a.1 + t1 * dy),
    ))
}

/// Collect the pixels within `radius` of the segment `a -> b`.
fn stamp_segment(a: (f64, f64), b: (f64, f64), radius: f64, w: f64, h: f64, out: &mut BTreeSet<(u32, u32)>) {
    let len = (b.0 - a.0).abs().max((b.1 - a.1).abs());
    let steps = (len * 2.0).ceil().max(1.0) as usize;

    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let cx = a.0 + (b.0 - a.0) * t;
        let cy = a.1 + (b.1 - a.1) * t;

        let x_lo = (cx - radius).floor().max(0.0);
        let x_hi = (cx + radius).ceil().min(w - 1.0);
        let y_lo = (cy - radius).floor().max(0.0);
        let y_hi = (cy + radius).ceil().min(h - 1.0);
        if x_lo > x_hi || y_lo > y_hi {
            continue;
        }

        for py in y_lo as u32..=y_hi as u32 {
            for px in x_lo as u32..=x_hi as u32 {
                // Distance from the pixel centre to the stamp centre.
                let ddx = px as f64 + 0.5 - cx;
                let ddy = py as f64 + 0.5 - cy;
                if ddx * ddx + ddy * ddy <= radius * radius {
                    out.insert((px, py));
                }
            }
        }
    }
}
