//! Pitch contour overlay.

use image::Rgba;

use crate::scale::MelScale;
use crate::surface::Surface;

/// Stroke width used for every contour line.
pub const CONTOUR_LINE_WIDTH: f64 = 2.0;

/// Entries that are zero, negative or non-finite mark unvoiced steps.
pub fn is_voiced(hz: f64) -> bool {
    hz.is_finite() && hz > 0.0
}

/// Screen position of contour entry `index` on a canvas `canvas_height` tall.
pub fn contour_point(index: usize, hz: f64, scale: f64, canvas_height: f64, mel: &MelScale) -> (f64, f64) {
    let x = index as f64 * scale;
    let y = canvas_height - mel.band_index(hz) * (canvas_height / mel.bands as f64);
    (x, y)
}

/// Polyline sub-paths for a contour. Unvoiced entries break the line.
pub fn contour_paths(values: &[f64], scale: f64, canvas_height: f64, mel: &MelScale) -> Vec<Vec<(f64, f64)>> {
    let mut paths: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut pen_down = false;

    for (i, &hz) in values.iter().enumerate() {
        if !is_voiced(hz) {
            pen_down = false;
            continue;
        }
        let point = contour_point(i, hz, scale, canvas_height, mel);
        match paths.last_mut() {
            Some(path) if pen_down => path.push(point),
            _ => paths.push(vec![point]),
        }
        pen_down = true;
    }

    paths
}

/// Stroke `values` onto `surface` as one path.
pub fn draw_contour<S: Surface + ?Sized>(surface: &mut S, values: &[f64], color: Rgba<u8>, scale: f64, mel: &MelScale) {
    let height = surface.height() as f64;
    surface.begin_path();
    for path in contour_paths(values, scale, height, mel) {
        let mut points = path.into_iter();
        if let Some((x, y)) = points.next() {
            surface.move_to(x, y);
        }
        for (x, y) in points {
            surface.line_to(x, y);
        }
    }
    surface.stroke(color, CONTOUR_LINE_WIDTH);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::ImageSurface;

    #[test]
    fn test_point_mapping() {
        let mel = MelScale::default();
        // Floor frequency sits on the bottom edge, ceiling on the top.
        assert_eq!(contour_point(3, 40.0, 2.0, 256.0, &mel), (6.0, 256.0));
        assert_eq!(contour_point(0, 16000.0, 1.0, 256.0, &mel), (0.0, 0.0));
    }

    #[test]
    fn test_unvoiced_entries_split_path() {
        let mel = MelScale::default();
        let paths = contour_paths(&[200.0, 210.0, 0.0, 220.0, f64::NAN, -1.0, 230.0, 240.0], 1.0, 256.0, &mel);
        let lens: Vec<usize> = paths.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![2, 1, 2]);
        assert_eq!(paths[2][0].0, 6.0);
    }

    #[test]
    fn test_all_unvoiced_draws_nothing() {
        let mut surface = ImageSurface::new(8, 16);
        draw_contour(&mut surface, &[0.0; 8], Rgba([255, 0, 0, 255]), 1.0, &MelScale::default());
        assert!(surface.image().pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn test_draw_contour_paints_expected_row() {
        let mel = MelScale::default();
        let hz = mel.frequency(64.0); // middle band -> middle of the canvas
        let mut surface = ImageSurface::new(10, 128);
        draw_contour(&mut surface, &[hz; 10], Rgba([255, 0, 0, 255]), 1.0, &mel);
        assert_eq!(*surface.image().get_pixel(5, 64), Rgba([255, 0, 0, 255]));
        assert_eq!(surface.image().get_pixel(5, 10).0[3], 0);
    }
}
