//! False-colour rendering of a magnitude matrix.

use std::time::Instant;

use image::RgbaImage;
use ndarray::Array2;
use tracing::debug;

use crate::colormap::{color_index, viridis};
use crate::document::MagnitudeMatrix;

/// Colormap index for every cell, `[band, time]` in input (low band first) order.
///
/// Normalization uses the global min/max. A flat matrix maps every cell to
/// index 0.
pub fn color_indices(matrix: &MagnitudeMatrix) -> Array2<u8> {
    let (min, max) = matrix.min_max();
    let span = max - min;
    if !(span > 0.0) {
        return Array2::zeros((matrix.rows(), matrix.cols()));
    }
    matrix.values().mapv(|v| color_index((v - min) / span))
}

/// Render at one pixel per cell (`cols x rows`).
pub fn render_heatmap_native(matrix: &MagnitudeMatrix) -> RgbaImage {
    render_heatmap(matrix, matrix.cols() as u32, matrix.rows() as u32)
}

/// Render the matrix into a `width x height` RGBA buffer.
///
/// Rows are flipped so the highest band is at the top. Each cell covers a
/// `floor(cell)` pixel footprint starting at `floor(index * cell)`; when the
/// cell size is fractional this leaves uncovered (transparent) seams.
pub fn render_heatmap(matrix: &MagnitudeMatrix, width: u32, height: u32) -> RgbaImage {
    let start = Instant::now();
    let indices = color_indices(matrix);
    let table = viridis();

    let (rows, cols) = (matrix.rows(), matrix.cols());
    let (w, h) = (width as usize, height as usize);
    let cell_w = width as f64 / cols as f64;
    let cell_h = height as f64 / rows as f64;
    let foot_w = (cell_w.floor() as usize).max(1);
    let foot_h = (cell_h.floor() as usize).max(1);

    let mut buf = vec![0u8; w * h * 4];
    for screen_row in 0..rows {
        let src_row = rows - 1 - screen_row;
        let y0 = (screen_row as f64 * cell_h).floor() as usize;
        let y1 = (y0 + foot_h).min(h);

        for col in 0..cols {
            let color = table[indices[[src_row, col]] as usize].0;
            let x0 = (col as f64 * cell_w).floor() as usize;
            let x1 = (x0 + foot_w).min(w);

            for y in y0..y1 {
                let line = y * w * 4;
                for x in x0..x1 {
                    let at = line + x * 4;
                    buf[at..at + 4].copy_from_slice(&color);
                }
            }
        }
    }

    debug!(
        "Rendered {}x{} heatmap at {}x{} in {:.2}ms",
        cols,
        rows,
        width,
        height,
        start.elapsed().as_secs_f64() * 1000.0
    );

    // The buffer is exactly w * h * 4 bytes.
    RgbaImage::from_raw(width, height, buf).unwrap_or_else(|| RgbaImage::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn matrix(rows: Vec<Vec<f64>>) -> MagnitudeMatrix {
        MagnitudeMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn test_two_constant_values_hit_table_ends() {
        let m = matrix(vec![vec![0.0, 10.0], vec![10.0, 0.0]]);
        let idx = color_indices(&m);
        assert_eq!(idx[[0, 0]], 0);
        assert_eq!(idx[[0, 1]], 255);
        assert_eq!(idx[[1, 0]], 255);
        assert_eq!(idx[[1, 1]], 0);
    }

    #[test]
    fn test_normalization_is_global_not_per_row() {
        let m = matrix(vec![vec![0.0, 1.0], vec![9.0, 10.0]]);
        let idx = color_indices(&m);
        // Per-row normalization would put (0,1) at 255.
        assert_eq!(idx[[0, 1]], 26);
        assert_eq!(idx[[1, 0]], 230);
    }

    #[test]
    fn test_flat_matrix_renders_lowest_color() {
        let m = matrix(vec![vec![3.0; 4]; 3]);
        let img = render_heatmap_native(&m);
        assert!(img.pixels().all(|p| *p == viridis()[0]));
    }

    #[test]
    fn test_row_zero_paints_bottom() {
        // Only the lowest band is hot.
        let m = matrix(vec![vec![10.0, 10.0], vec![0.0, 0.0], vec![0.0, 0.0]]);
        let img = render_heatmap_native(&m);
        assert_eq!(img.dimensions(), (2, 3));
        assert_eq!(*img.get_pixel(0, 2), viridis()[255]);
        assert_eq!(*img.get_pixel(0, 0), viridis()[0]);
    }

    #[test]
    fn test_integer_upscale_replicates_cells() {
        let m = matrix(vec![vec![0.0, 10.0]]);
        let img = render_heatmap(&m, 4, 3);
        for y in 0..3 {
            assert_eq!(*img.get_pixel(0, y), viridis()[0]);
            assert_eq!(*img.get_pixel(1, y), viridis()[0]);
            assert_eq!(*img.get_pixel(2, y), viridis()[255]);
            assert_eq!(*img.get_pixel(3, y), viridis()[255]);
        }
    }

    #[test]
    fn test_fractional_footprint_leaves_seams() {
        // 2 columns over 5 pixels: cells start at 0 and 2, each 2 wide.
        let m = matrix(vec![vec![0.0, 10.0]]);
        let img = render_heatmap(&m, 5, 1);
        assert_eq!(*img.get_pixel(3, 0), viridis()[255]);
        assert_eq!(*img.get_pixel(4, 0), Rgba([0, 0, 0, 0]));
    }
}
