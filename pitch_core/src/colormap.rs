//! 256-entry viridis lookup table.

use std::sync::OnceLock;

use image::Rgba;

pub const COLORMAP_LEN: usize = 256;

/// Viridis control points as (position, rgb).
const VIRIDIS_STOPS: [(f32, [u8; 3]); 9] = [
    (0.00, [68, 1, 84]),
    (0.13, [71, 44, 122]),
    (0.25, [59, 81, 139]),
    (0.38, [44, 113, 142]),
    (0.50, [33, 144, 141]),
    (0.63, [39, 173, 129]),
    (0.75, [92, 200, 99]),
    (0.88, [170, 220, 50]),
    (1.00, [253, 231, 37]),
];

static VIRIDIS: OnceLock<[Rgba<u8>; COLORMAP_LEN]> = OnceLock::new();

/// Process-wide viridis table, built on first use and never mutated.
pub fn viridis() -> &'static [Rgba<u8>; COLORMAP_LEN] {
    VIRIDIS.get_or_init(build_viridis)
}

fn build_viridis() -> [Rgba<u8>; COLORMAP_LEN] {
    let mut table = [Rgba([0, 0, 0, 255]); COLORMAP_LEN];
    for (i, entry) in table.iter_mut().enumerate() {
        let t = i as f32 / (COLORMAP_LEN - 1) as f32;
        // Last stop whose position is <= t, kept one short of the end so
        // there is always an upper neighbour.
        let lo = VIRIDIS_STOPS
            .iter()
            .rposition(|(pos, _)| *pos <= t)
            .unwrap_or(0)
            .min(VIRIDIS_STOPS.len() - 2);
        let (p0, c0) = VIRIDIS_STOPS[lo];
        let (p1, c1) = VIRIDIS_STOPS[lo + 1];
        let amt = ((t - p0) / (p1 - p0)).clamp(0.0, 1.0);

        let mut rgb = [0u8; 3];
        for ch in 0..3 {
            rgb[ch] = lerp_u8(c0[ch], c1[ch], amt);
        }
        *entry = Rgba([rgb[0], rgb[1], rgb[2], 255]);
    }
    table
}

fn lerp_u8(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round() as u8
}

/// Map a normalized value to a table index: `round(n * 255)` clamped to `[0, 255]`.
pub fn color_index(normalized: f64) -> u8 {
    if normalized.is_nan() {
        return 0;
    }
    (normalized * (COLORMAP_LEN - 1) as f64).round().clamp(0.0, (COLORMAP_LEN - 1) as f64) as u8
}
