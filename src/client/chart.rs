//! Burst chart geometry: a connected polyline over the rolling buffer,
//! 5 units per sample with 10-unit margins, vertically scaled so the
//! denominator never drops below 50 (a flat buffer stays near the floor
//! instead of dividing by zero).

pub const X_STEP: f64 = 5.0;
pub const X_MARGIN: f64 = 10.0;
pub const Y_MARGIN: f64 = 10.0;
pub const SCALE_HEADROOM: f64 = 20.0;
pub const MIN_SCALE_CEILING: f64 = 50.0;

pub fn vertical_scale(height: f64, values: &[u64]) -> f64 {
    let peak = values.iter().copied().max().unwrap_or(0) as f64;
    (height - SCALE_HEADROOM) / peak.max(MIN_SCALE_CEILING)
}

/// Screen-space points (y grows downwards, like a canvas).
pub fn polyline(height: f64, values: &[u64]) -> Vec<(f64, f64)> {
    let scale = vertical_scale(height, values);
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            (
                i as f64 * X_STEP + X_MARGIN,
                height - Y_MARGIN - v as f64 * scale,
            )
        })
        .collect()
}

/// Widest x the polyline can reach, for axis bounds.
pub fn x_extent(capacity: usize) -> f64 {
    (capacity.saturating_sub(1)) as f64 * X_STEP + 2.0 * X_MARGIN
}
