//! NaN-aware reductions.
//!
//! Masked waveform samples are stored as NaN, so every reduction over
//! waveforms or calibration rows skips them.

/// Maximum over the finite values; NaN when there are none.
pub fn nan_max(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
        .unwrap_or(f64::NAN)
}

/// Mean over the non-NaN values; NaN when there are none.
pub fn nan_mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { f64::NAN } else { sum / n as f64 }
}
