//! Automatic estimation of the linear intensity range.
//!
//! Points are grouped by concentration and each group's sensitivity
//! (`intensity / concentration`) is compared with the lowest-concentration
//! group. Absorption flattens the response at high intensity, so sensitivity
//! drops as concentration grows; the domain ends at the last group that is
//! still within `tolerance` of the first.

use crate::domain::Bounds;
use crate::error::FitError;
use crate::fit::engine::FitPoint;
use crate::math::nan_mean;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ConcentrationGroup {
    pub concentration: f64,
    pub intensity: f64,
}

/// Mean intensity per distinct positive concentration, ascending.
pub(crate) fn concentration_groups(points: &[FitPoint]) -> Vec<ConcentrationGroup> {
    let mut usable: Vec<FitPoint> = points
        .iter()
        .copied()
        .filter(|p| p.concentration > 0.0 && p.intensity.is_finite() && p.intensity > 0.0)
        .collect();
    usable.sort_by(|a, b| a.concentration.total_cmp(&b.concentration));

    usable
        .chunk_by(|a, b| a.concentration == b.concentration)
        .map(|group| ConcentrationGroup {
            concentration: group[0].concentration,
            intensity: nan_mean(group.iter().map(|p| p.intensity)),
        })
        .collect()
}

pub fn estimate_linear_bounds(points: &[FitPoint], tolerance: f64) -> Result<Bounds, FitError> {
    let groups = concentration_groups(points);
    if groups.len() < 2 {
        return Err(FitError::TooFewPoints {
            required: 2,
            got: groups.len(),
        });
    }

    let sensitivity = |g: &ConcentrationGroup| g.intensity / g.concentration;
    let reference = sensitivity(&groups[0]);

    let linear = groups
        .iter()
        .take_while(|g| (sensitivity(g) / reference - 1.0).abs() <= tolerance)
        .count();
    // Keep at least two groups so the fit has a slope to work with.
    let last = linear.max(2) - 1;

    let lb = groups
        .iter()
        .map(|g| g.intensity)
        .fold(f64::INFINITY, f64::min);
    Ok(Bounds::ordered(lb, groups[last].intensity)?)
}
