//! Pure probability helpers shared by the state machine and the contamination grid.
//! Every probability is clamped before it reaches the random source, so no input
//! can make a draw panic.

use rand::Rng;

pub const SEC_PER_DAY: f64 = 86_400.0;

/// Reference duration of a "prolonged contact" with a location.
pub const PROLONGED_CONTACT_SECONDS: f64 = 5.0 * 60.0;

/// Clamps `p` into [0, 1]. NaN becomes 0.
#[inline(always)]
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

/// Probability that a stage with exponentially distributed duration of mean
/// `mean_days` ends within the next `seconds`.
pub fn stage_exit_probability(seconds: f64, mean_days: f64) -> f64 {
    if !(seconds > 0.0) {
        return 0.0;
    }
    if !(mean_days > 0.0) {
        return 1.0;
    }
    clamp_probability(1.0 - (-seconds / (mean_days * SEC_PER_DAY)).exp())
}

/// Raises a bad-outcome probability by a per-agent risk.
/// Identity for `risk == 0`, certainty for `risk == 1`.
pub fn magnify_risk(p_base: f64, risk: f64) -> f64 {
    let p = clamp_probability(p_base);
    let r = clamp_probability(risk);
    clamp_probability(1.0 - (1.0 - p) * (1.0 - r))
}

/// Probability of a prolonged-contact event with base probability `p_base`
/// after spending `seconds` spread evenly over `cell_count` cells.
pub fn exposure_probability(p_base: f64, seconds: f64, cell_count: usize) -> f64 {
    if cell_count == 0 || !(seconds > 0.0) {
        return 0.0;
    }
    let p = clamp_probability(p_base);
    let exposure = seconds / (cell_count as f64 * PROLONGED_CONTACT_SECONDS);
    clamp_probability(1.0 - (1.0 - p).powf(exposure))
}

/// Raises a catch probability with the contamination level of a cell,
/// saturating towards 1 as the level grows.
pub fn amplify_by_level(p_base: f64, level: u32) -> f64 {
    if level == 0 {
        return 0.0;
    }
    clamp_probability(1.0 - (1.0 - clamp_probability(p_base)) / level as f64)
}

/// Bernoulli draw that never panics.
#[inline(always)]
pub fn chance<R: Rng>(rng: &mut R, p: f64) -> bool {
    rng.random_bool(clamp_probability(p))
}
