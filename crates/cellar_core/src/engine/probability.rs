//! Sensor model for CHECK actions.
//!
//! All functions are pure apart from the random draw in [`noisy_reading`].

use rand::Rng;

/// Probability that a check from `distance` reports the truth.
///
/// 1.0 at distance zero, 0.75 at `half_distance`, tending to 0.5 far away.
#[inline]
pub fn efficiency(distance: f64, half_distance: f64) -> f64 {
    (1.0 + (-distance / half_distance).exp2()) * 0.5
}

/// Draws a reading of a binary attribute through a sensor of the given
/// efficiency. Returns the reported value.
pub fn noisy_reading<R: Rng + ?Sized>(truth: bool, efficiency: f64, rng: &mut R) -> bool {
    if rng.gen_bool(efficiency.clamp(0.0, 1.0)) {
        truth
    } else {
        !truth
    }
}
