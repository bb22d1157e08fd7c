use rand::Rng;
use std::time::Duration;

/// Exponent at which the backoff ceiling stops growing (2^10 s, about 17 minutes).
pub const MAX_EXPONENT: u32 = 10;

/// Full-jitter exponential backoff: a uniform wait in `[0, 2^attempt)` seconds.
///
/// `attempt` is 1-based and counts the attempt that just failed. The ceiling is
/// clamped at `2^MAX_EXPONENT` seconds.
pub fn delay(attempt: u32) -> Duration {
    let ceiling = ceiling_secs(attempt);
    let seconds = rand::thread_rng().gen_range(0.0..ceiling);
    Duration::from_secs_f64(seconds)
}

pub fn ceiling_secs(attempt: u32) -> f64 {
    f64::from(2u32.pow(attempt.clamp(1, MAX_EXPONENT)))
}
