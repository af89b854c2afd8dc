//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Get the signed shortest angular distance from `a` to `b`.
///
/// The result is in the range [-pi, pi), positive if `b` is anticlockwise of
/// `a`.
pub fn get_ang_dist<T>(a: T, b: T) -> T
where
    T: Float
{
    wrap_to_pi(b - a)
}

/// Wrap an angle into the range [-pi, pi).
pub fn wrap_to_pi<T>(value: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap_or_else(T::zero);
    let tau_t: T = pi_t + pi_t;

    rem_euclid(value + pi_t, tau_t) - pi_t
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()` if `self` is much smaller than `rhs.abs()` in
/// magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}
