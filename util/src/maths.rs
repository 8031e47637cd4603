//! Utility maths functions
//!
//! Includes the input shaping and angle helpers used by the drivetrain, and a
//! polynomial inverse-trigonometry implementation kept for platforms where the
//! native functions are unavailable or imprecise.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default tolerance for [`epsilon_equals`].
pub const EPSILON: f64 = 1e-9;

// Coefficients of the rational polynomial approximation of arctangent. These
// values are carried over unchanged from the legacy implementation so that
// the approximation remains numerically identical to it.
const SQ2P1: f64 = 2.414213562373095048802e0;
const SQ2M1: f64 = 0.414213562373095048802e0;
const P4: f64 = 0.161536412982230228262e2;
const P3: f64 = 0.26842548195503973794141e3;
const P2: f64 = 0.11530293515404850115428136e4;
const P1: f64 = 0.178040631643319697105464587e4;
const P0: f64 = 0.89678597403663861959987488e3;
const Q4: f64 = 0.5895697050844462222791e2;
const Q3: f64 = 0.536265374031215315104235e3;
const Q2: f64 = 0.16667838148816337184521798e4;
const Q1: f64 = 0.207933497444540981287275926e4;
const Q0: f64 = 0.89678597403663861962481162e3;
const PIO2: f64 = 1.5707963267948966135e0;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Apply a deadband to an input value.
///
/// Values inside the deadband are zeroed, values outside it are rescaled so
/// that the output remains continuous and reaches ±1 at ±1 input.
pub fn deadband(value: f64, deadband: f64) -> f64 {
    if value.abs() > deadband {
        if value > 0.0 {
            (value - deadband) / (1.0 - deadband)
        } else {
            (value + deadband) / (1.0 - deadband)
        }
    } else {
        0.0
    }
}

/// Shape a joystick axis: deadband followed by signed squaring.
///
/// Squaring gives finer control at low speed while keeping full authority at
/// the ends of the stick travel.
pub fn modify_axis(value: f64, deadband_value: f64) -> f64 {
    let value = deadband(value, deadband_value);
    (value * value).copysign(value)
}

/// Normalise an angle in degrees into the range [0, 360).
pub fn normalize_deg(angle_deg: f64) -> f64 {
    let mut a = angle_deg / 360.0;
    a -= a.trunc();
    if a > 0.0 {
        a * 360.0
    } else {
        (1.0 + a) * 360.0
    }
}

/// Get the shortest signed angular difference `a - b` in degrees.
///
/// The result is in the range (-180, 180], accounting for wrapping.
pub fn angle_delta_deg(a_deg: f64, b_deg: f64) -> f64 {
    let mut delta = normalize_deg(a_deg) - normalize_deg(b_deg);
    if delta > 180.0 {
        delta -= 360.0;
    }
    if delta <= -180.0 {
        delta += 360.0;
    }
    delta
}

/// Determine if two values are equal within the default [`EPSILON`].
pub fn epsilon_equals(a: f64, b: f64) -> bool {
    epsilon_equals_eps(a, b, EPSILON)
}

/// Determine if two values are equal within the given tolerance.
pub fn epsilon_equals_eps(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float,
{
    target_range.0
        + ((value - source_range.0) * (target_range.1 - target_range.0)
            / (source_range.1 - source_range.0))
}

/// Clamp a value to the given bounds.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float,
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Get the signed angular distance between two angles in the range [0, 2pi].
///
/// This function will return the shortest signed distance between a and b
/// accounting for wrapping between 0 and 2pi.
pub fn get_ang_dist_2pi<T>(a: T, b: T) -> T
where
    T: Float,
{
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    let c = rem_euclid(a - b, tau_t);
    let d = rem_euclid(b - a, tau_t);

    if c < d {
        -c
    } else {
        d
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::from(0.0).unwrap() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Polynomial implementation of arctangent.
pub fn atan(arg: f64) -> f64 {
    if arg > 0.0 {
        msatan(arg)
    } else {
        -msatan(-arg)
    }
}

/// Polynomial implementation of the two-argument arctangent.
pub fn atan2(arg1: f64, arg2: f64) -> f64 {
    if arg1 + arg2 == arg1 {
        if arg1 >= 0.0 {
            return PIO2;
        }
        return -PIO2;
    }

    let arg1 = atan(arg1 / arg2);
    if arg2 < 0.0 {
        if arg1 <= 0.0 {
            return arg1 + std::f64::consts::PI;
        }
        return arg1 - std::f64::consts::PI;
    }
    arg1
}

/// Polynomial implementation of arcsine.
///
/// Returns NaN outside the domain [-1, 1].
pub fn asin(arg: f64) -> f64 {
    let mut arg = arg;
    let mut sign = false;

    if arg < 0.0 {
        arg = -arg;
        sign = true;
    }
    if arg > 1.0 {
        return f64::NAN;
    }

    let temp = (1.0 - arg * arg).sqrt();
    let mut temp = if arg > 0.7 {
        PIO2 - atan(temp / arg)
    } else {
        atan(arg / temp)
    };

    if sign {
        temp = -temp;
    }
    temp
}

/// Polynomial implementation of arccosine.
///
/// Returns NaN outside the domain [-1, 1].
pub fn acos(arg: f64) -> f64 {
    if arg > 1.0 || arg < -1.0 {
        return f64::NAN;
    }
    PIO2 - asin(arg)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Rational polynomial approximation of atan over [0, sqrt(2) - 1].
fn mxatan(arg: f64) -> f64 {
    let argsq = arg * arg;
    let value = (((P4 * argsq + P3) * argsq + P2) * argsq + P1) * argsq + P0;
    let value = value / (((((argsq + Q4) * argsq + Q3) * argsq + Q2) * argsq + Q1) * argsq + Q0);
    value * arg
}

/// Range-reduced atan for nonnegative arguments.
fn msatan(arg: f64) -> f64 {
    if arg < SQ2M1 {
        return mxatan(arg);
    }
    if arg > SQ2P1 {
        return PIO2 - mxatan(1.0 / arg);
    }
    PIO2 / 2.0 + mxatan((arg - 1.0) / (arg + 1.0))
}
