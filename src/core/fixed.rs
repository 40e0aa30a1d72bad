//! Q16.16 Fixed-Point Arithmetic
//!
//! Every position, radius and speed inside the simulation is a Q16.16 value.
//! Floats only exist at the edges (configuration files and wire events) and
//! are converted exactly once, when a match is built or a message arrives.
//!
//! ## Format: Q16.16
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Bit Layout: Q16.16 (32-bit signed integer)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  [S][IIIIIIIIIIIIIIII][FFFFFFFFFFFFFFFF]                    │
//! │   │  └──── 16 bits ────┘└──── 16 bits ────┘                 │
//! │   └─ Sign bit                                               │
//! │                                                             │
//! │  Range: -32768.0 to +32767.99998 world units                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Arenas are a few hundred units across, so a *squared* distance no longer
//! fits in 32 bits. Squared magnitudes are therefore carried as raw Q32.32
//! values in an `i64` and square roots are taken with [`wide_sqrt`].

/// Q16.16 fixed-point number stored as i32.
pub type Fixed = i32;

/// Number of fractional bits (16)
pub const FIXED_SCALE: i32 = 16;

/// 1.0 in fixed-point (65536)
pub const FIXED_ONE: Fixed = 1 << FIXED_SCALE;

/// 0.5 in fixed-point (32768)
pub const FIXED_HALF: Fixed = FIXED_ONE >> 1;

// =============================================================================
// ARENA CONSTANTS
// =============================================================================

/// Default grid cell edge: 20.0 units = 20 * 65536
pub const DEFAULT_CELL_SIZE: Fixed = 1_310_720;

/// Distance between line-of-sight samples: 5.0 units
pub const LOS_SAMPLE_STEP: Fixed = 327_680;

/// Diagonal fallback factor: 0.7 = floor(0.7 * 65536)
pub const DIAGONAL_FACTOR: Fixed = 45_875;

/// Escape jump factor used by the pursuing ladder: 2.0
pub const ESCAPE_JUMP_FACTOR: Fixed = 2 * FIXED_ONE;

/// Default pursuit speed multiplier: 2.5
pub const DEFAULT_PURSUIT_MULTIPLIER: Fixed = 163_840;

/// Largest world-unit magnitude accepted from arena definitions and
/// configuration (2^30 in Q16.16).
pub const MAX_WORLD_VALUE: f64 = 16_384.0;

// =============================================================================
// CONVERSIONS
// =============================================================================

/// Convert a compile-time float to fixed-point.
///
/// # Warning
/// Only use for constants. Runtime values go through [`from_float`].
///
/// # Example
/// ```
/// use hideout::core::fixed::{to_fixed, FIXED_ONE};
/// const MY_VALUE: i32 = to_fixed(2.5);
/// assert_eq!(MY_VALUE, FIXED_ONE * 2 + FIXED_ONE / 2);
/// ```
#[inline]
pub const fn to_fixed(f: f64) -> Fixed {
    (f * (FIXED_ONE as f64)) as Fixed
}

/// Convert a runtime float (config value, wire coordinate) to fixed-point.
///
/// Rounds to the nearest representable value and saturates at the i32
/// range; NaN maps to zero.
#[inline]
pub fn from_float(f: f64) -> Fixed {
    let scaled = (f * FIXED_ONE as f64).round();
    if scaled.is_nan() {
        0
    } else {
        scaled.clamp(i32::MIN as f64, i32::MAX as f64) as Fixed
    }
}

/// Convert fixed-point to float for wire output and logging.
#[inline]
pub fn to_float(f: Fixed) -> f64 {
    f as f64 / FIXED_ONE as f64
}

// =============================================================================
// CORE OPERATIONS
// =============================================================================

/// Multiply two fixed-point numbers through an i64 intermediate.
#[inline]
pub fn fixed_mul(a: Fixed, b: Fixed) -> Fixed {
    let wide = (a as i64) * (b as i64);
    (wide >> FIXED_SCALE) as Fixed
}

/// Divide two fixed-point numbers.
///
/// Returns 0 on divide-by-zero instead of panicking.
#[inline]
pub fn fixed_div(a: Fixed, b: Fixed) -> Fixed {
    if b == 0 {
        return 0;
    }
    let wide = (a as i64) << FIXED_SCALE;
    (wide / b as i64) as Fixed
}

/// Absolute value of a fixed-point number.
#[inline]
pub fn fixed_abs(x: Fixed) -> Fixed {
    if x < 0 { x.wrapping_neg() } else { x }
}

/// Clamp a fixed-point number to a range.
#[inline]
pub fn fixed_clamp(value: Fixed, min: Fixed, max: Fixed) -> Fixed {
    value.max(min).min(max)
}

/// Square of a fixed-point value as raw Q32.32.
#[inline]
pub fn wide_square(x: Fixed) -> i64 {
    (x as i64) * (x as i64)
}

/// Square root of a raw Q32.32 value, returned as Q16.16.
///
/// Integer-only (bit-by-bit), so it is exact and identical on every
/// platform. Non-positive inputs return 0.
pub fn wide_sqrt(value: i64) -> Fixed {
    if value <= 0 {
        return 0;
    }
    let mut n = value as u64;
    let mut root: u64 = 0;
    let mut bit: u64 = 1 << 62;
    while bit > n {
        bit >>= 2;
    }
    while bit != 0 {
        if n >= root + bit {
            n -= root + bit;
            root = (root >> 1) + bit;
        } else {
            root >>= 1;
        }
        bit >>= 2;
    }
    root.min(i32::MAX as u64) as Fixed
}

/// Number of whole `step`s needed to cover `length`, rounded up.
#[inline]
pub fn ceil_steps(length: Fixed, step: Fixed) -> u32 {
    if length <= 0 || step <= 0 {
        return 0;
    }
    ((length as i64 + step as i64 - 1) / step as i64) as u32
}

/// Snap a coordinate to the nearest multiple of `cell` (halves round up).
#[inline]
pub fn snap_to_grid(value: Fixed, cell: Fixed) -> Fixed {
    if cell <= 0 {
        return value;
    }
    let wide = value as i64 + (cell as i64 / 2);
    (wide.div_euclid(cell as i64) * cell as i64) as Fixed
}

// =============================================================================
// TESTS
// =============================================================================
