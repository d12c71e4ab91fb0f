//! Test support for the map client crates.
//!
//! - [`fixtures`]: capabilities documents, REST payloads, well-known bounds
//! - [`generators`]: synthetic tiles whose rows can be traced after
//!   reprojection, PNG encoding
//! - [`logs`]: capturing what a call logged
//! - tolerance assertions for degrees, meters and bounds
//!
//! Pull it in as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod generators;
pub mod logs;

pub use fixtures::*;
pub use generators::*;
pub use logs::capture_logs;

/// Asserts two numbers are within `tolerance` of each other.
///
/// Both sides are widened to `f64`, so pixel counts and coordinates can be
/// compared directly.
///
/// ```
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(0.30000000000000004, 0.3, 1e-12);
/// assert_approx_eq!(511_u32, 512.0, 1.0);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($actual:expr, $expected:expr, $tolerance:expr) => {{
        let (actual, expected, tolerance) = ($actual as f64, $expected as f64, $tolerance as f64);
        if (actual - expected).abs() > tolerance {
            panic!(
                "assertion failed: {} = {:?}, expected {:?} (tolerance {:?})",
                stringify!($actual),
                actual,
                expected,
                tolerance
            );
        }
    }};
}

/// Asserts the four edges of a bounds value, given as
/// `(west, south, east, north)`.
///
/// Works on anything with `west()`, `south()`, `east()` and `north()`
/// accessors.
#[macro_export]
macro_rules! assert_edges_approx_eq {
    ($bounds:expr, ($west:expr, $south:expr, $east:expr, $north:expr), $tolerance:expr) => {{
        let bounds = &$bounds;
        $crate::assert_approx_eq!(bounds.west(), $west, $tolerance);
        $crate::assert_approx_eq!(bounds.south(), $south, $tolerance);
        $crate::assert_approx_eq!(bounds.east(), $east, $tolerance);
        $crate::assert_approx_eq!(bounds.north(), $north, $tolerance);
    }};
}
