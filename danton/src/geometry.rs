//! Geometry oracle: maps a point in space to a shell index and computes a safe step length to the
//! next shell boundary along a ray.

use crate::earth::{EarthModel, ATMOSPHERE_START, OUTSIDE, SHELL_COUNT};
use crate::constants::MIN_STEP;

/// Dot product of two 3-vectors.
#[must_use]
pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Euclidean norm of a 3-vector.
#[must_use]
pub fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// Result of a geometry query: the shell containing the point (`-1` if outside the domain) and
/// the step length to the next relevant shell boundary along the ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Step {
    /// Shell index, or [`OUTSIDE`] (`-1`) if `r > 2 * GEO_ORBIT`.
    pub shell: i32,
    /// Step length to the next boundary, in m. Always `>= MIN_STEP` when `shell != OUTSIDE`.
    pub length: f64,
    /// Current radius `|position|`, in m. Cached here since callers (the transport bindings)
    /// need it to update the state's side-data without recomputing the norm.
    pub radius: f64,
}

/// The smaller strictly positive root of `b^2 + r1^2 - r^2` as an outgoing-style chord length,
/// i.e. `sqrt(max(0, b^2 + r1^2 - r^2)) - b`. Negative discriminants are clamped to 0.
fn chord(b: f64, r: f64, r1: f64) -> f64 {
    let discriminant = b.mul_add(b, r1 * r1 - r * r);
    let d = if discriminant <= 0.0 { 0.0 } else { discriminant.sqrt() };
    d - b
}

/// Finds the shell index containing radius `r`, i.e. the smallest `i` with `r <= r_out[i]`.
/// Returns `None` if `r` exceeds every shell's outer radius (the outermost shell's boundary is
/// the domain sentinel, so this should not normally happen for `r <= 2 * GEO_ORBIT`).
fn locate(earth: &EarthModel, r: f64) -> Option<usize> {
    (0..SHELL_COUNT).find(|&i| r <= earth.r_out(i))
}

/// Computes the shell index and step length at `position` along unit `direction`.
#[must_use]
pub fn step(earth: &EarthModel, position: [f64; 3], direction: [f64; 3]) -> Step {
    let r = norm(position);

    if r > earth.outer_sentinel() {
        return Step { shell: OUTSIDE, length: 0.0, radius: r };
    }

    // Past the outermost shell's own boundary (GEO_ORBIT) but within the domain sentinel: still
    // shell 14 (space), whose outer boundary for intersection purposes is the sentinel itself.
    let Some(i) = locate(earth, r) else {
        let b = dot(position, direction);
        let length = chord(b, r, earth.outer_sentinel()).max(MIN_STEP);
        return Step { shell: (SHELL_COUNT - 1) as i32, length, radius: r };
    };

    let b = dot(position, direction);
    // Outgoing boundary is this shell's own outer radius; shell 14 (space) has no further named
    // shell, so its outgoing boundary is the domain sentinel.
    let r_out = if i + 1 < SHELL_COUNT { earth.r_out(i) } else { earth.outer_sentinel() };
    let mut s = chord(b, r, r_out);

    if i > 0 && b < 0.0 {
        let r_in = earth.r_out(i - 1);
        let discriminant = b.mul_add(b, r_in * r_in - r * r);
        if discriminant > 0.0 {
            let s_in = chord(b, r, r_in);
            if s_in < s {
                s = s_in;
            }
        }
    }

    Step { shell: i as i32, length: s.max(MIN_STEP), radius: r }
}

/// Whether `r` lies beyond the outer atmosphere (shell 13): neutrinos past this point have
/// escaped and are killed.
#[must_use]
pub fn has_escaped_atmosphere(earth: &EarthModel, r: f64) -> bool {
    r > earth.r_out(ATMOSPHERE_START + 3)
}

/// Whether `r` lies on or above the virtual flux-crossing detection surface at `r_det`.
#[must_use]
pub fn is_above_surface(r: f64, r_det: f64) -> bool {
    r >= r_det
}
