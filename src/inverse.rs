//! Numerical inversion of a forward projection, shared by all projection variants.
//!
//! Starting from a seed, the candidate longitude/latitude is corrected with Newton steps built
//! from a finite-difference Jacobian. A step that does not reduce the residual is halved until
//! it does, which keeps the iteration bracketed near folds and domain edges.
use crate::proj::clamp_to_domain;

/// Tolerances and iteration caps of the inverse refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InverseSolver {
    /// Iteration stops once the projected residual is below this distance.
    pub tolerance: f64,
    /// A result is only accepted if its final residual is below this distance.
    pub max_residual: f64,
    pub max_iterations: usize,
    /// Number of times a step may be halved before the iteration gives up.
    pub max_halvings: usize,
    /// Step of the finite differences, in radians.
    pub step: f64,
}

impl Default for InverseSolver {
    fn default() -> Self {
        InverseSolver {
            tolerance: 1e-10,
            max_residual: 1e-6,
            max_iterations: 100,
            max_halvings: 30,
            step: 1e-7,
        }
    }
}

struct Candidate {
    lon: f64,
    lat: f64,
    x: f64,
    y: f64,
    residual: f64,
}

impl InverseSolver {
    /// Finds the longitude/latitude that `forward` maps to `(x, y)`, starting at `seed`.
    ///
    /// Returns `None` when no point of the domain maps within `max_residual` of the target.
    pub fn refine<F>(&self, forward: F, x: f64, y: f64, seed: (f64, f64)) -> Option<(f64, f64)>
    where
        F: Fn(f64, f64) -> (f64, f64),
    {
        if !(x.is_finite() && y.is_finite()) {
            return None;
        }
        let evaluate = |lon: f64, lat: f64| {
            let (lon, lat) = clamp_to_domain(lon, lat);
            let (fx, fy) = forward(lon, lat);
            let residual = (fx - x).hypot(fy - y);
            residual.is_finite().then_some(Candidate {
                lon,
                lat,
                x: fx,
                y: fy,
                residual,
            })
        };

        let (seed_lon, seed_lat) = if seed.0.is_finite() && seed.1.is_finite() {
            seed
        } else {
            (0.0, 0.0)
        };
        let mut best = evaluate(seed_lon, seed_lat)?;

        for _ in 0..self.max_iterations {
            if best.residual < self.tolerance {
                break;
            }
            let Some((dlon, dlat)) = self.newton_step(&forward, &best, x, y) else {
                break;
            };
            let mut factor = 1.0;
            let mut improved = None;
            for _ in 0..=self.max_halvings {
                if let Some(candidate) =
                    evaluate(best.lon + factor * dlon, best.lat + factor * dlat)
                {
                    if candidate.residual < best.residual {
                        improved = Some(candidate);
                        break;
                    }
                }
                factor *= 0.5;
            }
            match improved {
                Some(candidate) => best = candidate,
                None => break,
            }
        }

        (best.residual <= self.max_residual).then_some((best.lon, best.lat))
    }

    fn newton_step<F>(&self, forward: &F, at: &Candidate, x: f64, y: f64) -> Option<(f64, f64)>
    where
        F: Fn(f64, f64) -> (f64, f64),
    {
        let (x_lon, y_lon) = difference(forward, at, self.step, 0.0)?;
        let (x_lat, y_lat) = difference(forward, at, 0.0, self.step)?;
        let det = x_lon * y_lat - x_lat * y_lon;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let (dx, dy) = (x - at.x, y - at.y);
        Some(((y_lat * dx - x_lat * dy) / det, (x_lon * dy - y_lon * dx) / det))
    }
}

/// Central difference along `(dlon, dlat)`, one-sided where the domain ends.
fn difference<F>(forward: &F, at: &Candidate, dlon: f64, dlat: f64) -> Option<(f64, f64)>
where
    F: Fn(f64, f64) -> (f64, f64),
{
    let (lon_a, lat_a) = clamp_to_domain(at.lon - dlon, at.lat - dlat);
    let (lon_b, lat_b) = clamp_to_domain(at.lon + dlon, at.lat + dlat);
    let span = (lon_b - lon_a) + (lat_b - lat_a);
    if span == 0.0 {
        return None;
    }
    let (xa, ya) = forward(lon_a, lat_a);
    let (xb, yb) = forward(lon_b, lat_b);
    let dx = (xb - xa) / span;
    let dy = (yb - ya) / span;
    (dx.is_finite() && dy.is_finite()).then_some((dx, dy))
}

/// [`InverseSolver::refine`] with default settings, reporting misses as `(NaN, NaN)`.
pub fn refine_inverse<F>(forward: F, x: f64, y: f64, seed: (f64, f64)) -> (f64, f64)
where
    F: Fn(f64, f64) -> (f64, f64),
{
    InverseSolver::default()
        .refine(forward, x, y, seed)
        .unwrap_or((f64::NAN, f64::NAN))
}
