//! Interpolating cubic splines over evenly spaced knots.
//!
//! Every curve of a [`ProjectionModel`](crate::ProjectionModel) is a [`Spline`]: a fixed number
//! of control values sitting at the integer parameters `0, 1, …, N-1`. Between two knots the
//! curve is a [`Cubic`] in the local parameter `u ∈ [0, 1]`.
use std::sync::OnceLock;

/// Boundary condition at one end of a [`Spline`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Slope {
    /// Natural end: the second derivative vanishes.
    #[default]
    Free,
    /// The first derivative (per knot step) is pinned to this value.
    Clamped(f64),
}

/// A cubic polynomial `a + b·u + c·u² + d·u³` describing one spline segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cubic {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Cubic {
    pub fn eval(&self, u: f64) -> f64 {
        ((self.d * u + self.c) * u + self.b) * u + self.a
    }

    pub fn derivative(&self, u: f64) -> f64 {
        (3.0 * self.d * u + 2.0 * self.c) * u + self.b
    }
}

/// Finds `u` with `poly(u) == target` by Newton-Raphson iteration starting at `seed`.
///
/// Iteration stops once a correction is smaller than `eps`. Returns `None` if the derivative
/// vanishes, a value stops being finite, or `max_iter` corrections do not converge.
pub fn newton_raphson_root(
    poly: &Cubic,
    target: f64,
    seed: f64,
    eps: f64,
    max_iter: usize,
) -> Option<f64> {
    let mut u = seed;
    for _ in 0..max_iter {
        let slope = poly.derivative(u);
        if slope == 0.0 || !slope.is_finite() {
            return None;
        }
        let correction = (poly.eval(u) - target) / slope;
        u -= correction;
        if !u.is_finite() {
            return None;
        }
        if correction.abs() < eps {
            return Some(u);
        }
    }
    None
}

/// Interpolating cubic spline through `N` evenly spaced knots.
///
/// The knot count is fixed at construction. Segment coefficients are derived lazily on the first
/// evaluation after a mutation.
#[derive(Debug, Clone)]
pub struct Spline {
    knots: Vec<f64>,
    start: Slope,
    end: Slope,
    segments: OnceLock<Vec<Cubic>>,
}

impl PartialEq for Spline {
    fn eq(&self, other: &Self) -> bool {
        self.knots == other.knots && self.start == other.start && self.end == other.end
    }
}

impl Spline {
    /// Creates a spline through `knots`.
    ///
    /// # Panics
    ///
    /// Panics if fewer than two knots are given.
    pub fn new(knots: Vec<f64>) -> Self {
        assert!(knots.len() >= 2, "a spline needs at least two knots");
        Spline {
            knots,
            start: Slope::Free,
            end: Slope::Free,
            segments: OnceLock::new(),
        }
    }

    /// A spline of `count` knots, all set to `value`.
    pub fn constant(count: usize, value: f64) -> Self {
        Spline::new(vec![value; count])
    }

    /// A spline of `count` knots rising linearly from `first` to `last`.
    pub fn linear(count: usize, first: f64, last: f64) -> Self {
        let step = (last - first) / (count - 1) as f64;
        Spline::new((0..count).map(|i| first + step * i as f64).collect())
    }

    pub fn len(&self) -> usize {
        self.knots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn knot(&self, index: usize) -> f64 {
        self.knots[index]
    }

    pub fn first(&self) -> f64 {
        self.knots[0]
    }

    pub fn last(&self) -> f64 {
        self.knots[self.knots.len() - 1]
    }

    pub fn max(&self) -> f64 {
        self.knots.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn set_knot(&mut self, index: usize, value: f64) {
        self.knots[index] = value;
        self.invalidate();
    }

    /// Replaces all knot values.
    ///
    /// # Panics
    ///
    /// Panics if `knots` does not have the spline's knot count.
    pub fn set_knots(&mut self, knots: &[f64]) {
        assert_eq!(knots.len(), self.knots.len(), "knot count is fixed");
        self.knots.copy_from_slice(knots);
        self.invalidate();
    }

    /// Multiplies every knot by `factor`.
    pub fn scale_knots(&mut self, factor: f64) {
        self.knots.iter_mut().for_each(|k| *k *= factor);
        self.invalidate();
    }

    /// Moves every knot a fraction `weight` of the way toward the matching knot of `other`.
    pub fn lerp_knots(&mut self, other: &Spline, weight: f64) {
        debug_assert_eq!(self.len(), other.len());
        for (k, o) in self.knots.iter_mut().zip(&other.knots) {
            *k = (1.0 - weight) * *k + weight * o;
        }
        self.invalidate();
    }

    pub fn start_slope(&self) -> Slope {
        self.start
    }

    pub fn end_slope(&self) -> Slope {
        self.end
    }

    pub fn set_start_slope(&mut self, slope: Slope) {
        if self.start != slope {
            self.start = slope;
            self.invalidate();
        }
    }

    pub fn set_end_slope(&mut self, slope: Slope) {
        if self.end != slope {
            self.end = slope;
            self.invalidate();
        }
    }

    /// The cubic of segment `index` (between knots `index` and `index + 1`).
    pub fn segment(&self, index: usize) -> Cubic {
        self.segments()[index]
    }

    /// Number of segments, one less than the knot count.
    pub fn segment_count(&self) -> usize {
        self.knots.len() - 1
    }

    /// Value of the curve at parameter `t`.
    ///
    /// `t` is expected in `[0, N-1]`; outside that range the boundary segments are extrapolated.
    pub fn eval(&self, t: f64) -> f64 {
        let (index, u) = self.locate(t);
        self.eval_segment(index, u)
    }

    /// Value of segment `index` at local parameter `u`, for callers that already located the
    /// segment.
    pub fn eval_segment(&self, index: usize, u: f64) -> f64 {
        self.segments()[index].eval(u)
    }

    /// First derivative (per knot step) at parameter `t`.
    pub fn first_derivative(&self, t: f64) -> f64 {
        let (index, u) = self.locate(t);
        self.segments()[index].derivative(u)
    }

    /// Splits `t` into a segment index and the local parameter within that segment.
    pub fn locate(&self, t: f64) -> (usize, f64) {
        let last = self.segment_count() - 1;
        let index = if t <= 0.0 || t.is_nan() {
            0
        } else {
            (t.floor() as usize).min(last)
        };
        (index, t - index as f64)
    }

    fn invalidate(&mut self) {
        self.segments = OnceLock::new();
    }

    fn segments(&self) -> &[Cubic] {
        self.segments
            .get_or_init(|| solve_segments(&self.knots, self.start, self.end))
    }
}

/// Solves the tridiagonal system for the second-derivative terms with the Thomas algorithm and
/// expands them into per-segment polynomials. Knot spacing is one.
fn solve_segments(y: &[f64], start: Slope, end: Slope) -> Vec<Cubic> {
    let n = y.len();
    let mut lower = vec![0.0; n];
    let mut diag = vec![0.0; n];
    let mut upper = vec![0.0; n];
    let mut rhs = vec![0.0; n];

    for i in 1..n - 1 {
        lower[i] = 1.0;
        diag[i] = 4.0;
        upper[i] = 1.0;
        rhs[i] = 3.0 * (y[i + 1] - 2.0 * y[i] + y[i - 1]);
    }
    match start {
        Slope::Free => diag[0] = 1.0,
        Slope::Clamped(slope) => {
            diag[0] = 2.0;
            upper[0] = 1.0;
            rhs[0] = 3.0 * (y[1] - y[0] - slope);
        }
    }
    match end {
        Slope::Free => diag[n - 1] = 1.0,
        Slope::Clamped(slope) => {
            diag[n - 1] = 2.0;
            lower[n - 1] = 1.0;
            rhs[n - 1] = 3.0 * (slope - (y[n - 1] - y[n - 2]));
        }
    }

    // forward sweep
    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];
    c_prime[0] = upper[0] / diag[0];
    d_prime[0] = rhs[0] / diag[0];
    for i in 1..n {
        let denom = diag[i] - lower[i] * c_prime[i - 1];
        c_prime[i] = upper[i] / denom;
        d_prime[i] = (rhs[i] - lower[i] * d_prime[i - 1]) / denom;
    }
    // back substitution
    let mut c = vec![0.0; n];
    c[n - 1] = d_prime[n - 1];
    for i in (0..n - 1).rev() {
        c[i] = d_prime[i] - c_prime[i] * c[i + 1];
    }

    (0..n - 1)
        .map(|i| Cubic {
            a: y[i],
            b: y[i + 1] - y[i] - (2.0 * c[i] + c[i + 1]) / 3.0,
            c: c[i],
            d: (c[i + 1] - c[i]) / 3.0,
        })
        .collect()
}
