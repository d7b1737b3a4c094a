//! The numeric parameters of a curve-based projection.
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use crate::proj::{MapProjection, ProjError, next_generation};
use crate::spline::{Slope, Spline};

/// Knots of the latitude curves (length, distance, bending): one every 5° from 0° to 90°.
pub const LATITUDE_KNOTS: usize = 19;
/// Knots of the meridian distribution curve: one every 15° from 0° to 180°.
pub const MERIDIAN_KNOTS: usize = 13;

const LATITUDE_STEP_DEG: f64 = 5.0;
const LONGITUDE_STEP_DEG: f64 = 15.0;

/// Largest horizontal meridian displacement, reached for a distribution value of ±1.
pub const MERIDIAN_SHIFT: f64 = PI / 12.0;

// Robinson (1974), parallel length and distance from the equator every 5°.
const ROBINSON_LENGTH: [f64; LATITUDE_KNOTS] = [
    1.0000, 0.9986, 0.9954, 0.9900, 0.9822, 0.9730, 0.9600, 0.9427, 0.9216, 0.8962, 0.8679,
    0.8350, 0.7986, 0.7597, 0.7186, 0.6732, 0.6213, 0.5722, 0.5322,
];
const ROBINSON_DISTANCE: [f64; LATITUDE_KNOTS] = [
    0.0000, 0.0620, 0.1240, 0.1860, 0.2480, 0.3100, 0.3720, 0.4340, 0.4958, 0.5571, 0.6176,
    0.6769, 0.7346, 0.7903, 0.8435, 0.8936, 0.9394, 0.9761, 1.0000,
];

/// Shape of the curve used to bend parallels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurveShape {
    #[default]
    Cubic,
    Quadratic,
    Cosine,
}

impl CurveShape {
    pub fn name(&self) -> &'static str {
        match self {
            CurveShape::Cubic => "cubic",
            CurveShape::Quadratic => "quadratic",
            CurveShape::Cosine => "cosine",
        }
    }

    /// 1 on the central meridian, 0 on the outer meridians.
    fn weight(&self, lon: f64) -> f64 {
        let u = (lon.abs() / PI).min(1.0);
        match self {
            CurveShape::Cubic => 1.0 - u * u * u,
            CurveShape::Quadratic => 1.0 - u * u,
            CurveShape::Cosine => (u * PI / 2.0).cos(),
        }
    }
}

impl fmt::Display for CurveShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CurveShape {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cubic" => Ok(CurveShape::Cubic),
            "quadratic" => Ok(CurveShape::Quadratic),
            "cosine" => Ok(CurveShape::Cosine),
            other => Err(other.to_owned()),
        }
    }
}

/// Four control curves and a handful of scalars defining a curve-based projection.
///
/// - *length*: parallel length relative to the longest parallel, `[0, 1]`.
/// - *distance*: distance of a parallel from the equator relative to the pole, increasing
///   in `[0, 1]`.
/// - *bend*: bending of parallels, `[-1, 1]`.
/// - *meridians*: horizontal displacement of meridians, `[-1, 1]`, pinned to 0 at 0° and 180°.
///
/// Every mutation bumps [`ProjectionModel::generation`].
#[derive(Debug, Clone)]
pub struct ProjectionModel {
    length: Spline,
    distance: Spline,
    bend: Spline,
    meridians: Spline,
    scale: f64,
    vertical_scale: f64,
    curve_shape: CurveShape,
    adjust_pole_direction: bool,
    pole_direction: f64,
    smooth_equator: bool,
    generation: u64,
}

impl PartialEq for ProjectionModel {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length
            && self.distance == other.distance
            && self.bend == other.bend
            && self.meridians == other.meridians
            && self.scale == other.scale
            && self.vertical_scale == other.vertical_scale
            && self.curve_shape == other.curve_shape
            && self.adjust_pole_direction == other.adjust_pole_direction
            && self.pole_direction == other.pole_direction
            && self.smooth_equator == other.smooth_equator
    }
}

impl Default for ProjectionModel {
    fn default() -> Self {
        ProjectionModel::flat()
    }
}

impl ProjectionModel {
    /// Parallels of equal length, evenly spaced, unbent; meridians evenly spaced.
    pub fn flat() -> Self {
        ProjectionModel {
            length: Spline::constant(LATITUDE_KNOTS, 1.0),
            distance: Spline::linear(LATITUDE_KNOTS, 0.0, 1.0),
            bend: Spline::constant(LATITUDE_KNOTS, 0.0),
            meridians: Spline::constant(MERIDIAN_KNOTS, 0.0),
            scale: 1.0,
            vertical_scale: 1.0,
            curve_shape: CurveShape::Cubic,
            adjust_pole_direction: false,
            pole_direction: 0.0,
            smooth_equator: false,
            generation: 0,
        }
    }

    /// The Robinson projection expressed as a curve model.
    pub fn robinson() -> Self {
        let mut model = ProjectionModel::flat();
        model.length.set_knots(&ROBINSON_LENGTH);
        model.distance.set_knots(&ROBINSON_DISTANCE);
        model.scale = 0.8487;
        model.vertical_scale = 1.3523 / (0.8487 * PI);
        model.sync_boundaries();
        model
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn length(&self) -> &Spline {
        &self.length
    }

    pub fn distance(&self) -> &Spline {
        &self.distance
    }

    pub fn bend(&self) -> &Spline {
        &self.bend
    }

    pub fn meridians(&self) -> &Spline {
        &self.meridians
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn vertical_scale(&self) -> f64 {
        self.vertical_scale
    }

    pub fn curve_shape(&self) -> CurveShape {
        self.curve_shape
    }

    pub fn adjust_pole_direction(&self) -> bool {
        self.adjust_pole_direction
    }

    /// Angle in degrees between the outermost meridian and the vertical at the pole line.
    pub fn pole_direction(&self) -> f64 {
        self.pole_direction
    }

    pub fn smooth_equator(&self) -> bool {
        self.smooth_equator
    }

    pub fn set_length_knot(&mut self, index: usize, value: f64) {
        self.length.set_knot(index, value);
        self.touch();
    }

    pub fn set_length_knots(&mut self, knots: &[f64]) {
        self.length.set_knots(knots);
        self.touch();
    }

    pub fn set_distance_knot(&mut self, index: usize, value: f64) {
        self.distance.set_knot(index, value);
        self.touch();
    }

    pub fn set_distance_knots(&mut self, knots: &[f64]) {
        self.distance.set_knots(knots);
        self.touch();
    }

    pub fn set_bend_knot(&mut self, index: usize, value: f64) {
        self.bend.set_knot(index, value);
        self.touch();
    }

    pub fn set_bend_knots(&mut self, knots: &[f64]) {
        self.bend.set_knots(knots);
        self.touch();
    }

    /// Sets a meridian distribution knot. The first and last knots stay pinned to 0.
    pub fn set_meridian_knot(&mut self, index: usize, value: f64) {
        if index == 0 || index == MERIDIAN_KNOTS - 1 {
            return;
        }
        self.meridians.set_knot(index, value);
        self.touch();
    }

    pub fn set_meridian_knots(&mut self, knots: &[f64]) {
        self.meridians.set_knots(knots);
        self.meridians.set_knot(0, 0.0);
        self.meridians.set_knot(MERIDIAN_KNOTS - 1, 0.0);
        self.touch();
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
        self.touch();
    }

    pub fn set_vertical_scale(&mut self, vertical_scale: f64) {
        self.vertical_scale = vertical_scale;
        self.touch();
    }

    pub fn set_curve_shape(&mut self, shape: CurveShape) {
        self.curve_shape = shape;
        self.touch();
    }

    pub fn set_pole_direction(&mut self, adjust: bool, angle: f64) {
        self.adjust_pole_direction = adjust;
        self.pole_direction = angle;
        self.touch();
    }

    pub fn set_smooth_equator(&mut self, smooth: bool) {
        self.smooth_equator = smooth;
        self.touch();
    }

    pub fn longitude_scale_factor(&self, lat: f64) -> f64 {
        self.length.eval(latitude_parameter(lat))
    }

    pub fn latitude_scale_factor(&self, lat: f64) -> f64 {
        self.distance.eval(latitude_parameter(lat))
    }

    pub fn bend_factor(&self, lat: f64) -> f64 {
        self.bend.eval(latitude_parameter(lat))
    }

    pub fn x_dist_factor(&self, lon: f64) -> f64 {
        self.meridians
            .eval(lon.abs().to_degrees() / LONGITUDE_STEP_DEG)
    }

    /// Multiplier applied to the unbent `y` of a point at `lon` on a parallel with bending
    /// `bend`. Never larger than 1 in magnitude for bending in `[-1, 1]`.
    pub fn bend_multiplier(&self, lon: f64, bend: f64) -> f64 {
        if bend == 0.0 {
            return 1.0;
        }
        let weight = self.curve_shape.weight(lon);
        if bend > 0.0 {
            1.0 - bend * (1.0 - weight)
        } else {
            1.0 + bend * weight
        }
    }

    /// True if all parallels are straight lines.
    pub fn is_unbent(&self) -> bool {
        self.bend.knots().iter().all(|b| *b == 0.0)
    }

    pub fn is_normalized(&self) -> bool {
        self.length.max() == 1.0 && self.distance.last() == 1.0
    }

    /// Rescales the length curve to a maximum of 1 and the distance curve to a pole value of 1,
    /// compensating with the scale factors so that the projected graticule does not change.
    pub fn normalize(&mut self) {
        let longest = self.length.max();
        if longest > 0.0 && longest.is_finite() {
            if longest != 1.0 {
                let knots: Vec<f64> = self.length.knots().iter().map(|k| k / longest).collect();
                self.length.set_knots(&knots);
                self.scale *= longest;
                self.vertical_scale /= longest;
            }
        } else {
            log::warn!("Can't normalize a model without a parallel of positive length");
        }

        let pole = self.distance.last();
        if pole > 0.0 && pole.is_finite() {
            if pole != 1.0 {
                let knots: Vec<f64> = self.distance.knots().iter().map(|k| k / pole).collect();
                self.distance.set_knots(&knots);
                self.vertical_scale *= pole;
            }
        } else {
            log::warn!("Can't normalize a model with a pole line at the equator");
        }
        log::debug!(
            "Normalized model: scale {}, vertical scale {}",
            self.scale,
            self.vertical_scale
        );
        self.touch();
    }

    /// A normalized deep copy, leaving `self` untouched.
    pub fn normalized(&self) -> ProjectionModel {
        let mut copy = self.clone();
        copy.normalize();
        copy
    }

    /// Approximates `reference` by sampling it every 5° of latitude and every 15° of longitude.
    ///
    /// The reference is expected in normal aspect on the unit sphere. Pole-direction and
    /// equator-smoothness adjustments are switched off; the curve shape is kept.
    pub fn reset<P: MapProjection + ?Sized>(&mut self, reference: &P) -> Result<(), ProjError> {
        let (equator, _) = reference.project(PI, 0.0);
        if !(equator.is_finite() && equator > 0.0) {
            return Err(ProjError::Fit(format!(
                "the equator has no positive finite length ({equator})"
            )));
        }

        let mut length = [0.0; LATITUDE_KNOTS];
        let mut unbent = [0.0; LATITUDE_KNOTS];
        let mut bend = [0.0; LATITUDE_KNOTS];
        for i in 0..LATITUDE_KNOTS {
            let lat = (i as f64 * LATITUDE_STEP_DEG).to_radians();
            let (edge_x, edge_y) = reference.project(PI, lat);
            let (_, centre_y) = reference.project(0.0, lat);
            if !(edge_x.is_finite() && edge_y.is_finite() && centre_y.is_finite()) {
                return Err(ProjError::NonFinite { lon: PI, lat });
            }
            let (edge_y, centre_y) = (edge_y.abs(), centre_y.abs());
            length[i] = edge_x.abs() / equator;
            unbent[i] = edge_y.max(centre_y);
            bend[i] = if unbent[i] == 0.0 {
                0.0
            } else if edge_y < centre_y {
                1.0 - edge_y / centre_y
            } else {
                centre_y / edge_y - 1.0
            }
            .clamp(-1.0, 1.0);
        }
        let pole = unbent[LATITUDE_KNOTS - 1];
        if pole <= 0.0 {
            return Err(ProjError::Fit("the pole line lies on the equator".to_owned()));
        }
        let distance = unbent.map(|y| y / pole);

        let mut meridians = [0.0; MERIDIAN_KNOTS];
        for (j, knot) in meridians
            .iter_mut()
            .enumerate()
            .take(MERIDIAN_KNOTS - 1)
            .skip(1)
        {
            let lon = (j as f64 * LONGITUDE_STEP_DEG).to_radians();
            let (x, _) = reference.project(lon, 0.0);
            if !x.is_finite() {
                return Err(ProjError::NonFinite { lon, lat: 0.0 });
            }
            *knot = ((x.abs() * PI / equator - lon) / MERIDIAN_SHIFT).clamp(-1.0, 1.0);
        }

        self.length.set_knots(&length);
        self.distance.set_knots(&distance);
        self.bend.set_knots(&bend);
        self.meridians.set_knots(&meridians);
        self.scale = equator / PI;
        self.vertical_scale = pole / equator;
        self.adjust_pole_direction = false;
        self.smooth_equator = false;
        self.touch();
        Ok(())
    }

    /// Moves every knot toward the matching knot of `other`, with one weight per curve.
    ///
    /// The global scale follows the length weight and the vertical scale the distance weight.
    /// Curve shape and boundary flags stay those of `self`.
    pub fn mix_knots(
        &mut self,
        other: &ProjectionModel,
        length_weight: f64,
        distance_weight: f64,
        bend_weight: f64,
        meridian_weight: f64,
    ) {
        self.length.lerp_knots(&other.length, length_weight);
        self.distance.lerp_knots(&other.distance, distance_weight);
        self.bend.lerp_knots(&other.bend, bend_weight);
        self.meridians.lerp_knots(&other.meridians, meridian_weight);
        self.scale = lerp(self.scale, other.scale, length_weight);
        self.vertical_scale = lerp(self.vertical_scale, other.vertical_scale, distance_weight);
        self.touch();
    }

    fn touch(&mut self) {
        self.sync_boundaries();
        self.generation = next_generation();
    }

    /// Derives the length curve's boundary slopes from the equator and pole flags.
    fn sync_boundaries(&mut self) {
        let start = if self.smooth_equator {
            Slope::Clamped(0.0)
        } else {
            Slope::Free
        };
        self.length.set_start_slope(start);

        let end = if self.adjust_pole_direction {
            let pole_slope = self
                .distance
                .first_derivative((LATITUDE_KNOTS - 1) as f64);
            let tan = self.pole_direction.to_radians().tan();
            Slope::Clamped(-tan * self.vertical_scale * pole_slope)
        } else {
            Slope::Free
        };
        self.length.set_end_slope(end);
    }
}

fn latitude_parameter(lat: f64) -> f64 {
    lat.abs().to_degrees() / LATITUDE_STEP_DEG
}

fn lerp(a: f64, b: f64, weight: f64) -> f64 {
    (1.0 - weight) * a + weight * b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{self, Sinusoidal};
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn edited() -> ProjectionModel {
        let mut model = ProjectionModel::robinson();
        model.set_length_knot(0, 0.8);
        model.set_distance_knot(18, 0.9);
        model.set_bend_knot(10, 0.2);
        model.set_meridian_knot(4, 0.3);
        model
    }

    #[test]
    fn scale_factors_sample_knots() {
        let model = ProjectionModel::robinson();
        assert_relative_eq!(model.longitude_scale_factor(0.0), 1.0);
        assert_relative_eq!(model.longitude_scale_factor(FRAC_PI_2), 0.5322, epsilon = 1e-12);
        assert_relative_eq!(
            model.latitude_scale_factor((-45.0f64).to_radians()),
            0.5571,
            epsilon = 1e-12
        );
    }

    #[test]
    fn meridian_knots_stay_pinned() {
        let mut model = ProjectionModel::flat();
        model.set_meridian_knot(0, 0.5);
        model.set_meridian_knots(&[1.0; MERIDIAN_KNOTS]);
        assert_eq!(model.meridians().first(), 0.0);
        assert_eq!(model.meridians().last(), 0.0);
        assert_eq!(model.meridians().knot(6), 1.0);
    }

    #[test]
    fn normalize_reaches_unit_extremes() {
        let mut model = edited();
        assert!(!model.is_normalized());
        model.normalize();
        assert!(model.is_normalized());
        assert_eq!(model.length().max(), 1.0);
        assert_eq!(model.distance().last(), 1.0);
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut once = edited();
        once.normalize();
        let mut twice = once.clone();
        twice.normalize();
        assert_eq!(once, twice);
        assert_eq!(once.length().knots(), twice.length().knots());
        assert_eq!(once.scale(), twice.scale());
        assert_eq!(once.vertical_scale(), twice.vertical_scale());
    }

    #[test]
    fn normalize_keeps_physical_extent() {
        let model = edited();
        let normalized = model.normalized();
        for lat in [0.0, 0.4, 1.2, FRAC_PI_2] {
            let width = |m: &ProjectionModel| m.scale() * m.longitude_scale_factor(lat);
            let height = |m: &ProjectionModel| {
                m.scale() * m.vertical_scale() * m.latitude_scale_factor(lat)
            };
            assert_relative_eq!(width(&model), width(&normalized), epsilon = 1e-12);
            assert_relative_eq!(height(&model), height(&normalized), epsilon = 1e-12);
        }
    }

    #[test]
    fn mix_knots_with_zero_weights_is_identity() {
        let mut model = edited();
        let original = model.clone();
        model.mix_knots(&ProjectionModel::flat(), 0.0, 0.0, 0.0, 0.0);
        assert_eq!(model, original);
    }

    #[test]
    fn mix_knots_with_unit_weights_copies_other() {
        let mut model = ProjectionModel::flat();
        let other = edited();
        model.mix_knots(&other, 1.0, 1.0, 1.0, 1.0);
        assert_eq!(model.length().knots(), other.length().knots());
        assert_eq!(model.distance().knots(), other.distance().knots());
        assert_eq!(model.bend().knots(), other.bend().knots());
        assert_eq!(model.meridians().knots(), other.meridians().knots());
    }

    #[test]
    fn mix_knots_uses_independent_weights() {
        let mut model = ProjectionModel::flat();
        model.mix_knots(&edited(), 0.5, 0.0, 0.0, 0.0);
        assert_relative_eq!(model.length().knot(0), 0.9, epsilon = 1e-12);
        assert_eq!(model.distance().knots(), ProjectionModel::flat().distance().knots());
    }

    #[test]
    fn bending_never_grows_vertical_extent() {
        let mut model = ProjectionModel::flat();
        for shape in [CurveShape::Cubic, CurveShape::Quadratic, CurveShape::Cosine] {
            model.set_curve_shape(shape);
            for bend in [-1.0, -0.4, 0.0, 0.3, 1.0] {
                for lon in [0.0, 0.5, 1.5, PI] {
                    let m = model.bend_multiplier(lon, bend);
                    assert!((0.0..=1.0).contains(&m), "{shape} {bend} {lon}: {m}");
                }
            }
            assert_relative_eq!(model.bend_multiplier(0.0, 0.5), 1.0);
            assert_relative_eq!(model.bend_multiplier(PI, 0.5), 0.5, epsilon = 1e-12);
            assert_relative_eq!(model.bend_multiplier(0.0, -0.5), 0.5, epsilon = 1e-12);
            assert_relative_eq!(model.bend_multiplier(PI, -0.5), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn pole_direction_clamps_length_slope() {
        let mut model = ProjectionModel::robinson();
        model.set_pole_direction(true, 30.0);
        let distance_slope = model.distance().first_derivative(18.0);
        let expected = -30f64.to_radians().tan() * model.vertical_scale() * distance_slope;
        assert_relative_eq!(model.length().first_derivative(18.0), expected, epsilon = 1e-12);
        model.set_smooth_equator(true);
        assert_relative_eq!(model.length().first_derivative(0.0), 0.0, epsilon = 1e-12);
        model.set_pole_direction(false, 30.0);
        assert_eq!(model.length().end_slope(), Slope::Free);
    }

    #[test]
    fn reset_reproduces_sinusoidal_graticule() {
        let mut model = ProjectionModel::robinson();
        model.reset(&Sinusoidal).unwrap();
        assert_relative_eq!(model.scale(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(model.vertical_scale(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(model.length().knot(12), 60f64.to_radians().cos(), epsilon = 1e-12);
        assert_relative_eq!(model.distance().knot(9), 0.5, epsilon = 1e-12);
        assert!(model.is_unbent());
        assert!(model.meridians().knots().iter().all(|k| k.abs() < 1e-12));
        assert!(model.is_normalized());
    }

    #[test]
    fn reset_rejects_infinite_poles() {
        let mut model = ProjectionModel::flat();
        let before = model.clone();
        let err = model.reset(&reference::Mercator).unwrap_err();
        assert!(matches!(err, ProjError::NonFinite { .. }));
        assert_eq!(model, before);
    }

    #[test]
    fn generation_counts_mutations() {
        let mut model = ProjectionModel::flat();
        let start = model.generation();
        model.set_scale(2.0);
        let after_scale = model.generation();
        model.set_bend_knot(3, 0.1);
        assert!(after_scale > start);
        assert!(model.generation() > after_scale);
    }
}
