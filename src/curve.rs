//! Forward and inverse mapping of a curve-based projection.
use std::f64::consts::PI;
use std::sync::OnceLock;

use crate::inverse::refine_inverse;
use crate::model::{MERIDIAN_SHIFT, ProjectionModel};
use crate::proj::{MapProjection, clamp_to_domain, next_generation};
use crate::spline::newton_raphson_root;

/// Convergence bound of the Newton-Raphson search on the distance curve.
const NEWTON_EPS: f64 = 1e-8;
const NEWTON_MAX_ITERATIONS: usize = 50;
/// Slack allowed when the seed lands just outside the graticule.
const SEED_TOLERANCE: f64 = 1e-6;

/// A projection defined by a [`ProjectionModel`].
#[derive(Debug, Clone, Default)]
pub struct CurveProjection {
    model: ProjectionModel,
    normalized: OnceLock<ProjectionModel>,
    revision: u64,
}

impl CurveProjection {
    pub fn new(model: ProjectionModel) -> Self {
        CurveProjection {
            model,
            normalized: OnceLock::new(),
            revision: 0,
        }
    }

    pub fn model(&self) -> &ProjectionModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut ProjectionModel {
        self.normalized = OnceLock::new();
        self.revision = next_generation();
        &mut self.model
    }

    pub fn into_model(self) -> ProjectionModel {
        self.model
    }

    pub fn generation(&self) -> u64 {
        self.revision.max(self.model.generation())
    }

    /// Normalized copy of the model used by the inverse, built on first use.
    fn normalized_model(&self) -> &ProjectionModel {
        self.normalized.get_or_init(|| {
            if self.model.is_normalized() {
                self.model.clone()
            } else {
                self.model.normalized()
            }
        })
    }

    /// Inverse that ignores bending and meridian distribution, used to seed the refinement.
    ///
    /// Finds the distance-curve segment holding `y`, solves its cubic for the latitude and
    /// divides `x` by the parallel length there.
    pub fn seed_inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let model = self.normalized_model();
        let x = x / model.scale();
        let target = y.abs() / (model.scale() * model.vertical_scale() * PI);
        if !(x.is_finite() && target.is_finite()) || target > 1.0 + SEED_TOLERANCE {
            return None;
        }
        let target = target.min(1.0);

        let distance = model.distance();
        let segments = distance.segment_count();
        let mut index = ((target * segments as f64) as usize).min(segments - 1);
        while index > 0 && distance.knot(index) > target {
            index -= 1;
        }
        while index < segments - 1 && distance.knot(index + 1) < target {
            index += 1;
        }
        let (low, high) = (distance.knot(index), distance.knot(index + 1));
        let start = if high > low {
            ((target - low) / (high - low)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let u = newton_raphson_root(
            &distance.segment(index),
            target,
            start,
            NEWTON_EPS,
            NEWTON_MAX_ITERATIONS,
        )?;
        if !(-SEED_TOLERANCE..=1.0 + SEED_TOLERANCE).contains(&u) {
            return None;
        }
        let u = u.clamp(0.0, 1.0);

        let lat = (5.0 * (index as f64 + u)).to_radians().copysign(y);
        let length = model.length().eval_segment(index, u);
        let lon = if length.abs() > 1e-12 { x / length } else { 0.0 };
        if lon.abs() > PI * (1.0 + SEED_TOLERANCE) {
            return None;
        }
        Some(clamp_to_domain(lon, lat))
    }
}

impl From<ProjectionModel> for CurveProjection {
    fn from(model: ProjectionModel) -> Self {
        CurveProjection::new(model)
    }
}

impl MapProjection for CurveProjection {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (lon, lat) = clamp_to_domain(lon, lat);
        let model = &self.model;
        let shifted = lon + lon.signum() * model.x_dist_factor(lon) * MERIDIAN_SHIFT;
        let x = model.scale() * model.longitude_scale_factor(lat) * shifted;
        let y = model.scale()
            * model.vertical_scale()
            * model.latitude_scale_factor(lat)
            * PI
            * model.bend_multiplier(lon, model.bend_factor(lat));
        (x, if lat < 0.0 { -y } else { y })
    }

    fn project_inverse(&self, x: f64, y: f64) -> (f64, f64) {
        match self.seed_inverse(x, y) {
            Some(seed) => refine_inverse(|lon, lat| self.project(lon, lat), x, y, seed),
            None => (f64::NAN, f64::NAN),
        }
    }

    fn has_inverse(&self) -> bool {
        true
    }

    fn parallels_are_parallel(&self) -> bool {
        self.model.is_unbent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn bent_model() -> ProjectionModel {
        let mut model = ProjectionModel::robinson();
        for i in 1..19 {
            model.set_bend_knot(i, 0.15 * i as f64 / 18.0);
        }
        model.set_meridian_knot(3, 0.2);
        model.set_meridian_knot(8, -0.1);
        model
    }

    fn assert_round_trip(projection: &CurveProjection) {
        for lat_deg in [-80.0, -45.0, -10.0, 0.0, 5.0, 33.0, 60.0, 85.0] {
            for lon_deg in [-175.0, -120.0, -30.0, 0.0, 1.0, 45.0, 100.0, 179.0] {
                let (lon, lat) = (f64::to_radians(lon_deg), f64::to_radians(lat_deg));
                let (x, y) = projection.project(lon, lat);
                let (lon2, lat2) = projection.project_inverse(x, y);
                assert_relative_eq!(lon2, lon, epsilon = 1e-4);
                assert_relative_eq!(lat2, lat, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn flat_model_reference_points() {
        let projection = CurveProjection::new(ProjectionModel::flat());
        let (x, y) = projection.project(PI, 0.0);
        assert_relative_eq!(x, PI, epsilon = 1e-12);
        assert_relative_eq!(y, 0.0);
        let (x, y) = projection.project(0.0, FRAC_PI_2);
        assert_relative_eq!(x, 0.0);
        assert_relative_eq!(y, PI, epsilon = 1e-12);
    }

    #[test]
    fn vertical_scale_stretches_pole_line() {
        let mut model = ProjectionModel::flat();
        model.set_vertical_scale(0.5);
        let projection = CurveProjection::new(model);
        let (_, y) = projection.project(0.0, -FRAC_PI_2);
        assert_relative_eq!(y, -0.5 * PI, epsilon = 1e-12);
    }

    #[test]
    fn round_trip_robinson() {
        assert_round_trip(&CurveProjection::new(ProjectionModel::robinson()));
    }

    #[test]
    fn round_trip_bent_and_unnormalized() {
        let mut model = bent_model();
        model.set_length_knot(0, 0.9);
        model.set_distance_knot(18, 0.95);
        assert!(!model.is_normalized());
        let projection = CurveProjection::new(model);
        assert_round_trip(&projection);
        // the caller's model stays as edited
        assert!(!projection.model().is_normalized());
    }

    #[test]
    fn seed_ignores_bending() {
        let projection = CurveProjection::new(ProjectionModel::robinson());
        let (x, y) = projection.project(1.0, 0.6);
        let (lon, lat) = projection.seed_inverse(x, y).unwrap();
        assert_relative_eq!(lon, 1.0, epsilon = 1e-7);
        assert_relative_eq!(lat, 0.6, epsilon = 1e-7);
    }

    #[test]
    fn inverse_outside_graticule_is_nan() {
        let projection = CurveProjection::new(ProjectionModel::robinson());
        let (lon, lat) = projection.project_inverse(0.0, 5.0);
        assert!(lon.is_nan() && lat.is_nan());
        // beyond the outer meridian on the equator
        let (lon, lat) = projection.project_inverse(3.5, 0.0);
        assert!(lon.is_nan() && lat.is_nan());
    }

    #[test]
    fn editing_invalidates_normalized_copy() {
        let mut projection = CurveProjection::new(ProjectionModel::flat());
        let (x, y) = projection.project(1.0, 0.5);
        assert_relative_eq!(projection.project_inverse(x, y).1, 0.5, epsilon = 1e-6);
        projection.model_mut().set_vertical_scale(0.5);
        let (x, y) = projection.project(1.0, 0.5);
        let (lon, lat) = projection.project_inverse(x, y);
        assert_relative_eq!(lon, 1.0, epsilon = 1e-6);
        assert_relative_eq!(lat, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn bending_marks_parallels_curved() {
        assert!(CurveProjection::new(ProjectionModel::robinson()).parallels_are_parallel());
        assert!(!CurveProjection::new(bent_model()).parallels_are_parallel());
    }
}
