//! Projections combining two other projections.
//!
//! - [`MeanMixer`] blends the projected coordinates of both parts.
//! - [`LatitudeMixer`] uses one part near the equator and the other toward the poles.
//! - [`KnotBlendMixer`] fits a curve model to each part and blends their knots.
use std::f64::consts::PI;
use std::sync::OnceLock;

use crate::curve::CurveProjection;
use crate::inverse::refine_inverse;
use crate::model::ProjectionModel;
use crate::proj::{MapProjection, ProjError, Projection, next_generation};

/// Seeds an inverse with the first part that has one, preferring `first`.
fn seed_from(first: &Projection, second: &Projection, x: f64, y: f64) -> (f64, f64) {
    [first, second]
        .into_iter()
        .filter(|p| p.has_inverse())
        .map(|p| p.project_inverse(x, y))
        .find(|(lon, lat)| lon.is_finite() && lat.is_finite())
        .unwrap_or((0.0, 0.0))
}

/// Weighted mean of two projections: `w·P2 + (1 − w)·P1`, then scaled.
#[derive(Debug, Clone)]
pub struct MeanMixer {
    first: Box<Projection>,
    second: Box<Projection>,
    weight: f64,
    scale: f64,
    vertical_scale: f64,
    revision: u64,
}

impl MeanMixer {
    pub fn new(first: Projection, second: Projection, weight: f64) -> Self {
        MeanMixer {
            first: Box::new(first),
            second: Box::new(second),
            weight,
            scale: 1.0,
            vertical_scale: 1.0,
            revision: 0,
        }
    }

    pub fn first(&self) -> &Projection {
        &self.first
    }

    pub fn second(&self) -> &Projection {
        &self.second
    }

    pub fn first_mut(&mut self) -> &mut Projection {
        self.revision = next_generation();
        &mut self.first
    }

    pub fn second_mut(&mut self) -> &mut Projection {
        self.revision = next_generation();
        &mut self.second
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight.clamp(0.0, 1.0);
        self.revision = next_generation();
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
        self.revision = next_generation();
    }

    pub fn vertical_scale(&self) -> f64 {
        self.vertical_scale
    }

    pub fn set_vertical_scale(&mut self, vertical_scale: f64) {
        self.vertical_scale = vertical_scale;
        self.revision = next_generation();
    }

    pub fn generation(&self) -> u64 {
        self.revision
            .max(self.first.generation())
            .max(self.second.generation())
    }

    fn selected(&self) -> Option<&Projection> {
        if self.weight == 0.0 {
            Some(&self.first)
        } else if self.weight == 1.0 {
            Some(&self.second)
        } else {
            None
        }
    }
}

impl MapProjection for MeanMixer {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (x1, y1) = self.first.project(lon, lat);
        let (x2, y2) = self.second.project(lon, lat);
        let w = self.weight;
        let x = w * x2 + (1.0 - w) * x1;
        let y = w * y2 + (1.0 - w) * y1;
        (self.scale * x, self.scale * self.vertical_scale * y)
    }

    fn project_inverse(&self, x: f64, y: f64) -> (f64, f64) {
        if !self.has_inverse() {
            return (f64::NAN, f64::NAN);
        }
        let seed = seed_from(
            &self.first,
            &self.second,
            x / self.scale,
            y / (self.scale * self.vertical_scale),
        );
        refine_inverse(|lon, lat| self.project(lon, lat), x, y, seed)
    }

    fn has_inverse(&self) -> bool {
        self.first.has_inverse() || self.second.has_inverse()
    }

    fn is_conformal(&self) -> bool {
        self.vertical_scale == 1.0 && self.selected().is_some_and(|p| p.is_conformal())
    }

    fn is_equal_area(&self) -> bool {
        self.scale * self.scale * self.vertical_scale == 1.0
            && self.selected().is_some_and(|p| p.is_equal_area())
    }

    fn parallels_are_parallel(&self) -> bool {
        self.first.parallels_are_parallel() && self.second.parallels_are_parallel()
    }
}

/// How the polar part of a [`LatitudeMixer`] is scaled.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PoleScale {
    /// Match the lengths of the fusion parallel in both parts.
    #[default]
    Automatic,
    Fixed(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PoleFit {
    scale: f64,
    offset: f64,
}

/// Uses the first projection up to a fusion latitude and the second one beyond it.
///
/// The polar part is scaled and shifted vertically so that both parts meet at the fusion
/// latitude. Within `tolerance` of that latitude the two are blended linearly.
#[derive(Debug, Clone)]
pub struct LatitudeMixer {
    first: Box<Projection>,
    second: Box<Projection>,
    latitude: f64,
    tolerance: f64,
    pole_scale: PoleScale,
    fit: OnceLock<PoleFit>,
    revision: u64,
}

impl LatitudeMixer {
    /// `latitude` and `tolerance` in radians.
    pub fn new(first: Projection, second: Projection, latitude: f64, tolerance: f64) -> Self {
        LatitudeMixer {
            first: Box::new(first),
            second: Box::new(second),
            latitude: latitude.abs().min(PI / 2.0),
            tolerance: tolerance.abs(),
            pole_scale: PoleScale::Automatic,
            fit: OnceLock::new(),
            revision: 0,
        }
    }

    pub fn first(&self) -> &Projection {
        &self.first
    }

    pub fn second(&self) -> &Projection {
        &self.second
    }

    pub fn first_mut(&mut self) -> &mut Projection {
        self.invalidate();
        &mut self.first
    }

    pub fn second_mut(&mut self) -> &mut Projection {
        self.invalidate();
        &mut self.second
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn set_latitude(&mut self, latitude: f64) {
        self.latitude = latitude.abs().min(PI / 2.0);
        self.invalidate();
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance.abs();
        self.invalidate();
    }

    pub fn pole_scale(&self) -> PoleScale {
        self.pole_scale
    }

    pub fn set_pole_scale(&mut self, pole_scale: PoleScale) {
        self.pole_scale = pole_scale;
        self.invalidate();
    }

    /// Scale applied to the polar part, automatic or user-set.
    pub fn effective_pole_scale(&self) -> f64 {
        self.fit().scale
    }

    /// Vertical shift applied to the polar part after scaling.
    pub fn pole_offset(&self) -> f64 {
        self.fit().offset
    }

    pub fn generation(&self) -> u64 {
        self.revision
            .max(self.first.generation())
            .max(self.second.generation())
    }

    /// The equatorial part at `(lon, |lat|)`, northern hemisphere.
    pub fn project_lower(&self, lon: f64, lat: f64) -> (f64, f64) {
        self.first.project(lon, lat.abs())
    }

    /// The scaled and shifted polar part at `(lon, |lat|)`, northern hemisphere.
    pub fn project_upper(&self, lon: f64, lat: f64) -> (f64, f64) {
        let fit = self.fit();
        let (x, y) = self.second.project(lon, lat.abs());
        (fit.scale * x, fit.scale * y + fit.offset)
    }

    fn invalidate(&mut self) {
        self.fit = OnceLock::new();
        self.revision = next_generation();
    }

    fn fit(&self) -> PoleFit {
        *self.fit.get_or_init(|| {
            let scale = match self.pole_scale {
                PoleScale::Fixed(scale) => scale,
                PoleScale::Automatic => {
                    let (x1, _) = self.first.project(PI, self.latitude);
                    let (x2, _) = self.second.project(PI, self.latitude);
                    if x2 != 0.0 && (x1 / x2).is_finite() {
                        x1 / x2
                    } else {
                        log::debug!("Fusion parallel has no length, using pole scale 1");
                        1.0
                    }
                }
            };
            let (_, y1) = self.first.project(0.0, self.latitude);
            let (_, y2) = self.second.project(0.0, self.latitude);
            PoleFit {
                scale,
                offset: y1 - scale * y2,
            }
        })
    }
}

impl MapProjection for LatitudeMixer {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let abs_lat = lat.abs();
        let lower = self.latitude - self.tolerance;
        let upper = self.latitude + self.tolerance;
        let (x, y) = if abs_lat <= lower {
            self.project_lower(lon, abs_lat)
        } else if abs_lat >= upper {
            self.project_upper(lon, abs_lat)
        } else {
            let t = (abs_lat - lower) / (upper - lower);
            let (x1, y1) = self.project_lower(lon, abs_lat);
            let (x2, y2) = self.project_upper(lon, abs_lat);
            ((1.0 - t) * x1 + t * x2, (1.0 - t) * y1 + t * y2)
        };
        (x, if lat < 0.0 { -y } else { y })
    }

    fn project_inverse(&self, x: f64, y: f64) -> (f64, f64) {
        if !self.has_inverse() {
            return (f64::NAN, f64::NAN);
        }
        let seed = seed_from(&self.first, &self.second, x, y);
        refine_inverse(|lon, lat| self.project(lon, lat), x, y, seed)
    }

    fn has_inverse(&self) -> bool {
        self.first.has_inverse() || self.second.has_inverse()
    }

    fn is_conformal(&self) -> bool {
        self.tolerance == 0.0 && self.first.is_conformal() && self.second.is_conformal()
    }

    fn is_equal_area(&self) -> bool {
        self.tolerance == 0.0
            && self.effective_pole_scale() == 1.0
            && self.first.is_equal_area()
            && self.second.is_equal_area()
    }

    fn parallels_are_parallel(&self) -> bool {
        self.first.parallels_are_parallel() && self.second.parallels_are_parallel()
    }
}

/// Blend weights of a [`KnotBlendMixer`], one per control curve.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KnotWeights {
    pub length: f64,
    pub distance: f64,
    pub bend: f64,
    pub meridians: f64,
}

impl KnotWeights {
    pub fn uniform(weight: f64) -> Self {
        KnotWeights {
            length: weight,
            distance: weight,
            bend: weight,
            meridians: weight,
        }
    }
}

/// Blends the curve-model equivalents of two projections knot by knot.
///
/// Projections that are not curve-based are first approximated with
/// [`ProjectionModel::reset`]. The blended projection is rebuilt on first use after any change.
#[derive(Debug, Clone)]
pub struct KnotBlendMixer {
    first: Box<Projection>,
    second: Box<Projection>,
    weights: KnotWeights,
    blended: OnceLock<Option<CurveProjection>>,
    revision: u64,
}

impl KnotBlendMixer {
    pub fn new(first: Projection, second: Projection, weights: KnotWeights) -> Self {
        KnotBlendMixer {
            first: Box::new(first),
            second: Box::new(second),
            weights,
            blended: OnceLock::new(),
            revision: 0,
        }
    }

    pub fn first(&self) -> &Projection {
        &self.first
    }

    pub fn second(&self) -> &Projection {
        &self.second
    }

    pub fn first_mut(&mut self) -> &mut Projection {
        self.invalidate();
        &mut self.first
    }

    pub fn second_mut(&mut self) -> &mut Projection {
        self.invalidate();
        &mut self.second
    }

    pub fn weights(&self) -> KnotWeights {
        self.weights
    }

    pub fn set_weights(&mut self, weights: KnotWeights) {
        self.weights = weights;
        self.invalidate();
    }

    pub fn generation(&self) -> u64 {
        self.revision
            .max(self.first.generation())
            .max(self.second.generation())
    }

    /// The blended curve projection, or `None` if a part could not be fitted.
    pub fn blended(&self) -> Option<&CurveProjection> {
        self.blended
            .get_or_init(|| match self.build() {
                Ok(curve) => Some(curve),
                Err(err) => {
                    log::warn!("Couldn't blend projections: {err}");
                    None
                }
            })
            .as_ref()
    }

    fn build(&self) -> Result<CurveProjection, ProjError> {
        log::debug!("Rebuilding knot blend with {:?}", self.weights);
        let mut model = equivalent_model(&self.first)?;
        let other = equivalent_model(&self.second)?;
        let w = self.weights;
        model.mix_knots(&other, w.length, w.distance, w.bend, w.meridians);
        Ok(CurveProjection::new(model))
    }

    fn invalidate(&mut self) {
        self.blended = OnceLock::new();
        self.revision = next_generation();
    }
}

/// The curve model of a curve projection, or a model fitted to the graticule of any other.
pub fn equivalent_model(projection: &Projection) -> Result<ProjectionModel, ProjError> {
    match projection.as_curve() {
        Some(curve) => Ok(curve.model().clone()),
        None => {
            let mut model = ProjectionModel::default();
            model.reset(&projection.with_central_meridian(0.0))?;
            Ok(model)
        }
    }
}

impl MapProjection for KnotBlendMixer {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self.blended() {
            Some(curve) => curve.project(lon, lat),
            None => (f64::NAN, f64::NAN),
        }
    }

    fn project_inverse(&self, x: f64, y: f64) -> (f64, f64) {
        match self.blended() {
            Some(curve) => curve.project_inverse(x, y),
            None => (f64::NAN, f64::NAN),
        }
    }

    fn has_inverse(&self) -> bool {
        self.blended().is_some()
    }

    fn parallels_are_parallel(&self) -> bool {
        self.blended().is_none_or(|curve| curve.parallels_are_parallel())
    }
}
