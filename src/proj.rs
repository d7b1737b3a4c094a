use num_traits::Float;
use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::curve::CurveProjection;
use crate::mixer::{KnotBlendMixer, LatitudeMixer, MeanMixer};
use crate::reference::ReferenceProjection;

/// Errors raised by projection, analysis and fitting operations.
///
/// Inverse projection misses are not errors: [`MapProjection::project_inverse`] reports them as
/// `(NaN, NaN)`. Only the coordinate adaptors turn them into [`ProjError::NoConvergence`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjError {
    #[error("Coordinate outside the valid domain: lon {lon}, lat {lat}")]
    Domain { lon: f64, lat: f64 },
    #[error("The projection produced a non-finite value at lon {lon}, lat {lat}")]
    NonFinite { lon: f64, lat: f64 },
    #[error("Inverse projection of ({x}, {y}) did not converge")]
    NoConvergence { x: f64, y: f64 },
    #[error("The projection has no inverse")]
    NoInverse,
    #[error("Invalid acceptance threshold {name}: {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
    #[error("Couldn't fit a curve model to the projection: {0}")]
    Fit(String),
    #[error("Couldn't convert a coordinate to or from f64")]
    FloatConversion,
}

/// The capability set shared by every projection.
///
/// Longitude and latitude are in radians, central meridian already removed, with
/// `lon ∈ [-π, π]` and `lat ∈ [-π/2, π/2]`. Projected coordinates are on the unit sphere.
/// Points outside the projected domain map to `(NaN, NaN)`.
pub trait MapProjection {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64);

    fn project_inverse(&self, _x: f64, _y: f64) -> (f64, f64) {
        (f64::NAN, f64::NAN)
    }

    fn has_inverse(&self) -> bool {
        false
    }

    fn is_conformal(&self) -> bool {
        false
    }

    fn is_equal_area(&self) -> bool {
        false
    }

    fn parallels_are_parallel(&self) -> bool {
        true
    }
}

/// The closed set of projection variants.
#[derive(Debug, Clone)]
pub enum ProjectionKind {
    Curve(CurveProjection),
    Mean(MeanMixer),
    Latitude(LatitudeMixer),
    KnotBlend(KnotBlendMixer),
    Reference(ReferenceProjection),
}

impl ProjectionKind {
    fn generation(&self) -> u64 {
        match self {
            ProjectionKind::Curve(p) => p.generation(),
            ProjectionKind::Mean(p) => p.generation(),
            ProjectionKind::Latitude(p) => p.generation(),
            ProjectionKind::KnotBlend(p) => p.generation(),
            ProjectionKind::Reference(_) => 0,
        }
    }

    fn as_map_projection(&self) -> &dyn MapProjection {
        match self {
            ProjectionKind::Curve(p) => p,
            ProjectionKind::Mean(p) => p,
            ProjectionKind::Latitude(p) => p,
            ProjectionKind::KnotBlend(p) => p,
            ProjectionKind::Reference(p) => p,
        }
    }
}

impl MapProjection for ProjectionKind {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        self.as_map_projection().project(lon, lat)
    }

    fn project_inverse(&self, x: f64, y: f64) -> (f64, f64) {
        self.as_map_projection().project_inverse(x, y)
    }

    fn has_inverse(&self) -> bool {
        self.as_map_projection().has_inverse()
    }

    fn is_conformal(&self) -> bool {
        self.as_map_projection().is_conformal()
    }

    fn is_equal_area(&self) -> bool {
        self.as_map_projection().is_equal_area()
    }

    fn parallels_are_parallel(&self) -> bool {
        self.as_map_projection().parallels_are_parallel()
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// A generation stamp larger than every stamp handed out before, process-wide.
///
/// Composite values report the largest stamp among themselves and their parts, so replacing
/// a part always yields a generation that was never observed before.
pub(crate) fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// A projection variant together with its central meridian.
///
/// Mutation goes through [`Projection::kind_mut`] or the setters and bumps
/// [`Projection::generation`]. Every instance, clones included, carries its own
/// [`Projection::id`], so `(id, generation)` names one snapshot of one projection.
#[derive(Debug)]
pub struct Projection {
    kind: ProjectionKind,
    central_meridian: f64,
    revision: u64,
    id: u64,
}

impl Clone for Projection {
    fn clone(&self) -> Self {
        Projection {
            kind: self.kind.clone(),
            central_meridian: self.central_meridian,
            revision: self.revision,
            id: next_id(),
        }
    }
}

impl Projection {
    pub fn new(kind: ProjectionKind) -> Self {
        Projection {
            kind,
            central_meridian: 0.0,
            revision: 0,
            id: next_id(),
        }
    }

    /// Identity of this instance; clones get a new one.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> &ProjectionKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut ProjectionKind {
        self.revision = next_generation();
        &mut self.kind
    }

    pub fn as_curve(&self) -> Option<&CurveProjection> {
        match &self.kind {
            ProjectionKind::Curve(curve) => Some(curve),
            _ => None,
        }
    }

    pub fn as_curve_mut(&mut self) -> Option<&mut CurveProjection> {
        match self.kind_mut() {
            ProjectionKind::Curve(curve) => Some(curve),
            _ => None,
        }
    }

    /// Central meridian in radians.
    pub fn central_meridian(&self) -> f64 {
        self.central_meridian
    }

    pub fn set_central_meridian(&mut self, lon: f64) {
        self.central_meridian = wrap_longitude(lon);
        self.revision = next_generation();
    }

    /// A copy of this projection centred on `lon`; `self` is left untouched.
    pub fn with_central_meridian(&self, lon: f64) -> Projection {
        let mut copy = self.clone();
        copy.set_central_meridian(lon);
        copy
    }

    /// A copy with a normalized curve model if this is a curve projection. The projected
    /// graticule is unchanged.
    pub fn normalized(&self) -> Projection {
        let mut copy = self.clone();
        if let Some(curve) = copy.as_curve_mut() {
            curve.model_mut().normalize();
        }
        copy
    }

    /// Changes whenever the projection or any of its parts is mutated.
    pub fn generation(&self) -> u64 {
        self.revision.max(self.kind.generation())
    }

    /// Projects or inverse-projects a single coordinate, in radians for geographic values.
    ///
    /// ```
    /// use flexproj::{CurveProjection, Projection, ProjectionModel};
    ///
    /// let projection = Projection::from(CurveProjection::new(ProjectionModel::flat()));
    /// let (x, y) = projection
    ///     .project_coord((std::f64::consts::PI, 0.0), false)
    ///     .unwrap();
    /// assert!((x - std::f64::consts::PI).abs() < 1e-12);
    /// assert_eq!(y, 0.0);
    /// ```
    pub fn project_coord<C, F>(&self, point: C, inverse: bool) -> Result<C, ProjError>
    where
        C: Coord<F>,
        F: CoordinateType,
    {
        let a = point.x().to_f64().ok_or(ProjError::FloatConversion)?;
        let b = point.y().to_f64().ok_or(ProjError::FloatConversion)?;
        let (u, v) = if inverse {
            if !self.has_inverse() {
                return Err(ProjError::NoInverse);
            }
            let (lon, lat) = self.project_inverse(a, b);
            if lon.is_nan() || lat.is_nan() {
                return Err(ProjError::NoConvergence { x: a, y: b });
            }
            (lon, lat)
        } else {
            let (x, y) = self.project(a, b);
            if !(x.is_finite() && y.is_finite()) {
                return Err(ProjError::NonFinite { lon: a, lat: b });
            }
            (x, y)
        };
        Ok(C::from_xy(
            F::from(u).ok_or(ProjError::FloatConversion)?,
            F::from(v).ok_or(ProjError::FloatConversion)?,
        ))
    }

    /// Projects a slice of coordinates in place. Stops at the first failing coordinate.
    pub fn project_array<'a, C, F>(
        &self,
        points: &'a mut [C],
        inverse: bool,
    ) -> Result<&'a mut [C], ProjError>
    where
        C: Coord<F>,
        F: CoordinateType,
    {
        for point in points.iter_mut() {
            *point = self.project_coord(point.clone(), inverse)?;
        }
        Ok(points)
    }
}

impl MapProjection for Projection {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        if self.central_meridian == 0.0 {
            self.kind.project(lon, lat)
        } else {
            self.kind
                .project(wrap_longitude(lon - self.central_meridian), lat)
        }
    }

    fn project_inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let (lon, lat) = self.kind.project_inverse(x, y);
        if self.central_meridian == 0.0 || lon.is_nan() {
            (lon, lat)
        } else {
            (wrap_longitude(lon + self.central_meridian), lat)
        }
    }

    fn has_inverse(&self) -> bool {
        self.kind.has_inverse()
    }

    fn is_conformal(&self) -> bool {
        self.kind.is_conformal()
    }

    fn is_equal_area(&self) -> bool {
        self.kind.is_equal_area()
    }

    fn parallels_are_parallel(&self) -> bool {
        self.kind.parallels_are_parallel()
    }
}

impl From<ProjectionKind> for Projection {
    fn from(kind: ProjectionKind) -> Self {
        Projection::new(kind)
    }
}

impl From<CurveProjection> for Projection {
    fn from(p: CurveProjection) -> Self {
        Projection::new(ProjectionKind::Curve(p))
    }
}

impl From<MeanMixer> for Projection {
    fn from(p: MeanMixer) -> Self {
        Projection::new(ProjectionKind::Mean(p))
    }
}

impl From<LatitudeMixer> for Projection {
    fn from(p: LatitudeMixer) -> Self {
        Projection::new(ProjectionKind::Latitude(p))
    }
}

impl From<KnotBlendMixer> for Projection {
    fn from(p: KnotBlendMixer) -> Self {
        Projection::new(ProjectionKind::KnotBlend(p))
    }
}

impl From<ReferenceProjection> for Projection {
    fn from(p: ReferenceProjection) -> Self {
        Projection::new(ProjectionKind::Reference(p))
    }
}

/// Wraps a longitude into `[-π, π]`. Values already in range are returned unchanged.
pub(crate) fn wrap_longitude(lon: f64) -> f64 {
    if (-PI..=PI).contains(&lon) {
        lon
    } else {
        (lon + PI).rem_euclid(2.0 * PI) - PI
    }
}

/// Clamps a geographic coordinate into the valid domain.
pub(crate) fn clamp_to_domain(lon: f64, lat: f64) -> (f64, f64) {
    (lon.clamp(-PI, PI), lat.clamp(-FRAC_PI_2, FRAC_PI_2))
}

pub trait CoordinateType: Float + Copy + PartialOrd + Debug {}
impl<T: Float + Copy + PartialOrd + Debug> CoordinateType for T {}

/// An item which can be passed to [`Projection::project_coord`].
pub trait Coord<T>: Clone
where
    T: CoordinateType,
{
    fn x(&self) -> T;
    fn y(&self) -> T;
    fn from_xy(x: T, y: T) -> Self;
}

impl<T: CoordinateType> Coord<T> for (T, T) {
    fn x(&self) -> T {
        self.0
    }
    fn y(&self) -> T {
        self.1
    }
    fn from_xy(x: T, y: T) -> Self {
        (x, y)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::ProjectionModel;
    use crate::reference;
    use approx::assert_relative_eq;

    fn flat() -> Projection {
        Projection::from(CurveProjection::new(ProjectionModel::flat()))
    }

    #[test]
    fn test_wrap_longitude() {
        assert_eq!(wrap_longitude(PI), PI);
        assert_eq!(wrap_longitude(-PI), -PI);
        assert_relative_eq!(wrap_longitude(1.5 * PI), -0.5 * PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_longitude(-1.5 * PI), 0.5 * PI, epsilon = 1e-12);
    }

    #[test]
    fn test_central_meridian_shift() {
        let base = flat();
        let shifted = base.with_central_meridian(0.5);
        assert_eq!(base.central_meridian(), 0.0);
        let (x, y) = shifted.project(0.5, 0.3);
        let (x0, y0) = base.project(0.0, 0.3);
        assert_relative_eq!(x, x0, epsilon = 1e-12);
        assert_relative_eq!(y, y0, epsilon = 1e-12);
        let (lon, lat) = shifted.project_inverse(x, y);
        assert_relative_eq!(lon, 0.5, epsilon = 1e-6);
        assert_relative_eq!(lat, 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_generation_changes_on_mutation() {
        let mut projection = flat();
        let before = projection.generation();
        projection
            .as_curve_mut()
            .unwrap()
            .model_mut()
            .set_vertical_scale(0.8);
        assert!(projection.generation() > before);
    }

    #[test]
    fn test_clones_have_their_own_identity() {
        let projection = flat();
        let copy = projection.clone();
        assert_ne!(projection.id(), copy.id());
        assert_eq!(projection.generation(), copy.generation());
    }

    #[test]
    fn test_project_coord() {
        let projection = flat();
        let (x, y) = projection
            .project_coord((0.0f32, std::f32::consts::FRAC_PI_2), false)
            .unwrap();
        assert_relative_eq!(x, 0.0);
        assert_relative_eq!(y, std::f32::consts::PI, epsilon = 1e-6);
    }

    #[test]
    fn test_inverse_miss_is_an_error() {
        let projection = flat();
        let err = projection.project_coord((10.0, 10.0), true).unwrap_err();
        assert_eq!(err, ProjError::NoConvergence { x: 10.0, y: 10.0 });
    }

    #[test]
    fn test_no_inverse() {
        let projection = Projection::from(reference::by_name("Mercator").unwrap());
        assert!(projection.has_inverse());
        let forward_only = Projection::from(ReferenceProjection::forward_only(
            "Plate Carrée (forward only)",
            reference::PlateCarree,
        ));
        assert_eq!(
            forward_only.project_coord((0.0, 0.0), true).unwrap_err(),
            ProjError::NoInverse
        );
    }

    #[test]
    fn test_project_array() {
        let projection = flat();
        let mut points = [(0.0, 0.0), (PI, 0.0), (0.0, FRAC_PI_2)];
        projection.project_array(&mut points, false).unwrap();
        assert_relative_eq!(points[1].0, PI, epsilon = 1e-12);
        assert_relative_eq!(points[2].1, PI, epsilon = 1e-12);
    }
}
