//! Global distortion indices and the acceptance index of a projection.
use std::fmt;
use std::sync::Arc;

use crate::acceptance::{AcceptanceGrid, AcceptanceRaster, AcceptanceThresholds, ProjectedGrid};
use crate::derivative::{DEFAULT_STEP, factors};
use crate::mask::LandMask;
use crate::proj::{MapProjection, ProjError, Projection};

/// Mean distortion over the sphere and over the continents.
///
/// `dan`: mean angular distortion in degrees. `dar`: mean areal distortion, `max(s, 1/s) − 1`.
/// `dab`: mean scale distortion from the Tissot axes. The `c` variants only count land cells.
/// Unavailable values are NaN. Means are normalized by the summed cell areas of the sampled grid
/// (its midpoint approximation of the sphere or land area), not by the exact sphere area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistortionIndices {
    pub dan: f64,
    pub dar: f64,
    pub dab: f64,
    pub danc: f64,
    pub darc: f64,
    pub dabc: f64,
}

impl DistortionIndices {
    pub fn unavailable() -> Self {
        DistortionIndices {
            dan: f64::NAN,
            dar: f64::NAN,
            dab: f64::NAN,
            danc: f64::NAN,
            darc: f64::NAN,
            dabc: f64::NAN,
        }
    }

    pub fn is_available(&self) -> bool {
        !(self.dan.is_nan() && self.dar.is_nan() && self.dab.is_nan())
    }
}

/// The six indices plus the acceptance index `q`, a percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistortionParameters {
    pub indices: DistortionIndices,
    pub q: f64,
}

impl DistortionParameters {
    pub fn unavailable() -> Self {
        DistortionParameters {
            indices: DistortionIndices::unavailable(),
            q: f64::NAN,
        }
    }
}

impl fmt::Display for DistortionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn value(v: f64) -> String {
            if v.is_nan() {
                "n/a".to_owned()
            } else {
                format!("{v:.4}")
            }
        }
        let i = &self.indices;
        write!(
            f,
            "Dan {} Dar {} Dab {} Danc {} Darc {} Dabc {} Q {}",
            value(i.dan),
            value(i.dar),
            value(i.dab),
            value(i.danc),
            value(i.darc),
            value(i.dabc),
            value(self.q)
        )
    }
}

/// Configures a [`DistortionAnalyzer`].
///
/// ```
/// use flexproj::AnalyzerBuilder;
///
/// let analyzer = AnalyzerBuilder::new().grid_step(5.0).build();
/// assert_eq!(analyzer.grid_step(), 5.0);
/// ```
#[derive(Debug, Clone)]
pub struct AnalyzerBuilder {
    grid_step: f64,
    derivative_step: f64,
    land_mask: Option<Arc<LandMask>>,
}

impl Default for AnalyzerBuilder {
    fn default() -> Self {
        AnalyzerBuilder {
            grid_step: 2.5,
            derivative_step: DEFAULT_STEP,
            land_mask: None,
        }
    }
}

impl AnalyzerBuilder {
    pub fn new() -> Self {
        AnalyzerBuilder::default()
    }

    /// Cell size in degrees of the grid sampled for the global indices. Non-positive values
    /// are ignored.
    pub fn grid_step(mut self, degrees: f64) -> Self {
        if degrees > 0.0 && degrees <= 90.0 {
            self.grid_step = degrees;
        }
        self
    }

    /// Finite-difference step in radians.
    pub fn derivative_step(mut self, radians: f64) -> Self {
        if radians > 0.0 && radians.is_finite() {
            self.derivative_step = radians;
        }
        self
    }

    /// Enables the continental indices.
    pub fn land_mask(mut self, mask: Arc<LandMask>) -> Self {
        self.land_mask = Some(mask);
        self
    }

    pub fn build(&self) -> DistortionAnalyzer {
        DistortionAnalyzer {
            config: self.clone(),
            indices: None,
            acceptance: None,
            projected: None,
        }
    }
}

type Key = (u64, u64);

fn key_of(projection: &Projection) -> Key {
    (projection.id(), projection.generation())
}

/// Computes distortion indices, keeping the latest result of each kind until the analysed
/// projection changes.
#[derive(Debug, Clone)]
pub struct DistortionAnalyzer {
    config: AnalyzerBuilder,
    indices: Option<(Key, DistortionIndices)>,
    acceptance: Option<(Key, AcceptanceGrid)>,
    projected: Option<((Key, usize), ProjectedGrid)>,
}

impl Default for DistortionAnalyzer {
    fn default() -> Self {
        AnalyzerBuilder::new().build()
    }
}

impl DistortionAnalyzer {
    pub fn grid_step(&self) -> f64 {
        self.config.grid_step
    }

    pub fn land_mask(&self) -> Option<&LandMask> {
        self.config.land_mask.as_deref()
    }

    /// Drops every cached result.
    pub fn invalidate(&mut self) {
        self.indices = None;
        self.acceptance = None;
        self.projected = None;
    }

    /// The six global indices, all NaN if the projection fails anywhere on the grid.
    pub fn indices(&mut self, projection: &Projection) -> DistortionIndices {
        let key = key_of(projection);
        if let Some((cached, indices)) = &self.indices {
            if *cached == key {
                return *indices;
            }
        }
        let indices = match global_indices(&normal_aspect(projection), &self.config) {
            Ok(indices) => indices,
            Err(err) => {
                log::debug!("Distortion indices unavailable: {err}");
                DistortionIndices::unavailable()
            }
        };
        self.indices = Some((key, indices));
        indices
    }

    /// The spherical acceptance grid, sampled once per projection state.
    pub fn acceptance_grid(&mut self, projection: &Projection) -> &AcceptanceGrid {
        let step = self.config.derivative_step;
        cached(&mut self.acceptance, key_of(projection), || {
            log::debug!("Sampling acceptance grid for projection {}", projection.id());
            AcceptanceGrid::compute(&normal_aspect(projection), step)
        })
    }

    /// Percentage of the sphere meeting `thresholds`.
    pub fn acceptance_index(
        &mut self,
        projection: &Projection,
        thresholds: &AcceptanceThresholds,
    ) -> f64 {
        self.acceptance_grid(projection).acceptance_index(thresholds)
    }

    pub fn parameters(
        &mut self,
        projection: &Projection,
        thresholds: &AcceptanceThresholds,
    ) -> DistortionParameters {
        DistortionParameters {
            indices: self.indices(projection),
            q: self.acceptance_index(projection, thresholds),
        }
    }

    /// Accept/reject image of the map, `width` pixels wide. Requires an inverse projection.
    pub fn acceptance_raster(
        &mut self,
        projection: &Projection,
        thresholds: &AcceptanceThresholds,
        width: usize,
    ) -> Result<AcceptanceRaster, ProjError> {
        let key = (key_of(projection), width);
        if !self.projected.as_ref().is_some_and(|(cached, _)| *cached == key) {
            let projected =
                ProjectedGrid::compute(&normal_aspect(projection).normalized(), width)?;
            self.projected = Some((key, projected));
        }
        let step = self.config.derivative_step;
        let grid = cached(&mut self.acceptance, key.0, || {
            AcceptanceGrid::compute(&normal_aspect(projection), step)
        });
        let projected = self
            .projected
            .as_ref()
            .map(|(_, projected)| projected)
            .ok_or(ProjError::NoInverse)?;
        Ok(projected.render(grid, thresholds))
    }
}

fn cached<K: PartialEq, T>(slot: &mut Option<(K, T)>, key: K, compute: impl FnOnce() -> T) -> &T {
    if !slot.as_ref().is_some_and(|(cached, _)| *cached == key) {
        *slot = None;
    }
    &slot.get_or_insert_with(|| (key, compute())).1
}

/// Copy of `projection` centred on the prime meridian.
fn normal_aspect(projection: &Projection) -> Projection {
    if projection.central_meridian() == 0.0 {
        projection.clone()
    } else {
        projection.with_central_meridian(0.0)
    }
}

#[derive(Default)]
struct Sums {
    angle: f64,
    area: f64,
    scale: f64,
    weight: f64,
}

impl Sums {
    fn add(&mut self, omega: f64, area_ratio: f64, scale_ratio: f64, weight: f64) {
        self.angle += omega * weight;
        self.area += (area_ratio - 1.0) * weight;
        self.scale += (scale_ratio - 1.0) * weight;
        self.weight += weight;
    }

    fn means(&self) -> (f64, f64, f64) {
        if self.weight > 0.0 {
            (
                (self.angle / self.weight).to_degrees(),
                self.area / self.weight,
                self.scale / self.weight,
            )
        } else {
            (f64::NAN, f64::NAN, f64::NAN)
        }
    }
}

fn global_indices<P>(
    projection: &P,
    config: &AnalyzerBuilder,
) -> Result<DistortionIndices, ProjError>
where
    P: MapProjection + ?Sized,
{
    let step = config.grid_step;
    let columns = (360.0 / step).round() as usize;
    let rows = (180.0 / step).round() as usize;
    let cell = step.to_radians();
    let mut global = Sums::default();
    let mut land = Sums::default();

    for row in 0..rows {
        let lat_deg = -90.0 + (row as f64 + 0.5) * step;
        let lat = lat_deg.to_radians();
        let weight = lat.cos() * cell * cell;
        for column in 0..columns {
            let lon_deg = -180.0 + (column as f64 + 0.5) * step;
            let f = factors(projection, lon_deg.to_radians(), lat, config.derivative_step)?;
            let (area_ratio, scale_ratio) = (f.area_ratio(), f.scale_ratio());
            global.add(f.omega, area_ratio, scale_ratio, weight);
            if config
                .land_mask
                .as_ref()
                .is_some_and(|mask| mask.is_land(lon_deg, lat_deg))
            {
                land.add(f.omega, area_ratio, scale_ratio, weight);
            }
        }
    }

    let (mut dan, mut dar, dab) = global.means();
    let (mut danc, mut darc, dabc) = land.means();
    if projection.is_equal_area() {
        dar = 0.0;
        darc = 0.0;
    }
    if projection.is_conformal() {
        dan = 0.0;
        danc = 0.0;
    }
    Ok(DistortionIndices {
        dan,
        dar,
        dab,
        danc,
        darc,
        dabc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptance::{AcceptancePixel, AreaReference};
    use crate::mask::MaskOrigin;
    use crate::reference::{Mercator, PlateCarree, ReferenceProjection, Sinusoidal};
    use crate::{CurveProjection, MeanMixer, ProjectionKind, ProjectionModel};
    use approx::assert_relative_eq;

    fn reference(name: &str, p: impl MapProjection + Send + Sync + 'static) -> Projection {
        Projection::from(ReferenceProjection::new(name, p))
    }

    fn whole_world_land() -> Arc<LandMask> {
        Arc::new(LandMask::new(360, 180, vec![true; 360 * 180], MaskOrigin::default()).unwrap())
    }

    #[test]
    fn equal_area_forces_areal_indices_to_zero() {
        let mut analyzer = AnalyzerBuilder::new().land_mask(whole_world_land()).build();
        let indices = analyzer.indices(&reference("Sinusoidal", Sinusoidal));
        assert_eq!(indices.dar, 0.0);
        assert_eq!(indices.darc, 0.0);
        assert!(indices.dan > 0.0);
    }

    #[test]
    fn conformal_forces_angular_indices_to_zero() {
        let mut analyzer = AnalyzerBuilder::new().build();
        let indices = analyzer.indices(&reference("Mercator", Mercator));
        assert_eq!(indices.dan, 0.0);
        assert_eq!(indices.danc, 0.0);
        assert!(indices.dar > 0.0);
        // no mask
        assert!(indices.darc.is_nan());
    }

    #[test]
    fn plate_carree_indices() {
        let mut analyzer = AnalyzerBuilder::new().land_mask(whole_world_land()).build();
        let indices = analyzer.indices(&reference("Plate Carrée", PlateCarree));
        // s = 1 / cos φ, so the mean of s − 1 over the sphere is (π − 2) / 2
        assert!(indices.dar > 0.4 && indices.dar < 1.0, "{indices:?}");
        assert!(indices.dan > 5.0 && indices.dan < 40.0, "{indices:?}");
        // the mask covers everything
        assert_relative_eq!(indices.danc, indices.dan, epsilon = 1e-9);
        assert_relative_eq!(indices.dabc, indices.dab, epsilon = 1e-9);
    }

    #[test]
    fn means_are_normalized_by_the_sampled_cell_areas() {
        let step = 10.0_f64;
        let mut analyzer = AnalyzerBuilder::new().grid_step(step).build();
        let indices = analyzer.indices(&reference("Plate Carrée", PlateCarree));
        // every column of a row shares cos φ, and s − 1 = 1 / cos φ − 1
        let cosines: Vec<f64> = (0..18)
            .map(|row| (-90.0 + (row as f64 + 0.5) * step).to_radians().cos())
            .collect();
        let weights: f64 = cosines.iter().sum();
        let excess: f64 = cosines.iter().map(|c| 1.0 - c).sum();
        assert_relative_eq!(indices.dar, excess / weights, epsilon = 1e-5);
    }

    #[test]
    fn continental_indices_follow_the_mask() {
        // land only within 30° of the equator, where the plate carrée is least distorted
        let mut land = vec![false; 360 * 180];
        for row in 60..120 {
            for column in 0..360 {
                land[row * 360 + column] = true;
            }
        }
        let mask = Arc::new(LandMask::new(360, 180, land, MaskOrigin::default()).unwrap());
        let mut analyzer = AnalyzerBuilder::new().land_mask(mask).build();
        let indices = analyzer.indices(&reference("Plate Carrée", PlateCarree));
        assert!(indices.darc < indices.dar);
        assert!(indices.danc < indices.dan);
    }

    #[test]
    fn results_are_cached_per_state() {
        let mut projection = Projection::from(CurveProjection::new(ProjectionModel::robinson()));
        let mut analyzer = AnalyzerBuilder::new()
            .grid_step(10.0)
            .land_mask(whole_world_land())
            .build();
        let before = analyzer.indices(&projection);
        assert!(before.is_available());
        assert_eq!(analyzer.indices(&projection), before);

        if let Some(curve) = projection.as_curve_mut() {
            curve.model_mut().set_bend_knot(12, 0.5);
        }
        let after = analyzer.indices(&projection);
        assert_ne!(after, before);

        // a rotated copy is analysed in normal aspect
        let rotated = projection.with_central_meridian(1.0);
        assert_eq!(analyzer.indices(&rotated), after);
    }

    #[test]
    fn parameters_and_raster() {
        let projection = Projection::from(CurveProjection::new(ProjectionModel::robinson()));
        let thresholds = AcceptanceThresholds::new(20.0, 1.5, AreaReference::Unit).unwrap();
        let mut analyzer = AnalyzerBuilder::new().build();
        let parameters = analyzer.parameters(&projection, &thresholds);
        assert!(parameters.q > 0.0 && parameters.q < 100.0);
        assert!(parameters.indices.danc.is_nan());
        assert!(parameters.to_string().contains("Danc n/a"));

        let raster = analyzer
            .acceptance_raster(&projection, &thresholds, 60)
            .unwrap();
        assert_eq!(raster.width, 60);
        assert_eq!(raster.pixel(30, raster.height / 2), AcceptancePixel::Accepted);
        assert!(raster.count(AcceptancePixel::Rejected) > 0);
    }

    #[test]
    fn replacing_the_projection_kind_recomputes() {
        let mut model = ProjectionModel::flat();
        model.set_scale(2.0);
        let mut projection = Projection::from(CurveProjection::new(model));
        let mut analyzer = AnalyzerBuilder::new().grid_step(10.0).build();
        let flat = analyzer.indices(&projection);

        let generation = projection.generation();
        *projection.kind_mut() =
            ProjectionKind::Curve(CurveProjection::new(ProjectionModel::robinson()));
        assert_ne!(projection.generation(), generation);

        let fresh = AnalyzerBuilder::new()
            .grid_step(10.0)
            .build()
            .indices(&projection);
        let cached = analyzer.indices(&projection);
        assert_eq!(cached.dan.to_bits(), fresh.dan.to_bits());
        assert_ne!(cached.dan, flat.dan);
    }

    #[test]
    fn replacing_a_mixer_part_recomputes() {
        let mut sinusoidal = reference("Sinusoidal", Sinusoidal);
        sinusoidal.set_central_meridian(0.3);
        sinusoidal.set_central_meridian(0.0);
        let mixer = MeanMixer::new(sinusoidal, reference("Plate Carrée", PlateCarree), 0.0);
        let mut projection = Projection::from(mixer);
        let mut analyzer = AnalyzerBuilder::new().grid_step(10.0).build();
        assert_eq!(analyzer.indices(&projection).dar, 0.0);

        if let ProjectionKind::Mean(mixer) = projection.kind_mut() {
            *mixer.first_mut() = reference("Plate Carrée", PlateCarree);
        }
        let fresh = AnalyzerBuilder::new()
            .grid_step(10.0)
            .build()
            .indices(&projection);
        let cached = analyzer.indices(&projection);
        assert!(cached.dar > 0.0);
        assert_eq!(cached.dar.to_bits(), fresh.dar.to_bits());
    }

    #[test]
    fn raster_needs_an_inverse() {
        let forward_only =
            Projection::from(ReferenceProjection::forward_only("Plate Carrée", PlateCarree));
        let mut analyzer = DistortionAnalyzer::default();
        assert_eq!(
            analyzer.acceptance_raster(&forward_only, &AcceptanceThresholds::default(), 10),
            Err(ProjError::NoInverse)
        );
    }
}
