//! Acceptance index: the share of the globe where area and angular distortion stay within
//! user-chosen limits.
//!
//! Distortion is sampled once on a 1° grid covering one quarter of the sphere (the projections
//! handled here are symmetric about the equator and the central meridian). Thresholds can then
//! change freely without resampling.
use crate::derivative::factors;
use crate::proj::{MapProjection, ProjError};

/// Rows (latitude, 0° to 90°) of the quarter-sphere grid.
pub const ROWS: usize = 90;
/// Columns (longitude, 0° to 180°) of the quarter-sphere grid.
pub const COLUMNS: usize = 180;

/// What the areal-scale threshold is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AreaReference {
    /// Enlargement or reduction relative to true area.
    #[default]
    Unit,
    /// Enlargement relative to the smallest areal scale on the map.
    GlobalMinimum,
}

/// Validated acceptance limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcceptanceThresholds {
    max_angle: f64,
    max_area_scale: f64,
    area_reference: AreaReference,
}

impl AcceptanceThresholds {
    /// `max_angle` in degrees (≥ 0), `max_area_scale` as a ratio (≥ 1).
    pub fn new(
        max_angle: f64,
        max_area_scale: f64,
        area_reference: AreaReference,
    ) -> Result<Self, ProjError> {
        if !(max_angle >= 0.0) {
            return Err(ProjError::InvalidThreshold {
                name: "max_angle",
                value: max_angle,
            });
        }
        if !(max_area_scale >= 1.0) {
            return Err(ProjError::InvalidThreshold {
                name: "max_area_scale",
                value: max_area_scale,
            });
        }
        Ok(AcceptanceThresholds {
            max_angle,
            max_area_scale,
            area_reference,
        })
    }

    pub fn max_angle(&self) -> f64 {
        self.max_angle
    }

    pub fn max_area_scale(&self) -> f64 {
        self.max_area_scale
    }

    pub fn area_reference(&self) -> AreaReference {
        self.area_reference
    }
}

impl Default for AcceptanceThresholds {
    /// 40° of angular distortion and an areal scale within 1.5 of true area.
    fn default() -> Self {
        AcceptanceThresholds {
            max_angle: 40.0,
            max_area_scale: 1.5,
            area_reference: AreaReference::Unit,
        }
    }
}

/// Areal scale and angular distortion on a 1° quarter-sphere grid.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptanceGrid {
    area_scale: Vec<f64>,
    angle: Vec<f64>,
    min_area_scale: f64,
    equal_area: bool,
    conformal: bool,
}

impl AcceptanceGrid {
    /// Samples `projection` at the centre of every 1° cell of the north-eastern quarter.
    /// Cells where the derivatives fail hold NaN and are never acceptable.
    pub fn compute<P>(projection: &P, step: f64) -> Self
    where
        P: MapProjection + ?Sized,
    {
        let mut area_scale = Vec::with_capacity(ROWS * COLUMNS);
        let mut angle = Vec::with_capacity(ROWS * COLUMNS);
        for row in 0..ROWS {
            let lat = (row as f64 + 0.5).to_radians();
            for column in 0..COLUMNS {
                let lon = (column as f64 + 0.5).to_radians();
                match factors(projection, lon, lat, step) {
                    Ok(f) => {
                        area_scale.push(f.s);
                        angle.push(f.omega_degrees());
                    }
                    Err(err) => {
                        log::debug!("No acceptance sample at row {row}, column {column}: {err}");
                        area_scale.push(f64::NAN);
                        angle.push(f64::NAN);
                    }
                }
            }
        }
        let min_area_scale = area_scale
            .iter()
            .copied()
            .filter(|s| s.is_finite() && *s > 0.0)
            .fold(f64::INFINITY, f64::min);
        AcceptanceGrid {
            area_scale,
            angle,
            min_area_scale,
            equal_area: projection.is_equal_area(),
            conformal: projection.is_conformal(),
        }
    }

    pub fn area_scale(&self, row: usize, column: usize) -> f64 {
        self.area_scale[row * COLUMNS + column]
    }

    /// Angular distortion in degrees.
    pub fn angular_distortion(&self, row: usize, column: usize) -> f64 {
        self.angle[row * COLUMNS + column]
    }

    pub fn min_area_scale(&self) -> f64 {
        self.min_area_scale
    }

    /// Whether the cell at `index` (`row * COLUMNS + column`) meets `thresholds`.
    pub fn is_acceptable(&self, index: usize, thresholds: &AcceptanceThresholds) -> bool {
        let angle_ok = self.conformal || self.angle[index] <= thresholds.max_angle;
        angle_ok && (self.equal_area || self.area_ok(self.area_scale[index], thresholds))
    }

    fn area_ok(&self, s: f64, thresholds: &AcceptanceThresholds) -> bool {
        match thresholds.area_reference {
            AreaReference::Unit => s.max(1.0 / s) <= thresholds.max_area_scale,
            AreaReference::GlobalMinimum => s / self.min_area_scale <= thresholds.max_area_scale,
        }
    }

    /// Percentage of the sphere's surface meeting `thresholds`.
    pub fn acceptance_index(&self, thresholds: &AcceptanceThresholds) -> f64 {
        let mut accepted = 0.0;
        let mut total = 0.0;
        for row in 0..ROWS {
            let area = (row as f64 + 0.5).to_radians().cos();
            for column in 0..COLUMNS {
                total += area;
                if self.is_acceptable(row * COLUMNS + column, thresholds) {
                    accepted += area;
                }
            }
        }
        // the four mirrored quadrants cancel out
        100.0 * accepted / total
    }
}

/// One pixel of an [`AcceptanceRaster`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptancePixel {
    Outside,
    Accepted,
    Rejected,
}

/// Accept/reject image of a projected map.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptanceRaster {
    pub width: usize,
    pub height: usize,
    /// Row-major, first row at the top of the map.
    pub pixels: Vec<AcceptancePixel>,
}

impl AcceptanceRaster {
    pub fn pixel(&self, column: usize, row: usize) -> AcceptancePixel {
        self.pixels[row * self.width + column]
    }

    pub fn count(&self, kind: AcceptancePixel) -> usize {
        self.pixels.iter().filter(|p| **p == kind).count()
    }
}

/// For each cell of a regular grid over the projected map, the acceptance-grid cell it shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedGrid {
    width: usize,
    height: usize,
    west: f64,
    north: f64,
    cell_size: f64,
    cells: Vec<Option<u32>>,
}

impl ProjectedGrid {
    /// Inverse-projects the centre of each cell of a `width`-column grid spanning the map's
    /// bounding box.
    pub fn compute<P>(projection: &P, width: usize) -> Result<Self, ProjError>
    where
        P: MapProjection + ?Sized,
    {
        if !projection.has_inverse() {
            return Err(ProjError::NoInverse);
        }
        let (west, east, south, north) = bounding_box(projection)?;
        let width = width.max(1);
        let cell_size = (east - west) / width as f64;
        if !(cell_size > 0.0) {
            return Err(ProjError::NonFinite {
                lon: f64::NAN,
                lat: f64::NAN,
            });
        }
        let height = (((north - south) / cell_size - 1e-9).ceil() as usize).max(1);

        let mut cells = Vec::with_capacity(width * height);
        for row in 0..height {
            let y = north - (row as f64 + 0.5) * cell_size;
            for column in 0..width {
                let x = west + (column as f64 + 0.5) * cell_size;
                let (lon, lat) = projection.project_inverse(x, y);
                cells.push(if lon.is_finite() && lat.is_finite() {
                    let grid_row = (lat.abs().to_degrees().floor() as usize).min(ROWS - 1);
                    let grid_column = (lon.abs().to_degrees().floor() as usize).min(COLUMNS - 1);
                    Some((grid_row * COLUMNS + grid_column) as u32)
                } else {
                    None
                });
            }
        }
        log::debug!("Projected acceptance grid of {width}×{height} cells");
        Ok(ProjectedGrid {
            width,
            height,
            west,
            north,
            cell_size,
            cells,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Projected coordinates of the grid's top-left corner.
    pub fn origin(&self) -> (f64, f64) {
        (self.west, self.north)
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Index into the acceptance grid shown by projected cell `(column, row)`.
    pub fn cell(&self, column: usize, row: usize) -> Option<usize> {
        self.cells[row * self.width + column].map(|i| i as usize)
    }

    /// Colours every projected cell without recomputing any distortion.
    pub fn render(
        &self,
        grid: &AcceptanceGrid,
        thresholds: &AcceptanceThresholds,
    ) -> AcceptanceRaster {
        let pixels = self
            .cells
            .iter()
            .map(|cell| match cell {
                None => AcceptancePixel::Outside,
                Some(index) if grid.is_acceptable(*index as usize, thresholds) => {
                    AcceptancePixel::Accepted
                }
                Some(_) => AcceptancePixel::Rejected,
            })
            .collect();
        AcceptanceRaster {
            width: self.width,
            height: self.height,
            pixels,
        }
    }
}

/// `(west, east, south, north)` of the graticule sampled every degree.
fn bounding_box<P>(projection: &P) -> Result<(f64, f64, f64, f64), ProjError>
where
    P: MapProjection + ?Sized,
{
    let mut bounds = (
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::INFINITY,
        f64::NEG_INFINITY,
    );
    for lat in -90..=90 {
        for lon in -180..=180 {
            let (x, y) =
                projection.project(f64::from(lon).to_radians(), f64::from(lat).to_radians());
            if x.is_finite() && y.is_finite() {
                bounds.0 = bounds.0.min(x);
                bounds.1 = bounds.1.max(x);
                bounds.2 = bounds.2.min(y);
                bounds.3 = bounds.3.max(y);
            }
        }
    }
    if bounds.0 < bounds.1 && bounds.2 < bounds.3 {
        Ok(bounds)
    } else {
        Err(ProjError::NonFinite {
            lon: f64::NAN,
            lat: f64::NAN,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivative::DEFAULT_STEP;
    use crate::reference::{PlateCarree, Sinusoidal};
    use approx::assert_relative_eq;

    #[test]
    fn thresholds_are_validated() {
        assert_eq!(
            AcceptanceThresholds::new(-1.0, 2.0, AreaReference::Unit),
            Err(ProjError::InvalidThreshold {
                name: "max_angle",
                value: -1.0
            })
        );
        assert!(AcceptanceThresholds::new(10.0, 0.5, AreaReference::Unit).is_err());
        assert!(AcceptanceThresholds::new(f64::NAN, 2.0, AreaReference::Unit).is_err());
        assert!(AcceptanceThresholds::new(0.0, 1.0, AreaReference::GlobalMinimum).is_ok());
    }

    #[test]
    fn equal_area_ignores_area_threshold() {
        let grid = AcceptanceGrid::compute(&Sinusoidal, DEFAULT_STEP);
        let everything = AcceptanceThresholds::new(180.0, 1.0, AreaReference::Unit).unwrap();
        assert_relative_eq!(grid.acceptance_index(&everything), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn plate_carree_area_band() {
        // s = 1 / cos φ, so s ≤ 2 up to 60° of latitude
        let grid = AcceptanceGrid::compute(&PlateCarree, DEFAULT_STEP);
        let thresholds = AcceptanceThresholds::new(180.0, 2.0, AreaReference::Unit).unwrap();
        let expected = 100.0 * 60f64.to_radians().sin();
        assert_relative_eq!(grid.acceptance_index(&thresholds), expected, epsilon = 0.1);
        assert_relative_eq!(grid.min_area_scale(), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn acceptance_grows_with_angle_threshold() {
        let grid = AcceptanceGrid::compute(&Sinusoidal, DEFAULT_STEP);
        let mut previous = 0.0;
        for angle in [0.0, 5.0, 10.0, 20.0, 40.0, 80.0, 160.0] {
            let thresholds =
                AcceptanceThresholds::new(angle, 1.2, AreaReference::GlobalMinimum).unwrap();
            let q = grid.acceptance_index(&thresholds);
            assert!(q >= previous, "{angle}: {q} < {previous}");
            previous = q;
        }
        assert!(previous > 99.9);
    }

    #[test]
    fn projected_grid_renders_outline() {
        let grid = AcceptanceGrid::compute(&Sinusoidal, DEFAULT_STEP);
        let projected = ProjectedGrid::compute(&Sinusoidal, 40).unwrap();
        assert_eq!(projected.width(), 40);
        assert_eq!(projected.height(), 20);
        let thresholds = AcceptanceThresholds::new(20.0, 1.0, AreaReference::Unit).unwrap();
        let raster = projected.render(&grid, &thresholds);
        // corners of the bounding box lie outside the sinusoidal outline
        assert_eq!(raster.pixel(0, 0), AcceptancePixel::Outside);
        assert_eq!(raster.pixel(39, 19), AcceptancePixel::Outside);
        // the centre is undistorted
        assert_eq!(raster.pixel(20, 10), AcceptancePixel::Accepted);
        assert!(raster.count(AcceptancePixel::Rejected) > 0);
    }
}
