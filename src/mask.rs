//! Continental land/sea raster used to restrict distortion indices to land.
use thiserror::Error;

/// Placement of a [`LandMask`] raster on the globe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskOrigin {
    /// Longitude of the raster's western edge, degrees.
    pub west: f64,
    /// Latitude of the raster's northern edge, degrees.
    pub north: f64,
    pub pixels_per_degree: f64,
    /// Row 0 is the northernmost row; otherwise row 0 is the southernmost.
    pub top_down: bool,
}

impl Default for MaskOrigin {
    /// A whole-world raster starting at 180°W, 90°N with one pixel per degree.
    fn default() -> Self {
        MaskOrigin {
            west: -180.0,
            north: 90.0,
            pixels_per_degree: 1.0,
            top_down: true,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaskError {
    #[error("Mask has {found} pixels, expected {width}×{height}")]
    SizeMismatch {
        width: usize,
        height: usize,
        found: usize,
    },
    #[error("Mask resolution must be positive, got {0}")]
    Resolution(f64),
}

/// A black/white raster marking continental cells. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct LandMask {
    width: usize,
    height: usize,
    land: Vec<bool>,
    origin: MaskOrigin,
}

impl LandMask {
    pub fn new(
        width: usize,
        height: usize,
        land: Vec<bool>,
        origin: MaskOrigin,
    ) -> Result<Self, MaskError> {
        if land.len() != width * height {
            return Err(MaskError::SizeMismatch {
                width,
                height,
                found: land.len(),
            });
        }
        if !(origin.pixels_per_degree > 0.0 && origin.pixels_per_degree.is_finite()) {
            return Err(MaskError::Resolution(origin.pixels_per_degree));
        }
        Ok(LandMask {
            width,
            height,
            land,
            origin,
        })
    }

    /// Builds a mask from 8-bit grey values; dark pixels (< 128) are land.
    pub fn from_luma(
        width: usize,
        height: usize,
        pixels: &[u8],
        origin: MaskOrigin,
    ) -> Result<Self, MaskError> {
        LandMask::new(
            width,
            height,
            pixels.iter().map(|p| *p < 128).collect(),
            origin,
        )
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn origin(&self) -> MaskOrigin {
        self.origin
    }

    /// True if the pixel covering `(lon, lat)` in degrees is land. Points off the raster are sea.
    pub fn is_land(&self, lon: f64, lat: f64) -> bool {
        let ppd = self.origin.pixels_per_degree;
        let column = ((lon - self.origin.west) * ppd).floor();
        let row = if self.origin.top_down {
            ((self.origin.north - lat) * ppd).floor()
        } else {
            ((lat - (self.origin.north - self.height as f64 / ppd)) * ppd).floor()
        };
        if column < 0.0 || row < 0.0 {
            return false;
        }
        let (column, row) = (column as usize, row as usize);
        column < self.width && row < self.height && self.land[row * self.width + column]
    }
}
