//! Local distortion from finite-difference derivatives of the forward projection.
use std::f64::consts::{FRAC_PI_2, PI};

use crate::proj::{MapProjection, ProjError};

/// Default finite-difference step in radians.
pub const DEFAULT_STEP: f64 = 1e-5;

/// Partial derivatives of the projected coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Derivatives {
    pub x_lon: f64,
    pub y_lon: f64,
    pub x_lat: f64,
    pub y_lat: f64,
    /// Latitude at which the derivatives were taken, after clamping.
    pub lat: f64,
}

/// Local distortion at one point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistortionFactors {
    /// Scale along the meridian.
    pub h: f64,
    /// Scale along the parallel.
    pub k: f64,
    /// Areal scale.
    pub s: f64,
    /// Maximum angular distortion in radians.
    pub omega: f64,
    /// Semi-major axis of the Tissot ellipse.
    pub a: f64,
    /// Semi-minor axis of the Tissot ellipse.
    pub b: f64,
}

impl DistortionFactors {
    pub fn from_derivatives(d: &Derivatives) -> Result<Self, ProjError> {
        let cos_lat = d.lat.cos();
        let h = d.x_lat.hypot(d.y_lat);
        let k = d.x_lon.hypot(d.y_lon) / cos_lat;
        let s = (d.x_lat * d.y_lon - d.y_lat * d.x_lon).abs() / cos_lat;
        let sum = (h * h + k * k + 2.0 * s).sqrt();
        let difference = (h * h + k * k - 2.0 * s).max(0.0).sqrt();
        let factors = DistortionFactors {
            h,
            k,
            s,
            omega: 2.0 * (difference / sum).min(1.0).asin(),
            a: 0.5 * (sum + difference),
            b: 0.5 * (sum - difference),
        };
        if factors.is_finite() && sum > 0.0 {
            Ok(factors)
        } else {
            Err(ProjError::NonFinite {
                lon: f64::NAN,
                lat: d.lat,
            })
        }
    }

    fn is_finite(&self) -> bool {
        [self.h, self.k, self.s, self.omega, self.a, self.b]
            .iter()
            .all(|v| v.is_finite())
    }

    pub fn omega_degrees(&self) -> f64 {
        self.omega.to_degrees()
    }

    /// Areal scale folded so that enlargement and reduction count the same, `≥ 1`.
    pub fn area_ratio(&self) -> f64 {
        self.s.max(1.0 / self.s)
    }

    /// Mean of the folded Tissot axes, `≥ 1`.
    pub fn scale_ratio(&self) -> f64 {
        0.5 * (self.a.max(1.0 / self.a) + self.b.max(1.0 / self.b))
    }
}

/// Central-difference partial derivatives of `projection` at `(lon, lat)` with step `step`.
///
/// The evaluation point is moved inward if the stencil would leave the valid domain.
pub fn derivatives<P>(
    projection: &P,
    lon: f64,
    lat: f64,
    step: f64,
) -> Result<Derivatives, ProjError>
where
    P: MapProjection + ?Sized,
{
    if !(lon.is_finite() && lat.is_finite()) || lat.abs() > FRAC_PI_2 || lon.abs() > PI {
        return Err(ProjError::Domain { lon, lat });
    }
    let clamped_lon = lon.clamp(-PI + step, PI - step);
    let clamped_lat = lat.clamp(-FRAC_PI_2 + step, FRAC_PI_2 - step);
    if clamped_lon != lon || clamped_lat != lat {
        log::debug!(
            "Derivative stencil at ({lon}, {lat}) clamped to ({clamped_lon}, {clamped_lat})"
        );
    }
    let (lon, lat) = (clamped_lon, clamped_lat);

    let (x_east, y_east) = projection.project(lon + step, lat);
    let (x_west, y_west) = projection.project(lon - step, lat);
    let (x_north, y_north) = projection.project(lon, lat + step);
    let (x_south, y_south) = projection.project(lon, lat - step);
    let d = Derivatives {
        x_lon: (x_east - x_west) / (2.0 * step),
        y_lon: (y_east - y_west) / (2.0 * step),
        x_lat: (x_north - x_south) / (2.0 * step),
        y_lat: (y_north - y_south) / (2.0 * step),
        lat,
    };
    if [d.x_lon, d.y_lon, d.x_lat, d.y_lat].iter().all(|v| v.is_finite()) {
        Ok(d)
    } else {
        Err(ProjError::NonFinite { lon, lat })
    }
}

/// Local distortion factors of `projection` at `(lon, lat)`.
pub fn factors<P>(
    projection: &P,
    lon: f64,
    lat: f64,
    step: f64,
) -> Result<DistortionFactors, ProjError>
where
    P: MapProjection + ?Sized,
{
    let d = derivatives(projection, lon, lat, step)?;
    DistortionFactors::from_derivatives(&d).map_err(|_| ProjError::NonFinite { lon, lat })
}
