//! Opaque reference projections supplied from outside the curve engine.
//!
//! A [`ReferenceProjection`] wraps any [`MapProjection`] implementation together with a display
//! name. A few classical projections are bundled for comparison tables and curve fitting.
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI, SQRT_2};
use std::fmt;
use std::sync::Arc;

use crate::proj::MapProjection;

/// A named external projection.
#[derive(Clone)]
pub struct ReferenceProjection {
    name: String,
    inner: Arc<dyn MapProjection + Send + Sync>,
    invertible: bool,
}

impl ReferenceProjection {
    pub fn new<P>(name: impl Into<String>, projection: P) -> Self
    where
        P: MapProjection + Send + Sync + 'static,
    {
        let invertible = projection.has_inverse();
        ReferenceProjection {
            name: name.into(),
            inner: Arc::new(projection),
            invertible,
        }
    }

    /// Wraps `projection` but hides its inverse.
    pub fn forward_only<P>(name: impl Into<String>, projection: P) -> Self
    where
        P: MapProjection + Send + Sync + 'static,
    {
        ReferenceProjection {
            invertible: false,
            ..ReferenceProjection::new(name, projection)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ReferenceProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceProjection")
            .field("name", &self.name)
            .field("invertible", &self.invertible)
            .finish()
    }
}

impl MapProjection for ReferenceProjection {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        self.inner.project(lon, lat)
    }

    fn project_inverse(&self, x: f64, y: f64) -> (f64, f64) {
        if self.invertible {
            self.inner.project_inverse(x, y)
        } else {
            (f64::NAN, f64::NAN)
        }
    }

    fn has_inverse(&self) -> bool {
        self.invertible
    }

    fn is_conformal(&self) -> bool {
        self.inner.is_conformal()
    }

    fn is_equal_area(&self) -> bool {
        self.inner.is_equal_area()
    }

    fn parallels_are_parallel(&self) -> bool {
        self.inner.parallels_are_parallel()
    }
}

/// The bundled reference projections.
pub fn catalog() -> Vec<ReferenceProjection> {
    vec![
        ReferenceProjection::new("Plate Carrée", PlateCarree),
        ReferenceProjection::new("Sinusoidal", Sinusoidal),
        ReferenceProjection::new("Lambert Cylindrical Equal-Area", LambertCylindricalEqualArea),
        ReferenceProjection::new("Mercator", Mercator),
        ReferenceProjection::new("Mollweide", Mollweide),
        ReferenceProjection::new("Kavrayskiy VII", KavrayskiyVII),
    ]
}

/// Looks up a bundled projection by name, ignoring case.
pub fn by_name(name: &str) -> Option<ReferenceProjection> {
    catalog()
        .into_iter()
        .find(|p| p.name().eq_ignore_ascii_case(name))
}

fn outside(x: f64, y: f64) -> bool {
    !(x.is_finite() && y.is_finite())
}

fn valid(lon: f64, lat: f64) -> (f64, f64) {
    if lon.abs() > PI + 1e-12 || lat.abs() > FRAC_PI_2 + 1e-12 {
        (f64::NAN, f64::NAN)
    } else {
        (lon, lat)
    }
}

/// Equidistant cylindrical: x = λ, y = φ.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlateCarree;

impl MapProjection for PlateCarree {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        (lon, lat)
    }

    fn project_inverse(&self, x: f64, y: f64) -> (f64, f64) {
        valid(x, y)
    }

    fn has_inverse(&self) -> bool {
        true
    }
}

/// Sinusoidal (Sanson-Flamsteed): x = λ·cos φ, y = φ.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sinusoidal;

impl MapProjection for Sinusoidal {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        (lon * lat.cos(), lat)
    }

    fn project_inverse(&self, x: f64, y: f64) -> (f64, f64) {
        if outside(x, y) {
            return (f64::NAN, f64::NAN);
        }
        let cos_lat = y.cos();
        if cos_lat.abs() < 1e-15 {
            return valid(0.0, y);
        }
        valid(x / cos_lat, y)
    }

    fn has_inverse(&self) -> bool {
        true
    }

    fn is_equal_area(&self) -> bool {
        true
    }
}

/// Lambert cylindrical equal-area: x = λ, y = sin φ.
#[derive(Debug, Clone, Copy, Default)]
pub struct LambertCylindricalEqualArea;

impl MapProjection for LambertCylindricalEqualArea {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        (lon, lat.sin())
    }

    fn project_inverse(&self, x: f64, y: f64) -> (f64, f64) {
        if outside(x, y) || y.abs() > 1.0 {
            return (f64::NAN, f64::NAN);
        }
        valid(x, y.asin())
    }

    fn has_inverse(&self) -> bool {
        true
    }

    fn is_equal_area(&self) -> bool {
        true
    }
}

/// Mercator: x = λ, y = ln tan(π/4 + φ/2). The poles lie at infinity.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mercator;

impl MapProjection for Mercator {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        if lat.abs() >= FRAC_PI_2 {
            return (lon, f64::INFINITY.copysign(lat));
        }
        (lon, (FRAC_PI_4 + lat / 2.0).tan().ln())
    }

    fn project_inverse(&self, x: f64, y: f64) -> (f64, f64) {
        if outside(x, y) {
            return (f64::NAN, f64::NAN);
        }
        valid(x, 2.0 * y.exp().atan() - FRAC_PI_2)
    }

    fn has_inverse(&self) -> bool {
        true
    }

    fn is_conformal(&self) -> bool {
        true
    }
}

/// Mollweide: x = (2√2/π)·λ·cos θ, y = √2·sin θ with 2θ + sin 2θ = π·sin φ.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mollweide;

impl Mollweide {
    fn auxiliary_angle(lat: f64) -> f64 {
        if (lat.abs() - FRAC_PI_2).abs() < 1e-12 {
            return lat;
        }
        let target = PI * lat.sin();
        let mut theta = lat;
        for _ in 0..50 {
            let delta =
                (2.0 * theta + (2.0 * theta).sin() - target) / (2.0 + 2.0 * (2.0 * theta).cos());
            theta -= delta;
            if delta.abs() < 1e-14 {
                break;
            }
        }
        theta
    }
}

impl MapProjection for Mollweide {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let theta = Mollweide::auxiliary_angle(lat);
        (2.0 * SQRT_2 / PI * lon * theta.cos(), SQRT_2 * theta.sin())
    }

    fn project_inverse(&self, x: f64, y: f64) -> (f64, f64) {
        if outside(x, y) || y.abs() > SQRT_2 {
            return (f64::NAN, f64::NAN);
        }
        let theta = (y / SQRT_2).asin();
        let lat = ((2.0 * theta + (2.0 * theta).sin()) / PI).clamp(-1.0, 1.0).asin();
        let cos_theta = theta.cos();
        if cos_theta.abs() < 1e-15 {
            return valid(0.0, lat);
        }
        valid(PI * x / (2.0 * SQRT_2 * cos_theta), lat)
    }

    fn has_inverse(&self) -> bool {
        true
    }

    fn is_equal_area(&self) -> bool {
        true
    }
}

/// Kavrayskiy VII: x = (3λ/2π)·√(π²/3 − φ²), y = φ.
#[derive(Debug, Clone, Copy, Default)]
pub struct KavrayskiyVII;

impl MapProjection for KavrayskiyVII {
    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        (1.5 / PI * lon * (PI * PI / 3.0 - lat * lat).sqrt(), lat)
    }

    fn project_inverse(&self, x: f64, y: f64) -> (f64, f64) {
        if outside(x, y) {
            return (f64::NAN, f64::NAN);
        }
        let root = (PI * PI / 3.0 - y * y).sqrt();
        valid(x * PI / (1.5 * root), y)
    }

    fn has_inverse(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_catalog_round_trips() {
        for projection in catalog() {
            for &(lon, lat) in &[(0.0, 0.0), (1.0, 0.5), (-2.5, -1.2), (3.0, 0.1)] {
                let (x, y) = projection.project(lon, lat);
                let (lon2, lat2) = projection.project_inverse(x, y);
                assert_relative_eq!(lon2, lon, epsilon = 1e-9);
                assert_relative_eq!(lat2, lat, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_flags() {
        assert!(by_name("mollweide").unwrap().is_equal_area());
        assert!(by_name("Mercator").unwrap().is_conformal());
        assert!(!by_name("Kavrayskiy VII").unwrap().is_equal_area());
        assert!(by_name("Nonexistent").is_none());
    }

    #[test]
    fn test_mollweide_extent() {
        let (x, y) = Mollweide.project(PI, 0.0);
        assert_relative_eq!(x, 2.0 * SQRT_2, epsilon = 1e-12);
        assert_relative_eq!(y, 0.0);
        let (_, y) = Mollweide.project(0.0, FRAC_PI_2);
        assert_relative_eq!(y, SQRT_2, epsilon = 1e-12);
    }

    #[test]
    fn test_forward_only_hides_inverse() {
        let projection = ReferenceProjection::forward_only("Sinusoidal", Sinusoidal);
        assert!(!projection.has_inverse());
        assert!(projection.project_inverse(0.0, 0.0).0.is_nan());
        assert!(projection.is_equal_area());
    }

    #[test]
    fn test_inverse_outside_domain() {
        assert!(Sinusoidal.project_inverse(3.0, 1.2).0.is_nan());
        assert!(LambertCylindricalEqualArea.project_inverse(0.0, 1.5).1.is_nan());
    }
}
