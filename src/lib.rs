#![doc(html_logo_url = "https://raw.githubusercontent.com/georust/meta/master/logo/logo.png")]
//! `flexproj` designs and evaluates curve-based world map projections on the sphere.
//!
//! A [`ProjectionModel`] describes a projection with four spline curves: the length of the
//! parallels, their distance from the equator, their bending, and the horizontal distribution
//! of the meridians. A [`CurveProjection`] turns a model into forward and inverse projection
//! functions. Two projections can be combined with a [`MeanMixer`] (weighted mean of
//! the projected coordinates), a [`LatitudeMixer`] (one projection for the low latitudes,
//! another for the high latitudes) or a [`KnotBlendMixer`] (blending the model curves
//! themselves).
//!
//! Every projection variant is wrapped in a [`Projection`], which adds a central meridian
//! and implements the [`MapProjection`] capability trait. Longitude and latitude are in
//! radians; projected coordinates are on the unit sphere. Points the inverse projection can't
//! resolve come back as `(NaN, NaN)`.
//!
//! # Distortion
//!
//! A [`DistortionAnalyzer`], configured with an [`AnalyzerBuilder`], computes the mean
//! angular, areal and scale distortion of a projection over the sphere, and optionally over
//! the continents when given a [`LandMask`]. The acceptance index reports the share of the
//! sphere meeting [`AcceptanceThresholds`]. Results are cached until the projection changes.
//! Tables over many projections can be filled with [`batch::analyze`], or with
//! `batch::analyze_parallel` when the `parallel` feature is enabled.
//!
//! # Models as text
//!
//! Models are read and written in a line-oriented text format, see [`format`].
//!
//! # Features
//!
//! `geo-types` (default) implements [`Coord`] for `geo_types::Coord` and `geo_types::Point`
//! and provides the [`Transform`] trait for `geo-types` geometries in degrees.
//! `parallel` analyses batches on the rayon thread pool.
//!
//! # Example
//!
//! ```
//! use approx::assert_relative_eq;
//! use flexproj::{
//!     AcceptanceThresholds, AnalyzerBuilder, CurveProjection, MapProjection, Projection,
//!     ProjectionModel,
//! };
//!
//! let projection = Projection::from(CurveProjection::new(ProjectionModel::robinson()));
//!
//! let (x, y) = projection.project(0.5, 0.7);
//! let (lon, lat) = projection.project_inverse(x, y);
//! assert_relative_eq!(lon, 0.5, epsilon = 1e-4);
//! assert_relative_eq!(lat, 0.7, epsilon = 1e-4);
//!
//! let mut analyzer = AnalyzerBuilder::new().grid_step(5.0).build();
//! let parameters = analyzer.parameters(&projection, &AcceptanceThresholds::default());
//! assert!(parameters.indices.dan > 0.0);
//! assert!(parameters.q > 0.0 && parameters.q <= 100.0);
//! ```

pub mod acceptance;
mod analyzer;
pub mod batch;
mod curve;
pub mod derivative;
pub mod format;
#[cfg(feature = "geo-types")]
mod geo_types;
mod inverse;
mod mask;
pub mod mixer;
mod model;
mod proj;
pub mod reference;
pub mod spline;
#[cfg(feature = "geo-types")]
mod transform;

pub use crate::acceptance::{AcceptanceGrid, AcceptanceThresholds, AreaReference};
pub use crate::analyzer::{
    AnalyzerBuilder, DistortionAnalyzer, DistortionIndices, DistortionParameters,
};
pub use crate::curve::CurveProjection;
pub use crate::derivative::DistortionFactors;
pub use crate::format::FormatError;
pub use crate::inverse::InverseSolver;
pub use crate::mask::{LandMask, MaskError, MaskOrigin};
pub use crate::mixer::{KnotBlendMixer, KnotWeights, LatitudeMixer, MeanMixer, PoleScale};
pub use crate::model::{CurveShape, LATITUDE_KNOTS, MERIDIAN_KNOTS, ProjectionModel};
pub use crate::proj::{Coord, MapProjection, ProjError, Projection, ProjectionKind};
pub use crate::reference::ReferenceProjection;
#[cfg(feature = "geo-types")]
pub use crate::transform::{Transform, TransformError};
