use std::{error::Error, fmt};

use geo_types::{Coord, CoordFloat, LineString, MultiPolygon, Point, Polygon};
use num_traits::NumCast;

use crate::{CurveProjection, FormatError, ProjError, Projection, ProjectionModel};

/// Project a geometry whose coordinates are longitude and latitude in degrees.
pub trait Transform<T> {
    type Output;

    /// Project a geometry by mutating it in place.
    ///
    /// # Examples
    ///
    /// ```
    /// use flexproj::{CurveProjection, Projection, ProjectionModel, Transform};
    /// # use approx::assert_relative_eq;
    ///
    /// let projection = Projection::from(CurveProjection::new(ProjectionModel::flat()));
    /// let mut point = geo_types::point!(x: 180.0f64, y: 0.0f64);
    /// point.transform(&projection).unwrap();
    ///
    /// assert_relative_eq!(
    ///     point,
    ///     geo_types::point!(x: std::f64::consts::PI, y: 0.0),
    ///     epsilon = 1e-12
    /// );
    /// ```
    fn transform(&mut self, projection: &Projection) -> Result<(), ProjError>;

    /// Immutable flavor of [`Transform::transform`], which allocates a new geometry.
    ///
    /// # Examples
    ///
    /// ```
    /// use flexproj::{CurveProjection, Projection, ProjectionModel, Transform};
    /// # use approx::assert_relative_eq;
    ///
    /// let projection = Projection::from(CurveProjection::new(ProjectionModel::flat()));
    /// let point = geo_types::point!(x: 0.0f32, y: 90.0f32);
    ///
    /// assert_relative_eq!(
    ///     point.transformed(&projection).unwrap(),
    ///     geo_types::point!(x: 0.0f32, y: std::f32::consts::PI)
    /// );
    ///
    /// // original `point` is untouched
    /// assert_relative_eq!(point, geo_types::point!(x: 0.0f32, y: 90.0f32));
    /// ```
    fn transformed(&self, projection: &Projection) -> Result<Self::Output, ProjError>;

    /// Project a geometry in place with a curve model given in its text form.
    fn transform_with_model(&mut self, model: &str) -> Result<(), TransformError> {
        let projection = Projection::from(CurveProjection::new(ProjectionModel::from_text(model)?));
        Ok(self.transform(&projection)?)
    }

    /// Immutable flavor of [`Transform::transform_with_model`].
    fn transformed_with_model(&self, model: &str) -> Result<Self::Output, TransformError> {
        let projection = Projection::from(CurveProjection::new(ProjectionModel::from_text(model)?));
        Ok(self.transformed(&projection)?)
    }
}

fn project_degrees<T: CoordFloat>(
    projection: &Projection,
    coord: Coord<T>,
) -> Result<Coord<T>, ProjError> {
    let lon = coord.x.to_f64().ok_or(ProjError::FloatConversion)?;
    let lat = coord.y.to_f64().ok_or(ProjError::FloatConversion)?;
    let (x, y) = projection.project_coord((lon.to_radians(), lat.to_radians()), false)?;
    Ok(Coord {
        x: <T as NumCast>::from(x).ok_or(ProjError::FloatConversion)?,
        y: <T as NumCast>::from(y).ok_or(ProjError::FloatConversion)?,
    })
}

impl<T: CoordFloat> Transform<T> for Coord<T> {
    type Output = Self;

    fn transform(&mut self, projection: &Projection) -> Result<(), ProjError> {
        *self = project_degrees(projection, *self)?;
        Ok(())
    }

    fn transformed(&self, projection: &Projection) -> Result<Self, ProjError> {
        project_degrees(projection, *self)
    }
}

impl<T: CoordFloat> Transform<T> for Point<T> {
    type Output = Self;

    fn transform(&mut self, projection: &Projection) -> Result<(), ProjError> {
        self.0.transform(projection)
    }

    fn transformed(&self, projection: &Projection) -> Result<Self, ProjError> {
        Ok(Point(self.0.transformed(projection)?))
    }
}

impl<T: CoordFloat> Transform<T> for LineString<T> {
    type Output = Self;

    fn transform(&mut self, projection: &Projection) -> Result<(), ProjError> {
        self.0
            .iter_mut()
            .try_for_each(|coord| coord.transform(projection))
    }

    fn transformed(&self, projection: &Projection) -> Result<Self, ProjError> {
        let mut line = self.clone();
        line.transform(projection)?;
        Ok(line)
    }
}

impl<T: CoordFloat> Transform<T> for Polygon<T> {
    type Output = Self;

    fn transform(&mut self, projection: &Projection) -> Result<(), ProjError> {
        *self = self.transformed(projection)?;
        Ok(())
    }

    fn transformed(&self, projection: &Projection) -> Result<Self, ProjError> {
        let interiors = self
            .interiors()
            .iter()
            .map(|ring| ring.transformed(projection))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Polygon::new(self.exterior().transformed(projection)?, interiors))
    }
}

impl<T: CoordFloat> Transform<T> for MultiPolygon<T> {
    type Output = Self;

    fn transform(&mut self, projection: &Projection) -> Result<(), ProjError> {
        self.0
            .iter_mut()
            .try_for_each(|polygon| polygon.transform(projection))
    }

    fn transformed(&self, projection: &Projection) -> Result<Self, ProjError> {
        let mut polygons = self.clone();
        polygons.transform(projection)?;
        Ok(polygons)
    }
}

#[derive(Debug)]
pub enum TransformError {
    FormatError(FormatError),
    ProjError(ProjError),
}

impl From<ProjError> for TransformError {
    fn from(e: ProjError) -> Self {
        TransformError::ProjError(e)
    }
}

impl From<FormatError> for TransformError {
    fn from(e: FormatError) -> Self {
        TransformError::FormatError(e)
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::FormatError(err) => err.fmt(f),
            TransformError::ProjError(err) => err.fmt(f),
        }
    }
}

impl Error for TransformError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TransformError::FormatError(err) => Some(err),
            TransformError::ProjError(err) => Some(err),
        }
    }
}
