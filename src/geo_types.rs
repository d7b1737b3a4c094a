use geo_types::CoordFloat;

///```rust
/// # use approx::assert_relative_eq;
/// use flexproj::{CurveProjection, Projection, ProjectionModel};
/// use geo_types::coord;
/// use std::f64::consts::PI;
///
/// let projection = Projection::from(CurveProjection::new(ProjectionModel::flat()));
/// let result = projection
///     .project_coord(coord! { x: PI, y: 0.0 }, false)
///     .unwrap();
/// assert_relative_eq!(result.x, PI, epsilon = 1e-12);
/// assert_relative_eq!(result.y, 0.0);
/// ```
impl<T: CoordFloat> crate::Coord<T> for geo_types::Coord<T> {
    fn x(&self) -> T {
        self.x
    }
    fn y(&self) -> T {
        self.y
    }
    fn from_xy(x: T, y: T) -> Self {
        Self { x, y }
    }
}

///```rust
/// # use approx::assert_relative_eq;
/// use flexproj::{CurveProjection, Projection, ProjectionModel};
/// use geo_types::Point;
/// use std::f64::consts::FRAC_PI_2;
///
/// let projection = Projection::from(CurveProjection::new(ProjectionModel::flat()));
/// let result = projection
///     .project_coord(Point::new(0.0, FRAC_PI_2), false)
///     .unwrap();
/// assert_relative_eq!(result.x(), 0.0);
/// assert_relative_eq!(result.y(), std::f64::consts::PI, epsilon = 1e-12);
/// ```
impl<T: CoordFloat> crate::Coord<T> for geo_types::Point<T> {
    fn x(&self) -> T {
        geo_types::Point::x(*self)
    }
    fn y(&self) -> T {
        geo_types::Point::y(*self)
    }
    fn from_xy(x: T, y: T) -> Self {
        Self::new(x, y)
    }
}
