//! Geometry utilities shared by routing, ranking, and tracking.
//!
//! Pure functions only. Anything handed a non-finite coordinate treats it
//! as absent; NaN never propagates out of this module.

use geo::{Coord, HaversineBearing, HaversineDistance, Point, Rect};

pub mod polyline;

/// Both ordinates finite and inside lon/lat range.
pub fn is_usable(point: Point) -> bool {
    let (lon, lat) = (point.x(), point.y());
    lon.is_finite() && lat.is_finite() && (-180.0..=180.0).contains(&lon) && (-90.0..=90.0).contains(&lat)
}

/// Haversine distance between two points in meters
pub fn haversine_m(a: Point, b: Point) -> f64 {
    a.haversine_distance(&b)
}

/// Initial great-circle bearing from `from` to `to`, normalized to [0, 360) degrees.
pub fn bearing_deg(from: Point, to: Point) -> f64 {
    from.haversine_bearing(to).rem_euclid(360.0)
}

/// Linear interpolation between two points by `t` in [0, 1].
pub fn lerp(a: Point, b: Point, t: f64) -> Point {
    let t = t.clamp(0.0, 1.0);
    Point::new(a.x() + (b.x() - a.x()) * t, a.y() + (b.y() - a.y()) * t)
}

/// Axis-aligned bounding rectangle over the usable points.
///
/// Returns `None` when no point is usable.
pub fn bounding_rect(points: &[Point]) -> Option<Rect> {
    let mut usable = points.iter().copied().filter(|p| is_usable(*p));

    let first = usable.next()?;
    let (mut min, mut max) = (first, first);
    for point in usable {
        min = Point::new(min.x().min(point.x()), min.y().min(point.y()));
        max = Point::new(max.x().max(point.x()), max.y().max(point.y()));
    }

    Some(Rect::new(
        Coord { x: min.x(), y: min.y() },
        Coord { x: max.x(), y: max.y() },
    ))
}
