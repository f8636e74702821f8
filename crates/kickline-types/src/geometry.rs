//! Field geometry.
//!
//! Angles follow the server convention: degrees, measured from the positive
//! x axis with positive values turning toward positive y. Relative angles are
//! normalised into `[-180, 180)`.

use serde::{Deserialize, Serialize};

/// A point on the field, in metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate (goal line to goal line).
    pub x: f64,
    /// Vertical coordinate (touch line to touch line).
    pub y: f64,
}

impl Point {
    /// The centre spot.
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    /// Create a point.
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(self, other: Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Absolute bearing from `self` to `other`, in degrees.
    pub fn bearing_to(self, other: Self) -> f64 {
        (other.y - self.y).atan2(other.x - self.x).to_degrees()
    }

    /// The point `distance` metres away along the absolute `bearing`.
    pub fn offset(self, bearing: f64, distance: f64) -> Self {
        let rad = bearing.to_radians();
        Self {
            x: distance.mul_add(rad.cos(), self.x),
            y: distance.mul_add(rad.sin(), self.y),
        }
    }
}

/// Own absolute position and body direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Absolute position.
    pub position: Point,
    /// Absolute body direction in degrees.
    pub body_direction: f64,
}

impl Pose {
    /// Create a pose.
    pub const fn new(position: Point, body_direction: f64) -> Self {
        Self {
            position,
            body_direction,
        }
    }

    /// Angle to `target` relative to the body direction, in `[-180, 180)`.
    pub fn angle_to(&self, target: Point) -> f64 {
        normalize_degrees(self.position.bearing_to(target) - self.body_direction)
    }

    /// Distance from the current position to `target`.
    pub fn distance_to(&self, target: Point) -> f64 {
        self.position.distance_to(target)
    }

    /// The absolute point at a body-relative `angle` and `distance`.
    pub fn point_at(&self, angle: f64, distance: f64) -> Point {
        self.position.offset(self.body_direction + angle, distance)
    }
}

/// Normalise an angle in degrees into `[-180, 180)`.
pub fn normalize_degrees(angle: f64) -> f64 {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn normalisation_wraps_both_ways() {
        assert!((normalize_degrees(190.0) - -170.0).abs() < EPS);
        assert!((normalize_degrees(-190.0) - 170.0).abs() < EPS);
        assert!((normalize_degrees(180.0) - -180.0).abs() < EPS);
        assert!((normalize_degrees(720.0 + 45.0) - 45.0).abs() < EPS);
    }

    #[test]
    fn relative_angle_accounts_for_body_direction() {
        let pose = Pose::new(Point::ORIGIN, 90.0);
        // Straight ahead along +y.
        assert!(pose.angle_to(Point::new(0.0, 10.0)).abs() < EPS);
        // Along +x is a quarter turn back.
        assert!((pose.angle_to(Point::new(10.0, 0.0)) - -90.0).abs() < EPS);
    }

    #[test]
    fn point_at_inverts_angle_to() {
        let pose = Pose::new(Point::new(-10.0, 5.0), 30.0);
        let target = pose.point_at(-45.0, 20.0);
        assert!((pose.distance_to(target) - 20.0).abs() < 1e-6);
        assert!((pose.angle_to(target) - -45.0).abs() < 1e-6);
    }
}
