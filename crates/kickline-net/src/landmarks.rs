//! Fixed field markers and self-localisation.
//!
//! Coordinates are the server's: the pitch is 105 x 68 m centred on the
//! origin, x grows toward the right goal and y grows toward the bottom touch
//! line. Seen directions grow the same way, so bearings computed with
//! [`Point::bearing_to`] line up with the directions the server reports.

use kickline_types::{Point, Pose, normalize_degrees};

/// Half the pitch length.
const HALF_LENGTH: f64 = 52.5;
/// Half the pitch width.
const HALF_WIDTH: f64 = 34.0;
/// Distance of the outer boundary flags beyond the goal lines.
const OUTER_X: f64 = HALF_LENGTH + 5.0;
/// Distance of the outer boundary flags beyond the touch lines.
const OUTER_Y: f64 = HALF_WIDTH + 5.0;
/// Half the goal width.
const GOAL_POST_Y: f64 = 7.01;
/// x of the penalty-box flags.
const PENALTY_X: f64 = 36.0;
/// y of the penalty-box corner flags.
const PENALTY_Y: f64 = 20.16;

/// Look up the absolute position of a named landmark.
///
/// `name` is the object name without its leading kind letter, e.g. `["c"]`
/// for `(f c)`, `["r", "b", "20"]` for `(f r b 20)`, or `["l"]` for `(g l)`
/// when `goal` is set.
pub fn landmark(goal: bool, name: &[&str]) -> Option<Point> {
    if goal {
        return match name {
            ["l"] => Some(Point::new(-HALF_LENGTH, 0.0)),
            ["r"] => Some(Point::new(HALF_LENGTH, 0.0)),
            _ => None,
        };
    }

    match name {
        ["c"] => Some(Point::ORIGIN),
        ["c", "t"] => Some(Point::new(0.0, -HALF_WIDTH)),
        ["c", "b"] => Some(Point::new(0.0, HALF_WIDTH)),
        [side @ ("l" | "r"), "t"] => Some(Point::new(end_x(side, HALF_LENGTH), -HALF_WIDTH)),
        [side @ ("l" | "r"), "b"] => Some(Point::new(end_x(side, HALF_LENGTH), HALF_WIDTH)),
        ["g", side @ ("l" | "r"), "t"] => {
            Some(Point::new(end_x(side, HALF_LENGTH), -GOAL_POST_Y))
        }
        ["g", side @ ("l" | "r"), "b"] => {
            Some(Point::new(end_x(side, HALF_LENGTH), GOAL_POST_Y))
        }
        ["p", side @ ("l" | "r"), row] => {
            let y = match *row {
                "t" => -PENALTY_Y,
                "c" => 0.0,
                "b" => PENALTY_Y,
                _ => return None,
            };
            Some(Point::new(end_x(side, PENALTY_X), y))
        }
        // Outer boundary flags along the touch lines: (f t 0), (f b l 30), ...
        [edge @ ("t" | "b"), "0"] => Some(Point::new(0.0, edge_y(edge))),
        [edge @ ("t" | "b"), side @ ("l" | "r"), offset] => {
            let offset = touch_offset(offset)?;
            Some(Point::new(end_x(side, offset), edge_y(edge)))
        }
        // Outer boundary flags behind the goal lines: (f l 0), (f r t 20), ...
        [side @ ("l" | "r"), "0"] => Some(Point::new(end_x(side, OUTER_X), 0.0)),
        [side @ ("l" | "r"), edge @ ("t" | "b"), offset] => {
            let offset = goal_line_offset(offset)?;
            let y = if *edge == "t" { -offset } else { offset };
            Some(Point::new(end_x(side, OUTER_X), y))
        }
        _ => None,
    }
}

fn end_x(side: &str, distance: f64) -> f64 {
    if side == "l" { -distance } else { distance }
}

fn edge_y(edge: &str) -> f64 {
    if edge == "t" { -OUTER_Y } else { OUTER_Y }
}

fn touch_offset(text: &str) -> Option<f64> {
    match text {
        "10" => Some(10.0),
        "20" => Some(20.0),
        "30" => Some(30.0),
        "40" => Some(40.0),
        "50" => Some(50.0),
        _ => None,
    }
}

fn goal_line_offset(text: &str) -> Option<f64> {
    match text {
        "10" => Some(10.0),
        "20" => Some(20.0),
        "30" => Some(30.0),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Localisation
// ---------------------------------------------------------------------------

/// A landmark seen this cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkSighting {
    /// Known absolute position.
    pub position: Point,
    /// Observed distance in metres.
    pub distance: f64,
    /// Observed direction in degrees relative to the head.
    pub direction: f64,
}

impl LandmarkSighting {
    /// The landmark in head-relative Cartesian coordinates.
    fn relative(&self) -> Point {
        Point::ORIGIN.offset(self.direction, self.distance)
    }
}

/// Estimate the agent's pose from the seen landmarks.
///
/// Uses the pair of landmarks farthest apart in view: the difference of
/// their absolute and relative bearings gives the head direction, and the
/// position follows from the first landmark. `neck` is the head angle
/// relative to the body, so the body direction is the head direction minus
/// `neck`. Needs at least two landmarks.
pub fn localize(sightings: &[LandmarkSighting], neck: f64) -> Option<Pose> {
    let (first, second) = widest_pair(sightings)?;

    let (r1, r2) = (first.relative(), second.relative());
    let head = normalize_degrees(
        first.position.bearing_to(second.position) - r1.bearing_to(r2),
    );

    // Rotate the first landmark's relative vector into the field frame and
    // step back from its known position.
    let rad = head.to_radians();
    let (sin, cos) = rad.sin_cos();
    let dx = r1.x.mul_add(cos, -(r1.y * sin));
    let dy = r1.x.mul_add(sin, r1.y * cos);
    let position = Point::new(first.position.x - dx, first.position.y - dy);

    if !(position.x.is_finite() && position.y.is_finite() && head.is_finite()) {
        return None;
    }
    Some(Pose::new(position, normalize_degrees(head - neck)))
}

fn widest_pair(
    sightings: &[LandmarkSighting],
) -> Option<(&LandmarkSighting, &LandmarkSighting)> {
    let mut best: Option<(&LandmarkSighting, &LandmarkSighting, f64)> = None;
    for (i, a) in sightings.iter().enumerate() {
        for b in sightings.iter().skip(i.saturating_add(1)) {
            let gap = a.position.distance_to(b.position);
            if best.is_none_or(|(_, _, widest)| gap > widest) {
                best = Some((a, b, gap));
            }
        }
    }
    best.filter(|(_, _, gap)| *gap > 0.0)
        .map(|(a, b, _)| (a, b))
}
