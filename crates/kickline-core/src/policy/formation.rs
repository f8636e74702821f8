//! Kick-off formation.
//!
//! Each uniform number has a fixed point in the own half, given for the left
//! side. Right-side players mirror the x coordinate.

use kickline_types::{Point, Side};

/// Formation points for uniform numbers 1 to 11, left side.
const FORMATION: [(f64, f64); 11] = [
    (-5.0, 30.0),
    (-40.0, 15.0),
    (-40.0, 0.0),
    (-40.0, -15.0),
    (-5.0, -30.0),
    (-20.0, 20.0),
    (-20.0, 0.0),
    (-20.0, -20.0),
    (-10.0, 0.0),
    (-10.0, 20.0),
    (-10.0, -20.0),
];

/// The formation point for `uniform_number` on `side`, or `None` for numbers
/// outside 1 to 11.
pub fn formation_point(uniform_number: u8, side: Side) -> Option<Point> {
    let index = usize::from(uniform_number.checked_sub(1)?);
    FORMATION
        .get(index)
        .map(|&(x, y)| Point::new(x * side.mirror(), y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_outside_the_squad_have_no_point() {
        assert_eq!(formation_point(0, Side::Left), None);
        assert_eq!(formation_point(12, Side::Right), None);
    }

    #[test]
    fn right_side_mirrors_x_only() {
        assert_eq!(formation_point(2, Side::Left), Some(Point::new(-40.0, 15.0)));
        assert_eq!(formation_point(2, Side::Right), Some(Point::new(40.0, 15.0)));
        assert_eq!(formation_point(11, Side::Right), Some(Point::new(10.0, -20.0)));
    }
}
