use crate::PoseError;
use float_ord::FloatOrd;
use marker_core::{ImageBounds, ImagePoint};
use std::cmp::Reverse;

/// Infers the missing fourth corner of a parallelogram from three of its corners.
///
/// Given the decoder's corners `A`, `B`, `C` in that order, the fourth corner is `B + (C - A)`.
///
/// The result is clamped into `bounds`, or to non-negative coordinates when the image extent is
/// not known.
pub fn complete_parallelogram(
    [a, b, c]: [ImagePoint; 3],
    bounds: Option<ImageBounds>,
) -> ImagePoint {
    let fourth = ImagePoint(b.0 + (c.0 - a.0));
    match bounds {
        Some(bounds) => bounds.clamp(fourth),
        None => ImagePoint::new(fourth.x.max(0.0), fourth.y.max(0.0)),
    }
}

/// Orders four corners as top-left, top-right, bottom-right, bottom-left.
///
/// Top-left has the smallest `x + y` and bottom-right the largest. Of the remaining two, top-right
/// has the larger `x - y`. Ties resolve to the earlier input index, so the output is deterministic
/// even for degenerate quads.
pub fn order_quad(points: [ImagePoint; 4]) -> Result<[ImagePoint; 4], PoseError> {
    if !points.iter().all(ImagePoint::is_finite) {
        return Err(PoseError::DegenerateQuad);
    }

    let top_left = (0..4)
        .min_by_key(|&ix| FloatOrd(points[ix].sum()))
        .ok_or(PoseError::DegenerateQuad)?;
    let bottom_right = (0..4)
        .filter(|&ix| ix != top_left)
        .max_by_key(|&ix| (FloatOrd(points[ix].sum()), Reverse(ix)))
        .ok_or(PoseError::DegenerateQuad)?;
    let mut rest = (0..4).filter(|&ix| ix != top_left && ix != bottom_right);
    let (first, second) = rest
        .next()
        .zip(rest.next())
        .ok_or(PoseError::DegenerateQuad)?;
    let (top_right, bottom_left) = if points[first].diff() >= points[second].diff() {
        (first, second)
    } else {
        (second, first)
    };

    Ok([
        points[top_left],
        points[top_right],
        points[bottom_right],
        points[bottom_left],
    ])
}

/// Turns the decoder's corner list into an ordered quad.
///
/// Three points are completed with [`complete_parallelogram`]. With four or more, only the first
/// four are used.
pub fn prepare_corners(
    points: &[ImagePoint],
    bounds: Option<ImageBounds>,
) -> Result<[ImagePoint; 4], PoseError> {
    let quad = match *points {
        [a, b, c] => [a, b, c, complete_parallelogram([a, b, c], bounds)],
        [a, b, c, d, ..] => [a, b, c, d],
        _ => {
            return Err(PoseError::InsufficientPoints {
                actual: points.len(),
            })
        }
    };
    order_quad(quad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn p(x: f64, y: f64) -> ImagePoint {
        ImagePoint::new(x, y)
    }

    #[test]
    fn orders_shuffled_square() {
        let ordered = order_quad([p(200.0, 200.0), p(100.0, 200.0), p(200.0, 100.0), p(100.0, 100.0)])
            .unwrap();
        assert_eq!(
            ordered,
            [p(100.0, 100.0), p(200.0, 100.0), p(200.0, 200.0), p(100.0, 200.0)]
        );
    }

    #[test]
    fn completes_fourth_corner() {
        let fourth = complete_parallelogram([p(100.0, 200.0), p(100.0, 100.0), p(200.0, 100.0)], None);
        assert_eq!(fourth, p(200.0, 0.0));
        let fourth = complete_parallelogram([p(100.0, 100.0), p(200.0, 100.0), p(200.0, 200.0)], None);
        assert_eq!(fourth, p(300.0, 200.0));
    }

    #[test]
    fn completion_is_clamped() {
        let corners = [p(10.0, 50.0), p(50.0, 10.0), p(90.0, 50.0)];
        assert_eq!(complete_parallelogram(corners, None), p(130.0, 10.0));
        assert_eq!(
            complete_parallelogram(corners, Some(ImageBounds::new(100, 100))),
            p(100.0, 10.0)
        );
        let corners = [p(50.0, 10.0), p(10.0, 20.0), p(20.0, 5.0)];
        assert_eq!(complete_parallelogram(corners, None), p(0.0, 15.0));
    }

    #[test]
    fn three_points_become_a_quad() {
        let ordered = prepare_corners(&[p(100.0, 200.0), p(100.0, 100.0), p(200.0, 100.0)], None)
            .unwrap();
        assert_eq!(ordered[0], p(100.0, 100.0));
        assert_eq!(ordered.len(), 4);
    }

    #[test]
    fn extra_points_are_ignored() {
        let ordered = prepare_corners(
            &[
                p(100.0, 100.0),
                p(200.0, 100.0),
                p(200.0, 200.0),
                p(100.0, 200.0),
                p(5000.0, 5000.0),
            ],
            None,
        )
        .unwrap();
        assert_eq!(ordered[2], p(200.0, 200.0));
    }

    #[test]
    fn too_few_points() {
        assert_eq!(
            prepare_corners(&[p(1.0, 1.0), p(2.0, 2.0)], None),
            Err(PoseError::InsufficientPoints { actual: 2 })
        );
        assert!(prepare_corners(&[], None)
            .unwrap_err()
            .to_string()
            .contains("insufficient points"));
    }

    #[test]
    fn non_finite_is_degenerate() {
        assert_eq!(
            order_quad([p(0.0, 0.0), p(1.0, 0.0), p(f64::NAN, 1.0), p(0.0, 1.0)]),
            Err(PoseError::DegenerateQuad)
        );
    }

    #[test]
    fn coincident_points_order_deterministically() {
        let same = [p(3.0, 3.0); 4];
        assert_eq!(order_quad(same).unwrap(), same);
    }

    #[test]
    fn ties_go_to_earlier_index() {
        let ordered = order_quad([p(0.0, 0.0), p(2.0, 0.0), p(0.0, 2.0), p(1.0, 1.0)]).unwrap();
        assert_eq!(ordered, [p(0.0, 0.0), p(1.0, 1.0), p(2.0, 0.0), p(0.0, 2.0)]);
        let diagonal = [p(0.0, 0.0), p(1.0, 1.0), p(2.0, 2.0), p(3.0, 3.0)];
        let ordered = order_quad(diagonal).unwrap();
        assert_eq!(ordered, [diagonal[0], diagonal[1], diagonal[3], diagonal[2]]);
    }

    /// A square rotated by less than 45 degrees, in a shuffled order, always comes back in the
    /// same canonical order, and ordering it again changes nothing.
    #[quickcheck]
    fn rotated_square_orders_canonically(angle: i8, size: u8, shift: u8, permutation: u8) -> bool {
        let angle = f64::from(angle) / 128.0 * 40f64.to_radians();
        let half = 5.0 + f64::from(size);
        let center = 300.0 + f64::from(shift);
        let (sin, cos) = angle.sin_cos();
        let corner = |x: f64, y: f64| p(center + cos * x - sin * y, center + sin * x + cos * y);
        let expected = [
            corner(-half, -half),
            corner(half, -half),
            corner(half, half),
            corner(-half, half),
        ];

        let mut shuffled = expected;
        shuffled.rotate_left(usize::from(permutation % 4));
        if permutation & 4 != 0 {
            shuffled.swap(0, 2);
        }

        let ordered = order_quad(shuffled).unwrap();
        ordered == expected && order_quad(ordered).unwrap() == ordered
    }
}
