use approx::assert_relative_eq;
use arrsac::Arrsac;
use marker_core::nalgebra::{Point3, Rotation3, Vector3};
use marker_core::sample_consensus::{Consensus, Estimator};
use marker_core::{CameraFromObject, CornerMatch};
use marker_p3p::LambdaTwist;
use marker_pinhole::CameraIntrinsics;
use quickcheck_macros::quickcheck;
use rand::{rngs::SmallRng, SeedableRng};

const EPSILON_APPROX: f64 = 1e-6;
const MARKER_SIZE: f64 = 0.075184;

fn marker_corners() -> [Point3<f64>; 4] {
    let s = MARKER_SIZE;
    [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(s, 0.0, 0.0),
        Point3::new(s, s, 0.0),
        Point3::new(0.0, s, 0.0),
    ]
}

fn observe(pose: &CameraFromObject, points: &[Point3<f64>]) -> Vec<CornerMatch> {
    points
        .iter()
        .map(|p| {
            let bearing = marker_core::nalgebra::UnitVector3::new_normalize(pose.transform(p).coords);
            CornerMatch::new(bearing, *p)
        })
        .collect()
}

#[test]
fn one_candidate_is_ground_truth() {
    let rot = Rotation3::from_euler_angles(0.1, 0.2, 0.3);
    let pose = CameraFromObject::from_parts(Vector3::new(-0.03, 0.02, 0.6), rot);
    let matches = observe(&pose, &marker_corners());

    let candidates = LambdaTwist::new().estimate(matches[..3].iter().copied());
    assert!(!candidates.is_empty());
    let best = candidates
        .iter()
        .map(|c| (c.rotation() - rot.matrix()).norm() + (c.translation() - pose.translation()).norm())
        .fold(f64::INFINITY, f64::min);
    assert!(best < EPSILON_APPROX, "closest candidate off by {}", best);
}

#[test]
fn arrsac_disambiguates_with_fourth_corner() {
    let mut arrsac = Arrsac::new(1e-6, SmallRng::seed_from_u64(0));

    let rot = Rotation3::from_euler_angles(-0.4, 0.15, 0.05);
    let trans = Vector3::new(0.01, -0.04, 0.45);
    let pose = CameraFromObject::from_parts(trans, rot);

    // Corners plus the marker center, as seen through a real camera.
    let intrinsics = CameraIntrinsics::from_arrays([800.0, 800.0], [320.0, 240.0]);
    let mut points = marker_corners().to_vec();
    points.push(Point3::new(MARKER_SIZE / 2.0, MARKER_SIZE / 2.0, 0.0));
    let matches: Vec<CornerMatch> = points
        .iter()
        .map(|p| {
            let pixel = intrinsics.project(&pose.transform(p)).unwrap();
            CornerMatch::new(intrinsics.bearing(pixel), *p)
        })
        .collect();

    let estimate = arrsac
        .model(&LambdaTwist::new(), matches.iter().copied())
        .unwrap();

    assert_relative_eq!(*estimate.rotation(), *rot.matrix(), epsilon = EPSILON_APPROX);
    assert_relative_eq!(estimate.translation(), trans, epsilon = EPSILON_APPROX);
}

#[quickcheck]
fn candidates_reproject_their_sample(yaw: u8, distance: u8) -> bool {
    let yaw = f64::from(yaw) / 255.0 - 0.5;
    let depth = 0.2 + f64::from(distance) / 100.0;
    let pose = CameraFromObject::from_parts(
        Vector3::new(-MARKER_SIZE / 2.0, -MARKER_SIZE / 2.0, depth),
        Rotation3::from_euler_angles(0.2, yaw, 0.1),
    );
    let matches = observe(&pose, &marker_corners()[..3]);
    let candidates = LambdaTwist::new().estimate(matches.iter().copied());
    use marker_core::sample_consensus::Model;
    !candidates.is_empty()
        && candidates
            .iter()
            .all(|c| matches.iter().all(|m| c.residual(m) < 1e-9))
}
