//! Pairwise tournament reduction of a point collection into its barycenter.
//!
//! Every round combines the points at positions (0, 1), (2, 3), ... and
//! carries an unpaired last point through unchanged, so `n` points take
//! `ceil(log2(n))` rounds. Rounds depend on each other; the combines inside
//! one round don't, and can be spread over the rayon pool.
use crate::{
    error::{Error, Result},
    mass_point::MassPoint,
};
use rayon::prelude::*;
use std::time::{Duration, Instant};

/// Whether the combines of a round run one after another or on rayon.
/// Both produce bit-identical results since the pairing is the same.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ReduceMode {
    #[default]
    Sequential,
    Parallel,
}

/// What to do when two combined masses sum to zero, or when combining them
/// overflows to a non-finite position.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ZeroMassPolicy {
    /// Abort with [`Error::DegenerateMass`] or [`Error::NonFinitePosition`].
    #[default]
    Reject,
    /// Divide anyway and let NaN reach the result.
    Propagate,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ReduceOptions {
    pub mode: ReduceMode,
    pub zero_mass: ZeroMassPolicy,
}

/// The single point left over by [`reduce`], plus bookkeeping.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Reduction {
    pub point: MassPoint,
    pub rounds: usize,
    pub elapsed: Duration,
}

/// Number of rounds needed to fold `n` points down to one.
pub fn rounds_for(n: usize) -> usize {
    if n <= 1 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as usize
    }
}

/// One round of the tournament, unguarded: a zero total mass turns into NaN.
pub fn fold_round(points: &[MassPoint]) -> Vec<MassPoint> {
    points.chunks(2).map(fold_pair).collect()
}

/// One round of the tournament that fails on the first degenerate pair.
pub fn try_fold_round(points: &[MassPoint]) -> Result<Vec<MassPoint>> {
    points.chunks(2).map(try_fold_pair).collect()
}

/// [`fold_round`] with the combines spread over the rayon pool.
pub fn par_fold_round(points: &[MassPoint]) -> Vec<MassPoint> {
    points.par_chunks(2).map(fold_pair).collect()
}

/// [`try_fold_round`] with the combines spread over the rayon pool.
pub fn par_try_fold_round(points: &[MassPoint]) -> Result<Vec<MassPoint>> {
    points.par_chunks(2).map(try_fold_pair).collect()
}

fn fold_pair(pair: &[MassPoint]) -> MassPoint {
    match *pair {
        [a, b] => a.combine(b),
        [a] => a,
        _ => unreachable!("chunks(2) yields one or two points"),
    }
}

fn try_fold_pair(pair: &[MassPoint]) -> Result<MassPoint> {
    match *pair {
        [a, b] => a.try_combine(b),
        [a] => Ok(a),
        _ => unreachable!("chunks(2) yields one or two points"),
    }
}

/// Folds the whole collection into a single point. An empty collection is
/// [`Error::InsufficientData`]; a single point comes back unchanged.
pub fn reduce(points: Vec<MassPoint>, options: &ReduceOptions) -> Result<Reduction> {
    let start = Instant::now();
    let expected_rounds = rounds_for(points.len());
    log::debug!(
        "reducing {} points in {expected_rounds} rounds ({:?}, {:?})",
        points.len(),
        options.mode,
        options.zero_mass
    );

    let mut points = points;
    let mut rounds = 0;
    while points.len() > 1 {
        points = match (options.mode, options.zero_mass) {
            (ReduceMode::Sequential, ZeroMassPolicy::Reject) => try_fold_round(&points)?,
            (ReduceMode::Sequential, ZeroMassPolicy::Propagate) => fold_round(&points),
            (ReduceMode::Parallel, ZeroMassPolicy::Reject) => par_try_fold_round(&points)?,
            (ReduceMode::Parallel, ZeroMassPolicy::Propagate) => par_fold_round(&points),
        };
        rounds += 1;
        log::trace!("round {rounds}: {} points left", points.len());
    }

    let point = points.pop().ok_or(Error::InsufficientData)?;
    if !point.is_finite() {
        log::warn!("barycenter is not finite: {point}");
    }

    let elapsed = start.elapsed();
    log::info!("reduced to {point} in {elapsed:?}");

    Ok(Reduction {
        point,
        rounds,
        elapsed,
    })
}

#[cfg(test)]
fn sequential() -> ReduceOptions {
    ReduceOptions::default()
}

#[cfg(test)]
fn parallel() -> ReduceOptions {
    ReduceOptions {
        mode: ReduceMode::Parallel,
        ..ReduceOptions::default()
    }
}

#[cfg(test)]
fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

#[test]
fn test_rounds_for() {
    assert_eq!(rounds_for(0), 0);
    assert_eq!(rounds_for(1), 0);
    assert_eq!(rounds_for(2), 1);
    assert_eq!(rounds_for(3), 2);
    assert_eq!(rounds_for(4), 2);
    assert_eq!(rounds_for(5), 3);
    assert_eq!(rounds_for(1024), 10);
    assert_eq!(rounds_for(1025), 11);
}

#[test]
fn test_reduce_empty_is_insufficient() {
    assert!(matches!(
        reduce(vec![], &sequential()),
        Err(Error::InsufficientData)
    ));
}

#[test]
fn test_reduce_single_point_is_identity() {
    let point = MassPoint::new(1.25, -3.5, 8.0, 0.75);
    let reduction = reduce(vec![point], &sequential()).unwrap();
    assert_eq!(reduction.point, point);
    assert_eq!(reduction.rounds, 0);
}

#[test]
fn test_odd_length_passes_last_point_through() {
    let a = MassPoint::new(0.0, 0.0, 0.0, 1.0);
    let b = MassPoint::new(4.0, 0.0, 0.0, 3.0);
    let c = MassPoint::new(1.0, 1.0, 1.0, 2.0);

    let first = fold_round(&[a, b, c]);
    assert_eq!(first, vec![a.combine(b), c]);

    let second = fold_round(&first);
    assert_eq!(second, vec![a.combine(b).combine(c)]);

    let reduction = reduce(vec![a, b, c], &sequential()).unwrap();
    assert_eq!(reduction.point, a.combine(b).combine(c));
    assert_eq!(reduction.rounds, 2);
}

#[test]
fn test_two_unit_masses() {
    let points = vec![
        MassPoint::new(0.0, 0.0, 0.0, 1.0),
        MassPoint::new(2.0, 0.0, 0.0, 1.0),
    ];
    let reduction = reduce(points, &sequential()).unwrap();
    assert_eq!(reduction.point, MassPoint::new(1.0, 0.0, 0.0, 2.0));
}

#[test]
fn test_coincident_points() {
    let points = vec![
        MassPoint::new(0.0, 0.0, 0.0, 1.0),
        MassPoint::new(0.0, 0.0, 0.0, 1.0),
        MassPoint::new(0.0, 0.0, 0.0, 2.0),
    ];
    let reduction = reduce(points, &sequential()).unwrap();
    assert_eq!(reduction.point, MassPoint::new(0.0, 0.0, 0.0, 4.0));
}

#[test]
fn test_rounds_match_rounds_for() {
    for n in 1..70 {
        let points: Vec<MassPoint> = (0..n)
            .map(|i| MassPoint::new(i as f64, 0.0, 0.0, 1.0))
            .collect();
        let reduction = reduce(points, &sequential()).unwrap();
        assert_eq!(reduction.rounds, rounds_for(n), "n = {n}");
        assert_eq!(reduction.point.mass(), n as f64);
        assert!(close(reduction.point.x(), (n - 1) as f64 / 2.0), "n = {n}");
    }
}

#[test]
fn test_parallel_matches_sequential_bitwise() {
    let points: Vec<MassPoint> = (0..1001)
        .map(|i| {
            let i = i as f64;
            MassPoint::new(i.sin() * 100.0, i.cos() * 50.0, i * 0.37, 1.0 + (i * 0.13) % 7.0)
        })
        .collect();
    let sequential = reduce(points.clone(), &sequential()).unwrap();
    let parallel = reduce(points, &parallel()).unwrap();
    assert_eq!(sequential.point, parallel.point);
    assert_eq!(sequential.rounds, parallel.rounds);
}

#[test]
fn test_zero_mass_rejected_by_default() {
    let points = vec![
        MassPoint::new(1.0, 0.0, 0.0, 1.0),
        MassPoint::new(-1.0, 0.0, 0.0, -1.0),
    ];
    assert!(matches!(
        reduce(points.clone(), &sequential()),
        Err(Error::DegenerateMass { .. })
    ));
    assert!(matches!(
        reduce(points, &parallel()),
        Err(Error::DegenerateMass { .. })
    ));
}

#[test]
fn test_overflowing_position_rejected_by_default() {
    let points: Vec<MassPoint> = ["1e300:0:0:1e10", "-1e300:0:0:1e10"]
        .iter()
        .map(|line| line.parse().unwrap())
        .collect();
    assert!(matches!(
        reduce(points.clone(), &sequential()),
        Err(Error::NonFinitePosition { .. })
    ));
    assert!(matches!(
        reduce(points, &parallel()),
        Err(Error::NonFinitePosition { .. })
    ));
}

#[test]
fn test_zero_mass_propagates_nan_when_allowed() {
    let points = vec![
        MassPoint::new(1.0, 0.0, 0.0, 1.0),
        MassPoint::new(-1.0, 0.0, 0.0, -1.0),
        MassPoint::new(3.0, 3.0, 3.0, 2.0),
    ];
    let options = ReduceOptions {
        zero_mass: ZeroMassPolicy::Propagate,
        ..ReduceOptions::default()
    };
    let reduction = reduce(points, &options).unwrap();
    assert!(reduction.point.x().is_nan());
    assert!(!reduction.point.is_finite());
    assert_eq!(reduction.point.mass(), 2.0);
}

#[cfg(test)]
mod properties {
    use super::*;
    use proptest::prelude::*;

    fn arb_point() -> impl Strategy<Value = MassPoint> {
        (-1e3..1e3f64, -1e3..1e3f64, -1e3..1e3f64, 0.01..1e3f64)
            .prop_map(|(x, y, z, mass)| MassPoint::new(x, y, z, mass))
    }

    fn arb_points() -> impl Strategy<Value = Vec<MassPoint>> {
        prop::collection::vec(arb_point(), 1..300)
    }

    fn assert_close(a: MassPoint, b: MassPoint) -> std::result::Result<(), TestCaseError> {
        for (u, v) in a.position().into_iter().zip(b.position()) {
            prop_assert!(close(u, v), "{a} != {b}");
        }
        prop_assert!(close(a.mass(), b.mass()), "{a} != {b}");
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_permutation_invariant(
            (points, shuffled) in arb_points()
                .prop_flat_map(|points| (Just(points.clone()), Just(points).prop_shuffle()))
        ) {
            let original = reduce(points, &sequential()).unwrap();
            let permuted = reduce(shuffled, &sequential()).unwrap();
            assert_close(original.point, permuted.point)?;
        }

        #[test]
        fn prop_pairing_invariant(points in arb_points()) {
            let tournament = reduce(points.clone(), &sequential()).unwrap().point;
            let left_fold = points
                .iter()
                .copied()
                .reduce(MassPoint::combine)
                .unwrap();
            let right_fold = points
                .iter()
                .rev()
                .copied()
                .reduce(MassPoint::combine)
                .unwrap();
            assert_close(tournament, left_fold)?;
            assert_close(tournament, right_fold)?;
        }

        #[test]
        fn prop_mass_is_conserved(masses in prop::collection::vec(1u32..1000, 1..500)) {
            // Integer masses keep every partial sum exact.
            let points: Vec<MassPoint> = masses
                .iter()
                .enumerate()
                .map(|(i, &mass)| MassPoint::new(i as f64, -(i as f64), 0.5, mass as f64))
                .collect();
            let total: f64 = masses.iter().map(|&m| m as f64).sum();
            let reduction = reduce(points, &parallel()).unwrap();
            prop_assert_eq!(reduction.point.mass(), total);
        }

        #[test]
        fn prop_parallel_is_bitwise_sequential(points in arb_points()) {
            let sequential = reduce(points.clone(), &sequential()).unwrap();
            let parallel = reduce(points, &parallel()).unwrap();
            prop_assert_eq!(sequential.point, parallel.point);
        }
    }
}
