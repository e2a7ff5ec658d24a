//! Splits work units into scheduler jobs.

use serde::Deserialize;
use std::fmt;

use crate::estimator::{WorkloadProfile, estimate_walltime_minutes};
use crate::work_unit::WorkUnit;

/// Per-queue fair-share ceiling on the number of jobs one run may submit.
pub const DEFAULT_MAX_BATCH_COUNT: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BatchLimits {
    pub max_units_per_batch: usize,
    pub max_walltime_minutes_per_batch: f64,
    pub max_batch_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// 1-based position among the run's batches.
    pub index: usize,
    pub units: Vec<WorkUnit>,
    pub estimated_walltime_minutes: f64,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartitionError {
    TooManyBatches { required: usize, limit: usize },
}

impl fmt::Display for PartitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionError::TooManyBatches { required, limit } => write!(
                f,
                "Too many jobs for this query: {} needed, at most {} allowed",
                required, limit
            ),
        }
    }
}

impl std::error::Error for PartitionError {}

/// Number of jobs needed so that no job exceeds either the unit or the walltime limit.
pub fn target_batch_count(
    unit_count: usize,
    cpu_count: u32,
    limits: &BatchLimits,
    calibration: &WorkloadProfile,
) -> usize {
    if unit_count == 0 {
        return 0;
    }
    let total_walltime = estimate_walltime_minutes(unit_count, cpu_count, calibration);
    let by_walltime = (total_walltime / limits.max_walltime_minutes_per_batch).ceil() as usize;
    let by_walltime = by_walltime.min(unit_count);
    let by_count = unit_count.div_ceil(limits.max_units_per_batch.max(1));
    by_walltime.max(by_count)
}

/// Splits `units` into contiguous, order-preserving batches whose sizes
/// differ by at most one, larger batches first.
pub fn partition(
    units: Vec<WorkUnit>,
    cpu_count: u32,
    limits: &BatchLimits,
    calibration: &WorkloadProfile,
) -> Result<Vec<Batch>, PartitionError> {
    let required = target_batch_count(units.len(), cpu_count, limits, calibration);
    if required > limits.max_batch_count {
        return Err(PartitionError::TooManyBatches {
            required,
            limit: limits.max_batch_count,
        });
    }
    Ok(split_even(units, required, cpu_count, calibration))
}

/// Same split without the job ceiling, for runs that never reach a scheduler.
pub fn partition_unbounded(
    units: Vec<WorkUnit>,
    cpu_count: u32,
    limits: &BatchLimits,
    calibration: &WorkloadProfile,
) -> Vec<Batch> {
    let required = target_batch_count(units.len(), cpu_count, limits, calibration);
    split_even(units, required, cpu_count, calibration)
}

fn split_even(
    units: Vec<WorkUnit>,
    batch_count: usize,
    cpu_count: u32,
    calibration: &WorkloadProfile,
) -> Vec<Batch> {
    if batch_count == 0 {
        return Vec::new();
    }

    let base = units.len() / batch_count;
    let extra = units.len() % batch_count;
    let mut remaining = units.into_iter();
    let mut batches = Vec::with_capacity(batch_count);

    for i in 0..batch_count {
        let size = base + usize::from(i < extra);
        let chunk: Vec<WorkUnit> = remaining.by_ref().take(size).collect();
        let estimated_walltime_minutes =
            estimate_walltime_minutes(chunk.len(), cpu_count, calibration);
        batches.push(Batch {
            index: i + 1,
            units: chunk,
            estimated_walltime_minutes,
        });
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{SCENE_PAIR, SINGLE_SCENE};
    use crate::work_unit::fixtures::scene;

    fn units(n: u32) -> Vec<WorkUnit> {
        (1..=n)
            .map(|i| WorkUnit::Single {
                scene: scene(i % 28 + 1, "-20.5", "130.5", 1000 + i, 9),
            })
            .collect()
    }

    fn limits(max_units: usize, max_walltime: f64, max_batches: usize) -> BatchLimits {
        BatchLimits {
            max_units_per_batch: max_units,
            max_walltime_minutes_per_batch: max_walltime,
            max_batch_count: max_batches,
        }
    }

    fn sizes(batches: &[Batch]) -> Vec<usize> {
        batches.iter().map(Batch::len).collect()
    }

    #[test]
    fn test_seven_units_three_per_batch() {
        let input = units(7);
        let batches = partition(input.clone(), 8, &limits(3, 1.0e9, 300), &SINGLE_SCENE).unwrap();
        assert_eq!(sizes(&batches), vec![3, 2, 2]);
        assert_eq!(
            batches.iter().map(|b| b.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        let joined: Vec<WorkUnit> = batches.into_iter().flat_map(|b| b.units).collect();
        assert_eq!(joined, input);
    }

    #[test]
    fn test_walltime_limit_binds() {
        // ~106 min per scene on 8 CPUs, so at most 4 scenes fit in 8 h.
        let per_unit = SINGLE_SCENE.minutes_per_unit(8);
        let batches = partition(units(10), 8, &limits(100, 480.0, 300), &SINGLE_SCENE).unwrap();
        assert_eq!(batches.len(), (10.0 * per_unit / 480.0).ceil() as usize);
        for b in &batches {
            assert!(b.estimated_walltime_minutes <= 480.0 + per_unit);
        }
    }

    #[test]
    fn test_walltime_batches_capped_at_unit_count() {
        // A single unit longer than the limit still gets exactly one batch.
        let batches = partition(units(2), 8, &limits(10, 1.0, 300), &SCENE_PAIR).unwrap();
        assert_eq!(sizes(&batches), vec![1, 1]);
    }

    #[test]
    fn test_batch_estimate_recomputed_per_batch() {
        let batches = partition(units(5), 8, &limits(2, 1.0e9, 300), &SINGLE_SCENE).unwrap();
        assert_eq!(sizes(&batches), vec![2, 2, 1]);
        let per_unit = SINGLE_SCENE.minutes_per_unit(8);
        assert!((batches[0].estimated_walltime_minutes - 2.0 * per_unit).abs() < 1e-9);
        assert!((batches[2].estimated_walltime_minutes - per_unit).abs() < 1e-9);
    }

    #[test]
    fn test_ceiling_exceeded() {
        let result = partition(units(350), 8, &limits(1, 1.0e9, 300), &SINGLE_SCENE);
        assert_eq!(
            result,
            Err(PartitionError::TooManyBatches {
                required: 350,
                limit: 300
            })
        );

        let batches = partition_unbounded(units(350), 8, &limits(1, 1.0e9, 300), &SINGLE_SCENE);
        assert_eq!(batches.len(), 350);
    }

    #[test]
    fn test_sizes_differ_by_at_most_one() {
        for n in 1..60 {
            for max_units in 1..8 {
                let input = units(n);
                let batches =
                    partition(input.clone(), 8, &limits(max_units, 1.0e9, 300), &SINGLE_SCENE)
                        .unwrap();
                let s = sizes(&batches);
                let (min, max) = (*s.iter().min().unwrap(), *s.iter().max().unwrap());
                assert!(max - min <= 1, "n={n} max_units={max_units} sizes={s:?}");
                assert!(max <= max_units);
                assert!(batches.iter().all(|b| !b.is_empty()));
                let joined: Vec<WorkUnit> = batches.into_iter().flat_map(|b| b.units).collect();
                assert_eq!(joined, input);
            }
        }
    }

    #[test]
    fn test_no_units_no_batches() {
        let batches = partition(Vec::new(), 8, &limits(3, 60.0, 300), &SINGLE_SCENE).unwrap();
        assert!(batches.is_empty());
    }
}
