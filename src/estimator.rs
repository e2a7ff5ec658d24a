//! Walltime estimation for batch sizing
//!
//! Per-unit processing time is modelled as a function of the number of CPUs
//! allocated to a job:
//!
//! `t(n) = scale * (intercept + inverse / n + linear * n + quadratic * n^2)`
//!
//! in minutes, and a job's total is that figure multiplied by the number of
//! units it holds. The coefficients were fitted from timings of SNAP graph runs
//! on the Bracewell cluster; the `scale` factor adds headroom on top of the fit.
//! The estimate is a sizing heuristic only and callers still enforce hard limits.

use serde::Deserialize;

/// Fitted coefficients for one workflow type.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct WorkloadProfile {
    pub scale: f64,
    pub intercept: f64,
    pub inverse: f64,
    pub linear: f64,
    pub quadratic: f64,
}

/// Single-scene workflows (backscatter, dual-pol decomposition).
pub const SINGLE_SCENE: WorkloadProfile = WorkloadProfile {
    scale: 1.35,
    intercept: -17.595,
    inverse: 345.577,
    linear: 8.108,
    quadratic: -0.184,
};

/// Scene-pair workflows (interferometric coherence).
pub const SCENE_PAIR: WorkloadProfile = WorkloadProfile {
    scale: 1.35,
    intercept: -2.970,
    inverse: 148.646,
    linear: 1.844,
    quadratic: -0.035,
};

impl WorkloadProfile {
    /// Minutes needed for one unit on `cpu_count` CPUs.
    ///
    /// The fitted curves turn negative well above the CPU counts they were
    /// measured on, so the result is clamped at zero.
    pub fn minutes_per_unit(&self, cpu_count: u32) -> f64 {
        let n = f64::from(cpu_count.max(1));
        let minutes = self.scale
            * (self.intercept + self.inverse / n + self.linear * n + self.quadratic * n * n);
        minutes.max(0.0)
    }

    /// CPU count in `1..=max_cpus` with the lowest per-unit estimate.
    pub fn fastest_cpu_count(&self, max_cpus: u32) -> u32 {
        (1..=max_cpus.max(1))
            .min_by(|a, b| {
                self.minutes_per_unit(*a)
                    .total_cmp(&self.minutes_per_unit(*b))
            })
            .unwrap_or(1)
    }
}

pub fn estimate_walltime_minutes(
    unit_count: usize,
    cpu_count: u32,
    calibration: &WorkloadProfile,
) -> f64 {
    calibration.minutes_per_unit(cpu_count) * unit_count as f64
}
