use serde::Deserialize;
use std::fmt;

use crate::estimator::{SCENE_PAIR, SINGLE_SCENE, WorkloadProfile};
use crate::partition::{BatchLimits, DEFAULT_MAX_BATCH_COUNT};

/// Processing chains that can be submitted.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    #[serde(rename(deserialize = "backscatter"))]
    Backscatter,
    #[serde(rename(deserialize = "dualpol_decomposition"))]
    DualPolDecomposition,
    #[serde(rename(deserialize = "interferometric_coherence"))]
    InterferometricCoherence,
}

impl Workflow {
    /// Whether work units are scene pairs rather than single scenes.
    pub fn is_paired(&self) -> bool {
        matches!(self, Workflow::InterferometricCoherence)
    }

    pub fn job_prefix(&self) -> &'static str {
        match self {
            Workflow::Backscatter => "backsc_proc",
            Workflow::DualPolDecomposition => "dualpol_proc",
            Workflow::InterferometricCoherence => "intcoh_proc",
        }
    }

    pub fn default_job_script(&self) -> String {
        format!("{}.sh", self.job_prefix())
    }

    pub fn title(&self) -> &'static str {
        match self {
            Workflow::Backscatter => "BACKSCATTER processing of SAR scenes",
            Workflow::DualPolDecomposition => "DUAL POL. DECOMPOSITION processing of SAR scenes",
            Workflow::InterferometricCoherence => {
                "INTERFEROMETRIC COHERENCE processing of SAR scene pairs"
            }
        }
    }

    pub fn calibration(&self) -> WorkloadProfile {
        if self.is_paired() {
            SCENE_PAIR
        } else {
            SINGLE_SCENE
        }
    }

    pub fn default_limits(&self) -> BatchLimits {
        let (max_units_per_batch, hours) = if self.is_paired() { (4, 5.0) } else { (3, 8.0) };
        BatchLimits {
            max_units_per_batch,
            max_walltime_minutes_per_batch: hours * 60.0,
            max_batch_count: DEFAULT_MAX_BATCH_COUNT,
        }
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Workflow::Backscatter => write!(f, "backscatter"),
            Workflow::DualPolDecomposition => write!(f, "dual-pol decomposition"),
            Workflow::InterferometricCoherence => write!(f, "interferometric coherence"),
        }
    }
}
