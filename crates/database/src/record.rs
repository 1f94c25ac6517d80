//! Workload and tuning-record types.

use serde::{Deserialize, Serialize};
use tuneforge_ir::{ProgramModule, Trace};

/// Identity under which a program's tuning records are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadId(pub u64);

/// A committed workload: the module plus its assigned id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workload {
    pub id: WorkloadId,
    pub module: ProgramModule,
}

/// One measured candidate: the trace that produced it and the observed
/// per-repeat runtimes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TuningRecord {
    pub workload_id: WorkloadId,
    pub trace: Trace,
    pub run_secs: Vec<f64>,
}

impl TuningRecord {
    pub fn new(workload_id: WorkloadId, trace: Trace, run_secs: Vec<f64>) -> Self {
        Self {
            workload_id,
            trace,
            run_secs,
        }
    }

    /// Mean runtime; an unmeasured record sorts behind everything.
    pub fn achieved_cost(&self) -> f64 {
        if self.run_secs.is_empty() {
            return f64::INFINITY;
        }
        self.run_secs.iter().sum::<f64>() / self.run_secs.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_achieved_cost_mean() {
        let record = TuningRecord::new(WorkloadId(0), Trace::new(), vec![1.0, 3.0]);
        assert_eq!(record.achieved_cost(), 2.0);
    }

    #[test]
    fn test_unmeasured_record_is_infinite() {
        let record = TuningRecord::new(WorkloadId(0), Trace::new(), vec![]);
        assert!(record.achieved_cost().is_infinite());
    }

    #[test]
    fn test_record_roundtrip() {
        let record = TuningRecord::new(WorkloadId(7), Trace::new(), vec![0.5]);
        let json = serde_json::to_string(&record).unwrap();
        let parsed: TuningRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, parsed);
    }
}
