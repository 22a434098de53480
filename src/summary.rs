//! Stage summary - the per-stage progress table derived from a state

use crate::stage::{Stage, StageStatus};
use crate::state::ProgressState;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Progress of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub status: StageStatus,
    /// 1-based position of the running action, 0 when none
    pub step: usize,
    /// Number of configured actions
    pub steps: usize,
}

/// Progress of every stage, in lifecycle order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    rows: Vec<(Stage, StageSummary)>,
}

impl Summary {
    /// Classify every stage relative to the state's current stage.
    ///
    /// Stages before the current one are completed, the current one is
    /// running and everything after it is waiting.
    pub fn of(state: &ProgressState) -> Self {
        let current = state.current_stage();
        let rows = Stage::all()
            .iter()
            .map(|&stage| {
                let steps = state.stage(stage).len();
                let summary = if stage < current {
                    StageSummary { status: StageStatus::Completed, step: steps, steps }
                } else if stage == current {
                    StageSummary { status: StageStatus::Running, step: state.current_step(), steps }
                } else {
                    StageSummary { status: StageStatus::Waiting, step: 0, steps }
                };
                (stage, summary)
            })
            .collect();

        Self { rows }
    }

    pub fn get(&self, stage: Stage) -> &StageSummary {
        // rows hold every stage at its lifecycle position
        &self.rows[stage.position()].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, &StageSummary)> {
        self.rows.iter().map(|(stage, summary)| (*stage, summary))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Serialize for Summary {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.rows.len()))?;
        for (stage, summary) in &self.rows {
            map.serialize_entry(stage.as_str(), summary)?;
        }
        map.end()
    }
}
