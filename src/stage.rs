//! Build stages - the fixed lifecycle of a Travis CI job
//!
//! Every job walks the same ordered list of stages:
//! - `not_started_yet`: sentinel, nothing has run yet
//! - `before_install` .. `after_script`: the eight configurable stages
//! - `done`: sentinel, the log stream has ended

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A stage of the build lifecycle.
///
/// Variants are declared in execution order, so the derived `Ord` is the
/// lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NotStartedYet,
    BeforeInstall,
    Install,
    BeforeScript,
    Script,
    BeforeCache,
    AfterSuccess,
    AfterFailure,
    AfterScript,
    Done,
}

impl Stage {
    /// Get the string representation of the stage, as used in `.travis.yml`
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::NotStartedYet => "not_started_yet",
            Stage::BeforeInstall => "before_install",
            Stage::Install => "install",
            Stage::BeforeScript => "before_script",
            Stage::Script => "script",
            Stage::BeforeCache => "before_cache",
            Stage::AfterSuccess => "after_success",
            Stage::AfterFailure => "after_failure",
            Stage::AfterScript => "after_script",
            Stage::Done => "done",
        }
    }

    /// All stages in lifecycle order, sentinels included
    pub fn all() -> &'static [Stage] {
        &[
            Stage::NotStartedYet,
            Stage::BeforeInstall,
            Stage::Install,
            Stage::BeforeScript,
            Stage::Script,
            Stage::BeforeCache,
            Stage::AfterSuccess,
            Stage::AfterFailure,
            Stage::AfterScript,
            Stage::Done,
        ]
    }

    /// The eight stages that can hold configured actions
    pub fn working() -> &'static [Stage] {
        &Self::all()[1..9]
    }

    /// Sentinel stages bracket the build and never hold actions
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Stage::NotStartedYet | Stage::Done)
    }

    /// Zero-based position in the lifecycle order
    pub fn position(&self) -> usize {
        *self as usize
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Stage::all()
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| Error::UnknownStage(s.to_string()))
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How far along a stage is, relative to the current stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// The stage comes after the current one
    Waiting,
    /// The stage is the current one
    Running,
    /// The stage comes before the current one
    Completed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Waiting => "waiting",
            StageStatus::Running => "running",
            StageStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
