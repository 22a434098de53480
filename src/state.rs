//! Progress state - immutable snapshot of a build's progress
//!
//! A `ProgressState` pairs the configured plan (the actions of every stage)
//! with the stage and action currently executing. Every transition returns
//! a new value; the plan is shared between snapshots behind an `Arc`, so
//! advancing the current action never copies it.

use crate::action::Action;
use crate::stage::Stage;
use crate::summary::Summary;
use crate::{Error, Result};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Maps an action's text to the stage it was configured in and its 1-based
/// position within that stage.
///
/// Keys are the literal command text, so a command registered in two
/// stages resolves to whichever stage registered it last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageAssignment {
    entries: HashMap<String, (Stage, usize)>,
}

impl StageAssignment {
    /// Look up the stage and position of a command
    pub fn resolve(&self, command: &str) -> Option<(Stage, usize)> {
        self.entries.get(command).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a new assignment where every entry of `stage` is replaced by
    /// `actions`. Entries that another stage has since taken over are kept.
    fn with_stage(&self, stage: Stage, actions: &[Action]) -> Self {
        let mut entries = self.entries.clone();
        entries.retain(|_, (assigned, _)| *assigned != stage);
        for (i, action) in actions.iter().enumerate() {
            entries.insert(action.as_str().to_string(), (stage, i + 1));
        }
        Self { entries }
    }
}

/// The configured plan: ordered actions per working stage plus their index
#[derive(Debug, Clone, PartialEq, Eq)]
struct Plan {
    stages: BTreeMap<Stage, Vec<Action>>,
    index: StageAssignment,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            stages: Stage::working().iter().map(|s| (*s, Vec::new())).collect(),
            index: StageAssignment::default(),
        }
    }
}

/// Immutable snapshot of a build's progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    plan: Arc<Plan>,
    current_stage: Stage,
    current_action: Action,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressState {
    /// A state with an empty plan that has not started yet
    pub fn new() -> Self {
        Self {
            plan: Arc::new(Plan::default()),
            current_stage: Stage::NotStartedYet,
            current_action: Action::empty(),
        }
    }

    /// The same plan, positioned at `stage` running `action`.
    ///
    /// Stage and action only ever change together through here.
    fn at(&self, stage: Stage, action: Action) -> Self {
        Self {
            plan: Arc::clone(&self.plan),
            current_stage: stage,
            current_action: action,
        }
    }

    /// Replace the configured actions of a working stage.
    ///
    /// The action index entries of that stage are rebuilt in the same step.
    pub fn with_stage(&self, stage: Stage, actions: impl IntoIterator<Item = Action>) -> Result<Self> {
        if stage.is_sentinel() {
            return Err(Error::SentinelStage(stage));
        }

        let actions: Vec<Action> = actions.into_iter().collect();
        let mut plan = Plan {
            stages: self.plan.stages.clone(),
            index: self.plan.index.with_stage(stage, &actions),
        };
        plan.stages.insert(stage, actions);

        Ok(Self {
            plan: Arc::new(plan),
            current_stage: self.current_stage,
            current_action: self.current_action.clone(),
        })
    }

    /// Advance to `action`, moving to the stage it is registered in
    pub fn with_current_action(&self, action: Action) -> Result<Self> {
        let stage = self.stage_by_action(&action)?;
        Ok(self.at(stage, action))
    }

    /// Advance to the `done` sentinel, keeping the last action
    pub fn finished(&self) -> Self {
        self.at(Stage::Done, self.current_action.clone())
    }

    pub fn current_stage(&self) -> Stage {
        self.current_stage
    }

    pub fn current_action(&self) -> &Action {
        &self.current_action
    }

    /// 1-based position of the current action within the current stage,
    /// 0 when the action is not part of it
    pub fn current_step(&self) -> usize {
        self.stage(self.current_stage)
            .iter()
            .position(|action| *action == self.current_action)
            .map_or(0, |i| i + 1)
    }

    /// Configured actions of a stage; sentinels have none
    pub fn stage(&self, stage: Stage) -> &[Action] {
        self.plan.stages.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Configured actions of a stage looked up by name
    pub fn stage_named(&self, name: &str) -> Result<&[Action]> {
        let stage: Stage = name.parse()?;
        Ok(self.stage(stage))
    }

    /// Stages that have at least one configured action, in lifecycle order
    pub fn stages_with_actions(&self) -> Vec<(Stage, &[Action])> {
        self.plan
            .stages
            .iter()
            .filter(|(_, actions)| !actions.is_empty())
            .map(|(stage, actions)| (*stage, actions.as_slice()))
            .collect()
    }

    /// The stage an action is registered in
    pub fn stage_by_action(&self, action: &Action) -> Result<Stage> {
        self.resolve(action.as_str())
            .map(|(stage, _)| stage)
            .ok_or_else(|| Error::ActionNotFound(action.to_string()))
    }

    /// Look up a command in the action index
    pub fn resolve(&self, command: &str) -> Option<(Stage, usize)> {
        self.plan.index.resolve(command)
    }

    pub fn action_index(&self) -> &StageAssignment {
        &self.plan.index
    }

    /// Per-stage progress table for rendering
    pub fn summary(&self) -> Summary {
        Summary::of(self)
    }
}

impl Serialize for ProgressState {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ProgressState", 4)?;
        state.serialize_field("stage", &self.current_stage)?;
        state.serialize_field("action", &self.current_action)?;
        state.serialize_field("step", &self.current_step())?;
        state.serialize_field("summary", &self.summary())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn install() -> Action {
        Action::new("composer install")
    }

    fn update() -> Action {
        Action::new("composer update")
    }

    #[test]
    fn test_initial_state() {
        let state = ProgressState::new();
        assert_eq!(state.current_stage(), Stage::NotStartedYet);
        assert!(state.current_action().is_empty());
        assert_eq!(state.current_step(), 0);
        assert!(state.stages_with_actions().is_empty());
        assert!(state.action_index().is_empty());
    }

    #[test]
    fn test_current_action() {
        let state = ProgressState::new()
            .with_stage(Stage::Install, [install()])
            .unwrap()
            .with_stage(Stage::BeforeScript, [update()])
            .unwrap()
            .with_current_action(install())
            .unwrap();
        assert_eq!(state.current_action(), &install());
        assert_eq!(state.current_stage(), Stage::Install);

        let next = state.with_current_action(update()).unwrap();
        assert_eq!(state.current_action(), &install());
        assert_eq!(state.current_stage(), Stage::Install);
        assert_eq!(next.current_action(), &update());
        assert_eq!(next.current_stage(), Stage::BeforeScript);
    }

    #[test]
    fn test_current_action_unknown() {
        let result = ProgressState::new().with_current_action(install());
        assert!(matches!(result, Err(Error::ActionNotFound(cmd)) if cmd == "composer install"));
    }

    #[test]
    fn test_stages() {
        let state = ProgressState::new();
        assert!(state.stage(Stage::Install).is_empty());
        let next = state.with_stage(Stage::Install, [install()]).unwrap();
        assert!(state.stage(Stage::Install).is_empty());
        assert_eq!(next.stage(Stage::Install), &[install()]);
        assert_eq!(next.stage_named("install").unwrap(), &[install()]);
    }

    #[test]
    fn test_with_stage_sentinel() {
        let state = ProgressState::new();
        assert!(matches!(
            state.with_stage(Stage::Done, [install()]),
            Err(Error::SentinelStage(Stage::Done))
        ));
        assert!(state.with_stage(Stage::NotStartedYet, Vec::new()).is_err());
    }

    #[test]
    fn test_stage_named_unknown() {
        assert!(matches!(
            ProgressState::new().stage_named("foo.bar"),
            Err(Error::UnknownStage(_))
        ));
        assert!(ProgressState::new().stage_named("done").unwrap().is_empty());
    }

    #[test]
    fn test_stages_with_actions() {
        let state = ProgressState::new().with_stage(Stage::Install, [install()]).unwrap();
        assert_eq!(state.stages_with_actions(), vec![(Stage::Install, &[install()][..])]);

        let state = state.with_stage(Stage::Install, [update()]).unwrap();
        assert_eq!(state.stages_with_actions(), vec![(Stage::Install, &[update()][..])]);
        assert_eq!(state.resolve("composer install"), None);
        assert_eq!(state.resolve("composer update"), Some((Stage::Install, 1)));
    }

    #[test]
    fn test_stage_by_action() {
        let state = ProgressState::new().with_stage(Stage::Install, [install()]).unwrap();
        assert_eq!(state.stage_by_action(&install()).unwrap(), Stage::Install);
        assert!(ProgressState::new().stage_by_action(&install()).is_err());
    }

    #[test]
    fn test_duplicate_action_last_stage_wins() {
        let state = ProgressState::new()
            .with_stage(Stage::Install, [install()])
            .unwrap()
            .with_stage(Stage::Script, [update(), install()])
            .unwrap();
        assert_eq!(state.resolve("composer install"), Some((Stage::Script, 2)));

        // re-registering install only drops entries still owned by install
        let state = state.with_stage(Stage::Install, Vec::new()).unwrap();
        assert_eq!(state.resolve("composer install"), Some((Stage::Script, 2)));
    }

    #[test]
    fn test_current_step() {
        let state = ProgressState::new()
            .with_stage(Stage::Install, [install(), update()])
            .unwrap();
        assert_eq!(state.with_current_action(install()).unwrap().current_step(), 1);
        assert_eq!(state.with_current_action(update()).unwrap().current_step(), 2);
    }

    #[test]
    fn test_finished_keeps_action() {
        let state = ProgressState::new()
            .with_stage(Stage::Script, [Action::new("make travis")])
            .unwrap()
            .with_current_action(Action::new("make travis"))
            .unwrap();
        let done = state.finished();
        assert_eq!(done.current_stage(), Stage::Done);
        assert_eq!(done.current_action().as_str(), "make travis");
        assert_eq!(done.current_step(), 0);
        assert_eq!(state.current_stage(), Stage::Script);
    }

    #[test]
    fn test_serialize_snapshot() {
        let state = ProgressState::new()
            .with_stage(Stage::Install, [install()])
            .unwrap()
            .with_current_action(install())
            .unwrap();
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["stage"], "install");
        assert_eq!(json["action"], "composer install");
        assert_eq!(json["step"], 1);
        assert_eq!(json["summary"]["install"]["status"], "running");
        assert_eq!(json["summary"]["before_install"]["status"], "completed");
    }
}
