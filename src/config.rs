use crate::action::Action;
use crate::segmenter::Framing;
use crate::stage::Stage;
use crate::state::ProgressState;
use crate::ui::RenderFormat;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

/// Actions configured for a stage: one command or an ordered list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionValue {
    One(String),
    Many(Vec<String>),
}

impl ActionValue {
    pub fn into_actions(self) -> Vec<Action> {
        match self {
            ActionValue::One(command) => vec![Action::new(command)],
            ActionValue::Many(commands) => commands.into_iter().map(Action::new).collect(),
        }
    }

    /// Read a YAML value the way Travis does: a string, a list of strings,
    /// or a boolean/null meaning "nothing to run"
    fn from_yaml(stage: &str, value: &Value) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidActions {
            stage: stage.to_string(),
            reason,
        };

        match value {
            Value::String(command) => Ok(ActionValue::One(command.clone())),
            Value::Null | Value::Bool(_) => Ok(ActionValue::Many(Vec::new())),
            Value::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::String(command) => Ok(command.clone()),
                    other => Err(invalid(format!("item {} is {}, expected a string", i + 1, yaml_kind(other)))),
                })
                .collect::<Result<Vec<_>>>()
                .map(ActionValue::Many),
            other => Err(invalid(format!("expected a string or a list of strings, got {}", yaml_kind(other)))),
        }
    }
}

impl From<&str> for ActionValue {
    fn from(command: &str) -> Self {
        ActionValue::One(command.to_string())
    }
}

impl From<String> for ActionValue {
    fn from(command: String) -> Self {
        ActionValue::One(command)
    }
}

impl From<Vec<&str>> for ActionValue {
    fn from(commands: Vec<&str>) -> Self {
        ActionValue::Many(commands.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for ActionValue {
    fn from(commands: Vec<String>) -> Self {
        ActionValue::Many(commands)
    }
}

fn yaml_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Lifecycle hooks Travis knows about but that are not tracked as stages
const UNTRACKED_HOOKS: &[&str] = &["before_deploy", "after_deploy"];

/// A `before_*`/`after_*` key that is not a stage is most likely a typo
fn looks_like_stage(key: &str) -> bool {
    (key.starts_with("before_") || key.starts_with("after_"))
        && !UNTRACKED_HOOKS.contains(&key)
        && key.parse::<Stage>().is_err()
}

/// Stages and actions of a build, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfig {
    stages: Vec<(Stage, Vec<Action>)>,
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the actions of a stage given by name.
    ///
    /// Unknown stage names are rejected, and so are actions on the
    /// `not_started_yet`/`done` sentinels.
    pub fn with_stage(mut self, name: &str, value: impl Into<ActionValue>) -> Result<Self> {
        let stage: Stage = name.parse()?;
        let actions = value.into().into_actions();

        if stage.is_sentinel() {
            if actions.is_empty() {
                return Ok(self);
            }
            return Err(Error::SentinelStage(stage));
        }

        self.stages.push((stage, actions));
        Ok(self)
    }

    /// Read the stages of a `.travis.yml` document.
    ///
    /// Top-level keys that are not stage names (`language`, `env`, ...)
    /// are regular Travis settings and are skipped.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let mapping = match serde_yaml::from_str::<Value>(contents)? {
            Value::Mapping(mapping) => mapping,
            Value::Null => return Ok(Self::new()),
            other => {
                return Err(Error::Config(format!(
                    "build configuration must be a mapping, got {}",
                    yaml_kind(&other)
                )))
            }
        };

        let mut config = Self::new();
        for (key, value) in &mapping {
            let Some(name) = key.as_str() else {
                tracing::debug!(?key, "Skipping non-string configuration key");
                continue;
            };
            if name.parse::<Stage>().is_err() {
                if looks_like_stage(name) {
                    tracing::warn!(key = name, "Skipping unknown stage; check the spelling");
                } else {
                    tracing::debug!(key = name, "Skipping non-stage configuration key");
                }
                continue;
            }
            config = config.with_stage(name, ActionValue::from_yaml(name, value)?)?;
        }
        Ok(config)
    }

    /// Read a mapping in which every key must be a stage name
    pub fn from_stage_map(contents: &str) -> Result<Self> {
        let mapping: serde_yaml::Mapping = serde_yaml::from_str(contents)?;

        let mut config = Self::new();
        for (key, value) in &mapping {
            let name = key
                .as_str()
                .ok_or_else(|| Error::Config(format!("stage name must be a string, got {}", yaml_kind(key))))?;
            config = config.with_stage(name, ActionValue::from_yaml(name, value)?)?;
        }
        Ok(config)
    }

    /// Load a `.travis.yml` from disk
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn stages(&self) -> &[(Stage, Vec<Action>)] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The `not_started_yet` state with every configured stage registered,
    /// in configuration order
    pub fn initial_state(&self) -> Result<ProgressState> {
        self.stages
            .iter()
            .try_fold(ProgressState::new(), |state, (stage, actions)| {
                state.with_stage(*stage, actions.iter().cloned())
            })
    }
}

/// Settings of the command line tool, read from `travis-log-parser.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    /// Path to the build configuration
    pub travis_config: Option<String>,
    pub framing: Option<Framing>,
    pub format: Option<RenderFormat>,
    /// Pause after each redraw, to follow a replayed log
    pub redraw_delay_ms: Option<u64>,
}

impl AppConfig {
    /// Settings written by `init`
    pub fn starter() -> Self {
        Self {
            travis_config: Some(default_travis_config_path().to_string_lossy().into_owned()),
            framing: Some(Framing::default()),
            format: Some(RenderFormat::default()),
            redraw_delay_ms: Some(0),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("travis-log-parser.toml")
}

pub fn default_travis_config_path() -> PathBuf {
    PathBuf::from(".travis.yml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<AppConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: AppConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &AppConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}
