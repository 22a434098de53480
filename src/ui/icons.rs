use crate::stage::StageStatus;

pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const INFO: &str = "ℹ️";
    pub const FILE: &str = "📄";
    pub const GEAR: &str = "⚙️";
    pub const PACKAGE: &str = "📦";

    /// Plain-text marker for a stage status, safe inside table cells
    pub fn status_marker(status: StageStatus) -> &'static str {
        match status {
            StageStatus::Waiting => " ",
            StageStatus::Running => ">",
            StageStatus::Completed => "*",
        }
    }
}
