use crate::state::ProgressState;

#[derive(Clone, Debug)]
pub enum ProgressMessage {
    Snapshot(ProgressState),
    Failed(String),
    Finished,
}
