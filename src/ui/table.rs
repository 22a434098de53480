use crate::state::ProgressState;
use crate::ui::{theme, Icons, Renderer};
use owo_colors::OwoColorize;
use std::fmt::Display;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct StageRow {
    #[tabled(rename = "")]
    pub marker: &'static str,
    #[tabled(rename = "Stage")]
    pub stage: String,
    #[tabled(rename = "Step")]
    pub step: String,
    #[tabled(rename = "Status")]
    pub status: String,
}

#[derive(Tabled)]
pub struct ActionRow {
    #[tabled(rename = "Stage")]
    pub stage: String,
    #[tabled(rename = "#")]
    pub position: usize,
    #[tabled(rename = "Action")]
    pub action: String,
}

/// The per-stage summary of a snapshot as a table
pub fn progress_table(state: &ProgressState) -> String {
    let rows: Vec<StageRow> = state
        .summary()
        .iter()
        .map(|(stage, row)| StageRow {
            marker: Icons::status_marker(row.status),
            stage: stage.to_string(),
            step: format!("{}/{}", row.step, row.steps),
            status: row.status.to_string(),
        })
        .collect();

    Table::new(&rows).with(Style::rounded()).to_string()
}

/// Every configured action, stage by stage
pub fn plan_table(state: &ProgressState) -> String {
    let rows: Vec<ActionRow> = state
        .stages_with_actions()
        .into_iter()
        .flat_map(|(stage, actions)| {
            actions.iter().enumerate().map(move |(i, action)| ActionRow {
                stage: stage.to_string(),
                position: i + 1,
                action: action.to_string(),
            })
        })
        .collect();

    if rows.is_empty() {
        return String::new();
    }

    Table::new(&rows).with(Style::rounded()).to_string()
}

/// Redraws the progress table for every snapshot.
///
/// On a terminal the previous table is cleared first so the table updates
/// in place; otherwise every snapshot is appended.
pub struct TableRenderer {
    term: console::Term,
    in_place: bool,
    drawn_lines: usize,
}

impl TableRenderer {
    pub fn new() -> Self {
        let term = console::Term::stdout();
        let in_place = term.is_term();
        Self {
            term,
            in_place,
            drawn_lines: 0,
        }
    }

    fn draw(&mut self, text: &str) -> std::io::Result<()> {
        if self.in_place && self.drawn_lines > 0 {
            self.term.clear_last_lines(self.drawn_lines)?;
        }
        self.term.write_line(text)?;
        self.drawn_lines = text.lines().count();
        Ok(())
    }
}

impl Default for TableRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for TableRenderer {
    fn snapshot(&mut self, state: &ProgressState) -> anyhow::Result<()> {
        let action = if state.current_action().is_empty() {
            "-".style(theme().muted.clone()).to_string()
        } else {
            state.current_action().style(theme().info.clone()).to_string()
        };
        let status = theme().status(state.summary().get(state.current_stage()).status);
        let text = format!(
            "{}\n{} {}  {} {}",
            progress_table(state),
            Icons::GEAR,
            state.current_stage().style(status),
            Icons::FILE,
            action
        );
        self.draw(&text)?;
        Ok(())
    }

    fn failed(&mut self, error: &dyn Display) {
        crate::ui::error(&format!("Log stream failed: {}", error));
    }

    fn finished(&mut self) {
        println!("Done!");
    }
}
