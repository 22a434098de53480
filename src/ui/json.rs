use crate::state::ProgressState;
use crate::ui::Renderer;
use std::fmt::Display;
use std::io::Write;

/// Writes one JSON document per snapshot, newline delimited
pub struct JsonRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for JsonRenderer<W> {
    fn snapshot(&mut self, state: &ProgressState) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.out, state)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }

    fn failed(&mut self, error: &dyn Display) {
        let event = serde_json::json!({ "error": error.to_string() });
        writeln!(self.out, "{}", event).ok();
    }

    fn finished(&mut self) {
        writeln!(self.out, "{}", serde_json::json!({ "completed": true })).ok();
    }
}
