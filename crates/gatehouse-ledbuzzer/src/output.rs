//! Delegate module serving level commands against a GPIO line.

use gatehouse_core::{LineId, Result};
use gatehouse_gpio::LineManager;
use gatehouse_module::channel::Frames;
use gatehouse_module::command::{Command, error_reply, reply};
use gatehouse_module::module::DeviceModule;
use std::sync::Arc;
use tracing::warn;

/// Exposes one output line on the command channel.
///
/// Serves ON, OFF, TOGGLE and STATE directly against the line; BLINK is
/// the blink controller's job and gets an error reply here.
pub struct LineOutput {
    name: String,
    manager: Arc<LineManager>,
    line: LineId,
}

impl LineOutput {
    /// Create the module, instantiating the line if needed.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if the line cannot be opened.
    pub fn new(
        name: impl Into<String>,
        manager: Arc<LineManager>,
        line: LineId,
    ) -> Result<Self> {
        manager.line(line)?;
        Ok(Self {
            name: name.into(),
            manager,
            line,
        })
    }

    fn serve(&self, command: Command) -> Result<Frames> {
        match command {
            Command::State => {
                let level = self.manager.level(self.line)?;
                Ok(vec![
                    if level { reply::ON } else { reply::OFF }.to_string(),
                ])
            }
            Command::On => {
                self.manager.set_level(self.line, true)?;
                Ok(vec![reply::OK.to_string()])
            }
            Command::Off => {
                self.manager.set_level(self.line, false)?;
                Ok(vec![reply::OK.to_string()])
            }
            Command::Toggle => {
                self.manager.toggle(self.line)?;
                Ok(vec![reply::OK.to_string()])
            }
            Command::Blink { .. } => {
                Ok(error_reply("BLINK is not served by line outputs"))
            }
        }
    }
}

impl DeviceModule for LineOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&mut self, frames: &[String]) -> Frames {
        let served = Command::parse(frames).and_then(|command| self.serve(command));
        served.unwrap_or_else(|e| {
            warn!(module = %self.name, error = %e, "rejecting command");
            error_reply(e.to_string())
        })
    }
}
