//! Read-dispatch-print loop.
//!
//! The loop is generic over its input so tests can script a session with
//! `tokio_test::io::Builder`. It owns the autosave pulse: started before the
//! first prompt, restarted after a config reload, stopped during shutdown.
use std::io::Write;

use anyhow::Result;
use log::{info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::pulse::AutosavePulse;
use super::{Harness, Outcome};
use crate::config::SaveOnExit;

const SAVE_PROMPT: &str = "Save before exiting? (y/n) ";

pub struct Repl {
    harness: Harness,
    pulse: AutosavePulse,
    interactive: bool,
}

impl Repl {
    pub fn new(harness: Harness) -> Self {
        Self {
            harness,
            pulse: AutosavePulse::new(),
            interactive: false,
        }
    }

    /// Print the prompt before each read. Set when stdin is a terminal.
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn harness(&self) -> &Harness {
        &self.harness
    }

    pub fn pulse(&self) -> &AutosavePulse {
        &self.pulse
    }

    /// Start autosave if it is enabled and not already running.
    pub fn start_autosave(&mut self) -> bool {
        let autosave = &self.harness.config().autosave;
        if !autosave.enabled || self.pulse.is_running() {
            return false;
        }
        let market = self.harness.market().clone();
        match self.pulse.start(autosave.interval(), move || {
            market.save_all()?;
            Ok(())
        }) {
            Ok(()) => true,
            Err(e) => {
                warn!("Autosave not started: {}", e);
                false
            }
        }
    }

    async fn restart_autosave(&mut self) {
        self.pulse.stop().await;
        self.start_autosave();
    }

    /// Run until `stop`/`exit` or end of input.
    pub async fn run<R, W>(&mut self, mut input: R, out: &mut W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        self.start_autosave();
        info!("Harness ready, playing as {}", self.harness.session().player_name);

        loop {
            if self.interactive {
                write!(out, "{}", self.harness.config().harness.prompt)?;
                out.flush()?;
            }
            let Some(line) = read_line(&mut input).await? else {
                self.shutdown(&mut input, out, false).await?;
                break;
            };

            if self.process_line(&line, out).await? {
                self.shutdown(&mut input, out, true).await?;
                break;
            }
        }
        Ok(())
    }

    /// Dispatch one line and print its outcome. Returns true when the session should end.
    ///
    /// A config reload restarts autosave here, so the new interval and enabled flag take effect.
    pub async fn process_line<W: Write>(&mut self, line: &str, out: &mut W) -> Result<bool> {
        match self.harness.dispatch(line) {
            Outcome::Idle => {}
            Outcome::Reply(text) => writeln!(out, "{}", text)?,
            Outcome::ConfigReloaded(text) => {
                writeln!(out, "{}", text)?;
                self.restart_autosave().await;
            }
            Outcome::Error(e) => writeln!(out, "{}", e)?,
            Outcome::Exit => return Ok(true),
        }
        Ok(false)
    }

    /// Save per `save_on_exit`, stop autosave, then tell the market we are done.
    ///
    /// `may_prompt` is false at end of input, where there is nobody to answer.
    async fn shutdown<R, W>(&mut self, input: &mut R, out: &mut W, may_prompt: bool) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let save = match self.harness.config().autosave.save_on_exit {
            SaveOnExit::Always => true,
            SaveOnExit::Never => false,
            SaveOnExit::Prompt if may_prompt => {
                write!(out, "{}", SAVE_PROMPT)?;
                out.flush()?;
                read_line(input)
                    .await?
                    .map_or(false, |answer| answer.trim().to_lowercase().starts_with('y'))
            }
            SaveOnExit::Prompt => false,
        };
        if save {
            match self.harness.save() {
                Ok(()) => writeln!(out, "Saved.")?,
                Err(e) => writeln!(out, "{}", e)?,
            }
        }

        self.pulse.stop().await;
        let stats = self.pulse.stats();
        self.harness.market().with(|m| {
            m.shutdown();
            Ok(())
        })?;
        info!(
            "Harness stopped ({} autosaves, {} failed)",
            stats.completed, stats.failed
        );
        Ok(())
    }
}

async fn read_line<R: AsyncBufRead + Unpin>(input: &mut R) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}
