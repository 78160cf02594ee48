//! Render target that writes the reply to a terminal.

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use colored::Colorize;
use tokio_util::sync::CancellationToken;

use super::status::{THINKING_INTERVAL, thinking_frame};
use crate::core::renderer::RenderTarget;

/// Writes revealed characters to stdout as they arrive.
///
/// When `animate` is set the thinking indicator is drawn and erased in
/// place; otherwise nothing is written while a message is pending.
#[derive(Debug)]
pub struct TerminalTarget {
    color: bool,
    animate: bool,
    indicator: Mutex<Option<CancellationToken>>,
}

impl TerminalTarget {
    #[must_use]
    pub const fn new(color: bool, animate: bool) -> Self {
        Self {
            color,
            animate,
            indicator: Mutex::new(None),
        }
    }

    fn indicator(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.indicator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, text: &str) {
        write_stdout(text);
    }
}

fn write_stdout(text: &str) {
    write_flushed(&mut io::stdout().lock(), text);
}

/// Write and flush `text`. Failures are logged at debug, never raised.
fn write_flushed(out: &mut impl Write, text: &str) -> bool {
    match out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(error = %e, "stdout write failed");
            false
        }
    }
}

impl RenderTarget for TerminalTarget {
    fn begin(&self, _generation: u64) {
        let label = if self.color {
            "Luna: ".magenta().bold().to_string()
        } else {
            "Luna: ".to_string()
        };
        self.write(&label);
    }

    fn reveal(&self, _generation: u64, ch: char) {
        let mut buf = [0u8; 4];
        self.write(ch.encode_utf8(&mut buf));
    }

    fn seal(&self, _generation: u64, marker: &str) {
        let marker = if self.color {
            marker.dimmed().to_string()
        } else {
            marker.to_string()
        };
        self.write(&format!("{marker}\n"));
    }

    fn finish(&self, _generation: u64) {
        self.write("\n");
    }

    fn thinking(&self, active: bool) {
        if !self.animate {
            return;
        }
        let mut slot = self.indicator();
        if let Some(token) = slot.take() {
            token.cancel();
            // Erase the indicator line.
            self.write("\r\x1b[2K");
        }
        if !active {
            return;
        }

        let token = CancellationToken::new();
        *slot = Some(token.clone());
        drop(slot);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(THINKING_INTERVAL);
            let mut tick = 0usize;
            loop {
                tokio::select! {
                    () = token.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                write_stdout(&format!("\r\x1b[2K{}", thinking_frame(tick).dimmed()));
                tick += 1;
            }
        });
    }
}
