//! `luna chat`: the interactive loop.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use super::AppContext;
use crate::core::session::ChatSession;
use crate::error::Result;
use crate::render::TerminalTarget;
use crate::render::status::render_status_board;
use crate::util::env::stdout_is_tty;

/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input<'a> {
    Quit,
    Stop,
    Status,
    /// Enter on an empty line.
    Empty,
    Message(&'a str),
}

impl<'a> Input<'a> {
    #[must_use]
    pub fn parse(line: &'a str) -> Self {
        match line.trim() {
            "/quit" | "/exit" => Self::Quit,
            "/stop" => Self::Stop,
            "/status" => Self::Status,
            "" => Self::Empty,
            text => Self::Message(text),
        }
    }
}

/// Run the chat loop until `/quit` or end of input.
///
/// At end of input the last reply is allowed to finish rendering.
///
/// # Errors
/// Returns error if the session cannot be built or stdin fails.
pub async fn execute(ctx: &AppContext) -> Result<()> {
    let color = ctx.color();
    let target = Arc::new(TerminalTarget::new(color, stdout_is_tty()));
    let session = ChatSession::new(
        &ctx.config,
        Arc::clone(&ctx.registry),
        Arc::clone(&ctx.credentials),
        target,
    )?;

    println!("Luna is listening. Type a message, /stop, /status or /quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending = None;
    let mut quit = false;
    while let Some(line) = lines.next_line().await? {
        match Input::parse(&line) {
            Input::Quit => {
                quit = true;
                break;
            }
            // Enter on an empty line doubles as stop.
            Input::Stop | Input::Empty => session.stop(),
            Input::Status => print!(
                "{}",
                render_status_board(&session.status_board(), session.registry(), !color)
            ),
            Input::Message(text) => {
                pending = Some(session.send_message(text));
            }
        }
    }

    if quit {
        session.stop();
        if let Some(handle) = pending {
            handle.abort();
        }
        return Ok(());
    }

    // End of input: let the last reply finish.
    if let Some(handle) = pending {
        let _ = handle.await;
    }
    if let Some(live) = session.renderer().live() {
        live.wait().await;
    }
    Ok(())
}
