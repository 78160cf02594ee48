//! `luna say`: one message, one reply.

use std::sync::Arc;

use super::AppContext;
use super::args::SayArgs;
use crate::core::session::ChatSession;
use crate::error::Result;
use crate::render::TerminalTarget;
use crate::util::env::stdout_is_tty;

/// Send the message, wait for the reply to finish rendering.
///
/// # Errors
/// Returns the dispatch error when no reply was produced. The user notice
/// has already been rendered by then.
pub async fn execute(ctx: &AppContext, args: &SayArgs) -> Result<()> {
    let target = Arc::new(TerminalTarget::new(ctx.color(), stdout_is_tty()));
    let session = ChatSession::new(
        &ctx.config,
        Arc::clone(&ctx.registry),
        Arc::clone(&ctx.credentials),
        target,
    )?;

    let Some(answer) = session.ask(&args.text()).await else {
        return Ok(());
    };
    answer.render.wait().await;

    if let Ok(reply) = &answer.outcome.result {
        tracing::debug!(provider = %reply.provider, model = %reply.model, "Answered");
    }
    answer.outcome.result.map(|_| ())
}
