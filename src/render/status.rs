//! Provider tables and the thinking indicator.

use std::fmt::Write as _;
use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

use crate::core::availability::{AvailabilitySnapshot, ProbeResult};
use crate::core::credentials::CredentialSet;
use crate::core::events::{ProviderState, StatusBoard};
use crate::core::provider::ProviderRegistry;
use crate::error::Result;

/// How often the thinking indicator advances.
pub const THINKING_INTERVAL: Duration = Duration::from_millis(500);

const THINKING_TEXT: &str = "Luna is thinking";

/// Indicator text for `tick`: the label followed by 0 to 3 dots.
#[must_use]
pub fn thinking_frame(tick: usize) -> String {
    format!("{THINKING_TEXT}{}", ".".repeat(tick % 4))
}

fn paint_state(state: ProviderState, no_color: bool) -> String {
    let label = state.label();
    if no_color {
        return label.to_string();
    }
    match state {
        ProviderState::Offline => label.red().to_string(),
        ProviderState::Available => label.green().to_string(),
        ProviderState::MostRecentlyUsed => label.cyan().bold().to_string(),
    }
}

// =============================================================================
// Probe Table
// =============================================================================

/// One row per registered provider, in preference order.
#[must_use]
pub fn render_probe_table(
    registry: &ProviderRegistry,
    results: &[ProbeResult],
    snapshot: &AvailabilitySnapshot,
    no_color: bool,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<10} {:<10} {:>8}  {}", "PROVIDER", "STATE", "MS", "NOTE");
    for descriptor in registry.ordered() {
        let result = results.iter().find(|r| r.provider == descriptor.id);
        let state = snapshot.state_of(&descriptor.id);
        // Pad before painting so ANSI codes do not skew the columns.
        let padded = format!("{:<10}", state.label());
        let painted = padded.replacen(state.label(), &paint_state(state, no_color), 1);
        let _ = writeln!(
            out,
            "{:<10} {} {:>8}  {}",
            descriptor.id,
            painted,
            result.map_or_else(String::new, |r| r.duration_ms.to_string()),
            result.and_then(|r| r.reason.as_deref()).unwrap_or(""),
        );
    }
    out
}

#[derive(Serialize)]
struct ProbeJson<'a> {
    available: Vec<&'a str>,
    results: &'a [ProbeResult],
}

/// `{"available": [...], "results": [...]}`.
///
/// # Errors
/// Returns error if serialization fails.
pub fn render_probe_json(results: &[ProbeResult], snapshot: &AvailabilitySnapshot) -> Result<String> {
    let json = ProbeJson {
        available: snapshot.available().collect(),
        results,
    };
    Ok(serde_json::to_string(&json)?)
}

// =============================================================================
// Registry and Status Board
// =============================================================================

/// The `luna providers` listing.
#[must_use]
pub fn render_providers(registry: &ProviderRegistry, credentials: &CredentialSet) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<4} {:<10} {:<16} {:<18} {:<8} {}",
        "RANK", "ID", "NAME", "FORMAT", "AUTH", "CREDENTIAL"
    );
    for d in registry.ordered() {
        let credential = match (d.requires_credential, credentials.has(&d.id)) {
            (false, _) => "not needed",
            (true, true) => "present",
            (true, false) => "missing",
        };
        let _ = writeln!(
            out,
            "{:<4} {:<10} {:<16} {:<18} {:<8} {}",
            d.complexity_rank,
            d.id,
            d.display_name,
            d.format.label(),
            d.auth.label(),
            credential
        );
    }
    out
}

/// Latest state per provider, for `/status`.
#[must_use]
pub fn render_status_board(board: &StatusBoard, registry: &ProviderRegistry, no_color: bool) -> String {
    if board.is_empty() {
        return "No provider status yet. Send a message first.\n".to_string();
    }
    let mut out = String::new();
    for descriptor in registry.ordered() {
        if let Some(state) = board.get(&descriptor.id) {
            let _ = writeln!(
                out,
                "  {:<16} {}",
                descriptor.display_name,
                paint_state(state, no_color)
            );
        }
    }
    out
}
