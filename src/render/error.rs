//! Error output on stderr.
//!
//! The conversation itself only ever shows [`LunaError::user_notice`]; this
//! module renders the detailed form for command failures, with the fix
//! suggestions attached to each error.

use colored::Colorize;
use serde::Serialize;

use crate::error::{FixSuggestion, LunaError};

// =============================================================================
// Public API
// =============================================================================

/// Render an error for stderr.
///
/// `json` selects the machine-readable shape; otherwise colored text is used
/// unless `no_color` is set.
#[must_use]
pub fn render_error(error: &LunaError, json: bool, no_color: bool) -> String {
    if json {
        return render_error_json(error);
    }
    if no_color {
        render_simple(error)
    } else {
        render_colored(error)
    }
}

/// Single-object JSON form.
#[must_use]
pub fn render_error_json(error: &LunaError) -> String {
    serde_json::to_string(&ErrorJson::from_error(error)).unwrap_or_else(|_| render_simple(error))
}

// =============================================================================
// Text Rendering
// =============================================================================

fn render_colored(error: &LunaError) -> String {
    let suggestions = error.fix_suggestions();
    let mut lines = vec![format!(
        "{} {}",
        error.to_string().red().bold(),
        format!("[{}]", error.error_code()).dimmed()
    )];

    if !suggestions.is_empty() {
        lines.push(String::new());
        lines.push("How to fix:".bold().to_string());
        lines.extend(command_lines(&suggestions, |cmd| cmd.cyan().to_string()));
    }

    if let Some(first) = suggestions.first() {
        if !first.context.is_empty() {
            lines.push(String::new());
            lines.push("Why this happened:".yellow().to_string());
            lines.extend(wrap_text(&first.context, 68).into_iter().map(|l| format!("  {l}")));
        }
        if let Some(prevention) = &first.prevention {
            lines.push(String::new());
            lines.push("Prevention:".green().to_string());
            lines.extend(wrap_text(prevention, 68).into_iter().map(|l| format!("  {l}")));
        }
        if let Some(url) = &first.doc_url {
            lines.push(String::new());
            lines.push(format!("{} {}", "Docs:".dimmed(), url.underline()));
        }
    }

    lines.join("\n")
}

/// Plain text: header plus the first runnable fix.
fn render_simple(error: &LunaError) -> String {
    let mut lines = vec![format!("Error [{}]: {}", error.error_code(), error)];
    let fix = error
        .fix_suggestions()
        .into_iter()
        .flat_map(|s| s.commands)
        .find(|cmd| !cmd.starts_with('#'));
    if let Some(cmd) = fix {
        lines.push(format!("Fix: {cmd}"));
    }
    lines.join("\n")
}

fn command_lines(
    suggestions: &[FixSuggestion],
    style: impl Fn(&str) -> String,
) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, suggestion) in suggestions.iter().enumerate() {
        for (j, cmd) in suggestion.commands.iter().enumerate() {
            let prefix = if j == 0 {
                format!("  {}. ", i + 1)
            } else {
                "     Or: ".to_string()
            };
            lines.push(format!("{prefix}{}", style(cmd)));
        }
    }
    lines
}

// =============================================================================
// JSON Rendering
// =============================================================================

#[derive(Serialize)]
struct ErrorJson {
    error_code: &'static str,
    category: String,
    message: String,
    notice: String,
    is_retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    suggestions: Vec<FixSuggestion>,
}

impl ErrorJson {
    fn from_error(error: &LunaError) -> Self {
        Self {
            error_code: error.error_code(),
            category: error.category().to_string(),
            message: error.to_string(),
            notice: error.user_notice(),
            is_retryable: error.is_retryable(),
            provider: error.provider().map(String::from),
            suggestions: error.fix_suggestions(),
        }
    }
}

fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.len() + 1 + word.len() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
