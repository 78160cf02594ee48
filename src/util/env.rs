//! Terminal detection.

use std::io::IsTerminal;

use crate::storage::config::ENV_NO_COLOR_STD;

#[must_use]
pub fn stdout_is_tty() -> bool {
    std::io::stdout().is_terminal()
}

#[must_use]
pub fn stderr_is_tty() -> bool {
    std::io::stderr().is_terminal()
}

/// Whether output may carry ANSI colors.
///
/// `--no-color`, `NO_COLOR` and `TERM=dumb` all disable color, as does a
/// stdout that is not a terminal.
#[must_use]
pub fn should_use_color(no_color_flag: bool) -> bool {
    if no_color_flag || std::env::var_os(ENV_NO_COLOR_STD).is_some() {
        return false;
    }
    if std::env::var("TERM").is_ok_and(|t| t == "dumb") {
        return false;
    }
    stdout_is_tty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_disables_color() {
        assert!(!should_use_color(true));
    }
}
