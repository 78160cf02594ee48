//! Terminal output: the typing target, provider tables and error display.

pub mod error;
pub mod status;
pub mod terminal;

pub use error::render_error;
pub use status::{render_probe_json, render_probe_table, render_providers, render_status_board};
pub use terminal::TerminalTarget;
