//! `luna providers`: list the registry.

use super::AppContext;
use crate::render::status::render_providers;

pub fn execute(ctx: &AppContext) {
    print!("{}", render_providers(&ctx.registry, &ctx.credentials));
}
