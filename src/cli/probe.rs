//! `luna probe`: probe every provider once and print the result.

use super::AppContext;
use super::args::ProbeArgs;
use crate::core::availability::{AvailabilitySnapshot, Prober};
use crate::core::http::ProviderClient;
use crate::error::Result;
use crate::render::status::{render_probe_json, render_probe_table};

/// Execute the probe command.
///
/// # Errors
/// Returns error if the HTTP client cannot be built or JSON output fails.
pub async fn execute(ctx: &AppContext, args: &ProbeArgs) -> Result<()> {
    let prober = Prober::new(ProviderClient::new()?, ctx.config.probe_timeout);
    let results = prober.probe_all(&ctx.registry, &ctx.credentials).await;
    let snapshot = AvailabilitySnapshot::from_available(
        results
            .iter()
            .filter(|r| r.available)
            .map(|r| r.provider.clone()),
    );
    tracing::debug!(available = snapshot.len(), "Probe finished");

    if args.json {
        println!("{}", render_probe_json(&results, &snapshot)?);
    } else {
        print!(
            "{}",
            render_probe_table(&ctx.registry, &results, &snapshot, !ctx.color())
        );
    }
    Ok(())
}
