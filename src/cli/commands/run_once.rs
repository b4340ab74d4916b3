//! Single analysis pass.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use tokio_util::sync::CancellationToken;

/// Run one pass over all created sermons and print the report.
pub async fn run_once(settings: Settings) -> anyhow::Result<()> {
    preflight::check(Operation::Analyze, &settings)?;

    let orchestrator = Orchestrator::new(&settings)?;
    let spinner = Output::spinner("Analyzing sermons...");
    let report = orchestrator.run_pass(&CancellationToken::new()).await;
    spinner.finish_and_clear();

    Output::header("Analysis Pass");
    Output::pass_report(&report);
    if report.failed > 0 {
        Output::warning(&format!(
            "{} sermon(s) failed. Inspect with 'sermon-analysis list --status error'.",
            report.failed
        ));
    }

    Ok(())
}
