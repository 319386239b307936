use std::process::ExitCode;

use log::{error, info};
use survey_harmonizer::utils::logging::console::print_column_differences;
use survey_harmonizer::{PipelineConfig, PipelineError, run_pull};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = PipelineConfig::from_env()?;
    info!("Project data directory: {}", config.data_dir.display());

    match run_pull(&config).await {
        Ok(summary) => {
            for (cohort, rows) in &summary.row_counts {
                info!("{cohort}: {rows} rows");
            }
            info!(
                "Pull complete: {} dictionary entries, {} cohort(s) failed",
                summary.dictionary_entries,
                summary.fetch.failures().len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(PipelineError::ColumnMismatch(mismatch)) => {
            print_column_differences(&mismatch);
            error!("Harmonization halted: cohort column sets differ");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}
