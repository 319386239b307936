use survey_harmonizer::{PipelineConfig, ReportOptions, run_report};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = PipelineConfig::from_env()?;
    let path = run_report(&config, &ReportOptions::default())?;
    log::info!("Report written to {}", path.display());
    Ok(())
}
