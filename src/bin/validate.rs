use std::process::ExitCode;

use log::{info, warn};
use survey_harmonizer::utils::logging::console::print_validation_report;
use survey_harmonizer::{PipelineConfig, run_validate};

fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = PipelineConfig::from_env()?;
    let report = run_validate(&config)?;
    print_validation_report(&report);

    if report.is_clean() {
        info!("Combined data is consistent with the dictionary");
        return Ok(ExitCode::SUCCESS);
    }
    if config.strict_validation {
        warn!(
            "{} finding(s) and SURVEY_STRICT_VALIDATION is set",
            report.findings.len()
        );
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
