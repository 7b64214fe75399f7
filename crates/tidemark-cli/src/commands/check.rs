use std::path::Path;

use anyhow::Result;
use tidemark_sdk::validation::{ValidationResult, ValidationStatus};

use tidemark_engine::check_pipeline;

/// Execute the `check` command: validate pipeline config and connectivity.
pub async fn execute(pipeline_path: &Path) -> Result<()> {
    let config = super::load_pipeline(pipeline_path)?;
    println!("Pipeline structure: OK");

    let result = check_pipeline(&config).await?;

    for (name, validation) in &result.sources {
        print_validation(name, validation);
    }
    print_validation(&config.destination.use_ref, &result.destination);
    if result.state_ok {
        println!("{:18} OK", "State backend:");
    } else {
        println!("{:18} FAILED", "State backend:");
    }

    if result.is_success() {
        println!("\nAll checks passed.");
        Ok(())
    } else {
        anyhow::bail!("One or more checks failed")
    }
}

fn print_validation(label: &str, result: &ValidationResult) {
    let status = match result.status {
        ValidationStatus::Success => "OK",
        ValidationStatus::Failed => "FAILED",
        ValidationStatus::Warning => "WARNING",
    };
    println!("{:18} {}", format!("{label}:"), status);
    if !result.message.is_empty() {
        println!("  {}", result.message);
    }
}
