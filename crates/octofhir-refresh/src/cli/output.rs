//! Output formatting utilities

use crate::orchestrate::{Disposition, RefreshReport};
use anyhow::{Context, Result};
use colored::*;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Format an error for display
pub fn format_error(error: &anyhow::Error) -> String {
    format!("{} {:#}", "Error:".red().bold(), error)
}

/// Format a warning for display
pub fn format_warning(warning: &str) -> String {
    format!("{} {}", "Warning:".yellow().bold(), warning)
}

/// Format a success message for display
pub fn format_success(message: &str) -> String {
    format!("{} {}", "Success:".green().bold(), message)
}

fn heading(disposition: Disposition, count: usize) -> ColoredString {
    let text = format!("{} ({})", disposition, count);
    match disposition {
        Disposition::Bundled => text.green().bold(),
        Disposition::RefreshedNotBundled => text.yellow().bold(),
        Disposition::Failed => text.red().bold(),
    }
}

/// Tri-section report, one section per disposition
pub fn format_report(report: &RefreshReport) -> String {
    let mut out = String::new();
    for disposition in Disposition::ALL {
        out.push_str(&format!("{}\n", heading(disposition, report.count(disposition))));
        for artifact in report.in_bucket(disposition) {
            out.push_str(&format!("  {} {}", artifact.kind.to_string().dimmed(), artifact.name.bold()));
            if let Some(message) = &artifact.message {
                out.push_str(&format!(": {}", message));
            }
            out.push('\n');
            for warning in &artifact.warnings {
                out.push_str(&format!("    {}\n", format_warning(warning)));
            }
            if let Some(error) = &artifact.publish_error {
                out.push_str(&format!("    {} {}\n", "Publish failed:".red(), error));
            }
        }
    }
    if let Some(elapsed) = report.elapsed() {
        out.push_str(&format!(
            "\nFinished in {}.{:03}s",
            elapsed.num_seconds(),
            elapsed.num_milliseconds() % 1000
        ));
    }
    out
}

/// Write output to a file or stdout
pub fn write_output(content: &str, output_file: Option<&Path>) -> Result<()> {
    if let Some(path) = output_file {
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write to output file: {}", path.display()))?;
        eprintln!(
            "{}",
            format_success(&format!("Output written to {}", path.display()))
        );
    } else {
        println!("{}", content);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrate::ArtifactReport;
    use chrono::Utc;
    use octofhir_refresh_model::ResourceType;

    #[test]
    fn test_report_lists_every_section() {
        colored::control::set_override(false);
        let mut report = RefreshReport::new(Utc::now());
        report.record(ArtifactReport::failed("L2", ResourceType::Library, "does not compile"));
        report.finish();

        let text = format_report(&report);
        assert!(text.contains("BUNDLED (0)"));
        assert!(text.contains("REFRESHED-NOT-BUNDLED (0)"));
        assert!(text.contains("FAILED (1)\n  Library L2: does not compile"));
        assert!(text.contains("Finished in"));
    }
}
