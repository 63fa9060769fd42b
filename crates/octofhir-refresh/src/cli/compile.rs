//! Compile command implementation

use super::output;
use anyhow::{Context, Result};
use octofhir_refresh_compiler::{CqlCompiler, LogicCompiler};
use octofhir_refresh_model::Encoding;
use std::path::PathBuf;

/// Configuration for compile command
pub struct CompileConfig {
    pub file: PathBuf,
    pub format: Encoding,
    pub library_paths: Vec<PathBuf>,
    pub output_file: Option<PathBuf>,
}

/// Compile one CQL file to ELM
pub async fn compile(config: CompileConfig) -> Result<()> {
    let mut include_paths = config.library_paths;
    if let Some(parent) = config.file.parent().filter(|p| !p.as_os_str().is_empty()) {
        include_paths.push(parent.to_path_buf());
    }

    let unit = match CqlCompiler::new().compile(&config.file, &include_paths) {
        Ok(unit) => unit,
        Err(failure) => {
            for diagnostic in &failure.diagnostics {
                eprintln!("{}", diagnostic.render_colored());
            }
            return Err(failure)
                .with_context(|| format!("Failed to compile {}", config.file.display()));
        }
    };

    output::write_output(unit.elm(config.format), config.output_file.as_deref())
}
