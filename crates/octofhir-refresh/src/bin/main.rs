//! Knowledge artifact refresh command-line interface

use clap::{Parser, Subcommand};
use octofhir_refresh::cli::{compile, logging, output, refresh};
use octofhir_refresh::model::Encoding;
use std::path::PathBuf;

/// Refresh and bundle FHIR knowledge artifacts from CQL logic
#[derive(Parser)]
#[command(name = "cqf-refresh")]
#[command(author, version, about = "Refresh and bundle FHIR knowledge artifacts", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh every library, measure and plan definition and write their bundles
    Refresh {
        /// Implementation guide root (default: current directory)
        root: Option<PathBuf>,

        /// Configuration file (default: <root>/refresh.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Encoding of written resources and bundles (json, xml)
        #[arg(short, long)]
        encoding: Option<Encoding>,

        /// Encoding of the ELM attachment (json, xml)
        #[arg(long)]
        elm_format: Option<Encoding>,

        /// Leave value sets and code systems out of bundles
        #[arg(long)]
        no_terminology: bool,

        /// Bundle library dependencies transitively
        #[arg(short = 'd', long)]
        include_dependencies: bool,

        /// Bundle test fixtures
        #[arg(short = 't', long)]
        include_tests: bool,

        /// Append versions to generated ids and file names
        #[arg(long)]
        versioned: bool,

        /// FHIR version of the guide (e.g. 4.0.1)
        #[arg(long)]
        fhir_version: Option<String>,

        /// Base url for generated canonicals
        #[arg(long)]
        canonical_base: Option<String>,

        /// FHIR server to publish bundles to
        #[arg(short, long)]
        publish_url: Option<String>,

        /// Number of worker threads
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Stop starting new artifacts after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Compile a CQL file to ELM
    Compile {
        /// CQL file to compile
        file: PathBuf,

        /// ELM format (json, xml)
        #[arg(short = 'F', long = "format", default_value = "json")]
        elm_format: Encoding,

        /// Library search paths
        #[arg(short = 'L', long = "library-path")]
        library_paths: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Refresh {
            root,
            config,
            encoding,
            elm_format,
            no_terminology,
            include_dependencies,
            include_tests,
            versioned,
            fhir_version,
            canonical_base,
            publish_url,
            jobs,
            timeout,
        } => {
            let args = refresh::RefreshArgs {
                root,
                config_file: config,
                encoding,
                elm_format,
                no_terminology,
                include_dependencies,
                include_tests,
                versioned,
                fhir_version,
                canonical_base,
                publish_url,
                jobs,
                timeout_secs: timeout,
                output_file: cli.output.clone(),
            };
            refresh::refresh(args).await
        }

        Commands::Compile {
            file,
            elm_format,
            library_paths,
        } => {
            let config = compile::CompileConfig {
                file,
                format: elm_format,
                library_paths,
                output_file: cli.output.clone(),
            };
            compile::compile(config).await
        }
    };

    if let Err(e) = result {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}
