use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use case_review_report::cases::{CaseSource, InMemoryCaseSource};
use case_review_report::config::AppConfig;
use case_review_report::mysql::MySqlCaseSource;
use case_review_report::report::{ReportGenerator, NO_DATA_MESSAGE};
use case_review_report::web::{self, FrontEnd};
use case_review_report::Result;
use clap::{Parser, Subcommand};

/// Generates quarterly case-review slide decks.
///
/// Settings are read from `case-review.toml` (or `--config`) and may be
/// overridden with the `DB_HOST`, `DB_USER`, `DB_PASSWORD`, `DB_NAME` and
/// `FACILITY_LIST` environment variables.  The slide template is looked up
/// through `CASE_REVIEW_TEMPLATE`, `template_path`, then `assets/template.pptx`.
#[derive(Parser)]
#[command(author, version, about = "Quarterly case review report generator")]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the previous-quarter report for one facility.
    Generate {
        /// Facility name, or part of it.
        #[arg(long)]
        facility: String,

        /// Read case records from a JSON file instead of the database.
        #[arg(long)]
        records: Option<PathBuf>,
    },

    /// Serve the report form over HTTP.
    Serve {
        /// Address to listen on, overriding `bind` from the configuration.
        #[arg(long)]
        bind: Option<String>,

        /// Read case records from a JSON file instead of the database.
        #[arg(long)]
        records: Option<PathBuf>,
    },

    /// List the configured facilities.
    #[command(aliases = ["list"])]
    Facilities,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        print_error_sources(&err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    log::debug!("Effective configuration: {:?}", config);

    match cli.command {
        Commands::Generate { facility, records } => {
            let generator = ReportGenerator::from_config(&config, case_source(&config, records)?)?;
            match generator.generate(&facility).await? {
                Some(report) => println!("{}", report.path.display()),
                None => eprintln!("Warning: {}", NO_DATA_MESSAGE),
            }
        }
        Commands::Serve { bind, records } => {
            config.validate_facilities()?;
            let generator = ReportGenerator::from_config(&config, case_source(&config, records)?)?;
            let bind = bind.unwrap_or_else(|| config.bind.clone());
            web::serve(FrontEnd::new(generator, config.facilities.clone()), &bind).await?;
        }
        Commands::Facilities => {
            config.validate_facilities()?;
            for facility in &config.facilities {
                println!("{}", facility);
            }
        }
    }
    Ok(())
}

fn case_source(config: &AppConfig, records: Option<PathBuf>) -> Result<Arc<dyn CaseSource>> {
    match records {
        Some(path) => Ok(Arc::new(InMemoryCaseSource::from_json_file(&path)?)),
        None => {
            config.validate_database()?;
            Ok(Arc::new(MySqlCaseSource::new(config.database.clone())))
        }
    }
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
