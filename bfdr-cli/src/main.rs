use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use bfdr_collect::{Collector, HttpTransport};
use bfdr_core::{records_from_identifiers, BirthRecord, ExtractionConfig};
use bfdr_fhir::{records_from_str, write_csv, COLUMNS};
use clap::{Args, Parser, Subcommand};
use tracing::info;

mod config;
mod logging;

use config::{FileConfig, Overrides};
use logging::{init_logging, LogConfig, LogFormat};

#[derive(Parser, Debug)]
#[command(
    name = "bfdr",
    about = "Derive birth/fetal-death registration fields from FHIR data and export them as CSV."
)]
struct Cli {
    /// TOML file with [extraction] and [server] tables.
    #[arg(long, global = true, env = "BFDR_CONFIG")]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Project saved birth records to CSV.
    Export {
        /// JSON array of birth records.
        #[arg(short, long)]
        records: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
        #[command(flatten)]
        extraction: ExtractionArgs,
    },
    /// Fetch records from a FHIR server, then export them.
    Collect {
        #[arg(long, env = "BFDR_SERVER")]
        server: Option<String>,
        #[arg(long, env = "BFDR_TOKEN", hide_env_values = true)]
        token: Option<String>,
        #[arg(long, env = "BFDR_CHILD_IDENTIFIER_SYSTEM")]
        child_identifier_system: Option<String>,
        /// Child MRNs separated by commas or newlines.
        #[arg(long, conflicts_with = "mrn_file", required_unless_present = "mrn_file")]
        mrns: Option<String>,
        #[arg(long)]
        mrn_file: Option<PathBuf>,
        /// Also write the collected records as JSON.
        #[arg(long)]
        save_records: Option<PathBuf>,
        #[command(flatten)]
        out: OutputArgs,
        #[command(flatten)]
        extraction: ExtractionArgs,
    },
    /// Print the CSV column labels, one per line.
    Columns,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// CSV destination; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ExtractionArgs {
    /// Months before delivery counted as the pregnancy.
    #[arg(long)]
    pregnancy_horizon_months: Option<u32>,
    /// Leave out the "(from ...)" suffixes.
    #[arg(long)]
    no_annotations: bool,
}

impl ExtractionArgs {
    fn into_overrides(self) -> Overrides {
        Overrides {
            pregnancy_horizon_months: self.pregnancy_horizon_months,
            no_annotations: self.no_annotations,
            ..Overrides::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig::from_verbosity(cli.verbose, cli.log_format));
    let file = FileConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Export {
            records,
            out,
            extraction,
        } => {
            let cfg = file.apply(extraction.into_overrides());
            let text = fs::read_to_string(&records)
                .with_context(|| format!("Cannot read records file {}", records.display()))?;
            let records = records_from_str(&text)
                .with_context(|| format!("Cannot parse records in {}", records.display()))?;
            write_output(&records, &cfg.extraction, out.output.as_deref())
        }
        Command::Collect {
            server,
            token,
            child_identifier_system,
            mrns,
            mrn_file,
            save_records,
            out,
            extraction,
        } => {
            let cfg = file.apply(Overrides {
                server,
                token,
                child_identifier_system,
                ..extraction.into_overrides()
            });
            if cfg.server.base_url.trim().is_empty() {
                bail!("No FHIR server configured. Use --server, BFDR_SERVER or [server] base_url");
            }

            let identifiers = match (mrns, mrn_file) {
                (Some(list), _) => list,
                (None, Some(path)) => fs::read_to_string(&path)
                    .with_context(|| format!("Cannot read MRN file {}", path.display()))?,
                (None, None) => bail!("Either --mrns or --mrn-file is required"),
            };
            let mut records = records_from_identifiers(&identifiers);
            if records.is_empty() {
                bail!("No child MRNs given");
            }

            let collector = Collector::new(HttpTransport::new(&cfg.server), &cfg.server);
            let summary = collector
                .process_selected(&mut records)
                .await
                .context("Collection stopped")?;
            info!(
                complete = summary.complete,
                errored = summary.errored,
                "collection finished"
            );

            if let Some(path) = save_records {
                let json = serde_json::to_string_pretty(&records)?;
                fs::write(&path, json)
                    .with_context(|| format!("Cannot write records to {}", path.display()))?;
            }
            write_output(&records, &cfg.extraction, out.output.as_deref())
        }
        Command::Columns => {
            let mut stdout = io::stdout().lock();
            for column in COLUMNS {
                writeln!(stdout, "{}", column.label)?;
            }
            Ok(())
        }
    }
}

fn write_output(
    records: &[BirthRecord],
    config: &ExtractionConfig,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let rows = match output {
        Some(path) => {
            let file = fs::File::create(path)
                .with_context(|| format!("Cannot create {}", path.display()))?;
            write_csv(records, config, file)?
        }
        None => write_csv(records, config, io::stdout().lock())?,
    };
    info!(rows, "CSV written");
    Ok(())
}
