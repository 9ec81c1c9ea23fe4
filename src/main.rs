use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};

mod config;
mod dates;
mod matrix;
mod models;
mod notion;
mod repo;
mod report;
mod run;
mod sheet;

use config::{NotionConfig, RunConfig};
use run::RunOutcome;
use sheet::OutputFormat;

#[derive(Parser)]
#[command(name = "ywt-grass-map")]
#[command(about = "Member x date YWT activity matrix built from Notion databases", long_about = None)]
struct Cli {
    #[command(flatten)]
    range: RangeArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct NotionArgs {
    #[arg(long, env = "TOKEN_YWT_GRASS_MAP", hide_env_values = true)]
    token: String,
    #[arg(long, env = "DATABASE_ID_YWT")]
    ywt_database_id: String,
    #[arg(long, env = "DATABASE_ID_MEMBER")]
    member_database_id: String,
    #[arg(long, env = "NOTION_API_BASE", default_value = config::DEFAULT_API_BASE)]
    api_base: String,
    #[arg(long, default_value = config::DEFAULT_NOTION_VERSION)]
    notion_version: String,
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,
}

impl From<NotionArgs> for NotionConfig {
    fn from(args: NotionArgs) -> Self {
        NotionConfig {
            api_base: args.api_base,
            token: args.token,
            notion_version: args.notion_version,
            ywt_database_id: args.ywt_database_id,
            member_database_id: args.member_database_id,
            request_timeout_ms: args.timeout_ms,
        }
    }
}

#[derive(Args)]
struct RangeArgs {
    #[arg(long, global = true, default_value = config::DEFAULT_TIMEZONE)]
    timezone: String,
    /// Oldest day shown; also the created-time floor for logs
    #[arg(long, global = true, default_value_t = config::default_floor())]
    since: NaiveDate,
    /// Cap on the number of date columns
    #[arg(long, global = true)]
    max_days: Option<usize>,
    #[arg(long, global = true, default_value = config::DEFAULT_SHEET_NAME)]
    expected_sheet: String,
}

impl RangeArgs {
    fn into_config(self) -> anyhow::Result<RunConfig> {
        RunConfig::new(&self.timezone, self.since, self.max_days, self.expected_sheet)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the YWT map and write it to a sheet file
    Refresh {
        #[command(flatten)]
        notion: NotionArgs,
        /// Name of the sheet being refreshed
        #[arg(long, default_value = config::DEFAULT_SHEET_NAME)]
        sheet: String,
        #[arg(long, default_value = "ywt-map.csv")]
        out: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
    },
    /// Print members ranked by total score
    Score {
        #[command(flatten)]
        notion: NotionArgs,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Print the date columns that would be generated
    Dates,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let run_config = cli.range.into_config()?;

    match cli.command {
        Commands::Refresh {
            notion,
            sheet,
            out,
            format,
        } => {
            let notion = NotionConfig::from(notion);
            match run::refresh(&notion, &run_config, &sheet, out, format, Utc::now()).await? {
                RunOutcome::Written {
                    members,
                    dates,
                    out,
                } => {
                    println!(
                        "Wrote {members} members across {dates} days to {}.",
                        out.display()
                    );
                }
                RunOutcome::WrongSheet { expected, actual } => {
                    eprintln!("Run this on the sheet \"{expected}\" (got \"{actual}\").");
                }
            }
        }
        Commands::Score {
            notion,
            limit,
            json,
        } => {
            let notion = NotionConfig::from(notion);
            let (matrix, scores) = run::score(&notion, &run_config).await?;
            if json {
                let top: Vec<_> = scores.into_iter().take(limit).collect();
                println!("{}", serde_json::to_string_pretty(&top)?);
            } else {
                print!("{}", report::build_summary(&matrix, limit));
            }
        }
        Commands::Dates => {
            let today = dates::today_in(Utc::now(), run_config.timezone);
            for key in dates::date_range(today, run_config.floor, run_config.max_days) {
                println!("{key}");
            }
        }
    }

    Ok(())
}
