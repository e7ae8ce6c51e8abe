use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ponder::cli;
use ponder::config::PonderConfig;
use ponder::logs::{ActivityLog, DailyLogWriter};
use ponder::scheduler::JobKind;

#[derive(Parser)]
#[command(name = "ponder", version, about = "Autonomous second brain: reflect, research, compress")]
struct Cli {
    /// Config file (default: ~/.ponder/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one reflection cycle
    Reflect,
    /// Score recent reflections
    Evaluate {
        /// How many of the latest reflections to score
        #[arg(long)]
        days: Option<usize>,
    },
    /// Research open questions
    Research {
        /// Maximum number of questions to research
        #[arg(long)]
        max: Option<usize>,
    },
    /// Compress reflections older than N days into a long-term summary
    Compress {
        #[arg(long)]
        days: Option<u32>,
    },
    /// Run the full reflect -> decide -> research/compress loop once
    Automate,
    /// Run jobs on their intervals until the timeout or Ctrl-C
    Schedule {
        /// Job to schedule (repeatable)
        #[arg(long = "job", value_parser = parse_job)]
        jobs: Vec<JobKind>,
        /// Interval for every job, overriding the configured ones
        #[arg(long)]
        interval_hours: Option<f64>,
        /// Stop issuing triggers after this many hours
        #[arg(short = 't', long)]
        timeout_hours: Option<f64>,
        /// Fire each job once immediately
        #[arg(long)]
        run_now: bool,
    },
    /// Show insights whose topic contains the given text
    Insights {
        topic: String,
        /// Print full answers
        #[arg(long)]
        full: bool,
    },
    /// List distinct insight topics
    Topics,
    /// List (or add to) the open-question queue
    Questions {
        /// Question to add (repeatable)
        #[arg(long)]
        add: Vec<String>,
    },
    /// Show self-evaluation averages
    Metrics,
    /// Show recent automation runs
    Runs {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Ask a question with memory context
    Ask { query: String },
    /// Suggest three learning areas from the self-evaluation log
    Focus,
    /// Show the latest daily log files
    Logs {
        /// How many daily files to show
        #[arg(short, long, default_value_t = 1)]
        days: usize,
    },
    /// Summarize recent log activity with the model
    LogReflect {
        /// How many daily files to analyze
        #[arg(short, long, default_value_t = 1)]
        days: usize,
    },
    /// Index .md/.txt notes from a directory into memory
    Ingest { dir: PathBuf },
    /// Database and artifact diagnostics
    Doctor,
}

fn parse_job(s: &str) -> Result<JobKind, String> {
    s.parse()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PonderConfig::load_from(path)?,
        None => PonderConfig::load()?,
    };

    // Logs go to stderr so command output on stdout stays clean, and to the
    // daily file under the data directory.
    let filter = EnvFilter::try_new(config.log_directives()).unwrap_or_else(|_| EnvFilter::new("info"));
    let file_layer = if config.logging.file {
        match DailyLogWriter::open(ActivityLog::new(config.logs_dir())) {
            Ok(writer) => Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Err(e) => {
                eprintln!("warning: file logging disabled: {e:#}");
                None
            }
        }
    } else {
        None
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    match cli.command {
        Command::Reflect => cli::cycles::reflect(config)?,
        Command::Evaluate { days } => cli::cycles::evaluate(config, days)?,
        Command::Research { max } => cli::cycles::research(config, max)?,
        Command::Compress { days } => cli::cycles::compress(config, days)?,
        Command::Automate => cli::cycles::automate(config)?,
        Command::Schedule {
            jobs,
            interval_hours,
            timeout_hours,
            run_now,
        } => cli::schedule::schedule(
            config,
            cli::schedule::ScheduleArgs {
                jobs,
                interval_hours,
                timeout_hours,
                run_now,
            },
        )?,
        Command::Insights { topic, full } => cli::browse::insights(config, &topic, full)?,
        Command::Topics => cli::browse::topics(config)?,
        Command::Questions { add } => cli::browse::questions(config, &add)?,
        Command::Metrics => cli::browse::metrics(config)?,
        Command::Runs { limit } => cli::browse::runs(config, limit)?,
        Command::Ask { query } => cli::ask::ask(config, &query)?,
        Command::Focus => cli::ask::focus(config)?,
        Command::Logs { days } => cli::logs::logs(config, days)?,
        Command::LogReflect { days } => cli::logs::log_reflect(config, days)?,
        Command::Ingest { dir } => cli::ask::ingest(config, &dir)?,
        Command::Doctor => cli::doctor::doctor(config)?,
    }

    Ok(())
}
