use clap::{Args, Parser, Subcommand};
use flocken::experiments::aggregate::{ExperimentAggregate, CONTROL_VARIANT_ID};
use flocken::experiments::report::{
    format_daily_breakdown, format_experiment_list, format_sample_size_report, ExperimentReport,
    MAX_DAILY_ROWS,
};
use flocken::experiments::sample_size::{
    calculate_sample_size, SampleSizeParams, DEFAULT_DAILY_VISITORS, DEFAULT_POWER,
};
use flocken::experiments::stats::{ArmCounts, DEFAULT_SIGNIFICANCE_LEVEL};
use flocken::experiments::ExperimentRegistry;
use flocken_http::serve;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flocken")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[arg(long, env = "FLOCKEN_BIND_ADDR", default_value = "127.0.0.1:3000")]
    bind_addr: String,
    #[arg(long = "env", env = "FLOCKEN_ENV", default_value = "development")]
    env_mode: String,
    /// JSON list of experiments; without it the server runs no experiments
    #[arg(long, env = "FLOCKEN_EXPERIMENTS_FILE")]
    experiments_file: Option<PathBuf>,
    #[arg(long, env = "FLOCKEN_QUIZ_DIR", default_value = "./data/quizzes")]
    quiz_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Compare a control and a variant from raw counts
    Compare(CompareArgs),
    /// Visitors needed per variant to detect a given lift
    SampleSize(SampleSizeArgs),
    /// Full report for an exported experiment aggregate
    Report(ReportArgs),
    /// Day-by-day table from an exported experiment aggregate
    Breakdown(BreakdownArgs),
    /// List the experiments in an experiments file
    Experiments(ExperimentsArgs),
}

#[derive(Args)]
struct OutputArgs {
    /// Print the analysis as JSON instead of markdown
    #[arg(long)]
    json: bool,
    /// Seed the Monte Carlo simulation for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

impl OutputArgs {
    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[derive(Args)]
struct CompareArgs {
    #[arg(long)]
    control_visitors: u64,
    #[arg(long)]
    control_conversions: u64,
    #[arg(long)]
    variant_visitors: u64,
    #[arg(long)]
    variant_conversions: u64,
    #[arg(long, default_value = "adhoc")]
    name: String,
    #[arg(long, default_value_t = 0)]
    days: u32,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct SampleSizeArgs {
    /// Current conversion rate, e.g. 0.05
    #[arg(long)]
    baseline: f64,
    /// Relative lift to detect, e.g. 0.2 for +20%
    #[arg(long)]
    mde: f64,
    #[arg(long, default_value_t = DEFAULT_POWER)]
    power: f64,
    #[arg(long, default_value_t = DEFAULT_SIGNIFICANCE_LEVEL)]
    significance: f64,
    #[arg(long, default_value_t = DEFAULT_DAILY_VISITORS)]
    daily_visitors: u64,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ReportArgs {
    #[arg(long)]
    file: PathBuf,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct BreakdownArgs {
    #[arg(long)]
    file: PathBuf,
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ExperimentsArgs {
    #[arg(long, env = "FLOCKEN_EXPERIMENTS_FILE")]
    file: PathBuf,
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(command) => {
            if let Err(e) = run_command(&command) {
                eprintln!("ERROR: {}", e);
                std::process::exit(1);
            }
            Ok(())
        }
        None => {
            std::env::set_var("FLOCKEN_BIND_ADDR", &cli.bind_addr);
            std::env::set_var("FLOCKEN_ENV", &cli.env_mode);
            std::env::set_var("FLOCKEN_QUIZ_DIR", &cli.quiz_dir);
            if let Some(path) = &cli.experiments_file {
                std::env::set_var("FLOCKEN_EXPERIMENTS_FILE", path);
            }
            serve().await
        }
    }
}

fn run_command(command: &Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Compare(args) => run_compare(args),
        Command::SampleSize(args) => run_sample_size(args),
        Command::Report(args) => run_report(args),
        Command::Breakdown(args) => run_breakdown(args),
        Command::Experiments(args) => run_experiments(args),
    }
}

fn print_report(report: &ExperimentReport, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.to_markdown());
    }
    Ok(())
}

fn run_compare(args: &CompareArgs) -> Result<(), Box<dyn std::error::Error>> {
    let report = ExperimentReport::from_counts(
        &args.name,
        &args.name,
        args.days,
        CONTROL_VARIANT_ID,
        ArmCounts::new(args.control_visitors, args.control_conversions),
        "variant",
        ArmCounts::new(args.variant_visitors, args.variant_conversions),
        &mut args.output.rng(),
    );
    print_report(&report, args.output.json)
}

fn sample_size_params(args: &SampleSizeArgs) -> SampleSizeParams {
    SampleSizeParams {
        power: args.power,
        significance_level: args.significance,
        daily_visitors: args.daily_visitors,
        ..SampleSizeParams::new(args.baseline, args.mde)
    }
}

fn run_sample_size(args: &SampleSizeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let params = sample_size_params(args);
    let result = calculate_sample_size(&params)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", format_sample_size_report(&params, &result));
    }
    Ok(())
}

fn run_report(args: &ReportArgs) -> Result<(), Box<dyn std::error::Error>> {
    let aggregate = ExperimentAggregate::load(&args.file)?;
    let report = ExperimentReport::from_aggregate(&aggregate, &mut args.output.rng())?;
    print_report(&report, args.output.json)
}

fn run_breakdown(args: &BreakdownArgs) -> Result<(), Box<dyn std::error::Error>> {
    let aggregate = ExperimentAggregate::load(&args.file)?;
    if args.json {
        let rows: Vec<_> = aggregate
            .daily_newest_first()
            .into_iter()
            .take(MAX_DAILY_ROWS)
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print!("{}", format_daily_breakdown(&aggregate));
    }
    Ok(())
}

fn run_experiments(args: &ExperimentsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let registry = ExperimentRegistry::load(&args.file)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(registry.all())?);
    } else {
        print!("{}", format_experiment_list(registry.all()));
    }
    Ok(())
}
