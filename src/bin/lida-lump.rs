use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use linelist_lumper::config::{ElectronicTermMap, LumpingOptions, MoleculeInputs, ProcessingOptions};
use linelist_lumper::{run_batch, LifetimeSummation, LumpResult};

#[derive(Parser)]
#[command(
    name = "lida-lump",
    version,
    about = "Lump line-list states and transitions into composite states"
)]
struct Cli {
    /// JSON file mapping molecule formulas to their processing inputs
    #[arg(short, long)]
    inputs: PathBuf,
    /// Root of the raw line-list data tree
    #[arg(short, long)]
    data_dir: PathBuf,
    /// Where per-molecule output directories are created
    #[arg(short, long)]
    output_dir: PathBuf,
    /// Molecules to process (default: all in the inputs file)
    #[arg(short, long = "molecule")]
    molecules: Vec<String>,
    /// Also write the original lifetimes of each composite state's members
    #[arg(long = "include-tau")]
    include_original_lifetimes: bool,
    /// JSON file with electronic term symbols per molecule
    #[arg(long)]
    electronic_terms: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = LifetimeSummation::PartialLifetimes)]
    lifetime_summation: LifetimeSummation,
    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run_cli(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run_cli(cli: Cli) -> LumpResult<bool> {
    let inputs = MoleculeInputs::from_path(&cli.inputs)?;
    let electronic_terms = cli
        .electronic_terms
        .as_deref()
        .map(ElectronicTermMap::from_path)
        .transpose()?;

    let options = ProcessingOptions {
        data_dir: cli.data_dir,
        output_dir: cli.output_dir,
        lumping: LumpingOptions {
            include_original_lifetimes: cli.include_original_lifetimes,
            lifetime_summation: cli.lifetime_summation,
        },
        electronic_terms,
    };

    let report = run_batch(&inputs, &cli.molecules, &options);

    for summary in &report.processed {
        println!(
            "{}: {} composite states, {} composite transitions, {} warnings",
            summary.formula,
            summary.lumped_states,
            summary.lumped_transitions,
            summary.warnings.len()
        );
        for w in &summary.warnings {
            println!("    {w}");
        }
    }
    for failure in &report.failed {
        println!("{} ABORTED: {}", failure.formula, failure.error);
    }
    if !report.failed.is_empty() {
        println!(
            "{}/{} molecules failed",
            report.failed.len(),
            report.failed.len() + report.processed.len()
        );
    }
    Ok(report.is_success())
}
