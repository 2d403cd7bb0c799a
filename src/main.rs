// Clippy allows
#![allow(clippy::too_many_arguments)]

//! loopsim: permutation testing for Hi-C chromatin loops
//!
//! Usage: loopsim <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::process;

use loopsim::commands::{
    AnalyzeCommand, PermuteCommand, SimulateCommand, StatsCommand, ValidateCommand,
    DEFAULT_FLAG_END_SIZE,
};
use loopsim::config::{Delimiter, OutputConfig};
use loopsim::error::Result;
use loopsim::genome::ChromosomeTable;
use loopsim::index::IntervalIndex;
use loopsim::parallel::default_workers;
use loopsim::table::{open_table, read_intervals_from, read_loops_from};

#[derive(Parser)]
#[command(name = "loopsim")]
#[command(version)]
#[command(about = "loopsim: permutation tests for Hi-C loop anchors against genomic intervals", long_about = None)]
struct Cli {
    /// Number of worker threads (default: half the available CPUs)
    #[arg(long, short = 't', global = true)]
    threads: Option<usize>,

    /// Delimiter for written tables: tab, space, comma, semicolon, pipe or a single character
    #[arg(long, global = true, default_value = "tab")]
    delimiter: Delimiter,

    /// Delimiter of input tables (detected per file when omitted)
    #[arg(long, global = true)]
    input_delimiter: Option<Delimiter>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sort a loop file into chromosome order and flag or remove malformed rows
    Validate {
        /// Loop file (chrom1 start1 end1 chrom2 start2 end2)
        #[arg(short, long)]
        loop_file: PathBuf,

        /// Chromosome region file (chrom start length)
        #[arg(short, long)]
        chrom_file: PathBuf,

        /// Validated loop file to write
        #[arg(short, long)]
        output: PathBuf,

        /// Remove rows whose anchors are at least this large
        #[arg(long, default_value_t = DEFAULT_FLAG_END_SIZE)]
        flag_end_size: u64,
    },

    /// Generate randomized loop sets for the null model
    Simulate {
        /// Validated loop file
        #[arg(short, long)]
        loop_file: PathBuf,

        /// Chromosome region file (chrom start length)
        #[arg(short, long)]
        chrom_file: PathBuf,

        /// Directory for the simulated loop files
        #[arg(short, long)]
        sim_dir: PathBuf,

        /// Number of simulations
        #[arg(short, long, default_value = "1")]
        num_sims: usize,

        /// Random seed; run i uses seed + i
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Overlap ratio of one loop file against intervals of interest
    Analyze {
        /// Loop file
        #[arg(short, long)]
        loop_file: PathBuf,

        /// Intervals of interest (chrom start end)
        #[arg(short, long)]
        intervals: PathBuf,

        /// Annotated loop file to write (7th column lists overlapping intervals)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Overlap ratio of every loop file in a directory
    BatchAnalyze {
        /// Directory of loop files
        #[arg(short = 'd', long)]
        loop_directory: PathBuf,

        /// Intervals of interest (chrom start end)
        #[arg(short, long)]
        intervals: PathBuf,

        /// Ratio distribution file to write
        #[arg(short, long)]
        ratio_file: PathBuf,

        /// Directory for annotated loop files
        #[arg(long)]
        loop_out_directory: Option<PathBuf>,
    },

    /// Summarize a ratio distribution and test an observed ratio
    Stats {
        /// Ratio distribution file (one ratio per line)
        #[arg(short, long)]
        ratio_file: PathBuf,

        /// Observed ratio to test against the distribution
        #[arg(long)]
        observed: Option<f64>,
    },

    /// Validate, simulate, analyze and summarize in one run
    Permute {
        /// Loop file
        #[arg(short, long)]
        loop_file: PathBuf,

        /// Chromosome region file (chrom start length)
        #[arg(short, long)]
        chrom_file: PathBuf,

        /// Intervals of interest (chrom start end)
        #[arg(short, long)]
        intervals: PathBuf,

        /// Number of simulations
        #[arg(short, long, default_value = "100")]
        num_sims: usize,

        /// Random seed; run i uses seed + i
        #[arg(long)]
        seed: Option<u64>,

        /// Remove rows whose anchors are at least this large
        #[arg(long, default_value_t = DEFAULT_FLAG_END_SIZE)]
        flag_end_size: u64,

        /// Ratio distribution file to write
        #[arg(short, long)]
        ratio_file: Option<PathBuf>,

        /// Directory for the simulated loop files
        #[arg(short, long)]
        sim_dir: Option<PathBuf>,
    },
}

/// Settings shared by every subcommand.
struct Globals {
    workers: usize,
    input: Option<Delimiter>,
    output: OutputConfig,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let globals = Globals {
        workers: cli.threads.unwrap_or_else(default_workers),
        input: cli.input_delimiter,
        output: OutputConfig::new(cli.delimiter),
    };

    let result = match cli.command {
        Commands::Validate {
            loop_file,
            chrom_file,
            output,
            flag_end_size,
        } => run_validate(&globals, loop_file, chrom_file, output, flag_end_size),

        Commands::Simulate {
            loop_file,
            chrom_file,
            sim_dir,
            num_sims,
            seed,
        } => run_simulate(&globals, loop_file, chrom_file, sim_dir, num_sims, seed),

        Commands::Analyze {
            loop_file,
            intervals,
            output,
        } => run_analyze(&globals, loop_file, intervals, output),

        Commands::BatchAnalyze {
            loop_directory,
            intervals,
            ratio_file,
            loop_out_directory,
        } => run_batch_analyze(
            &globals,
            loop_directory,
            intervals,
            ratio_file,
            loop_out_directory,
        ),

        Commands::Stats {
            ratio_file,
            observed,
        } => run_stats(ratio_file, observed),

        Commands::Permute {
            loop_file,
            chrom_file,
            intervals,
            num_sims,
            seed,
            flag_end_size,
            ratio_file,
            sim_dir,
        } => run_permute(
            &globals,
            loop_file,
            chrom_file,
            intervals,
            num_sims,
            seed,
            flag_end_size,
            ratio_file,
            sim_dir,
        ),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn load_chromosomes(globals: &Globals, path: &Path) -> Result<ChromosomeTable> {
    let table = ChromosomeTable::from_table(open_table(path, globals.input)?)?;
    info!(
        "Loaded {} chromosome regions from {}",
        table.len(),
        path.display()
    );
    Ok(table)
}

fn load_intervals(globals: &Globals, path: &Path) -> Result<IntervalIndex> {
    let intervals = read_intervals_from(open_table(path, globals.input)?)?;
    let index = IntervalIndex::from_intervals(&intervals);
    info!(
        "Loaded {} intervals of interest on {} chromosomes",
        index.len(),
        index.num_chromosomes()
    );
    Ok(index)
}

fn run_validate(
    globals: &Globals,
    loop_file: PathBuf,
    chrom_file: PathBuf,
    output: PathBuf,
    flag_end_size: u64,
) -> Result<()> {
    let chromosomes = load_chromosomes(globals, &chrom_file)?;
    let report = ValidateCommand::new()
        .with_flag_end_size(flag_end_size)
        .run(
            open_table(&loop_file, globals.input)?,
            &output,
            &chromosomes,
            globals.output,
        )?;
    println!("{}", report);
    Ok(())
}

fn run_simulate(
    globals: &Globals,
    loop_file: PathBuf,
    chrom_file: PathBuf,
    sim_dir: PathBuf,
    num_sims: usize,
    seed: Option<u64>,
) -> Result<()> {
    let chromosomes = load_chromosomes(globals, &chrom_file)?;
    let loops = read_loops_from(open_table(&loop_file, globals.input)?)?;

    let stats = SimulateCommand::new()
        .with_runs(num_sims)
        .with_workers(globals.workers)
        .with_seed(seed)
        .run(&loops, &chromosomes, &sim_dir, globals.output)?;
    eprintln!("Simulate stats: {}", stats);
    Ok(())
}

fn run_analyze(
    globals: &Globals,
    loop_file: PathBuf,
    intervals: PathBuf,
    output: Option<PathBuf>,
) -> Result<()> {
    let index = load_intervals(globals, &intervals)?;
    let loops = read_loops_from(open_table(&loop_file, globals.input)?)?;

    let ratio = AnalyzeCommand::new()
        .with_output(globals.output)
        .run(&loops, &index, output.as_deref())?;
    println!("{}", ratio);
    Ok(())
}

fn run_batch_analyze(
    globals: &Globals,
    loop_directory: PathBuf,
    intervals: PathBuf,
    ratio_file: PathBuf,
    loop_out_directory: Option<PathBuf>,
) -> Result<()> {
    let index = load_intervals(globals, &intervals)?;

    let stats = AnalyzeCommand::new()
        .with_input_delimiter(globals.input)
        .with_output(globals.output)
        .run_batch(
            &loop_directory,
            &index,
            &ratio_file,
            loop_out_directory.as_deref(),
            globals.workers,
        )?;
    info!(
        "{} ratios written to {} (mean {})",
        stats.files,
        ratio_file.display(),
        stats.mean_ratio
    );
    Ok(())
}

fn run_stats(ratio_file: PathBuf, observed: Option<f64>) -> Result<()> {
    let stats = StatsCommand::new().with_observed(observed).run(&ratio_file)?;
    println!("{}", stats);
    Ok(())
}

fn run_permute(
    globals: &Globals,
    loop_file: PathBuf,
    chrom_file: PathBuf,
    intervals: PathBuf,
    num_sims: usize,
    seed: Option<u64>,
    flag_end_size: u64,
    ratio_file: Option<PathBuf>,
    sim_dir: Option<PathBuf>,
) -> Result<()> {
    let chromosomes = load_chromosomes(globals, &chrom_file)?;
    let loops = read_loops_from(open_table(&loop_file, globals.input)?)?;
    let intervals = read_intervals_from(open_table(&intervals, globals.input)?)?;

    if num_sims < 2 {
        warn!("At least two simulations are needed for a standard deviation");
    }

    let cmd = PermuteCommand {
        flag_end_size,
        runs: num_sims,
        workers: globals.workers,
        seed,
        ratio_out: ratio_file,
        sim_dir,
        output: globals.output,
    };
    let report = cmd.run(&loops, &chromosomes, &intervals)?;
    println!("{}", report);
    Ok(())
}
