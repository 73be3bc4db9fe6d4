use clap::{Parser, Subcommand};
use log::LevelFilter;

use self::{
    compare::CompareArg, cross_validate::CrossValidateArg, fit::FitArg, simulate::SimulateArg,
    table::TableArg,
};

mod compare;
mod cross_validate;
mod fit;
mod simulate;
mod table;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Log fit and test summaries (overrides `RUST_LOG`)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Fit a Kaplan-Meier or Nelson-Aalen curve to survival records
    Fit(#[clap(flatten)] FitArg),
    /// Print the event table of survival records
    Table(#[clap(flatten)] TableArg),
    /// Compare the survival of record groups with the log-rank test
    Compare(#[clap(flatten)] CompareArg),
    /// Generate exponential survival records
    Simulate(#[clap(flatten)] SimulateArg),
    /// Cross-validate the stratified hazard model on a columnar dataset
    CrossValidate(#[clap(flatten)] CrossValidateArg),
}

fn init_logger(verbose: u8) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(LevelFilter::Trace);
        }
    }
    builder.init();
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    init_logger(args.verbose);
    match args.mode {
        Mode::Fit(arg) => fit::run(&arg)?,
        Mode::Table(arg) => table::run(&arg)?,
        Mode::Compare(arg) => compare::run(&arg)?,
        Mode::Simulate(arg) => simulate::run(&arg)?,
        Mode::CrossValidate(arg) => cross_validate::run(&arg)?,
    }
    Ok(())
}
