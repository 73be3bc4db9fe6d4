use std::path::PathBuf;

use clap::Args;
use lifespan_stats::event_table::EventTable;

use crate::{
    schema::record,
    util::{self, Output},
};

#[derive(Debug, Clone, Args)]
pub(crate) struct TableArg {
    /// Path to the records JSON file
    records: PathBuf,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &TableArg) -> anyhow::Result<()> {
    let records = util::read_records_file(&arg.records)?;
    let data = record::to_survival_data(&records)?;
    let table = EventTable::from_data(&data);
    eprintln!(
        "Event table: {} rows, {} subjects, {} events",
        table.len(),
        table.total_subjects(),
        table.total_observed()
    );
    Output::save_json(&table, arg.output.clone())
}
