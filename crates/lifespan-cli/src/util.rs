use std::{
    fs::File,
    io::{self, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context;
use lifespan_validation::dataset::Dataset;
use serde::de::DeserializeOwned;

use crate::schema::record::SubjectRecord;

/// Destination of a command's JSON result: stdout unless `--output` is given.
#[derive(Debug)]
pub enum Output {
    Stdout(StdoutLock<'static>),
    File(BufWriter<File>, PathBuf),
}

impl Output {
    pub fn save_json<T>(value: &T, output_path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let mut output = Output::create(output_path)?;
        output.write_json(value)?;
        if let Output::File(_, path) = &output {
            eprintln!("Wrote {}", path.display());
        }
        Ok(())
    }

    pub fn create(output_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let Some(path) = output_path else {
            return Ok(Output::Stdout(io::stdout().lock()));
        };
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File(BufWriter::new(file), path))
    }

    fn display_path(&self) -> String {
        match self {
            Output::Stdout(_) => "stdout".to_owned(),
            Output::File(_, path) => path.display().to_string(),
        }
    }

    fn write_json<T>(&mut self, value: &T) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let result = match self {
            Output::Stdout(writer) => write_pretty(writer, value),
            Output::File(writer, _) => write_pretty(writer, value),
        };
        result.with_context(|| format!("Failed to write JSON to {}", self.display_path()))
    }
}

fn write_pretty<W, T>(mut writer: W, value: &T) -> anyhow::Result<()>
where
    W: io::Write,
    T: serde::Serialize,
{
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;

    let reader = io::BufReader::new(file);
    let value = serde_json::from_reader(reader).with_context(|| {
        format!(
            "Failed to parse {} JSON file: {}",
            file_kind,
            path.display()
        )
    })?;

    Ok(value)
}

/// Read subject records from a JSON array file
pub fn read_records_file<P>(path: P) -> anyhow::Result<Vec<SubjectRecord>>
where
    P: AsRef<Path>,
{
    read_json_file("records", path)
}

/// Read a columnar dataset from a JSON object file
pub fn read_dataset_file<P>(path: P) -> anyhow::Result<Dataset>
where
    P: AsRef<Path>,
{
    read_json_file("dataset", path)
}

/// Read an options file, or fall back to the defaults
pub fn read_options_file<T>(path: Option<&Path>) -> anyhow::Result<T>
where
    T: DeserializeOwned + Default,
{
    match path {
        Some(path) => read_json_file("options", path),
        None => Ok(T::default()),
    }
}
