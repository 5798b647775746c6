//! TSV and JSON writers for command results.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub type TableWriter = csv::Writer<Box<dyn Write>>;

/// Tab-separated writer over `path`, or stdout when `None`.
pub fn table_writer(path: Option<&Path>) -> Result<TableWriter> {
    let sink: Box<dyn Write> = match path {
        Some(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("creating {}", p.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    Ok(csv::WriterBuilder::new().delimiter(b'\t').from_writer(sink))
}

/// Float cell; NaN prints as `NA`.
pub fn fmt_f64(x: f64) -> String {
    if x.is_nan() {
        "NA".to_string()
    } else {
        format!("{}", x)
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}
