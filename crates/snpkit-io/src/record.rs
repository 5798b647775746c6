use std::path::PathBuf;
use std::sync::Arc;

use snpkit_core::{Error, Genotype, SampleId, Variant};

use crate::detect::FileFormat;

/// One parsed row of any input format: calls at one variant for a set of samples.
///
/// VCF, BED and text rows carry every sample of the file; a PED row becomes one
/// record per variant carrying a single sample.
#[derive(Clone, Debug)]
pub struct GenotypeRecord {
    pub sample_ids: Arc<[SampleId]>,
    pub variant: Variant,
    /// Parallel to `sample_ids`.
    pub calls: Vec<Genotype>,
}

/// A row skipped by a reader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RejectedRecord {
    pub line: usize,
    pub message: String,
}

impl From<RejectedRecord> for Error {
    fn from(r: RejectedRecord) -> Self {
        Error::malformed(r.line, r.message)
    }
}

/// What a reader saw, returned once its stream is exhausted.
#[derive(Clone, Debug)]
pub struct ReadReport {
    pub path: PathBuf,
    pub format: FileFormat,
    pub records: usize,
    pub rejected: Vec<RejectedRecord>,
}

impl ReadReport {
    pub(crate) fn new(path: PathBuf, format: FileFormat) -> Self {
        Self {
            path,
            format,
            records: 0,
            rejected: Vec::new(),
        }
    }

    pub(crate) fn reject(&mut self, line: usize, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}: skipping line {}: {}", self.path.display(), line, message);
        self.rejected.push(RejectedRecord { line, message });
    }
}

/// 1-based position; zero and non-integers are row errors.
pub(crate) fn parse_position(token: &str) -> std::result::Result<u64, String> {
    match token.parse::<u64>() {
        Ok(0) => Err("position must be at least 1".to_string()),
        Ok(pos) => Ok(pos),
        Err(_) => Err(format!("invalid position '{}'", token)),
    }
}

/// `None` for the conventional empty id markers.
pub(crate) fn optional_id(token: &str) -> Option<String> {
    match token {
        "" | "." => None,
        id => Some(id.to_string()),
    }
}
