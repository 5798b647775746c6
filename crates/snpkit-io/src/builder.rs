//! Folds record streams from one or more files into a `GenotypeMatrix`.
//!
//! Records are pulled in bounded chunks and written into a per-variant column
//! arena; a chunk is dropped as soon as it has been folded. A later write to a
//! (sample, variant) cell replaces the earlier one and is logged as a
//! `MergeConflict`.

use std::path::Path;
use std::sync::Arc;

use ndarray::Array2;
use snpkit_core::{
    Error, Genotype, GenotypeMatrix, IoConfig, Result, SampleId, SampleIndex, Variant,
    VariantIndex, VariantKey,
};

use crate::detect::FileFormat;
use crate::reader::{open_reader, FormatReader};
use crate::record::{GenotypeRecord, ReadReport};

const COLUMN_BLOCK: usize = 1024;
const UNSET: u32 = u32::MAX;

/// A cell written more than once; the replacement is what the matrix holds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeConflict {
    pub sample: SampleId,
    pub variant: VariantKey,
    pub previous: Genotype,
    pub replacement: Genotype,
    /// Position of the source in load order.
    pub previous_source: usize,
    pub replacement_source: usize,
}

#[derive(Clone, Debug, Default)]
pub struct LoadReport {
    pub files: Vec<ReadReport>,
    pub conflicts: Vec<MergeConflict>,
}

impl LoadReport {
    pub fn rejected_rows(&self) -> usize {
        self.files.iter().map(|f| f.rejected.len()).sum()
    }
}

#[derive(Clone, Debug)]
pub struct LoadOptions {
    /// Records folded per chunk.
    pub chunk_size: usize,
    /// Declared format applied to every path; detected per file when `None`.
    pub format: Option<FileFormat>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            chunk_size: IoConfig::default().chunk_size,
            format: None,
        }
    }
}

impl From<&IoConfig> for LoadOptions {
    fn from(cfg: &IoConfig) -> Self {
        Self {
            chunk_size: cfg.chunk_size,
            format: None,
        }
    }
}

/// Column arena: one growable column of calls per variant.
struct Column {
    calls: Vec<Genotype>,
    origins: Vec<u32>,
}

impl Column {
    fn new() -> Self {
        Self {
            calls: Vec::new(),
            origins: Vec::new(),
        }
    }

    fn ensure(&mut self, sample: usize) {
        if sample >= self.calls.len() {
            let needed = sample + 1;
            if needed > self.calls.capacity() {
                let target = (needed + COLUMN_BLOCK - 1) / COLUMN_BLOCK * COLUMN_BLOCK;
                self.calls.reserve_exact(target - self.calls.len());
                self.origins.reserve_exact(target - self.origins.len());
            }
            self.calls.resize(needed, Genotype::Missing);
            self.origins.resize(needed, UNSET);
        }
    }
}

pub struct MatrixBuilder {
    chunk_size: usize,
    samples: SampleIndex,
    variants: VariantIndex,
    variant_ids: Vec<Option<String>>,
    columns: Vec<Column>,
    conflicts: Vec<MergeConflict>,
    sources: usize,
    /// Resolved sample ordinals of the last record's shared id list.
    sample_cache: Option<(Arc<[SampleId]>, Vec<usize>)>,
}

impl Default for MatrixBuilder {
    fn default() -> Self {
        Self::with_chunk_size(IoConfig::default().chunk_size)
    }
}

impl MatrixBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            samples: SampleIndex::new(),
            variants: VariantIndex::new(),
            variant_ids: Vec::new(),
            columns: Vec::new(),
            conflicts: Vec::new(),
            sources: 0,
            sample_cache: None,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn n_variants(&self) -> usize {
        self.variants.len()
    }

    pub fn conflicts(&self) -> &[MergeConflict] {
        &self.conflicts
    }

    /// Drain a reader into the arena as the next source in load order.
    pub fn add_reader(&mut self, mut reader: FormatReader) -> Result<ReadReport> {
        self.add_records(&mut reader)?;
        let report = reader.finish();
        log::info!(
            "{}: {} records folded, {} rows skipped",
            report.path.display(),
            report.records,
            report.rejected.len()
        );
        Ok(report)
    }

    /// Fold any record stream as the next source. Returns the record count.
    pub fn add_records<I>(&mut self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<GenotypeRecord>>,
    {
        let source = self.sources;
        self.sources += 1;
        let mut records = records.into_iter();
        let mut chunk: Vec<GenotypeRecord> = Vec::with_capacity(self.chunk_size);
        let mut total = 0;
        loop {
            for rec in records.by_ref().take(self.chunk_size) {
                chunk.push(rec?);
            }
            if chunk.is_empty() {
                break;
            }
            total += chunk.len();
            for rec in chunk.drain(..) {
                self.fold(rec, source)?;
            }
            log::debug!("folded chunk, {} records so far", total);
        }
        Ok(total)
    }

    fn resolve_samples(&mut self, ids: &Arc<[SampleId]>) -> Vec<usize> {
        if let Some((cached, ordinals)) = &self.sample_cache {
            if Arc::ptr_eq(cached, ids) {
                return ordinals.clone();
            }
        }
        let ordinals: Vec<usize> = ids
            .iter()
            .map(|id| self.samples.get_or_insert(id).0)
            .collect();
        self.sample_cache = Some((Arc::clone(ids), ordinals.clone()));
        ordinals
    }

    fn fold(&mut self, rec: GenotypeRecord, source: usize) -> Result<()> {
        if rec.calls.len() != rec.sample_ids.len() {
            return Err(Error::invalid_argument(format!(
                "record for {} has {} calls for {} samples",
                rec.variant.key,
                rec.calls.len(),
                rec.sample_ids.len()
            )));
        }
        let sample_ordinals = self.resolve_samples(&rec.sample_ids);
        let (v, is_new) = self.variants.get_or_insert(&rec.variant.key);
        if is_new {
            self.variant_ids.push(rec.variant.id.clone());
            self.columns.push(Column::new());
        } else if self.variant_ids[v].is_none() {
            self.variant_ids[v] = rec.variant.id.clone();
        }

        let source_tag = u32::try_from(source).unwrap_or(UNSET - 1);
        let column = &mut self.columns[v];
        for ((&s, &call), id) in sample_ordinals
            .iter()
            .zip(&rec.calls)
            .zip(rec.sample_ids.iter())
        {
            column.ensure(s);
            let prev_origin = column.origins[s];
            if prev_origin != UNSET {
                self.conflicts.push(MergeConflict {
                    sample: id.clone(),
                    variant: rec.variant.key.clone(),
                    previous: column.calls[s],
                    replacement: call,
                    previous_source: prev_origin as usize,
                    replacement_source: source,
                });
            }
            column.calls[s] = call;
            column.origins[s] = source_tag;
        }
        Ok(())
    }

    /// Freeze the indices and emit the matrix; cells never written are missing.
    pub fn finish(self) -> Result<(GenotypeMatrix, Vec<MergeConflict>)> {
        let n_samples = self.samples.len();
        let n_variants = self.variants.len();
        let columns = self.columns;
        let calls = Array2::from_shape_fn((n_samples, n_variants), |(s, v)| {
            columns[v].calls.get(s).copied().unwrap_or(Genotype::Missing)
        });
        let variants: Vec<Variant> = self
            .variants
            .into_items()
            .into_iter()
            .zip(self.variant_ids)
            .map(|(key, id)| Variant::new(key, id))
            .collect();
        if !self.conflicts.is_empty() {
            log::warn!(
                "{} genotype cells were overwritten by later records",
                self.conflicts.len()
            );
        }
        let matrix = GenotypeMatrix::new(self.samples.into_items(), variants, calls)?;
        Ok((matrix, self.conflicts))
    }
}

/// Load and merge `paths` in order, detecting each file's format.
pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<(GenotypeMatrix, LoadReport)> {
    load_with(paths, &LoadOptions::default())
}

pub fn load_with<P: AsRef<Path>>(
    paths: &[P],
    options: &LoadOptions,
) -> Result<(GenotypeMatrix, LoadReport)> {
    let mut builder = MatrixBuilder::with_chunk_size(options.chunk_size);
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let reader = open_reader(path.as_ref(), options.format)?;
        files.push(builder.add_reader(reader)?);
    }
    let (matrix, conflicts) = builder.finish()?;
    log::info!(
        "Loaded {} samples x {} variants from {} file(s)",
        matrix.n_samples(),
        matrix.n_variants(),
        files.len()
    );
    Ok((matrix, LoadReport { files, conflicts }))
}
