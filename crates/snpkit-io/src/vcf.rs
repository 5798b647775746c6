//! Streaming VCF reader (text or gzip/bgzip).
//!
//! Only the columns the statistics need are interpreted: CHROM, POS, ID, REF,
//! ALT, FORMAT and the GT subfield of each sample.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use snpkit_core::{Error, Genotype, Result, SampleId, Variant, VariantKey};

use crate::detect::FileFormat;
use crate::record::{optional_id, parse_position, GenotypeRecord, ReadReport};
use crate::source::{open_text, Lines, TextSource, NOT_UTF8};

const FIXED_COLUMNS: usize = 9;

pub struct VcfReader {
    lines: Lines,
    sample_ids: Arc<[SampleId]>,
    report: ReadReport,
    failed: bool,
}

impl VcfReader {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_source(open_text(path)?, path.to_path_buf())
    }

    /// Read meta lines up to and including `#CHROM`.
    pub(crate) fn from_source(source: TextSource, path: PathBuf) -> Result<Self> {
        let mut lines = Lines::new(source);
        let sample_ids: Vec<SampleId> = loop {
            let Some((line_no, text)) = lines.next_line()? else {
                return Err(Error::detection(&path, "no #CHROM header line"));
            };
            let line = match text {
                Ok(line) => line,
                // meta lines may carry free text in any encoding
                Err(raw) if raw.starts_with(b"##") => continue,
                Err(_) => {
                    return Err(Error::detection(
                        &path,
                        format!("line {} before the #CHROM header is not valid UTF-8", line_no),
                    ))
                }
            };
            if line.starts_with("#CHROM") {
                let fields = split_row(&line);
                if fields.len() < FIXED_COLUMNS - 1 {
                    return Err(Error::detection(
                        &path,
                        format!("#CHROM header at line {} has {} columns", line_no, fields.len()),
                    ));
                }
                break fields.iter().skip(FIXED_COLUMNS).map(|s| s.to_string()).collect();
            }
            if line.trim().is_empty() || line.starts_with("##") {
                continue;
            }
            return Err(Error::detection(
                &path,
                format!("data at line {} before the #CHROM header", line_no),
            ));
        };
        log::debug!("{}: {} samples in VCF header", path.display(), sample_ids.len());
        Ok(Self {
            lines,
            sample_ids: sample_ids.into(),
            report: ReadReport::new(path, FileFormat::Vcf),
            failed: false,
        })
    }

    pub fn sample_ids(&self) -> &[SampleId] {
        &self.sample_ids
    }

    pub fn report(&self) -> &ReadReport {
        &self.report
    }

    pub fn finish(self) -> ReadReport {
        self.report
    }

    fn next_record(&mut self) -> Result<Option<GenotypeRecord>> {
        while let Some((line_no, text)) = self.lines.next_line()? {
            let Ok(line) = text else {
                self.report.reject(line_no, NOT_UTF8);
                continue;
            };
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_row(&line, self.sample_ids.len()) {
                Ok((variant, calls)) => {
                    self.report.records += 1;
                    return Ok(Some(GenotypeRecord {
                        sample_ids: Arc::clone(&self.sample_ids),
                        variant,
                        calls,
                    }));
                }
                Err(msg) => self.report.reject(line_no, msg),
            }
        }
        Ok(None)
    }
}

impl Iterator for VcfReader {
    type Item = Result<GenotypeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let out = self.next_record();
        if out.is_err() {
            self.failed = true;
        }
        out.transpose()
    }
}

/// Tab-separated per the format; whitespace accepted for hand-written files.
fn split_row(line: &str) -> Vec<&str> {
    if line.contains('\t') {
        line.split('\t').collect()
    } else {
        line.split_whitespace().collect()
    }
}

fn gt_index(format: &str) -> Option<usize> {
    format.split(':').position(|key| key == "GT")
}

/// Parse one data line into its variant and per-sample calls.
pub(crate) fn parse_row(
    line: &str,
    n_samples: usize,
) -> std::result::Result<(Variant, Vec<Genotype>), String> {
    let fields = split_row(line);
    let expected = if n_samples == 0 {
        FIXED_COLUMNS - 1
    } else {
        FIXED_COLUMNS + n_samples
    };
    if fields.len() != expected && !(n_samples == 0 && fields.len() == FIXED_COLUMNS) {
        return Err(format!(
            "expected {} columns, found {}",
            expected,
            fields.len()
        ));
    }

    let chrom = fields[0];
    let pos = parse_position(fields[1])?;
    let ref_allele = fields[3];
    let alt_allele = fields[4];
    if alt_allele.contains(',') {
        return Err(format!("multi-allelic ALT '{}' is not supported", alt_allele));
    }
    let variant = Variant::new(
        VariantKey::new(chrom, pos, ref_allele, alt_allele),
        optional_id(fields[2]),
    );

    if n_samples == 0 {
        return Ok((variant, Vec::new()));
    }
    let gt_idx = gt_index(fields[8]).ok_or_else(|| format!("FORMAT '{}' has no GT", fields[8]))?;

    let mut calls = Vec::with_capacity(n_samples);
    for sample in &fields[FIXED_COLUMNS..] {
        let token = sample.split(':').nth(gt_idx).unwrap_or(".");
        let call = Genotype::from_vcf_gt(token)
            .ok_or_else(|| format!("unparseable genotype '{}'", token))?;
        calls.push(call);
    }
    Ok((variant, calls))
}
