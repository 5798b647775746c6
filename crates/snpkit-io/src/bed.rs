//! Text genotype BED: `chrom start end name [genotype ...]`.
//!
//! Start is 0-based half-open, so a site's 1-based position is `start + 1`.
//! Sample names come from a leading `#chrom start end name S1 S2 ...` header;
//! without one they are `sample_1..n`. Other `#` lines are comments.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use snpkit_core::{Genotype, Result, SampleId, Variant, VariantKey};

use crate::detect::{meta_column, FileFormat, MetaColumn};
use crate::record::{optional_id, GenotypeRecord, ReadReport};
use crate::source::{open_text, LineText, Lines, TextSource, NOT_UTF8};

const FIXED_COLUMNS: usize = 4;

pub struct BedReader {
    lines: Lines,
    sample_ids: Arc<[SampleId]>,
    /// First data line, read while sizing the sample list.
    pending: Option<(usize, LineText)>,
    report: ReadReport,
    failed: bool,
}

impl BedReader {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_source(open_text(path)?, path.to_path_buf())
    }

    pub(crate) fn from_source(source: TextSource, path: PathBuf) -> Result<Self> {
        let mut lines = Lines::new(source);
        let mut header: Option<Vec<String>> = None;
        let mut pending = None;
        while let Some((line_no, text)) = lines.next_line()? {
            let line = match text {
                Ok(line) => line,
                Err(raw) if raw.first() == Some(&b'#') => continue,
                Err(raw) => {
                    pending = Some((line_no, Err(raw)));
                    break;
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("track") || trimmed.starts_with("browser") {
                continue;
            }
            if let Some(comment) = trimmed.strip_prefix('#') {
                let fields: Vec<&str> = comment.split_whitespace().collect();
                if is_column_header(&fields) {
                    header = Some(fields[FIXED_COLUMNS..].iter().map(|s| s.to_string()).collect());
                }
                continue;
            }
            pending = Some((line_no, Ok(line)));
            break;
        }

        let sample_ids: Vec<SampleId> = match (header, &pending) {
            (Some(names), _) => names,
            (None, Some((_, text))) => {
                let n = match text {
                    Ok(line) => line.split_whitespace().count(),
                    Err(raw) => String::from_utf8_lossy(raw).split_whitespace().count(),
                }
                .saturating_sub(FIXED_COLUMNS);
                (1..=n).map(|i| format!("sample_{}", i)).collect()
            }
            (None, None) => Vec::new(),
        };
        log::debug!("{}: {} samples in BED", path.display(), sample_ids.len());

        Ok(Self {
            lines,
            sample_ids: sample_ids.into(),
            pending,
            report: ReadReport::new(path, FileFormat::Bed),
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

    fn next_line(&mut self) -> Result<Option<(usize, LineText)>> {
        if let Some(line) = self.pending.take() {
            return Ok(Some(line));
        }
        Ok(self.lines.next_line()?)
    }

    fn next_record(&mut self) -> Result<Option<GenotypeRecord>> {
        while let Some((line_no, text)) = self.next_line()? {
            let Ok(line) = text else {
                self.report.reject(line_no, NOT_UTF8);
                continue;
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match parse_row(trimmed, self.sample_ids.len()) {
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

impl Iterator for BedReader {
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

/// `chrom start end name` column titles, as in `#chrom start end name S1 S2`.
fn is_column_header(fields: &[&str]) -> bool {
    if fields.len() <= FIXED_COLUMNS {
        return false;
    }
    let title = |i: usize, names: &[&str]| {
        let f = fields[i].to_ascii_lowercase();
        names.contains(&f.as_str())
    };
    meta_column(fields[0]) == Some(MetaColumn::Chrom)
        && title(1, &["start", "chromstart", "chrom_start"])
        && title(2, &["end", "chromend", "chrom_end", "stop"])
        && (title(3, &["name"]) || meta_column(fields[3]) == Some(MetaColumn::Id))
}

fn is_allele(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| matches!(c.to_ascii_uppercase(), 'A' | 'C' | 'G' | 'T' | 'N' | '*' | '-'))
}

/// `A/G`, `A>G` or `A,G` give (ref, alt); anything else is a marker id.
fn split_name(name: &str) -> Option<(&str, &str)> {
    for sep in ['/', '>', ','] {
        if let Some((r, a)) = name.split_once(sep) {
            if is_allele(r) && is_allele(a) {
                return Some((r, a));
            }
        }
    }
    None
}

/// Tokens with a `/` or `|` are VCF-style; bare tokens are additive 0/1/2/NA.
fn parse_call(token: &str) -> Option<Genotype> {
    if token.contains(['/', '|']) {
        Genotype::from_vcf_gt(token)
    } else {
        Genotype::from_additive_token(token)
    }
}

pub(crate) fn parse_row(
    line: &str,
    n_samples: usize,
) -> std::result::Result<(Variant, Vec<Genotype>), String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != FIXED_COLUMNS + n_samples {
        return Err(format!(
            "expected {} columns, found {}",
            FIXED_COLUMNS + n_samples,
            fields.len()
        ));
    }
    let start: u64 = fields[1]
        .parse()
        .map_err(|_| format!("invalid start '{}'", fields[1]))?;
    let end: u64 = fields[2]
        .parse()
        .map_err(|_| format!("invalid end '{}'", fields[2]))?;
    if end <= start {
        return Err(format!("end {} is not after start {}", end, start));
    }

    let name = fields[3];
    let variant = match split_name(name) {
        Some((r, a)) => Variant::new(VariantKey::new(fields[0], start + 1, r, a), None),
        None => Variant::new(
            VariantKey::new(fields[0], start + 1, ".", "."),
            optional_id(name),
        ),
    };

    let calls = fields[FIXED_COLUMNS..]
        .iter()
        .map(|t| parse_call(t).ok_or_else(|| format!("unparseable genotype '{}'", t)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((variant, calls))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(text: &str) -> BedReader {
        let source: TextSource = Box::new(Cursor::new(text.as_bytes().to_vec()));
        BedReader::from_source(source, PathBuf::from("mem.bed")).unwrap()
    }

    #[test]
    fn header_names_samples_and_positions_shift() {
        let mut r = reader("#chrom\tstart\tend\tname\tA1\tA2\nchr1\t99\t100\tA/G\t0/1\t2\n");
        assert_eq!(r.sample_ids(), &["A1", "A2"]);
        let rec = r.next().unwrap().unwrap();
        assert_eq!(rec.variant.key, VariantKey::new("chr1", 100, "A", "G"));
        assert_eq!(rec.calls, vec![Genotype::Het, Genotype::HomAlt]);
    }

    #[test]
    fn headerless_file_gets_generated_names() {
        let mut r = reader("1 10 11 rs7 0 1 NA\n1 20 21 rs8 2 2 2\n");
        assert_eq!(r.sample_ids(), &["sample_1", "sample_2", "sample_3"]);
        let first = r.next().unwrap().unwrap();
        assert_eq!(first.variant.id.as_deref(), Some("rs7"));
        assert_eq!(first.variant.key.ref_allele, ".");
        assert_eq!(first.calls[2], Genotype::Missing);
        assert!(r.next().unwrap().is_ok());
        assert!(r.next().is_none());
    }

    #[test]
    fn bad_rows_are_reported() {
        let mut r = reader("1 10 11 rs1 0 1\n1 10 11 rs2 0\n1 30 20 rs3 0 1\n1 40 41 rs4 0 3\n");
        assert_eq!(r.by_ref().filter_map(|x| x.ok()).count(), 1);
        let report = r.finish();
        assert_eq!(
            report.rejected.iter().map(|r| r.line).collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
    }

    #[test]
    fn free_text_comment_is_not_a_header() {
        let mut r = reader(
            "# exported from genotyping array panel version 2\nchr1 99 100 A/G 0/1 1/1\n",
        );
        assert_eq!(r.sample_ids(), &["sample_1", "sample_2"]);
        let rec = r.next().unwrap().unwrap();
        assert_eq!(rec.calls, vec![Genotype::Het, Genotype::HomAlt]);
        assert!(r.next().is_none());
        assert!(r.finish().rejected.is_empty());
    }

    #[test]
    fn comment_after_header_keeps_header() {
        let r = reader("#chrom start end name S1 S2\n# run notes: batch one of three\nchr1 99 100 A/G 0/1 1/1\n");
        assert_eq!(r.sample_ids(), &["S1", "S2"]);
    }

    #[test]
    fn undecodable_row_is_rejected() {
        let bytes = b"chr1 9 10 A/G 0/1 1/1\nchr1 19 20 caf\xe9 0/1 1/1\nchr1 29 30 C/T 0/0 0/1\n".to_vec();
        let source: TextSource = Box::new(Cursor::new(bytes));
        let mut r = BedReader::from_source(source, PathBuf::from("mem.bed")).unwrap();
        assert_eq!(r.by_ref().filter_map(|x| x.ok()).count(), 2);
        let report = r.finish();
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].line, 2);
    }
}
