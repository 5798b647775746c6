//! Delimited SNP tables (CSV/TSV/whitespace) with a header row.
//!
//! Metadata columns are recognized by header name; every other column is a
//! sample. Cells must use the additive 0/1/2/NA encoding.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecord, Trim};
use snpkit_core::{Error, Genotype, Result, SampleId, Variant, VariantKey};

use crate::detect::{
    detect_delimiter, is_commented_table_header, meta_column, split_fields, FileFormat, MetaColumn,
};
use crate::record::{optional_id, parse_position, GenotypeRecord, ReadReport};
use crate::source::{open_text, Lines, TextSource, NOT_UTF8};

#[derive(Debug, Default)]
struct Layout {
    id: Option<usize>,
    chrom: usize,
    pos: usize,
    ref_allele: Option<usize>,
    alt_allele: Option<usize>,
    samples: Vec<usize>,
}

impl Layout {
    fn from_header(path: &Path, header: &[&str]) -> Result<(Self, Vec<SampleId>)> {
        let mut id = None;
        let mut chrom = None;
        let mut pos = None;
        let mut ref_allele = None;
        let mut alt_allele = None;
        let mut samples = Vec::new();
        let mut names = Vec::new();
        for (col, name) in header.iter().enumerate() {
            let slot = match meta_column(name) {
                Some(MetaColumn::Id) => &mut id,
                Some(MetaColumn::Chrom) => &mut chrom,
                Some(MetaColumn::Pos) => &mut pos,
                Some(MetaColumn::Ref) => &mut ref_allele,
                Some(MetaColumn::Alt) => &mut alt_allele,
                None => {
                    samples.push(col);
                    names.push(name.to_string());
                    continue;
                }
            };
            if slot.is_some() {
                return Err(Error::detection(
                    path,
                    format!("header column '{}' is repeated", name),
                ));
            }
            *slot = Some(col);
        }
        let (Some(chrom), Some(pos)) = (chrom, pos) else {
            return Err(Error::detection(
                path,
                "header needs chromosome and position columns",
            ));
        };
        Ok((
            Self {
                id,
                chrom,
                pos,
                ref_allele,
                alt_allele,
                samples,
            },
            names,
        ))
    }

    fn n_columns(&self) -> usize {
        2 + self.samples.len()
            + [self.id, self.ref_allele, self.alt_allele]
                .iter()
                .filter(|c| c.is_some())
                .count()
    }
}

pub struct TextReader {
    rows: csv::StringRecordsIntoIter<TextSource>,
    path: PathBuf,
    layout: Layout,
    sample_ids: Arc<[SampleId]>,
    whitespace: bool,
    /// Line of the header; csv positions count from the line after it.
    header_line: usize,
    encoding_checked: bool,
    report: ReadReport,
    failed: bool,
}

impl TextReader {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_source(open_text(path)?, path.to_path_buf())
    }

    pub(crate) fn from_source(source: TextSource, path: PathBuf) -> Result<Self> {
        let mut lines = Lines::new(source);
        let header = loop {
            let Some((line_no, text)) = lines.next_line()? else {
                return Err(Error::detection(&path, "no header row"));
            };
            match text {
                Ok(line) if line.trim().is_empty() => {}
                Ok(line) if line.starts_with('#') && !is_commented_table_header(&line) => {}
                Ok(line) => break line,
                Err(raw) if raw.starts_with(b"#") => {}
                Err(_) => {
                    return Err(Error::detection(
                        &path,
                        format!("header line {} is not valid UTF-8", line_no),
                    ))
                }
            }
        };
        let header_line = lines.line_no();
        let source = lines.into_inner();

        let delimiter = detect_delimiter(&header);
        let fields = split_fields(&header, delimiter);
        let (layout, names) = Layout::from_header(&path, &fields)?;
        if names.is_empty() {
            log::warn!("{}: header has no sample columns", path.display());
        }
        log::debug!(
            "{}: {} samples, delimiter {:?}",
            path.display(),
            names.len(),
            delimiter as char
        );

        let rows = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .comment(Some(b'#'))
            .from_reader(source)
            .into_records();

        Ok(Self {
            rows,
            report: ReadReport::new(path.clone(), FileFormat::DelimitedText),
            path,
            layout,
            sample_ids: names.into(),
            whitespace: delimiter == b' ',
            header_line,
            encoding_checked: false,
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

    fn cells<'r>(&self, record: &'r StringRecord) -> Vec<&'r str> {
        if self.whitespace {
            record.iter().filter(|c| !c.is_empty()).collect()
        } else {
            record.iter().collect()
        }
    }

    fn next_record(&mut self) -> Result<Option<GenotypeRecord>> {
        while let Some(row) = self.rows.next() {
            let record = match row {
                Ok(record) => record,
                Err(e) => {
                    let undecodable = match e.kind() {
                        csv::ErrorKind::Utf8 { pos, .. } => {
                            Some(pos.as_ref().map(|p| p.line() as usize).unwrap_or(0))
                        }
                        _ => None,
                    };
                    // csv keeps reading past a row that is not UTF-8
                    let Some(line) = undecodable else {
                        return Err(csv_error(e));
                    };
                    self.report.reject(self.header_line + line, NOT_UTF8);
                    continue;
                }
            };
            let line_no = self.header_line
                + record.position().map(|p| p.line() as usize).unwrap_or(0);
            let cells = self.cells(&record);
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }
            if cells.len() != self.layout.n_columns() {
                self.report.reject(
                    line_no,
                    format!(
                        "expected {} columns, found {}",
                        self.layout.n_columns(),
                        cells.len()
                    ),
                );
                continue;
            }
            if !self.encoding_checked {
                // the first well-formed row fixes the encoding for the file
                if let Some(token) = self
                    .layout
                    .samples
                    .iter()
                    .map(|&c| cells[c])
                    .find(|t| Genotype::from_additive_token(t).is_none())
                {
                    return Err(Error::UnsupportedEncoding {
                        path: self.path.clone(),
                        line: line_no,
                        token: token.to_string(),
                    });
                }
                self.encoding_checked = true;
            }
            match self.parse_row(&cells) {
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

    fn parse_row(&self, cells: &[&str]) -> std::result::Result<(Variant, Vec<Genotype>), String> {
        let l = &self.layout;
        let pos = parse_position(cells[l.pos])?;
        let allele = |col: Option<usize>| col.map(|c| cells[c]).filter(|a| !a.is_empty()).unwrap_or(".");
        let key = VariantKey::new(cells[l.chrom], pos, allele(l.ref_allele), allele(l.alt_allele));
        let id = l.id.and_then(|c| optional_id(cells[c]));
        let calls = l
            .samples
            .iter()
            .map(|&c| {
                Genotype::from_additive_token(cells[c])
                    .ok_or_else(|| format!("unparseable genotype '{}'", cells[c]))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok((Variant::new(key, id), calls))
    }
}

impl Iterator for TextReader {
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

fn csv_error(e: csv::Error) -> Error {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => Error::Io(io),
        other => Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{:?}", other),
        )),
    }
}
