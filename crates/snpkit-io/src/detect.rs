//! Input format detection.
//!
//! Rules are applied to the first non-comment line, in this order:
//! VCF header markers, text BED, PED, then a delimited table with a header row.
//! A `#chrom`/`#chr` table header counts as that header row, not a comment.

use std::fmt;
use std::path::Path;

use snpkit_core::{Error, Result};

use crate::source::{logical_name, open_text, Lines};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Vcf,
    Bed,
    Ped,
    DelimitedText,
}

impl FileFormat {
    /// Format implied by the file name, ignoring a `.gz`/`.bgz` suffix.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let name = logical_name(path);
        let ext = name.rsplit_once('.').map(|(_, e)| e)?;
        match ext {
            "vcf" => Some(FileFormat::Vcf),
            "bed" => Some(FileFormat::Bed),
            "ped" => Some(FileFormat::Ped),
            "csv" | "tsv" | "txt" => Some(FileFormat::DelimitedText),
            _ => None,
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileFormat::Vcf => "VCF",
            FileFormat::Bed => "BED",
            FileFormat::Ped => "PED",
            FileFormat::DelimitedText => "delimited text",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for FileFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "vcf" => Ok(FileFormat::Vcf),
            "bed" => Ok(FileFormat::Bed),
            "ped" => Ok(FileFormat::Ped),
            "text" | "csv" | "tsv" | "txt" => Ok(FileFormat::DelimitedText),
            other => Err(Error::invalid_argument(format!(
                "unknown format '{}' (use vcf, bed, ped or text)",
                other
            ))),
        }
    }
}

/// Detect delimiter (tab, comma, space) from a header line.
pub fn detect_delimiter(line: &str) -> u8 {
    if line.contains('\t') {
        b'\t'
    } else if line.contains(',') {
        b','
    } else {
        b' '
    }
}

/// `chr1`, `1`, `X`, `chrMT`, `Y`, ...
pub fn is_chromosome_like(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    let name = lower.strip_prefix("chr").unwrap_or(&lower);
    if name.is_empty() {
        return false;
    }
    if name.chars().all(|c| c.is_ascii_digit()) {
        return name.len() <= 3;
    }
    matches!(name, "x" | "y" | "m" | "mt" | "w" | "z" | "xy")
}

pub(crate) fn split_fields(line: &str, delim: u8) -> Vec<&str> {
    if delim == b' ' {
        line.split_whitespace().collect()
    } else {
        line.split(delim as char).map(str::trim).collect()
    }
}

/// Canonical metadata role of a delimited-text header cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MetaColumn {
    Id,
    Chrom,
    Pos,
    Ref,
    Alt,
}

pub(crate) fn meta_column(header: &str) -> Option<MetaColumn> {
    match header.trim().to_ascii_lowercase().as_str() {
        "id" | "marker" | "marker_id" | "snp" | "rsid" | "variant_id" => Some(MetaColumn::Id),
        "chrom" | "chr" | "chromosome" | "#chrom" | "#chr" => Some(MetaColumn::Chrom),
        "pos" | "position" | "bp" => Some(MetaColumn::Pos),
        "ref" | "reference" | "a1" => Some(MetaColumn::Ref),
        "alt" | "alternate" | "a2" => Some(MetaColumn::Alt),
        _ => None,
    }
}

fn looks_like_bed(fields: &[&str]) -> bool {
    if fields.len() < 4 || !is_chromosome_like(fields[0]) {
        return false;
    }
    match (fields[1].parse::<u64>(), fields[2].parse::<u64>()) {
        (Ok(start), Ok(end)) => start < end,
        _ => false,
    }
}

fn looks_like_ped(fields: &[&str]) -> bool {
    if fields.len() < 6 || (fields.len() - 6) % 2 != 0 {
        return false;
    }
    let sex_ok = fields[4].parse::<i64>().is_ok();
    let pheno_ok = fields[5].parse::<f64>().is_ok();
    let alleles_ok = fields[6..]
        .iter()
        .all(|a| a.len() == 1 && a.chars().all(|c| c.is_ascii_alphanumeric()));
    sex_ok && pheno_ok && alleles_ok
}

fn looks_like_table_header(line: &str) -> bool {
    let fields = split_fields(line, detect_delimiter(line));
    if fields.len() < 2 {
        return false;
    }
    let roles: Vec<_> = fields.iter().filter_map(|f| meta_column(f)).collect();
    roles.contains(&MetaColumn::Chrom) && roles.contains(&MetaColumn::Pos)
}

/// A `#`-prefixed header row such as `#chrom,pos,S1`, as written by tools
/// that mark their header as a comment.
pub(crate) fn is_commented_table_header(line: &str) -> bool {
    let first = split_fields(line, detect_delimiter(line))
        .first()
        .map(|f| f.to_ascii_lowercase());
    matches!(first.as_deref(), Some("#chrom" | "#chr")) && looks_like_table_header(line)
}

/// Classify a data line; `None` when no reader claims it.
pub(crate) fn classify_line(line: &str) -> Option<FileFormat> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if looks_like_bed(&fields) {
        Some(FileFormat::Bed)
    } else if looks_like_ped(&fields) {
        Some(FileFormat::Ped)
    } else if looks_like_table_header(line) {
        Some(FileFormat::DelimitedText)
    } else {
        None
    }
}

/// Inspect the leading lines of a file and decide which reader handles it.
pub fn detect_format<P: AsRef<Path>>(path: P) -> Result<FileFormat> {
    let path = path.as_ref();
    let mut lines = Lines::new(open_text(path)?);
    loop {
        let Some((_, text)) = lines.next_line()? else {
            return Err(Error::detection(path, "no data lines"));
        };
        let line = match text {
            Ok(line) => line,
            Err(raw) if raw.starts_with(b"#") => continue,
            Err(_) => return Err(Error::detection(path, "content is not text")),
        };
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with("##fileformat=VCF") || line.starts_with("#CHROM") {
            return Ok(FileFormat::Vcf);
        }
        if is_commented_table_header(&line) {
            log::debug!("{}: detected commented table header", path.display());
            return Ok(FileFormat::DelimitedText);
        }
        if line.starts_with('#') || line.starts_with("track") || line.starts_with("browser") {
            continue;
        }
        let format = classify_line(&line).ok_or_else(|| {
            Error::detection(
                path,
                format!(
                    "first data line matches no known layout: '{}'",
                    truncate(&line, 60)
                ),
            )
        })?;
        log::debug!("{}: detected {}", path.display(), format);
        return Ok(format);
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
