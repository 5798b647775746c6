//! PLINK text PED + MAP.
//!
//! A PED line is one sample: `FID IID PAT MAT SEX PHENO` followed by an allele
//! pair per MAP variant. Each line is emitted as one single-sample record per
//! variant. When the MAP does not declare alleles, the PED is scanned once up
//! front and the major allele becomes the reference.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use snpkit_core::{Error, Genotype, Result, SampleId, Variant, VariantKey};

use crate::detect::FileFormat;
use crate::record::{optional_id, parse_position, GenotypeRecord, ReadReport};
use crate::source::{open_text, strip_suffix_ignore_case, Lines, NOT_UTF8};

const PEDIGREE_COLUMNS: usize = 6;
const MISSING_ALLELE: &str = "0";
const UNKNOWN_ALLELE: &str = ".";

#[derive(Clone, Debug, PartialEq, Eq)]
struct MapEntry {
    chrom: String,
    id: Option<String>,
    pos: u64,
    alleles: Option<(String, String)>,
}

/// Sibling `.map` of a `.ped` (`x.ped` / `x.ped.gz` -> `x.map`).
pub fn companion_map_path(ped: &Path) -> PathBuf {
    let name = ped
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut stem = name.as_str();
    for suffix in [".gz", ".bgz"] {
        if let Some(s) = strip_suffix_ignore_case(stem, suffix) {
            stem = s;
            break;
        }
    }
    let stem = strip_suffix_ignore_case(stem, ".ped").unwrap_or(stem);
    ped.with_file_name(format!("{}.map", stem))
}

fn read_map(path: &Path) -> Result<Vec<MapEntry>> {
    let mut lines = Lines::new(open_text(path)?);
    let mut entries = Vec::new();
    let bad = |line: usize, message: String| Error::MalformedCompanion {
        path: path.to_path_buf(),
        line,
        message,
    };
    while let Some((line_no, text)) = lines.next_line()? {
        let line = text.map_err(|_| bad(line_no, NOT_UTF8.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() != 4 && fields.len() != 6 {
            return Err(bad(
                line_no,
                format!("expected 4 or 6 columns, found {}", fields.len()),
            ));
        }
        let pos = parse_position(fields[3]).map_err(|m| bad(line_no, m))?;
        let alleles = if fields.len() == 6 {
            Some((fields[4].to_string(), fields[5].to_string()))
        } else {
            None
        };
        entries.push(MapEntry {
            chrom: fields[0].to_string(),
            id: optional_id(fields[1]),
            pos,
            alleles,
        });
    }
    Ok(entries)
}

/// Reference/alternate per variant from allele tallies over the whole PED.
///
/// Major allele is the reference; ties go to the lexicographically smaller
/// allele. A monomorphic site gets `.` as alternate.
fn infer_alleles(path: &Path, n_variants: usize) -> Result<Vec<(String, String)>> {
    let mut tallies: Vec<BTreeMap<String, usize>> = vec![BTreeMap::new(); n_variants];
    let mut lines = Lines::new(open_text(path)?);
    while let Some((_, text)) = lines.next_line()? {
        // undecodable lines are rejected by the reader itself
        let Ok(line) = text else { continue };
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != PEDIGREE_COLUMNS + 2 * n_variants {
            continue;
        }
        for (v, pair) in fields[PEDIGREE_COLUMNS..].chunks(2).enumerate() {
            for allele in pair {
                if *allele != MISSING_ALLELE {
                    *tallies[v].entry(allele.to_string()).or_insert(0) += 1;
                }
            }
        }
    }

    Ok(tallies
        .into_iter()
        .map(|tally| {
            let mut ranked: Vec<(String, usize)> = tally.into_iter().collect();
            // BTreeMap order is lexicographic; stable sort keeps it for ties.
            ranked.sort_by(|a, b| b.1.cmp(&a.1));
            let mut alleles = ranked.into_iter().map(|(a, _)| a);
            let reference = alleles.next().unwrap_or_else(|| UNKNOWN_ALLELE.to_string());
            let alternate = alleles.next().unwrap_or_else(|| UNKNOWN_ALLELE.to_string());
            (reference, alternate)
        })
        .collect())
}

pub struct PedReader {
    lines: Lines,
    variants: Vec<Variant>,
    pending: VecDeque<GenotypeRecord>,
    report: ReadReport,
    failed: bool,
}

impl PedReader {
    pub fn open(path: &Path) -> Result<Self> {
        let map_path = companion_map_path(path);
        if !map_path.exists() {
            return Err(Error::MissingCompanion {
                path: path.to_path_buf(),
                expected: map_path,
            });
        }
        let entries = read_map(&map_path)?;
        let inferred = if entries.iter().any(|e| e.alleles.is_none()) {
            log::debug!(
                "{}: MAP declares no alleles, scanning PED for major alleles",
                path.display()
            );
            Some(infer_alleles(path, entries.len())?)
        } else {
            None
        };

        let variants = entries
            .into_iter()
            .enumerate()
            .map(|(v, e)| {
                let (r, a) = match (e.alleles, &inferred) {
                    (Some(pair), _) => pair,
                    (None, Some(inferred)) => inferred[v].clone(),
                    (None, None) => (UNKNOWN_ALLELE.to_string(), UNKNOWN_ALLELE.to_string()),
                };
                Variant::new(VariantKey::new(e.chrom, e.pos, r, a), e.id)
            })
            .collect::<Vec<_>>();
        log::debug!("{}: {} variants from MAP", path.display(), variants.len());

        Ok(Self {
            lines: Lines::new(open_text(path)?),
            variants,
            pending: VecDeque::new(),
            report: ReadReport::new(path.to_path_buf(), FileFormat::Ped),
            failed: false,
        })
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn report(&self) -> &ReadReport {
        &self.report
    }

    pub fn finish(self) -> ReadReport {
        self.report
    }

    fn next_record(&mut self) -> Result<Option<GenotypeRecord>> {
        loop {
            if let Some(rec) = self.pending.pop_front() {
                return Ok(Some(rec));
            }
            let Some((line_no, text)) = self.lines.next_line()? else {
                return Ok(None);
            };
            let Ok(line) = text else {
                self.report.reject(line_no, NOT_UTF8);
                continue;
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match parse_row(trimmed, &self.variants) {
                Ok((sample, calls)) => {
                    self.report.records += 1;
                    let sample_ids: Arc<[SampleId]> = vec![sample].into();
                    self.pending.extend(self.variants.iter().zip(calls).map(
                        |(variant, call)| GenotypeRecord {
                            sample_ids: Arc::clone(&sample_ids),
                            variant: variant.clone(),
                            calls: vec![call],
                        },
                    ));
                }
                Err(msg) => self.report.reject(line_no, msg),
            }
        }
    }
}

impl Iterator for PedReader {
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

fn allele_dose(allele: &str, key: &VariantKey) -> Option<u8> {
    if allele == key.ref_allele {
        Some(0)
    } else if allele == key.alt_allele && key.alt_allele != UNKNOWN_ALLELE {
        Some(1)
    } else {
        None
    }
}

fn pair_to_call(a: &str, b: &str, key: &VariantKey) -> std::result::Result<Genotype, String> {
    if a == MISSING_ALLELE || b == MISSING_ALLELE {
        return Ok(Genotype::Missing);
    }
    let unknown = |x: &str| {
        format!(
            "allele '{}' is neither {} nor {} at {}",
            x, key.ref_allele, key.alt_allele, key
        )
    };
    let da = allele_dose(a, key).ok_or_else(|| unknown(a))?;
    let db = allele_dose(b, key).ok_or_else(|| unknown(b))?;
    Genotype::from_dosage(da + db).ok_or_else(|| unknown(a))
}

/// Sample id and one call per variant.
fn parse_row(
    line: &str,
    variants: &[Variant],
) -> std::result::Result<(SampleId, Vec<Genotype>), String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let expected = PEDIGREE_COLUMNS + 2 * variants.len();
    if fields.len() != expected {
        return Err(format!(
            "expected {} columns, found {}",
            expected,
            fields.len()
        ));
    }
    let calls = fields[PEDIGREE_COLUMNS..]
        .chunks(2)
        .zip(variants)
        .map(|(pair, v)| pair_to_call(pair[0], pair[1], &v.key))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((fields[1].to_string(), calls))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_pair(dir: &Path, ped: &str, map: Option<&str>) -> PathBuf {
        let ped_path = dir.join("cohort.ped");
        fs::write(&ped_path, ped).unwrap();
        if let Some(map) = map {
            fs::write(dir.join("cohort.map"), map).unwrap();
        }
        ped_path
    }

    #[test]
    fn companion_path_strips_compression() {
        assert_eq!(
            companion_map_path(Path::new("/d/x.ped.gz")),
            PathBuf::from("/d/x.map")
        );
        assert_eq!(
            companion_map_path(Path::new("/d/HapMap.PED.GZ")),
            PathBuf::from("/d/HapMap.map")
        );
    }

    #[test]
    fn mixed_case_name_finds_its_map() {
        let dir = tempfile::tempdir().unwrap();
        let ped = dir.path().join("HapMap.ped");
        fs::write(&ped, "F I1 0 0 1 1 A G\n").unwrap();
        fs::write(dir.path().join("HapMap.map"), "1 rs1 0 100 A G\n").unwrap();
        let mut r = PedReader::open(&ped).unwrap();
        let recs: Vec<_> = r.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].calls, vec![Genotype::Het]);
    }

    #[test]
    fn undecodable_sample_line_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ped_path = dir.path().join("cohort.ped");
        let bytes = b"F I1 0 0 1 1 A A\nF Jos\xe9 0 0 1 1 A G\nF I3 0 0 1 1 G G\n".to_vec();
        fs::write(&ped_path, bytes).unwrap();
        fs::write(dir.path().join("cohort.map"), "1 rs1 0 100 A G\n").unwrap();
        let mut r = PedReader::open(&ped_path).unwrap();
        let recs: Vec<_> = r.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(recs.len(), 2);
        let report = r.finish();
        assert_eq!(report.records, 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].line, 2);
    }

    #[test]
    fn declared_alleles_drive_dosages() {
        let dir = tempfile::tempdir().unwrap();
        let ped = write_pair(
            dir.path(),
            "F1 I1 0 0 1 -9 A A C T\nF2 I2 0 0 2 -9 A G 0 0\n",
            Some("1 rs1 0 100 A G\n1 rs2 0 200 C T\n"),
        );
        let mut r = PedReader::open(&ped).unwrap();
        let recs: Vec<_> = r.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(recs.len(), 4);
        assert_eq!(&*recs[0].sample_ids, &["I1".to_string()]);
        assert_eq!(recs[0].calls, vec![Genotype::HomRef]);
        assert_eq!(recs[1].calls, vec![Genotype::Het]);
        assert_eq!(recs[2].calls, vec![Genotype::Het]);
        assert_eq!(recs[3].calls, vec![Genotype::Missing]);
        assert_eq!(recs[1].variant.id.as_deref(), Some("rs2"));
        assert_eq!(r.finish().records, 2);
    }

    #[test]
    fn infers_major_allele_as_reference() {
        let dir = tempfile::tempdir().unwrap();
        let ped = write_pair(
            dir.path(),
            "F I1 0 0 1 1 G G T T\nF I2 0 0 1 1 G A T T\nF I3 0 0 1 1 A G T T\n",
            Some("2 m1 0 10\n2 m2 0 20\n"),
        );
        let r = PedReader::open(&ped).unwrap();
        // G: 4 vs A: 2; m2 is monomorphic
        assert_eq!(r.variants()[0].key, VariantKey::new("2", 10, "G", "A"));
        assert_eq!(r.variants()[1].key, VariantKey::new("2", 20, "T", "."));
    }

    #[test]
    fn ties_prefer_lexicographically_smaller_reference() {
        let dir = tempfile::tempdir().unwrap();
        let ped = write_pair(dir.path(), "F I1 0 0 1 1 T C\n", Some("1 m1 0 5\n"));
        let r = PedReader::open(&ped).unwrap();
        assert_eq!(r.variants()[0].key.ref_allele, "C");
        assert_eq!(r.variants()[0].key.alt_allele, "T");
    }

    #[test]
    fn unknown_allele_skips_sample_line() {
        let dir = tempfile::tempdir().unwrap();
        let ped = write_pair(
            dir.path(),
            "F I1 0 0 1 1 A C\nF I2 0 0 1 1 A G\nF I3 0 0 1\n",
            Some("1 m1 0 5 A G\n"),
        );
        let mut r = PedReader::open(&ped).unwrap();
        let recs: Vec<_> = r.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(&*recs[0].sample_ids, &["I2".to_string()]);
        let report = r.finish();
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[0].line, 1);
        assert_eq!(report.rejected[1].line, 3);
    }

    #[test]
    fn missing_map_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ped = write_pair(dir.path(), "F I1 0 0 1 1 A C\n", None);
        assert!(matches!(
            PedReader::open(&ped),
            Err(Error::MissingCompanion { .. })
        ));
    }
}
