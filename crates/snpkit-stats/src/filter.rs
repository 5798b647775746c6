//! Call-rate, minor-allele-frequency and sample-missingness filtering.
//!
//! Variant thresholds are applied first. Sample call rates are then measured
//! on the variants that survived, and the result is a new matrix.

use std::fmt;

use snpkit_core::{FilterConfig, GenotypeMatrix, Result, SampleId, VariantKey};

/// Which threshold a variant or sample failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Threshold {
    CallRate,
    MinorAlleleFreq,
    SampleMissing,
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Threshold::CallRate => "min_call_rate",
            Threshold::MinorAlleleFreq => "min_minor_allele_freq",
            Threshold::SampleMissing => "max_sample_missing",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Violation {
    pub threshold: Threshold,
    /// NaN when the statistic is undefined (no calls).
    pub observed: f64,
    pub required: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariantExclusion {
    /// Index in the input matrix.
    pub index: usize,
    pub key: VariantKey,
    pub violations: Vec<Violation>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SampleExclusion {
    /// Index in the input matrix.
    pub index: usize,
    pub id: SampleId,
    pub call_rate: f64,
    pub required: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterReport {
    pub excluded_variants: Vec<VariantExclusion>,
    pub excluded_samples: Vec<SampleExclusion>,
    /// Input indices of the variants in the output matrix.
    pub kept_variants: Vec<usize>,
    /// Input indices of the samples in the output matrix.
    pub kept_samples: Vec<usize>,
}

/// `observed >= required`, with undefined statistics failing.
fn passes(observed: f64, required: f64) -> bool {
    observed >= required
}

fn variant_violations(
    m: &GenotypeMatrix,
    v: usize,
    config: &FilterConfig,
) -> Result<Vec<Violation>> {
    let counts = m.genotype_counts(v)?;
    let mut violations = Vec::new();
    if config.min_call_rate > 0.0 {
        let rate = counts.call_rate();
        if !passes(rate, config.min_call_rate) {
            violations.push(Violation {
                threshold: Threshold::CallRate,
                observed: rate,
                required: config.min_call_rate,
            });
        }
    }
    if config.min_minor_allele_freq > 0.0 {
        let p = counts.alt_freq();
        let maf = p.min(1.0 - p);
        if !passes(maf, config.min_minor_allele_freq) {
            violations.push(Violation {
                threshold: Threshold::MinorAlleleFreq,
                observed: maf,
                required: config.min_minor_allele_freq,
            });
        }
    }
    Ok(violations)
}

/// Apply `config` and return the surviving matrix plus what was removed and why.
pub fn filter(m: &GenotypeMatrix, config: &FilterConfig) -> Result<(GenotypeMatrix, FilterReport)> {
    config.validate()?;
    let mut report = FilterReport::default();

    for v in 0..m.n_variants() {
        let violations = variant_violations(m, v, config)?;
        if violations.is_empty() {
            report.kept_variants.push(v);
        } else {
            report.excluded_variants.push(VariantExclusion {
                index: v,
                key: m.variants()[v].key.clone(),
                violations,
            });
        }
    }

    let evaluate_samples = config.max_sample_missing > 0.0 && !report.kept_variants.is_empty();
    for s in 0..m.n_samples() {
        if evaluate_samples {
            let row = m.sample_row(s)?;
            let called = report
                .kept_variants
                .iter()
                .filter(|&&v| !row[v].is_missing())
                .count();
            let rate = called as f64 / report.kept_variants.len() as f64;
            if !passes(rate, config.max_sample_missing) {
                report.excluded_samples.push(SampleExclusion {
                    index: s,
                    id: m.sample_ids()[s].clone(),
                    call_rate: rate,
                    required: config.max_sample_missing,
                });
                continue;
            }
        }
        report.kept_samples.push(s);
    }

    log::info!(
        "Filter kept {}/{} variants and {}/{} samples",
        report.kept_variants.len(),
        m.n_variants(),
        report.kept_samples.len(),
        m.n_samples()
    );
    for ex in &report.excluded_variants {
        log::debug!(
            "excluded variant {} ({}): {:?}",
            ex.index,
            ex.key,
            ex.violations
        );
    }

    let filtered = m.select(&report.kept_samples, &report.kept_variants)?;
    Ok((filtered, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use snpkit_core::{Error, Variant};

    fn variants(n: usize) -> Vec<Variant> {
        (0..n)
            .map(|i| Variant::new(VariantKey::new("1", 100 + i as u64, "A", "G"), None))
            .collect()
    }

    fn ids(n: usize) -> Vec<SampleId> {
        (0..n).map(|i| format!("S{}", i)).collect()
    }

    #[test]
    fn no_op_is_identity() {
        let m = GenotypeMatrix::from_dosage_rows(
            ids(3),
            variants(3),
            &[
                vec![None, Some(0), Some(0)],
                vec![None, Some(0), Some(1)],
                vec![None, None, Some(2)],
            ],
        )
        .unwrap();
        let (out, report) = filter(&m, &FilterConfig::no_op()).unwrap();
        assert_eq!(out, m);
        assert!(report.excluded_variants.is_empty());
        assert!(report.excluded_samples.is_empty());
    }

    #[test]
    fn one_missing_call_fails_full_call_rate() {
        let mut rows: Vec<Vec<Option<u8>>> = (0..10).map(|i| vec![Some(1), Some((i % 3) as u8)]).collect();
        rows[4][0] = None;
        let m = GenotypeMatrix::from_dosage_rows(ids(10), variants(2), &rows).unwrap();
        let config = FilterConfig {
            min_call_rate: 1.0,
            min_minor_allele_freq: 0.0,
            max_sample_missing: 0.0,
        };
        let (out, report) = filter(&m, &config).unwrap();
        assert_eq!(out.n_variants(), 1);
        assert_eq!(report.excluded_variants.len(), 1);
        let ex = &report.excluded_variants[0];
        assert_eq!(ex.index, 0);
        assert_eq!(ex.violations.len(), 1);
        assert_eq!(ex.violations[0].threshold, Threshold::CallRate);
        assert!((ex.violations[0].observed - 0.9).abs() < 1e-12);
    }

    #[test]
    fn maf_rejects_monomorphic_and_uncalled() {
        let m = GenotypeMatrix::from_dosage_rows(
            ids(2),
            variants(3),
            &[vec![Some(0), None, Some(1)], vec![Some(0), None, Some(0)]],
        )
        .unwrap();
        let config = FilterConfig {
            min_call_rate: 0.0,
            min_minor_allele_freq: 0.05,
            max_sample_missing: 0.0,
        };
        let (out, report) = filter(&m, &config).unwrap();
        assert_eq!(report.kept_variants, vec![2]);
        assert_eq!(out.n_variants(), 1);
        assert!(report.excluded_variants[1].violations[0].observed.is_nan());
    }

    #[test]
    fn sample_missingness_uses_surviving_variants() {
        // S1 is missing only at v0, which the call-rate filter removes
        let m = GenotypeMatrix::from_dosage_rows(
            ids(3),
            variants(3),
            &[
                vec![Some(0), Some(1), Some(2)],
                vec![None, Some(1), Some(0)],
                vec![None, None, Some(1)],
            ],
        )
        .unwrap();
        let config = FilterConfig {
            min_call_rate: 0.6,
            min_minor_allele_freq: 0.0,
            max_sample_missing: 0.9,
        };
        let (out, report) = filter(&m, &config).unwrap();
        assert_eq!(report.kept_variants, vec![1, 2]);
        assert_eq!(report.kept_samples, vec![0, 1]);
        assert_eq!(report.excluded_samples[0].id, "S2");
        assert!((report.excluded_samples[0].call_rate - 0.5).abs() < 1e-12);
        assert_eq!(out.sample_ids(), &["S0", "S1"]);
    }

    #[test]
    fn no_surviving_variants_keeps_samples() {
        let m = GenotypeMatrix::from_dosage_rows(ids(2), variants(1), &[vec![None], vec![None]])
            .unwrap();
        let (out, report) = filter(&m, &FilterConfig::default()).unwrap();
        assert_eq!(out.n_variants(), 0);
        assert_eq!(out.n_samples(), 2);
        assert!(report.excluded_samples.is_empty());
    }

    #[test]
    fn invalid_threshold_is_rejected() {
        let m = GenotypeMatrix::empty();
        let config = FilterConfig {
            min_call_rate: 1.5,
            ..FilterConfig::default()
        };
        assert!(matches!(
            filter(&m, &config),
            Err(Error::InvalidArgument { .. })
        ));
    }
}
