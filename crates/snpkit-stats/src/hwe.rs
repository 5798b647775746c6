//! Hardy-Weinberg equilibrium tests.
//!
//! The chi-square statistic (1 df) is only reported when every expected
//! genotype count is at least 5; otherwise it is NaN and the result is flagged
//! `LowExpectedCount`. The exact test of Wigginton, Cutler & Abecasis (2005)
//! is computed for every site with at least one call, so the fallback is
//! always present in the same result.

use snpkit_core::{GenotypeCounts, GenotypeMatrix, Result};
use statrs::distribution::{ChiSquared, ContinuousCDF};

pub const MIN_EXPECTED_COUNT: f64 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HweStatus {
    Ok,
    /// Some expected count is below `MIN_EXPECTED_COUNT`; use `exact_p_value`.
    LowExpectedCount,
    NoCalls,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HweResult {
    pub variant: usize,
    pub counts: GenotypeCounts,
    /// Expected (hom_ref, het, hom_alt) under random mating.
    pub expected: [f64; 3],
    pub chi_square: f64,
    pub p_value: f64,
    pub exact_p_value: f64,
    pub status: HweStatus,
}

fn chi_square_p(stat: f64) -> f64 {
    match ChiSquared::new(1.0) {
        Ok(dist) => (1.0 - dist.cdf(stat)).max(0.0),
        Err(e) => {
            log::error!("chi-square distribution unavailable: {}", e);
            f64::NAN
        }
    }
}

/// Exact HWE p-value from genotype counts.
///
/// Enumerates heterozygote counts with the same allele counts and sums the
/// probabilities of configurations no more likely than the observed one.
pub fn hwe_exact(het: usize, hom_ref: usize, hom_alt: usize) -> f64 {
    let n = het + hom_ref + hom_alt;
    if n == 0 {
        return f64::NAN;
    }
    let hom_rare = hom_ref.min(hom_alt);
    let rare = 2 * hom_rare + het;

    let mut probs = vec![0.0f64; rare + 1];
    let mut mid = rare * (2 * n - rare) / (2 * n);
    if (rare % 2) != (mid % 2) {
        mid += 1;
    }
    probs[mid] = 1.0;
    let mut sum = 1.0;

    let mut h = mid;
    let mut hr = (rare - mid) / 2;
    let mut hc = n - h - hr;
    while h >= 2 {
        let p = probs[h] * (h * (h - 1)) as f64 / (4.0 * ((hr + 1) * (hc + 1)) as f64);
        probs[h - 2] = p;
        sum += p;
        h -= 2;
        hr += 1;
        hc += 1;
    }

    let mut h = mid;
    let mut hr = (rare - mid) / 2;
    let mut hc = n - h - hr;
    while h + 2 <= rare {
        let p = probs[h] * (4 * hr * hc) as f64 / ((h + 2) * (h + 1)) as f64;
        probs[h + 2] = p;
        sum += p;
        h += 2;
        hr -= 1;
        hc -= 1;
    }

    let observed = probs[het] / sum;
    let p: f64 = probs
        .iter()
        .map(|&x| x / sum)
        .filter(|&x| x <= observed * (1.0 + 1e-7))
        .sum();
    p.min(1.0)
}

pub fn hwe_from_counts(variant: usize, counts: GenotypeCounts) -> HweResult {
    let n = counts.called();
    if n == 0 {
        return HweResult {
            variant,
            counts,
            expected: [f64::NAN; 3],
            chi_square: f64::NAN,
            p_value: f64::NAN,
            exact_p_value: f64::NAN,
            status: HweStatus::NoCalls,
        };
    }

    let nf = n as f64;
    let p = counts.alt_freq();
    let q = 1.0 - p;
    let expected = [nf * q * q, 2.0 * nf * p * q, nf * p * p];
    let exact_p_value = hwe_exact(counts.het, counts.hom_ref, counts.hom_alt);

    if expected.iter().any(|&e| e < MIN_EXPECTED_COUNT) {
        return HweResult {
            variant,
            counts,
            expected,
            chi_square: f64::NAN,
            p_value: f64::NAN,
            exact_p_value,
            status: HweStatus::LowExpectedCount,
        };
    }

    let observed = [counts.hom_ref, counts.het, counts.hom_alt];
    let chi_square: f64 = observed
        .iter()
        .zip(&expected)
        .map(|(&o, &e)| {
            let d = o as f64 - e;
            d * d / e
        })
        .sum();

    HweResult {
        variant,
        counts,
        expected,
        chi_square,
        p_value: chi_square_p(chi_square),
        exact_p_value,
        status: HweStatus::Ok,
    }
}

pub fn hwe_test(m: &GenotypeMatrix, v: usize) -> Result<HweResult> {
    let counts = m.genotype_counts(v)?;
    Ok(hwe_from_counts(v, counts))
}

/// HWE results for every variant in matrix order.
pub fn hwe_table(m: &GenotypeMatrix) -> Vec<HweResult> {
    let results: Vec<HweResult> = m
        .calls()
        .columns()
        .into_iter()
        .enumerate()
        .map(|(v, col)| hwe_from_counts(v, GenotypeCounts::from_calls(col.iter())))
        .collect();
    let flagged = results
        .iter()
        .filter(|r| r.status == HweStatus::LowExpectedCount)
        .count();
    if flagged > 0 {
        log::debug!(
            "{} of {} variants have expected counts below {}; chi-square withheld",
            flagged,
            results.len(),
            MIN_EXPECTED_COUNT
        );
    }
    results
}
