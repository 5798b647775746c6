//! Pairwise linkage disequilibrium from unphased genotypes.
//!
//! r is the Pearson correlation of alternate-allele dosages over the samples
//! called at both sites (the genotypic, count-based estimator; no EM phasing).
//! Sums are accumulated as integers, so `ld(m, a, b)` and `ld(m, b, a)` are
//! bit-identical.

use ndarray::ArrayView1;
use snpkit_core::{Genotype, GenotypeMatrix, Result};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LdRecord {
    pub variant_a: usize,
    pub variant_b: usize,
    /// In [0, 1]; NaN when fewer than 2 shared calls or a site is invariant
    /// among them.
    pub r2: f64,
    pub r: f64,
    /// Samples called at both sites.
    pub n_samples: usize,
}

fn correlation(x: ArrayView1<'_, Genotype>, y: ArrayView1<'_, Genotype>) -> (f64, usize) {
    let mut n: i64 = 0;
    let mut sum_x: i64 = 0;
    let mut sum_y: i64 = 0;
    let mut sum_xy: i64 = 0;
    let mut sum_x2: i64 = 0;
    let mut sum_y2: i64 = 0;
    for (gx, gy) in x.iter().zip(y.iter()) {
        if let (Some(a), Some(b)) = (gx.dosage(), gy.dosage()) {
            let (a, b) = (a as i64, b as i64);
            n += 1;
            sum_x += a;
            sum_y += b;
            sum_xy += a * b;
            sum_x2 += a * a;
            sum_y2 += b * b;
        }
    }
    if n < 2 {
        return (f64::NAN, n as usize);
    }
    // n^2 times the population (co)variances
    let cov = n * sum_xy - sum_x * sum_y;
    let var_x = n * sum_x2 - sum_x * sum_x;
    let var_y = n * sum_y2 - sum_y * sum_y;
    if var_x == 0 || var_y == 0 {
        return (f64::NAN, n as usize);
    }
    let r = cov as f64 / ((var_x as f64) * (var_y as f64)).sqrt();
    (r.clamp(-1.0, 1.0), n as usize)
}

/// LD between two variants of `m`.
pub fn ld(m: &GenotypeMatrix, a: usize, b: usize) -> Result<LdRecord> {
    let x = m.variant_column(a)?;
    let y = m.variant_column(b)?;
    let (r, n_samples) = correlation(x, y);
    Ok(LdRecord {
        variant_a: a,
        variant_b: b,
        r2: r * r,
        r,
        n_samples,
    })
}

/// LD for an explicit list of pairs; fails on the first bad index.
pub fn ld_pairs(m: &GenotypeMatrix, pairs: &[(usize, usize)]) -> Result<Vec<LdRecord>> {
    pairs.iter().map(|&(a, b)| ld(m, a, b)).collect()
}

/// Pairs (i, j), i < j, on the same chromosome with j - i <= `window`.
pub fn window_pairs(m: &GenotypeMatrix, window: usize) -> Vec<(usize, usize)> {
    let variants = m.variants();
    let mut pairs = Vec::new();
    for i in 0..variants.len() {
        let upper = i.saturating_add(window).min(variants.len().saturating_sub(1));
        for j in (i + 1)..=upper {
            if variants[j].key.chrom == variants[i].key.chrom {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// Sliding-window LD over matrix order.
pub fn ld_window(m: &GenotypeMatrix, window: usize) -> Vec<LdRecord> {
    let pairs = window_pairs(m, window);
    log::debug!("LD window {}: {} pairs", window, pairs.len());
    pairs
        .into_iter()
        .map(|(a, b)| {
            let (r, n_samples) = correlation(
                m.calls().column(a),
                m.calls().column(b),
            );
            LdRecord {
                variant_a: a,
                variant_b: b,
                r2: r * r,
                r,
                n_samples,
            }
        })
        .collect()
}
