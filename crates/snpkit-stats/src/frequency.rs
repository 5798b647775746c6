use snpkit_core::{GenotypeCounts, GenotypeMatrix, Result};

/// Allele tallies at one variant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlleleFrequencyRecord {
    pub variant: usize,
    pub ref_count: usize,
    pub alt_count: usize,
    /// (het + 2 * hom_alt) / (2 * called); NaN when nothing is called.
    pub alt_freq: f64,
    pub missing: usize,
}

impl AlleleFrequencyRecord {
    fn from_counts(variant: usize, counts: &GenotypeCounts) -> Self {
        Self {
            variant,
            ref_count: counts.ref_allele_count(),
            alt_count: counts.alt_allele_count(),
            alt_freq: counts.alt_freq(),
            missing: counts.missing,
        }
    }

    pub fn minor_allele_freq(&self) -> f64 {
        self.alt_freq.min(1.0 - self.alt_freq)
    }

    pub fn called_samples(&self) -> usize {
        (self.ref_count + self.alt_count) / 2
    }
}

pub fn allele_frequency(m: &GenotypeMatrix, v: usize) -> Result<AlleleFrequencyRecord> {
    let counts = m.genotype_counts(v)?;
    Ok(AlleleFrequencyRecord::from_counts(v, &counts))
}

/// One record per variant, in matrix order.
pub fn allele_frequencies(m: &GenotypeMatrix) -> Vec<AlleleFrequencyRecord> {
    m.calls()
        .columns()
        .into_iter()
        .enumerate()
        .map(|(v, col)| AlleleFrequencyRecord::from_counts(v, &GenotypeCounts::from_calls(col.iter())))
        .collect()
}
