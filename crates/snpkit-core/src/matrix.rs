//! The immutable samples × variants genotype matrix.

use ndarray::{Array2, ArrayView1, Axis as NdAxis};
use std::collections::HashSet;

use crate::error::{check_index, Axis, Error, Result};
use crate::genotype::{Genotype, GenotypeCounts};
use crate::index::{SampleId, Variant};

/// Genotype calls for every (sample, variant) pair.
///
/// Rows are samples, columns are variants. Once built the matrix is never
/// mutated; filtering and subsetting construct a new one.
#[derive(Clone, Debug, PartialEq)]
pub struct GenotypeMatrix {
    sample_ids: Vec<SampleId>,
    variants: Vec<Variant>,
    /// shape: (n_samples, n_variants)
    calls: Array2<Genotype>,
}

impl GenotypeMatrix {
    /// Assemble a matrix, checking that the grid matches both indices.
    pub fn new(
        sample_ids: Vec<SampleId>,
        variants: Vec<Variant>,
        calls: Array2<Genotype>,
    ) -> Result<Self> {
        if calls.nrows() != sample_ids.len() || calls.ncols() != variants.len() {
            return Err(Error::invalid_argument(format!(
                "call grid is {}x{} but there are {} samples and {} variants",
                calls.nrows(),
                calls.ncols(),
                sample_ids.len(),
                variants.len()
            )));
        }
        let mut seen = HashSet::with_capacity(sample_ids.len());
        for id in &sample_ids {
            if !seen.insert(id.as_str()) {
                return Err(Error::invalid_argument(format!(
                    "duplicate sample id '{}'",
                    id
                )));
            }
        }
        let mut seen_keys = HashSet::with_capacity(variants.len());
        for v in &variants {
            if !seen_keys.insert(&v.key) {
                return Err(Error::invalid_argument(format!(
                    "duplicate variant '{}'",
                    v.key
                )));
            }
        }
        Ok(Self {
            sample_ids,
            variants,
            calls,
        })
    }

    /// Build from per-sample rows of additive codes (0/1/2, anything else = missing).
    /// Mostly useful for tests and small in-memory data.
    pub fn from_dosage_rows(
        sample_ids: Vec<SampleId>,
        variants: Vec<Variant>,
        rows: &[Vec<Option<u8>>],
    ) -> Result<Self> {
        let n_variants = variants.len();
        if rows.len() != sample_ids.len() {
            return Err(Error::invalid_argument(format!(
                "{} rows for {} samples",
                rows.len(),
                sample_ids.len()
            )));
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != n_variants) {
            return Err(Error::invalid_argument(format!(
                "row {} has {} calls, expected {}",
                bad,
                rows[bad].len(),
                n_variants
            )));
        }
        let calls = Array2::from_shape_fn((rows.len(), n_variants), |(s, v)| {
            rows[s][v]
                .and_then(Genotype::from_dosage)
                .unwrap_or(Genotype::Missing)
        });
        Self::new(sample_ids, variants, calls)
    }

    pub fn empty() -> Self {
        Self {
            sample_ids: Vec::new(),
            variants: Vec::new(),
            calls: Array2::from_elem((0, 0), Genotype::Missing),
        }
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn n_variants(&self) -> usize {
        self.variants.len()
    }

    pub fn sample_ids(&self) -> &[SampleId] {
        &self.sample_ids
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn calls(&self) -> &Array2<Genotype> {
        &self.calls
    }

    pub fn variant(&self, v: usize) -> Result<&Variant> {
        check_index(Axis::Variant, v, self.n_variants())?;
        Ok(&self.variants[v])
    }

    pub fn get(&self, sample: usize, variant: usize) -> Result<Genotype> {
        check_index(Axis::Sample, sample, self.n_samples())?;
        check_index(Axis::Variant, variant, self.n_variants())?;
        Ok(self.calls[(sample, variant)])
    }

    /// All calls at one variant, in sample order.
    pub fn variant_column(&self, v: usize) -> Result<ArrayView1<'_, Genotype>> {
        check_index(Axis::Variant, v, self.n_variants())?;
        Ok(self.calls.index_axis(NdAxis(1), v))
    }

    /// All calls of one sample, in variant order.
    pub fn sample_row(&self, s: usize) -> Result<ArrayView1<'_, Genotype>> {
        check_index(Axis::Sample, s, self.n_samples())?;
        Ok(self.calls.index_axis(NdAxis(0), s))
    }

    pub fn genotype_counts(&self, v: usize) -> Result<GenotypeCounts> {
        let col = self.variant_column(v)?;
        Ok(GenotypeCounts::from_calls(col.iter()))
    }

    pub fn sample_counts(&self, s: usize) -> Result<GenotypeCounts> {
        let row = self.sample_row(s)?;
        Ok(GenotypeCounts::from_calls(row.iter()))
    }

    /// Alternate-allele dosages as floats, NaN for missing calls.
    pub fn dosages(&self) -> Array2<f64> {
        self.calls
            .mapv(|g| g.dosage().map(f64::from).unwrap_or(f64::NAN))
    }

    /// New matrix restricted to the given sample and variant indices, in the
    /// order given.
    pub fn select(&self, samples: &[usize], variants: &[usize]) -> Result<Self> {
        for &s in samples {
            check_index(Axis::Sample, s, self.n_samples())?;
        }
        for &v in variants {
            check_index(Axis::Variant, v, self.n_variants())?;
        }
        let calls = Array2::from_shape_fn((samples.len(), variants.len()), |(i, j)| {
            self.calls[(samples[i], variants[j])]
        });
        Self::new(
            samples.iter().map(|&s| self.sample_ids[s].clone()).collect(),
            variants.iter().map(|&v| self.variants[v].clone()).collect(),
            calls,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::VariantKey;

    fn variant(pos: u64) -> Variant {
        Variant::new(VariantKey::new("1", pos, "A", "G"), None)
    }

    fn small() -> GenotypeMatrix {
        GenotypeMatrix::from_dosage_rows(
            vec!["S1".into(), "S2".into(), "S3".into()],
            vec![variant(10), variant(20)],
            &[
                vec![Some(0), Some(2)],
                vec![Some(1), None],
                vec![Some(2), Some(2)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn shape_and_access() {
        let m = small();
        assert_eq!(m.n_samples(), 3);
        assert_eq!(m.n_variants(), 2);
        assert_eq!(m.get(1, 0).unwrap(), Genotype::Het);
        assert_eq!(m.get(1, 1).unwrap(), Genotype::Missing);
        assert!(matches!(
            m.get(0, 2),
            Err(Error::IndexOutOfRange { axis: Axis::Variant, .. })
        ));
    }

    #[test]
    fn counts_per_variant() {
        let m = small();
        let c = m.genotype_counts(1).unwrap();
        assert_eq!(c.hom_alt, 2);
        assert_eq!(c.missing, 1);
    }

    #[test]
    fn select_builds_new_matrix() {
        let m = small();
        let sub = m.select(&[2, 0], &[1]).unwrap();
        assert_eq!(sub.sample_ids(), &["S3".to_string(), "S1".to_string()]);
        assert_eq!(sub.get(0, 0).unwrap(), Genotype::HomAlt);
        assert_eq!(m.n_variants(), 2);
    }

    #[test]
    fn rejects_shape_mismatch_and_duplicates() {
        let calls = Array2::from_elem((2, 1), Genotype::HomRef);
        assert!(GenotypeMatrix::new(vec!["S1".into()], vec![variant(1)], calls).is_err());

        let calls = Array2::from_elem((2, 1), Genotype::HomRef);
        assert!(GenotypeMatrix::new(
            vec!["S1".into(), "S1".into()],
            vec![variant(1)],
            calls
        )
        .is_err());
    }

    #[test]
    fn dosages_mark_missing_as_nan() {
        let d = small().dosages();
        assert_eq!(d[(2, 0)], 2.0);
        assert!(d[(1, 1)].is_nan());
    }
}
