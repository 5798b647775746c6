//! Dosage recoding, mean imputation and column standardization.
//!
//! Missing calls are imputed to the variant's mean dosage 2p. Columns are then
//! centered and scaled by their population standard deviation. A column with
//! no calls, or whose calls are all identical, carries no information and is
//! dropped and reported.

use ndarray::Array2;
use serde::Serialize;
use snpkit_core::{GenotypeCounts, GenotypeMatrix, VariantKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    ZeroVariance,
    NoCalls,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DroppedColumn {
    /// Variant index in the input matrix.
    pub index: usize,
    pub key: VariantKey,
    pub reason: DropReason,
}

#[derive(Clone, Debug)]
pub struct StandardizedMatrix {
    /// samples x kept variants, zero mean and unit variance per column
    pub values: Array2<f64>,
    /// Input variant index of each column of `values`.
    pub kept: Vec<usize>,
    pub dropped: Vec<DroppedColumn>,
    /// Column means before centering (2p).
    pub means: Vec<f64>,
    /// Population standard deviations after imputation.
    pub std_devs: Vec<f64>,
    pub imputed_calls: usize,
}

impl StandardizedMatrix {
    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_kept(&self) -> usize {
        self.kept.len()
    }
}

fn is_invariant(c: &GenotypeCounts) -> bool {
    let called = c.called();
    c.hom_ref == called || c.het == called || c.hom_alt == called
}

pub fn prepare_dosages(m: &GenotypeMatrix) -> StandardizedMatrix {
    let n = m.n_samples();
    let mut kept = Vec::new();
    let mut dropped = Vec::new();
    let mut means = Vec::new();
    let mut std_devs = Vec::new();
    let mut imputed_calls = 0;

    for (v, col) in m.calls().columns().into_iter().enumerate() {
        let counts = GenotypeCounts::from_calls(col.iter());
        let reason = if counts.called() == 0 {
            Some(DropReason::NoCalls)
        } else if is_invariant(&counts) {
            Some(DropReason::ZeroVariance)
        } else {
            None
        };
        if let Some(reason) = reason {
            dropped.push(DroppedColumn {
                index: v,
                key: m.variants()[v].key.clone(),
                reason,
            });
            continue;
        }

        let mean = 2.0 * counts.alt_freq();
        // imputed cells sit on the mean and add nothing to the sum of squares
        let ss: f64 = col
            .iter()
            .filter_map(|g| g.dosage())
            .map(|d| {
                let x = f64::from(d) - mean;
                x * x
            })
            .sum();
        kept.push(v);
        means.push(mean);
        std_devs.push((ss / n as f64).sqrt());
        imputed_calls += counts.missing;
    }

    let mut values = Array2::<f64>::zeros((n, kept.len()));
    for (j, &v) in kept.iter().enumerate() {
        let (mean, sd) = (means[j], std_devs[j]);
        for (s, g) in m.calls().column(v).iter().enumerate() {
            values[(s, j)] = match g.dosage() {
                Some(d) => (f64::from(d) - mean) / sd,
                None => 0.0,
            };
        }
    }

    if !dropped.is_empty() {
        log::info!(
            "Dropped {} uninformative variant(s) before PCA ({} kept)",
            dropped.len(),
            kept.len()
        );
    }
    if imputed_calls > 0 {
        log::debug!("Imputed {} missing calls to the variant mean dosage", imputed_calls);
    }

    StandardizedMatrix {
        values,
        kept,
        dropped,
        means,
        std_devs,
        imputed_calls,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use snpkit_core::Variant;

    fn matrix(rows: &[Vec<Option<u8>>]) -> GenotypeMatrix {
        let nv = rows[0].len();
        let variants = (0..nv)
            .map(|i| Variant::new(VariantKey::new("1", i as u64 + 1, "A", "G"), None))
            .collect();
        let ids = (0..rows.len()).map(|i| format!("S{}", i)).collect();
        GenotypeMatrix::from_dosage_rows(ids, variants, rows).unwrap()
    }

    #[test]
    fn drops_invariant_and_uncalled_columns() {
        let m = matrix(&[
            vec![Some(0), None, Some(0), Some(1)],
            vec![Some(0), None, Some(1), Some(1)],
            vec![Some(0), None, Some(2), None],
        ]);
        let z = prepare_dosages(&m);
        assert_eq!(z.kept, vec![2]);
        assert_eq!(z.dropped.len(), 3);
        assert_eq!(z.dropped[0].reason, DropReason::ZeroVariance);
        assert_eq!(z.dropped[1].reason, DropReason::NoCalls);
        // het everywhere it is called: still invariant
        assert_eq!(z.dropped[2].index, 3);
        assert_eq!(z.dropped[2].reason, DropReason::ZeroVariance);
    }

    #[test]
    fn imputes_mean_and_scales_to_unit_variance() {
        let m = matrix(&[vec![Some(0)], vec![Some(2)], vec![None], vec![Some(1)]]);
        let z = prepare_dosages(&m);
        assert_eq!(z.imputed_calls, 1);
        assert_relative_eq!(z.means[0], 1.0);
        let col = z.values.column(0);
        assert_relative_eq!(col.sum(), 0.0, epsilon = 1e-12);
        let var = col.iter().map(|x| x * x).sum::<f64>() / col.len() as f64;
        assert_relative_eq!(var, 1.0, epsilon = 1e-12);
        assert_eq!(col[2], 0.0);
    }
}
