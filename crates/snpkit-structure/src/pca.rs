//! Principal components of the standardized dosage matrix.
//!
//! The eigen-decomposition runs on whichever of the sample Gram matrix (n x n)
//! or the variant cross-product (p x p) is smaller; both give the same
//! components.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use ndarray::{Array2, ArrayView1, Axis};
use serde::Serialize;
use snpkit_core::{Error, GenotypeMatrix, Result, SampleId};

use crate::standardize::{prepare_dosages, DroppedColumn, StandardizedMatrix};

/// Relative eigenvalue difference under which two components count as tied.
pub const TIE_TOLERANCE: f64 = 1e-9;

/// Samples placed in principal-component space.
#[derive(Clone, Debug, Serialize)]
pub struct Embedding {
    pub sample_ids: Vec<SampleId>,
    /// n_samples x n_components
    pub scores: Array2<f64>,
    /// Variance captured by each component.
    pub eigenvalues: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
    /// kept variants x n_components
    pub loadings: Array2<f64>,
    /// Input variant index of each loading row.
    pub variant_indices: Vec<usize>,
    pub dropped: Vec<DroppedColumn>,
}

impl Embedding {
    pub fn n_samples(&self) -> usize {
        self.scores.nrows()
    }

    pub fn n_components(&self) -> usize {
        self.scores.ncols()
    }

    pub fn point(&self, sample: usize) -> ArrayView1<'_, f64> {
        self.scores.index_axis(Axis(0), sample)
    }
}

struct Component {
    /// Squared singular value of the centered matrix.
    s2: f64,
    loading: DVector<f64>,
    score: DVector<f64>,
    /// Original variant index of the largest absolute loading.
    anchor: usize,
}

fn argmax_abs(v: &DVector<f64>) -> usize {
    let mut best = 0;
    for i in 1..v.len() {
        if v[i].abs() > v[best].abs() {
            best = i;
        }
    }
    best
}

fn finish_component(
    s2: f64,
    mut loading: DVector<f64>,
    mut score: DVector<f64>,
    kept: &[usize],
) -> Component {
    let top = argmax_abs(&loading);
    if !loading.is_empty() && loading[top] < 0.0 {
        loading.neg_mut();
        score.neg_mut();
    }
    Component {
        s2,
        loading,
        score,
        anchor: kept.get(top).copied().unwrap_or(0),
    }
}

/// Components from the n x n Gram matrix X Xᵀ.
fn gram_components(x: &DMatrix<f64>, kept: &[usize], negligible: f64) -> Vec<Component> {
    let (n, p) = x.shape();
    let eig = SymmetricEigen::new(x * x.transpose());
    (0..n)
        .map(|i| {
            let s2 = eig.eigenvalues[i].max(0.0);
            let u = eig.eigenvectors.column(i).into_owned();
            if s2 <= negligible {
                return finish_component(0.0, DVector::zeros(p), DVector::zeros(n), kept);
            }
            let s = s2.sqrt();
            let loading = x.transpose() * &u / s;
            finish_component(s2, loading, u * s, kept)
        })
        .collect()
}

/// Components from the p x p cross-product XᵀX.
fn cross_components(x: &DMatrix<f64>, kept: &[usize]) -> Vec<Component> {
    let p = x.ncols();
    let eig = SymmetricEigen::new(x.transpose() * x);
    (0..p)
        .map(|i| {
            let s2 = eig.eigenvalues[i].max(0.0);
            let v = eig.eigenvectors.column(i).into_owned();
            let score = x * &v;
            finish_component(s2, v, score, kept)
        })
        .collect()
}

fn decompose(x: &DMatrix<f64>, kept: &[usize], negligible: f64) -> Vec<Component> {
    if x.nrows() <= x.ncols() {
        gram_components(x, kept, negligible)
    } else {
        cross_components(x, kept)
    }
}

/// Descending eigenvalue; within a tie group, lowest anchor variant first.
fn order_components(mut comps: Vec<Component>) -> Vec<Component> {
    // SymmetricEigen does not sort its eigenvalues
    comps.sort_by(|a, b| b.s2.partial_cmp(&a.s2).unwrap_or(std::cmp::Ordering::Equal));
    let mut start = 0;
    while start < comps.len() {
        let lead = comps[start].s2;
        let mut end = start + 1;
        while end < comps.len() && lead - comps[end].s2 <= TIE_TOLERANCE * lead.max(f64::MIN_POSITIVE) {
            end += 1;
        }
        comps[start..end].sort_by_key(|c| c.anchor);
        start = end;
    }
    comps
}

/// PCA on an already standardized matrix.
pub fn pca_standardized(
    z: &StandardizedMatrix,
    sample_ids: Vec<SampleId>,
    n_components: usize,
) -> Result<Embedding> {
    let (n, p) = (z.n_samples(), z.n_kept());
    if n_components == 0 {
        return Err(Error::invalid_argument("n_components must be at least 1"));
    }
    if n < 2 {
        return Err(Error::invalid_argument(format!(
            "PCA needs at least 2 samples, got {}",
            n
        )));
    }
    if p == 0 {
        return Err(Error::invalid_argument(format!(
            "no informative variants left for PCA ({} dropped)",
            z.dropped.len()
        )));
    }
    let available = (n - 1).min(p);
    if n_components > available {
        return Err(Error::invalid_argument(format!(
            "requested {} components but only {} are available ({} samples, {} variants)",
            n_components, available, n, p
        )));
    }

    let x = DMatrix::from_fn(n, p, |i, j| z.values[(i, j)]);
    let total = x.norm_squared();
    let comps = order_components(decompose(&x, &z.kept, total * 1e-12));

    let scores = Array2::from_shape_fn((n, n_components), |(i, k)| comps[k].score[i]);
    let loadings = Array2::from_shape_fn((p, n_components), |(j, k)| comps[k].loading[j]);
    let explained_variance_ratio: Vec<f64> = comps[..n_components]
        .iter()
        .map(|c| if total > 0.0 { c.s2 / total } else { f64::NAN })
        .collect();
    let eigenvalues = comps[..n_components]
        .iter()
        .map(|c| c.s2 / (n - 1) as f64)
        .collect();

    log::info!(
        "PCA: {} samples x {} variants, explained variance {:?}",
        n,
        p,
        explained_variance_ratio
    );

    Ok(Embedding {
        sample_ids,
        scores,
        eigenvalues,
        explained_variance_ratio,
        loadings,
        variant_indices: z.kept.clone(),
        dropped: z.dropped.clone(),
    })
}

/// Impute, standardize and project `m` onto its first `n_components` PCs.
pub fn pca(m: &GenotypeMatrix, n_components: usize) -> Result<Embedding> {
    let z = prepare_dosages(m);
    pca_standardized(&z, m.sample_ids().to_vec(), n_components)
}
