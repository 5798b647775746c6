//! Seeded k-means over embedding scores.
//!
//! Initialization is k-means++ driven by a fixed-seed xoshiro generator, so
//! the same embedding and parameters always give the same labels. Lloyd
//! iterations stop when no label changes or the iteration cap is hit; the two
//! outcomes are distinguished by `converged`.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Serialize;
use snpkit_core::{Error, KMeansConfig, Result};

use crate::pca::Embedding;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClusterAssignment {
    /// Cluster label per sample, in embedding order.
    pub labels: Vec<usize>,
    /// k x dimensions
    pub centroids: Array2<f64>,
    pub iterations: usize,
    /// False when the iteration cap stopped the run.
    pub converged: bool,
    /// Sum of squared distances to the assigned centroid.
    pub inertia: f64,
}

impl ClusterAssignment {
    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }

    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters()];
        for &l in &self.labels {
            sizes[l] += 1;
        }
        sizes
    }
}

pub(crate) fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Nearest centroid; ties go to the lower label.
fn nearest(point: ArrayView1<'_, f64>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, centroid) in centroids.outer_iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

fn kmeans_plus_plus(points: ArrayView2<'_, f64>, k: usize, rng: &mut Xoshiro256PlusPlus) -> Array2<f64> {
    let n = points.nrows();
    let mut chosen = vec![rng.gen_range(0..n)];
    let mut dist: Vec<f64> = points
        .outer_iter()
        .map(|p| squared_distance(p, points.row(chosen[0])))
        .collect();

    while chosen.len() < k {
        let total: f64 = dist.iter().sum();
        let next = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            let mut pick = n - 1;
            for (i, &d) in dist.iter().enumerate() {
                acc += d;
                if acc >= target && d > 0.0 {
                    pick = i;
                    break;
                }
            }
            pick
        } else {
            // every point coincides with a centre already; take the first unused
            (0..n).find(|i| !chosen.contains(i)).unwrap_or(0)
        };
        chosen.push(next);
        for (i, p) in points.outer_iter().enumerate() {
            let d = squared_distance(p, points.row(next));
            if d < dist[i] {
                dist[i] = d;
            }
        }
    }
    points.select(Axis(0), &chosen)
}

/// k-means on raw points (rows are observations).
pub fn kmeans_points(points: ArrayView2<'_, f64>, config: &KMeansConfig) -> Result<ClusterAssignment> {
    let (n, dims) = points.dim();
    if config.k == 0 || config.k > n {
        return Err(Error::invalid_argument(format!(
            "k must be within 1..={} (number of samples), got {}",
            n, config.k
        )));
    }
    if config.max_iterations == 0 {
        return Err(Error::invalid_argument("max_iterations must be at least 1"));
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
    let mut centroids = kmeans_plus_plus(points, config.k, &mut rng);
    let mut labels: Vec<usize> = points.outer_iter().map(|p| nearest(p, &centroids).0).collect();

    let mut iterations = 0;
    let mut converged = false;
    while iterations < config.max_iterations {
        iterations += 1;

        let mut sums = Array2::<f64>::zeros((config.k, dims));
        let mut counts = vec![0usize; config.k];
        for (p, &l) in points.outer_iter().zip(&labels) {
            let mut row = sums.row_mut(l);
            row += &p;
            counts[l] += 1;
        }
        for c in 0..config.k {
            // an empty cluster keeps its previous centroid
            if counts[c] > 0 {
                let mean = sums.row(c).mapv(|s| s / counts[c] as f64);
                centroids.row_mut(c).assign(&mean);
            }
        }

        let next: Vec<usize> = points.outer_iter().map(|p| nearest(p, &centroids).0).collect();
        if next == labels {
            converged = true;
            break;
        }
        labels = next;
    }

    let inertia = points
        .outer_iter()
        .zip(&labels)
        .map(|(p, &l)| squared_distance(p, centroids.row(l)))
        .sum();

    if converged {
        log::debug!("k-means (k={}) converged after {} iterations", config.k, iterations);
    } else {
        log::warn!(
            "k-means (k={}) stopped at the iteration cap ({}) before converging",
            config.k,
            config.max_iterations
        );
    }

    Ok(ClusterAssignment {
        labels,
        centroids,
        iterations,
        converged,
        inertia,
    })
}

pub fn kmeans(embedding: &Embedding, config: &KMeansConfig) -> Result<ClusterAssignment> {
    kmeans_points(embedding.scores.view(), config)
}

/// k-means with the default seed.
pub fn cluster(embedding: &Embedding, k: usize, max_iterations: usize) -> Result<ClusterAssignment> {
    let config = KMeansConfig {
        k,
        max_iterations,
        ..KMeansConfig::default()
    };
    kmeans(embedding, &config)
}
