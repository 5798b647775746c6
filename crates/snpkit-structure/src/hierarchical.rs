//! Agglomerative clustering of embedded samples.
//!
//! Distances between clusters are updated with the Lance-Williams recurrence
//! for the chosen linkage, starting from Euclidean distances. At each step the
//! closest pair merges; equal distances are resolved by the lower sum of
//! member sample indices, then by the lower cluster id.

use ndarray::{Array2, ArrayView2, Axis};
use serde::Serialize;
use snpkit_core::{Error, Linkage, Result};

use crate::kmeans::{squared_distance, ClusterAssignment};
use crate::pca::Embedding;

/// One merge step. Ids below `n_samples` are samples; merge `i` creates
/// cluster `n_samples + i`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    /// Samples in the merged cluster.
    pub size: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct Dendrogram {
    pub linkage: Linkage,
    pub n_samples: usize,
    /// In merge order, which is non-decreasing in distance for these linkages.
    pub merges: Vec<Merge>,
    #[serde(skip)]
    points: Array2<f64>,
}

struct Cluster {
    id: usize,
    size: usize,
    index_sum: usize,
}

fn lance_williams(linkage: Linkage, d_ki: f64, d_kj: f64, d_ij: f64, n_i: f64, n_j: f64, n_k: f64) -> f64 {
    match linkage {
        Linkage::Single => d_ki.min(d_kj),
        Linkage::Complete => d_ki.max(d_kj),
        Linkage::Average => (n_i * d_ki + n_j * d_kj) / (n_i + n_j),
        Linkage::Ward => {
            let t = n_i + n_j + n_k;
            (((n_i + n_k) * d_ki * d_ki + (n_j + n_k) * d_kj * d_kj - n_k * d_ij * d_ij) / t)
                .max(0.0)
                .sqrt()
        }
    }
}

pub fn hierarchical_points(points: ArrayView2<'_, f64>, linkage: Linkage) -> Result<Dendrogram> {
    let n = points.nrows();
    if n == 0 {
        return Err(Error::invalid_argument("cannot cluster an empty embedding"));
    }

    let mut dist = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let d = squared_distance(points.row(i), points.row(j)).sqrt();
            dist[(i, j)] = d;
            dist[(j, i)] = d;
        }
    }

    // slot i holds the cluster currently occupying row/column i of `dist`
    let mut slots: Vec<Option<Cluster>> = (0..n)
        .map(|i| {
            Some(Cluster {
                id: i,
                size: 1,
                index_sum: i,
            })
        })
        .collect();
    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    for step in 0..n.saturating_sub(1) {
        let mut best: Option<(usize, usize, f64, usize, usize)> = None;
        for a in 0..n {
            let Some(ca) = &slots[a] else { continue };
            for b in (a + 1)..n {
                let Some(cb) = &slots[b] else { continue };
                let d = dist[(a, b)];
                let sum = ca.index_sum + cb.index_sum;
                let low_id = ca.id.min(cb.id);
                let better = match best {
                    None => true,
                    Some((_, _, bd, bsum, bid)) => {
                        d < bd || (d == bd && (sum < bsum || (sum == bsum && low_id < bid)))
                    }
                };
                if better {
                    best = Some((a, b, d, sum, low_id));
                }
            }
        }
        let Some((a, b, d_ab, _, _)) = best else { break };
        let (Some(ca), Some(cb)) = (slots[a].take(), slots[b].take()) else {
            break;
        };

        let (n_i, n_j) = (ca.size as f64, cb.size as f64);
        for k in 0..n {
            if k == a || k == b {
                continue;
            }
            if let Some(ck) = &slots[k] {
                let updated = lance_williams(linkage, dist[(k, a)], dist[(k, b)], d_ab, n_i, n_j, ck.size as f64);
                dist[(k, a)] = updated;
                dist[(a, k)] = updated;
            }
        }

        let (left, right) = (ca.id.min(cb.id), ca.id.max(cb.id));
        let size = ca.size + cb.size;
        merges.push(Merge {
            left,
            right,
            distance: d_ab,
            size,
        });
        slots[a] = Some(Cluster {
            id: n + step,
            size,
            index_sum: ca.index_sum + cb.index_sum,
        });
    }

    log::debug!("{:?} linkage: {} merges over {} samples", linkage, merges.len(), n);
    Ok(Dendrogram {
        linkage,
        n_samples: n,
        merges,
        points: points.to_owned(),
    })
}

pub fn hierarchical(embedding: &Embedding, linkage: Linkage) -> Result<Dendrogram> {
    hierarchical_points(embedding.scores.view(), linkage)
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

impl Dendrogram {
    /// Flat clustering with `k` clusters: replay the first `n - k` merges.
    ///
    /// Labels are numbered in order of each cluster's smallest sample index.
    pub fn cut(&self, k: usize) -> Result<ClusterAssignment> {
        let n = self.n_samples;
        if k == 0 || k > n {
            return Err(Error::invalid_argument(format!(
                "cannot cut {} samples into {} clusters",
                n, k
            )));
        }
        let mut parent: Vec<usize> = (0..(2 * n).saturating_sub(1)).collect();
        for (step, m) in self.merges.iter().take(n - k).enumerate() {
            let node = n + step;
            let (l, r) = (find(&mut parent, m.left), find(&mut parent, m.right));
            parent[l] = node;
            parent[r] = node;
        }

        let mut label_of_root = std::collections::HashMap::new();
        let mut labels = Vec::with_capacity(n);
        for s in 0..n {
            let root = find(&mut parent, s);
            let next = label_of_root.len();
            labels.push(*label_of_root.entry(root).or_insert(next));
        }

        let dims = self.points.ncols();
        let mut centroids = Array2::<f64>::zeros((k, dims));
        let mut counts = vec![0usize; k];
        for (p, &l) in self.points.axis_iter(Axis(0)).zip(&labels) {
            let mut row = centroids.row_mut(l);
            row += &p;
            counts[l] += 1;
        }
        for (mut row, &c) in centroids.axis_iter_mut(Axis(0)).zip(&counts) {
            row /= c as f64;
        }
        let inertia = self
            .points
            .axis_iter(Axis(0))
            .zip(&labels)
            .map(|(p, &l)| squared_distance(p, centroids.row(l)))
            .sum();

        Ok(ClusterAssignment {
            labels,
            centroids,
            iterations: n - k,
            converged: true,
            inertia,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn merges_nearest_first() {
        let pts = array![[0.0], [1.0], [5.0], [5.5]];
        let d = hierarchical_points(pts.view(), Linkage::Single).unwrap();
        assert_eq!(d.merges.len(), 3);
        assert_eq!((d.merges[0].left, d.merges[0].right), (2, 3));
        assert_eq!((d.merges[1].left, d.merges[1].right), (0, 1));
        assert_eq!((d.merges[2].left, d.merges[2].right), (4, 5));
        assert_eq!(d.merges[2].size, 4);
        assert!((d.merges[2].distance - 4.0).abs() < 1e-12);
        for w in d.merges.windows(2) {
            assert!(w[0].distance <= w[1].distance);
        }
    }

    #[test]
    fn ties_prefer_lower_index_sum() {
        // 0-1, 2-3 and 1-2 are all distance 1
        let pts = array![[0.0], [1.0], [2.0], [3.0]];
        let d = hierarchical_points(pts.view(), Linkage::Complete).unwrap();
        assert_eq!((d.merges[0].left, d.merges[0].right), (0, 1));
        assert_eq!((d.merges[1].left, d.merges[1].right), (2, 3));
    }

    #[test]
    fn cut_labels_follow_first_sample() {
        let pts = array![[5.0, 5.0], [0.0, 0.0], [5.1, 5.0], [0.1, 0.0], [9.0, -9.0]];
        for linkage in [Linkage::Single, Linkage::Complete, Linkage::Average, Linkage::Ward] {
            let d = hierarchical_points(pts.view(), linkage).unwrap();
            let a = d.cut(3).unwrap();
            assert_eq!(a.labels, vec![0, 1, 0, 1, 2], "{:?}", linkage);
            assert!(a.converged);
            assert_eq!(a.cluster_sizes(), vec![2, 2, 1]);
        }
    }

    #[test]
    fn cut_extremes() {
        let pts = array![[0.0], [1.0], [3.0]];
        let d = hierarchical_points(pts.view(), Linkage::Average).unwrap();
        assert_eq!(d.cut(1).unwrap().labels, vec![0, 0, 0]);
        assert_eq!(d.cut(3).unwrap().labels, vec![0, 1, 2]);
        assert!(d.cut(0).is_err());
        assert!(d.cut(4).is_err());
    }

    #[test]
    fn ward_matches_hand_computation() {
        // merge {0,1} at 1, then 2 joins: sqrt((2*16 + 2*9 - 1*1) / 3)
        let pts = array![[0.0], [1.0], [4.0]];
        let d = hierarchical_points(pts.view(), Linkage::Ward).unwrap();
        assert!((d.merges[0].distance - 1.0).abs() < 1e-12);
        let expected = ((2.0 * 16.0 + 2.0 * 9.0 - 1.0) / 3.0f64).sqrt();
        assert!((d.merges[1].distance - expected).abs() < 1e-12);
    }
}
