//! snpkit-structure: population structure from a genotype matrix.
//!
//! `prepare_dosages` imputes and standardizes, `pca` projects samples onto
//! principal components, and `kmeans`/`hierarchical` partition the resulting
//! embedding. All results are deterministic for a given input.

pub mod hierarchical;
pub mod kmeans;
pub mod pca;
pub mod standardize;

pub use hierarchical::{hierarchical, hierarchical_points, Dendrogram, Merge};
pub use kmeans::{cluster, kmeans, kmeans_points, ClusterAssignment};
pub use pca::{pca, pca_standardized, Embedding};
pub use standardize::{prepare_dosages, DropReason, DroppedColumn, StandardizedMatrix};
