//! snpkit-core: shared data structures for the snpkit toolkit.
//!
//! - `genotype`: the {0,1,2,NA} call codes and per-site tallies
//! - `index`: sample/variant identity and first-sighting ordinals
//! - `matrix`: the immutable samples × variants `GenotypeMatrix`
//! - `config`: filter thresholds and analysis defaults
//! - `error`: the typed error taxonomy used across the workspace

pub mod config;
pub mod error;
pub mod genotype;
pub mod index;
pub mod matrix;

pub use config::{
    AnalysisConfig, FilterConfig, HierarchicalConfig, IoConfig, KMeansConfig, Linkage, PcaConfig,
};
pub use error::{check_index, Axis, Error, Result};
pub use genotype::{Genotype, GenotypeCounts};
pub use index::{OrdinalIndex, SampleId, SampleIndex, Variant, VariantIndex, VariantKey};
pub use matrix::GenotypeMatrix;
