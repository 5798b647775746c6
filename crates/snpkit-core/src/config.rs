//! Engine configuration: filter thresholds and analysis defaults.
//!
//! All structs deserialize from JSON with every field optional, so a config
//! file only needs to mention what it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Quality & missingness thresholds. A threshold of 0 disables its check.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Fraction of non-missing calls required per variant.
    pub min_call_rate: f64,
    /// Lower bound on minor allele frequency.
    pub min_minor_allele_freq: f64,
    /// Fraction of non-missing calls required per sample, measured on the
    /// variants that survive the variant filters.
    pub max_sample_missing: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_call_rate: 0.9,
            min_minor_allele_freq: 0.01,
            max_sample_missing: 0.9,
        }
    }
}

impl FilterConfig {
    /// Thresholds that exclude nothing.
    pub fn no_op() -> Self {
        Self {
            min_call_rate: 0.0,
            min_minor_allele_freq: 0.0,
            max_sample_missing: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("min_call_rate", self.min_call_rate, 1.0),
            ("min_minor_allele_freq", self.min_minor_allele_freq, 0.5),
            ("max_sample_missing", self.max_sample_missing, 1.0),
        ];
        for (name, value, upper) in checks {
            if !(0.0..=upper).contains(&value) {
                return Err(Error::invalid_argument(format!(
                    "{} must be within [0, {}], got {}",
                    name, upper, value
                )));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcaConfig {
    pub n_components: usize,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self { n_components: 2 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    pub k: usize,
    pub max_iterations: usize,
    /// Seed for the k-means++ initialization; fixed so reruns agree.
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: 3,
            max_iterations: 300,
            seed: 42,
        }
    }
}

/// Inter-cluster distance used by agglomerative clustering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    Single,
    Complete,
    Average,
    #[default]
    Ward,
}

impl std::str::FromStr for Linkage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Linkage::Single),
            "complete" => Ok(Linkage::Complete),
            "average" => Ok(Linkage::Average),
            "ward" => Ok(Linkage::Ward),
            other => Err(Error::invalid_argument(format!(
                "unknown linkage '{}' (use single, complete, average or ward)",
                other
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchicalConfig {
    pub linkage: Linkage,
    pub n_clusters: usize,
}

impl Default for HierarchicalConfig {
    fn default() -> Self {
        Self {
            linkage: Linkage::Ward,
            n_clusters: 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoConfig {
    /// Records folded into the matrix per chunk while loading.
    pub chunk_size: usize,
}

impl Default for IoConfig {
    fn default() -> Self {
        Self { chunk_size: 4096 }
    }
}

/// Everything a caller may want to preset, loadable from one JSON file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub io: IoConfig,
    pub filter: FilterConfig,
    pub pca: PcaConfig,
    pub kmeans: KMeansConfig,
    pub hierarchical: HierarchicalConfig,
}

impl AnalysisConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.filter.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let f = FilterConfig::default();
        assert_eq!(f.min_call_rate, 0.9);
        assert_eq!(f.min_minor_allele_freq, 0.01);
        assert_eq!(f.max_sample_missing, 0.9);
        assert_eq!(KMeansConfig::default().seed, 42);
        assert_eq!(PcaConfig::default().n_components, 2);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = AnalysisConfig::from_json_str(
            r#"{ "filter": { "min_call_rate": 1.0 }, "hierarchical": { "linkage": "average" } }"#,
        )
        .unwrap();
        assert_eq!(cfg.filter.min_call_rate, 1.0);
        assert_eq!(cfg.filter.min_minor_allele_freq, 0.01);
        assert_eq!(cfg.hierarchical.linkage, Linkage::Average);
        assert_eq!(cfg.kmeans.k, 3);
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = AnalysisConfig::from_json_str(r#"{ "filter": { "min_call_rate": 1.5 } }"#)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn reads_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, r#"{{ "pca": {{ "n_components": 4 }} }}"#).unwrap();
        let cfg = AnalysisConfig::from_json_file(f.path()).unwrap();
        assert_eq!(cfg.pca.n_components, 4);
    }

    #[test]
    fn linkage_from_str() {
        assert_eq!("Ward".parse::<Linkage>().unwrap(), Linkage::Ward);
        assert!("median".parse::<Linkage>().is_err());
    }
}
