//! snpkit-stats: quality filtering and per-site population statistics.
//!
//! Every function here is a pure function of a borrowed `GenotypeMatrix`;
//! filtering returns a new matrix and never touches its input.

pub mod filter;
pub mod frequency;
pub mod hwe;
pub mod ld;

pub use filter::{filter, FilterReport, SampleExclusion, Threshold, VariantExclusion, Violation};
pub use frequency::{allele_frequencies, allele_frequency, AlleleFrequencyRecord};
pub use hwe::{hwe_exact, hwe_from_counts, hwe_table, hwe_test, HweResult, HweStatus};
pub use ld::{ld, ld_pairs, ld_window, window_pairs, LdRecord};
