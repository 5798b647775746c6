//! snpkit-io: turning genotype files into a `GenotypeMatrix`.
//!
//! Readers for VCF, text BED, PED+MAP and delimited SNP tables share one
//! record type and sit behind the `FormatReader` enum. `load` detects each
//! file's format, streams it through the chunked `MatrixBuilder` and returns
//! the matrix with a per-file report of skipped rows and merge conflicts.

pub mod bed;
pub mod builder;
pub mod detect;
pub mod ped;
pub mod reader;
pub mod record;
pub mod source;
pub mod text;
pub mod vcf;

pub use builder::{load, load_with, LoadOptions, LoadReport, MatrixBuilder, MergeConflict};
pub use detect::{detect_delimiter, detect_format, FileFormat};
pub use reader::{open_reader, FormatReader};
pub use record::{GenotypeRecord, ReadReport, RejectedRecord};
pub use source::open_text;
