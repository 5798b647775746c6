use std::path::Path;

use snpkit_core::Result;

use crate::bed::BedReader;
use crate::detect::{detect_format, FileFormat};
use crate::ped::PedReader;
use crate::record::{GenotypeRecord, ReadReport};
use crate::text::TextReader;
use crate::vcf::VcfReader;

/// One reader per supported format behind a single record stream.
///
/// Streams are single-pass; re-open the file to read it again. Malformed rows
/// are skipped and collected in the report; a fatal error is yielded once and
/// ends the stream.
pub enum FormatReader {
    Vcf(VcfReader),
    Bed(BedReader),
    Ped(PedReader),
    Text(TextReader),
}

impl FormatReader {
    pub fn format(&self) -> FileFormat {
        match self {
            FormatReader::Vcf(_) => FileFormat::Vcf,
            FormatReader::Bed(_) => FileFormat::Bed,
            FormatReader::Ped(_) => FileFormat::Ped,
            FormatReader::Text(_) => FileFormat::DelimitedText,
        }
    }

    pub fn report(&self) -> &ReadReport {
        match self {
            FormatReader::Vcf(r) => r.report(),
            FormatReader::Bed(r) => r.report(),
            FormatReader::Ped(r) => r.report(),
            FormatReader::Text(r) => r.report(),
        }
    }

    /// Consume the reader and return what it saw.
    pub fn finish(self) -> ReadReport {
        match self {
            FormatReader::Vcf(r) => r.finish(),
            FormatReader::Bed(r) => r.finish(),
            FormatReader::Ped(r) => r.finish(),
            FormatReader::Text(r) => r.finish(),
        }
    }
}

impl Iterator for FormatReader {
    type Item = Result<GenotypeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            FormatReader::Vcf(r) => r.next(),
            FormatReader::Bed(r) => r.next(),
            FormatReader::Ped(r) => r.next(),
            FormatReader::Text(r) => r.next(),
        }
    }
}

/// Open `path` with the declared format, or detect it from the content.
pub fn open_reader<P: AsRef<Path>>(path: P, format: Option<FileFormat>) -> Result<FormatReader> {
    let path = path.as_ref();
    let format = match format {
        Some(f) => f,
        None => detect_format(path)?,
    };
    log::info!("Reading {} as {}", path.display(), format);
    Ok(match format {
        FileFormat::Vcf => FormatReader::Vcf(VcfReader::open(path)?),
        FileFormat::Bed => FormatReader::Bed(BedReader::open(path)?),
        FileFormat::Ped => FormatReader::Ped(PedReader::open(path)?),
        FileFormat::DelimitedText => FormatReader::Text(TextReader::open(path)?),
    })
}
