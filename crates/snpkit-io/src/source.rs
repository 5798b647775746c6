//! Opening input files as buffered text, transparently gunzipping.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use snpkit_core::Result;

const BUFFER_CAPACITY: usize = 64 * 1024;

pub(crate) type TextSource = Box<dyn BufRead + Send>;

fn is_gzipped(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("gz") || e.eq_ignore_ascii_case("bgz"))
        .unwrap_or(false)
}

/// Open a file for line reading; `.gz`/`.bgz` are decompressed on the fly.
pub fn open_text(path: &Path) -> Result<TextSource> {
    let file = File::open(path)?;
    if is_gzipped(path) {
        let decoder = MultiGzDecoder::new(file);
        Ok(Box::new(BufReader::with_capacity(BUFFER_CAPACITY, decoder)))
    } else {
        Ok(Box::new(BufReader::with_capacity(BUFFER_CAPACITY, file)))
    }
}

/// File name with any compression suffix removed, used for extension checks.
pub(crate) fn logical_name(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    for suffix in [".gz", ".bgz"] {
        if let Some(stripped) = name.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    name
}

/// Case-insensitive `strip_suffix` that keeps the original spelling.
pub(crate) fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let cut = s.len().checked_sub(suffix.len())?;
    if s.is_char_boundary(cut) && s[cut..].eq_ignore_ascii_case(suffix) {
        Some(&s[..cut])
    } else {
        None
    }
}

/// Decoded line text, or the raw bytes of a line that is not UTF-8.
pub(crate) type LineText = std::result::Result<String, Vec<u8>>;

pub(crate) const NOT_UTF8: &str = "line is not valid UTF-8";

/// Line reader that tracks 1-based line numbers.
///
/// Lines are split on raw bytes so one undecodable line does not end the
/// stream; callers decide whether to skip or reject it.
pub(crate) struct Lines {
    inner: TextSource,
    buf: Vec<u8>,
    line_no: usize,
}

impl Lines {
    pub(crate) fn new(inner: TextSource) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(8192),
            line_no: 0,
        }
    }

    /// Lines consumed so far.
    pub(crate) fn line_no(&self) -> usize {
        self.line_no
    }

    /// Hand back the source, positioned just after the last line read.
    pub(crate) fn into_inner(self) -> TextSource {
        self.inner
    }

    /// Next line without its terminator, with its line number.
    pub(crate) fn next_line(&mut self) -> io::Result<Option<(usize, LineText)>> {
        self.buf.clear();
        if self.inner.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        let mut end = self.buf.len();
        while end > 0 && matches!(self.buf[end - 1], b'\n' | b'\r') {
            end -= 1;
        }
        let raw = &self.buf[..end];
        let text = std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|_| raw.to_vec());
        Ok(Some((self.line_no, text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn reads_gzip_transparently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.vcf.gz");
        let mut enc = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        writeln!(enc, "##fileformat=VCFv4.2").unwrap();
        writeln!(enc, "#CHROM\tPOS").unwrap();
        enc.finish().unwrap();

        let mut lines = Lines::new(open_text(&path).unwrap());
        assert_eq!(
            lines.next_line().unwrap(),
            Some((1, Ok("##fileformat=VCFv4.2".to_string())))
        );
        assert_eq!(
            lines.next_line().unwrap(),
            Some((2, Ok("#CHROM\tPOS".to_string())))
        );
        assert_eq!(lines.next_line().unwrap(), None);
        assert_eq!(logical_name(&path), "calls.vcf");
    }

    #[test]
    fn undecodable_line_does_not_end_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"first\r\ncaf\xe9\nlast").unwrap();

        let mut lines = Lines::new(open_text(&path).unwrap());
        assert_eq!(lines.next_line().unwrap(), Some((1, Ok("first".to_string()))));
        assert_eq!(lines.next_line().unwrap(), Some((2, Err(b"caf\xe9".to_vec()))));
        assert_eq!(lines.next_line().unwrap(), Some((3, Ok("last".to_string()))));
        assert_eq!(lines.next_line().unwrap(), None);
    }

    #[test]
    fn suffix_strip_keeps_case() {
        assert_eq!(strip_suffix_ignore_case("HapMap.PED", ".ped"), Some("HapMap"));
        assert_eq!(strip_suffix_ignore_case("x.map", ".ped"), None);
        assert_eq!(strip_suffix_ignore_case("ab", ".ped"), None);
    }
}
