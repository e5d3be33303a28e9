//! Line-oriented readers for genome mapping files and query files
//!
//! Both inputs are whitespace-delimited text, one entry per line. Files ending in
//! `.gz`/`.bgz` are read through a BGZF reader; `-` reads from stdin.

use crate::alignment_record::AlignmentRecord;
use crate::query::Query;
use log::{debug, info, warn};
use noodles::bgzf;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Error as IoError, Read, Seek, SeekFrom};
use std::num::NonZeroUsize;

#[derive(Debug)]
pub enum ParseErr {
    MalformedCigar(String),
    InvalidRecord(String),
    InvalidQuery(String),
    IoError(IoError),
}

impl ParseErr {
    /// Prefix the message with the 1-based line it came from.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            ParseErr::MalformedCigar(msg) => {
                ParseErr::MalformedCigar(format!("line {line}: {msg}"))
            }
            ParseErr::InvalidRecord(msg) => ParseErr::InvalidRecord(format!("line {line}: {msg}")),
            ParseErr::InvalidQuery(msg) => ParseErr::InvalidQuery(format!("line {line}: {msg}")),
            ParseErr::IoError(e) => ParseErr::IoError(e),
        }
    }
}

impl std::fmt::Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseErr::MalformedCigar(msg) => write!(f, "Malformed CIGAR string: {}", msg),
            ParseErr::InvalidRecord(msg) => write!(f, "Invalid genome mapping record: {}", msg),
            ParseErr::InvalidQuery(msg) => write!(f, "Invalid transcript query: {}", msg),
            ParseErr::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for ParseErr {}

impl From<ParseErr> for IoError {
    fn from(e: ParseErr) -> Self {
        match e {
            ParseErr::IoError(e) => e,
            other => IoError::new(io::ErrorKind::InvalidData, other.to_string()),
        }
    }
}

/// What to do with a line that fails validation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Abort on the first malformed line.
    #[default]
    Strict,
    /// Log the malformed line and keep going.
    Lenient,
}

/// Parse a non-negative base offset. Only plain ASCII digits are accepted.
pub(crate) fn parse_offset(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse::<u64>().ok()
}

const BGZF_HEADER_SIZE: usize = 18;

/// Check whether a file starts with a valid BGZF header.
/// Returns `Ok(false)` for regular gzip, too-small files, or plain text.
fn is_bgzf<R: Read + Seek>(reader: &mut R) -> io::Result<bool> {
    let mut header = [0u8; BGZF_HEADER_SIZE];
    let result = match reader.read_exact(&mut header) {
        Ok(()) => {
            Ok(header[0..2] == [0x1f, 0x8b]      // gzip magic
                && header[2] == 0x08              // DEFLATE
                && header[3] == 0x04              // FEXTRA
                && header[10..12] == [0x06, 0x00] // XLEN=6
                && header[12..14] == [b'B', b'C'] // BC subfield
                && header[14..16] == [0x02, 0x00]) // SLEN=2
        }
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    };
    reader.seek(SeekFrom::Start(0))?;
    result
}

/// Open a mapping or query file for line reading.
pub fn open_reader(path: &str, threads: NonZeroUsize) -> io::Result<Box<dyn BufRead>> {
    if path == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }

    let mut file = File::open(path)
        .map_err(|e| IoError::new(e.kind(), format!("Failed to open file '{}': {}", path, e)))?;

    if [".gz", ".bgz"].iter().any(|e| path.ends_with(e)) {
        if !is_bgzf(&mut file)? {
            return Err(IoError::new(
                io::ErrorKind::InvalidData,
                format!(
                    "'{}' is regular gzip, not BGZF. Convert with: zcat '{}' | bgzip > output.gz",
                    path, path
                ),
            ));
        }
        if threads.get() > 1 {
            debug!("Reading {} with {} BGZF workers", path, threads);
            let reader = bgzf::io::MultithreadedReader::with_worker_count(threads, file);
            Ok(Box::new(BufReader::new(reader)))
        } else {
            Ok(Box::new(BufReader::new(bgzf::io::Reader::new(file))))
        }
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

fn read_entries<R, T, F>(
    reader: R,
    policy: ErrorPolicy,
    what: &str,
    parse: F,
) -> Result<Vec<T>, ParseErr>
where
    R: BufRead,
    F: Fn(&[&str]) -> Result<T, ParseErr>,
{
    let mut entries = Vec::new();
    let mut skipped = 0usize;

    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result.map_err(ParseErr::IoError)?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }

        match parse(&fields) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                let e = e.at_line(idx + 1);
                match policy {
                    ErrorPolicy::Strict => return Err(e),
                    ErrorPolicy::Lenient => {
                        warn!("Skipping {}: {}", what, e);
                        skipped += 1;
                    }
                }
            }
        }
    }

    if skipped > 0 {
        warn!("Skipped {} malformed {} line(s)", skipped, what);
    }
    info!("Read {} {} line(s)", entries.len(), what);
    Ok(entries)
}

/// Read every alignment record from a genome mapping file.
pub fn read_records<R: BufRead>(
    reader: R,
    policy: ErrorPolicy,
) -> Result<Vec<AlignmentRecord>, ParseErr> {
    read_entries(reader, policy, "genome mapping", AlignmentRecord::from_fields)
}

/// Read every query from a transcript query file.
pub fn read_queries<R: BufRead>(reader: R, policy: ErrorPolicy) -> Result<Vec<Query>, ParseErr> {
    read_entries(reader, policy, "transcript query", Query::from_fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("0"), Some(0));
        assert_eq!(parse_offset("0042"), Some(42));
        assert_eq!(parse_offset(""), None);
        assert_eq!(parse_offset("+5"), None);
        assert_eq!(parse_offset("-5"), None);
        assert_eq!(parse_offset("1e3"), None);
        assert_eq!(parse_offset("99999999999999999999999"), None);
    }

    #[test]
    fn test_read_records() {
        let data = b"TR1\tCHR1\t3\t8M7D6M2I2M11D7M\n\nTR2 CHR2  10  20M\n";
        let records = read_records(BufReader::new(&data[..]), ErrorPolicy::Strict).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].transcript_id, "TR1");
        assert_eq!(records[0].start, 3);
        assert_eq!(records[1].chromosome, "CHR2");
        assert_eq!(records[1].start, 10);
    }

    #[test]
    fn test_read_records_strict_aborts() {
        let data = b"TR1\tCHR1\t3\t8M\nTR2\tCHR2\tx\t8M\nTR3\tCHR1\t0\t4M\n";
        match read_records(BufReader::new(&data[..]), ErrorPolicy::Strict) {
            Err(ParseErr::InvalidRecord(msg)) => assert!(msg.starts_with("line 2:")),
            other => panic!("expected InvalidRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_read_records_lenient_skips() {
        let data = b"TR1\tCHR1\t3\t8M\nTR2\tCHR2\t5\t8Q\nTR3\tCHR1\t0\n";
        let records = read_records(BufReader::new(&data[..]), ErrorPolicy::Lenient).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].transcript_id, "TR1");
    }

    #[test]
    fn test_read_records_lenient_skips_overflowing_alignment() {
        let data = b"TR1\tCHR1\t3\t8M\nTR2\tCHR2\t18446744073709551610\t10M\n";
        let records = read_records(BufReader::new(&data[..]), ErrorPolicy::Lenient).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].transcript_id, "TR1");

        match read_records(BufReader::new(&data[..]), ErrorPolicy::Strict) {
            Err(ParseErr::InvalidRecord(msg)) => assert!(msg.starts_with("line 2:")),
            other => panic!("expected InvalidRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_read_queries_lenient_skips() {
        let data = "TR1\tx\nTR2\t7\nTR3\n";
        let queries = read_queries(Cursor::new(data), ErrorPolicy::Lenient).unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].transcript_id, "TR2");
        assert_eq!(queries[0].coordinate, 7);
    }

    #[test]
    fn test_read_queries() {
        let data = "TR1\t4\nTR2\t0\n";
        let queries = read_queries(Cursor::new(data), ErrorPolicy::Strict).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].coordinate, 4);

        let bad = "TR1\t4\textra\n";
        assert!(matches!(
            read_queries(Cursor::new(bad), ErrorPolicy::Strict),
            Err(ParseErr::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_is_bgzf_rejects_plain_text() {
        let mut cursor = Cursor::new(b"TR1\tCHR1\t3\t8M\n".to_vec());
        assert!(!is_bgzf(&mut cursor).unwrap());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_open_reader_bgzf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.tsv.gz");
        let mut writer = bgzf::io::Writer::new(File::create(&path).unwrap());
        io::Write::write_all(&mut writer, b"TR1\tCHR1\t3\t8M\nTR2\tCHR2\t10\t20M\n").unwrap();
        writer.finish().unwrap();

        for threads in [1, 2] {
            let threads = NonZeroUsize::new(threads).unwrap();
            let reader = open_reader(path.to_str().unwrap(), threads).unwrap();
            let records = read_records(reader, ErrorPolicy::Strict).unwrap();
            assert_eq!(records.len(), 2);
            assert_eq!(records[1].transcript_id, "TR2");
            assert_eq!(records[1].start, 10);
        }
    }

    #[test]
    fn test_open_reader_rejects_regular_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.tsv.gz");
        // gzip member header without the BGZF extra field
        let mut data = vec![0x1f, 0x8b, 0x08, 0x00, 0, 0, 0, 0, 0x00, 0xff];
        data.extend_from_slice(&[0u8; 16]);
        std::fs::write(&path, data).unwrap();

        match open_reader(path.to_str().unwrap(), NonZeroUsize::new(1).unwrap()) {
            Ok(_) => panic!("regular gzip should be rejected"),
            Err(e) => {
                assert_eq!(e.kind(), io::ErrorKind::InvalidData);
                assert!(e.to_string().contains("not BGZF"));
            }
        }
    }

    #[test]
    fn test_parse_err_into_io_error() {
        let err: IoError = ParseErr::MalformedCigar("8Q".to_string()).into();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("8Q"));
    }
}
