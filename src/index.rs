//! On-disk index of a built `MappingRegistry`
//!
//! Layout: 8 magic bytes, one byte recording the input error policy the index was
//! built with, then the bincode-encoded registry.

use crate::input::ErrorPolicy;
use crate::registry::MappingRegistry;
use log::{debug, warn};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 8] = b"TXMAPIX1";

const POLICY_STRICT: u8 = 0;
const POLICY_LENIENT: u8 = 1;

/// Index path used for a genome mapping file.
pub fn index_path(mapping_file: &str) -> String {
    format!("{}.txidx", mapping_file)
}

pub fn write_index<W: Write>(
    registry: &MappingRegistry,
    policy: ErrorPolicy,
    writer: &mut W,
) -> io::Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(&[match policy {
        ErrorPolicy::Strict => POLICY_STRICT,
        ErrorPolicy::Lenient => POLICY_LENIENT,
    }])?;
    bincode::serde::encode_into_std_write(registry, writer, bincode::config::standard())
        .map_err(io::Error::other)?;
    Ok(())
}

/// Read an index, returning the registry and the policy it was built with.
pub fn read_index<R: Read>(reader: &mut R) -> io::Result<(MappingRegistry, ErrorPolicy)> {
    let mut magic_buf = [0u8; 8];
    reader.read_exact(&mut magic_buf)?;
    if &magic_buf != MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Invalid magic bytes, not a txmap index",
        ));
    }

    let mut policy_buf = [0u8; 1];
    reader.read_exact(&mut policy_buf)?;
    let policy = match policy_buf[0] {
        POLICY_STRICT => ErrorPolicy::Strict,
        POLICY_LENIENT => ErrorPolicy::Lenient,
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown error policy {} in index header", other),
            ))
        }
    };

    let registry =
        bincode::serde::decode_from_std_read(reader, bincode::config::standard()).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Failed to deserialize index: {e}"),
            )
        })?;
    Ok((registry, policy))
}

pub fn save(registry: &MappingRegistry, policy: ErrorPolicy, index_file: &str) -> io::Result<()> {
    let file = File::create(index_file)?;
    let mut writer = BufWriter::new(file);
    write_index(registry, policy, &mut writer)?;
    writer.flush()?;
    debug!("Wrote index to {}", index_file);
    Ok(())
}

pub fn load(index_file: &str) -> io::Result<(MappingRegistry, ErrorPolicy)> {
    let file = File::open(index_file)?;
    let mut reader = BufReader::new(file);
    read_index(&mut reader).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("Failed to load index '{}': {}", index_file, e),
        )
    })
}

/// Load the index of a mapping file, warning if the mapping file is newer or if
/// the index skipped malformed lines that a strict run would reject.
/// Returns `Ok(None)` if no index exists.
pub fn load_for(mapping_file: &str, policy: ErrorPolicy) -> io::Result<Option<MappingRegistry>> {
    let index_file = index_path(mapping_file);
    if !Path::new(&index_file).exists() {
        return Ok(None);
    }

    let mapping_ts = std::fs::metadata(mapping_file).and_then(|m| m.modified());
    let index_ts = std::fs::metadata(&index_file).and_then(|m| m.modified());
    match (mapping_ts, index_ts) {
        (Ok(mapping_ts), Ok(index_ts)) if mapping_ts > index_ts => {
            warn!(
                "Genome mapping file {} has been modified since index creation; \
                 rebuild with --force-reindex",
                mapping_file
            );
        }
        (Ok(_), Ok(_)) => {}
        _ => warn!(
            "Unable to compare timestamps of {} and {}; the index may be stale",
            mapping_file, index_file
        ),
    }

    debug!("Loading index {}", index_file);
    let (registry, index_policy) = load(&index_file)?;
    if index_policy == ErrorPolicy::Lenient && policy == ErrorPolicy::Strict {
        warn!(
            "Index {} was built with --lenient and may omit malformed lines; \
             use --force-reindex to validate {} strictly",
            index_file, mapping_file
        );
    }
    Ok(Some(registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment_record::AlignmentRecord;
    use std::io::Cursor;

    fn registry() -> MappingRegistry {
        let records: Vec<AlignmentRecord> = ["TR1 CHR1 3 8M7D6M2I2M11D7M", "TR1 CHR2 0 5S5M"]
            .iter()
            .map(|l| l.parse().unwrap())
            .collect();
        MappingRegistry::from_records(&records).unwrap()
    }

    #[test]
    fn test_index_roundtrip_preserves_lookups() {
        let registry = registry();

        let mut buf = Vec::new();
        write_index(&registry, ErrorPolicy::Strict, &mut buf).unwrap();
        assert_eq!(&buf[..8], MAGIC);

        let (loaded, policy) = read_index(&mut Cursor::new(buf)).unwrap();
        assert_eq!(policy, ErrorPolicy::Strict);
        assert_eq!(loaded.num_mappings(), 2);
        assert_eq!(loaded.get("TR1", "CHR1"), registry.get("TR1", "CHR1"));
        assert_eq!(loaded.get("TR1", "CHR2").unwrap().get(5), Some(0));
        assert_eq!(loaded.chromosome_name(loaded.lookup("TR1")[1].chromosome_id), "CHR2");
    }

    #[test]
    fn test_index_records_lenient_policy() {
        let mut buf = Vec::new();
        write_index(&registry(), ErrorPolicy::Lenient, &mut buf).unwrap();
        assert_eq!(buf[8], POLICY_LENIENT);

        let (_, policy) = read_index(&mut Cursor::new(buf)).unwrap();
        assert_eq!(policy, ErrorPolicy::Lenient);
    }

    #[test]
    fn test_index_rejects_bad_header() {
        let err = read_index(&mut Cursor::new(b"NOTANIDXsomething".to_vec())).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let mut buf = MAGIC.to_vec();
        buf.push(7);
        let err = read_index(&mut Cursor::new(buf)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_load_for_missing_and_saved_index() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = dir.path().join("map.tsv");
        std::fs::write(&mapping, "TR1\tCHR1\t0\t5M\n").unwrap();
        let mapping = mapping.to_str().unwrap();
        assert!(load_for(mapping, ErrorPolicy::Strict).unwrap().is_none());

        save(&registry(), ErrorPolicy::Lenient, &index_path(mapping)).unwrap();
        let loaded = load_for(mapping, ErrorPolicy::Strict).unwrap().unwrap();
        assert_eq!(loaded.num_transcripts(), 1);
    }
}
