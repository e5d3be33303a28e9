use crate::cigar::{CigarOp, Consumption};
use crate::input::ParseErr;
use serde::{Deserialize, Serialize};

/// A run of transcript bases aligned base-for-base to the genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedBlock {
    pub transcript_start: u64,
    pub genomic_start: u64,
    pub len: u64,
}

impl AlignedBlock {
    pub fn transcript_end(&self) -> u64 {
        self.transcript_start + self.len
    }

    pub fn genomic_end(&self) -> u64 {
        self.genomic_start + self.len
    }
}

/// Partial function from transcript offset to genomic offset for one
/// transcript-to-chromosome alignment.
///
/// Only bases under M/=/X operations have an image. Blocks are kept sorted and
/// strictly increasing in both coordinates; blocks touching in both coordinates
/// are merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateMap {
    blocks: Vec<AlignedBlock>,
    genomic_end: u64,
    transcript_end: u64,
}

fn advance(cursor: u64, len: u64) -> Result<u64, ParseErr> {
    cursor.checked_add(len).ok_or_else(|| {
        ParseErr::InvalidRecord(format!(
            "alignment overflows the coordinate range ({} + {})",
            cursor, len
        ))
    })
}

impl CoordinateMap {
    /// Walk the operations from `start`, recording the genomic image of every
    /// transcript base under a consuming-both operation.
    pub fn build(start: u64, ops: &[CigarOp]) -> Result<Self, ParseErr> {
        let mut transcript_cursor: u64 = 0;
        let mut genomic_cursor: u64 = start;
        let mut blocks: Vec<AlignedBlock> = Vec::new();

        for op in ops {
            let len = op.len() as u64;
            match op.kind().consumption() {
                Consumption::Both => {
                    let next_transcript = advance(transcript_cursor, len)?;
                    let next_genomic = advance(genomic_cursor, len)?;
                    match blocks.last_mut() {
                        Some(last)
                            if last.transcript_end() == transcript_cursor
                                && last.genomic_end() == genomic_cursor =>
                        {
                            last.len += len
                        }
                        _ => blocks.push(AlignedBlock {
                            transcript_start: transcript_cursor,
                            genomic_start: genomic_cursor,
                            len,
                        }),
                    }
                    transcript_cursor = next_transcript;
                    genomic_cursor = next_genomic;
                }
                Consumption::ReferenceOnly => genomic_cursor = advance(genomic_cursor, len)?,
                Consumption::QueryOnly => transcript_cursor = advance(transcript_cursor, len)?,
                Consumption::Neither => {}
            }
        }

        Ok(Self {
            blocks,
            genomic_end: genomic_cursor,
            transcript_end: transcript_cursor,
        })
    }

    /// Genomic offset for a transcript offset, if that base is aligned.
    pub fn get(&self, transcript_offset: u64) -> Option<u64> {
        let idx = self
            .blocks
            .partition_point(|b| b.transcript_end() <= transcript_offset);
        self.blocks
            .get(idx)
            .filter(|b| b.transcript_start <= transcript_offset)
            .map(|b| b.genomic_start + (transcript_offset - b.transcript_start))
    }

    /// Number of transcript offsets with a genomic image.
    pub fn len(&self) -> u64 {
        self.blocks.iter().map(|b| b.len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// All (transcript offset, genomic offset) pairs in transcript order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.blocks.iter().flat_map(|b| {
            (0..b.len).map(move |i| (b.transcript_start + i, b.genomic_start + i))
        })
    }

    pub fn blocks(&self) -> &[AlignedBlock] {
        &self.blocks
    }

    /// Genomic cursor after the last operation.
    pub fn genomic_end(&self) -> u64 {
        self.genomic_end
    }

    /// Transcript cursor after the last operation.
    pub fn transcript_end(&self) -> u64 {
        self.transcript_end
    }
}
