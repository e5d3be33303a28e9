use crate::alignment_record::AlignmentRecord;
use crate::coord_map::CoordinateMap;
use crate::input::ParseErr;
use crate::seqidx::SequenceIndex;
use log::{debug, info};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Coordinate map of a transcript on one chromosome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromosomeMap {
    pub chromosome_id: u32,
    pub map: CoordinateMap,
}

/// All coordinate maps, keyed by transcript and then chromosome.
///
/// A transcript aligned to several chromosomes keeps one independent map per
/// chromosome, in the order the chromosomes were first seen for it. The registry
/// is read-only once built.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MappingRegistry {
    pub seq_index: SequenceIndex,
    transcripts: FxHashMap<String, Vec<ChromosomeMap>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RegistryStats {
    pub num_transcripts: usize,
    pub num_mappings: usize,
    pub num_chromosomes: usize,
    pub mapped_bases: u64,
    /// Mappings per chromosome, naturally sorted by chromosome name
    pub mappings_per_chromosome: Vec<(String, usize)>,
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: &[AlignmentRecord]) -> Result<Self, ParseErr> {
        let mut registry = Self::new();
        for record in records {
            registry.insert(record)?;
        }
        info!(
            "Built {} coordinate maps for {} transcripts",
            registry.num_mappings(),
            registry.num_transcripts()
        );
        Ok(registry)
    }

    /// Build the record's coordinate map and store it under its transcript and
    /// chromosome. A later record for the same pair replaces the earlier map in
    /// place. Returns `true` if a map was replaced.
    pub fn insert(&mut self, record: &AlignmentRecord) -> Result<bool, ParseErr> {
        let map = record.coordinate_map()?;
        let chromosome_id = self.seq_index.get_or_insert_id(&record.chromosome);
        let maps = self
            .transcripts
            .entry(record.transcript_id.clone())
            .or_default();

        match maps.iter_mut().find(|m| m.chromosome_id == chromosome_id) {
            Some(existing) => {
                debug!(
                    "Replacing mapping of {} on {} with a later record",
                    record.transcript_id, record.chromosome
                );
                existing.map = map;
                Ok(true)
            }
            None => {
                maps.push(ChromosomeMap { chromosome_id, map });
                Ok(false)
            }
        }
    }

    /// Chromosome maps of a transcript; empty if the transcript is unknown.
    pub fn lookup(&self, transcript_id: &str) -> &[ChromosomeMap] {
        self.transcripts
            .get(transcript_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get(&self, transcript_id: &str, chromosome: &str) -> Option<&CoordinateMap> {
        let chromosome_id = self.seq_index.get_id(chromosome)?;
        self.lookup(transcript_id)
            .iter()
            .find(|m| m.chromosome_id == chromosome_id)
            .map(|m| &m.map)
    }

    pub fn chromosome_name(&self, chromosome_id: u32) -> &str {
        self.seq_index.get_name(chromosome_id).unwrap_or("?")
    }

    pub fn num_transcripts(&self) -> usize {
        self.transcripts.len()
    }

    pub fn num_mappings(&self) -> usize {
        self.transcripts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut per_chromosome: FxHashMap<u32, usize> = FxHashMap::default();
        let mut mapped_bases = 0;
        for maps in self.transcripts.values() {
            for m in maps {
                *per_chromosome.entry(m.chromosome_id).or_insert(0) += 1;
                mapped_bases += m.map.len();
            }
        }

        let mut mappings_per_chromosome: Vec<(String, usize)> = per_chromosome
            .into_iter()
            .map(|(id, count)| (self.chromosome_name(id).to_string(), count))
            .collect();
        mappings_per_chromosome.sort_by(|a, b| natord::compare(&a.0, &b.0));

        RegistryStats {
            num_transcripts: self.num_transcripts(),
            num_mappings: self.num_mappings(),
            num_chromosomes: mappings_per_chromosome.len(),
            mapped_bases,
            mappings_per_chromosome,
        }
    }
}
