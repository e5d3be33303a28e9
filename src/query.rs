//! Resolution of transcript coordinates against a built registry
//!
//! A query names a transcript and a 0-based transcript offset. It resolves once per
//! chromosome the transcript is aligned to. Misses (unknown transcript, offset
//! without a genomic image) are reported as `Resolution::Unresolved`, never as
//! errors.

use crate::input::{parse_offset, ParseErr};
use crate::registry::MappingRegistry;
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub transcript_id: String,
    pub coordinate: u64,
}

impl Query {
    pub const NUM_FIELDS: usize = 2;

    pub fn new(transcript_id: &str, coordinate: u64) -> Self {
        Query {
            transcript_id: transcript_id.to_string(),
            coordinate,
        }
    }

    /// Build a query from an already split line.
    pub fn from_fields(fields: &[&str]) -> Result<Self, ParseErr> {
        if fields.len() != Self::NUM_FIELDS {
            return Err(ParseErr::InvalidQuery(format!(
                "expected {} columns, found {}",
                Self::NUM_FIELDS,
                fields.len()
            )));
        }
        let coordinate = parse_offset(fields[1]).ok_or_else(|| {
            ParseErr::InvalidQuery(format!(
                "transcript coordinate '{}' must be a non-negative integer",
                fields[1]
            ))
        })?;
        Ok(Query::new(fields[0], coordinate))
    }

    /// Parse a single `transcript:coordinate` query. The split is on the last `:`.
    pub fn from_region(region: &str) -> Result<Self, ParseErr> {
        let (transcript_id, coordinate) = region.rsplit_once(':').ok_or_else(|| {
            ParseErr::InvalidQuery(format!(
                "'{}' should be in the format `transcript:coordinate`",
                region
            ))
        })?;
        if transcript_id.is_empty() {
            return Err(ParseErr::InvalidQuery(format!(
                "'{}' has an empty transcript name",
                region
            )));
        }
        Self::from_fields(&[transcript_id, coordinate])
    }
}

impl FromStr for Query {
    type Err = ParseErr;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        Self::from_fields(&fields)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    UnknownTranscript,
    UnmappedCoordinate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Mapped {
        transcript_id: String,
        coordinate: u64,
        chromosome: String,
        genomic_coordinate: u64,
    },
    Unresolved {
        transcript_id: String,
        coordinate: u64,
        /// Absent when the transcript itself is unknown
        chromosome: Option<String>,
        reason: UnresolvedReason,
    },
}

impl Resolution {
    pub fn is_mapped(&self) -> bool {
        matches!(self, Resolution::Mapped { .. })
    }
}

impl fmt::Display for Resolution {
    /// Mapped resolutions print as a tab-separated output row; unresolved ones as
    /// a diagnostic message.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Mapped {
                transcript_id,
                coordinate,
                chromosome,
                genomic_coordinate,
            } => write!(
                f,
                "{}\t{}\t{}\t{}",
                transcript_id, coordinate, chromosome, genomic_coordinate
            ),
            Resolution::Unresolved {
                transcript_id,
                reason: UnresolvedReason::UnknownTranscript,
                ..
            } => write!(
                f,
                "Transcript {} does not exist in genome mapping file",
                transcript_id
            ),
            Resolution::Unresolved {
                transcript_id,
                coordinate,
                chromosome,
                reason: UnresolvedReason::UnmappedCoordinate,
            } => write!(
                f,
                "Transcript coordinate {} for transcript {} has no genomic position on {}",
                coordinate,
                transcript_id,
                chromosome.as_deref().unwrap_or("?")
            ),
        }
    }
}

/// Resolve a query against every chromosome its transcript maps to, in the
/// registry's chromosome order.
pub fn resolve(query: &Query, registry: &MappingRegistry) -> Vec<Resolution> {
    let maps = registry.lookup(&query.transcript_id);
    if maps.is_empty() {
        return vec![Resolution::Unresolved {
            transcript_id: query.transcript_id.clone(),
            coordinate: query.coordinate,
            chromosome: None,
            reason: UnresolvedReason::UnknownTranscript,
        }];
    }

    maps.iter()
        .map(|m| {
            let chromosome = registry.chromosome_name(m.chromosome_id).to_string();
            match m.map.get(query.coordinate) {
                Some(genomic_coordinate) => Resolution::Mapped {
                    transcript_id: query.transcript_id.clone(),
                    coordinate: query.coordinate,
                    chromosome,
                    genomic_coordinate,
                },
                None => Resolution::Unresolved {
                    transcript_id: query.transcript_id.clone(),
                    coordinate: query.coordinate,
                    chromosome: Some(chromosome),
                    reason: UnresolvedReason::UnmappedCoordinate,
                },
            }
        })
        .collect()
}

/// Resolve a batch of queries on the rayon pool. Output order follows input order.
pub fn resolve_all(queries: &[Query], registry: &MappingRegistry) -> Vec<Vec<Resolution>> {
    queries.par_iter().map(|q| resolve(q, registry)).collect()
}
