use crate::cigar::{self, CigarOp};
use crate::coord_map::CoordinateMap;
use crate::input::{parse_offset, ParseErr};
use std::str::FromStr;

/// One transcript-to-chromosome alignment from the genome mapping file:
/// `transcript chromosome start cigar`, with `start` 0-based on the chromosome.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    pub transcript_id: String,
    pub chromosome: String,
    pub start: u64,
    pub cigar: Vec<CigarOp>,
}

impl AlignmentRecord {
    pub const NUM_FIELDS: usize = 4;

    /// Build a record from an already split line.
    pub fn from_fields(fields: &[&str]) -> Result<Self, ParseErr> {
        if fields.len() != Self::NUM_FIELDS {
            return Err(ParseErr::InvalidRecord(format!(
                "expected {} columns, found {}",
                Self::NUM_FIELDS,
                fields.len()
            )));
        }

        let start = parse_offset(fields[2]).ok_or_else(|| {
            ParseErr::InvalidRecord(format!("reference coordinate '{}' is invalid", fields[2]))
        })?;
        let cigar = cigar::parse_cigar(fields[3])?;
        if start.checked_add(cigar::reference_length(&cigar)).is_none() {
            return Err(ParseErr::InvalidRecord(format!(
                "alignment at {} with CIGAR '{}' overflows the coordinate range",
                start, fields[3]
            )));
        }

        Ok(AlignmentRecord {
            transcript_id: fields[0].to_string(),
            chromosome: fields[1].to_string(),
            start,
            cigar,
        })
    }

    pub fn reference_length(&self) -> u64 {
        cigar::reference_length(&self.cigar)
    }

    pub fn coordinate_map(&self) -> Result<CoordinateMap, ParseErr> {
        CoordinateMap::build(self.start, &self.cigar)
    }
}

impl FromStr for AlignmentRecord {
    type Err = ParseErr;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        Self::from_fields(&fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cigar::CigarKind;

    #[test]
    fn test_parse_record_valid() {
        let record: AlignmentRecord = "TR1\tCHR1\t3\t8M7D6M2I2M11D7M".parse().unwrap();
        assert_eq!(record.transcript_id, "TR1");
        assert_eq!(record.chromosome, "CHR1");
        assert_eq!(record.start, 3);
        assert_eq!(record.cigar.len(), 7);
        assert_eq!(record.cigar[1], CigarOp::new(7, CigarKind::Deletion));
        assert_eq!(record.reference_length(), 41);
        assert_eq!(record.coordinate_map().unwrap().get(8), Some(18));
    }

    #[test]
    fn test_parse_record_wrong_column_count() {
        assert!(matches!(
            "TR1\tCHR1\t3".parse::<AlignmentRecord>(),
            Err(ParseErr::InvalidRecord(_))
        ));
        assert!(matches!(
            "TR1\tCHR1\t3\t8M\textra".parse::<AlignmentRecord>(),
            Err(ParseErr::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_parse_record_invalid_start() {
        for line in ["TR1 CHR1 -3 8M", "TR1 CHR1 3.0 8M", "TR1 CHR1 three 8M"] {
            assert!(matches!(
                line.parse::<AlignmentRecord>(),
                Err(ParseErr::InvalidRecord(_))
            ));
        }
    }

    #[test]
    fn test_parse_record_overflowing_alignment() {
        assert!(matches!(
            "TR2 CHR2 18446744073709551610 10M".parse::<AlignmentRecord>(),
            Err(ParseErr::InvalidRecord(_))
        ));
        // the last base ends exactly at u64::MAX
        let record: AlignmentRecord = "TR2 CHR2 18446744073709551605 10M".parse().unwrap();
        assert_eq!(record.coordinate_map().unwrap().genomic_end(), u64::MAX);
    }

    #[test]
    fn test_parse_record_invalid_cigar() {
        // it's got Q in the CIGAR string
        assert!(matches!(
            "TR1\tCHR1\t3\t8Q".parse::<AlignmentRecord>(),
            Err(ParseErr::MalformedCigar(_))
        ));
    }
}
