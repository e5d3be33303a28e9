//! CIGAR parsing
//!
//! An operation is packed into a single `u32` the way BAM stores it: the length in
//! the upper 28 bits and the operation code in the lower 4 bits.

use crate::input::ParseErr;
use std::fmt;

/// CIGAR operation alphabet, numbered with the BAM operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CigarKind {
    Match = 0,
    Insertion = 1,
    Deletion = 2,
    Skip = 3,
    SoftClip = 4,
    HardClip = 5,
    Padding = 6,
    SequenceMatch = 7,
    SequenceMismatch = 8,
}

/// Which of the two cursors (transcript, genomic) an operation advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    Both,
    ReferenceOnly,
    QueryOnly,
    Neither,
}

impl CigarKind {
    const ALL: [CigarKind; 9] = [
        CigarKind::Match,
        CigarKind::Insertion,
        CigarKind::Deletion,
        CigarKind::Skip,
        CigarKind::SoftClip,
        CigarKind::HardClip,
        CigarKind::Padding,
        CigarKind::SequenceMatch,
        CigarKind::SequenceMismatch,
    ];

    /// Case-insensitive lookup of an operation character.
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'M' => Some(CigarKind::Match),
            'I' => Some(CigarKind::Insertion),
            'D' => Some(CigarKind::Deletion),
            'N' => Some(CigarKind::Skip),
            'S' => Some(CigarKind::SoftClip),
            'H' => Some(CigarKind::HardClip),
            'P' => Some(CigarKind::Padding),
            '=' => Some(CigarKind::SequenceMatch),
            'X' => Some(CigarKind::SequenceMismatch),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            CigarKind::Match => 'M',
            CigarKind::Insertion => 'I',
            CigarKind::Deletion => 'D',
            CigarKind::Skip => 'N',
            CigarKind::SoftClip => 'S',
            CigarKind::HardClip => 'H',
            CigarKind::Padding => 'P',
            CigarKind::SequenceMatch => '=',
            CigarKind::SequenceMismatch => 'X',
        }
    }

    pub fn consumes_query(self) -> bool {
        matches!(
            self,
            CigarKind::Match
                | CigarKind::Insertion
                | CigarKind::SoftClip
                | CigarKind::SequenceMatch
                | CigarKind::SequenceMismatch
        )
    }

    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            CigarKind::Match
                | CigarKind::Deletion
                | CigarKind::Skip
                | CigarKind::SequenceMatch
                | CigarKind::SequenceMismatch
        )
    }

    /// Hard clips and padding advance neither cursor.
    pub fn consumption(self) -> Consumption {
        match (self.consumes_query(), self.consumes_reference()) {
            (true, true) => Consumption::Both,
            (false, true) => Consumption::ReferenceOnly,
            (true, false) => Consumption::QueryOnly,
            (false, false) => Consumption::Neither,
        }
    }
}

impl fmt::Display for CigarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CigarOp {
    val: u32,
}

impl CigarOp {
    /// Largest length that fits in the packed representation.
    pub const MAX_LEN: u32 = (1 << 28) - 1;

    /// `len` must be within `1..=MAX_LEN`; `parse_cigar` checks this for input strings.
    pub(crate) fn new(len: u32, kind: CigarKind) -> Self {
        debug_assert!(len <= Self::MAX_LEN, "CIGAR operation length {len} out of range");
        Self {
            val: (len << 4) | kind as u32,
        }
    }

    pub fn kind(&self) -> CigarKind {
        // the low nibble is always one of the nine codes written by `new`
        CigarKind::ALL[(self.val & 0xf) as usize]
    }

    pub fn len(&self) -> u32 {
        self.val >> 4
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bases of the transcript covered by this operation.
    pub fn query_delta(&self) -> u64 {
        if self.kind().consumes_query() {
            self.len() as u64
        } else {
            0
        }
    }

    /// Bases of the reference covered by this operation.
    pub fn reference_delta(&self) -> u64 {
        if self.kind().consumes_reference() {
            self.len() as u64
        } else {
            0
        }
    }
}

impl fmt::Display for CigarOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.len(), self.kind())
    }
}

/// Parse a CIGAR string into its operations, in input order.
///
/// Every operator must be preceded by a non-zero length and belong to the
/// `MIDNSHP=X` alphabet (either case).
pub fn parse_cigar(cigar: &str) -> Result<Vec<CigarOp>, ParseErr> {
    let mut ops = Vec::new();
    let mut len: u32 = 0;
    let mut has_len = false;

    for (pos, c) in cigar.chars().enumerate() {
        if let Some(digit) = c.to_digit(10) {
            len = len
                .checked_mul(10)
                .and_then(|l| l.checked_add(digit))
                .filter(|&l| l <= CigarOp::MAX_LEN)
                .ok_or_else(|| {
                    ParseErr::MalformedCigar(format!(
                        "operation length too large at position {} in '{}'",
                        pos, cigar
                    ))
                })?;
            has_len = true;
            continue;
        }

        if !has_len {
            return Err(ParseErr::MalformedCigar(format!(
                "missing length before '{}' at position {} in '{}'",
                c, pos, cigar
            )));
        }
        let kind = CigarKind::from_char(c).ok_or_else(|| {
            ParseErr::MalformedCigar(format!(
                "unsupported operation '{}' at position {} in '{}'",
                c, pos, cigar
            ))
        })?;
        if len == 0 {
            return Err(ParseErr::MalformedCigar(format!(
                "zero-length '{}' operation in '{}'",
                c, cigar
            )));
        }

        ops.push(CigarOp::new(len, kind));
        len = 0;
        has_len = false;
    }

    if has_len {
        return Err(ParseErr::MalformedCigar(format!(
            "trailing length without an operation in '{}'",
            cigar
        )));
    }
    if ops.is_empty() {
        return Err(ParseErr::MalformedCigar("empty CIGAR string".to_string()));
    }

    Ok(ops)
}

/// Total reference bases spanned (M, D, N, =, X).
pub fn reference_length(ops: &[CigarOp]) -> u64 {
    ops.iter().map(CigarOp::reference_delta).sum()
}

/// Total transcript bases spanned (M, I, S, =, X).
pub fn query_length(ops: &[CigarOp]) -> u64 {
    ops.iter().map(CigarOp::query_delta).sum()
}

pub fn cigar_to_string(ops: &[CigarOp]) -> String {
    ops.iter().map(|op| op.to_string()).collect()
}
