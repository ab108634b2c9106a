use crate::lump::{Format, LumpKind};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Why a cross-reference could not be turned into an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DanglingReason {
    BeforeBase,
    Misaligned { element_size: u32 },
    PastEnd { count: usize },
    OutsideChildRanges,
    NotARecordStart,
    Negative,
}

impl Display for DanglingReason {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            DanglingReason::BeforeBase => write!(f, "offset lies before the target lump"),
            DanglingReason::Misaligned { element_size } => {
                write!(f, "offset is not a multiple of the {}-byte element size", element_size)
            }
            DanglingReason::PastEnd { count } => {
                write!(f, "index is past the end of a {}-element lump", count)
            }
            DanglingReason::OutsideChildRanges => {
                write!(f, "offset is in neither the node nor the leaf lump")
            }
            DanglingReason::NotARecordStart => write!(f, "offset is not the start of a record"),
            DanglingReason::Negative => write!(f, "index is negative"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BspError {
    #[error("{format} BSP version mismatch: expected {expected}, found {found}")]
    FormatVersionMismatch {
        format: Format,
        expected: u32,
        found: u32,
    },

    #[error("{format} header needs {needed} bytes but the buffer holds {size}")]
    TruncatedHeader {
        format: Format,
        needed: usize,
        size: usize,
    },

    #[error(
        "{lump} lump (offset {offset}, length {length}) runs past the end of a {size}-byte buffer"
    )]
    LumpOutOfBounds {
        lump: LumpKind,
        offset: u64,
        length: u64,
        size: u64,
    },

    #[error("{lump} lump of {length} bytes doesn't hold {count} elements of {element_size} bytes")]
    ElementSizeMismatch {
        lump: LumpKind,
        length: u64,
        element_size: usize,
        count: u64,
    },

    #[error("{from} references {to} with {value}: {reason}")]
    DanglingReference {
        from: LumpKind,
        to: LumpKind,
        value: i64,
        reason: DanglingReason,
    },

    #[error("{lump} lump is not NUL-terminated")]
    UnterminatedTextLump { lump: LumpKind },

    #[error("polygon lump holds {declared} polygons but {flagged} faces are flagged for one")]
    TopologyMismatch { declared: usize, flagged: usize },

    #[error("polygon {polygon} names face {face}, which doesn't link back to it")]
    PolygonBackLink { polygon: usize, face: usize },

    #[error("{what} needs {needed} entries but the format allows {limit}")]
    CapacityExceeded {
        what: &'static str,
        needed: usize,
        limit: usize,
    },

    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },
}

impl BspError {
    pub fn dangling(from: LumpKind, to: LumpKind, value: i64, reason: DanglingReason) -> Self {
        BspError::DanglingReference {
            from,
            to,
            value,
            reason,
        }
    }
}

pub type BspResult<T> = Result<T, BspError>;

/// Narrows a count or index to the width of its on-disk field.
pub fn narrow<T: TryFrom<usize>>(value: usize, what: &'static str, limit: usize) -> BspResult<T> {
    T::try_from(value).map_err(|_| BspError::CapacityExceeded {
        what,
        needed: value,
        limit,
    })
}
