use std::io;

use thiserror::Error;

use crate::address::Pca;
use crate::config::{BlockId, Lba};

pub type Result<T> = std::result::Result<T, FtlError>;

#[derive(Error, Debug)]
pub enum FtlError {
    /// No free block is left for the allocator.
    #[error("out of free blocks")]
    OutOfSpace,

    /// Read of a logical page that was never written.
    #[error("lba {lba} is not mapped")]
    InvalidAddress { lba: Lba },

    #[error("lba {lba} is beyond the logical map ({limit} entries)")]
    LbaOutOfRange { lba: Lba, limit: usize },

    #[error("requested size {requested} exceeds capacity {limit}")]
    CapacityExceeded { requested: usize, limit: usize },

    #[error("nand i/o failed at {pca}")]
    Io {
        pca: Pca,
        #[source]
        source: io::Error,
    },

    #[error("erase of block {block} failed: {source}")]
    Erase {
        block: BlockId,
        #[source]
        source: io::Error,
    },

    #[error("page size mismatch: expected {expected} bytes, got {actual}")]
    PageSizeMismatch { expected: usize, actual: usize },

    #[error("configuration error: {0}")]
    Config(&'static str),
}

/// Allocator outcome when no free block can be found.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("out of free blocks")]
pub struct OutOfSpace;

impl From<OutOfSpace> for FtlError {
    fn from(_: OutOfSpace) -> Self {
        FtlError::OutOfSpace
    }
}
