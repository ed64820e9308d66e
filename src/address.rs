use std::fmt;

use crate::config::{BlockId, PageId};

/// Physical page address: a block and a page inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pca {
    block: BlockId,
    page: PageId,
}

impl Pca {
    pub const fn new(block: BlockId, page: PageId) -> Self {
        Pca { block, page }
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn page(&self) -> PageId {
        self.page
    }

    /// Next page of the same block.
    pub(crate) fn next_page(&self) -> Self {
        Pca::new(self.block, self.page + 1)
    }
}

impl fmt::Display for Pca {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.page)
    }
}
