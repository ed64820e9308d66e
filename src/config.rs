use crate::address::Pca;
use crate::error::{FtlError, Result};

pub type BaseType = usize;

pub type Lba = BaseType;
pub type PageId = BaseType;
pub type BlockId = BaseType;
pub type Counter = BaseType;

pub const PAGE_SIZE: BaseType = 4096;
pub const PAGES_PER_BLOCK: BaseType = 4;
pub const BLOCKS: BaseType = 16;

pub const ALL_PAGES: BaseType = BLOCKS * PAGES_PER_BLOCK;
pub const CAPACITY: usize = ALL_PAGES * PAGE_SIZE;

/// Physical pages written after which every host write runs a collection.
pub const GC_THRESHOLD: Counter = 80;
/// A write that leaves fewer free blocks than this runs a collection.
pub const GC_FREE_BLOCKS: Counter = 2;

/// Fixed physical layout of the simulated NAND.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub page_size: BaseType,
    pub pages_per_block: BaseType,
    pub blocks: BaseType,
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry {
            page_size: PAGE_SIZE,
            pages_per_block: PAGES_PER_BLOCK,
            blocks: BLOCKS,
        }
    }
}

impl Geometry {
    pub fn physical_pages(&self) -> BaseType {
        self.blocks * self.pages_per_block
    }

    pub fn physical_bytes(&self) -> usize {
        self.physical_pages() * self.page_size
    }

    pub fn contains(&self, pca: Pca) -> bool {
        pca.block() < self.blocks && pca.page() < self.pages_per_block
    }

    /// Position of `pca` in arrays laid out block after block.
    pub fn flat_index(&self, pca: Pca) -> usize {
        debug_assert!(self.contains(pca), "{} outside of {:?}", pca, self);
        pca.block() * self.pages_per_block + pca.page()
    }

    pub fn pca_at(&self, index: usize) -> Pca {
        debug_assert!(index < self.physical_pages(), "flat index {} out of range", index);
        Pca::new(index / self.pages_per_block, index % self.pages_per_block)
    }

    pub fn last_page(&self) -> PageId {
        self.pages_per_block - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtlConfig {
    pub geometry: Geometry,
    /// Number of L2P entries, i.e. the largest logical size in pages.
    pub logical_pages: BaseType,
    pub gc_threshold: Counter,
    pub gc_free_blocks: Counter,
}

impl Default for FtlConfig {
    fn default() -> Self {
        let geometry = Geometry::default();
        FtlConfig {
            geometry,
            logical_pages: geometry.physical_pages(),
            gc_threshold: GC_THRESHOLD,
            gc_free_blocks: GC_FREE_BLOCKS,
        }
    }
}

impl FtlConfig {
    pub fn new(geometry: Geometry, logical_pages: BaseType) -> Self {
        FtlConfig {
            geometry,
            logical_pages,
            ..FtlConfig::default()
        }
    }

    /// Reserves `op` percent of the physical pages as over-provisioning.
    pub fn with_op(geometry: Geometry, op: f64) -> Self {
        let all_pages = geometry.physical_pages();
        let op_pages = (all_pages as f64 * (op / 100.)).trunc() as BaseType;

        trace!("all pages: {}, op pages: {}", all_pages, op_pages);

        FtlConfig::new(geometry, all_pages.saturating_sub(op_pages))
    }

    pub fn logical_bytes(&self) -> usize {
        self.logical_pages * self.geometry.page_size
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.geometry;
        if g.page_size == 0 || g.blocks == 0 {
            return Err(FtlError::Config("geometry must have non-zero page size and block count"));
        }
        if g.pages_per_block < 2 {
            return Err(FtlError::Config("a block needs at least two pages"));
        }
        if self.logical_pages == 0 || self.logical_pages > g.physical_pages() {
            return Err(FtlError::Config("logical pages must be within 1..=physical pages"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn flat_index_round_trips_every_page() {
        let g = Geometry::default();
        for idx in 0..g.physical_pages() {
            assert_eq!(g.flat_index(g.pca_at(idx)), idx);
        }
        assert_eq!(g.pca_at(5), Pca::new(1, 1));
    }

    #[test]
    fn op_shrinks_logical_capacity() {
        let g = Geometry { page_size: 512, pages_per_block: 10, blocks: 10 };
        let cfg = FtlConfig::with_op(g, 7.0);
        assert_eq!(cfg.logical_pages, 93);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_bad_geometry() {
        let mut cfg = FtlConfig::default();
        cfg.geometry.pages_per_block = 1;
        assert!(matches!(cfg.validate(), Err(FtlError::Config(_))));

        let mut cfg = FtlConfig::default();
        cfg.logical_pages = cfg.geometry.physical_pages() + 1;
        assert!(matches!(cfg.validate(), Err(FtlError::Config(_))));
    }
}
