use byte_unit::Byte;

use crate::address::Pca;
use crate::alloc::PageAllocator;
use crate::config::*;
use crate::error::{FtlError, Result};
use crate::map::{AddressMap, BlockState, L2PValue};
use crate::nand::NandDevice;
use crate::stats::FtlStats;

/// Page-mapped flash translation layer over a [`NandDevice`].
pub struct Ftl<D: NandDevice> {
    pub(crate) config: FtlConfig,
    pub(crate) nand: D,
    pub(crate) map: AddressMap,
    pub(crate) alloc: PageAllocator,
    /// Page most recently superseded by an overwrite. Its block is spared by GC.
    pub(crate) hot: Option<Pca>,
    pub(crate) stats: FtlStats,
    pub(crate) erase_counters: Vec<Counter>,
}

/// Overlays `data` at `offset` on top of the old page, or on zeros if there is none.
pub fn merge_page(old: Option<&[u8]>, page_size: usize, offset: usize, data: &[u8]) -> Vec<u8> {
    debug_assert!(offset + data.len() <= page_size, "merge past the page end");

    let mut page = match old {
        Some(old) => old.to_vec(),
        None => vec![0u8; page_size],
    };
    page.resize(page_size, 0);
    page[offset..offset + data.len()].copy_from_slice(data);
    page
}

impl<D: NandDevice> Ftl<D> {
    pub fn new(config: FtlConfig, nand: D) -> Result<Self> {
        config.validate()?;
        if nand.geometry() != config.geometry {
            return Err(FtlError::Config("device geometry differs from configuration"));
        }

        let g = config.geometry;
        info!(
            "Physical Capacity: {} bytes, {}",
            g.physical_bytes(),
            Byte::from(g.physical_bytes()).get_appropriate_unit(true).to_string()
        );
        info!(
            "User Capacity: {} bytes, {}",
            config.logical_bytes(),
            Byte::from(config.logical_bytes()).get_appropriate_unit(true).to_string()
        );

        Ok(Ftl {
            map: AddressMap::new(g, config.logical_pages),
            alloc: PageAllocator::new(g),
            hot: None,
            stats: FtlStats::default(),
            erase_counters: vec![0; g.blocks],
            config,
            nand,
        })
    }

    pub fn config(&self) -> &FtlConfig {
        &self.config
    }

    pub fn stats(&self) -> &FtlStats {
        &self.stats
    }

    pub fn map(&self) -> &AddressMap {
        &self.map
    }

    pub fn device(&self) -> &D {
        &self.nand
    }

    pub fn cursor(&self) -> Option<Pca> {
        self.alloc.cursor()
    }

    pub fn hot(&self) -> Option<Pca> {
        self.hot
    }

    pub fn erase_count(&self, block: BlockId) -> Counter {
        self.erase_counters[block]
    }

    pub fn logical_size(&self) -> usize {
        self.stats.logical_size
    }

    pub fn page_size(&self) -> usize {
        self.config.geometry.page_size
    }

    /// Sets the exposed logical size in bytes, at most the physical capacity.
    ///
    /// Pages past the L2P map still fail with `LbaOutOfRange` when accessed.
    pub fn resize(&mut self, new_size: usize) -> Result<()> {
        let limit = self.config.geometry.physical_bytes();
        if new_size > limit {
            return Err(FtlError::CapacityExceeded { requested: new_size, limit });
        }
        self.stats.logical_size = new_size;
        Ok(())
    }

    /// Forgets every mapping and reopens the allocator from block 0.
    pub fn reset(&mut self) {
        self.map.clear();
        self.alloc.reset();
        self.hot = None;
        debug!("ftl reset");
    }

    fn check_lba(&self, lba: Lba) -> Result<()> {
        let limit = self.map.logical_pages();
        if lba >= limit {
            return Err(FtlError::LbaOutOfRange { lba, limit });
        }
        Ok(())
    }

    pub fn read(&mut self, lba: Lba) -> Result<Vec<u8>> {
        self.check_lba(lba)?;
        match self.map.lookup(lba) {
            L2PValue::Invalid => Err(FtlError::InvalidAddress { lba }),
            L2PValue::Valid(pca) => self.read_pca(pca),
        }
    }

    pub(crate) fn read_pca(&mut self, pca: Pca) -> Result<Vec<u8>> {
        trace!("read {}", pca);
        self.nand.read_page(pca).map_err(|source| FtlError::Io { pca, source })
    }

    /// Programs a full page and accounts for it.
    pub(crate) fn program(&mut self, pca: Pca, page: &[u8]) -> Result<()> {
        trace!("program {}", pca);
        self.nand
            .write_page(pca, page)
            .map_err(|source| FtlError::Io { pca, source })?;

        self.stats.physical_pages_written += 1;
        self.stats.nand_bytes_written += page.len();
        Ok(())
    }

    /// Writes `data` at `offset` inside logical page `lba`.
    ///
    /// Returns the page size once the page is committed. A partial page is merged
    /// with the current contents first. Collection may run before returning.
    pub fn write(&mut self, lba: Lba, data: &[u8], offset: usize) -> Result<usize> {
        self.check_lba(lba)?;
        let page_size = self.page_size();
        if data.is_empty() || offset + data.len() > page_size {
            return Err(FtlError::PageSizeMismatch {
                expected: page_size,
                actual: offset + data.len(),
            });
        }

        let new_pca = self.alloc.next_pca(&mut self.map)?;
        let old_pca = match self.map.lookup(lba) {
            L2PValue::Valid(pca) => Some(pca),
            L2PValue::Invalid => None,
        };

        let page = if data.len() != page_size {
            let old = match old_pca {
                Some(pca) => Some(self.read_pca(pca)?),
                None => None,
            };
            merge_page(old.as_deref(), page_size, offset, data)
        } else {
            data.to_vec()
        };

        if let Err(e) = self.program(new_pca, &page) {
            warn!("write of lba {} to {} failed, mapping kept", lba, new_pca);
            return Err(e);
        }

        if let Some(old) = old_pca {
            self.map.invalidate(old);
            self.hot = Some(old);
        }
        self.map.bind(lba, new_pca);
        self.stats.host_bytes_written += data.len();

        if self.gc_due() {
            if let Err(e) = self.collect() {
                warn!("gc after write of lba {} stopped: {}", lba, e);
            }
        }

        Ok(page_size)
    }

    /// Drops the mapping of `lba`; the page becomes garbage.
    pub fn trim(&mut self, lba: Lba) -> Result<()> {
        self.check_lba(lba)?;
        if let Some(pca) = self.map.unmap(lba) {
            trace!("trim lba {} at {}", lba, pca);
        }
        Ok(())
    }

    fn gc_due(&self) -> bool {
        self.stats.physical_pages_written >= self.config.gc_threshold
            || self.map.free_blocks() < self.config.gc_free_blocks
    }

    /// Valid pages per block, `None` for free blocks.
    pub fn valid_counts(&self) -> Vec<Option<Counter>> {
        self.map.blocks().map(|(_, state)| state.valid()).collect()
    }

    pub fn block_state(&self, block: BlockId) -> BlockState {
        self.map.block_state(block)
    }
}
