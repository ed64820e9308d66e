//! Greedy garbage collection: the used block with the fewest valid pages is emptied
//! into the open block and erased.

use crate::config::{BlockId, Counter};
use crate::error::{FtlError, Result};
use crate::ftl::Ftl;
use crate::map::P2LValue;
use crate::nand::NandDevice;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcReport {
    pub victim: BlockId,
    pub relocated: Counter,
    /// False when the device refused the erase; the block stays in use but empty.
    pub erased: bool,
}

impl<D: NandDevice> Ftl<D> {
    /// Picks the used block with the least valid pages, sparing the open block and
    /// the block of the last overwritten page.
    pub fn select_victim(&self) -> Option<(BlockId, Counter)> {
        let open = self.alloc.cursor().map(|pca| pca.block());
        let hot = self.hot.map(|pca| pca.block());
        let bound = self.config.geometry.pages_per_block + 1;

        self.map
            .blocks()
            .filter(|(block, _)| Some(*block) != open && Some(*block) != hot)
            .filter_map(|(block, state)| state.valid().map(|valid| (block, valid)))
            .filter(|(_, valid)| *valid < bound)
            .min_by_key(|(_, valid)| *valid)
    }

    /// Runs one collection cycle. `Ok(None)` when no block qualifies.
    ///
    /// Running out of space mid-relocation aborts the cycle; pages moved so far keep
    /// their new location and the victim is left partly valid.
    pub fn collect(&mut self) -> Result<Option<GcReport>> {
        let (victim, valid) = match self.select_victim() {
            Some(found) => found,
            None => {
                trace!("gc: no victim");
                return Ok(None);
            }
        };
        debug!("gc block {}: {} valid pages", victim, valid);

        self.stats.gc_cycles += 1;
        let relocated = self.move_block(victim)?;
        let erased = self.erase_block(victim);

        Ok(Some(GcReport { victim, relocated, erased }))
    }

    fn move_block(&mut self, victim: BlockId) -> Result<Counter> {
        let g = self.config.geometry;
        let mut relocated = 0;

        for page in 0..g.pages_per_block {
            let pca = g.pca_at(victim * g.pages_per_block + page);
            let lba = match self.map.owner(pca) {
                P2LValue::Valid(lba) => lba,
                P2LValue::Invalid => continue,
            };

            let data = self.read_pca(pca)?;
            let new_pca = match self.alloc.next_pca(&mut self.map) {
                Ok(new_pca) => new_pca,
                Err(e) => {
                    warn!("gc: out of space moving lba {} from block {}", lba, victim);
                    return Err(FtlError::from(e));
                }
            };
            self.program(new_pca, &data)?;

            trace!("gc move lba {}: {} -> {}", lba, pca, new_pca);
            self.map.invalidate(pca);
            self.map.bind(lba, new_pca);
            self.stats.pages_relocated += 1;
            relocated += 1;
        }

        Ok(relocated)
    }

    /// Best effort: a failed erase is logged and the block is retried by a later cycle.
    fn erase_block(&mut self, block: BlockId) -> bool {
        if let Err(source) = self.nand.erase_block(block) {
            warn!("gc: {}, block kept for a later cycle", FtlError::Erase { block, source });
            return false;
        }

        self.map.release_block(block);
        self.erase_counters[block] += 1;
        self.stats.blocks_erased += 1;
        true
    }
}

#[cfg(test)]
mod test {
    use crate::config::{FtlConfig, Geometry};
    use crate::error::FtlError;
    use crate::ftl::Ftl;
    use crate::map::BlockState;
    use crate::nand::{FileNand, MemNand};

    const PS: usize = 32;

    fn geometry() -> Geometry {
        Geometry { page_size: PS, pages_per_block: 4, blocks: 8 }
    }

    // collections only when asked for
    fn manual_ftl() -> Ftl<MemNand> {
        let cfg = FtlConfig {
            gc_threshold: usize::MAX,
            gc_free_blocks: 0,
            ..FtlConfig::new(geometry(), 16)
        };
        Ftl::new(cfg, MemNand::new(geometry())).unwrap()
    }

    #[test]
    fn picks_least_valid_block_outside_open_and_hot() {
        let mut fw = manual_ftl();
        // block 0: lbas 0..4, block 1: lbas 4..8
        for lba in 0..8 {
            fw.write(lba, &[lba as u8; PS], 0).unwrap();
        }
        // empties three pages of block 0 and one of block 1, cursor moves to block 2
        for lba in [0, 1, 2, 4] {
            fw.write(lba, &[0xF0; PS], 0).unwrap();
        }
        assert_eq!(fw.cursor().unwrap().block(), 2);
        assert_eq!(fw.hot().unwrap().block(), 1);
        assert_eq!(fw.select_victim(), Some((0, 1)));
    }

    #[test]
    fn hot_block_is_skipped() {
        let mut fw = manual_ftl();
        for lba in 0..8 {
            fw.write(lba, &[1u8; PS], 0).unwrap();
        }
        fw.write(0, &[2u8; PS], 0).unwrap();
        // block 0 has 3 valid but holds the hot page, block 1 has 4
        assert_eq!(fw.select_victim(), Some((1, 4)));
    }

    #[test]
    fn collect_relocates_and_erases() {
        let mut fw = manual_ftl();
        for lba in 0..8 {
            fw.write(lba, &[lba as u8 + 1; PS], 0).unwrap();
        }
        for lba in [0, 1, 2, 4] {
            fw.write(lba, &[0xF0; PS], 0).unwrap();
        }

        let report = fw.collect().unwrap().unwrap();
        assert_eq!(report.victim, 0);
        assert_eq!(report.relocated, 1);
        assert!(report.erased);
        assert_eq!(fw.block_state(0), BlockState::Free);
        assert_eq!(fw.erase_count(0), 1);

        assert_eq!(fw.read(3).unwrap(), vec![4u8; PS]);
        assert_eq!(fw.read(0).unwrap(), vec![0xF0; PS]);
        assert_eq!(fw.read(5).unwrap(), vec![6u8; PS]);
        fw.map().check().unwrap();
        assert!(fw.stats().nand_bytes_written > fw.stats().host_bytes_written);
    }

    #[test]
    fn nothing_to_collect_on_fresh_device() {
        let mut fw = manual_ftl();
        assert_eq!(fw.collect().unwrap(), None);
        fw.write(0, &[1u8; PS], 0).unwrap();
        // only the open block is in use
        assert_eq!(fw.collect().unwrap(), None);
    }

    #[test]
    fn out_of_space_mid_relocation_keeps_maps_exact() {
        let g = Geometry { page_size: PS, pages_per_block: 2, blocks: 3 };
        let cfg = FtlConfig {
            gc_threshold: usize::MAX,
            gc_free_blocks: 0,
            ..FtlConfig::new(g, 6)
        };
        let mut fw = Ftl::new(cfg, MemNand::new(g)).unwrap();

        // blocks 0 and 1 full of live pages, cursor on 2:0, nothing free
        for lba in 0..5 {
            fw.write(lba, &[lba as u8 + 1; PS], 0).unwrap();
        }
        assert_eq!(fw.map().free_blocks(), 0);

        // lba 0 fits into 2:1, lba 1 finds no block
        assert!(matches!(fw.collect(), Err(FtlError::OutOfSpace)));
        assert_eq!(fw.block_state(0), BlockState::InUse { valid: 1 });
        assert_eq!(fw.stats().pages_relocated, 1);
        assert_eq!(fw.stats().blocks_erased, 0);

        for lba in 0..5 {
            assert_eq!(fw.read(lba).unwrap(), vec![lba as u8 + 1; PS]);
        }
        fw.map().check().unwrap();
    }

    #[test]
    fn failed_erase_leaves_empty_block_for_next_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = FtlConfig {
            gc_threshold: usize::MAX,
            gc_free_blocks: 0,
            ..FtlConfig::new(geometry(), 16)
        };
        let nand = FileNand::create(dir.path(), geometry()).unwrap();
        let mut fw = Ftl::new(cfg, nand).unwrap();

        for lba in 0..4 {
            fw.write(lba, &[1u8; PS], 0).unwrap();
        }
        for lba in 0..4 {
            fw.write(lba, &[2u8; PS], 0).unwrap();
        }
        fw.write(0, &[3u8; PS], 0).unwrap();
        // block 0 is fully stale; hot page lives in block 1, cursor in block 2
        std::fs::remove_file(fw.device().block_path(0)).unwrap();

        let report = fw.collect().unwrap().unwrap();
        assert_eq!(report.victim, 0);
        assert!(!report.erased);
        assert_eq!(fw.block_state(0), BlockState::InUse { valid: 0 });
        fw.map().check().unwrap();

        std::fs::File::create(fw.device().block_path(0)).unwrap();
        let report = fw.collect().unwrap().unwrap();
        assert_eq!(report.victim, 0);
        assert!(report.erased);
        assert_eq!(fw.block_state(0), BlockState::Free);
    }
}
