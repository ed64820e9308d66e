use crate::address::Pca;
use crate::config::{BlockId, Counter, Geometry, Lba};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L2PValue {
    Invalid,
    Valid(Pca),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum P2LValue {
    Invalid,
    Valid(Lba),
}

/// Erased, or holding `valid` live pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Free,
    InUse { valid: Counter },
}

impl BlockState {
    pub fn is_free(&self) -> bool {
        matches!(self, BlockState::Free)
    }

    pub fn valid(&self) -> Option<Counter> {
        match self {
            BlockState::Free => None,
            BlockState::InUse { valid } => Some(*valid),
        }
    }
}

/// L2P and P2L tables plus per-block occupancy.
pub struct AddressMap {
    geometry: Geometry,
    l2p: Vec<L2PValue>,
    p2l: Vec<P2LValue>,
    blocks: Vec<BlockState>,
    free_blocks: Counter,
}

impl AddressMap {
    pub fn new(geometry: Geometry, logical_pages: usize) -> Self {
        AddressMap {
            geometry,
            l2p: vec![L2PValue::Invalid; logical_pages],
            p2l: vec![P2LValue::Invalid; geometry.physical_pages()],
            blocks: vec![BlockState::Free; geometry.blocks],
            free_blocks: geometry.blocks,
        }
    }

    /// Back to the freshly created state.
    pub fn clear(&mut self) {
        self.l2p.fill(L2PValue::Invalid);
        self.p2l.fill(P2LValue::Invalid);
        self.blocks.fill(BlockState::Free);
        self.free_blocks = self.geometry.blocks;
    }

    pub fn logical_pages(&self) -> usize {
        self.l2p.len()
    }

    pub fn free_blocks(&self) -> Counter {
        self.free_blocks
    }

    pub fn lookup(&self, lba: Lba) -> L2PValue {
        self.l2p[lba]
    }

    pub fn owner(&self, pca: Pca) -> P2LValue {
        self.p2l[self.geometry.flat_index(pca)]
    }

    pub fn block_state(&self, block: BlockId) -> BlockState {
        self.blocks[block]
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, BlockState)> + '_ {
        self.blocks.iter().copied().enumerate()
    }

    /// Free -> InUse with no live pages yet.
    pub fn claim_block(&mut self, block: BlockId) {
        debug_assert!(self.blocks[block].is_free(), "claiming used block {}", block);
        self.blocks[block] = BlockState::InUse { valid: 0 };
        self.free_blocks -= 1;
    }

    /// Marks the block erased and forgets every owner recorded inside it.
    pub fn release_block(&mut self, block: BlockId) {
        let start = self.geometry.flat_index(Pca::new(block, 0));
        self.p2l[start..start + self.geometry.pages_per_block].fill(P2LValue::Invalid);
        if !self.blocks[block].is_free() {
            self.blocks[block] = BlockState::Free;
            self.free_blocks += 1;
        }
    }

    /// Records that `lba` now lives at `pca` and counts the page as valid.
    pub fn bind(&mut self, lba: Lba, pca: Pca) {
        let idx = self.geometry.flat_index(pca);
        debug_assert_eq!(self.p2l[idx], P2LValue::Invalid, "{} already owned", pca);

        self.l2p[lba] = L2PValue::Valid(pca);
        self.p2l[idx] = P2LValue::Valid(lba);
        // pages are only programmed into claimed blocks
        debug_assert!(!self.blocks[pca.block()].is_free(), "bind into free block {}", pca.block());
        if let BlockState::InUse { valid } = &mut self.blocks[pca.block()] {
            *valid += 1;
        }
    }

    /// Marks the page at `pca` dead. The L2P entry of its owner is left alone.
    pub fn invalidate(&mut self, pca: Pca) {
        let idx = self.geometry.flat_index(pca);
        if self.p2l[idx] == P2LValue::Invalid {
            return;
        }
        self.p2l[idx] = P2LValue::Invalid;
        if let BlockState::InUse { valid } = &mut self.blocks[pca.block()] {
            *valid = valid.saturating_sub(1);
        }
    }

    /// Drops the mapping of `lba`, returning the page it pointed to.
    pub fn unmap(&mut self, lba: Lba) -> Option<Pca> {
        match std::mem::replace(&mut self.l2p[lba], L2PValue::Invalid) {
            L2PValue::Invalid => None,
            L2PValue::Valid(pca) => {
                self.invalidate(pca);
                Some(pca)
            }
        }
    }

    /// Verifies map inversion, valid counters and the free block count.
    pub fn check(&self) -> Result<(), String> {
        for (lba, value) in self.l2p.iter().enumerate() {
            if let L2PValue::Valid(pca) = value {
                let owner = self.owner(*pca);
                if owner != P2LValue::Valid(lba) {
                    return Err(format!("lba {} -> {} but p2l says {:?}", lba, pca, owner));
                }
            }
        }

        for (idx, value) in self.p2l.iter().enumerate() {
            if let P2LValue::Valid(lba) = value {
                let pca = self.geometry.pca_at(idx);
                if self.l2p[*lba] != L2PValue::Valid(pca) {
                    return Err(format!("{} claims lba {} which maps elsewhere", pca, lba));
                }
            }
        }

        let ppb = self.geometry.pages_per_block;
        for (block, state) in self.blocks() {
            let live = self.p2l[block * ppb..(block + 1) * ppb]
                .iter()
                .filter(|v| **v != P2LValue::Invalid)
                .count();
            match state {
                BlockState::Free if live != 0 => {
                    return Err(format!("free block {} holds {} live pages", block, live));
                }
                BlockState::InUse { valid } if valid != live => {
                    return Err(format!("block {} counts {} valid, p2l has {}", block, valid, live));
                }
                _ => {}
            }
        }

        let free = self.blocks.iter().filter(|s| s.is_free()).count();
        if free != self.free_blocks {
            return Err(format!("free count {} but {} blocks are free", self.free_blocks, free));
        }

        Ok(())
    }
}
