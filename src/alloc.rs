use crate::address::Pca;
use crate::config::Geometry;
use crate::error::OutOfSpace;
use crate::map::AddressMap;

/// Append-only cursor over the physical pages.
///
/// Pages are handed out in order inside a block. When the block is full the next
/// free block is searched round-robin starting at the current one.
pub struct PageAllocator {
    geometry: Geometry,
    cursor: Option<Pca>,
}

impl PageAllocator {
    pub fn new(geometry: Geometry) -> Self {
        PageAllocator { geometry, cursor: None }
    }

    pub fn reset(&mut self) {
        self.cursor = None;
    }

    /// Most recently allocated page.
    pub fn cursor(&self) -> Option<Pca> {
        self.cursor
    }

    pub fn next_pca(&mut self, map: &mut AddressMap) -> Result<Pca, OutOfSpace> {
        let next = match self.cursor {
            None => {
                // a fresh device always starts at block 0
                map.claim_block(0);
                debug!("open block 0");
                Pca::new(0, 0)
            }
            Some(pca) if pca.page() == self.geometry.last_page() => {
                let block = self.next_free_block(pca.block(), map).ok_or(OutOfSpace)?;
                map.claim_block(block);
                debug!("open block {}, {} free left", block, map.free_blocks());
                Pca::new(block, 0)
            }
            Some(pca) => pca.next_page(),
        };

        self.cursor = Some(next);
        Ok(next)
    }

    fn next_free_block(&self, from: usize, map: &AddressMap) -> Option<usize> {
        let blocks = self.geometry.blocks;
        (0..blocks)
            .map(|i| (from + i) % blocks)
            .find(|&block| map.block_state(block).is_free())
    }
}
