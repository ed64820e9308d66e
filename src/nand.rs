//! Page-addressable NAND backends.
//!
//! A device only moves bytes. Valid-page counters and write statistics are kept by
//! the FTL around each successful call.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::address::Pca;
use crate::config::{BlockId, Geometry};

pub trait NandDevice {
    fn geometry(&self) -> Geometry;

    /// Reads one full page. Never-programmed bytes read back as zeros.
    fn read_page(&mut self, pca: Pca) -> io::Result<Vec<u8>>;

    /// Programs one full page; `data` must be exactly one page long.
    fn write_page(&mut self, pca: Pca, data: &[u8]) -> io::Result<()>;

    fn erase_block(&mut self, block: BlockId) -> io::Result<()>;
}

fn check_len(geometry: &Geometry, data: &[u8]) -> io::Result<()> {
    if data.len() != geometry.page_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("page write of {} bytes, page size is {}", data.len(), geometry.page_size),
        ));
    }
    Ok(())
}

/// One file per erase block, `nand_<block>` inside `dir`.
pub struct FileNand {
    dir: PathBuf,
    geometry: Geometry,
}

impl FileNand {
    /// Creates (or empties) every block file under `dir`.
    pub fn create<P: AsRef<Path>>(dir: P, geometry: Geometry) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let out = FileNand { dir, geometry };
        for block in 0..geometry.blocks {
            File::create(out.block_path(block))?;
        }
        debug!("created {} nand files in {}", geometry.blocks, out.dir.display());

        Ok(out)
    }

    pub fn block_path(&self, block: BlockId) -> PathBuf {
        self.dir.join(format!("nand_{}", block))
    }

    fn page_offset(&self, pca: Pca) -> u64 {
        (pca.page() * self.geometry.page_size) as u64
    }
}

impl NandDevice for FileNand {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn read_page(&mut self, pca: Pca) -> io::Result<Vec<u8>> {
        let mut file = File::open(self.block_path(pca.block()))?;
        file.seek(SeekFrom::Start(self.page_offset(pca)))?;

        let mut buf = Vec::with_capacity(self.geometry.page_size);
        file.take(self.geometry.page_size as u64).read_to_end(&mut buf)?;
        buf.resize(self.geometry.page_size, 0);

        Ok(buf)
    }

    fn write_page(&mut self, pca: Pca, data: &[u8]) -> io::Result<()> {
        check_len(&self.geometry, data)?;

        // no create: a missing block file is a device fault
        let mut file = OpenOptions::new().write(true).open(self.block_path(pca.block()))?;
        file.seek(SeekFrom::Start(self.page_offset(pca)))?;
        file.write_all(data)
    }

    fn erase_block(&mut self, block: BlockId) -> io::Result<()> {
        let path = self.block_path(block);
        if !path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is missing", path.display()),
            ));
        }
        File::create(path).map(|_| ())
    }
}

/// Volatile device kept in memory.
pub struct MemNand {
    geometry: Geometry,
    blocks: Vec<Vec<u8>>,
}

impl MemNand {
    pub fn new(geometry: Geometry) -> Self {
        MemNand {
            geometry,
            blocks: vec![Vec::new(); geometry.blocks],
        }
    }

    fn block_mut(&mut self, block: BlockId) -> io::Result<&mut Vec<u8>> {
        self.blocks
            .get_mut(block)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no block {}", block)))
    }
}

impl NandDevice for MemNand {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn read_page(&mut self, pca: Pca) -> io::Result<Vec<u8>> {
        let page_size = self.geometry.page_size;
        let start = pca.page() * page_size;
        let block = self.block_mut(pca.block())?;

        let mut buf = vec![0u8; page_size];
        if start < block.len() {
            let end = block.len().min(start + page_size);
            buf[..end - start].copy_from_slice(&block[start..end]);
        }
        Ok(buf)
    }

    fn write_page(&mut self, pca: Pca, data: &[u8]) -> io::Result<()> {
        check_len(&self.geometry, data)?;

        let page_size = self.geometry.page_size;
        let start = pca.page() * page_size;
        let block = self.block_mut(pca.block())?;

        if block.len() < start + page_size {
            block.resize(start + page_size, 0);
        }
        block[start..start + page_size].copy_from_slice(data);
        Ok(())
    }

    fn erase_block(&mut self, block: BlockId) -> io::Result<()> {
        self.block_mut(block)?.clear();
        Ok(())
    }
}
