//! The logical space seen as one byte-addressed file.

use num_integer::div_rem;

use crate::config::Lba;
use crate::error::Result;
use crate::ftl::Ftl;
use crate::nand::NandDevice;
use crate::stats::{StatCommand, StatValue};

pub struct SsdFile<D: NandDevice> {
    ftl: Ftl<D>,
}

impl<D: NandDevice> SsdFile<D> {
    pub fn new(ftl: Ftl<D>) -> Self {
        SsdFile { ftl }
    }

    pub fn ftl(&self) -> &Ftl<D> {
        &self.ftl
    }

    pub fn ftl_mut(&mut self) -> &mut Ftl<D> {
        &mut self.ftl
    }

    pub fn len(&self) -> usize {
        self.ftl.logical_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn query(&self, cmd: StatCommand) -> StatValue {
        self.ftl.stats().query(cmd)
    }

    /// Pages covering `len` bytes from the start of the file.
    fn pages_for(&self, len: usize) -> usize {
        let (pages, rest) = div_rem(len, self.ftl.page_size());
        pages + usize::from(rest > 0)
    }

    /// Reads up to `buf.len()` bytes at `offset`, clamped to the file size.
    ///
    /// Stops at the first page that cannot be read and returns what was copied so far.
    pub fn read_at(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let size = self.len();
        if offset >= size || buf.is_empty() {
            return Ok(0);
        }

        let len = buf.len().min(size - offset);
        let page_size = self.ftl.page_size();
        let mut done = 0;

        while done < len {
            let (lba, inner) = div_rem(offset + done, page_size);
            let n = (page_size - inner).min(len - done);

            match self.ftl.read(lba) {
                Ok(page) => buf[done..done + n].copy_from_slice(&page[inner..inner + n]),
                Err(e) if done == 0 => return Err(e),
                Err(e) => {
                    warn!("short read at lba {}: {}", lba, e);
                    break;
                }
            }
            done += n;
        }

        Ok(done)
    }

    /// Writes `data` at `offset`, growing the file when the write ends past it.
    ///
    /// Stops at the first page that cannot be written and returns the bytes committed.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }

        let end = offset + data.len();
        if end > self.len() {
            self.ftl.resize(end)?;
        }

        let page_size = self.ftl.page_size();
        let mut done = 0;

        while done < data.len() {
            let (lba, inner) = div_rem(offset + done, page_size);
            let n = (page_size - inner).min(data.len() - done);

            match self.ftl.write(lba, &data[done..done + n], inner) {
                Ok(_) => {}
                Err(e) if done == 0 => return Err(e),
                Err(e) => {
                    warn!("short write at lba {}: {}", lba, e);
                    break;
                }
            }
            done += n;
        }

        Ok(done)
    }

    /// Sets the file size. Zero wipes the translation state, shrinking trims the
    /// pages past the new end.
    pub fn truncate(&mut self, size: usize) -> Result<()> {
        let old_pages = self.pages_for(self.len());
        self.ftl.resize(size)?;

        if size == 0 {
            self.ftl.reset();
            return Ok(());
        }

        let logical_pages = self.ftl.map().logical_pages();
        let keep = self.pages_for(size);
        for lba in keep..old_pages.min(logical_pages) {
            self.ftl.trim(lba as Lba)?;
        }
        Ok(())
    }
}
