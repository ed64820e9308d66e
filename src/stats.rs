use crate::config::Counter;

/// Cumulative counters. They survive `reset`; only the logical size is rewritten.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FtlStats {
    /// Bytes currently exposed to the host.
    pub logical_size: usize,
    pub physical_pages_written: Counter,
    pub host_bytes_written: usize,
    pub nand_bytes_written: usize,

    pub gc_cycles: Counter,
    pub pages_relocated: Counter,
    pub blocks_erased: Counter,
}

impl FtlStats {
    /// NAND bytes over host bytes, `None` until the host wrote something.
    pub fn write_amplification(&self) -> Option<f64> {
        if self.host_bytes_written == 0 {
            return None;
        }
        Some(self.nand_bytes_written as f64 / self.host_bytes_written as f64)
    }
}

/// Out-of-band queries a front end can forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatCommand {
    LogicalSize,
    PhysicalSize,
    WriteAmplification,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue {
    Bytes(usize),
    Pages(Counter),
    Ratio(Option<f64>),
}

impl FtlStats {
    pub fn query(&self, cmd: StatCommand) -> StatValue {
        match cmd {
            StatCommand::LogicalSize => StatValue::Bytes(self.logical_size),
            StatCommand::PhysicalSize => StatValue::Pages(self.physical_pages_written),
            StatCommand::WriteAmplification => StatValue::Ratio(self.write_amplification()),
        }
    }
}
