//! Simulated SSD flash translation layer exposing its logical space as one file.

#[macro_use]
extern crate log;

pub mod address;
pub mod alloc;
pub mod config;
pub mod error;
pub mod file;
pub mod ftl;
pub mod gc;
pub mod map;
pub mod nand;
pub mod stats;

pub use address::Pca;
pub use config::{FtlConfig, Geometry};
pub use error::{FtlError, Result};
pub use file::SsdFile;
pub use ftl::Ftl;
pub use gc::GcReport;
pub use nand::{FileNand, MemNand, NandDevice};
pub use stats::{FtlStats, StatCommand, StatValue};
