use std::path::PathBuf;
use std::process::ExitCode;

#[macro_use]
extern crate log;
extern crate simplelog;

use byte_unit::Byte;
use clap::Parser;
use rand::prelude::*;
use simplelog::*;
use time::macros::format_description;

use ssd_ftl::config::*;
use ssd_ftl::{FileNand, Ftl, FtlConfig, Geometry, MemNand, NandDevice, SsdFile, StatCommand, StatValue};

/// Drives a random overwrite workload through the simulated FTL.
#[derive(Parser, Debug, Clone)]
#[command(name = "ssd-ftl")]
#[command(about = "Simulated SSD flash translation layer")]
#[command(version)]
struct Args {
    /// Bytes per page.
    #[arg(long, default_value_t = PAGE_SIZE)]
    page_size: usize,

    /// Pages per erase block.
    #[arg(long, default_value_t = PAGES_PER_BLOCK)]
    pages_per_block: usize,

    /// Number of erase blocks.
    #[arg(long, default_value_t = BLOCKS)]
    blocks: usize,

    /// Over-provisioning in percent of the physical pages.
    #[arg(long, default_value_t = 25.0)]
    op: f64,

    /// Physical pages written before every write also collects.
    #[arg(long, default_value_t = GC_THRESHOLD)]
    gc_threshold: usize,

    /// Keep at least this many free blocks by collecting.
    #[arg(long, default_value_t = GC_FREE_BLOCKS)]
    gc_free_blocks: usize,

    /// Directory holding one file per block. In memory when omitted.
    #[arg(long, short = 'd')]
    nand_dir: Option<PathBuf>,

    /// Capacity-sized passes of random writes after preconditioning.
    #[arg(long, default_value_t = 4)]
    rounds: usize,

    /// Share of random writes that only touch part of a page.
    #[arg(long, default_value_t = 0.0)]
    partial_ratio: f64,

    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// off, error, warn, info, debug or trace.
    #[arg(long, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,
}

fn parse_level(name: &str) -> Result<LevelFilter, String> {
    name.parse::<LevelFilter>()
        .map_err(|e| format!("{}: {}", name, e))
}

fn report<D: NandDevice>(file: &SsdFile<D>) {
    if let StatValue::Bytes(size) = file.query(StatCommand::LogicalSize) {
        info!(
            "logical size: {} bytes, {}",
            size,
            Byte::from(size).get_appropriate_unit(true).to_string()
        );
    }
    if let StatValue::Pages(pages) = file.query(StatCommand::PhysicalSize) {
        info!("physical pages written: {}", pages);
    }
    match file.query(StatCommand::WriteAmplification) {
        StatValue::Ratio(Some(wa)) => info!("write amplification: {:.3}", wa),
        _ => info!("write amplification: n/a"),
    }
}

fn run<D: NandDevice>(args: &Args, mut file: SsdFile<D>) -> ssd_ftl::Result<usize> {
    let page_size = file.ftl().page_size();
    let max_lba = file.ftl().config().logical_pages - 1;
    let partial_ratio = args.partial_ratio.clamp(0.0, 1.0);

    let mut rng: SmallRng = SmallRng::seed_from_u64(args.seed);
    let mut shadow = vec![vec![0u8; page_size]; max_lba + 1];

    for (lba, page) in shadow.iter_mut().enumerate() {
        rng.fill(&mut page[..]);
        file.write_at(lba * page_size, page)?;
    }
    info!("Drive preconditioned");
    report(&file);

    for c in 0..args.rounds {
        for _ in 0..=max_lba {
            let lba = rng.gen_range(0..=max_lba);
            let (inner, len) = if rng.gen_bool(partial_ratio) {
                let inner = rng.gen_range(0..page_size);
                (inner, rng.gen_range(1..=page_size - inner))
            } else {
                (0, page_size)
            };

            let chunk = &mut shadow[lba][inner..inner + len];
            rng.fill(chunk);
            file.write_at(lba * page_size + inner, chunk)?;
        }
        info!("Capacity {} randomly written", c);
        report(&file);
    }

    let stats = file.ftl().stats();
    info!(
        "gc cycles: {}, pages relocated: {}, blocks erased: {}",
        stats.gc_cycles, stats.pages_relocated, stats.blocks_erased
    );

    let mut mismatches = 0;
    let mut buf = vec![0u8; page_size];
    for (lba, page) in shadow.iter().enumerate() {
        let n = file.read_at(lba * page_size, &mut buf)?;
        if n != page_size || buf != *page {
            error!("lba {} does not read back what was written", lba);
            mismatches += 1;
        }
    }
    Ok(mismatches)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_cfg = ConfigBuilder::new()
        .set_time_format_custom(format_description!("[hour]:[minute]:[second].[subsecond]"))
        .build();
    if let Err(e) = SimpleLogger::init(args.log_level, log_cfg) {
        eprintln!("logger init failed: {}", e);
    }

    let geometry = Geometry {
        page_size: args.page_size,
        pages_per_block: args.pages_per_block,
        blocks: args.blocks,
    };
    let config = FtlConfig {
        gc_threshold: args.gc_threshold,
        gc_free_blocks: args.gc_free_blocks,
        ..FtlConfig::with_op(geometry, args.op)
    };

    let result = match &args.nand_dir {
        Some(dir) => match FileNand::create(dir, geometry) {
            Ok(nand) => Ftl::new(config, nand).and_then(|ftl| run(&args, SsdFile::new(ftl))),
            Err(e) => {
                error!("cannot create nand files in {}: {}", dir.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Ftl::new(config, MemNand::new(geometry)).and_then(|ftl| run(&args, SsdFile::new(ftl))),
    };

    match result {
        Ok(0) => ExitCode::SUCCESS,
        Ok(mismatches) => {
            error!("{} logical pages corrupted", mismatches);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("workload stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}
