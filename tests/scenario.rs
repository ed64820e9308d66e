use rand::prelude::*;

use ssd_ftl::map::{BlockState, P2LValue};
use ssd_ftl::{FileNand, Ftl, FtlConfig, FtlError, Geometry, MemNand, SsdFile, StatCommand, StatValue};

const PS: usize = 4096;

fn geometry() -> Geometry {
    Geometry { page_size: PS, pages_per_block: 4, blocks: 16 }
}

fn page(tag: u8) -> Vec<u8> {
    (0..PS).map(|i| tag.wrapping_add(i as u8)).collect()
}

#[test]
fn overwrite_then_gc_keeps_reads() {
    let mut fw = Ftl::new(FtlConfig::new(geometry(), 8), MemNand::new(geometry())).unwrap();
    fw.resize(8 * PS).unwrap();

    let a = page(0xA0);
    assert_eq!(fw.write(0, &a, 0).unwrap(), PS);
    assert_eq!(fw.read(0).unwrap(), a);

    let old = fw.cursor().unwrap();
    let before = fw.block_state(old.block()).valid().unwrap();
    let b = page(0xB0);
    fw.write(0, &b, 0).unwrap();
    // the new page landed in the same block, so the count is unchanged net
    assert_eq!(fw.map().owner(old), P2LValue::Invalid);
    assert_eq!(fw.block_state(old.block()).valid().unwrap(), before);
    assert_eq!(fw.read(0).unwrap(), b);

    let mut expect = vec![None; 8];
    expect[0] = Some(b);
    for i in 0..80 {
        let lba = i % 8;
        let data = page(i as u8);
        fw.write(lba, &data, 0).unwrap();
        expect[lba] = Some(data);
        fw.map().check().unwrap();
    }
    assert!(fw.stats().gc_cycles > 0);
    assert!(fw.stats().blocks_erased > 0);

    for (lba, data) in expect.iter().enumerate() {
        assert_eq!(&fw.read(lba).unwrap(), data.as_ref().unwrap());
    }

    assert!(matches!(
        fw.resize(16 * 4 * PS + 1),
        Err(FtlError::CapacityExceeded { .. })
    ));
}

#[test]
fn overwrite_in_other_block_decrements_old_counter() {
    let mut fw = Ftl::new(FtlConfig::new(geometry(), 8), MemNand::new(geometry())).unwrap();
    for lba in 0..4 {
        fw.write(lba, &page(lba as u8), 0).unwrap();
    }
    assert_eq!(fw.block_state(0), BlockState::InUse { valid: 4 });

    fw.write(1, &page(0xEE), 0).unwrap();
    assert_eq!(fw.block_state(0), BlockState::InUse { valid: 3 });
    assert_eq!(fw.block_state(1), BlockState::InUse { valid: 1 });
    assert!(matches!(fw.read(5), Err(FtlError::InvalidAddress { lba: 5 })));
}

#[test]
fn random_partial_writes_keep_maps_consistent() {
    let g = geometry();
    let logical = 24;
    let mut fw = Ftl::new(FtlConfig::new(g, logical), MemNand::new(g)).unwrap();
    let mut shadow: Vec<Option<Vec<u8>>> = vec![None; logical];
    let mut rng = SmallRng::seed_from_u64(42);

    for _ in 0..600 {
        let lba = rng.gen_range(0..logical);
        let (inner, len) = if rng.gen_bool(0.3) {
            let inner = rng.gen_range(0..PS);
            (inner, rng.gen_range(1..=PS - inner))
        } else {
            (0, PS)
        };
        let mut data = vec![0u8; len];
        rng.fill(&mut data[..]);

        fw.write(lba, &data, inner).unwrap();
        let cur = shadow[lba].get_or_insert_with(|| vec![0u8; PS]);
        cur[inner..inner + len].copy_from_slice(&data);

        fw.map().check().unwrap();
    }

    for (lba, data) in shadow.iter().enumerate() {
        match data {
            Some(data) => assert_eq!(&fw.read(lba).unwrap(), data, "lba {}", lba),
            None => assert!(fw.read(lba).is_err()),
        }
    }

    let stats = fw.stats();
    assert!(stats.gc_cycles > 0);
    assert!(stats.nand_bytes_written >= stats.host_bytes_written);
    if stats.pages_relocated > 0 {
        assert!(stats.write_amplification().unwrap() > 1.0);
    }
}

#[test]
fn file_on_disk_survives_gc() {
    let dir = tempfile::tempdir().unwrap();
    let g = geometry();
    let nand = FileNand::create(dir.path(), g).unwrap();
    let mut file = SsdFile::new(Ftl::new(FtlConfig::new(g, 8), nand).unwrap());

    let data: Vec<u8> = (0..3 * PS).map(|i| (i % 251) as u8).collect();
    for _ in 0..40 {
        assert_eq!(file.write_at(100, &data).unwrap(), data.len());
    }
    assert_eq!(file.len(), 100 + 3 * PS);

    let mut buf = vec![0u8; data.len()];
    assert_eq!(file.read_at(100, &mut buf).unwrap(), data.len());
    assert_eq!(buf, data);

    match file.query(StatCommand::WriteAmplification) {
        StatValue::Ratio(Some(wa)) => assert!(wa > 1.0),
        other => panic!("unexpected {:?}", other),
    }
    file.ftl().map().check().unwrap();
}
