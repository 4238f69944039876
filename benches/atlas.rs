use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use brickvol::atlas::{AtlasManager, MissHashTable};
use brickvol::config::AtlasConfig;
use brickvol_core::codec::{Codec, Lz4Codec};
use brickvol_core::extension::ExtensionStrategy;
use brickvol_core::format::{Reader, Writer};
use brickvol_core::geometry::build_level_table;
use brickvol_core::meta::{BrickRow, DatasetMetadata, Emptiness};
use brickvol_core::voxel::ScalarType;
use brickvol_net::dataset::Dataset;

fn build_fixture(dir: &std::path::Path, volume_side: u32, brick_size: u32) -> Arc<dyn Dataset> {
    let path = dir.join("bench.bvf");
    let levels = build_level_table(volume_side, volume_side, volume_side, brick_size, 1);
    let (mut writer, tmp) = Writer::create(&path, 1024).unwrap();

    let mut bricks = Vec::new();
    for level in &levels {
        for _ in 0..level.brick_count() {
            let payload = vec![1u8; brick_size as usize * brick_size as usize * brick_size as usize];
            let compressed = Lz4Codec.encode(&payload);
            let (off, size) = writer.append_brick(&compressed).unwrap();
            bricks.push(BrickRow {
                offset: off,
                size,
                emptiness: Emptiness::Normal,
                checksum: 0,
            });
        }
    }

    let meta = DatasetMetadata {
        dims: [volume_side; 3],
        voxel_type: ScalarType::U8,
        brick_size,
        overlap: 1,
        extension: ExtensionStrategy::Clamp,
        codec: brickvol_core::codec::CodecTag::Lz4,
        background: 0,
        levels,
        bricks,
        unique_id: [0; 16],
    };
    writer.finish(tmp, &path, meta).unwrap();
    Arc::new(Reader::open(&path).unwrap())
}

fn bench_miss_hashtable_insert(c: &mut Criterion) {
    c.bench_function("miss_hashtable_insert_1024", |b| {
        b.iter(|| {
            let mut table = MissHashTable::new(2048, 32);
            for i in 0..1024u32 {
                table.insert(black_box(i));
            }
            black_box(table.readback());
        });
    });
}

fn bench_atlas_admission_under_pressure(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let dataset = build_fixture(dir.path(), 64, 16);

    c.bench_function("atlas_admission_cycle_64_slots", |b| {
        b.iter(|| {
            let mut manager = AtlasManager::new(dataset.clone(), AtlasConfig::default(), 64, 2048);
            for frame in 0..8u64 {
                manager.begin_frame();
                for i in 0..64u64 {
                    manager.report_miss(black_box((frame * 64 + i) % 200));
                }
                for admission in manager.collect_admissions() {
                    let _ = manager.admit(admission.brick_index);
                }
            }
            black_box(manager.occupied_slot_count());
        });
    });
}

criterion_group!(benches, bench_miss_hashtable_insert, bench_atlas_admission_under_pressure);
criterion_main!(benches);
