//! End-to-end builder + reader scenarios (spec §8 scenarios 1-2 and the
//! build -> read -> rebuild idempotence law).

use brickvol::config::BuilderConfig;
use brickvol::ingest::synth::{SynthAccessor, SynthPattern};
use brickvol::volume::builder;
use brickvol_core::accessor::RawVolumeAccessor;
use brickvol_core::extension::ExtensionStrategy;
use brickvol_core::format::Reader;
use brickvol_core::meta::Emptiness;
use brickvol_core::voxel::ScalarType;

fn builder_config() -> BuilderConfig {
    BuilderConfig {
        brick_size: 64,
        overlap: 2,
        extension_strategy: ExtensionStrategy::FillZeroes,
        use_compressor: true,
    }
}

#[test]
fn linear_volume_inner_voxels_match_source_region() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("linear.bvf");

    let accessor = SynthAccessor::new([128, 128, 128], ScalarType::U8, SynthPattern::Linear);
    builder::build(&accessor, &builder_config(), "linear fixture", &out).unwrap();

    let reader = Reader::open(&out).unwrap();
    let mut payload = Vec::new();
    reader.brick(0, &mut payload).unwrap();

    let inner = 64 - 2 * 2;
    let expected = accessor.read_region(0, inner, 0, inner, 0, inner).unwrap();

    for z in 0..inner {
        for y in 0..inner {
            let src_row = ((z * inner + y) * inner) as usize;
            let brick_row = (((z + 2) * 64 + (y + 2)) * 64 + 2) as usize;
            assert_eq!(
                &payload[brick_row..brick_row + inner as usize],
                &expected[src_row..src_row + inner as usize],
                "mismatch at y={y} z={z}"
            );
        }
    }

    assert!(
        !reader.metadata().bricks.iter().any(|b| b.emptiness == Emptiness::ChildEmpty),
        "a non-constant pattern must never classify a brick as CHILD_EMPTY"
    );
}

#[test]
fn constant_volume_collapses_to_a_tiny_child_empty_pyramid() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("constant.bvf");

    let accessor = SynthAccessor::new([256, 256, 256], ScalarType::U8, SynthPattern::Constant(0));
    builder::build(&accessor, &builder_config(), "constant fixture", &out).unwrap();

    let reader = Reader::open(&out).unwrap();
    let top = reader.metadata().levels.last().unwrap();
    assert_eq!(top.brick_count(), 1);
    let top_index = reader.metadata().bricks.len() as u64 - 1;
    assert_eq!(reader.metadata().bricks[top_index as usize].emptiness, Emptiness::ChildEmpty);

    for row in &reader.metadata().bricks {
        assert_eq!(row.size, 0, "empty bricks must not store a payload");
    }

    let file_size = std::fs::metadata(&out).unwrap().len();
    assert!(file_size < 1024 * 1024, "an all-empty dataset must stay under 1 MiB, got {file_size}");
}

#[test]
fn sub_brick_sized_volume_produces_a_single_top_level_brick() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("tiny.bvf");

    let accessor = SynthAccessor::new([10, 10, 10], ScalarType::U8, SynthPattern::Linear);
    builder::build(&accessor, &builder_config(), "tiny fixture", &out).unwrap();

    let reader = Reader::open(&out).unwrap();
    assert_eq!(reader.metadata().levels.len(), 1);
    assert_eq!(reader.metadata().bricks.len(), 1);
}

#[test]
fn rebuilding_with_identical_parameters_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let out_a = dir.path().join("a.bvf");
    let out_b = dir.path().join("b.bvf");

    let accessor = SynthAccessor::new([64, 64, 64], ScalarType::U8, SynthPattern::Fractal);
    builder::build(&accessor, &builder_config(), "determinism fixture", &out_a).unwrap();
    builder::build(&accessor, &builder_config(), "determinism fixture", &out_b).unwrap();

    let bytes_a = std::fs::read(&out_a).unwrap();
    let bytes_b = std::fs::read(&out_b).unwrap();
    assert_eq!(bytes_a, bytes_b);

    let unique_a = Reader::open(&out_a).unwrap().metadata().unique_id;
    let unique_b = Reader::open(&out_b).unwrap().metadata().unique_id;
    assert_eq!(unique_a, unique_b);
}

#[test]
fn decode_of_encode_round_trips_every_brick_payload() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("bricks.bvf");

    let accessor = SynthAccessor::new([64, 64, 64], ScalarType::U16, SynthPattern::Linear);
    builder::build(&accessor, &builder_config(), "brick round-trip fixture", &out).unwrap();

    let reader = Reader::open(&out).unwrap();
    for i in 0..reader.metadata().bricks.len() as u64 {
        let mut a = Vec::new();
        let mut b = Vec::new();
        reader.brick(i, &mut a).unwrap();
        reader.brick(i, &mut b).unwrap();
        assert_eq!(a, b, "brick {i} decode is not deterministic");
    }
}
