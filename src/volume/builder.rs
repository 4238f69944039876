//! Volume builder (spec §4.5): tiles a raw accessor into bricks level by
//! level, box-averages each coarser level from the one below, classifies
//! bricks bottom-up, and writes a C4 container.
//!
//! Brick construction within a level is parallelized with `rayon`, the way
//! the teacher's world generator parallelizes chunk generation; writes to
//! the output file are serialized behind the single [`Writer`] handle.

use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use brickvol_core::accessor::RawVolumeAccessor;
use brickvol_core::codec::{codec_for_tag, Codec, CodecTag, NoneCodec};
use brickvol_core::error::Result;
use brickvol_core::extension::ExtensionStrategy;
use brickvol_core::format::Writer;
use brickvol_core::geometry::{build_level_table, children, LevelDesc};
use brickvol_core::meta::{BrickRow, DatasetMetadata, Emptiness};
use brickvol_core::voxel::ScalarType;

use crate::config::BuilderConfig;

/// Build a bricked volume file from `accessor` at `out_path`, per `config`.
pub fn build(
    accessor: &dyn RawVolumeAccessor,
    config: &BuilderConfig,
    description: &str,
    out_path: &Path,
) -> Result<()> {
    let [w, h, d] = accessor.dims();
    let voxel_type = accessor.voxel_type();
    let levels = build_level_table(w, h, d, config.brick_size, config.overlap);

    log::info!(
        "building {}x{}x{} volume into {} levels (bs={}, ov={})",
        w,
        h,
        d,
        levels.len(),
        config.brick_size,
        config.overlap
    );

    let mut level0 = vec![0u8; accessor.size() as usize];
    fill_full_volume(accessor, &mut level0)?;
    let background = dataset_background(&level0, voxel_type);

    let codec: Box<dyn Codec> = if config.use_compressor {
        codec_for_tag(CodecTag::Lz4)
    } else {
        Box::new(NoneCodec)
    };
    let codec_tag = if config.use_compressor { CodecTag::Lz4 } else { CodecTag::None };

    let header_hint = exact_header_len(&levels, voxel_type, config, codec_tag);
    let (mut writer, tmp_path) = Writer::create(out_path, header_hint)?;

    let mut all_bricks: Vec<BrickRow> = Vec::new();
    let mut level_emptiness: Vec<Vec<Emptiness>> = Vec::new();
    let mut current_volume = level0;
    let mut current_dims = [w, h, d];

    for (li, level) in levels.iter().enumerate() {
        let finer_emptiness = level_emptiness.last().cloned();
        let (payloads, emptiness) = build_level_bricks(
            &current_volume,
            current_dims,
            level,
            li,
            &levels,
            finer_emptiness.as_deref(),
            config,
            voxel_type,
            background,
            codec.as_ref(),
        );

        for (payload, kind) in payloads.into_iter().zip(emptiness.iter()) {
            let (offset, size) = if *kind == Emptiness::Normal {
                writer.append_brick(&payload)?
            } else {
                writer.append_brick(&[])?
            };
            let checksum = if *kind == Emptiness::Normal { fnv1a(&payload) } else { 0 };
            all_bricks.push(BrickRow {
                offset,
                size,
                emptiness: *kind,
                checksum,
            });
        }
        level_emptiness.push(emptiness);

        if !level.is_top() {
            let (next_volume, next_dims) = downsample(&current_volume, current_dims, voxel_type, config.extension_strategy);
            current_volume = next_volume;
            current_dims = next_dims;
        }
    }

    let metadata = DatasetMetadata {
        dims: [w, h, d],
        voxel_type,
        brick_size: config.brick_size,
        overlap: config.overlap,
        extension: config.extension_strategy,
        codec: codec_tag,
        background,
        levels,
        bricks: all_bricks,
        unique_id: [0; 16],
    };

    writer.finish(tmp_path, out_path, metadata)?;
    log::info!("wrote {} ({description})", out_path.display());
    Ok(())
}

fn fill_full_volume(accessor: &dyn RawVolumeAccessor, out: &mut [u8]) -> Result<()> {
    let [w, h, d] = accessor.dims();
    let region = accessor.read_region(0, w, 0, h, 0, d)?;
    out.copy_from_slice(&region);
    Ok(())
}

/// Exact size of the framed metadata header for this dataset's level/brick
/// counts, with a small safety margin. Every level/brick table row encodes
/// to a fixed width regardless of its actual offset/size/checksum values
/// (see `DatasetMetadata::encode`), so a placeholder metadata with the same
/// shape gives the real on-disk size -- this must be computed before
/// `Writer::create` reserves the header region, or large datasets (hundreds
/// of bricks) overrun a fixed guess and corrupt the first bricks' payloads.
fn exact_header_len(levels: &[LevelDesc], voxel_type: ScalarType, config: &BuilderConfig, codec_tag: CodecTag) -> u64 {
    let total_bricks = levels.last().map(|l| l.prev_bricks + l.brick_count()).unwrap_or(0);
    let placeholder = DatasetMetadata {
        dims: [0, 0, 0],
        voxel_type,
        brick_size: config.brick_size,
        overlap: config.overlap,
        extension: config.extension_strategy,
        codec: codec_tag,
        background: 0,
        levels: levels.to_vec(),
        bricks: vec![
            BrickRow {
                offset: 0,
                size: 0,
                emptiness: Emptiness::Normal,
                checksum: 0,
            };
            total_bricks as usize
        ],
        unique_id: [0; 16],
    };
    8 + placeholder.encode().len() as u64 + 64
}

/// Background value: the dataset-wide minimum (spec §4.5 default).
fn dataset_background(level0: &[u8], voxel_type: ScalarType) -> u64 {
    let b = voxel_type.byte_width() as usize;
    level0
        .chunks(b)
        .map(|chunk| voxel_type.read_le(chunk))
        .min()
        .unwrap_or(0)
}

#[allow(clippy::too_many_arguments)]
fn build_level_bricks(
    volume: &[u8],
    dims: [u32; 3],
    level: &LevelDesc,
    level_index: usize,
    all_levels: &[LevelDesc],
    finer_emptiness: Option<&[Emptiness]>,
    config: &BuilderConfig,
    voxel_type: ScalarType,
    background: u64,
    codec: &dyn Codec,
) -> (Vec<Vec<u8>>, Vec<Emptiness>) {
    let bs = config.brick_size;
    let ov = config.overlap;
    let inner = bs - 2 * ov;
    let b = voxel_type.byte_width() as usize;
    let built = AtomicUsize::new(0);
    let total = level.brick_count();

    let coords: Vec<(u32, u32, u32)> = (0..level.bricks[2])
        .flat_map(|bz| (0..level.bricks[1]).flat_map(move |by| (0..level.bricks[0]).map(move |bx| (bx, by, bz))))
        .collect();

    let results: Vec<(Vec<u8>, bool)> = coords
        .par_iter()
        .map(|&(bx, by, bz)| {
            let mut payload = vec![0u8; bs as usize * bs as usize * bs as usize * b];
            let mut scratch = vec![0u8; b];
            let mut all_background = true;

            for lz in 0..bs {
                for ly in 0..bs {
                    for lx in 0..bs {
                        let gx = bx as i64 * inner as i64 + lx as i64 - ov as i64;
                        let gy = by as i64 * inner as i64 + ly as i64 - ov as i64;
                        let gz = bz as i64 * inner as i64 + lz as i64 - ov as i64;
                        let v = sample(volume, dims, voxel_type, config.extension_strategy, gx, gy, gz);

                        let in_owned = lx >= ov && lx < bs - ov && ly >= ov && ly < bs - ov && lz >= ov && lz < bs - ov;
                        if in_owned && v != background {
                            all_background = false;
                        }

                        voxel_type.write_le(v, &mut scratch);
                        let idx = ((lz as usize * bs as usize + ly as usize) * bs as usize + lx as usize) * b;
                        payload[idx..idx + b].copy_from_slice(&scratch);
                    }
                }
            }

            let done = built.fetch_add(1, Ordering::Relaxed) + 1;
            if done as u64 % 512 == 0 || done as u64 == total {
                log::debug!("level {level_index}: built {done}/{total} bricks");
            }

            (payload, all_background)
        })
        .collect();

    let mut payloads = Vec::with_capacity(results.len());
    let mut emptiness = Vec::with_capacity(results.len());

    for (i, (payload, is_background)) in results.into_iter().enumerate() {
        let kind = if !is_background {
            Emptiness::Normal
        } else if level_index == 0 {
            Emptiness::Empty
        } else {
            let (bx, by, bz) = coords[i];
            let kids = children(all_levels, level_index, bx, by, bz);
            let all_kids_empty = finer_emptiness
                .map(|fe| {
                    kids.iter().all(|&(cx, cy, cz)| {
                        let child_level = &all_levels[level_index - 1];
                        let ci = cx as usize + cy as usize * child_level.bricks[0] as usize
                            + cz as usize * child_level.bricks[0] as usize * child_level.bricks[1] as usize;
                        matches!(fe.get(ci), Some(Emptiness::Empty) | Some(Emptiness::ChildEmpty))
                    })
                })
                .unwrap_or(true);
            if all_kids_empty {
                Emptiness::ChildEmpty
            } else {
                Emptiness::Empty
            }
        };

        let encoded = if kind == Emptiness::Normal { codec.encode(&payload) } else { Vec::new() };
        payloads.push(encoded);
        emptiness.push(kind);
    }

    (payloads, emptiness)
}

fn sample(volume: &[u8], dims: [u32; 3], voxel_type: ScalarType, ext: ExtensionStrategy, x: i64, y: i64, z: i64) -> u64 {
    let b = voxel_type.byte_width() as usize;
    let rx = ext.resolve_axis(x, dims[0]);
    let ry = ext.resolve_axis(y, dims[1]);
    let rz = ext.resolve_axis(z, dims[2]);
    match (rx, ry, rz) {
        (Some(x), Some(y), Some(z)) => {
            let idx = ((z as usize * dims[1] as usize + y as usize) * dims[0] as usize + x as usize) * b;
            voxel_type.read_le(&volume[idx..idx + b])
        }
        _ => 0,
    }
}

/// Box-average 2x2x2 downsample, padding odd edges with [`ExtensionStrategy`].
fn downsample(volume: &[u8], dims: [u32; 3], voxel_type: ScalarType, ext: ExtensionStrategy) -> (Vec<u8>, [u32; 3]) {
    let out_dims = [
        dims[0].div_ceil(2).max(1),
        dims[1].div_ceil(2).max(1),
        dims[2].div_ceil(2).max(1),
    ];
    let b = voxel_type.byte_width() as usize;
    let mut out = vec![0u8; out_dims[0] as usize * out_dims[1] as usize * out_dims[2] as usize * b];
    let mut scratch = vec![0u8; b];

    for oz in 0..out_dims[2] {
        for oy in 0..out_dims[1] {
            for ox in 0..out_dims[0] {
                let mut sum: u64 = 0;
                for dz in 0..2i64 {
                    for dy in 0..2i64 {
                        for dx in 0..2i64 {
                            let v = sample(
                                volume,
                                dims,
                                voxel_type,
                                ext,
                                ox as i64 * 2 + dx,
                                oy as i64 * 2 + dy,
                                oz as i64 * 2 + dz,
                            );
                            sum += v;
                        }
                    }
                }
                let avg = sum / 8;
                voxel_type.write_le(avg, &mut scratch);
                let idx = ((oz as usize * out_dims[1] as usize + oy as usize) * out_dims[0] as usize + ox as usize) * b;
                out[idx..idx + b].copy_from_slice(&scratch);
            }
        }
    }

    (out, out_dims)
}

fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}
