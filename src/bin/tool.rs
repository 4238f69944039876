//! `tool` -- build bricked volumes from foreign formats and serve them.
//!
//! Usage mirrors the teacher's `generate_world` binary: parse args, log
//! progress to stderr, exit non-zero on any unrecoverable error.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use brickvol::config::{BuilderConfig, ServerConfig};
use brickvol::ingest::synth::{SynthAccessor, SynthPattern};
use brickvol::ingest::{dicom, nrrd, qvis};
use brickvol::volume::builder;
use brickvol_core::voxel::ScalarType;
use brickvol_net::server::Server;

#[derive(Parser)]
#[command(name = "tool", about = "Bricked volume builder and brick server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build from a Qvis-style `.dat` sidecar + raw payload.
    BuildQvis {
        input: PathBuf,
        output: PathBuf,
        description: String,
        brick_size: u32,
        overlap: u32,
    },
    /// Build from an NRRD header (attached or detached data).
    BuildNrrd {
        input: PathBuf,
        output: PathBuf,
        description: String,
        brick_size: u32,
        overlap: u32,
    },
    /// Build from a directory of numbered DICOM-style slice files.
    BuildDicom {
        dir: PathBuf,
        output: PathBuf,
        description: String,
        brick_size: u32,
        overlap: u32,
        #[arg(long, default_value_t = 1)]
        components: u32,
        #[arg(long, value_enum, default_value = "u8")]
        voxel_type: VoxelTypeArg,
        #[arg(long)]
        slice_width: u32,
        #[arg(long)]
        slice_height: u32,
    },
    /// Build a synthetic test volume: linear ramp or fractal noise.
    BuildSynth {
        #[arg(value_enum)]
        pattern: SynthPatternArg,
        byte_depth: u32,
        components: u32,
        sx: u32,
        sy: u32,
        sz: u32,
        output: PathBuf,
        description: String,
        brick_size: u32,
        overlap: u32,
    },
    /// Serve a directory of `.data` files over the remote brick protocol.
    Serve {
        dir: PathBuf,
        port: u16,
        #[arg(long)]
        max_bricks: Option<usize>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum VoxelTypeArg {
    U8,
    U16,
    U32,
}

impl From<VoxelTypeArg> for ScalarType {
    fn from(v: VoxelTypeArg) -> Self {
        match v {
            VoxelTypeArg::U8 => ScalarType::U8,
            VoxelTypeArg::U16 => ScalarType::U16,
            VoxelTypeArg::U32 => ScalarType::U32,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum SynthPatternArg {
    L,
    F,
}

fn main() -> ExitCode {
    brickvol::logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::BuildQvis {
            input,
            output,
            description,
            brick_size,
            overlap,
        } => run_build_qvis(&input, &output, &description, brick_size, overlap),
        Command::BuildNrrd {
            input,
            output,
            description,
            brick_size,
            overlap,
        } => run_build_nrrd(&input, &output, &description, brick_size, overlap),
        Command::BuildDicom {
            dir,
            output,
            description,
            brick_size,
            overlap,
            components,
            voxel_type,
            slice_width,
            slice_height,
        } => run_build_dicom(
            &dir,
            &output,
            &description,
            brick_size,
            overlap,
            components,
            voxel_type.into(),
            slice_width,
            slice_height,
        ),
        Command::BuildSynth {
            pattern,
            byte_depth,
            components,
            sx,
            sy,
            sz,
            output,
            description,
            brick_size,
            overlap,
        } => run_build_synth(pattern, byte_depth, components, sx, sy, sz, &output, &description, brick_size, overlap),
        Command::Serve { dir, port, max_bricks } => run_serve(&dir, port, max_bricks),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn config_for(brick_size: u32, overlap: u32) -> BuilderConfig {
    BuilderConfig {
        brick_size,
        overlap,
        ..BuilderConfig::default()
    }
}

fn run_build_qvis(input: &std::path::Path, output: &std::path::Path, desc: &str, bs: u32, ov: u32) -> brickvol_core::Result<()> {
    let accessor = qvis::open(input)?;
    builder::build(&accessor, &config_for(bs, ov), desc, output)
}

fn run_build_nrrd(input: &std::path::Path, output: &std::path::Path, desc: &str, bs: u32, ov: u32) -> brickvol_core::Result<()> {
    let accessor = nrrd::open(input)?;
    builder::build(&accessor, &config_for(bs, ov), desc, output)
}

#[allow(clippy::too_many_arguments)]
fn run_build_dicom(
    dir: &std::path::Path,
    output: &std::path::Path,
    desc: &str,
    bs: u32,
    ov: u32,
    components: u32,
    voxel_type: ScalarType,
    slice_width: u32,
    slice_height: u32,
) -> brickvol_core::Result<()> {
    let accessor = dicom::DicomSeriesAccessor::open(dir, [slice_width, slice_height], voxel_type)?;
    let _ = components;
    builder::build(&accessor, &config_for(bs, ov), desc, output)
}

#[allow(clippy::too_many_arguments)]
fn run_build_synth(
    pattern: SynthPatternArg,
    byte_depth: u32,
    components: u32,
    sx: u32,
    sy: u32,
    sz: u32,
    output: &std::path::Path,
    desc: &str,
    bs: u32,
    ov: u32,
) -> brickvol_core::Result<()> {
    let voxel_type = match byte_depth {
        1 => ScalarType::U8,
        2 => ScalarType::U16,
        4 => ScalarType::U32,
        other => {
            return Err(brickvol_core::Error::Protocol(format!(
                "unsupported byte depth {other}, expected 1, 2, or 4"
            )))
        }
    };
    let _ = components;
    let pattern = match pattern {
        SynthPatternArg::L => SynthPattern::Linear,
        SynthPatternArg::F => SynthPattern::Fractal,
    };
    let accessor = SynthAccessor::new([sx, sy, sz], voxel_type, pattern);
    builder::build(&accessor, &config_for(bs, ov), desc, output)
}

fn run_serve(dir: &std::path::Path, port: u16, max_bricks: Option<usize>) -> brickvol_core::Result<()> {
    let mut cfg = ServerConfig {
        port,
        ..ServerConfig::default()
    };
    if let Some(n) = max_bricks {
        cfg.max_bricks_per_get_request = n;
    }
    let cfg = cfg.validated()?;

    let server = Arc::new(Server::from_directory(dir, cfg.max_bricks_per_get_request)?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(brickvol_core::Error::Io)?;
    runtime.block_on(async move { server.serve(("0.0.0.0", cfg.port)).await })
}
