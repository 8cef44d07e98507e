//! voxstack command-line interface.
//!
//! Inspects raw volumes and evaluates JSON layer scenes.
#![allow(clippy::cast_precision_loss)]

mod scene;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{ArgAction, Parser, Subcommand};
use ndarray::Array5;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use thiserror::Error;
use voxstack_core::{DataSource, ElementType, Shape5};
use voxstack_io::{MappedArraySource, RawVolumeWriter};
use voxstack_layer::{BoundsSampler, Layer, LayerStack};

use scene::SceneConfig;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    VoxstackIo(#[from] voxstack_io::Error),

    #[error("Core error: {0}")]
    Core(#[from] voxstack_core::Error),

    #[error("Scene error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Scene references unknown source '{0}'")]
    UnknownSource(String),
}

/// Inspect raw volumes and layer scenes.
#[derive(Parser)]
#[command(name = "voxstack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the layout and value bounds of a raw volume
    Inspect {
        /// Input raw file
        input: PathBuf,

        /// Element type (u8, i16, f32, ...)
        #[arg(short, long)]
        dtype: ElementType,

        /// Shape as t,x,y,z,c
        #[arg(short, long)]
        shape: Shape5,

        /// Byte offset of the first element
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Write a ramp volume (element i holds value i, saturated)
    Ramp {
        /// Output raw file
        output: PathBuf,

        /// Element type (u8, i16, f32, ...)
        #[arg(short, long)]
        dtype: ElementType,

        /// Shape as t,x,y,z,c
        #[arg(short, long)]
        shape: Shape5,
    },

    /// Build the layer stack described by a JSON scene and report its state
    Scene {
        /// Scene file
        input: PathBuf,

        /// Sample bounds on worker threads
        #[arg(long)]
        background: bool,

        /// Seed for random color tables
        #[arg(long)]
        seed: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Inspect {
            input,
            dtype,
            shape,
            offset,
        } => inspect(&input, dtype, shape, offset),
        Commands::Ramp {
            output,
            dtype,
            shape,
        } => {
            let data = Array5::from_shape_fn(shape.0, |(t, x, y, z, c)| {
                shape.offset([t, x, y, z, c]) as f64
            });
            let mut writer = RawVolumeWriter::create(&output)?;
            writer.write_array(&data, dtype)?;
            writer.flush()?;
            println!("Wrote {} {} elements to {}", shape.len(), dtype, output.display());
            Ok(())
        }
        Commands::Scene {
            input,
            background,
            seed,
            json,
        } => run_scene(&input, background, seed, json),
    }
}

fn inspect(input: &Path, dtype: ElementType, shape: Shape5, offset: usize) -> Result<()> {
    let source = MappedArraySource::open_with_offset(input, dtype, shape, offset)?;
    let bytes = shape.len() * dtype.size();

    println!("File: {}", input.display());
    println!("Element type: {dtype}");
    println!("Shape: {shape}");
    println!(
        "Payload: {} bytes ({:.2} MB) at offset {}",
        bytes,
        bytes as f64 / 1_000_000.0,
        offset
    );
    println!("Default range: {}", dtype.default_range());

    let start = Instant::now();
    let bounds = source.sample_bounds()?;
    println!(
        "Bounds: {} (sampled in {:.2}ms)",
        bounds,
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}

fn run_scene(input: &Path, background: bool, seed: Option<u64>, as_json: bool) -> Result<()> {
    let scene = SceneConfig::load(input)?;
    let base = input.parent().unwrap_or_else(|| Path::new("."));
    let sources = scene.open_sources(base)?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut stack = scene.build(&sources, &mut rng)?;

    let start = Instant::now();
    if background {
        let mut sampler = BoundsSampler::new();
        let submitted = stack.request_bounds(&mut sampler);
        log::debug!("submitted {submitted} bounds samples");
        stack.apply_bounds(sampler.wait_all())?;
    } else {
        stack.refresh_bounds()?;
    }
    log::info!(
        "bounds ready after {:.2}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report_json(&stack))?);
    } else {
        print_report(&stack);
    }
    Ok(())
}

fn slot_summaries(layer: &dyn Layer) -> Vec<(usize, String, Option<[f64; 2]>, [f64; 2])> {
    let Some(normalizable) = layer.as_normalizable() else {
        return Vec::new();
    };
    let n = normalizable.normalization();
    (0..n.slot_count())
        .filter_map(|slot| {
            let mode = n.mode(slot).ok()?;
            let active = n.normalize(slot).ok()?;
            let range = n.range(slot).ok()?;
            Some((slot, format!("{mode:?}"), active.map(Into::into), range.into()))
        })
        .collect()
}

fn print_report(stack: &LayerStack) {
    println!(
        "{:<3} {:<20} {:<22} {:<7} {:<7}",
        "#", "Id", "Kind", "Visible", "Opacity"
    );
    println!("{:-<63}", "");
    for (i, layer) in stack.iter().enumerate() {
        let marker = if stack.selected() == Some(i) { "*" } else { " " };
        let props = layer.props();
        println!(
            "{:<3} {:<20} {:<22} {:<7} {:<7.2}",
            format!("{i}{marker}"),
            props.layer_id(),
            layer.kind(),
            props.visible(),
            props.opacity()
        );
        for (slot, mode, active, range) in slot_summaries(layer) {
            let active =
                active.map_or_else(|| "off".to_string(), |[lo, hi]| format!("[{lo}, {hi}]"));
            println!(
                "      slot {slot}: {mode:<6} normalize {active} range [{}, {}]",
                range[0], range[1]
            );
        }
        if let Some(ct) = layer.as_color_tabled() {
            let table = ct.color_table();
            println!(
                "      color table: {} entries{}",
                table.colors().len(),
                if table.colortable_is_random {
                    " (random)"
                } else {
                    ""
                }
            );
        }
    }
}

fn report_json(stack: &LayerStack) -> serde_json::Value {
    let layers: Vec<_> = stack
        .iter()
        .map(|layer| {
            let props = layer.props();
            let slots: Vec<_> = slot_summaries(layer)
                .into_iter()
                .map(|(slot, mode, active, range)| {
                    json!({ "slot": slot, "mode": mode, "normalize": active, "range": range })
                })
                .collect();
            json!({
                "id": props.layer_id(),
                "name": props.name(),
                "kind": layer.kind(),
                "visible": props.visible(),
                "opacity": props.opacity(),
                "slots": slots,
                "colors": layer.as_color_tabled().map(|ct| ct.color_table().colors().len()),
            })
        })
        .collect();
    json!({ "selected": stack.selected(), "layers": layers })
}
