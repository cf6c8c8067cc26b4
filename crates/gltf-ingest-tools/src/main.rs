//! gltf-ingest - inspect and re-encode glTF/GLB assets
//!
//! `inspect` loads a file and prints what decoded; `reencode` writes the
//! decoded primitives back out as `.glb` or embedded `.gltf`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gltf_ingest_core::SessionConfig;
use gltf_ingest_io::{GltfLoader, GltfWriter, LoadReport};

#[derive(Parser)]
#[command(name = "gltf-ingest")]
#[command(about = "Inspect and re-encode glTF/GLB assets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker threads for decode jobs (default: one per core)
    #[arg(short = 'j', long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a file and print its meshes, primitives and images
    Inspect {
        /// Input .gltf or .glb file
        input: PathBuf,
    },

    /// Load a file and write the decoded geometry back out
    Reencode {
        /// Input .gltf or .glb file
        input: PathBuf,

        /// Output file; `.glb` writes binary, `.gltf` writes embedded JSON
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    let loader = GltfLoader::new().with_config(SessionConfig {
        worker_threads: cli.threads,
        ..SessionConfig::default()
    });

    let result = match &cli.command {
        Commands::Inspect { input } => inspect(&loader, input),
        Commands::Reencode { input, output } => reencode(&loader, input, output),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the load succeeded.
fn inspect(loader: &GltfLoader, input: &Path) -> Result<bool> {
    let report = loader
        .load_path(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    println!("{}: {:?}", input.display(), report.phase);
    if let Some(output) = &report.output {
        for (mesh_index, mesh) in output.document.meshes.iter().enumerate() {
            println!(
                "mesh {} {}",
                mesh_index,
                mesh.name.as_deref().unwrap_or("(unnamed)")
            );
            let range = output.mesh_index.range(mesh_index).unwrap_or(0..0);
            for (primitive_index, slot) in range.enumerate() {
                match output.primitives.get(slot).and_then(Option::as_ref) {
                    Some(prim) => println!(
                        "  primitive {}: {} vertices, {} indices, {}, [{}]{}",
                        primitive_index,
                        prim.data.vertex_count(),
                        prim.data.indices.len(),
                        prim.topology.name(),
                        prim.data.attribute_names().join(", "),
                        if prim.compressed { ", draco" } else { "" }
                    ),
                    None => println!("  primitive {}: failed", primitive_index),
                }
            }
        }
        for (image_index, handle) in output.images.iter().enumerate() {
            let texture = handle.and_then(|h| report.textures.get(h));
            match texture {
                Some(tex) => println!(
                    "image {} {}: {} bytes",
                    image_index,
                    tex.name,
                    tex.encoded.as_ref().map_or(0, Vec::len)
                ),
                None => println!("image {}: skipped", image_index),
            }
        }
    }
    print_problems(&report);
    Ok(report.is_success())
}

fn reencode(loader: &GltfLoader, input: &Path, output_path: &Path) -> Result<bool> {
    let report = loader
        .load_path(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    print_problems(&report);

    let Some(output) = &report.output else {
        bail!("{} produced no geometry", input.display());
    };

    let mut writer = GltfWriter::new();
    let meshes = writer.add_output(output)?;
    writer.add_textures(&report.textures);

    let embedded = output_path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("gltf"));
    if embedded {
        writer.write_gltf_embedded(output_path)?;
    } else {
        writer.write_glb(output_path)?;
    }
    tracing::info!(
        "Wrote {} mesh(es) and {} image(s) to {}",
        meshes,
        writer.num_images(),
        output_path.display()
    );
    Ok(report.is_success())
}

fn print_problems(report: &LoadReport) {
    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }
    for error in &report.errors {
        eprintln!("error: {}", error);
    }
}
