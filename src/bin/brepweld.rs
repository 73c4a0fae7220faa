//! brepweld command line.

use anyhow::{Context, Result};
use brepweld::config::{ImportParameters, StitchingTechnique, TessellatorKind};
use brepweld::source::BodyRecord;
use brepweld::tessellate::{tessellator, MeshRecord};
use brepweld::topo::validate_model;
use brepweld::Session;
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "brepweld")]
#[command(about = "Sew and tessellate trimmed NURBS scenes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Parameter file (JSON); BREPWELD_* variables override it
    #[arg(short, long, global = true, value_name = "FILE")]
    params: Option<PathBuf>,

    /// Verbose output (same as RUST_LOG=debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a JSON scene (a list of body records) to OBJ
    Convert {
        /// Input scene file
        input: PathBuf,

        /// Output OBJ file
        #[arg(short, long)]
        output: PathBuf,

        /// Also save the sewn model as an archive
        #[arg(short, long, value_name = "FILE")]
        archive: Option<PathBuf>,

        /// Stitching technique (none, heal, sew)
        #[arg(long)]
        technique: Option<StitchingTechnique>,

        /// Tessellator back-end (kernel, grid)
        #[arg(long)]
        tessellator: Option<TessellatorKind>,

        /// Chord tolerance in host units
        #[arg(long)]
        chord: Option<f64>,
    },

    /// Tessellate a previously saved archive to OBJ
    Tessellate {
        /// Input archive
        archive: PathBuf,

        /// Output OBJ file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check the topology invariants of an archive
    Validate {
        /// Input archive
        archive: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut params = ImportParameters::load(cli.params.as_deref())
        .context("loading import parameters")?;

    match cli.command {
        Commands::Convert {
            input,
            output,
            archive,
            technique,
            tessellator,
            chord,
        } => {
            if let Some(technique) = technique {
                params.stitching_technique = technique;
            }
            if let Some(kind) = tessellator {
                params.tessellator = kind;
            }
            if let Some(chord) = chord {
                params.chord_tolerance = chord;
            }
            convert_command(&input, &output, archive.as_deref(), &params)
        }
        Commands::Tessellate { archive, output } => tessellate_command(&archive, &output, &params),
        Commands::Validate { archive } => validate_command(&archive),
    }
}

fn convert_command(
    input: &Path,
    output: &Path,
    archive: Option<&Path>,
    params: &ImportParameters,
) -> Result<()> {
    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let bodies: Vec<BodyRecord> = serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("parsing scene {}", input.display()))?;

    let conversion = brepweld::pipeline::import(&bodies, params)?;
    if let Some(path) = archive {
        conversion
            .session
            .save_archive(path)
            .with_context(|| format!("writing archive {}", path.display()))?;
        info!(path = %path.display(), "archive saved");
    }
    write_mesh(&conversion.record(), output)
}

fn tessellate_command(archive: &Path, output: &Path, params: &ImportParameters) -> Result<()> {
    let session = Session::load_archive(archive)
        .with_context(|| format!("reading archive {}", archive.display()))?;
    let backend = tessellator(params.tessellator, session.tolerance().geometric);
    let mesh = backend.tessellate(session.model(), &params.kernel_criteria());
    let mut record = mesh.to_record();
    let mirror = record.mirrored(&session.symmetric_patches());
    record.append(mirror);
    write_mesh(&record, output)
}

fn validate_command(archive: &Path) -> Result<()> {
    let session = Session::load_archive(archive)
        .with_context(|| format!("reading archive {}", archive.display()))?;
    let result = validate_model(session.model(), session.tolerance().stitching);
    if result.valid {
        println!("{}: valid", archive.display());
        return Ok(());
    }
    for error in &result.errors {
        println!("{error}");
    }
    anyhow::bail!("{} topology errors", result.errors.len())
}

fn write_mesh(mesh: &MeshRecord, output: &Path) -> Result<()> {
    let mut writer = BufWriter::new(
        File::create(output).with_context(|| format!("creating {}", output.display()))?,
    );
    brepweld::export::write_obj(mesh, &mut writer)?;
    info!(
        path = %output.display(),
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "mesh written"
    );
    Ok(())
}
