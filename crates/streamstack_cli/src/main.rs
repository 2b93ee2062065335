//! streamstack CLI
//!
//! Declares, validates and emits media streaming stacks. The template goes
//! to stdout or a file; logs go to stderr.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use std::path::{Path, PathBuf};
use streamstack_core::Digest;
use streamstack_plan::{
    Document, Emitter, MediaPipeline, PipelineConfig, StackDeclaration, StackGraph, ValidGraph,
    Validator,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "streamstack")]
#[command(about = "Media streaming stack builder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit the media pipeline template
    Synth {
        /// Pipeline config file; defaults when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output path; stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Fail unless the template has this BLAKE3 digest
        #[arg(long)]
        expect_digest: Option<String>,
    },
    /// Print the media pipeline's resource order
    Order {
        /// Pipeline config file; defaults when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a declaration file
    Validate {
        /// Declaration file
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Emit the template of a declaration file
    Declare {
        /// Declaration file
        #[arg(short, long)]
        file: PathBuf,
        /// Output path; stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Fail unless the template has this BLAKE3 digest
        #[arg(long)]
        expect_digest: Option<String>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("streamstack=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Synth {
            config,
            out,
            expect_digest,
        } => {
            let pipeline = MediaPipeline::new(load_config(config.as_deref())?);
            let valid = validate(pipeline.declare()?)?;
            let document = pipeline.emitter().emit(&valid);
            write_document(&document, out.as_deref(), expect_digest.as_deref())
        }
        Commands::Order { config } => {
            let pipeline = MediaPipeline::new(load_config(config.as_deref())?);
            let valid = validate(pipeline.declare()?)?;
            for id in valid.topological_order() {
                println!("{}", id);
            }
            Ok(())
        }
        Commands::Validate { file } => {
            let (graph, _) = load_declaration(&file)?;
            let valid = validate(graph)?;
            println!(
                "{}: {} resources, {} outputs, valid",
                file.display(),
                valid.graph().len(),
                valid.graph().outputs().count()
            );
            Ok(())
        }
        Commands::Declare {
            file,
            out,
            expect_digest,
        } => {
            let (graph, emitter) = load_declaration(&file)?;
            let valid = validate(graph)?;
            let document = emitter.emit(&valid);
            write_document(&document, out.as_deref(), expect_digest.as_deref())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_path(path)
            .wrap_err_with(|| format!("failed to load pipeline config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn load_declaration(path: &Path) -> Result<(StackGraph, Emitter)> {
    let declaration = StackDeclaration::from_path(path)
        .wrap_err_with(|| format!("failed to load declaration {}", path.display()))?;
    let emitter = declaration.emitter();
    let graph = declaration
        .into_graph()
        .wrap_err_with(|| format!("failed to declare stack from {}", path.display()))?;
    Ok((graph, emitter))
}

fn validate(graph: StackGraph) -> Result<ValidGraph> {
    Validator::new()
        .validate(graph)
        .wrap_err("stack graph is invalid")
}

fn check_digest(document: &Document, expected: &str) -> Result<()> {
    let expected = Digest::from_hex(expected).wrap_err("invalid expected digest")?;
    if !expected.verify(document.render().as_bytes()) {
        bail!(
            "template digest mismatch: expected {}, got {}",
            expected,
            document.digest()
        );
    }
    Ok(())
}

fn write_document(document: &Document, out: Option<&Path>, expect_digest: Option<&str>) -> Result<()> {
    if let Some(expected) = expect_digest {
        check_digest(document, expected)?;
    }
    match out {
        Some(path) => {
            std::fs::write(path, document.render())
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), digest = %document.digest(), "wrote template");
        }
        None => print!("{}", document),
    }
    Ok(())
}
