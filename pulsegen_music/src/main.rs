// Pulsegen Music Generator: CLI entry point.
//
// Generates one song and writes it as a Standard MIDI File, optionally with
// the track metadata JSON next to it.
//
// Usage:
//   cargo run -p pulsegen_music --bin generate -- [output.mid] [--seed N]
//     [--duration SECS] [--style ID] [--complexity X]
//     [--stress X --harmony X --creativity X] [--styles catalog.json]
//     [--metadata out.json] [--no-humanize] [--list-styles]
//
// Set RUST_LOG=debug for per-section detail.

use clap::Parser;
use pulsegen_music::pipeline::{GenerationParams, Vitals, generate};
use pulsegen_music::style::{DEFAULT_STYLE_ID, StyleCatalog};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[clap(name = "generate")]
#[clap(about = "Generate a deterministic multi-track song as a MIDI file")]
struct Args {
    /// Output MIDI path
    #[clap(default_value = "output.mid")]
    output: PathBuf,

    #[clap(long, default_value = "0")]
    seed: u32,

    /// Target duration in seconds
    #[clap(long, default_value = "60")]
    duration: f64,

    /// Style preset id
    #[clap(long, default_value = DEFAULT_STYLE_ID)]
    style: String,

    /// Complexity in [0, 1]
    #[clap(long, default_value = "0.5")]
    complexity: f64,

    #[clap(long)]
    stress: Option<f64>,

    #[clap(long)]
    harmony: Option<f64>,

    #[clap(long)]
    creativity: Option<f64>,

    /// JSON array of extra style presets, layered over the built-ins
    #[clap(long, value_name = "FILE")]
    styles: Option<PathBuf>,

    /// Write track metadata and section reports as JSON
    #[clap(long, value_name = "FILE")]
    metadata: Option<PathBuf>,

    /// Disable start-time humanization in the MIDI output
    #[clap(long)]
    no_humanize: bool,

    /// Print the available style ids and exit
    #[clap(long)]
    list_styles: bool,
}

impl Args {
    fn vitals(&self) -> Option<Vitals> {
        if self.stress.is_none() && self.harmony.is_none() && self.creativity.is_none() {
            return None;
        }
        let defaults = Vitals::default();
        Some(Vitals {
            stress: self.stress.unwrap_or(defaults.stress),
            harmony: self.harmony.unwrap_or(defaults.harmony),
            creativity: self.creativity.unwrap_or(defaults.creativity),
        })
    }
}

fn run(args: Args) -> pulsegen_music::Result<()> {
    let catalog = match &args.styles {
        Some(path) => StyleCatalog::load(path)?,
        None => StyleCatalog::builtin(),
    };
    if args.list_styles {
        for id in catalog.ids() {
            println!("{id}");
        }
        return Ok(());
    }

    let params = GenerationParams {
        seed: args.seed,
        target_duration_seconds: args.duration,
        style_preset_id: args.style.clone(),
        complexity: args.complexity,
        vitals: args.vitals(),
        humanize: !args.no_humanize,
    };
    let output = generate(&params, &catalog)?;

    println!("=== Pulsegen ===");
    println!("Seed: {}", output.seed);
    println!("Key: {}  Tempo: {} BPM", output.key_name, output.tempo_bpm);
    println!("Duration: {:.2}s", output.duration_seconds);
    println!();
    print!("{}", output.structure.summary());
    println!();
    print!("{}", output.tracks.summary());

    std::fs::write(&args.output, &output.midi)?;
    println!("\nWrote {} ({} bytes)", args.output.display(), output.midi.len());

    if let Some(path) = &args.metadata {
        std::fs::write(path, serde_json::to_string_pretty(&output)?)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
