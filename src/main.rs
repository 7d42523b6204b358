use width_trainer::app::TrainerApp;
use width_trainer::quiz;
use width_trainer::results::ResultsFile;
use width_trainer::types::QuestionSpec;

use anyhow::Result;
use clap::Parser;
use eframe::egui;
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "width-trainer")]
#[command(about = "Stereo-width listening trainer with a real-time stereo-field visualizer")]
struct Cli {
    /// Directory containing soundN_A / soundN_B clip pairs
    #[arg(long, default_value = "./clips")]
    clip_dir: PathBuf,

    /// Number of questions (ignored when --manifest is given)
    #[arg(long, default_value_t = 6)]
    questions: usize,

    /// Results CSV path
    #[arg(long, default_value = "quiz_results.csv")]
    results: PathBuf,

    /// Quiz manifest (quiz.json) overriding the built-in question list
    #[arg(long)]
    manifest: Option<PathBuf>,
}

/// Resolve the question list from the CLI: the manifest wins when given,
/// otherwise the built-in list. An empty quiz is a configuration error on
/// either path; the session has no screen for it.
fn question_specs(cli: &Cli) -> Result<Vec<QuestionSpec>> {
    let specs = match &cli.manifest {
        Some(path) => quiz::load_manifest(path)?,
        None => QuestionSpec::builtin(cli.questions),
    };
    anyhow::ensure!(!specs.is_empty(), "--questions must be at least 1");
    Ok(specs)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let specs = question_specs(&cli)?;

    info!("═══════════════════════════════════════════════");
    info!("  WIDTH TRAINER v{}", env!("CARGO_PKG_VERSION"));
    info!("  Clips: {:?}", cli.clip_dir);
    info!("  Questions: {}", specs.len());
    info!("  Results: {:?}", cli.results);
    info!("═══════════════════════════════════════════════");

    let app = TrainerApp::new(cli.clip_dir, specs, ResultsFile::new(cli.results));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 720.0]),
        vsync: true,
        ..Default::default()
    };
    if let Err(e) = eframe::run_native(
        "Which Sound Is Wider?",
        options,
        Box::new(|_| Box::new(app)),
    ) {
        return Err(anyhow::anyhow!(e.to_string()));
    }
    Ok(())
}
