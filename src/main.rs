use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mrp_osc::{
    HandlerConfig, MrpHandler, NotePattern, Pattern, QualityPattern, ReduceControls,
    ThreadTimeline,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run() {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => HandlerConfig::load(&path)?,
        None => HandlerConfig::default(),
    };

    let timeline = Arc::new(ThreadTimeline::spawn());
    let handler = MrpHandler::connect(&config, timeline.clone())?;
    tracing::info!(?handler, ip = %config.ip, port = config.port, "playing demo pattern");

    let notes = NotePattern::new(Pattern::sequence([60, 64, 67, 72]), 1);
    let swell = QualityPattern::new(
        "intensity",
        Pattern::sequence([60, 64, 67, 72]),
        Pattern::sequence([0.2, 0.5, 0.8, 1.0]),
    );
    let tick = Duration::from_secs_f64(0.5 * config.time_unit);

    for i in 0..16 {
        let controls = ReduceControls::at(i);
        handler.send_note_pattern(&notes, controls)?;
        handler.send_quality_pattern(&swell, controls)?;
        std::thread::sleep(tick);
    }

    let released = handler.all_notes_off()?;
    tracing::info!(released, "done");
    timeline.shutdown();
    Ok(())
}
