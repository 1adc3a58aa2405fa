//! Hand gesture sonification: camera in, OSC sound control out.

use anyhow::{bail, Context, Result};
use clap::Parser;
use hand_sonify::config::{Config, EXAMPLE_CONFIG};
use hand_sonify::pipeline::Pipeline;
use hand_sonify::scenario::Scenario;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Camera index to use (selects the webcam input, needs a build with the
    /// `opencv` feature)
    #[arg(long)]
    cam: Option<i32>,

    /// Video input (test_pattern, webcam, video_file)
    #[arg(long)]
    input: Option<String>,

    /// Feature mapper (hand_gesture, pinch, pulse, binary_pulse, barycenter)
    #[arg(short, long)]
    mapper: Option<String>,

    /// Audio output (osc, log)
    #[arg(short, long)]
    output: Option<String>,

    /// OSC host of the sound engine
    #[arg(long)]
    osc_host: Option<String>,

    /// OSC port of the sound engine
    #[arg(long)]
    osc_port: Option<u16>,

    /// Stop after this many frames
    #[arg(long)]
    cycles: Option<u64>,

    /// Print an example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    /// Command line values take precedence over the configuration file
    fn apply(&self, config: &mut Config) -> Result<()> {
        if self.cam.is_some() && !cfg!(feature = "opencv") {
            bail!("--cam needs the webcam input, which this build lacks; rebuild with `--features opencv`");
        }
        if let Some(cam) = self.cam {
            config.capture.camera_index = cam;
            config.scenario.video_input = "webcam".to_string();
        }
        if let Some(input) = &self.input {
            config.scenario.video_input.clone_from(input);
        }
        if let Some(mapper) = &self.mapper {
            config.scenario.feature_mapper.clone_from(mapper);
            // Pulses are driven by motion, not by hands
            if matches!(mapper.as_str(), "pulse" | "binary_pulse") {
                config.scenario.feature_extractor = "frame_diff".to_string();
            }
        }
        if let Some(output) = &self.output {
            config.scenario.audio_output.clone_from(output);
        }
        if let Some(host) = &self.osc_host {
            config.output.host.clone_from(host);
        }
        if let Some(port) = self.osc_port {
            config.output.port = port;
        }
        if self.cycles.is_some() {
            config.pipeline.max_cycles = self.cycles;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Hand Sonify {} ({})", env!("CARGO_PKG_VERSION"), env!("BUILD_TARGET"));

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {path}");
            Config::from_file(path).with_context(|| format!("Failed to load config {path}"))?
        }
        None => Config::default(),
    };
    args.apply(&mut config)?;
    config.validate().context("Invalid configuration")?;

    let scenario = Scenario::from_config(&config).context("Failed to assemble scenario")?;
    let mut pipeline = Pipeline::new(scenario, config.pipeline.clone())?;

    let stop_flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&stop_flag);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl-C handler")?;

    pipeline.start().context("Failed to start pipeline")?;
    info!("Running, press Ctrl-C to stop");

    let result = pipeline.run(&stop_flag);
    pipeline.stop();

    let stats = result?;
    info!(
        "Processed {} frames, {} parameter updates, {} skipped",
        stats.cycles, stats.updates, stats.skipped
    );
    Ok(())
}
