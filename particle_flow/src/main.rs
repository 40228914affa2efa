//! particle_flow — interactive entry point.

use std::time::Duration;

use clap::Parser;
use hand_signals::{ClassifierConfig, HexColor, ParticlePattern};
use particle_flow::app::{run, AppConfig, SourceKind};
use particle_flow::tracker::TrackerConfig;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "particle_flow", about = "Hand-gesture controlled particle field")]
struct Cli {
    /// Landmark source
    #[arg(long, value_enum, default_value_t = SourceKind::Sim)]
    source: SourceKind,

    /// Detector process for `--source helper`, given after `--`,
    /// e.g. `-- python3 "my landmarker.py" --camera 0`
    #[arg(last = true, value_name = "HELPER_CMD")]
    helper_cmd: Vec<String>,

    /// Ignore helper detections scored below this
    #[arg(long, default_value_t = 0.5)]
    min_score: f32,

    /// Consecutive frames before V-sign / finger-heart switch
    #[arg(long, default_value_t = hand_signals::DEFAULT_THRESHOLD)]
    threshold: u32,

    /// Tip/palm ratio read as a closed fist
    #[arg(long, default_value_t = 0.9)]
    min_ratio: f32,

    /// Tip/palm ratio read as a fully open hand
    #[arg(long, default_value_t = 2.0)]
    max_ratio: f32,

    /// How far a fingertip must out-reach its middle joint to count as extended
    #[arg(long, default_value_t = 0.015)]
    extension_margin: f32,

    /// Thumb-to-index pinch distance for a finger heart, as a fraction of palm size
    #[arg(long, default_value_t = 0.35)]
    heart_ratio: f32,

    /// Number of particles
    #[arg(long, default_value_t = particle_flow::particles::PARTICLE_COUNT)]
    particles: usize,

    /// Initial particle colour (#rrggbb or #rgb)
    #[arg(long, default_value = "#00ffff")]
    color: HexColor,

    /// Initial pattern: sphere, cube, torus or galaxy
    #[arg(long, default_value = "sphere")]
    pattern: ParticlePattern,

    /// Gesture tick period in milliseconds
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,

    /// Start fullscreen
    #[arg(long)]
    fullscreen: bool,

    /// Fixed seed for the particle layout
    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    fn into_config(self) -> AppConfig {
        AppConfig {
            source:         self.source,
            helper_cmd:     self.helper_cmd,
            min_score:      self.min_score,
            tracker: TrackerConfig {
                classifier: ClassifierConfig {
                    min_ratio:         self.min_ratio,
                    max_ratio:         self.max_ratio,
                    extension_margin:  self.extension_margin,
                    heart_pinch_ratio: self.heart_ratio,
                    ..ClassifierConfig::default()
                },
                threshold:      self.threshold,
                frame_interval: Duration::from_millis(self.frame_ms.max(1)),
            },
            particle_count: self.particles,
            color:          self.color,
            pattern:        self.pattern,
            fullscreen:     self.fullscreen,
            seed:           self.seed,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "particle_flow=info,hand_signals=info".into()),
        )
        .init();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║        ParticleFlow — Gesture-Controlled 3D Particles        ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    match cli.source {
        SourceKind::Sim    => println!("  Mode: keyboard simulation  (O/K/V/H/N, Up/Down)"),
        SourceKind::Helper => println!("  Mode: external landmark helper"),
        SourceKind::Leap   => println!("  Mode: LeapMotion hardware"),
    }
    println!("  Keys: 1-4 pattern, C colour, F fullscreen, Q quit   Mouse: drag orbit, scroll zoom");
    println!();

    let cfg = cli.into_config();
    info!(source = ?cfg.source, threshold = cfg.tracker.threshold, "starting");
    run(cfg)?;
    Ok(())
}
