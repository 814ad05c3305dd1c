use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use url::Url;

use live2d_mascot::assets::HeadlessBackend;
use live2d_mascot::config::{load_config, save_config, save_config_to};
use live2d_mascot::utils::logging::{init_logging, log_system_info};
use live2d_mascot::{
    FileFetcher, FrameSnapshot, HeadlessRuntime, HttpFetcher, Mascot, MascotConfig, Model, Renderer,
    ResourceFetcher, TextureCache,
};

#[derive(Parser)]
#[command(name = "live2d-mascot")]
#[command(about = "Headless Live2D mascot driver")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (TOML or JSON); defaults to the platform config directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Override `resources_path`
    #[arg(long, global = true)]
    resources: Option<String>,

    /// Override `model_dir`
    #[arg(long, global = true)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the model and run the frame loop
    Run {
        /// Seconds to run before shutting down
        #[arg(long, default_value = "5")]
        seconds: u64,
    },

    /// Load the model and list its motions and expressions
    Info,

    /// Write the effective configuration as TOML
    InitConfig {
        /// Output file; defaults to the platform config directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Logs a parameter summary once a second
struct LogRenderer {
    frames: AtomicU64,
    fps: u64,
}

impl Renderer for LogRenderer {
    fn draw(&self, frame: &FrameSnapshot) {
        let count = self.frames.fetch_add(1, Ordering::Relaxed);
        if count % self.fps.max(1) != 0 {
            return;
        }
        let summary: Vec<String> = frame
            .parameters
            .iter()
            .filter(|(id, _)| id.starts_with("ParamAngle") || id.starts_with("ParamEye"))
            .map(|(id, value)| format!("{id}={value:.2}"))
            .collect();
        info!("🖼️ frame {}: {}", count, summary.join(" "));
    }
}

fn build_mascot(config: MascotConfig) -> anyhow::Result<Mascot> {
    let fetcher: Arc<dyn ResourceFetcher> =
        if config.resources_path.starts_with("http://") || config.resources_path.starts_with("https://") {
            let base = Url::parse(&config.resources_path)
                .with_context(|| format!("invalid resources URL {}", config.resources_path))?;
            Arc::new(HttpFetcher::new(base))
        } else {
            Arc::new(FileFetcher::new("."))
        };

    let textures = Arc::new(TextureCache::new(fetcher.clone(), Arc::new(HeadlessBackend::new())));
    let model = Model::new(Arc::new(config), fetcher, Arc::new(HeadlessRuntime::new()), textures);
    Ok(Mascot::new(model))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;
    log_system_info();

    let mut config = load_config(cli.config.as_deref());
    if let Some(resources) = cli.resources {
        config.resources_path = resources;
    }
    if let Some(model) = cli.model {
        config.model_dir = model;
    }

    match cli.command.unwrap_or(Commands::Run { seconds: 5 }) {
        Commands::InitConfig { output } => {
            let path = match output {
                Some(path) => {
                    save_config_to(&config, &path)?;
                    path
                }
                None => save_config(&config)?,
            };
            println!("Configuration written to {}", path.display());
        }
        Commands::Info => {
            let mascot = build_mascot(config)?;
            mascot.spawn_load();
            mascot.wait_until_loaded().await?;

            for (group, motions) in mascot.motions_info().unwrap_or_default() {
                println!("motion group {group}: {}", motions.join(", "));
            }
            println!(
                "expressions: {}",
                mascot.expressions_info().unwrap_or_default().join(", ")
            );
            mascot.release().await;
        }
        Commands::Run { seconds } => {
            let fps = config.target_fps as u64;
            let mascot = build_mascot(config)?;
            mascot.spawn_load();
            mascot.wait_until_loaded().await?;

            mascot.start(Arc::new(LogRenderer {
                frames: AtomicU64::new(0),
                fps,
            }));
            mascot.look_at(0.5, 0.3, Some(Duration::from_secs(2)));

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
            mascot.release().await;
        }
    }

    Ok(())
}
