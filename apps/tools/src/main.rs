use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{kinematics::FrameClock, Organizer, PlanetPatch};
use serde::Serialize;
use shared::{
    domain::{AppState, SystemId},
    error::Notice,
};
use storage::Storage;
use tokio::sync::broadcast::Receiver;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, normalize_database_url};

#[derive(Parser, Debug)]
#[command(name = "orbitmarks", about = "Inspect and edit a stored orbitmarks document")]
struct Cli {
    #[arg(long, global = true)]
    database_url: Option<String>,
    #[arg(long, global = true)]
    viewport_width: Option<f64>,
    #[arg(long, global = true)]
    viewport_height: Option<f64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List systems and their planets.
    Show {
        #[arg(long)]
        json: bool,
    },
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Import {
        path: PathBuf,
    },
    /// Auto-arrange the active system.
    Arrange,
    AddPlanet {
        name: String,
        #[arg(long)]
        url: Option<String>,
    },
    NewSystem,
    Select {
        system_id: String,
    },
    Repair,
    /// Run orbital motion for a while and save where the planets end up.
    Simulate {
        #[arg(long, default_value_t = 1.0)]
        seconds: f64,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanetSummary<'a> {
    id: &'a str,
    name: &'a str,
    url: Option<&'a str>,
    x: f64,
    y: f64,
    radius: f64,
    rotating: bool,
    spin_degrees: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SystemSummary<'a> {
    id: &'a str,
    name: &'a str,
    active: bool,
    background: String,
    planets: Vec<PlanetSummary<'a>>,
}

/// `elapsed` is how long the renderer has been spinning planets, in seconds.
fn summarize(state: &AppState, elapsed: f64) -> Vec<SystemSummary<'_>> {
    state
        .systems
        .iter()
        .map(|system| SystemSummary {
            id: system.id.as_str(),
            name: &system.name,
            active: state.current.as_ref() == Some(&system.id),
            background: system.background(),
            planets: system
                .planets
                .iter()
                .map(|planet| PlanetSummary {
                    id: planet.id.as_str(),
                    name: &planet.name,
                    url: planet.url.as_deref(),
                    x: planet.x,
                    y: planet.y,
                    radius: planet.orbit.radius,
                    rotating: planet.orbit.rotating,
                    spin_degrees: planet.spin_degrees(elapsed),
                })
                .collect(),
        })
        .collect()
}

fn print_state(state: &AppState, elapsed: f64) {
    for system in summarize(state, elapsed) {
        let marker = if system.active { "*" } else { " " };
        println!(
            "{marker} {} ({}) planets={}",
            system.name,
            system.id,
            system.planets.len()
        );
        for planet in system.planets {
            println!(
                "    {} x={:.1} y={:.1} r={:.1} rotating={} spin={:.0} {}",
                planet.name,
                planet.x,
                planet.y,
                planet.radius,
                planet.rotating,
                planet.spin_degrees % 360.0,
                planet.url.unwrap_or("-")
            );
        }
    }
}

fn drain_notices(rx: &mut Receiver<Notice>) {
    while let Ok(notice) = rx.try_recv() {
        eprintln!("{:?}: {}", notice.level, notice.message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings();
    if let Some(database_url) = &cli.database_url {
        settings.database_url = normalize_database_url(database_url);
    }
    if let Some(width) = cli.viewport_width {
        settings.viewport_width = width;
    }
    if let Some(height) = cli.viewport_height {
        settings.viewport_height = height;
    }

    let storage = Storage::new(&settings.database_url)
        .await
        .with_context(|| format!("failed to open {}", settings.database_url))?;
    let mut organizer = Organizer::open(storage, settings.viewport()).await;
    let mut notices = organizer.subscribe_notices();

    match cli.command {
        Command::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&summarize(organizer.state(), 0.0))?);
            } else {
                print_state(organizer.state(), 0.0);
            }
        }
        Command::Export { out } => {
            let blob = organizer.export_blob()?;
            match out {
                Some(path) => {
                    fs::write(&path, blob)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!("tools: exported to {}", path.display());
                }
                None => println!("{blob}"),
            }
        }
        Command::Import { path } => {
            let raw = fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let result = organizer.import_blob(&raw).await;
            drain_notices(&mut notices);
            result.with_context(|| format!("failed to import {}", path.display()))?;
            print_state(organizer.state(), 0.0);
        }
        Command::Arrange => {
            organizer.auto_arrange().await?;
            print_state(organizer.state(), 0.0);
        }
        Command::AddPlanet { name, url } => {
            let id = organizer.create_planet().await?;
            organizer
                .edit_planet(
                    &id,
                    PlanetPatch {
                        name: Some(name),
                        url,
                        ..Default::default()
                    },
                )
                .await?;
            println!("created planet_id={id}");
        }
        Command::NewSystem => {
            let id = organizer.new_system().await;
            println!("created system_id={id}");
        }
        Command::Select { system_id } => {
            let result = organizer.select_system(&SystemId::from(system_id)).await;
            drain_notices(&mut notices);
            result?;
            print_state(organizer.state(), 0.0);
        }
        Command::Repair => {
            let repaired = organizer.repair().await;
            println!("repaired={repaired}");
        }
        Command::Simulate { seconds } => {
            let step = 1.0 / settings.frame_rate;
            let frames = (seconds.max(0.0) / step).ceil() as usize;
            let mut clock = FrameClock::new();
            clock.frame(0.0);
            for frame in 1..=frames {
                let elapsed = clock.frame(frame as f64 * step);
                organizer.on_frame(elapsed);
            }
            organizer.save().await?;
            info!("tools: simulated frames={frames} seconds={seconds}");
            print_state(organizer.state(), seconds);
        }
    }

    drain_notices(&mut notices);
    Ok(())
}
