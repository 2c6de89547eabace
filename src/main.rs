use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use slivi::config::{load_settings, project_paths, save_settings_atomic, Settings};
use slivi::model::{GeoPoint, Rules, Weather};
use slivi::ports::{PushTransport, WeatherProvider};
use slivi::push::{ExpoPush, LogPush};
use slivi::sim::PetAction;
use slivi::storage::JsonStore;
use slivi::weather::{OpenMeteo, StaticWeather};
use slivi::{PetService, Ports, UserId};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "slivi")]
#[command(about = "Virtual pet state engine")]
struct Cli {
    /// Directory holding slivi.json and settings.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Current pet state (decay applied)
    State {
        #[arg(long)]
        user: UserId,
    },
    /// FEED, PLAY, REST, SLEEP or WAKE
    Action {
        #[arg(long)]
        user: UserId,
        action: String,
        /// Required for FEED
        #[arg(long)]
        food: Option<u32>,
    },
    /// Report a mini-game round
    Game {
        #[arg(long)]
        user: UserId,
        #[arg(long, default_value = "FLAPPY")]
        game: String,
        #[arg(long)]
        score: i64,
        /// Round length in seconds
        #[arg(long)]
        duration: i64,
    },
    /// Evaluate notification triggers for one user
    Notify {
        #[arg(long)]
        user: UserId,
    },
    /// Evaluate notification triggers for every active user
    Sweep,
    /// Recent notifications, newest first
    Inbox {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Food catalog
    Foods,
    /// Store the user's position and show the weather there
    Locate {
        #[arg(long)]
        user: UserId,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
    },
    /// Register a push token
    Device {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        token: String,
    },
    /// Show effective settings
    Config {
        /// Persist them to settings.json
        #[arg(long, default_value_t = false)]
        write: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = project_paths(cli.data_dir.clone())?;
    let settings = load_settings(&paths.settings_path).with_env();

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Command::Config { write } = cli.command {
        if write {
            save_settings_atomic(&paths.settings_path, &settings)?;
        }
        return print_json(&settings);
    }

    let store = JsonStore::open(&paths.store_path)?;
    let timeout = Duration::from_secs(settings.http_timeout_secs.max(1));
    let push = push_transport(&settings, timeout)?;
    let weather = weather_provider(&settings, timeout)?;

    let service = PetService::new(
        Ports {
            states: &store,
            foods: &store,
            ledger: &store,
            users: &store,
            push: push.as_ref(),
            weather: weather.as_ref(),
        },
        Rules::default(),
    )
    .with_feed_limit(settings.feed_limit);

    let now = Utc::now();
    match cli.command {
        Command::State { user } => print_json(&service.get_full_state(user, now)?),
        Command::Action { user, action, food } => {
            let action = PetAction::parse(&action, food)?;
            print_json(&service.perform_action(user, &action, now)?)
        }
        Command::Game {
            user,
            game,
            score,
            duration,
        } => print_json(&service.record_game_result(user, &game, score, duration, now)?),
        Command::Notify { user } => {
            let fired = service.evaluate_notifications(user, now)?;
            print_json(&serde_json::json!({ "fired": fired }))
        }
        Command::Sweep => print_json(&service.sweep(now)?),
        Command::Inbox { user, limit } => print_json(&service.list_notifications(user, limit)?),
        Command::Foods => print_json(&service.foods()?),
        Command::Locate { user, lat, lon } => {
            let weather = service.record_location(user, GeoPoint { lat, lon })?;
            print_json(&serde_json::json!({ "weather": weather, "locationSaved": true }))
        }
        Command::Device { user, token } => {
            service.register_device(user, &token)?;
            print_json(&serde_json::json!({ "registered": true }))
        }
        Command::Config { .. } => Ok(()),
    }
}

fn push_transport(settings: &Settings, timeout: Duration) -> Result<Box<dyn PushTransport>> {
    if !settings.push_enabled {
        return Ok(Box::new(LogPush));
    }
    Ok(Box::new(ExpoPush::new(&settings.push_endpoint, timeout)?))
}

fn weather_provider(settings: &Settings, timeout: Duration) -> Result<Box<dyn WeatherProvider>> {
    if !settings.weather_enabled {
        return Ok(Box::new(StaticWeather(Weather::fallback())));
    }
    Ok(Box::new(OpenMeteo::new(&settings.weather_endpoint, timeout)?))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("could not encode output")?;
    println!("{out}");
    Ok(())
}
