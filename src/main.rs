//! citizen-report - report issues and announce events from the terminal
//!
//! Searches addresses, resolves a location (address, map point or device
//! position), then walks a report or event through the staged submission.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use citizen_report::config::{get_config_path, Config};
use citizen_report::geocode::{GeocodeClient, Geocoder};
use citizen_report::location::{AddressResolver, LocationSelectionState, SearchOutcome};
use citizen_report::submission::{SubmissionPhase, SubmissionPipeline};
use citizen_report::wizard::{PhotoRef, SubmissionKind, SubmissionWizard};
use citizen_report::Coordinate;

/// citizen-report - Report local issues and events
#[derive(Parser)]
#[command(name = "citizen-report")]
#[command(version)]
#[command(about = "Report local issues and announce events to your city")]
struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search addresses, best postal code match first
    Search {
        /// Free-text address
        query: String,
    },

    /// Find the address at a point
    Reverse {
        #[arg(allow_hyphen_values = true)]
        latitude: f64,
        #[arg(allow_hyphen_values = true)]
        longitude: f64,
    },

    /// Submit a report
    Report {
        #[command(flatten)]
        form: FormArgs,

        #[command(flatten)]
        location: LocationArgs,
    },

    /// Announce an event
    Event {
        #[command(flatten)]
        form: FormArgs,

        /// Start, as RFC 3339 or "YYYY-MM-DD HH:MM" local time
        #[arg(long, value_parser = parse_event_date)]
        date: DateTime<Utc>,

        #[command(flatten)]
        location: LocationArgs,
    },

    /// Show or create the configuration file
    Config {
        /// Write the default configuration if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args)]
struct FormArgs {
    #[arg(short, long)]
    title: String,

    #[arg(short, long)]
    description: String,

    #[arg(short, long)]
    category: String,

    /// Photo to attach (repeatable)
    #[arg(short, long = "photo")]
    photos: Vec<PathBuf>,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct LocationArgs {
    /// Address to search; the best match is used
    #[arg(long)]
    address: Option<String>,

    /// Point picked on a map, as `lat,lng`
    #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
    at: Option<Coordinate>,

    /// Current device position, as `lat,lng`
    #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
    here: Option<Coordinate>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{} {:#}", "Erreur :".bright_red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "citizen_report=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns whether the command succeeded from the user's point of view.
fn run(command: Commands) -> Result<bool> {
    if let Commands::Config { init } = command {
        return show_config(init).map(|_| true);
    }

    let config = Config::load_with_env()?;
    let rt = tokio::runtime::Runtime::new()?;

    match command {
        Commands::Search { query } => rt.block_on(search(&config, &query)),
        Commands::Reverse {
            latitude,
            longitude,
        } => {
            let coordinate = Coordinate::new(latitude, longitude)
                .with_context(|| format!("Coordonnées invalides : {latitude}, {longitude}"))?;
            rt.block_on(reverse(&config, coordinate))
        }
        Commands::Report { form, location } => {
            rt.block_on(submit(&config, SubmissionKind::Report, form, None, location))
        }
        Commands::Event {
            form,
            date,
            location,
        } => rt.block_on(submit(
            &config,
            SubmissionKind::Event,
            form,
            Some(date),
            location,
        )),
        Commands::Config { .. } => Ok(true),
    }
}

fn show_config(init: bool) -> Result<()> {
    let config = if init {
        Config::init()?
    } else {
        Config::load()?
    };
    println!("{} {}", "Fichier :".bright_cyan(), get_config_path()?);
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to render config")?
    );
    Ok(())
}

fn resolver_for(config: &Config) -> AddressResolver {
    let geocoder: Arc<dyn Geocoder> = Arc::new(GeocodeClient::new(&config.geocoding));
    AddressResolver::new(geocoder, &config.geocoding)
}

async fn search(config: &Config, query: &str) -> Result<bool> {
    let resolver = resolver_for(config);
    match resolver.search(query).await {
        SearchOutcome::Suggestions(found) => {
            for (index, suggestion) in found.iter().enumerate() {
                println!(
                    "{} {}  {}",
                    format!("{}.", index + 1).bright_cyan(),
                    suggestion.formatted,
                    suggestion.coordinate.to_string().dimmed()
                );
            }
            Ok(true)
        }
        SearchOutcome::Failed(err) => {
            println!("{}", err.to_string().bright_red());
            Ok(false)
        }
        SearchOutcome::Skipped | SearchOutcome::Superseded => {
            println!("{}", "Rien à chercher.".bright_yellow());
            Ok(false)
        }
    }
}

async fn reverse(config: &Config, coordinate: Coordinate) -> Result<bool> {
    match resolver_for(config).reverse(coordinate).await {
        Ok(found) => {
            println!("{}", found.formatted);
            Ok(true)
        }
        Err(err) => {
            println!("{}", err.to_string().bright_red());
            Ok(false)
        }
    }
}

async fn submit(
    config: &Config,
    kind: SubmissionKind,
    form: FormArgs,
    date: Option<DateTime<Utc>>,
    location: LocationArgs,
) -> Result<bool> {
    let mut wizard = SubmissionWizard::new(kind, LocationSelectionState::new(resolver_for(config)));

    wizard.set_category(Some(form.category))?;
    wizard.next();
    wizard.set_title(form.title)?;
    wizard.set_description(form.description)?;
    wizard.set_event_date(date)?;
    for path in form.photos {
        wizard.add_photo(PhotoRef::new(path))?;
    }
    wizard.next();

    choose_location(&mut wizard, location).await?;

    let selection = wizard.location().selection();
    println!(
        "{} {}",
        "Lieu :".bright_cyan(),
        selection.display_text.bright_white()
    );
    if let Some(date) = date {
        println!(
            "{} {}",
            "Date :".bright_cyan(),
            config.locale.format_long(&date)
        );
    }

    let pipeline = SubmissionPipeline::from_config(config);
    let mut progress = pipeline.progress();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let current = *progress.borrow_and_update();
            if current.phase == SubmissionPhase::Idle {
                continue;
            }
            println!(
                "  {:<14} {:>3}%",
                current.phase.label(),
                (current.value * 100.0).round() as u32
            );
            if current.phase.is_terminal() {
                break;
            }
        }
    });

    let result = wizard.submit(&pipeline).await;
    // Closes the progress channel so the printer ends even if no attempt ran.
    drop(pipeline);
    let _ = printer.await;

    match result {
        Ok(receipt) => {
            let what = match kind {
                SubmissionKind::Report => "Signalement envoyé",
                SubmissionKind::Event => "Événement publié",
            };
            println!("\n{}", format!("✓ {what}").bright_green().bold());
            if let Some(id) = receipt.server_id {
                println!("  {} {}", "Référence :".bright_cyan(), id);
            }
            Ok(true)
        }
        Err(err) => {
            println!("\n{} {}", "✗".bright_red(), err.to_string().bright_red());
            Ok(false)
        }
    }
}

async fn choose_location(wizard: &mut SubmissionWizard, location: LocationArgs) -> Result<()> {
    let state = wizard.location_mut()?;

    if let Some(query) = location.address {
        let outcome = state.resolver().search(&query).await;
        let best = match outcome {
            SearchOutcome::Suggestions(found) => found.into_iter().next(),
            SearchOutcome::Failed(err) => return Err(err.into()),
            SearchOutcome::Skipped | SearchOutcome::Superseded => None,
        };
        let Some(best) = best else {
            bail!("Aucune adresse trouvée pour « {query} »");
        };
        state.select_suggestion(&best);
    } else if let Some(point) = location.at {
        state
            .select_from_map_tap(point)
            .await
            .context("Impossible de trouver l'adresse de ce point")?;
    } else if let Some(here) = location.here {
        state.select_current_location(here);
    }

    Ok(())
}

fn parse_coordinate(value: &str) -> Result<Coordinate, String> {
    let (lat, lng) = value
        .split_once(',')
        .ok_or_else(|| "attendu `lat,lng`".to_string())?;
    let lat: f64 = lat.trim().parse().map_err(|_| format!("latitude invalide : {lat}"))?;
    let lng: f64 = lng.trim().parse().map_err(|_| format!("longitude invalide : {lng}"))?;
    Coordinate::new(lat, lng).ok_or_else(|| format!("coordonnées hors limites : {value}"))
}

fn parse_event_date(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value.trim()) {
        return Ok(date.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%d %H:%M")
        .map_err(|_| format!("date invalide : {value}"))?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|date| date.with_timezone(&Utc))
        .ok_or_else(|| format!("date ambiguë : {value}"))
}
