//! Flowlab command line.
//!
//! Usage:
//!   flowlab list                     - Stored projects
//!   flowlab new <name>               - Create a project
//!   flowlab show                     - Tracks, takes and transport settings
//!   flowlab tempo 96                 - Edit a setting of the selected project
//!   flowlab click --seconds 8        - Audition count-in and metronome
//!   flowlab rehearse 1 --seconds 4   - Record then play back on track 1 (no audio device)

mod config;
mod output;
mod store;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use flowlab_core::{
    CaptureDevice, ClickEmitter, MemoryCapture, MemoryPlayback, PlaybackDevice, Project,
    Transport, takes,
};
use flowlab_transport::{CountIn, Metronome, format_elapsed, format_millis};

use config::Config;
use output::{LogReleaser, PrintClicks};
use store::{Store, take_id, track_id};

#[derive(Parser)]
#[command(name = "flowlab", about = "Multi-track take recorder")]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project to act on, as numbered by `list` (default: most recent)
    #[arg(short, long, global = true)]
    project: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored projects
    List,
    /// Create a project
    New { name: String },
    /// Show the selected project
    Show,
    /// Append an empty track
    AddTrack,
    /// Rename a track
    Rename { track: usize, name: String },
    /// Toggle mute (clears solo)
    Mute { track: usize },
    /// Toggle solo (clears mute)
    Solo { track: usize },
    /// Set track gain, 0.0 to 1.0
    Gain { track: usize, gain: f32 },
    /// Delete a track and its takes
    DeleteTrack { track: usize },
    /// Delete a take (1 is the newest)
    DeleteTake { track: usize, take: usize },
    /// Set tempo, 40 to 240 bpm
    Tempo { bpm: u32 },
    /// Set count-in length, 0 to 2 bars
    CountIn { bars: u32 },
    /// Turn the metronome on or off
    Metronome { state: Toggle },
    /// Play the count-in followed by the metronome
    Click {
        /// Metronome run time after the count-in
        #[arg(short, long, default_value_t = 4)]
        seconds: u64,
    },
    /// Record a take then play the project back, without audio hardware
    Rehearse {
        track: usize,
        /// Length of the recording and of the playback
        #[arg(short, long, default_value_t = 3)]
        seconds: u64,
        /// Save the result (takes reference placeholder clips)
        #[arg(long)]
        keep: bool,
    },
    /// Print the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let store = Store::from_config(&config)?;
    log::debug!("project store: {}", store.path().display());

    match cli.command {
        Commands::List => list(&store),
        Commands::New { name } => {
            if name.trim().is_empty() {
                bail!("Project name cannot be blank");
            }
            let project = store.create(&name, &config)?;
            println!("Created '{}'", project.name);
            Ok(())
        }
        Commands::Show => {
            show(&store.open(cli.project)?);
            Ok(())
        }
        Commands::Click { seconds } => audition(&store.open(cli.project)?, &config, seconds).await,
        Commands::Rehearse {
            track,
            seconds,
            keep,
        } => rehearse(&store, &config, cli.project, track, seconds, keep).await,
        Commands::Config { write } => {
            if write {
                match &cli.config {
                    Some(path) => config.save_to(path),
                    None => config.save(),
                }
            }
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        edit => {
            let mut project = store.open(cli.project)?;
            apply_edit(&mut project, edit)?;
            store.save(&project)?;
            show(&project);
            Ok(())
        }
    }
}

fn apply_edit(project: &mut Project, command: Commands) -> Result<()> {
    match command {
        Commands::AddTrack => {
            project.add_track();
        }
        Commands::Rename { track, name } => {
            let id = track_id(project, track)?;
            if !project.rename_track(id, &name) {
                bail!("Track name cannot be blank");
            }
        }
        Commands::Mute { track } => {
            let id = track_id(project, track)?;
            project.toggle_mute(id);
        }
        Commands::Solo { track } => {
            let id = track_id(project, track)?;
            project.toggle_solo(id);
        }
        Commands::Gain { track, gain } => {
            let id = track_id(project, track)?;
            project.set_gain(id, gain);
        }
        Commands::DeleteTrack { track } => {
            let id = track_id(project, track)?;
            takes::delete_track(project, &LogReleaser, id)?;
        }
        Commands::DeleteTake { track, take } => {
            let track = track_id(project, track)?;
            let take = take_id(project, track, take)?;
            takes::delete_take(project, &LogReleaser, track, take)?;
        }
        Commands::Tempo { bpm } => {
            project.set_bpm(bpm);
        }
        Commands::CountIn { bars } => {
            project.set_count_in_bars(bars);
        }
        Commands::Metronome { state } => {
            project.metronome_on = matches!(state, Toggle::On);
        }
        _ => bail!("Not an edit command"),
    }
    Ok(())
}

fn list(store: &Store) -> Result<()> {
    let projects = store.list();
    if projects.is_empty() {
        println!("No projects in {}", store.path().display());
    }
    for (i, project) in projects.iter().enumerate() {
        println!(
            "{:>3}. {}  ({} track(s), {} take(s), created {})",
            i + 1,
            project.name,
            project.tracks.len(),
            project.take_count(),
            project.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn show(project: &Project) {
    println!("{}", project.name);
    println!(
        "  {} bpm, count-in {} bar(s), metronome {}",
        project.bpm,
        project.count_in_bars,
        if project.metronome_on { "on" } else { "off" }
    );
    for (i, track) in project.tracks.iter().enumerate() {
        let mut flags = String::new();
        if track.muted {
            flags.push_str(" [M]");
        }
        if track.solo {
            flags.push_str(" [S]");
        }
        println!("{:>3}. {}  gain {:.2}{flags}", i + 1, track.name, track.gain);
        for (j, take) in track.takes.iter().enumerate() {
            println!(
                "       {}. {}  {}  {}",
                j + 1,
                take.name,
                format_millis(take.duration_ms),
                take.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }
}

async fn audition(project: &Project, config: &Config, seconds: u64) -> Result<()> {
    let clicks: Arc<dyn ClickEmitter> = Arc::new(PrintClicks::new());

    let count_in = CountIn::new(project.count_in_bars, project.bpm);
    println!("Count-in: {} bar(s) at {} bpm", count_in.bars(), count_in.bpm());
    count_in.run(clicks.as_ref(), config.click).await;

    let mut metronome = Metronome::new(clicks).with_voice(config.click);
    metronome.start(project.bpm);
    tokio::time::sleep(Duration::from_secs(seconds)).await;
    metronome.stop();
    Ok(())
}

async fn rehearse(
    store: &Store,
    config: &Config,
    project: Option<usize>,
    track: usize,
    seconds: u64,
    keep: bool,
) -> Result<()> {
    let project = store.open(project)?;
    let track = track_id(&project, track)?;
    let metronome_on = project.metronome_on;

    let mut transport = Transport::new(
        project,
        MemoryCapture::new(),
        MemoryPlayback::new(),
        Arc::new(PrintClicks::new()),
        Arc::new(LogReleaser),
    )
    .with_click_voice(config.click);
    transport.set_metronome(metronome_on).await?;

    transport.request_record(track).await?;
    println!("{}", transport.status());
    transport.await_count_in().await;
    report(&transport, seconds).await;
    transport.request_stop().await?;

    let started = transport.request_play().await?;
    println!("Playing {started} take(s)");
    report(&transport, seconds).await;
    transport.request_stop().await?;

    show(transport.project());
    if keep {
        store.save(transport.project())?;
    }
    Ok(())
}

/// Print the status line once a second for `seconds`.
async fn report<C: CaptureDevice, P: PlaybackDevice>(transport: &Transport<C, P>, seconds: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    for _ in 0..=seconds {
        ticker.tick().await;
        println!(
            "{}  {}",
            transport.status(),
            format_elapsed(transport.elapsed())
        );
    }
}
