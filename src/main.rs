use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use filesift::app::events::UserEvent;
use filesift::app::helpers::lock_state;
use filesift::app::state::AppState;
use filesift::app::view_model::generate_ui_state;
use filesift::app::{commands, tasks};
use filesift::config::{settings, AppConfig, ViewMode};
use filesift::core::export::ExportLayout;
use filesift::core::stats::CollectedStats;
use filesift::core::tree_generator::TreeGenerator;

#[derive(Parser, Debug)]
#[command(name = "filesift")]
#[command(about = "Browse, filter, rename and export file hierarchies")]
#[command(version)]
struct Args {
    /// Files or directories to load
    #[arg(default_value = ".")]
    roots: Vec<PathBuf>,

    /// Glob filter, e.g. "*.rs" or "!*.log"
    #[arg(short, long)]
    filter: Option<String>,

    /// Action to run over the matching files: md, txt or detect
    #[arg(short, long, value_name = "MODE")]
    action: Option<String>,

    /// Keep dotfiles and dot directories
    #[arg(long)]
    include_dots: bool,

    /// Print file, folder and extension counts
    #[arg(long)]
    stats: bool,

    /// Print a flat list of matching files instead of a tree
    #[arg(long)]
    list: bool,

    /// Narrow the list to one extension, e.g. "rs" or "no-ext"
    #[arg(long, value_name = "EXT", requires = "list")]
    ext: Option<String>,

    /// Write a zip archive of the visible files. Defaults to the configured
    /// output directory; a directory gets the archive's default name.
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    export: Option<Option<PathBuf>>,

    /// Export files without their folders
    #[arg(long, requires = "export")]
    flat: bool,

    /// Use this configuration file instead of the platform default
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Replace the stored configuration with the one in this file
    #[arg(long, value_name = "PATH")]
    import_config: Option<PathBuf>,

    /// Write the effective configuration to this file
    #[arg(long, value_name = "PATH")]
    export_config: Option<PathBuf>,

    /// Print the final state as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut app_state = AppState::new(load_config(&args)?);
    if has_overrides(&args) {
        tracing::debug!("Command-line overrides given; configuration changes are not saved");
    } else {
        app_state.config_path = config_path(&args);
    }
    let state = Arc::new(Mutex::new(app_state));
    let (proxy, mut events) = mpsc::unbounded_channel();

    if let Some(path) = &args.import_config {
        commands::import_config(path, proxy.clone(), state.clone()).await;
    }
    apply_overrides(&args, &proxy, &state).await;
    if let Some(path) = &args.export_config {
        commands::export_config(path, proxy.clone(), state.clone());
    }

    let export_target = match &args.export {
        Some(path) => Some(resolve_export_target(path.as_deref(), &lock_state(&state).config)?),
        None => None,
    };
    let mut failed = drain(&mut events, export_target.as_deref())?;
    if failed {
        bail!("invalid arguments");
    }

    commands::load_roots(args.roots.clone(), proxy.clone(), state.clone()).await;
    failed |= drain(&mut events, export_target.as_deref())?;
    if failed {
        bail!("nothing to show");
    }

    if args.action.is_some() {
        commands::apply_action(proxy.clone(), state.clone());
        commands::wait_for_task(&state).await;
    }
    if args.stats {
        commands::calculate_stats(proxy.clone(), state.clone());
        commands::wait_for_task(&state).await;
    }
    if export_target.is_some() {
        commands::export_archive(proxy.clone(), state.clone());
        commands::wait_for_task(&state).await;
    }
    failed |= drain(&mut events, export_target.as_deref())?;

    print_view(&state, args.json).await?;
    if failed {
        bail!("one or more steps failed");
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<AppConfig> {
    match &args.config {
        Some(path) => AppConfig::load_from(path),
        None => Ok(AppConfig::load().unwrap_or_else(|e| {
            tracing::warn!("Using default configuration: {}", e);
            AppConfig::default()
        })),
    }
}

/// Where configuration changes are saved.
fn config_path(args: &Args) -> Option<PathBuf> {
    args.config.clone().or_else(settings::get_config_file_path)
}

/// Flags that change the configuration for this run only.
fn has_overrides(args: &Args) -> bool {
    args.include_dots || args.list || args.flat || args.action.is_some()
}

async fn apply_overrides(
    args: &Args,
    proxy: &mpsc::UnboundedSender<UserEvent>,
    state: &Arc<Mutex<AppState>>,
) {
    if args.include_dots {
        commands::set_exclude_dots(false, proxy.clone(), state.clone()).await;
    }
    if args.list && lock_state(state).view_mode != ViewMode::List {
        commands::toggle_view_mode(proxy.clone(), state.clone()).await;
    }
    if args.flat {
        lock_state(state).config.export_layout = ExportLayout::Flat;
    }
    if let Some(mode) = &args.action {
        commands::set_action_mode(mode, proxy.clone(), state.clone());
    }
    if let Some(query) = &args.filter {
        commands::update_filter(query, proxy.clone(), state.clone());
    }
    if let Some(extension) = &args.ext {
        commands::set_list_extension(Some(extension), proxy.clone(), state.clone());
    }
}

/// The file or directory the archive is written to.
fn resolve_export_target(path: Option<&Path>, config: &AppConfig) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path.to_path_buf()),
        None => config
            .output_directory
            .clone()
            .context("No --export path given and no output directory configured"),
    }
}

/// Handles every queued event. Returns `true` if any of them reported an error.
fn drain(
    events: &mut mpsc::UnboundedReceiver<UserEvent>,
    export_target: Option<&Path>,
) -> Result<bool> {
    let mut failed = false;
    while let Ok(event) = events.try_recv() {
        match event {
            UserEvent::StateUpdate(_) | UserEvent::ActionProgress { .. } => {}
            UserEvent::Status(status) => tracing::info!("{}", status),
            UserEvent::ActionFinished(summary) => eprintln!(
                "{} file(s) visited: {} applied, {} skipped, {} failed",
                summary.visited_files, summary.applied, summary.skipped, summary.failed
            ),
            UserEvent::StatsReady(stats) => print_stats(&stats),
            UserEvent::ArchiveReady { file_name, bytes } => {
                let Some(target) = export_target else {
                    continue;
                };
                let path = if target.is_dir() {
                    target.join(&file_name)
                } else {
                    target.to_path_buf()
                };
                std::fs::write(&path, &bytes)
                    .with_context(|| format!("Failed to write archive to {}", path.display()))?;
                eprintln!("Wrote {} ({} bytes)", path.display(), bytes.len());
            }
            UserEvent::ShowError(message) => {
                eprintln!("error: {}", message);
                failed = true;
            }
        }
    }
    Ok(failed)
}

fn print_stats(stats: &CollectedStats) {
    println!("Files:   {}", stats.file_count);
    println!("Folders: {}", stats.dir_count);
    for (extension, count) in stats.sorted_extensions() {
        println!("  {:<12} {}", extension, count);
    }
}

/// Loads the whole view and prints it in the configured mode.
async fn print_view(state: &Arc<Mutex<AppState>>, json: bool) -> Result<()> {
    let generation = lock_state(state).view_generation;
    tasks::materialize_view(state, generation, None).await?;

    let mut guard = lock_state(state);
    guard.view.expand_all();
    if json {
        println!("{}", serde_json::to_string_pretty(&generate_ui_state(&guard))?);
        return Ok(());
    }

    match guard.view_mode {
        ViewMode::Tree => print!("{}", TreeGenerator::generate_tree(&guard.view.render_nodes())),
        ViewMode::List => {
            for id in guard.view.list_files(guard.list_extension.as_deref()) {
                let node = guard.view.node(id);
                let size = node.entry.size().map(|n| n.to_string()).unwrap_or_default();
                let modified = node
                    .entry
                    .modified()
                    .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                let mut line = format!("{:>10}  {:<16}  {}", size, modified, node.entry.full_path());
                if node.is_renamed() {
                    line.push_str(&format!(" -> {}", node.display_name));
                }
                let badges = node.badges();
                if !badges.is_empty() {
                    line.push_str(&format!(" [{}]", badges.join(", ")));
                }
                println!("{}", line);
            }
        }
    }
    Ok(())
}
