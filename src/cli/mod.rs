//! # CLI Module
//!
//! Command-line interface over the wallpaper cache.
//!
//! ## Usage
//! ```bash
//! # Copy local images into the cache
//! wallpaper-cache import ~/Pictures/Wallpapers
//!
//! # Step back through history and apply the result
//! wallpaper-cache previous --script ~/bin/set-wallpaper.sh
//!
//! # Curate
//! wallpaper-cache favorite toggle 3f9a0c1d2b4e5f60
//! wallpaper-cache rate 3f9a0c1d2b4e5f60 5
//! wallpaper-cache tag add 3f9a0c1d2b4e5f60 space dark
//!
//! # Housekeeping
//! wallpaper-cache cleanup --mode old --older-than 2w --dry-run
//! wallpaper-cache stats --output json
//! ```

use chrono::{DateTime, Duration, Local, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;
use wallpaper_cache::core::cache::default_download_dir;
use wallpaper_cache::core::executor::{Executor, ScriptExecutor};
use wallpaper_cache::core::hasher::{hash_file, wallpaper_id};
use wallpaper_cache::core::history::HistoryEntry;
use wallpaper_cache::core::{CacheStatistics, WallpaperRecord};
use wallpaper_cache::error::{AppError, CacheError, Result};
use wallpaper_cache::events::{CacheEvent, EventChannel, EventReceiver};
use wallpaper_cache::{CacheConfig, SearchFacets, WallpaperCache};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "gif"];

/// Wallpaper Cache - browse, curate and clean your downloaded wallpapers
#[derive(Parser, Debug)]
#[command(name = "wallpaper-cache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Cache database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Maximum number of cached wallpapers
    #[arg(long, global = true)]
    max_entries: Option<usize>,

    /// Maximum total cache size in MiB
    #[arg(long, global = true)]
    max_size_mb: Option<u64>,

    /// Script that applies a wallpaper; receives the image path
    #[arg(long, global = true)]
    script: Option<PathBuf>,

    /// Where downloaded wallpapers live
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy local image files into the download directory and cache them
    Import {
        /// Files or directories; defaults to the download directory
        paths: Vec<PathBuf>,
    },
    /// Show (and apply) the most recently used wallpaper
    Current,
    /// Step back in history
    Previous,
    /// Step forward in history
    Next,
    /// List recently used wallpapers
    History {
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },
    /// Show one wallpaper and its usage
    Show { id: String },
    /// Manage favorites
    Favorite {
        #[command(subcommand)]
        action: FavoriteAction,
    },
    /// Rate a wallpaper from 1 to 5
    Rate { id: String, rating: u8 },
    /// Manage tags
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },
    /// Cache statistics
    Stats,
    /// Remove wallpapers from the cache
    Cleanup {
        #[arg(short, long, default_value = "invalid")]
        mode: CleanupMode,

        /// Age for `--mode old`, e.g. 30d, 2w, 6M, 1y, 12h
        #[arg(long, default_value = "30d", value_parser = parse_duration)]
        older_than: Duration,

        /// Only report what would be removed
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove one wallpaper and delete its file
    Remove { id: String },
}

#[derive(Subcommand, Debug)]
enum FavoriteAction {
    /// Flip the favorite flag
    Toggle { id: String },
    /// List favorites
    List,
    /// Pick (and apply) a random favorite
    Random,
}

#[derive(Subcommand, Debug)]
enum TagAction {
    Add {
        id: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    Remove {
        id: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Wallpapers carrying every given tag
    Find {
        #[arg(required = true)]
        tags: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CleanupMode {
    /// Shown at most once
    Unused,
    /// Not used within --older-than
    Old,
    /// File no longer on disk
    Invalid,
    /// Evict down to the configured caps
    Limits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Shared state for one command
struct Context {
    cache: WallpaperCache,
    /// Everything the cache reports while the command runs
    events: EventReceiver,
    download_dir: PathBuf,
    output: OutputFormat,
    script: Option<PathBuf>,
    term: Term,
}

impl Context {
    fn open(global: GlobalArgs) -> Result<Self> {
        let config = cache_config(&global)?;
        let (sender, events) = EventChannel::new();
        Ok(Self {
            cache: WallpaperCache::open(config)?.with_events(sender),
            events,
            download_dir: global.download_dir.unwrap_or_else(default_download_dir),
            output: global.output,
            script: global.script,
            term: Term::stderr(),
        })
    }

    fn pretty(&self) -> bool {
        self.output == OutputFormat::Pretty
    }

    fn line(&self, text: impl AsRef<str>) {
        self.term.write_line(text.as_ref()).ok();
    }
}

/// Cache settings from the global flags, checked before the database is
/// touched
fn cache_config(global: &GlobalArgs) -> Result<CacheConfig> {
    let mut config = CacheConfig::new();
    if let Some(db) = &global.db {
        config = config.db_path(db);
    }
    if let Some(max) = global.max_entries {
        config = config.max_entries(max);
    }
    if let Some(mb) = global.max_size_mb {
        config = config.max_size_mb(mb);
    }
    config.limits().map_err(|e| AppError::Config(e.to_string()))?;
    Ok(config)
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    wallpaper_cache::init_tracing(if cli.global.verbose { "debug" } else { "warn" });

    let ctx = Context::open(cli.global)?;

    match cli.command {
        Commands::Import { paths } => run_import(&ctx, paths),
        Commands::Current => {
            let record = ctx.cache.get_current()?;
            navigate(&ctx, record, "No wallpaper in history")
        }
        Commands::Previous => {
            let record = ctx.cache.get_previous()?;
            navigate(&ctx, record, "Already at the oldest wallpaper")
        }
        Commands::Next => {
            let record = ctx.cache.get_next()?;
            navigate(&ctx, record, "Already at the newest wallpaper")
        }
        Commands::History { limit } => run_history(&ctx, limit),
        Commands::Show { id } => run_show(&ctx, &id),
        Commands::Favorite { action } => run_favorite(&ctx, action),
        Commands::Rate { id, rating } => {
            ctx.cache.set_rating(&id, rating)?;
            if ctx.pretty() {
                ctx.line(format!("{} {} rated {}", style("✓").green(), id, stars(rating)));
            } else {
                print_json(&serde_json::json!({ "id": id, "rating": rating }))?;
            }
            Ok(())
        }
        Commands::Tag { action } => run_tag(&ctx, action),
        Commands::Stats => run_stats(&ctx),
        Commands::Cleanup {
            mode,
            older_than,
            dry_run,
        } => run_cleanup(&ctx, mode, older_than, dry_run),
        Commands::Remove { id } => {
            let record = ctx.cache.remove_wallpaper(&id)?;
            if ctx.pretty() {
                ctx.line(format!(
                    "{} Removed {} ({})",
                    style("✓").green(),
                    record.local_path.display(),
                    format_bytes(record.size_bytes)
                ));
            } else {
                print_json(&record)?;
            }
            Ok(())
        }
    }
}

fn run_import(ctx: &Context, paths: Vec<PathBuf>) -> Result<()> {
    let summary = import_files(ctx, paths)?;
    if !ctx.pretty() {
        return print_json(&summary);
    }

    ctx.line(format!("{} Import complete", style("✓").green().bold()));
    ctx.line(format!("  {} added", style(summary.added).cyan()));
    ctx.line(format!("  {} already cached", style(summary.already_cached).dim()));
    ctx.line(format!("  {} duplicates skipped", style(summary.duplicates).yellow()));
    if summary.evicted > 0 {
        ctx.line(format!("  {} evicted", style(summary.evicted).yellow()));
    }
    if summary.failed > 0 {
        ctx.line(format!("  {} failed", style(summary.failed).red()));
    }
    Ok(())
}

/// Copy every image under `paths` into the download directory and cache the
/// copies. With no paths, the download directory itself is scanned.
fn import_files(ctx: &Context, paths: Vec<PathBuf>) -> Result<ImportSummary> {
    let paths = if paths.is_empty() {
        vec![ctx.download_dir.clone()]
    } else {
        paths
    };
    let files: Vec<PathBuf> = paths
        .iter()
        .flat_map(|root| WalkDir::new(root).follow_links(true).sort_by_file_name())
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable path");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_image(entry.path()))
        .map(|entry| entry.into_path())
        .collect();

    let progress = if ctx.pretty() {
        let pb = ProgressBar::new(files.len() as u64);
        if let Ok(bar_style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(bar_style.progress_chars("█▓░"));
        }
        Some(pb)
    } else {
        None
    };

    let facets = SearchFacets::default();
    let mut summary = ImportSummary::default();

    for file in &files {
        if let Some(ref pb) = progress {
            let name = file.file_name().unwrap_or_default().to_string_lossy();
            pb.set_message(name.to_string());
        }
        match import_one(&ctx.cache, file, &ctx.download_dir, &facets) {
            Ok(ImportResult::Added) => summary.added += 1,
            Ok(ImportResult::AlreadyCached) => summary.already_cached += 1,
            Ok(ImportResult::Duplicate) => summary.duplicates += 1,
            Err(e) => {
                warn!(path = %file.display(), error = %e, "Failed to import");
                summary.failed += 1;
            }
        }
        // evictions triggered by this add
        for event in ctx.events.drain() {
            if let CacheEvent::Evicted { path, .. } = event {
                summary.evicted += 1;
                if let Some(ref pb) = progress {
                    pb.println(format!("  {} {}", style("evicted").dim(), path.display()));
                }
            }
        }
        if let Some(ref pb) = progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    Ok(summary)
}

#[derive(Debug, Default, Serialize)]
struct ImportSummary {
    added: usize,
    already_cached: usize,
    duplicates: usize,
    evicted: usize,
    failed: usize,
}

enum ImportResult {
    Added,
    AlreadyCached,
    Duplicate,
}

/// Cache a copy of `file` under `download_dir`.
///
/// The source URL stays `file://<original path>`, so importing the same
/// original again is recognized. The user's file is never registered
/// itself, because eviction deletes what it evicts.
fn import_one(
    cache: &WallpaperCache,
    file: &Path,
    download_dir: &Path,
    facets: &SearchFacets,
) -> std::result::Result<ImportResult, CacheError> {
    let source = canonical(file)?;
    let source_url = format!("file://{}", source.display());

    if cache.get_by_id(&wallpaper_id(&source_url))?.is_some() {
        return Ok(ImportResult::AlreadyCached);
    }

    let digest = hash_file(&source)?;
    if let Some(existing) = cache.find_duplicate(&digest.hex)? {
        warn!(
            path = %source.display(),
            existing = %existing.local_path.display(),
            "Same content already cached"
        );
        return Ok(ImportResult::Duplicate);
    }

    let (local_path, copied) = place_in_download_dir(&source, download_dir, &digest.hex)?;
    match cache.add_wallpaper_with_digest(&source_url, &local_path, facets, digest) {
        Ok(_) => Ok(ImportResult::Added),
        Err(e) => {
            if copied {
                if let Err(cleanup) = fs::remove_file(&local_path) {
                    warn!(path = %local_path.display(), error = %cleanup, "Failed to remove copy");
                }
            }
            match e {
                CacheError::DuplicateId { .. } => Ok(ImportResult::AlreadyCached),
                e => Err(e),
            }
        }
    }
}

/// Where the cached copy of `source` lives, and whether it was just written.
///
/// Files already inside `dir` are used in place. Otherwise the file keeps
/// its name unless a different image holds it, in which case a content
/// suffix is added.
fn place_in_download_dir(
    source: &Path,
    dir: &Path,
    content_hash: &str,
) -> std::result::Result<(PathBuf, bool), CacheError> {
    fs::create_dir_all(dir).map_err(|e| CacheError::FileSystem {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let dir = canonical(dir)?;
    if source.starts_with(&dir) {
        return Ok((source.to_path_buf(), false));
    }

    let name = source.file_name().unwrap_or_default().to_string_lossy();
    let stem = source.file_stem().unwrap_or_default().to_string_lossy();
    let suffix = content_hash.get(..12).unwrap_or(content_hash);
    let renamed = match source.extension() {
        Some(ext) => format!("{stem}-{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{suffix}"),
    };

    for candidate in [name.to_string(), renamed] {
        let target = dir.join(candidate);
        if !target.exists() {
            fs::copy(source, &target).map_err(|e| CacheError::FileSystem {
                path: target.clone(),
                source: e,
            })?;
            return Ok((target, true));
        }
        if hash_file(&target)?.hex == content_hash {
            return Ok((target, false));
        }
    }

    Err(CacheError::FileSystem {
        path: dir.join(&*name),
        source: io::Error::new(io::ErrorKind::AlreadyExists, "a different image has this name"),
    })
}

fn canonical(path: &Path) -> std::result::Result<PathBuf, CacheError> {
    path.canonicalize().map_err(|e| CacheError::FileSystem {
        path: path.to_path_buf(),
        source: e,
    })
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Apply `record` if a script is configured, then anchor navigation on it
fn navigate(ctx: &Context, record: Option<WallpaperRecord>, empty: &str) -> Result<()> {
    let Some(record) = record else {
        if ctx.pretty() {
            ctx.line(format!("{}", style(empty).dim()));
        } else {
            print_json(&serde_json::Value::Null)?;
        }
        return Ok(());
    };

    apply(ctx, &record)?;
    ctx.cache.set_current_view(&record.id)?;

    if ctx.pretty() {
        print_record(ctx, &record);
    } else {
        print_json(&record)?;
    }
    Ok(())
}

fn apply(ctx: &Context, record: &WallpaperRecord) -> Result<()> {
    if let Some(script) = &ctx.script {
        ScriptExecutor::new(script).run(&record.local_path)?;
    }
    Ok(())
}

fn run_history(ctx: &Context, limit: i64) -> Result<()> {
    let entries = ctx.cache.get_history(limit)?;
    if !ctx.pretty() {
        return print_json(&entries);
    }

    if entries.is_empty() {
        ctx.line(format!("{}", style("History is empty").dim()));
        return Ok(());
    }

    let view = ctx.cache.get_current_view()?;
    ctx.line(format!("{}", style("Recent wallpapers:").bold().underlined()));
    for (i, entry) in entries.iter().enumerate() {
        print_history_entry(ctx, i + 1, entry, view.as_deref() == Some(entry.id()));
    }
    Ok(())
}

fn print_history_entry(ctx: &Context, position: usize, entry: &HistoryEntry, viewing: bool) {
    let marker = if viewing {
        style("▶").green().to_string()
    } else {
        style(" ").to_string()
    };
    ctx.line(format!(
        "{} {:>3}. {} {} {}",
        marker,
        position,
        style(entry.id()).cyan(),
        entry.record.file_name(),
        style(format_time(entry.last_seen)).dim()
    ));
}

fn run_show(ctx: &Context, id: &str) -> Result<()> {
    let Some(record) = ctx.cache.get_by_id(id)? else {
        return Err(CacheError::NotFound { id: id.to_string() }.into());
    };
    let usage = ctx.cache.get_usage_history(id, Some(10))?;

    if !ctx.pretty() {
        return print_json(&serde_json::json!({ "wallpaper": record, "recent_usage": usage }));
    }

    print_record(ctx, &record);
    ctx.line(format!("  {}", style("Recent usage:").dim()));
    for at in usage {
        ctx.line(format!("    {}", format_time(at)));
    }
    Ok(())
}

fn run_favorite(ctx: &Context, action: FavoriteAction) -> Result<()> {
    match action {
        FavoriteAction::Toggle { id } => {
            let favorite = ctx.cache.toggle_favorite(&id)?;
            if ctx.pretty() {
                let state = if favorite { "added to" } else { "removed from" };
                ctx.line(format!("{} {} {} favorites", style("★").yellow(), id, state));
                Ok(())
            } else {
                print_json(&serde_json::json!({ "id": id, "favorite": favorite }))
            }
        }
        FavoriteAction::List => print_records(ctx, &ctx.cache.get_favorites()?, "No favorites yet"),
        FavoriteAction::Random => {
            let record = ctx.cache.get_random_favorite()?;
            navigate(ctx, record, "No favorites yet")
        }
    }
}

fn run_tag(ctx: &Context, action: TagAction) -> Result<()> {
    let (id, tags) = match action {
        TagAction::Add { id, tags } => (id.clone(), ctx.cache.add_tags(&id, &tags)?),
        TagAction::Remove { id, tags } => (id.clone(), ctx.cache.remove_tags(&id, &tags)?),
        TagAction::Find { tags } => {
            let records = ctx.cache.get_by_tags(&tags)?;
            return print_records(ctx, &records, "No wallpapers with those tags");
        }
    };

    if ctx.pretty() {
        let joined = tags.iter().cloned().collect::<Vec<_>>().join(", ");
        ctx.line(format!("{} {} tags: {}", style("✓").green(), id, joined));
        Ok(())
    } else {
        print_json(&serde_json::json!({ "id": id, "tags": tags }))
    }
}

fn run_stats(ctx: &Context) -> Result<()> {
    let stats = ctx.cache.get_statistics()?;
    if ctx.pretty() {
        print_stats(ctx, &stats);
        Ok(())
    } else {
        print_json(&stats)
    }
}

fn print_stats(ctx: &Context, stats: &CacheStatistics) {
    ctx.line(format!("{}", style("Wallpaper Cache").bold().cyan()));
    ctx.line("");
    ctx.line(format!(
        "  {} wallpapers ({} valid, {} missing files)",
        style(stats.total_wallpapers).cyan(),
        stats.valid_wallpapers,
        stats.invalid_wallpapers
    ));
    ctx.line(format!(
        "  {} on disk",
        style(format_bytes(stats.total_size_bytes)).yellow()
    ));
    if let (Some(oldest), Some(newest)) = (stats.oldest_download, stats.newest_download) {
        ctx.line(format!(
            "  downloaded {} .. {}",
            format_time(oldest),
            format_time(newest)
        ));
    }
    if let Some(current) = &stats.current_wallpaper {
        ctx.line(format!("  current  {}", style(current).cyan()));
    }
    if let Some(previous) = &stats.previous_wallpaper {
        ctx.line(format!("  previous {}", style(previous).dim()));
    }
    ctx.line(format!(
        "  {} favorites, average rating {}",
        style(stats.favorite_count).yellow(),
        stats
            .average_rating
            .map(|r| format!("{r:.1}"))
            .unwrap_or_else(|| "-".to_string())
    ));
    ctx.line(format!(
        "  {} used this week, {} this month, {} history entries",
        stats.unique_last_week, stats.unique_last_month, stats.total_history_entries
    ));

    if !stats.most_used.is_empty() {
        ctx.line("");
        ctx.line(format!("{}", style("Most used:").bold().underlined()));
        for usage in &stats.most_used {
            ctx.line(format!(
                "  {:>4}x {} {}",
                usage.use_count,
                style(&usage.id).cyan(),
                style(usage.path.display()).dim()
            ));
        }
    }
    if !stats.top_tags.is_empty() {
        ctx.line("");
        ctx.line(format!("{}", style("Top tags:").bold().underlined()));
        for tag in &stats.top_tags {
            ctx.line(format!("  {:>4} {}", tag.count, tag.tag));
        }
    }
    if !stats.resolutions.is_empty() {
        ctx.line("");
        ctx.line(format!("{}", style("Resolutions:").bold().underlined()));
        for res in &stats.resolutions {
            ctx.line(format!("  {:>4} {}", res.count, res.resolution));
        }
    }
}

fn run_cleanup(
    ctx: &Context,
    mode: CleanupMode,
    older_than: Duration,
    dry_run: bool,
) -> Result<()> {
    let candidates = match mode {
        CleanupMode::Limits => return run_limits(ctx, dry_run),
        CleanupMode::Invalid if !dry_run => {
            let removed = ctx.cache.cleanup_invalid_entries()?;
            return report_cleanup(ctx, &removed, false);
        }
        CleanupMode::Invalid => ctx.cache.find_invalid_entries()?,
        CleanupMode::Unused => ctx.cache.get_unused_wallpapers()?,
        CleanupMode::Old => ctx.cache.get_old_wallpapers(older_than)?,
    };

    // favorites are only ever removed explicitly
    let candidates: Vec<_> = candidates.into_iter().filter(|r| !r.is_favorite).collect();
    if dry_run {
        return report_cleanup(ctx, &candidates, true);
    }

    let mut removed = Vec::with_capacity(candidates.len());
    for record in candidates {
        match ctx.cache.remove_wallpaper(&record.id) {
            Ok(record) => removed.push(record),
            Err(e) => warn!(id = %record.id, error = %e, "Failed to remove wallpaper"),
        }
    }
    report_cleanup(ctx, &removed, false)
}

fn report_cleanup(ctx: &Context, records: &[WallpaperRecord], dry_run: bool) -> Result<()> {
    let freed: u64 = records.iter().map(|r| r.size_bytes).sum();
    if !ctx.pretty() {
        return print_json(&serde_json::json!({
            "dry_run": dry_run,
            "count": records.len(),
            "freed_bytes": freed,
            "wallpapers": records,
        }));
    }

    let verb = if dry_run { "Would remove" } else { "Removed" };
    for record in records {
        ctx.line(format!("  {} {}", style(verb).dim(), record.local_path.display()));
    }
    ctx.line(format!(
        "{} {} {} wallpapers, {} freed",
        style("✓").green(),
        verb,
        style(records.len()).cyan(),
        style(format_bytes(freed)).yellow()
    ));
    Ok(())
}

fn run_limits(ctx: &Context, dry_run: bool) -> Result<()> {
    let limits = ctx.cache.limits();
    if dry_run {
        let stats = ctx.cache.get_statistics()?;
        let exceeded = limits.exceeded_by(stats.total_wallpapers, stats.total_size_bytes);
        if ctx.pretty() {
            ctx.line(format!(
                "{} / {} wallpapers, {} / {}: {}",
                stats.total_wallpapers,
                limits.max_entries,
                format_bytes(stats.total_size_bytes),
                format_bytes(limits.max_size_bytes),
                if exceeded { "over limits" } else { "within limits" }
            ));
            return Ok(());
        }
        return print_json(&serde_json::json!({ "limits": limits, "exceeded": exceeded }));
    }

    let summary = ctx.cache.enforce_cache_limits()?;
    if !ctx.pretty() {
        return print_json(&summary);
    }
    ctx.line(format!(
        "{} Evicted {} wallpapers ({} skipped); {} remain, {}",
        style("✓").green(),
        style(summary.removed).cyan(),
        summary.skipped,
        summary.remaining_count,
        format_bytes(summary.remaining_bytes)
    ));
    Ok(())
}

fn print_records(ctx: &Context, records: &[WallpaperRecord], empty: &str) -> Result<()> {
    if !ctx.pretty() {
        return print_json(&records);
    }
    if records.is_empty() {
        ctx.line(format!("{}", style(empty).dim()));
    }
    for record in records {
        print_record(ctx, record);
    }
    Ok(())
}

fn print_record(ctx: &Context, record: &WallpaperRecord) {
    let favorite = if record.is_favorite {
        style("★").yellow().to_string()
    } else {
        style("○").dim().to_string()
    };
    ctx.line(format!(
        "{} {} {}",
        favorite,
        style(&record.id).cyan().bold(),
        record.local_path.display()
    ));

    let mut details = vec![
        format!("used {}x", record.use_count),
        format!("last {}", format_time(record.last_used_at)),
        format_bytes(record.size_bytes),
    ];
    if let Some(resolution) = &record.resolution {
        details.push(resolution.clone());
    }
    if record.rating > 0 {
        details.push(stars(record.rating));
    }
    if !record.tags.is_empty() {
        details.push(record.tags.iter().cloned().collect::<Vec<_>>().join(", "));
    }
    ctx.line(format!("  {}", style(details.join(" · ")).dim()));
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn stars(rating: u8) -> String {
    let filled = rating.min(5) as usize;
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Parse "30d", "2w", "6M" (30-day months), "1y" (365 days) or "12h"
fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    let unit = s
        .chars()
        .last()
        .ok_or_else(|| "empty duration".to_string())?;
    let amount: i64 = s[..s.len() - unit.len_utf8()]
        .parse()
        .map_err(|_| format!("invalid duration '{s}', expected e.g. 30d, 2w, 6M, 1y"))?;
    if amount < 0 {
        return Err(format!("duration '{s}' must not be negative"));
    }

    let days = |n: i64| Duration::try_days(n).ok_or_else(|| format!("duration '{s}' is too large"));
    match unit {
        'h' => Duration::try_hours(amount).ok_or_else(|| format!("duration '{s}' is too large")),
        'd' => days(amount),
        'w' => days(amount.saturating_mul(7)),
        'M' => days(amount.saturating_mul(30)),
        'y' => days(amount.saturating_mul(365)),
        other => Err(format!("unknown duration unit '{other}', use h, d, w, M or y")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    /// Context for `args` with the database and download dir under `dir`
    fn context(dir: &TempDir, args: &[&str]) -> Context {
        let db = dir.path().join("wallpapers.db");
        let walls = dir.path().join("walls");
        let mut argv = vec![
            "wallpaper-cache".to_string(),
            "import".to_string(),
            "--db".to_string(),
            db.display().to_string(),
            "--download-dir".to_string(),
            walls.display().to_string(),
            "--output".to_string(),
            "json".to_string(),
        ];
        argv.extend(args.iter().map(|a| a.to_string()));
        let cli = Cli::try_parse_from(argv).unwrap();
        Context::open(cli.global).unwrap()
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn durations_parse_every_unit() {
        assert_eq!(parse_duration("12h").unwrap(), Duration::hours(12));
        assert_eq!(parse_duration("30d").unwrap(), Duration::days(30));
        assert_eq!(parse_duration("2w").unwrap(), Duration::days(14));
        assert_eq!(parse_duration("6M").unwrap(), Duration::days(180));
        assert_eq!(parse_duration("1y").unwrap(), Duration::days(365));
    }

    #[test]
    fn bad_durations_are_rejected() {
        for bad in ["", "d", "30", "30x", "-1d", "1.5d"] {
            assert!(parse_duration(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn format_bytes_picks_unit() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn stars_fill_to_rating() {
        assert_eq!(stars(3), "★★★☆☆");
        assert_eq!(stars(0), "☆☆☆☆☆");
    }

    #[test]
    fn image_extensions_are_case_insensitive() {
        assert!(is_image(Path::new("a.JPG")));
        assert!(is_image(Path::new("b.webp")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("no-extension")));
    }

    #[test]
    fn import_over_the_cap_leaves_sources_alone() {
        let dir = TempDir::new().unwrap();
        let photos = dir.path().join("photos");
        fs::create_dir_all(&photos).unwrap();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            fs::write(photos.join(name), name.as_bytes()).unwrap();
        }
        let ctx = context(&dir, &["--max-entries", "2"]);

        let summary = import_files(&ctx, vec![photos.clone()]).unwrap();

        assert_eq!(summary.added, 3);
        assert_eq!(summary.evicted, 2);
        assert_eq!(files_in(&photos), vec!["a.jpg", "b.jpg", "c.jpg"]);
        assert_eq!(files_in(&dir.path().join("walls")), vec!["c.jpg"]);
        let current = ctx.cache.get_current().unwrap().unwrap();
        let expected = dir.path().join("walls").join("c.jpg");
        assert_eq!(current.local_path, expected.canonicalize().unwrap());
    }

    #[test]
    fn reimporting_an_original_is_already_cached() {
        let dir = TempDir::new().unwrap();
        let photos = dir.path().join("photos");
        fs::create_dir_all(&photos).unwrap();
        fs::write(photos.join("a.jpg"), b"aaaa").unwrap();
        let ctx = context(&dir, &[]);

        import_files(&ctx, vec![photos.clone()]).unwrap();
        let again = import_files(&ctx, vec![photos.clone()]).unwrap();

        assert_eq!(again.added, 0);
        assert_eq!(again.already_cached, 1);
        assert_eq!(files_in(&dir.path().join("walls")), vec!["a.jpg"]);
    }

    #[test]
    fn name_clash_with_other_content_gets_a_suffix() {
        let dir = TempDir::new().unwrap();
        let (one, two) = (dir.path().join("one"), dir.path().join("two"));
        fs::create_dir_all(&one).unwrap();
        fs::create_dir_all(&two).unwrap();
        fs::write(one.join("sky.jpg"), b"blue").unwrap();
        fs::write(two.join("sky.jpg"), b"grey").unwrap();
        let ctx = context(&dir, &[]);

        let summary = import_files(&ctx, vec![one, two]).unwrap();

        assert_eq!(summary.added, 2);
        let walls = files_in(&dir.path().join("walls"));
        assert_eq!(walls.len(), 2);
        assert!(walls.contains(&"sky.jpg".to_string()));
    }

    #[test]
    fn download_dir_files_are_cached_in_place() {
        let dir = TempDir::new().unwrap();
        let walls = dir.path().join("walls");
        fs::create_dir_all(&walls).unwrap();
        fs::write(walls.join("x.png"), b"xxxx").unwrap();
        let ctx = context(&dir, &[]);

        let summary = import_files(&ctx, Vec::new()).unwrap();

        assert_eq!(summary.added, 1);
        assert_eq!(files_in(&walls), vec!["x.png"]);
        let current = ctx.cache.get_current().unwrap().unwrap();
        assert_eq!(current.local_path, walls.join("x.png").canonicalize().unwrap());
    }

    #[test]
    fn zero_caps_are_configuration_errors() {
        for flag in ["--max-entries", "--max-size-mb"] {
            let cli = Cli::try_parse_from(["wallpaper-cache", "stats", flag, "0"]).unwrap();
            let err = cache_config(&cli.global).unwrap_err();
            assert!(matches!(err, AppError::Config(_)), "{flag}: {err}");
        }
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::try_parse_from([
            "wallpaper-cache",
            "cleanup",
            "--mode",
            "old",
            "--older-than",
            "2w",
            "--dry-run",
            "--output",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.global.output, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::Cleanup { mode: CleanupMode::Old, dry_run: true, .. }
        ));
    }
}
