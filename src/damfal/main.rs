use chrono::{DateTime, Utc};
use clap::Parser;
use colored::*;
use damfal::config::DriverConfig;
use damfal::driver::DamDriver;
use damfal::error::{DamError, Result};
use damfal::fal::StorageDriver;
use damfal::identifier::CombinedIdentifier;
use damfal::model::AssetSearch;
use damfal::repository::snapshot::SnapshotRemote;
use damfal::repository::CachedRepository;
use directories::ProjectDirs;
use serde_json::Value;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use unicode_width::UnicodeWidthStr;

mod args;
use args::{Cli, Commands};

type Driver = DamDriver<CachedRepository<SnapshotRemote>>;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let driver = init_driver(&cli)?;

    match cli.command {
        Commands::Ls {
            folder,
            start,
            limit,
            sort,
            reverse,
            recursive,
        } => handle_ls(&driver, folder, start, limit, &sort, reverse, recursive),
        Commands::Tree { folder } => handle_tree(&driver, folder),
        Commands::Stat {
            identifier,
            fields,
            json,
        } => handle_stat(&driver, &identifier, &fields, json),
        Commands::Url { identifier } => handle_url(&driver, &identifier),
        Commands::Fetch { identifier, output } => handle_fetch(&driver, &identifier, output),
        Commands::Search {
            keyword,
            start,
            limit,
        } => handle_search(&driver, &keyword, start, limit),
        Commands::Info => handle_info(&driver),
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn init_driver(cli: &Cli) -> Result<Driver> {
    let config_dir = match &cli.config {
        Some(dir) => dir.clone(),
        None => ProjectDirs::from("com", "damfal", "damfal")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| DamError::Config("could not determine config dir".into()))?,
    };
    let config = DriverConfig::load(&config_dir)?;
    tracing::debug!(config_dir = %config_dir.display(), library = %cli.library.display(), "starting");

    let remote = SnapshotRemote::open(&cli.library)?;
    Ok(DamDriver::new(CachedRepository::new(remote), config))
}

fn handle_ls(
    driver: &Driver,
    folder: Option<String>,
    start: usize,
    limit: usize,
    sort: &str,
    reverse: bool,
    recursive: bool,
) -> Result<()> {
    let folder = folder.unwrap_or_else(|| driver.root_level_folder());
    let folders = driver.get_folders_in_folder(&folder, start, limit, recursive, reverse)?;
    let files = driver.get_files_in_folder(&folder, start, limit, false, sort, reverse)?;

    if folders.is_empty() && files.is_empty() {
        println!("{}", "No items found.".dimmed());
        return Ok(());
    }

    for id in &folders {
        let info = driver.get_folder_info(&id.to_string())?;
        print_row(id, &info.name, "", info.mtime);
    }
    for id in &files {
        let info = driver.get_file_info(&id.to_string(), &["name", "size", "mtime"])?;
        let name = info.get("name").and_then(Value::as_str).unwrap_or_default();
        let size = info.get("size").and_then(Value::as_u64).unwrap_or(0);
        let mtime = info.get("mtime").and_then(Value::as_i64).unwrap_or(0);
        print_row(id, name, &format_size(size), mtime);
    }
    Ok(())
}

fn handle_tree(driver: &Driver, folder: Option<String>) -> Result<()> {
    let folder = folder.unwrap_or_else(|| driver.root_level_folder());
    let root = driver.get_folder_info(&folder)?;
    println!("{} {}", root.name.bold(), folder.dimmed());
    print_tree(driver, &folder, 1)
}

fn print_tree(driver: &Driver, folder: &str, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    for child in driver.get_folders_in_folder(folder, 0, 0, false, false)? {
        let token = child.to_string();
        let info = driver.get_folder_info(&token)?;
        let files = driver.count_files_in_folder(&token)?;
        let count = if files > 0 {
            format!(" ({} files)", files)
        } else {
            String::new()
        };
        println!("{}{}{} {}", indent, info.name, count.dimmed(), token.dimmed());
        print_tree(driver, &token, depth + 1)?;
    }
    Ok(())
}

fn handle_stat(driver: &Driver, identifier: &str, fields: &[String], json: bool) -> Result<()> {
    let requested: Vec<&str> = fields.iter().map(String::as_str).collect();
    let info = driver.get_file_info(identifier, &requested)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    let key_width = info.keys().map(|k| k.width()).max().unwrap_or(0);
    for (key, value) in &info {
        let rendered = match value {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_string(),
        };
        println!("{}  {}", format!("{:<width$}", key, width = key_width).bold(), rendered);
    }
    Ok(())
}

fn handle_url(driver: &Driver, identifier: &str) -> Result<()> {
    match driver.get_public_url(identifier)? {
        Some(url) => println!("{}", url),
        None => println!("{}", format!("No public URL for {}", identifier).yellow()),
    }
    Ok(())
}

fn handle_fetch(driver: &Driver, identifier: &str, output: Option<PathBuf>) -> Result<()> {
    let output = match output {
        Some(path) => path,
        None => {
            let info = driver.get_file_info(identifier, &["name"])?;
            let name = info
                .get("name")
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| DamError::Config(format!("{} has no name, use --output", identifier)))?;
            PathBuf::from(name)
        }
    };

    let bytes = driver.get_file_contents(identifier)?;
    std::fs::write(&output, &bytes)?;
    println!(
        "{}",
        format!("Wrote {} to {}", format_size(bytes.len() as u64), output.display()).green()
    );
    Ok(())
}

fn handle_search(driver: &Driver, keyword: &str, start: usize, limit: usize) -> Result<()> {
    let search = AssetSearch::new(keyword).with_start(start).with_limit(limit);
    let hits = driver.search(&search)?;
    if hits.is_empty() {
        println!("{}", "No assets found.".dimmed());
        return Ok(());
    }
    for record in &hits {
        let mtime = damfal::model::remote_timestamp(record.defaults.date_modified.as_deref());
        print_row(
            &record.identifier(),
            &record.name,
            &format_size(record.defaults.size.unwrap_or(0)),
            mtime,
        );
    }
    Ok(())
}

fn handle_info(driver: &Driver) -> Result<()> {
    let config = driver.config();
    let label = |name: &str| format!("{:<14}", name).bold();
    println!("{}{}", label("driver"), driver.driver_type());
    println!("{}{}", label("storage"), config.storage_id);
    println!("{}{}", label("tenant"), config.base_url());
    println!("{}{}", label("root"), driver.root_level_folder());
    println!("{}{}", label("master size"), config.master_image_size);
    match driver.misconfiguration() {
        None => println!("{}{}", label("state"), "ready".green()),
        Some(reason) => println!("{}{}", label("state"), reason.red()),
    }
    Ok(())
}

const LINE_WIDTH: usize = 100;
const ID_WIDTH: usize = 28;
const SIZE_WIDTH: usize = 10;
const TIME_WIDTH: usize = 16;

fn print_row(id: &CombinedIdentifier, name: &str, size: &str, mtime: i64) {
    let id_str = id.to_string();
    let id_display = format!("{:<width$}", truncate_to_width(&id_str, ID_WIDTH), width = ID_WIDTH);
    let available = LINE_WIDTH.saturating_sub(ID_WIDTH + SIZE_WIDTH + TIME_WIDTH + 2);
    let name_display = truncate_to_width(name, available);
    let padding = available.saturating_sub(name_display.width());

    let id_colored = if id.is_container() {
        id_display.blue()
    } else {
        id_display.normal()
    };

    println!(
        "  {}{}{}{:>size_width$}{}",
        id_colored,
        name_display,
        " ".repeat(padding),
        size,
        format_time_ago(mtime).dimmed(),
        size_width = SIZE_WIDTH
    );
}

fn truncate_to_width(s: &str, max_width: usize) -> String {
    use unicode_width::UnicodeWidthChar;

    if s.width() <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut current_width = 0;
    for c in s.chars() {
        let char_width = c.width().unwrap_or(0);
        if current_width + char_width > max_width.saturating_sub(1) {
            result.push('…');
            return result;
        }
        result.push(c);
        current_width += char_width;
    }
    result
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

fn format_time_ago(timestamp: i64) -> String {
    let Some(time) = DateTime::<Utc>::from_timestamp(timestamp, 0).filter(|_| timestamp > 0) else {
        return format!("{:>width$}", "-", width = TIME_WIDTH);
    };
    let duration = Utc::now().signed_duration_since(time);
    let formatter = timeago::Formatter::new();
    let time_str = formatter.convert(duration.to_std().unwrap_or_default());
    format!("{:>width$}", time_str, width = TIME_WIDTH)
}
