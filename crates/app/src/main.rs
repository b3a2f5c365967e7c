use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDate;
use roadmap_core::import;
use roadmap_core::model::{Status, StatusParseError, Technology};
use roadmap_core::stats::{self, DEFAULT_UPCOMING_LIMIT, StatusFilter, TechnologyQuery};
use services::{
    AppServices, Clock, DEFAULT_NAMESPACE, FetchConfig, ProgressService, RoadmapFetcher,
    load_document_file,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_DB_URL: &str = "sqlite:roadmap.sqlite3";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { command: &'static str, name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidStatus(StatusParseError),
    InvalidDate { raw: String },
    InvalidLimit { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { command, name } => {
                write!(f, "{command} requires <{name}>")
            }
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidStatus(err) => write!(f, "{err}"),
            ArgsError::InvalidDate { raw } => {
                write!(f, "invalid deadline {raw:?}: expected YYYY-MM-DD or none")
            }
            ArgsError::InvalidLimit { raw } => write!(f, "invalid limit: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

/// Failures of a well-formed command against the current data.
#[derive(Debug)]
enum CommandError {
    NoRoadmap,
    UnknownItem(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::NoRoadmap => write!(f, "no roadmap loaded; run `roadmap import <file>`"),
            CommandError::UnknownItem(id) => write!(f, "no item {id} in the current roadmap"),
        }
    }
}

impl std::error::Error for CommandError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn require_arg(
    args: &mut impl Iterator<Item = String>,
    command: &'static str,
    name: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingArgument { command, name })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  roadmap [--db <sqlite_url>] [--namespace <name>] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  import <file.json>                 Replace roadmap and progress from a file");
    eprintln!("  fetch <url>                        Replace roadmap and progress from a URL");
    eprintln!("  export [--out <file>]              Write roadmap + progress as JSON");
    eprintln!("  list [--status <filter>] [--search <q>]");
    eprintln!("                                     filter: all, overdue, not_started, in_progress, completed");
    eprintln!("  show <id>                          Show one item");
    eprintln!("  status <id> <status>               Set an item's status");
    eprintln!("  advance <id>                       Move an item to the next status");
    eprintln!("  notes <id> <text>                  Replace an item's notes");
    eprintln!("  deadline <id> <YYYY-MM-DD|none>    Set or clear an item's deadline");
    eprintln!("  stats                              Progress summary (default command)");
    eprintln!("  upcoming [n]                       Next deadlines (default 5)");
    eprintln!("  random                             Pick an unfinished item");
    eprintln!("  reset                              Clear all progress");
    eprintln!("  complete-all                       Mark every item completed");
    eprintln!("  clear                              Remove roadmap and progress");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db {DEFAULT_DB_URL}");
    eprintln!("  --namespace {DEFAULT_NAMESPACE}");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ROADMAP_DB_URL, ROADMAP_NAMESPACE, ROADMAP_FETCH_TIMEOUT_SECS, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Import { path: PathBuf },
    Fetch { url: String },
    Export { out: Option<PathBuf> },
    List { query: TechnologyQuery },
    Show { id: String },
    Status { id: String, status: Status },
    Advance { id: String },
    Notes { id: String, text: String },
    Deadline { id: String, deadline: Option<NaiveDate> },
    Stats,
    Upcoming { limit: usize },
    Random,
    Reset,
    CompleteAll,
    Clear,
    Help,
}

impl Command {
    fn parse(name: &str, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let command = match name {
            "import" => Command::Import {
                path: PathBuf::from(require_arg(args, "import", "file")?),
            },
            "fetch" => Command::Fetch {
                url: require_arg(args, "fetch", "url")?,
            },
            "export" => {
                let mut out = None;
                while let Some(arg) = args.next() {
                    match arg.as_str() {
                        "--out" => out = Some(PathBuf::from(require_value(args, "--out")?)),
                        _ => return Err(ArgsError::UnknownArg(arg)),
                    }
                }
                Command::Export { out }
            }
            "list" => {
                let mut query = TechnologyQuery::default();
                while let Some(arg) = args.next() {
                    match arg.as_str() {
                        "--status" => {
                            query.filter = require_value(args, "--status")?
                                .parse::<StatusFilter>()
                                .map_err(ArgsError::InvalidStatus)?;
                        }
                        "--search" => query.search = Some(require_value(args, "--search")?),
                        _ => return Err(ArgsError::UnknownArg(arg)),
                    }
                }
                Command::List { query }
            }
            "show" => Command::Show {
                id: require_arg(args, "show", "id")?,
            },
            "status" => Command::Status {
                id: require_arg(args, "status", "id")?,
                status: require_arg(args, "status", "status")?
                    .parse()
                    .map_err(ArgsError::InvalidStatus)?,
            },
            "advance" => Command::Advance {
                id: require_arg(args, "advance", "id")?,
            },
            "notes" => Command::Notes {
                id: require_arg(args, "notes", "id")?,
                text: require_arg(args, "notes", "text")?,
            },
            "deadline" => Command::Deadline {
                id: require_arg(args, "deadline", "id")?,
                deadline: parse_deadline(&require_arg(args, "deadline", "date")?)?,
            },
            "stats" => Command::Stats,
            "upcoming" => {
                let limit = match args.next() {
                    Some(raw) => raw
                        .parse()
                        .map_err(|_| ArgsError::InvalidLimit { raw: raw.clone() })?,
                    None => DEFAULT_UPCOMING_LIMIT,
                };
                Command::Upcoming { limit }
            }
            "random" => Command::Random,
            "reset" => Command::Reset,
            "complete-all" => Command::CompleteAll,
            "clear" => Command::Clear,
            "help" => Command::Help,
            other => return Err(ArgsError::UnknownCommand(other.to_owned())),
        };

        if let Some(extra) = args.next() {
            return Err(ArgsError::UnknownArg(extra));
        }
        Ok(command)
    }
}

fn parse_deadline(raw: &str) -> Result<Option<NaiveDate>, ArgsError> {
    if raw.eq_ignore_ascii_case("none") || raw.is_empty() {
        return Ok(None);
    }
    import::parse_deadline(raw)
        .map(Some)
        .ok_or_else(|| ArgsError::InvalidDate {
            raw: raw.to_owned(),
        })
}

#[derive(Debug)]
struct Args {
    db_url: String,
    namespace: String,
    command: Command,
}

impl Args {
    fn parse(argv: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("ROADMAP_DB_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| normalize_sqlite_url(DEFAULT_DB_URL.into()), normalize_sqlite_url);
        let mut namespace = std::env::var("ROADMAP_NAMESPACE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_owned());

        let mut args = argv.into_iter();
        let mut command_name = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--namespace" => namespace = require_value(&mut args, "--namespace")?,
                "--help" | "-h" => {
                    command_name = Some("help".to_owned());
                    break;
                }
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => {
                    command_name = Some(arg);
                    break;
                }
            }
        }

        // Default behavior: show the progress summary.
        let command = match command_name {
            None => Command::Stats,
            Some(name) if name == "help" => Command::Help,
            Some(name) => Command::parse(&name, &mut args)?,
        };

        Ok(Self {
            db_url,
            namespace,
            command,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn status_marker(tech: &Technology) -> &'static str {
    match tech.status {
        Status::NotStarted => "[ ]",
        Status::InProgress => "[~]",
        Status::Completed => "[x]",
    }
}

fn print_technology_line(tech: &Technology, now: chrono::DateTime<chrono::Utc>) {
    let deadline = tech
        .deadline
        .map(|d| {
            let flag = if stats::is_overdue(tech, now) { " OVERDUE" } else { "" };
            format!("  (due {d}{flag})")
        })
        .unwrap_or_default();
    println!("{} {:<16} {}{}", status_marker(tech), tech.id, tech.title, deadline);
}

fn print_technology(tech: &Technology, now: chrono::DateTime<chrono::Utc>) {
    println!("{} ({})", tech.title, tech.id);
    println!("status:   {}", tech.status);
    match tech.deadline {
        Some(deadline) if stats::is_overdue(tech, now) => println!("deadline: {deadline} (overdue)"),
        Some(deadline) => println!("deadline: {deadline}"),
        None => println!("deadline: -"),
    }
    if !tech.description.is_empty() {
        println!();
        println!("{}", tech.description);
    }
    if !tech.notes.is_empty() {
        println!();
        println!("notes:");
        println!("{}", tech.notes);
    }
    if !tech.resources.is_empty() {
        println!();
        println!("resources:");
        for resource in &tech.resources {
            println!("  - {} <{}>", resource.title, resource.url);
        }
    }
}

async fn import_document(
    progress: &ProgressService,
    doc: &serde_json::Value,
) -> Result<(), Box<dyn std::error::Error>> {
    let roadmap = progress.import_roadmap(doc).await?;
    println!(
        "Imported \"{}\" ({} items)",
        roadmap.title,
        roadmap.items.len()
    );
    Ok(())
}

async fn fetch_and_import(
    fetcher: &RoadmapFetcher,
    progress: &ProgressService,
    url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match fetcher.fetch(url).await? {
        Some(doc) => import_document(progress, &doc).await,
        None => {
            println!("Fetch cancelled");
            Ok(())
        }
    }
}

async fn execute(
    services: &AppServices,
    clock: Clock,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let progress = services.progress();
    let now = clock.now();

    match command {
        Command::Help => print_usage(),
        Command::Import { path } => {
            let doc = load_document_file(&path).await?;
            import_document(&progress, &doc).await?;
        }
        Command::Fetch { url } => {
            fetch_and_import(&services.fetcher(), &progress, &url).await?;
        }
        Command::Export { out } => {
            let doc = progress
                .export_roadmap()
                .await?
                .ok_or(CommandError::NoRoadmap)?;
            let json = serde_json::to_string_pretty(&doc)?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, json).await?;
                    println!("Exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        Command::List { query } => {
            let list = progress.query(&query).await?;
            for tech in &list {
                print_technology_line(tech, now);
            }
            println!("{} shown ({})", list.len(), query.filter);
        }
        Command::Show { id } => {
            let tech = progress
                .get_technology_by_id(&id)
                .await?
                .ok_or(CommandError::UnknownItem(id))?;
            print_technology(&tech, now);
        }
        Command::Status { id, status } => {
            let tech = progress.update_status(&id, status).await?;
            println!("{} is now {}", tech.id, tech.status);
        }
        Command::Advance { id } => {
            let tech = progress.advance_status(&id).await?;
            println!("{} is now {}", tech.id, tech.status);
        }
        Command::Notes { id, text } => {
            let tech = progress.update_notes(&id, text).await?;
            println!("Notes saved for {}", tech.id);
        }
        Command::Deadline { id, deadline } => {
            let tech = progress.update_deadline(&id, deadline).await?;
            match tech.deadline {
                Some(deadline) => println!("{} due {deadline}", tech.id),
                None => println!("{} has no deadline", tech.id),
            }
        }
        Command::Stats => {
            let overview = progress
                .overview()
                .await?
                .ok_or(CommandError::NoRoadmap)?;
            println!("{}", overview.title);
            if !overview.description.is_empty() {
                println!("{}", overview.description);
            }
            println!();
            println!("progress:     {}%", overview.percent);
            println!("total:        {}", overview.stats.total);
            println!("completed:    {}", overview.stats.completed);
            println!("in progress:  {}", overview.stats.in_progress);
            println!("not started:  {}", overview.stats.not_started);
            let overdue = progress.overdue().await?;
            if !overdue.is_empty() {
                println!("overdue:      {}", overdue.len());
            }
        }
        Command::Upcoming { limit } => {
            let upcoming = progress.upcoming_deadlines(limit).await?;
            if upcoming.is_empty() {
                println!("No upcoming deadlines");
            }
            for tech in &upcoming {
                print_technology_line(tech, now);
            }
        }
        Command::Random => {
            let tech = progress.random_unfinished().await?;
            print_technology(&tech, now);
        }
        Command::Reset => {
            progress.reset_all_progress().await?;
            println!("Progress reset");
        }
        Command::CompleteAll => {
            progress.mark_all_completed().await?;
            println!("All items marked completed");
        }
        Command::Clear => {
            progress.clear_roadmap().await?;
            println!("Roadmap removed");
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    if parsed.command == Command::Help {
        print_usage();
        return Ok(());
    }

    prepare_sqlite_file(&parsed.db_url)?;
    info!(db = %parsed.db_url, namespace = %parsed.namespace, "opening storage");

    let clock = Clock::default_clock();
    let services = AppServices::new_sqlite(
        &parsed.db_url,
        clock,
        &parsed.namespace,
        &FetchConfig::from_env(),
    )
    .await?;

    execute(&services, clock, parsed.command).await
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
