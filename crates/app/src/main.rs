use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use learn_core::model::{Catalog, CourseId, LessonId};
use learn_core::navigation::next_lesson_id;
use services::{AppServices, AttemptOutcome, Clock, EngineConfig, NextStep};
use storage::AccessToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingCommand,
    UnknownCommand(String),
    MissingValue { flag: &'static str },
    MissingTarget { command: &'static str },
    UnknownArg(String),
    InvalidId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "missing subcommand"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingTarget { command } => write!(f, "{command} requires an id"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { raw } => write!(f, "invalid id: {raw:?}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- progress            [options]");
    eprintln!("  cargo run -p app -- next <lesson_id>    [options]");
    eprintln!("  cargo run -p app -- start <lesson_id>   [options]");
    eprintln!("  cargo run -p app -- complete <lesson_id> [options]");
    eprintln!("  cargo run -p app -- resume <course_id>  [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --catalog <file>   read courses from a JSON file instead of GET /courses");
    eprintln!("  --user <id>        learner id");
    eprintln!("  --token <token>    access token (selects server-side progress)");
    eprintln!("  --guest            track progress locally without an account");
    eprintln!("  --db <sqlite_url>  guest progress database (default sqlite://guest.sqlite3)");
    eprintln!("  --api <url>        content API base url (default http://localhost:8000)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LEARN_API_BASE_URL, LEARN_ACCESS_TOKEN, LEARN_GUEST, LEARN_USER_ID, LEARN_DB_URL");
    eprintln!("  RUST_LOG (default info)");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Progress,
    Next(LessonId),
    Start(LessonId),
    Complete(LessonId),
    Resume(CourseId),
}

impl Command {
    fn from_args(name: &str, target: Option<String>) -> Result<Self, ArgsError> {
        match name {
            "progress" => match target {
                None => Ok(Self::Progress),
                Some(extra) => Err(ArgsError::UnknownArg(extra)),
            },
            "next" => parse_id(target, "next").map(Self::Next),
            "start" => parse_id(target, "start").map(Self::Start),
            "complete" => parse_id(target, "complete").map(Self::Complete),
            "resume" => parse_id(target, "resume").map(Self::Resume),
            other => Err(ArgsError::UnknownCommand(other.to_owned())),
        }
    }
}

fn parse_id<T: FromStr>(target: Option<String>, command: &'static str) -> Result<T, ArgsError> {
    let raw = target.ok_or(ArgsError::MissingTarget { command })?;
    raw.parse().map_err(|_| ArgsError::InvalidId { raw })
}

struct Args {
    command: Command,
    catalog_path: Option<PathBuf>,
    config: EngineConfig,
}

impl Args {
    fn parse(argv: Vec<String>) -> Result<Self, ArgsError> {
        let mut args = argv.into_iter();
        let name = args.next().ok_or(ArgsError::MissingCommand)?;

        let mut config = EngineConfig::from_env();
        config.db_url = normalize_sqlite_url(config.db_url);
        let mut catalog_path = None;
        let mut target = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--catalog" => {
                    catalog_path = Some(PathBuf::from(require_value(&mut args, "--catalog")?));
                }
                "--user" => config.user_id = Some(require_value(&mut args, "--user")?),
                "--token" => {
                    config.access_token = AccessToken::new(require_value(&mut args, "--token")?);
                }
                "--guest" => config.guest = true,
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    config.db_url = normalize_sqlite_url(value);
                }
                "--api" => config.api_base_url = require_value(&mut args, "--api")?,
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ if target.is_none() => target = Some(arg),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            command: Command::from_args(&name, target)?,
            catalog_path,
            config,
        })
    }

    /// `next` with a catalog file is pure navigation and needs no progress store.
    fn offline_next(&self) -> Option<(&LessonId, &Path)> {
        match (&self.command, self.catalog_path.as_deref()) {
            (Command::Next(lesson_id), Some(path)) => Some((lesson_id, path)),
            _ => None,
        }
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    let trimmed = raw.trim().to_string();
    if is_in_memory(&trimmed) || trimmed.starts_with("sqlite://") {
        return trimmed;
    }

    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn is_in_memory(db_url: &str) -> bool {
    db_url == "sqlite::memory:" || db_url.contains("mode=memory")
}

fn read_catalog(path: &Path) -> Result<Catalog, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(checked(serde_json::from_str::<Catalog>(&raw)?))
}

fn checked(catalog: Catalog) -> Catalog {
    if catalog.is_empty() {
        tracing::warn!("catalog has no courses");
    }
    if let Err(err) = catalog.validate() {
        tracing::warn!(error = %err, "catalog breaks lesson id uniqueness");
    }
    catalog
}

async fn load_catalog(
    services: &AppServices,
    path: Option<&Path>,
) -> Result<Catalog, Box<dyn std::error::Error>> {
    match path {
        Some(path) => read_catalog(path),
        None => Ok(checked(services.fetch_catalog().await?)),
    }
}

fn next_line(catalog: &Catalog, lesson_id: &LessonId) -> Result<String, String> {
    next_lesson_id(catalog, lesson_id)
        .map(|next| next.to_string())
        .ok_or_else(|| format!("lesson {lesson_id} is not in the catalog"))
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if matches!(argv.first().map(String::as_str), None | Some("--help" | "-h")) {
        print_usage();
        return Ok(());
    }

    let parsed = Args::parse(argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    if let Some((lesson_id, path)) = parsed.offline_next() {
        println!("{}", next_line(&read_catalog(path)?, lesson_id)?);
        return Ok(());
    }

    let services = AppServices::from_config(&parsed.config, Clock::default()).await?;
    let catalog = load_catalog(&services, parsed.catalog_path.as_deref()).await?;
    let user_id = services.user_id().clone();

    match parsed.command {
        Command::Progress => {
            let rows = services.progress().dashboard(&user_id, &catalog).await?;
            for row in rows {
                println!(
                    "{:<24} {:>3}%  {}/{} lessons  {} xp",
                    row.title, row.percent, row.completed, row.total, row.earned_xp
                );
            }
        }
        Command::Next(lesson_id) => println!("{}", next_line(&catalog, &lesson_id)?),
        Command::Start(lesson_id) => {
            let mut attempt = services.attempt(lesson_id);
            match services.completion().touch(&mut attempt).await? {
                Some(record) => println!("{} {}", record.lesson_id, record.status.as_str()),
                None => println!("{} already completed", attempt.lesson_id()),
            }
        }
        Command::Complete(lesson_id) => {
            let mut attempt = services.attempt(lesson_id);
            let outcome = services.completion().acknowledge(&mut attempt, &catalog).await;
            if let AttemptOutcome::Completed { saved, next } = outcome {
                match saved {
                    Ok(record) => println!("{} {}", record.lesson_id, record.status.as_str()),
                    Err(err) => eprintln!("progress not saved: {err}"),
                }
                match next {
                    NextStep::Advance(id) => println!("next: {id}"),
                    NextStep::CourseComplete(done) => println!(
                        "course complete: {} ({} lessons, {} xp)",
                        done.title, done.lesson_count, done.total_xp
                    ),
                    NextStep::NoFurtherLesson => println!("no further lesson"),
                }
            }
        }
        Command::Resume(course_id) => {
            let course = catalog
                .course(&course_id)
                .ok_or_else(|| format!("course {course_id} is not in the catalog"))?;
            match services.progress().resume(&user_id, course).await? {
                Some(lesson_id) => println!("{lesson_id}"),
                None => println!("all lessons completed"),
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
