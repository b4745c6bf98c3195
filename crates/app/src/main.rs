use std::fmt;

use quiz_core::model::QuizKind;
use services::{AppServices, Clock, QuizConfig};
use tokio::task::LocalSet;
use tracing_subscriber::EnvFilter;

mod terminal;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidKind { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidKind { raw } => write!(f, "unknown quiz kind: {raw}"),
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
    eprintln!("  cargo run -p app -- [--kind <slug>] [--db <sqlite_url>] [--data <dir_or_url>]");
    eprintln!("  cargo run -p app -- --list-kinds");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --kind read_and_select");
    eprintln!("  --db sqlite:quiz.sqlite3");
    eprintln!("  --data data");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_DATA_BASE_URL, QUIZ_AUTO_ADVANCE_MS, RUST_LOG");
}

struct Args {
    kind: QuizKind,
    config: QuizConfig,
}

impl Args {
    fn parse(
        args: &mut impl Iterator<Item = String>,
        mut config: QuizConfig,
    ) -> Result<Self, ArgsError> {
        let mut kind = QuizKind::ReadAndSelect;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--kind" => {
                    let value = require_value(args, "--kind")?;
                    kind = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidKind { raw: value.clone() })?;
                }
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    config.db_url = value;
                }
                "--data" => {
                    config.data_base_url = require_value(args, "--data")?;
                }
                "--list-kinds" => {
                    for kind in QuizKind::ALL {
                        println!("{:<24}{}", kind.slug(), kind.profile().skill);
                    }
                    std::process::exit(0);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        config.db_url = normalize_sqlite_url(config.db_url);
        Ok(Self { kind, config })
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
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// `SQLite` refuses to open a missing file, so create it (and its directory)
/// up front.
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

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // stdout belongs to the quiz screen.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = QuizConfig::from_env()?;
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv, config).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&args.config.db_url)?;
    let services = AppServices::new_sqlite(&args.config, Clock::default()).await?;
    terminal::run(args.kind, services).await?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();
    // Widgets are single-threaded; their tasks run on this `LocalSet`.
    let local = LocalSet::new();
    if let Err(err) = local.run_until(run()).await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        let mut iter = args.iter().map(|s| (*s).to_owned());
        Args::parse(&mut iter, QuizConfig::default())
    }

    #[test]
    fn parses_kind_and_locations() {
        let args = parse(&["--kind", "listen_and_type", "--data", "https://cdn.example.com/q"])
            .unwrap();
        assert_eq!(args.kind, QuizKind::ListenAndType);
        assert!(args.config.data_is_remote());
        assert!(args.config.db_url.starts_with("sqlite://"));
    }

    #[test]
    fn rejects_unknown_kind_and_flags() {
        assert!(matches!(
            parse(&["--kind", "origami"]),
            Err(ArgsError::InvalidKind { .. })
        ));
        assert!(matches!(parse(&["--bogus"]), Err(ArgsError::UnknownArg(_))));
        assert!(matches!(
            parse(&["--db"]),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
    }

    #[test]
    fn memory_url_is_left_alone() {
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
        assert!(prepare_sqlite_file("sqlite::memory:").is_ok());
    }
}
