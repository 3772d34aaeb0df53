use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Args, Parser, Subcommand};
use directories::ProjectDirs;
use serde_json::Value as JsonValue;
use silksong_core::codec::{self, Mode};
use silksong_core::core_api::{Engine, Session};
use silksong_core::history::{DEFAULT_HISTORY_CAPACITY, FileStorage, RecentFiles};
use silksong_core::projector::{self, FLEA_FLAGS, FlagValue};
use silksong_render::{
    JsonStyle, render_flags_text, render_history_entry_text, render_history_json,
    render_history_text, render_session_json,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const HISTORY_ENV: &str = "SILKSONG_SE_HISTORY_PATH";
const HISTORY_FILE_NAME: &str = "history_v1.json";

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[arg(long, global = true, value_name = "PATH", env = HISTORY_ENV)]
    history_file: Option<PathBuf>,
    #[arg(long, global = true)]
    no_history: bool,
    #[arg(long, global = true, value_name = "N", default_value_t = DEFAULT_HISTORY_CAPACITY)]
    history_capacity: usize,
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode a save and print its canonical JSON document.
    Decode {
        #[command(flatten)]
        input: SaveInput,
        #[arg(short, long, value_name = "OUT")]
        output: Option<PathBuf>,
    },
    /// Encode a JSON document as a save file.
    Encode {
        #[arg(value_name = "JSON")]
        path: PathBuf,
        #[arg(long, value_name = "encrypted|plain", value_parser = parse_mode, default_value = "encrypted")]
        mode: Mode,
        #[arg(short, long, value_name = "OUT")]
        output: PathBuf,
    },
    /// Print the flea flag report of a save.
    Report {
        #[command(flatten)]
        input: SaveInput,
        #[arg(long)]
        json: bool,
        /// Print an aligned two-column table instead of the editable report.
        #[arg(long, conflicts_with = "json")]
        table: bool,
    },
    /// Merge an edited flag report into a save.
    Apply {
        #[command(flatten)]
        input: SaveInput,
        #[arg(long, value_name = "FILE")]
        report: PathBuf,
        #[command(flatten)]
        out: SaveOutput,
    },
    /// Set individual flags on a save.
    Set {
        #[command(flatten)]
        input: SaveInput,
        #[arg(
            long = "flag",
            value_name = "NAME=true|false|n/a",
            value_parser = parse_flag_assignment,
            required = true
        )]
        flags: Vec<(&'static str, FlagValue)>,
        #[command(flatten)]
        out: SaveOutput,
    },
    /// List the editable flags in report order.
    Flags,
    /// Inspect or edit the recent-files history.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Debug, Args)]
struct SaveInput {
    #[arg(value_name = "SAVE")]
    path: PathBuf,
    #[arg(long, value_name = "encrypted|plain", value_parser = parse_mode)]
    mode: Option<Mode>,
}

#[derive(Debug, Args)]
struct SaveOutput {
    #[arg(long = "output-mode", value_name = "encrypted|plain", value_parser = parse_mode)]
    output_mode: Option<Mode>,
    #[arg(short, long, value_name = "OUT")]
    output: PathBuf,
}

#[derive(Debug, Subcommand)]
enum HistoryAction {
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show an entry by fingerprint or unique fingerprint prefix.
    Show {
        #[arg(value_name = "FINGERPRINT")]
        fingerprint: String,
    },
    Remove {
        #[arg(value_name = "FINGERPRINT")]
        fingerprint: String,
    },
    Clear,
}

fn parse_mode(raw: &str) -> Result<Mode, String> {
    Mode::parse(raw).ok_or_else(|| format!("invalid mode '{raw}' (expected encrypted or plain)"))
}

fn parse_flag_assignment(raw: &str) -> Result<(&'static str, FlagValue), String> {
    let Some((name, value)) = raw.split_once('=') else {
        return Err(format!("expected NAME=VALUE, got '{raw}'"));
    };
    let flag = projector::lookup_flag(name.trim(), &FLEA_FLAGS)
        .ok_or_else(|| format!("'{}' is not an editable flag", name.trim()))?;
    let value = FlagValue::parse(value)
        .ok_or_else(|| format!("invalid value '{value}' (expected true, false or n/a)"))?;
    Ok((flag, value))
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Decode { input, output } => {
            let session = open_save(input);
            match output {
                Some(out_path) => {
                    let bytes = session.to_plain_bytes().unwrap_or_else(|e| {
                        eprintln!("Error rendering document: {e}");
                        process::exit(1);
                    });
                    write_output(out_path, &bytes);
                    println!("Wrote decoded document to {}", out_path.display());
                }
                None => println!("{}", session.working_text()),
            }
            record_history(&cli, &session, &input.path);
        }
        Command::Encode { path, mode, output } => {
            let text = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error reading {}: {e}", path.display());
                process::exit(1);
            });
            let bytes = codec::encode(&text, *mode).unwrap_or_else(|e| {
                eprintln!("Error encoding {}: {e}", path.display());
                process::exit(1);
            });
            write_output(output, &bytes);
            println!("Wrote {mode} save to {}", output.display());
        }
        Command::Report { input, json, table } => {
            let session = open_save(input);
            if *json {
                print_json(&render_session_json(&session, JsonStyle::CanonicalV1));
            } else if *table {
                let flags = session.flags().unwrap_or_else(|e| {
                    eprintln!("Error reading flags: {e}");
                    process::exit(1);
                });
                print!("{}", render_flags_text(&flags));
            } else {
                print!("{}", session.report());
            }
            record_history(&cli, &session, &input.path);
        }
        Command::Apply { input, report, out } => {
            let mut session = open_save(input);
            let report_text = fs::read_to_string(report).unwrap_or_else(|e| {
                eprintln!("Error reading {}: {e}", report.display());
                process::exit(1);
            });
            let applied = session.apply_report(&report_text).unwrap_or_else(|e| {
                eprintln!("Error applying report {}: {e}", report.display());
                process::exit(1);
            });
            debug!(applied, "report merged");
            write_session(&session, out);
            record_history(&cli, &session, &input.path);
        }
        Command::Set { input, flags, out } => {
            let mut session = open_save(input);
            for &(name, value) in flags {
                session.set_flag(name, value).unwrap_or_else(|e| {
                    eprintln!("Error setting {name}: {e}");
                    process::exit(1);
                });
            }
            write_session(&session, out);
            record_history(&cli, &session, &input.path);
        }
        Command::Flags => {
            for name in FLEA_FLAGS {
                println!("{name}");
            }
        }
        Command::History { action } => run_history(&cli, action),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_save(input: &SaveInput) -> Session {
    let bytes = fs::read(&input.path).unwrap_or_else(|e| {
        eprintln!("Error reading {}: {e}", input.path.display());
        process::exit(1);
    });

    Engine::new()
        .open_bytes(bytes, input.mode)
        .unwrap_or_else(|e| {
            eprintln!("Error decoding save file: {}", input.path.display());
            eprintln!("  {}", e);
            process::exit(1);
        })
}

fn write_session(session: &Session, out: &SaveOutput) {
    let mode = out.output_mode.unwrap_or(session.mode());
    let bytes = session.to_bytes(mode).unwrap_or_else(|e| {
        eprintln!("Error creating modified save bytes: {e}");
        process::exit(1);
    });
    write_output(&out.output, &bytes);
    println!("Wrote edited {mode} save to {}", out.output.display());
}

fn write_output(path: &Path, bytes: &[u8]) {
    fs::write(path, bytes).unwrap_or_else(|e| {
        eprintln!("Error writing {}: {e}", path.display());
        process::exit(1);
    });
}

fn print_json(value: &JsonValue) {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error rendering JSON output: {e}");
        process::exit(1);
    });
    println!("{rendered}");
}

fn history_path(cli: &Cli) -> Option<PathBuf> {
    cli.history_file.clone().or_else(|| {
        ProjectDirs::from("io", "silksong-se", "silksong-se")
            .map(|dirs| dirs.data_dir().join(HISTORY_FILE_NAME))
    })
}

fn open_history(cli: &Cli) -> Option<RecentFiles<FileStorage>> {
    let storage = FileStorage::new(history_path(cli)?);
    debug!(path = %storage.path().display(), "using history file");
    Some(RecentFiles::open(storage, cli.history_capacity))
}

fn record_history(cli: &Cli, session: &Session, source: &Path) {
    if cli.no_history {
        return;
    }
    let Some(mut history) = open_history(cli) else {
        warn!("no history location available, not recording");
        return;
    };
    let display_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string());
    history.insert(session.history_entry(display_name, now_ms()));
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| u64::try_from(d.as_millis()).ok())
        .unwrap_or_default()
}

fn run_history(cli: &Cli, action: &HistoryAction) {
    let mut history = open_history(cli).unwrap_or_else(|| {
        eprintln!("No history location available; pass --history-file or set {HISTORY_ENV}");
        process::exit(1);
    });

    match action {
        HistoryAction::List { json } => {
            if *json {
                print_json(&render_history_json(history.list(), JsonStyle::CanonicalV1));
            } else {
                print!("{}", render_history_text(history.list()));
            }
        }
        HistoryAction::Show { fingerprint } => {
            let entry = history.list().find_by_prefix(fingerprint).unwrap_or_else(|| {
                eprintln!("No single history entry matches '{fingerprint}'");
                process::exit(1);
            });
            print!("{}", render_history_entry_text(entry));
        }
        HistoryAction::Remove { fingerprint } => {
            let target = history
                .list()
                .find_by_prefix(fingerprint)
                .map(|entry| entry.fingerprint.clone())
                .unwrap_or_else(|| {
                    eprintln!("No single history entry matches '{fingerprint}'");
                    process::exit(1);
                });
            history.remove(&target);
            println!("Removed {}", target.short());
        }
        HistoryAction::Clear => {
            history.clear();
            println!("History cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_flag_assignment, parse_mode};
    use silksong_core::codec::Mode;
    use silksong_core::projector::FlagValue;

    #[test]
    fn flag_assignment_accepts_known_flags() {
        assert_eq!(
            parse_flag_assignment("SavedFlea_Bone_06=TRUE"),
            Ok(("SavedFlea_Bone_06", FlagValue::True))
        );
        assert_eq!(
            parse_flag_assignment("tamedGiantFlea=n/a"),
            Ok(("tamedGiantFlea", FlagValue::Absent))
        );
    }

    #[test]
    fn flag_assignment_rejects_unknown_names_and_values() {
        assert!(parse_flag_assignment("geo=true").is_err());
        assert!(parse_flag_assignment("SavedFlea_Bone_06=yes").is_err());
        assert!(parse_flag_assignment("SavedFlea_Bone_06").is_err());
    }

    #[test]
    fn mode_aliases() {
        assert_eq!(parse_mode("json"), Ok(Mode::Plain));
        assert_eq!(parse_mode("dat"), Ok(Mode::Encrypted));
        assert!(parse_mode("zip").is_err());
    }
}
