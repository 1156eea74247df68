//! track-stats - command line access to the track statistics store

use std::path::PathBuf;

use anyhow::{Context, bail};
use track_stats::database::{Database, DbTrack, new_track_id};
use track_stats::settings::Settings;

const USAGE: &str = "\
Usage: track-stats [--db <file>] <command>

Commands:
  migrate                 Apply pending schema steps
  revert                  Undo the most recent schema step
  status                  List applied schema steps
  add <path> [uuid]       Register a track
  play <uuid> <minutes>   Record a play
  move <uuid> <path>      Change a track's path
  remove <uuid>           Delete a track and its statistics
  reset <uuid>            Zero a track's statistics
  show <uuid>             Print one track
  list                    Print all tracks";

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Migrate,
    Revert,
    Status,
    Add { path: String, uuid: Option<String> },
    Play { uuid: String, minutes: f64 },
    Move { uuid: String, path: String },
    Remove { uuid: String },
    Reset { uuid: String },
    Show { uuid: String },
    List,
    Help,
}

/// Split off `--db <file>` and parse the remaining words
fn parse_args(mut args: Vec<String>) -> anyhow::Result<(Option<PathBuf>, Command)> {
    let mut db_path = None;
    if let Some(pos) = args.iter().position(|a| a == "--db") {
        args.remove(pos);
        if pos >= args.len() {
            bail!("--db requires a file path");
        }
        db_path = Some(PathBuf::from(args.remove(pos)));
    }

    let words: Vec<&str> = args.iter().map(String::as_str).collect();
    let command = match words.as_slice() {
        [] | ["help"] | ["--help"] | ["-h"] => Command::Help,
        ["migrate"] => Command::Migrate,
        ["revert"] => Command::Revert,
        ["status"] => Command::Status,
        ["add", path] => Command::Add {
            path: path.to_string(),
            uuid: None,
        },
        ["add", path, uuid] => Command::Add {
            path: path.to_string(),
            uuid: Some(uuid.to_string()),
        },
        ["play", uuid, minutes] => Command::Play {
            uuid: uuid.to_string(),
            minutes: minutes
                .parse()
                .with_context(|| format!("invalid minutes `{}`", minutes))?,
        },
        ["move", uuid, path] => Command::Move {
            uuid: uuid.to_string(),
            path: path.to_string(),
        },
        ["remove", uuid] => Command::Remove {
            uuid: uuid.to_string(),
        },
        ["reset", uuid] => Command::Reset {
            uuid: uuid.to_string(),
        },
        ["show", uuid] => Command::Show {
            uuid: uuid.to_string(),
        },
        ["list"] => Command::List,
        _ => bail!("unrecognized arguments: {}\n\n{}", args.join(" "), USAGE),
    };

    Ok((db_path, command))
}

fn print_track(track: &DbTrack) {
    println!(
        "{}\t{}\t{}\t{:.2}",
        track.uuid, track.path, track.play_count, track.play_minutes
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let (db_path, command) = parse_args(std::env::args().skip(1).collect())?;
    if command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut settings = Settings::load();
    if db_path.is_some() {
        settings.database_path = db_path;
    }

    // Schema commands must not implicitly migrate
    let db = match command {
        Command::Migrate | Command::Revert | Command::Status => {
            Database::connect(&settings).await?
        }
        _ => Database::open(&settings).await?,
    };

    match command {
        Command::Migrate => {
            let applied = db.apply_schema().await?;
            println!("{} step(s) applied", applied);
        }
        Command::Revert => match db.revert_schema().await? {
            Some(name) => println!("reverted {}", name),
            None => println!("nothing to revert"),
        },
        Command::Status => {
            for migration in db.applied_migrations().await? {
                println!(
                    "{}_{}\tapplied at {}",
                    migration.version, migration.name, migration.applied_at
                );
            }
        }
        Command::Add { path, uuid } => {
            let uuid = uuid.unwrap_or_else(new_track_id);
            print_track(&db.insert_track(&uuid, &path).await?);
        }
        Command::Play { uuid, minutes } => {
            print_track(&db.record_play(&uuid, minutes).await?);
        }
        Command::Move { uuid, path } => db.update_path(&uuid, &path).await?,
        Command::Remove { uuid } => {
            if !db.delete_track(&uuid).await? {
                println!("no track {}", uuid);
            }
        }
        Command::Reset { uuid } => db.reset_play_stats(&uuid).await?,
        Command::Show { uuid } => {
            let track = db
                .get_track(&uuid)
                .await?
                .with_context(|| format!("no track {}", uuid))?;
            print_track(&track);
        }
        Command::List => {
            for track in db.get_all_tracks().await? {
                print_track(&track);
            }
        }
        Command::Help => {}
    }

    db.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_args(args(&[])).unwrap().1, Command::Help);
        assert_eq!(parse_args(args(&["migrate"])).unwrap().1, Command::Migrate);
        assert_eq!(
            parse_args(args(&["play", "t1", "3.5"])).unwrap().1,
            Command::Play {
                uuid: "t1".to_string(),
                minutes: 3.5
            }
        );
        assert_eq!(
            parse_args(args(&["add", "/music/a.mp3"])).unwrap().1,
            Command::Add {
                path: "/music/a.mp3".to_string(),
                uuid: None
            }
        );
    }

    #[test]
    fn test_parse_db_option_anywhere() {
        let (db, command) = parse_args(args(&["list", "--db", "/tmp/t.db"])).unwrap();
        assert_eq!(db, Some(PathBuf::from("/tmp/t.db")));
        assert_eq!(command, Command::List);

        assert!(parse_args(args(&["list", "--db"])).is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_args(args(&["play", "t1", "abc"])).is_err());
        assert!(parse_args(args(&["frobnicate"])).is_err());
        assert!(parse_args(args(&["remove"])).is_err());
    }
}
