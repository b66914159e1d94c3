//! `lft-tags` — command-line front end for the tag store.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config, apply `--db` override
//!   3. Init logger at the configured level
//!   4. Open the store, run one command, print JSON to stdout
//!
//! # Usage
//!
//! ```text
//! lft-tags [--db <path>] <command> [args]
//! ```
//!
//! Database path resolution order:
//!   1. `--db <path>` flag
//!   2. `$LFT_DB_PATH`
//!   3. `[store].db_path` in `config/default.toml`
//!   4. `data/tags.db`

use std::path::{Path, PathBuf};
use std::process;

use serde_json::{Value, json};
use tracing::info;

use lft_tags::groups::ExclusiveGroups;
use lft_tags::{AppError, TagStore, config, logger};

/// Label that, passed to `rename`, deletes the tag instead.
const DELETE_SENTINEL: &str = "-";

// ── CLI arg parsing ────────────────────────────────────────────────────────

struct Args {
    db: Option<String>,
    command: Option<String>,
    rest: Vec<String>,
}

fn parse_args() -> Args {
    let mut db = None;
    let mut command = None;
    let mut rest = Vec::new();
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--db" | "-d" if command.is_none() => {
                db = iter.next();
            }
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--" => {
                rest.extend(iter);
                break;
            }
            _ if command.is_none() => command = Some(arg),
            _ => rest.push(arg),
        }
    }

    Args { db, command, rest }
}

fn print_help() {
    eprintln!("usage: lft-tags [--db <path>] <command> [args]");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  tags [type]                list tags, optionally of one type");
    eprintln!("  tags-for <path>            tags linked to a file");
    eprintln!("  files-for <id>...          files carrying all given tags");
    eprintln!("  files                      every known file with its tags");
    eprintln!("  create <type> <label>      create or fetch a tag");
    eprintln!("  link <path> <id>           link a tag to a file");
    eprintln!("  unlink <path> <id>         unlink a tag from a file");
    eprintln!("  unlink-all <path>          remove every tag from a file");
    eprintln!("  rename <id> <label>        rename a tag ('-' deletes it)");
    eprintln!("  delete <id>                delete a tag");
    eprintln!("  rate <path> <1-5>          set a file's rating");
    eprintln!("  recount                    recompute every tag counter");
    eprintln!();
    eprintln!("flags:");
    eprintln!("  --db, -d <path>   override database path");
    eprintln!("  --help, -h        print this help");
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    // Load .env if present — the file is optional.
    let _ = dotenvy::dotenv();

    let args = parse_args();
    let Some(command) = args.command else {
        print_help();
        process::exit(2);
    };

    let mut config = config::load()?;
    if let Some(db) = args.db.as_deref() {
        config.db_path = config::expand_home(db);
    }
    logger::init(&config.log_level, false)?;
    info!(db_path = %config.db_path.display(), command = %command, "starting");

    let store = TagStore::open(&config.db_path)?;
    let groups = ExclusiveGroups::new(&store, config.exclusive_types.iter().cloned());

    let out = dispatch(&store, &groups, &command, &args.rest)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&out)
            .map_err(|e| AppError::InvalidInput(format!("encode output: {e}")))?
    );
    Ok(())
}

fn dispatch(
    store: &TagStore,
    groups: &ExclusiveGroups<'_>,
    command: &str,
    rest: &[String],
) -> Result<Value, AppError> {
    let out = match (command, rest) {
        ("tags", []) => json!({ "tags": store.list_tags(None)? }),
        ("tags", [kind]) => json!({ "tags": store.list_tags(Some(kind.as_str()))? }),
        ("tags-for", [path]) => json!({ "tags": store.tags_for(Path::new(path))? }),
        ("files-for", ids) if !ids.is_empty() => {
            let ids = ids.iter().map(|s| parse_id(s)).collect::<Result<Vec<_>, _>>()?;
            json!({ "files": store.files_for_all(&ids)? })
        }
        ("files", []) => json!({ "files": store.all_files_with_tags()? }),
        ("create", [kind, label]) => {
            let id = store.get_or_create_tag(kind, label)?;
            json!({ "success": true, "tag": store.get_tag(id)? })
        }
        ("link", [path, id]) => {
            let success = store.link(&PathBuf::from(path), parse_id(id)?)?;
            let message = if success { "Tag added to file" } else { "Tag already exists on file" };
            json!({ "success": success, "message": message })
        }
        ("unlink", [path, id]) => {
            let success = store.unlink(&PathBuf::from(path), parse_id(id)?)?;
            let message = if success { "Tag removed from file" } else { "Tag not found on file" };
            json!({ "success": success, "message": message })
        }
        ("unlink-all", [path]) => json!({ "removed": store.unlink_all(Path::new(path))? }),
        ("rename", [id, label]) if label.as_str() == DELETE_SENTINEL => {
            let success = store.delete_tag(parse_id(id)?)?;
            json!({ "success": success, "deleted": true })
        }
        ("rename", [id, label]) => {
            let success = store.rename_tag(parse_id(id)?, label)?;
            json!({ "success": success })
        }
        ("delete", [id]) => json!({ "success": store.delete_tag(parse_id(id)?)? }),
        ("rate", [path, stars]) => {
            let stars: u8 = stars
                .parse()
                .map_err(|_| AppError::InvalidInput(format!("not a rating: '{stars}'")))?;
            let assignment = groups.set_rating(Path::new(path), stars)?;
            json!({ "success": true, "linked": assignment.linked, "replaced": assignment.replaced })
        }
        ("recount", []) => json!({ "recounted": store.recount_all()? }),
        _ => {
            return Err(AppError::InvalidInput(format!(
                "unknown command or wrong arguments: {command} {}",
                rest.join(" ")
            )));
        }
    };
    Ok(out)
}

fn parse_id(s: &str) -> Result<i64, AppError> {
    s.parse()
        .map_err(|_| AppError::InvalidInput(format!("not a tag id: '{s}'")))
}
