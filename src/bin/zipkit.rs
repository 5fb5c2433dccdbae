//! Command-line front-end for `zipkit`. Thin consumer of the library: list,
//! extract, create/append, and standalone gzip/gunzip.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;

use log::{error, warn};
use zipkit::codec::deflate::{compress_bound, gzip_wrap, Deflater, Inflater};
use zipkit::codec::{compress_all, decompress_all};
use zipkit::crc32;
use zipkit::{Archive, ArchiveConfig, BufferSource, ZipKitError};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PathPolicy {
    Reject,
    Strip,
    Allow,
}

fn main() -> ExitCode {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            error!("{msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let Some(command) = args.first() else {
        print_usage();
        return Err("no command given".into());
    };

    match command.as_str() {
        "-h" | "--help" => {
            print_usage();
            Ok(())
        }
        "-v" | "--version" => {
            println!("zipkit {VERSION}");
            Ok(())
        }
        "-l" => cmd_list(&args[1..]),
        "-x" => cmd_extract(&args[1..]),
        "-c" => cmd_create(&args[1..], false),
        "-a" => cmd_create(&args[1..], true),
        "-g" => cmd_gzip(&args[1..]),
        "-d" => cmd_gunzip(&args[1..]),
        other => {
            print_usage();
            Err(format!("unrecognized command: {other}"))
        }
    }
}

fn print_usage() {
    eprintln!(
        "usage:\n\
         \x20 zipkit -l <archive>\n\
         \x20 zipkit -x <archive> [-P reject|strip|allow] [--verify-crc] [--ignore-zipbomb] [-f] [out_dir]\n\
         \x20 zipkit -c <archive> <files...> [-z <method>]\n\
         \x20 zipkit -a <archive> <files...> [-z <method>]\n\
         \x20 zipkit -g <input> [output]\n\
         \x20 zipkit -d <input> [output]\n\
         \x20 zipkit -v | -h"
    );
}

fn cmd_list(args: &[String]) -> Result<(), String> {
    let archive_path = args.first().ok_or("missing <archive>")?;
    let mut archive = Archive::open_read(archive_path, ArchiveConfig::default())
        .map_err(|e| e.to_string())?;
    for index in 0..archive.num_entries() as usize {
        let stat = archive.stat(index).map_err(|e| e.to_string())?;
        println!(
            "{:>12} {:>12} {:>4} {}",
            stat.uncompressed_size,
            stat.compressed_size,
            stat.method,
            String::from_utf8_lossy(&stat.name)
        );
    }
    Ok(())
}

fn cmd_extract(args: &[String]) -> Result<(), String> {
    let mut archive_path = None;
    let mut out_dir = PathBuf::from(".");
    let mut policy = PathPolicy::Reject;
    let mut verify_crc = false;
    let mut ignore_zipbomb = false;
    let mut force = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-P" => {
                i += 1;
                policy = match args.get(i).map(String::as_str) {
                    Some("reject") => PathPolicy::Reject,
                    Some("strip") => PathPolicy::Strip,
                    Some("allow") => PathPolicy::Allow,
                    other => return Err(format!("invalid -P value: {other:?}")),
                };
            }
            "--verify-crc" => verify_crc = true,
            "--ignore-zipbomb" => ignore_zipbomb = true,
            "-f" | "--force" => force = true,
            other if archive_path.is_none() => archive_path = Some(other.to_string()),
            other => out_dir = PathBuf::from(other),
        }
        i += 1;
    }
    let archive_path = archive_path.ok_or("missing <archive>")?;

    let config = ArchiveConfig {
        strict_crc: verify_crc,
        ignore_zipbomb,
        ..ArchiveConfig::default()
    };
    let mut archive = Archive::open_read(&archive_path, config).map_err(|e| e.to_string())?;

    let mut had_failure = false;
    for index in 0..archive.num_entries() as usize {
        let stat = archive.stat(index).map_err(|e| e.to_string())?;
        let dest = match resolve_entry_path(&out_dir, &stat.name, policy) {
            Some(p) => p,
            None => {
                warn!(
                    "skipping entry with unsafe path: {}",
                    String::from_utf8_lossy(&stat.name)
                );
                had_failure = true;
                continue;
            }
        };

        if dest.exists() && !force {
            error!("refusing to overwrite existing file: {}", dest.display());
            had_failure = true;
            continue;
        }

        match archive.open_index(index) {
            Ok(opened) => {
                if let Some(parent) = dest.parent() {
                    if let Err(e) = fs::create_dir_all(parent) {
                        error!("failed to create {}: {e}", parent.display());
                        had_failure = true;
                        continue;
                    }
                }
                if let Err(e) = fs::write(&dest, opened.bytes()) {
                    error!("failed to write {}: {e}", dest.display());
                    had_failure = true;
                }
            }
            Err(e) => {
                error!(
                    "failed to extract {}: {e}",
                    String::from_utf8_lossy(&stat.name)
                );
                had_failure = true;
            }
        }
    }

    if had_failure {
        Err("one or more entries failed to extract".into())
    } else {
        Ok(())
    }
}

/// Applies the `-P` path-traversal policy to an entry name before it is
/// joined to the extraction root. `reject` and `strip` both refuse absolute
/// paths; `strip` additionally discards any `..`/`.` components instead of
/// failing the whole entry.
fn resolve_entry_path(out_dir: &Path, name: &[u8], policy: PathPolicy) -> Option<PathBuf> {
    let name = String::from_utf8_lossy(name);
    let raw = Path::new(name.as_ref());

    let mut has_parent_ref = false;
    let mut is_absolute = false;
    let mut clean = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::ParentDir => has_parent_ref = true,
            Component::RootDir | Component::Prefix(_) => is_absolute = true,
            Component::CurDir => {}
        }
    }

    match policy {
        PathPolicy::Reject => {
            if has_parent_ref || is_absolute {
                None
            } else {
                Some(out_dir.join(clean))
            }
        }
        PathPolicy::Strip => Some(out_dir.join(clean)),
        PathPolicy::Allow => Some(out_dir.join(raw)),
    }
}

fn cmd_create(args: &[String], append: bool) -> Result<(), String> {
    let mut archive_path = None;
    let mut files = Vec::new();
    let mut method: u16 = 8;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-z" => {
                i += 1;
                method = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .ok_or("invalid -z <method>")?;
            }
            other if archive_path.is_none() => archive_path = Some(other.to_string()),
            other => files.push(other.to_string()),
        }
        i += 1;
    }
    let archive_path = archive_path.ok_or("missing <archive>")?;
    if files.is_empty() {
        return Err("no input files given".into());
    }

    let mut archive = if append {
        Archive::open_append(&archive_path, ArchiveConfig::default())
            .map_err(|e| e.to_string())?
    } else {
        Archive::open_write_new(&archive_path, ArchiveConfig::default())
            .map_err(|e| e.to_string())?
    };

    let mut had_failure = false;
    for path in &files {
        match fs::read(path) {
            Ok(bytes) => {
                let name = Path::new(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.clone());
                if let Err(e) = archive.add(name.as_bytes(), BufferSource::owned(bytes), Some(method)) {
                    error!("failed to add {path}: {e}");
                    had_failure = true;
                }
            }
            Err(e) => {
                error!("failed to read {path}: {e}");
                had_failure = true;
            }
        }
    }

    archive.close().map_err(|e| e.to_string())?;
    if had_failure {
        Err("one or more files failed to add".into())
    } else {
        Ok(())
    }
}

fn cmd_gzip(args: &[String]) -> Result<(), String> {
    let input = args.first().ok_or("missing <input>")?;
    let output = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| format!("{input}.gz"));

    let data = fs::read(input).map_err(|e| format!("failed to read {input}: {e}"))?;
    let crc = crc32::checksum(&data);
    let mut deflater = Deflater::new_raw(-1);
    let raw = compress_all(&mut deflater, &data, compress_bound(data.len()))
        .map_err(|e: ZipKitError| e.to_string())?;
    let wrapped = gzip_wrap(&raw, crc, data.len() as u64);
    fs::write(&output, wrapped).map_err(|e| format!("failed to write {output}: {e}"))
}

fn cmd_gunzip(args: &[String]) -> Result<(), String> {
    let input = args.first().ok_or("missing <input>")?;
    let output = args.get(1).cloned().unwrap_or_else(|| {
        input
            .strip_suffix(".gz")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{input}.out"))
    });

    let data = fs::read(input).map_err(|e| format!("failed to read {input}: {e}"))?;
    if data.len() < 18 {
        return Err("input too short to be a gzip member".into());
    }
    let isize_field = u32::from_le_bytes(data[data.len() - 4..].try_into().unwrap()) as usize;
    let mut inflater = Inflater::new(zipkit::codec::deflate::WindowMode::Gzip);
    let decoded = decompress_all(&mut inflater, &data, isize_field)
        .map_err(|e: ZipKitError| e.to_string())?;
    fs::write(&output, decoded).map_err(|e| format!("failed to write {output}: {e}"))
}
