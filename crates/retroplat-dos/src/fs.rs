//! Base and preference paths.
//!
//! DOS has no per-user directories, so preferences live next to the executable. Paths use `/`
//! separators throughout; DOS accepts them and the rest of the host expects them.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::app::argv0;
use crate::{DosError, Result};

/// Directory containing the running program, with a trailing `/`.
pub fn base_path() -> Result<String> {
    let argv0 = argv0().ok_or(DosError::NoArgv0)?;
    base_path_of(&argv0)
}

/// Resolve `argv0` like DJGPP's `searchpath()` and return its directory.
pub fn base_path_of(argv0: &str) -> Result<String> {
    let found = search_path(argv0).ok_or_else(|| DosError::ProgramNotFound(argv0.to_string()))?;
    Ok(directory_of(&found.to_string_lossy()))
}

/// Normalize separators to `/` and cut everything after the last one.
pub fn directory_of(path: &str) -> String {
    let mut out = path.replace('\\', "/");
    if let Some(idx) = out.rfind('/') {
        out.truncate(idx + 1);
    }
    out
}

/// Locate a program: as given (relative to the current directory), then on `PATH` when the name
/// has no directory part. `.exe` is tried when the bare name does not exist.
pub fn search_path(name: &str) -> Option<PathBuf> {
    let candidates = |p: PathBuf| -> Option<PathBuf> {
        if p.is_file() {
            return Some(p);
        }
        let exe = p.with_extension("exe");
        exe.is_file().then_some(exe)
    };

    let direct = Path::new(name);
    if let Some(found) = candidates(direct.to_path_buf()) {
        return Some(absolute(found));
    }

    let has_dir = name.contains(['/', '\\', ':']);
    if has_dir {
        return None;
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| candidates(dir.join(name)))
        .map(absolute)
}

fn absolute(p: PathBuf) -> PathBuf {
    if p.is_absolute() {
        return p;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(p),
        Err(_) => p,
    }
}

/// `base/org/app/` (or `base/app/` with no organization), created if missing.
pub fn pref_path(org: Option<&str>, app: &str) -> Result<String> {
    pref_path_in(&base_path()?, org, app)
}

pub fn pref_path_in(base: &str, org: Option<&str>, app: &str) -> Result<String> {
    if app.is_empty() {
        return Err(DosError::InvalidParam("app"));
    }
    let org = org.unwrap_or("");
    let result = if org.is_empty() {
        format!("{base}{app}/")
    } else {
        make_dir(&format!("{base}{org}"));
        format!("{base}{org}/{app}/")
    };
    make_dir(&result);
    Ok(result)
}

// Failure is left for the caller to discover when it opens files there.
fn make_dir(path: &str) {
    if let Err(err) = std::fs::create_dir(path) {
        if err.kind() != std::io::ErrorKind::AlreadyExists {
            debug!(path, %err, "mkdir failed");
        }
    }
}
