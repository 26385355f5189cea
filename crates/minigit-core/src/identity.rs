//! Identity and clock collaborators (spec.md §6).
//!
//! Author/committer identity and the current time are external inputs the
//! core needs but does not own the source of truth for. This module reads
//! them from the environment, falling back to a minimal `<git-dir>/config`
//! line format (see SPEC_FULL.md "Configuration").

use std::path::Path;

use chrono::Local;

use crate::error::Error;
use crate::types::Identity;

/// Resolve the author identity: `MINIGIT_AUTHOR_NAME`/`MINIGIT_AUTHOR_EMAIL`,
/// falling back to `name=`/`email=` lines in `<git-dir>/config`.
pub fn author(git_dir: &Path) -> Result<Identity, Error> {
    resolve(git_dir, "MINIGIT_AUTHOR_NAME", "MINIGIT_AUTHOR_EMAIL")
}

/// Resolve the committer identity: `MINIGIT_COMMITTER_NAME`/`MINIGIT_COMMITTER_EMAIL`,
/// falling back to the author identity.
pub fn committer(git_dir: &Path) -> Result<Identity, Error> {
    match (
        std::env::var("MINIGIT_COMMITTER_NAME"),
        std::env::var("MINIGIT_COMMITTER_EMAIL"),
    ) {
        (Ok(name), Ok(email)) => {
            let (timestamp, tz_offset) = now();
            Ok(Identity {
                name,
                email,
                timestamp,
                tz_offset,
            })
        }
        _ => author(git_dir),
    }
}

fn resolve(git_dir: &Path, name_var: &str, email_var: &str) -> Result<Identity, Error> {
    let (timestamp, tz_offset) = now();
    if let (Ok(name), Ok(email)) = (std::env::var(name_var), std::env::var(email_var)) {
        return Ok(Identity {
            name,
            email,
            timestamp,
            tz_offset,
        });
    }
    let (name, email) = read_config_identity(git_dir)?;
    match (name, email) {
        (Some(name), Some(email)) => Ok(Identity {
            name,
            email,
            timestamp,
            tz_offset,
        }),
        _ => Err(Error::BackendError {
            message: format!(
                "no identity available: set {name_var}/{email_var} or add name=/email= lines to {}",
                git_dir.join("config").display()
            ),
        }),
    }
}

fn read_config_identity(git_dir: &Path) -> Result<(Option<String>, Option<String>), Error> {
    let path = git_dir.join("config");
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return Ok((None, None));
    };
    let mut name = None;
    let mut email = None;
    for line in contents.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("name=") {
            name = Some(value.trim().to_owned());
        } else if let Some(value) = line.strip_prefix("email=") {
            email = Some(value.trim().to_owned());
        }
    }
    Ok((name, email))
}

/// The clock collaborator: unix seconds and a local `±HHMM` offset.
#[must_use]
pub fn now() -> (i64, String) {
    let local = Local::now();
    let timestamp = local.timestamp();
    let offset_seconds = local.offset().local_minus_utc();
    let sign = if offset_seconds < 0 { '-' } else { '+' };
    let abs = offset_seconds.unsigned_abs();
    let hours = abs / 3600;
    let minutes = (abs % 3600) / 60;
    (timestamp, format!("{sign}{hours:02}{minutes:02}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tz_offset_is_four_digits() {
        let (_, offset) = now();
        assert_eq!(offset.len(), 5);
        assert!(offset.starts_with('+') || offset.starts_with('-'));
    }

    #[test]
    fn config_identity_parses_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config"), "name=Grace Hopper\nemail=grace@example.com\n")
            .unwrap();
        let (name, email) = read_config_identity(dir.path()).unwrap();
        assert_eq!(name.as_deref(), Some("Grace Hopper"));
        assert_eq!(email.as_deref(), Some("grace@example.com"));
    }
}
