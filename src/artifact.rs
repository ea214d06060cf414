use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};

use crate::error::ComposeError;
use crate::paths::{resolve_location, same_location};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeOutcome {
    Composed { bytes: usize },
    /// The completion marker matched the target; nothing was written.
    AlreadyComposed,
}

/// Copies the compiled module verbatim, replacing any previous copy.
pub fn copy_binary(source: &Path, destination: &Path) -> Result<u64, ComposeError> {
    if let Err(e) = fs::metadata(source) {
        return Err(if e.kind() == io::ErrorKind::NotFound {
            ComposeError::MissingSource {
                path: source.to_path_buf(),
            }
        } else {
            ComposeError::io(source, e)
        });
    }

    let bytes = fs::copy(source, destination).map_err(|e| ComposeError::io(destination, e))?;
    log::info!(
        "Copied {} -> {} ({bytes} bytes)",
        source.display(),
        destination.display()
    );
    Ok(bytes)
}

pub fn compose_text(prefix: &str, target: &str) -> String {
    let mut composed = String::with_capacity(prefix.len() + 1 + target.len());
    composed.push_str(prefix);
    composed.push('\n');
    composed.push_str(target);
    composed
}

/// Prepends `prefix` to `target` and writes the result to `output`.
///
/// When `output` is the target itself, a marker in `marker_dir` holding the
/// digest of the written script makes a repeated run a no-op until the target
/// is regenerated. `force` skips that check.
pub fn compose_scripts(
    prefix: &Path,
    target: &Path,
    output: &Path,
    marker_dir: &Path,
    force: bool,
) -> Result<ComposeOutcome, ComposeError> {
    let prefix_source = read_text(prefix)?;
    let target_source = read_text(target)?;

    let marker = completion_marker(marker_dir, output);
    if !force && same_location(output, target) && marker_matches(&marker, &target_source)? {
        log::warn!(
            "{} was already composed with {}; skipping (use --force to compose again)",
            target.display(),
            prefix.display()
        );
        return Ok(ComposeOutcome::AlreadyComposed);
    }

    let composed = compose_text(&prefix_source, &target_source);

    // The marker lands before the output so a crash in between leaves a
    // marker that no longer matches the untouched target.
    let staging = stage(output, composed.as_bytes())?;
    let recorded = fs::create_dir_all(marker_dir)
        .map_err(|e| ComposeError::io(marker_dir, e))
        .and_then(|()| write_atomically(&marker, digest(&composed).as_bytes()));
    if let Err(e) = recorded {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }
    fs::rename(&staging, output).map_err(|e| ComposeError::io(output, e))?;

    log::info!(
        "Wrote {} ({} bytes of prefix, {} bytes of target)",
        output.display(),
        prefix_source.len(),
        target_source.len()
    );
    Ok(ComposeOutcome::Composed {
        bytes: composed.len(),
    })
}

/// Marker file for `output`, keyed by its resolved location so outputs with
/// the same file name in different directories do not collide.
pub fn completion_marker(marker_dir: &Path, output: &Path) -> PathBuf {
    let location = resolve_location(output);
    let key = digest(&location.to_string_lossy());
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    marker_dir.join(format!("{name}-{}.composed", &key[..12]))
}

fn read_text(path: &Path) -> Result<String, ComposeError> {
    fs::read_to_string(path).map_err(|e| ComposeError::io(path, e))
}

fn marker_matches(marker: &Path, current: &str) -> Result<bool, ComposeError> {
    match fs::read_to_string(marker) {
        Ok(recorded) => Ok(recorded.trim() == digest(current)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ComposeError::io(marker, e)),
    }
}

fn digest(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

fn stage(path: &Path, contents: &[u8]) -> Result<PathBuf, ComposeError> {
    let staging = with_suffix(path, ".tmp");
    let written = File::create(&staging).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&staging);
        return Err(ComposeError::io(&staging, e));
    }
    Ok(staging)
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), ComposeError> {
    let staging = stage(path, contents)?;
    fs::rename(&staging, path).map_err(|e| ComposeError::io(path, e))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
