//! Utility functions for error handling
//!
//! File helpers that attach the path and the purpose of the access to every
//! IO failure, plus atomic artifact writing.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// Safely open a file with rich error information
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.exists() {
        return Err(PipelineError::io(
            format!("file not found, needed for {purpose}"),
            path,
            io::Error::from(io::ErrorKind::NotFound),
        ));
    }

    if !path.is_file() {
        return Err(PipelineError::io(
            format!("path is not a file, expected a file for {purpose}"),
            path,
            io::Error::from(io::ErrorKind::InvalidInput),
        ));
    }

    fs::File::open(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => "permission denied - check file permissions".to_string(),
            _ => format!("failed to open file for {purpose}"),
        };
        PipelineError::io(context, path, e)
    })
}

/// Safely read a file to string with rich error information
pub fn safe_read_to_string(path: &Path, purpose: &str) -> Result<String> {
    let mut file = safe_open_file(path, purpose)?;

    let mut content = String::new();
    io::Read::read_to_string(&mut file, &mut content).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::InvalidData => {
                "file contains invalid UTF-8 data - cannot read as text".to_string()
            }
            _ => format!("failed to read file content for {purpose}"),
        };
        PipelineError::io(context, path, e)
    })?;

    Ok(content)
}

/// Create a directory (and parents) if it does not exist yet
pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| PipelineError::io("failed to create directory", path, e))
}

/// Write a file through a sibling temp file and rename it into place
///
/// Readers never observe a half-written artifact: either the old file (or no
/// file) or the complete new one.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<fs::File>) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }

    let tmp_path = temp_path_for(path);
    let file = fs::File::create(&tmp_path)
        .map_err(|e| PipelineError::io("failed to create temp file", &tmp_path, e))?;
    let mut writer = BufWriter::new(file);

    let written = write(&mut writer).and_then(|()| {
        writer
            .flush()
            .map_err(|e| PipelineError::io("failed to flush temp file", &tmp_path, e))
    });
    drop(writer);

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        PipelineError::io("failed to move temp file into place", path, e)
    })
}

/// Write several files so that either all of them are replaced or none is
///
/// Every file is staged to a sibling temp file first. Renames start only once
/// all files are staged; if one fails, the files already moved into place are
/// removed so no partial set is left behind.
pub fn write_all_atomically(files: &[(&Path, &[u8])]) -> Result<()> {
    let mut staged: Vec<(PathBuf, &Path)> = Vec::with_capacity(files.len());

    for &(path, content) in files {
        let tmp_path = temp_path_for(path);
        let staging = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or(Ok(()), ensure_directory)
            .and_then(|()| {
                fs::write(&tmp_path, content)
                    .map_err(|e| PipelineError::io("failed to stage file", &tmp_path, e))
            });
        if let Err(e) = staging {
            remove_quietly(std::iter::once(tmp_path.as_path()));
            remove_quietly(staged.iter().map(|(tmp, _)| tmp.as_path()));
            return Err(e);
        }
        staged.push((tmp_path, path));
    }

    for (position, (tmp_path, path)) in staged.iter().enumerate() {
        if let Err(e) = fs::rename(tmp_path, path) {
            remove_quietly(staged[..position].iter().map(|(_, done)| *done));
            remove_quietly(staged[position..].iter().map(|(pending, _)| pending.as_path()));
            return Err(PipelineError::io("failed to move staged file into place", *path, e));
        }
    }
    Ok(())
}

fn remove_quietly<'a>(paths: impl Iterator<Item = &'a Path>) {
    for path in paths.filter(|path| path.exists()) {
        if let Err(e) = fs::remove_file(path) {
            log::debug!("Could not remove {}: {e}", path.display());
        }
    }
}

/// Confirm an artifact exists and is non-empty
pub fn ensure_nonempty_file(path: &Path) -> Result<u64> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(meta.len()),
        _ => Err(PipelineError::MissingArtifact(path.to_path_buf())),
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
