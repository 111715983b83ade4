//! Local artifact upload for `artifact:` steps.

use crate::error::{ConveyorError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Whether `name` is a single path component usable as an artifact
/// directory name.
pub fn is_valid_artifact_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Copy `source` into `<artifacts_dir>/<run_id>/<name>/`.
///
/// A file keeps its file name inside the artifact directory; a directory
/// is copied recursively. Returns the artifact directory.
///
/// # Errors
///
/// Returns `StepExecutionError` if `name` is not a plain directory name or
/// `source` doesn't exist, or `Io` if the copy fails.
pub fn upload_artifact(
    step: &str,
    source: &Path,
    artifacts_dir: &Path,
    run_id: &str,
    name: &str,
) -> Result<PathBuf> {
    if !is_valid_artifact_name(name) {
        return Err(ConveyorError::StepExecutionError {
            step: step.to_string(),
            message: format!("invalid artifact name: {:?}", name),
        });
    }
    if !source.exists() {
        return Err(ConveyorError::StepExecutionError {
            step: step.to_string(),
            message: format!("artifact path not found: {}", source.display()),
        });
    }

    let target = artifacts_dir.join(run_id).join(name);
    fs::create_dir_all(&target)?;

    if source.is_dir() {
        copy_dir(source, &target)?;
    } else {
        let file_name = source.file_name().unwrap_or(source.as_os_str());
        fs::copy(source, target.join(file_name))?;
    }

    Ok(target)
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let path = entry.path();
        let dest = to.join(entry.file_name());
        if path.is_dir() {
            copy_dir(&path, &dest)?;
        } else {
            fs::copy(&path, &dest)?;
        }
    }
    Ok(())
}
