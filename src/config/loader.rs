//! Configuration file discovery and loading.
//!
//! Layout under the project root:
//!
//! - `.conveyor/workflows/*.yml` (or `*.yaml`) - one workflow per file
//! - `.conveyor/config.yml` - optional project settings
//!
//! Settings resolve in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. `.conveyor/config.yml`
//! 3. `CONVEYOR_*` environment variables
//! 4. CLI flags (applied by the command layer)

use crate::config::schema::{ProjectConfig, Settings, WorkflowConfig};
use crate::error::{ConveyorError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-project configuration directory.
pub const CONFIG_DIR: &str = ".conveyor";

/// A workflow file loaded from disk.
#[derive(Debug, Clone)]
pub struct LoadedWorkflow {
    /// Effective name (`name:` or the file stem)
    pub name: String,
    /// Source path
    pub path: PathBuf,
    /// Parsed content
    pub config: WorkflowConfig,
}

/// Paths to configuration files for a project.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Project settings: .conveyor/config.yml
    pub project: Option<PathBuf>,

    /// Workflow directory: .conveyor/workflows
    pub workflows_dir: PathBuf,

    /// Workflow files, sorted by file name
    pub workflows: Vec<PathBuf>,
}

impl ConfigPaths {
    /// Discover config files for the given project root.
    pub fn discover(project_root: &Path) -> Self {
        let config_dir = project_root.join(CONFIG_DIR);
        let project = Some(config_dir.join("config.yml")).filter(|p| p.exists());
        let workflows_dir = config_dir.join("workflows");
        let workflows = Self::find_workflow_files(&workflows_dir);

        Self {
            project,
            workflows_dir,
            workflows,
        }
    }

    fn find_workflow_files(dir: &Path) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yml") | Some("yaml")
                )
            })
            .collect();
        files.sort();
        files
    }

    /// Check if any workflow file exists.
    pub fn has_workflows(&self) -> bool {
        !self.workflows.is_empty()
    }
}

/// Find the project root by walking up from `start`.
///
/// Looks for a `.conveyor` directory first, then falls back to `.git`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        if current.join(CONFIG_DIR).is_dir() {
            return Some(current);
        }

        if current.join(".git").exists() {
            return Some(current);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Parse YAML content into a [`WorkflowConfig`].
pub fn parse_workflow(content: &str, source_path: &Path) -> Result<WorkflowConfig> {
    serde_yaml::from_str(content).map_err(|e| ConveyorError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load a single workflow file.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist and
/// `ConfigParseError` if the YAML is invalid.
pub fn load_workflow_file(path: &Path) -> Result<LoadedWorkflow> {
    let content = read_config(path)?;
    let config = parse_workflow(&content, path)?;

    let name = config.name.clone().unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("workflow")
            .to_string()
    });

    Ok(LoadedWorkflow {
        name,
        path: path.to_path_buf(),
        config,
    })
}

/// Load every workflow for a project, or only `override_path` if given.
///
/// # Errors
///
/// Returns `ConfigNotFound` if no workflow file exists.
pub fn load_workflows(
    project_root: &Path,
    override_path: Option<&Path>,
) -> Result<Vec<LoadedWorkflow>> {
    if let Some(path) = override_path {
        return Ok(vec![load_workflow_file(path)?]);
    }

    let paths = ConfigPaths::discover(project_root);
    if !paths.has_workflows() {
        return Err(ConveyorError::ConfigNotFound {
            path: paths.workflows_dir,
        });
    }

    paths
        .workflows
        .iter()
        .map(|p| load_workflow_file(p))
        .collect()
}

/// Load project settings, falling back to defaults when the file is absent,
/// then apply `CONVEYOR_*` environment overrides.
pub fn load_settings(project_root: &Path) -> Result<Settings> {
    let paths = ConfigPaths::discover(project_root);

    let mut settings = match &paths.project {
        Some(path) => {
            let content = read_config(path)?;
            let project: ProjectConfig =
                serde_yaml::from_str(&content).map_err(|e| ConveyorError::ConfigParseError {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            project.settings
        }
        None => Settings::default(),
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

/// Apply `CONVEYOR_*` overrides using the given variable lookup.
pub fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(v) = lookup("CONVEYOR_MAX_PARALLEL") {
        settings.max_parallel = parse_number("CONVEYOR_MAX_PARALLEL", &v)?;
    }
    if let Some(v) = lookup("CONVEYOR_HISTORY_RETENTION") {
        settings.history_retention = parse_number("CONVEYOR_HISTORY_RETENTION", &v)?;
    }
    if let Some(v) = lookup("CONVEYOR_JOB_TIMEOUT_MINUTES") {
        settings.job_timeout_minutes = parse_number("CONVEYOR_JOB_TIMEOUT_MINUTES", &v)?;
    }
    if let Some(v) = lookup("CONVEYOR_STATE_DIR") {
        settings.state_dir = PathBuf::from(v);
    }
    if let Some(v) = lookup("CONVEYOR_ARTIFACTS_DIR") {
        settings.artifacts_dir = PathBuf::from(v);
    }
    if let Some(v) = lookup("CONVEYOR_COMMENTS_DIR") {
        settings.comments_dir = PathBuf::from(v);
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConveyorError::ConfigValidationError {
            message: format!("{} must be a non-negative integer, got '{}'", key, value),
        })
}

fn read_config(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConveyorError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConveyorError::Io(e)
        }
    })
}
