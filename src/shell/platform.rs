//! Platform-specific shell detection.

use std::path::PathBuf;

/// The shell used to run step commands.
#[derive(Debug, Clone)]
pub struct ShellInfo {
    /// Shell executable path.
    pub executable: PathBuf,

    /// Shell kind.
    pub name: ShellType,
}

impl ShellInfo {
    /// Flag that makes the shell read the command from its next argument.
    pub fn command_flag(&self) -> &'static str {
        match self.name {
            ShellType::PowerShell => "-Command",
            ShellType::Cmd => "/C",
            _ => "-c",
        }
    }
}

/// Known shell types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellType {
    Sh,
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Cmd,
    Unknown,
}

impl ShellType {
    /// Parse shell type from executable name.
    pub fn from_executable(exe: &str) -> Self {
        let name = std::path::Path::new(exe)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        match name.as_str() {
            "sh" | "dash" => ShellType::Sh,
            "bash" => ShellType::Bash,
            "zsh" => ShellType::Zsh,
            "fish" => ShellType::Fish,
            "powershell" | "pwsh" => ShellType::PowerShell,
            "cmd" => ShellType::Cmd,
            _ => ShellType::Unknown,
        }
    }
}

/// Detect the shell for step commands.
///
/// `CONVEYOR_SHELL` wins; otherwise `/bin/sh` on Unix and `COMSPEC` on
/// Windows. The login shell is never used.
pub fn detect_shell() -> ShellInfo {
    let executable = std::env::var("CONVEYOR_SHELL")
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_shell());
    let name = ShellType::from_executable(&executable.to_string_lossy());

    ShellInfo { executable, name }
}

fn default_shell() -> PathBuf {
    if cfg!(target_os = "windows") {
        std::env::var("COMSPEC")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("cmd.exe"))
    } else {
        PathBuf::from("/bin/sh")
    }
}

/// Check if running in a CI environment.
///
/// Used to force non-interactive output in `main()`.
/// Checks common CI environment variables: `CI`, `GITHUB_ACTIONS`,
/// `GITLAB_CI`, `CIRCLECI`, `TRAVIS`, `JENKINS_URL`.
pub fn is_ci() -> bool {
    std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
        || std::env::var("CIRCLECI").is_ok()
        || std::env::var("TRAVIS").is_ok()
        || std::env::var("JENKINS_URL").is_ok()
}
