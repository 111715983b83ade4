//! Shell command execution.
//!
//! Every command runs through [`execute_controlled`]: output is read line
//! by line on helper threads, handed to a callback on the calling thread,
//! and captured in full. The caller can interrupt a command at any time and
//! may bound it with a timeout; either way the process (and, on Unix, its
//! whole process group) is killed.

use crate::error::{ConveyorError, Result};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::platform::detect_shell;

/// How often the child is polled for exit, interruption and timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long to keep draining output after a kill before giving up on
/// descendants that still hold the pipes open.
const KILL_GRACE: Duration = Duration::from_millis(250);

/// How a command came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process exited on its own.
    Exited,
    /// The process was killed after exceeding its timeout.
    TimedOut,
    /// The process was killed because the caller interrupted it.
    Interrupted,
}

/// Result of executing a shell command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Standard output.
    pub stdout: String,

    /// Standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether the command exited on its own with code 0.
    pub success: bool,

    /// How the command ended.
    pub termination: Termination,
}

/// Options for command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables (merged with system env).
    pub env: HashMap<String, String>,

    /// Kill the command after this long (None = no timeout).
    pub timeout: Option<Duration>,
}

/// Output line from command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
}

impl OutputLine {
    /// The line's text.
    pub fn text(&self) -> &str {
        match self {
            OutputLine::Stdout(s) | OutputLine::Stderr(s) => s,
        }
    }
}

/// Execute a shell command to completion, capturing its output.
pub fn execute(command: &str, options: &CommandOptions) -> Result<CommandResult> {
    execute_controlled(command, options, &mut |_| {}, &|| false)
}

/// Execute a command, streaming its output and honouring interruption.
///
/// `on_line` receives every output line in arrival order. `interrupt` is
/// polled while the command runs; once it returns true the command is
/// killed and the result's termination is [`Termination::Interrupted`].
///
/// # Errors
///
/// Returns `CommandFailed` only if the process cannot be spawned or
/// waited on. A non-zero exit is reported through the result.
pub fn execute_controlled(
    command: &str,
    options: &CommandOptions,
    on_line: &mut dyn FnMut(OutputLine),
    interrupt: &dyn Fn() -> bool,
) -> Result<CommandResult> {
    let start = Instant::now();
    let spawn_failed = || ConveyorError::CommandFailed {
        command: command.to_string(),
        code: None,
    };

    let mut child = build_command(command, options).spawn().map_err(|e| {
        warn!("Failed to spawn '{}': {}", command, e);
        spawn_failed()
    })?;

    let stdout = child.stdout.take().ok_or_else(spawn_failed)?;
    let stderr = child.stderr.take().ok_or_else(spawn_failed)?;

    let (tx, rx) = mpsc::channel();
    spawn_reader(stdout, tx.clone(), OutputLine::Stdout);
    spawn_reader(stderr, tx, OutputLine::Stderr);

    let mut stdout_output = String::new();
    let mut stderr_output = String::new();
    let mut termination = Termination::Exited;
    let mut killed_at: Option<Instant> = None;
    let mut readers_done = false;
    let mut exit: Option<ExitStatus> = None;

    let status = loop {
        if readers_done {
            thread::sleep(POLL_INTERVAL);
        } else {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => {
                    let buffer = match &line {
                        OutputLine::Stdout(_) => &mut stdout_output,
                        OutputLine::Stderr(_) => &mut stderr_output,
                    };
                    buffer.push_str(line.text());
                    buffer.push('\n');
                    on_line(line);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => readers_done = true,
            }
        }

        if exit.is_none() {
            exit = child.try_wait().map_err(|_| spawn_failed())?;
        }

        if let Some(status) = exit {
            let grace_over = killed_at.is_some_and(|t| t.elapsed() >= KILL_GRACE);
            if readers_done || grace_over {
                break status;
            }
            continue;
        }

        if killed_at.is_none() {
            if interrupt() {
                debug!("Interrupting '{}'", command);
                termination = Termination::Interrupted;
                kill_tree(&mut child);
                killed_at = Some(Instant::now());
            } else if options.timeout.is_some_and(|t| start.elapsed() >= t) {
                debug!("Timing out '{}'", command);
                termination = Termination::TimedOut;
                kill_tree(&mut child);
                killed_at = Some(Instant::now());
            }
        }
    };

    Ok(CommandResult {
        exit_code: status.code(),
        stdout: stdout_output,
        stderr: stderr_output,
        duration: start.elapsed(),
        success: status.success() && termination == Termination::Exited,
        termination,
    })
}

fn build_command(command: &str, options: &CommandOptions) -> Command {
    let shell = detect_shell();

    let mut cmd = Command::new(&shell.executable);
    cmd.arg(shell.command_flag());
    cmd.arg(command);

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group so a kill reaches every descendant.
        cmd.process_group(0);
    }

    cmd
}

fn spawn_reader<R: Read + Send + 'static>(
    source: R,
    tx: Sender<OutputLine>,
    wrap: fn(String) -> OutputLine,
) {
    thread::spawn(move || {
        let mut reader = BufReader::new(source);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            if buf.ends_with(b"\n") {
                buf.pop();
                if buf.ends_with(b"\r") {
                    buf.pop();
                }
            }
            // Invalid UTF-8 is replaced; the pipe must keep draining.
            let line = String::from_utf8_lossy(&buf).into_owned();
            if tx.send(wrap(line)).is_err() {
                break;
            }
        }
    });
}

fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Ok(pid) = i32::try_from(child.id()) {
            // SAFETY: kill(2) with a negative pid signals the process group
            // created for this child; it touches no memory.
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn execute_successful_command() {
        let result = execute("echo hello", &CommandOptions::default()).unwrap();

        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.termination, Termination::Exited);
        assert!(result.stdout.contains("hello"));
    }

    #[test]
    fn execute_failing_command() {
        let result = execute("exit 3", &CommandOptions::default()).unwrap();

        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
    }

    #[test]
    fn execute_captures_stderr_separately() {
        let result = execute("echo out; echo err >&2", &CommandOptions::default()).unwrap();

        assert!(result.stdout.contains("out"));
        assert!(result.stderr.contains("err"));
        assert!(!result.stdout.contains("err"));
    }

    #[test]
    fn execute_with_env() {
        let mut options = CommandOptions::default();
        options
            .env
            .insert("MY_VAR".to_string(), "my_value".to_string());

        let result = execute("echo $MY_VAR", &options).unwrap();

        assert!(result.success);
        assert!(result.stdout.contains("my_value"));
    }

    #[test]
    fn execute_with_cwd() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("marker.txt"), "").unwrap();
        let options = CommandOptions {
            cwd: Some(temp.path().to_path_buf()),
            ..Default::default()
        };

        let result = execute("ls", &options).unwrap();

        assert!(result.success);
        assert!(result.stdout.contains("marker.txt"));
    }

    #[test]
    fn streaming_preserves_line_order() {
        let lines = RefCell::new(Vec::new());
        let result = execute_controlled(
            "echo line1; echo line2; echo line3",
            &CommandOptions::default(),
            &mut |line| lines.borrow_mut().push(line),
            &|| false,
        )
        .unwrap();

        assert!(result.success);
        assert_eq!(
            lines.into_inner(),
            vec![
                OutputLine::Stdout("line1".to_string()),
                OutputLine::Stdout("line2".to_string()),
                OutputLine::Stdout("line3".to_string()),
            ]
        );
    }

    #[test]
    fn timeout_kills_command() {
        let options = CommandOptions {
            timeout: Some(Duration::from_millis(200)),
            ..Default::default()
        };

        let result = execute("sleep 5", &options).unwrap();

        assert!(!result.success);
        assert_eq!(result.termination, Termination::TimedOut);
        assert!(result.duration < Duration::from_secs(4));
    }

    #[test]
    fn interrupt_kills_command() {
        let start = Instant::now();
        let result = execute_controlled(
            "sleep 5",
            &CommandOptions::default(),
            &mut |_| {},
            &|| start.elapsed() > Duration::from_millis(150),
        )
        .unwrap();

        assert!(!result.success);
        assert_eq!(result.termination, Termination::Interrupted);
        assert!(result.duration < Duration::from_secs(4));
    }

    #[test]
    fn missing_working_directory_is_an_error() {
        let options = CommandOptions {
            cwd: Some(PathBuf::from("/definitely/not/here")),
            ..Default::default()
        };
        assert!(execute("echo hi", &options).is_err());
    }

    #[test]
    fn invalid_utf8_output_does_not_break_the_pipe() {
        let command = "printf 'ok\\n\\377\\n'; i=0; while [ $i -lt 20000 ]; do echo line $i; i=$((i+1)); done; echo DONE";
        let result = execute(command, &CommandOptions::default()).unwrap();

        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.stdout.starts_with("ok\n\u{FFFD}\n"));
        assert!(result.stdout.contains("line 19999"));
        assert!(result.stdout.ends_with("DONE\n"));
    }

    #[test]
    fn command_result_tracks_duration() {
        let result = execute("echo fast", &CommandOptions::default()).unwrap();
        assert!(result.duration.as_millis() < 5000);
    }
}
