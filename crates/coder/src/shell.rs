use async_trait::async_trait;
use kill_tree::{blocking::kill_tree_with_config, Config};
use serde::Deserialize;
use serde_json::{json, Value};
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{error, info, warn};

use crate::errors::{AgentError, AgentResult};
use crate::models::tool::ToolSchema;
use crate::tool::{parse_arguments, Tool};

/// How long a timed-out command gets to exit after SIGTERM before it is killed
const TERMINATION_GRACE: Duration = Duration::from_secs(5);

fn default_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShellCommandArgs {
    pub command: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub workspace: Option<String>,
}

impl ShellCommandArgs {
    fn validate(&self) -> AgentResult<()> {
        if self.command.trim().is_empty() {
            return Err(AgentError::InvalidParameters(
                "command must not be empty".into(),
            ));
        }
        if self.timeout == 0 {
            return Err(AgentError::InvalidParameters(
                "timeout must be at least 1 second".into(),
            ));
        }
        Ok(())
    }

    fn workspace_display(&self) -> &str {
        self.workspace.as_deref().unwrap_or("current directory")
    }
}

struct CommandOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl CommandOutput {
    fn render(&self) -> String {
        let mut output = String::new();
        if !self.stdout.is_empty() {
            output.push_str(&format!(
                "Stdout:\n{}\n",
                String::from_utf8_lossy(&self.stdout)
            ));
        }
        if !self.stderr.is_empty() {
            output.push_str(&format!(
                "Stderr:\n{}\n",
                String::from_utf8_lossy(&self.stderr)
            ));
        }
        if !self.status.success() {
            match self.status.code() {
                Some(code) => output.push_str(&format!("Return code: {}\n", code)),
                None => output.push_str(&format!("Return code: {}\n", self.status)),
            }
        }

        if output.is_empty() {
            "Command produced no output.".to_string()
        } else {
            output
        }
    }
}

/// Runs a shell command line and reports its output as text.
///
/// Failures never escape as errors: bad arguments, a missing command or
/// workspace, a timeout and any other failure each come back as their own
/// message so the model can react to them.
pub struct ShellCommandTool {
    schema: ToolSchema,
}

impl ShellCommandTool {
    pub fn new() -> Self {
        Self {
            schema: ToolSchema::new(
                "execute_shell_command",
                "Run a shell command and return its standard output and standard error. \
                Commands run with the agent's privileges, so use with care.",
                json!({
                    "type": "object",
                    "properties": {
                        "command": {
                            "type": "string",
                            "description": "The complete shell command line to run"
                        },
                        "timeout": {
                            "type": "integer",
                            "description": "Seconds before the command is stopped. Defaults to 60.",
                            "default": 60
                        },
                        "workspace": {
                            "type": "string",
                            "description": "Working directory for the command. Defaults to the current directory."
                        }
                    },
                    "required": ["command"]
                }),
            ),
        }
    }
}

impl Default for ShellCommandTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ShellCommandTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn execute(&self, arguments: Value) -> AgentResult<String> {
        let args = match parse_arguments::<ShellCommandArgs>(arguments)
            .and_then(|args| args.validate().map(|_| args))
        {
            Ok(args) => args,
            Err(e) => {
                warn!(error = %e, "Rejected shell command arguments");
                return Ok(format!("Argument error: {}", e));
            }
        };

        Ok(match run_command(&args).await {
            Ok(output) => output,
            Err(e) => describe_failure(&args, &e),
        })
    }
}

fn describe_failure(args: &ShellCommandArgs, error: &AgentError) -> String {
    match error {
        AgentError::Timeout(seconds) => {
            format!("Command '{}' timed out after {} seconds.", args.command, seconds)
        }
        AgentError::NotFound(_) => match &args.workspace {
            Some(workspace) => format!(
                "Failed to run command '{}': the command or workspace '{}' was not found. Check the path.",
                args.command, workspace
            ),
            None => format!(
                "Command '{}' was not found. Check the path.",
                args.command
            ),
        },
        other => format!(
            "Error while running command '{}': {}",
            args.command, other
        ),
    }
}

fn shell_command(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(command_line);
        command
    } else {
        let mut command = Command::new("sh");
        command.arg("-c").arg(command_line);
        command
    }
}

/// Spawn `args.command` and wait for it within its timeout
pub async fn run_command(args: &ShellCommandArgs) -> AgentResult<String> {
    info!(
        command = %args.command,
        workspace = %args.workspace_display(),
        timeout = args.timeout,
        "Running shell command"
    );

    let mut command = shell_command(&args.command);
    if let Some(workspace) = &args.workspace {
        command.current_dir(PathBuf::from(shellexpand::tilde(workspace).into_owned()));
    }
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| {
        error!(command = %args.command, error = %e, "Failed to spawn shell command");
        AgentError::from(e)
    })?;

    let limit = Duration::from_secs(args.timeout);
    let output = match tokio::time::timeout(limit, collect_output(&mut child)).await {
        Ok(output) => output?,
        Err(_) => {
            error!(
                command = %args.command,
                timeout = args.timeout,
                workspace = %args.workspace_display(),
                "Shell command timed out"
            );
            terminate(&mut child).await;
            return Err(AgentError::Timeout(args.timeout));
        }
    };

    if output.status.success() {
        info!(command = %args.command, "Shell command succeeded");
    } else {
        warn!(
            command = %args.command,
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr),
            "Shell command exited with an error"
        );
    }
    Ok(output.render())
}

async fn collect_output(child: &mut Child) -> io::Result<CommandOutput> {
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let read_stdout = async {
        if let Some(pipe) = stdout_pipe.as_mut() {
            pipe.read_to_end(&mut stdout).await?;
        }
        Ok::<_, io::Error>(())
    };
    let read_stderr = async {
        if let Some(pipe) = stderr_pipe.as_mut() {
            pipe.read_to_end(&mut stderr).await?;
        }
        Ok::<_, io::Error>(())
    };

    let (status, stdout_read, stderr_read) = tokio::join!(child.wait(), read_stdout, read_stderr);
    stdout_read?;
    stderr_read?;

    Ok(CommandOutput {
        status: status?,
        stdout,
        stderr,
    })
}

/// Stop a timed-out command and everything it spawned.
///
/// The whole process tree gets SIGTERM first; whatever is still alive after
/// the grace period is killed outright.
async fn terminate(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };

    signal_tree(pid, "SIGTERM").await;
    if tokio::time::timeout(TERMINATION_GRACE, child.wait())
        .await
        .is_ok()
    {
        return;
    }

    warn!(pid, "Command ignored SIGTERM, killing it");
    signal_tree(pid, "SIGKILL").await;
    if let Err(e) = child.kill().await {
        error!(pid, error = %e, "Failed to kill timed-out command");
    }
}

async fn signal_tree(pid: u32, signal: &str) {
    let config = Config {
        signal: signal.to_string(),
        ..Default::default()
    };
    let result = tokio::task::spawn_blocking(move || kill_tree_with_config(pid, &config)).await;
    match result {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!(pid, error = %e, "Failed to signal process tree"),
        Err(e) => warn!(pid, error = %e, "Process tree signalling task failed"),
    }
}
