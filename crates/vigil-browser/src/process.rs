use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

/// How long pipe readers may keep draining once the child has exited or
/// been killed. Descendants that inherited the pipes can hold them open
/// indefinitely; whatever was captured by then is returned.
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(1_000);

/// Program plus leading arguments parsed from a configured command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn render(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len().saturating_add(1));
        parts.push(self.program.as_str());
        parts.extend(self.args.iter().map(String::as_str));
        shell_words::join(parts)
    }
}

/// Splits a shell-style command string into program and arguments.
pub fn parse_command_line(raw: &str) -> Result<CommandLine, String> {
    let tokens = shell_words::split(raw.trim())
        .map_err(|error| format!("invalid command '{raw}': {error}"))?;
    let mut tokens = tokens.into_iter();
    let program = tokens
        .next()
        .filter(|program| !program.trim().is_empty())
        .ok_or_else(|| "command cannot be empty".to_string())?;
    Ok(CommandLine {
        program,
        args: tokens.collect(),
    })
}

#[derive(Debug)]
pub(crate) struct CapturedOutput {
    pub(crate) status: Option<ExitStatus>,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
    pub(crate) timed_out: bool,
}

impl CapturedOutput {
    pub(crate) fn succeeded(&self) -> bool {
        !self.timed_out && self.status.is_some_and(|status| status.success())
    }

    pub(crate) fn exit_code(&self) -> Option<i32> {
        self.status.and_then(|status| status.code())
    }

    pub(crate) fn combined(&self) -> String {
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        match (stdout.is_empty(), stderr.is_empty()) {
            (_, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{stdout}\n{stderr}"),
        }
    }
}

/// Runs a child process, draining both pipes on reader threads so a chatty
/// child cannot block on a full pipe while we wait on it.
///
/// Only the direct child is killed on timeout. The call still returns within
/// `timeout` plus [`PIPE_DRAIN_GRACE`] when grandchildren outlive it.
pub(crate) fn run_captured(
    command_line: &CommandLine,
    extra_args: &[String],
    working_dir: Option<&Path>,
    envs: &[(String, String)],
    timeout: Duration,
) -> std::io::Result<CapturedOutput> {
    let mut command = Command::new(command_line.program.trim());
    command
        .args(&command_line.args)
        .args(extra_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(working_dir) = working_dir {
        command.current_dir(working_dir);
    }
    for (key, value) in envs {
        command.env(key, value);
    }

    let mut child = command.spawn()?;
    let stdout_reader = spawn_pipe_reader(child.stdout.take());
    let stderr_reader = spawn_pipe_reader(child.stderr.take());

    let (status, timed_out) = match child.wait_timeout(timeout)? {
        Some(status) => (Some(status), false),
        None => {
            let _ = child.kill();
            let status = child.wait().ok();
            (status, true)
        }
    };

    let drain_deadline = Instant::now() + PIPE_DRAIN_GRACE;
    let stdout = collect_pipe(stdout_reader, drain_deadline);
    let stderr = collect_pipe(stderr_reader, drain_deadline);
    if timed_out {
        tracing::debug!(
            program = %command_line.program,
            ?timeout,
            "child killed after timeout"
        );
    }
    Ok(CapturedOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

struct PipeReader {
    captured: Arc<Mutex<Vec<u8>>>,
    finished: Receiver<()>,
}

fn spawn_pipe_reader<R>(pipe: Option<R>) -> Option<PipeReader>
where
    R: Read + Send + 'static,
{
    let mut pipe = pipe?;
    let captured = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&captured);
    let (done, finished) = mpsc::channel();
    std::thread::spawn(move || {
        let mut chunk = [0_u8; 8 * 1024];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => {
                    if let Ok(mut buffer) = sink.lock() {
                        buffer.extend_from_slice(&chunk[..read]);
                    }
                }
                Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        let _ = done.send(());
    });
    Some(PipeReader { captured, finished })
}

/// Waits for the reader to hit EOF or for `deadline`, then takes whatever
/// bytes it has captured so far.
fn collect_pipe(reader: Option<PipeReader>, deadline: Instant) -> String {
    let Some(reader) = reader else {
        return String::new();
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    let _ = reader.finished.recv_timeout(remaining);
    let bytes = reader
        .captured
        .lock()
        .map(|buffer| buffer.clone())
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}
