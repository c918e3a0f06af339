use std::ffi::OsString;
use std::io;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use wait_timeout::ChildExt;

/// Structured command execution with an optional timeout.
///
/// Container invocations run without a timeout and block until the runtime
/// exits; auxiliary calls (model validator, compatibility probe) are bounded.
#[derive(Debug, Clone)]
pub struct ExecService {
    default_timeout: Option<Duration>,
}

impl ExecService {
    /// Unbounded executor; used for the container invocations themselves.
    pub fn unbounded() -> Self {
        Self {
            default_timeout: None,
        }
    }

    pub fn with_timeout(default_timeout: Duration) -> Self {
        Self {
            default_timeout: Some(default_timeout),
        }
    }

    pub fn run(&self, request: ExecRequest) -> Result<ExecOutput> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args);
        if request.capture_output {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let mut child = cmd.spawn().with_context(|| {
            format!(
                "failed to spawn {:?} with args {:?}",
                request.program, request.args
            )
        })?;

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let started = Instant::now();
        let status = match self.default_timeout {
            None => child.wait().context("failed to wait for process")?,
            Some(limit) => match child
                .wait_timeout(limit)
                .context("failed to wait with timeout")?
            {
                Some(status) => status,
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(anyhow!(
                        "command {:?} timed out after {:?}",
                        request.program,
                        limit
                    ));
                }
            },
        };
        let duration = started.elapsed();

        let (stdout, stderr) = if request.capture_output {
            (
                read_stream(stdout_pipe.as_mut())?,
                read_stream(stderr_pipe.as_mut())?,
            )
        } else {
            (String::new(), String::new())
        };

        Ok(ExecOutput {
            status,
            duration,
            stdout,
            stderr,
        })
    }
}

fn read_stream(stream: Option<&mut impl io::Read>) -> Result<String> {
    let mut buf = String::new();
    if let Some(reader) = stream {
        reader
            .read_to_string(&mut buf)
            .context("failed to read process output")?;
    }
    Ok(buf)
}

#[derive(Debug, Default)]
pub struct ExecRequest {
    program: OsString,
    args: Vec<OsString>,
    capture_output: bool,
}

impl ExecRequest {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }
}

#[derive(Debug)]
pub struct ExecOutput {
    pub status: std::process::ExitStatus,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Combined captured output, stdout first.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}
