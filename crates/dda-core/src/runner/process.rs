use super::{EngineRunner, Invocation, RunRecord, RunStatus};
use crate::domain::{BenchError, BenchResult};
use std::fs::{self, File};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs each invocation through `sh -c` inside its work directory.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    poll_interval: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    fn wait_for_exit(&self, child: &mut Child, timeout: Option<Duration>) -> RunStatus {
        let Some(timeout) = timeout else {
            return match child.wait() {
                Ok(status) => exited(status),
                Err(error) => RunStatus::SpawnFailed {
                    message: format!("wait failed: {error}"),
                },
            };
        };

        let started_at = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return exited(status),
                Ok(None) => {}
                Err(error) => {
                    terminate_and_reap_child(child);
                    return RunStatus::SpawnFailed {
                        message: format!("wait failed: {error}"),
                    };
                }
            }

            if started_at.elapsed() > timeout {
                terminate_and_reap_child(child);
                return RunStatus::TimedOut {
                    after_seconds: timeout.as_secs_f64(),
                };
            }
            thread::sleep(self.poll_interval);
        }
    }
}

impl EngineRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> BenchResult<RunRecord> {
        fs::create_dir_all(&invocation.work_dir).map_err(|source| {
            BenchError::io_system(
                "IO.WORK_DIR",
                format!(
                    "failed to create work directory '{}': {}",
                    invocation.work_dir.display(),
                    source
                ),
            )
        })?;
        let stdout = create_capture(&invocation.stdout_path())?;
        let stderr = create_capture(&invocation.stderr_path())?;

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&invocation.command_line)
            .current_dir(&invocation.work_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .envs(&invocation.env)
            .env("OMP_NUM_THREADS", invocation.omp_threads.to_string());

        debug!(
            engine = %invocation.engine,
            command = %invocation.command_line,
            "spawning engine"
        );
        let started_at = Instant::now();
        let status = match command.spawn() {
            Ok(mut child) => self.wait_for_exit(&mut child, invocation.timeout),
            Err(error) => RunStatus::SpawnFailed {
                message: error.to_string(),
            },
        };
        let wall_seconds = started_at.elapsed().as_secs_f64();

        if let Some(issue) = status.issue() {
            warn!(
                "{} command {} finished with {}: {}",
                invocation.engine, invocation.command_index, issue, invocation.command_line
            );
        }
        Ok(RunRecord::for_invocation(invocation, status, wall_seconds))
    }
}

fn create_capture(path: &std::path::Path) -> BenchResult<File> {
    File::create(path).map_err(|source| {
        BenchError::io_system(
            "IO.RUN_OUTPUT",
            format!("failed to create '{}': {}", path.display(), source),
        )
    })
}

fn exited(status: ExitStatus) -> RunStatus {
    RunStatus::Exited {
        code: status.code(),
        success: status.success(),
    }
}

fn terminate_and_reap_child(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
