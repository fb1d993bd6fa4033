//! Engine invocation.
//!
//! The orchestrator talks to engines only through [`EngineRunner`], so tests
//! can substitute a runner that writes canned outputs instead of spawning
//! processes.

mod process;
mod workspace;

pub use process::ProcessRunner;
pub use workspace::{clean_output_tree, prepare_work_dir};

use crate::domain::BenchResult;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

pub const STDOUT_FILE: &str = "stdout.txt";
pub const STDERR_FILE: &str = "stderr.txt";

pub trait EngineRunner: Sync {
    fn run(&self, invocation: &Invocation) -> BenchResult<RunRecord>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub engine: String,
    pub command_index: usize,
    /// Shell line after prefix substitution.
    pub command_line: String,
    pub work_dir: PathBuf,
    pub env: BTreeMap<String, String>,
    pub omp_threads: usize,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn stdout_path(&self) -> PathBuf {
        self.work_dir.join(STDOUT_FILE)
    }

    pub fn stderr_path(&self) -> PathBuf {
        self.work_dir.join(STDERR_FILE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunStatus {
    Exited { code: Option<i32>, success: bool },
    TimedOut { after_seconds: f64 },
    SpawnFailed { message: String },
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited { success: true, .. })
    }

    /// Short outcome label for unsuccessful runs.
    pub fn issue(&self) -> Option<String> {
        match self {
            Self::Exited { success: true, .. } => None,
            Self::Exited {
                code: Some(code), ..
            } => Some(format!("exit({code})")),
            Self::Exited { code: None, .. } => Some("signal".to_string()),
            Self::TimedOut { .. } => Some("timeout".to_string()),
            Self::SpawnFailed { .. } => Some("spawn".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub engine: String,
    pub command_index: usize,
    pub command: String,
    pub work_dir: PathBuf,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    pub status: RunStatus,
    pub wall_seconds: f64,
}

impl RunRecord {
    pub fn for_invocation(invocation: &Invocation, status: RunStatus, wall_seconds: f64) -> Self {
        Self {
            engine: invocation.engine.clone(),
            command_index: invocation.command_index,
            command: invocation.command_line.clone(),
            work_dir: invocation.work_dir.clone(),
            stdout_path: invocation.stdout_path(),
            stderr_path: invocation.stderr_path(),
            status,
            wall_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RunStatus;

    #[test]
    fn issues_describe_unsuccessful_outcomes() {
        let ok = RunStatus::Exited {
            code: Some(0),
            success: true,
        };
        assert!(ok.is_success());
        assert_eq!(ok.issue(), None);

        let failed = RunStatus::Exited {
            code: Some(2),
            success: false,
        };
        assert_eq!(failed.issue().as_deref(), Some("exit(2)"));

        let killed = RunStatus::Exited {
            code: None,
            success: false,
        };
        assert_eq!(killed.issue().as_deref(), Some("signal"));
        assert_eq!(
            RunStatus::TimedOut { after_seconds: 1.0 }.issue().as_deref(),
            Some("timeout")
        );
    }

    #[test]
    fn status_serializes_with_kind_tag() {
        let json = serde_json::to_value(RunStatus::TimedOut { after_seconds: 2.5 })
            .expect("status should serialize");
        assert_eq!(json["kind"], "timed_out");
        assert_eq!(json["after_seconds"], 2.5);
    }
}
