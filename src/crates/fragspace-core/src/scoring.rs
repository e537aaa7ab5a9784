//! External scoring collaborator
//!
//! Scoring is optional and pluggable. The default [`ExternalProcessScorer`]
//! hands each finished candidate to an external program through files:
//!
//! ```text
//! <program> <workdir>/M00000042_inp.json <workdir>/M00000042_out.json <workdir> <taskId> <uidFile>
//! ```
//!
//! Exit code 0 means success; anything else fails the task and the program's
//! stderr is surfaced in the error.

use crate::error::{ExplorerError, Result};
use crate::graph::Graph;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Number of digits in scoring file names
const NAME_DIGITS: usize = 8;

/// A finished candidate submitted for scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub task_id: u64,
    /// Sequence number naming the scoring files
    pub candidate_id: u64,
    pub root_id: u64,
    pub level: i32,
    pub graph: Graph,
}

impl ScoringRequest {
    /// File stem shared by the input and output files, e.g. `M00000042`
    pub fn name(&self) -> String {
        format!("M{:0width$}", self.candidate_id, width = NAME_DIGITS)
    }
}

/// Result of a successful scoring run
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    pub name: String,
    pub output: PathBuf,
    /// Fitness value, when the output file reports one
    pub fitness: Option<f64>,
}

#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoreReport>;
}

/// Runs an external program once per candidate
#[derive(Debug, Clone)]
pub struct ExternalProcessScorer {
    program: PathBuf,
    interpreter: Option<String>,
    work_dir: PathBuf,
    uid_file: PathBuf,
}

impl ExternalProcessScorer {
    pub fn new(program: impl Into<PathBuf>, work_dir: impl Into<PathBuf>, uid_file: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            interpreter: None,
            work_dir: work_dir.into(),
            uid_file: uid_file.into(),
        }
    }

    /// Run the program through an interpreter such as `bash` or `python3`
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn command(&self) -> Command {
        match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(&self.program);
                cmd
            }
            None => Command::new(&self.program),
        }
    }
}

#[async_trait]
impl Scorer for ExternalProcessScorer {
    async fn score(&self, request: &ScoringRequest) -> Result<ScoreReport> {
        let name = request.name();
        let input = self.work_dir.join(format!("{}_inp.json", name));
        let output = self.work_dir.join(format!("{}_out.json", name));
        tokio::fs::write(&input, serde_json::to_vec_pretty(request)?).await?;

        debug!(
            task_id = request.task_id,
            graph_id = request.graph.id,
            candidate = %name,
            program = %self.program.display(),
            "Launching scoring process"
        );

        // The child dies with the task if the level is cancelled
        let result = self
            .command()
            .arg(&input)
            .arg(&output)
            .arg(&self.work_dir)
            .arg(request.task_id.to_string())
            .arg(&self.uid_file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr).trim().to_string();
            warn!(
                task_id = request.task_id,
                graph_id = request.graph.id,
                exit_code = ?result.status.code(),
                "Scoring process failed"
            );
            return Err(ExplorerError::Scoring {
                task_id: request.task_id,
                graph_id: request.graph.id,
                exit_code: result.status.code(),
                stderr,
            });
        }

        let fitness = match tokio::fs::read(&output).await {
            Ok(bytes) => serde_json::from_slice::<serde_json::Value>(&bytes)
                .ok()
                .and_then(|v| v.get("fitness").and_then(|f| f.as_f64())),
            Err(_) => None,
        };
        Ok(ScoreReport { name, output, fitness })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(candidate_id: u64) -> ScoringRequest {
        ScoringRequest {
            task_id: 3,
            candidate_id,
            root_id: 1,
            level: 0,
            graph: Graph::new(17),
        }
    }

    fn script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("score.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_name_is_zero_padded() {
        assert_eq!(request(42).name(), "M00000042");
    }

    #[tokio::test]
    async fn test_successful_run_reads_fitness() {
        let dir = TempDir::new().unwrap();
        let program = script(&dir, "test -f \"$1\" || exit 3\necho '{\"fitness\": 1.5}' > \"$2\"\n");
        let scorer = ExternalProcessScorer::new(program, dir.path(), dir.path().join("UID.txt")).with_interpreter("sh");

        let report = scorer.score(&request(7)).await.unwrap();
        assert_eq!(report.name, "M00000007");
        assert_eq!(report.fitness, Some(1.5));
        assert!(dir.path().join("M00000007_inp.json").exists());
    }

    #[tokio::test]
    async fn test_failure_surfaces_stderr() {
        let dir = TempDir::new().unwrap();
        let program = script(&dir, "echo 'descriptor failed' >&2\nexit 4\n");
        let scorer = ExternalProcessScorer::new(program, dir.path(), dir.path().join("UID.txt")).with_interpreter("sh");

        match scorer.score(&request(8)).await {
            Err(ExplorerError::Scoring {
                exit_code, stderr, graph_id, ..
            }) => {
                assert_eq!(exit_code, Some(4));
                assert_eq!(stderr, "descriptor failed");
                assert_eq!(graph_id, 17);
            }
            other => panic!("expected scoring error, got {:?}", other),
        }
    }
}
