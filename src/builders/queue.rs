// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! In-process build queue

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::{BuildOutcome, BuildRunner};
use crate::errors::{MobciError, MobciResult};
use crate::scheduler::{BuildQueue, BuildRequest};

/// File under the work root holding the last build number of each builder
pub const BUILD_NUMBERS_FILE: &str = "build-numbers.json";

type BuildTask = MobciResult<BuildOutcome>;

/// Runs every accepted request as its own task, concurrently with any
/// earlier build of the same builder
pub struct LocalBuildQueue {
    runner: Arc<BuildRunner>,
    numbers_path: PathBuf,
    numbers: Mutex<Option<HashMap<String, u64>>>,
    builds: Mutex<JoinSet<BuildTask>>,
    cancel: CancellationToken,
}

impl LocalBuildQueue {
    pub fn new(runner: Arc<BuildRunner>) -> Self {
        let numbers_path = runner.config().work_root().join(BUILD_NUMBERS_FILE);
        Self {
            runner,
            numbers_path,
            numbers: Mutex::new(None),
            builds: Mutex::new(JoinSet::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Next build number of `builder`, persisted so a restarted process
    /// never reuses a build id
    async fn next_number(&self, builder: &str) -> MobciResult<u64> {
        let mut guard = self.numbers.lock().await;
        if guard.is_none() {
            *guard = Some(load_numbers(&self.numbers_path).await?);
        }
        let numbers = guard.get_or_insert_with(HashMap::new);

        let number = numbers.entry(builder.to_string()).or_insert(0);
        *number += 1;
        let number = *number;

        save_numbers(&self.numbers_path, numbers).await?;
        Ok(number)
    }

    /// Cancel every running build
    pub fn cancel_all(&self) {
        self.cancel.cancel();
    }

    /// Builds accepted and not yet collected
    pub async fn in_flight(&self) -> usize {
        self.builds.lock().await.len()
    }

    /// Collect the builds that already finished, without waiting
    pub async fn collect_finished(&self) -> Vec<BuildOutcome> {
        let mut builds = self.builds.lock().await;
        let mut outcomes = Vec::new();
        while let Some(joined) = builds.try_join_next() {
            if let Some(outcome) = finished(joined) {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Wait for every accepted build to finish
    pub async fn wait_idle(&self) -> Vec<BuildOutcome> {
        let mut builds = self.builds.lock().await;
        let mut outcomes = Vec::new();
        while let Some(joined) = builds.join_next().await {
            if let Some(outcome) = finished(joined) {
                outcomes.push(outcome);
            }
        }
        outcomes
    }
}

fn finished(joined: Result<BuildTask, tokio::task::JoinError>) -> Option<BuildOutcome> {
    match joined {
        Ok(Ok(outcome)) => {
            info!(build_id = %outcome.build_id, verdict = %outcome.verdict, "build collected");
            Some(outcome)
        }
        Ok(Err(e)) => {
            error!(error = %e, "build could not run");
            None
        }
        Err(e) => {
            error!(error = %e, "build task ended abnormally");
            None
        }
    }
}

async fn load_numbers(path: &Path) -> MobciResult<HashMap<String, u64>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(MobciError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        }),
    }
}

async fn save_numbers(path: &Path, numbers: &HashMap<String, u64>) -> MobciResult<()> {
    let to_write_error = |e: std::io::Error| MobciError::FileWriteError {
        path: path.to_path_buf(),
        error: e.to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(to_write_error)?;
    }
    let json = serde_json::to_string_pretty(numbers)?;
    tokio::fs::write(path, json).await.map_err(to_write_error)
}

#[async_trait]
impl BuildQueue for LocalBuildQueue {
    async fn enqueue(&self, request: BuildRequest) -> MobciResult<()> {
        self.runner.builder(&request.builder)?;
        if self.cancel.is_cancelled() {
            return Err(MobciError::Scheduler {
                message: "build queue is shut down".into(),
            });
        }

        self.collect_finished().await;

        let number = self.next_number(&request.builder).await?;
        info!(builder = %request.builder, number, "build accepted");

        let runner = Arc::clone(&self.runner);
        let cancel = self.cancel.child_token();
        self.builds.lock().await.spawn(async move {
            let outcome = runner.run_build(&request, number, cancel).await?;
            outcome.print_summary();
            Ok(outcome)
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MobciConfig;
    use crate::executors::{ExecutionResult, Executor, Invocation, PropertyExecutor, SummaryExecutor};
    use crate::pipeline::PipelineExecutor;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Every program succeeds at once
    struct InstantHost;

    #[async_trait]
    impl Executor for InstantHost {
        async fn execute(&self, _invocation: &Invocation<'_>) -> MobciResult<ExecutionResult> {
            Ok(ExecutionResult::success(String::new(), Duration::ZERO))
        }
    }

    fn queue(work_dir: &Path) -> LocalBuildQueue {
        let yaml = format!(
            r#"
work_dir: {}
store: {{ uri: "http://localhost:5984" }}
apps: {{ spec: {{ command: [node, run.js] }} }}
builders: {{ ios-sim: {{ platform: ios, app: spec }} }}
"#,
            work_dir.display()
        );
        let config = MobciConfig::parse(&yaml, Path::new("mobci.yaml")).unwrap();

        let mut executor = PipelineExecutor::new();
        executor.register_executor("process", Box::new(InstantHost));
        executor.register_executor("property", Box::new(PropertyExecutor));
        executor.register_executor("summary", Box::new(SummaryExecutor));

        let runner = BuildRunner::new(Arc::new(config))
            .unwrap()
            .with_executor(executor)
            .with_self_exe("/opt/mobci")
            .with_host_name("worker1");
        LocalBuildQueue::new(Arc::new(runner))
    }

    #[tokio::test]
    async fn test_build_numbers_are_per_builder() {
        let temp = TempDir::new().unwrap();
        let queue = queue(temp.path());
        assert_eq!(queue.next_number("ios-sim").await.unwrap(), 1);
        assert_eq!(queue.next_number("ios-sim").await.unwrap(), 2);
        assert_eq!(queue.next_number("android").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_build_numbers_survive_restart() {
        let temp = TempDir::new().unwrap();
        let first = queue(temp.path());
        assert_eq!(first.next_number("ios-sim").await.unwrap(), 1);
        assert_eq!(first.next_number("ios-sim").await.unwrap(), 2);
        drop(first);

        let restarted = queue(temp.path());
        assert_eq!(restarted.next_number("ios-sim").await.unwrap(), 3);
        assert!(temp.path().join(BUILD_NUMBERS_FILE).exists());
    }

    #[tokio::test]
    async fn test_unknown_builder_is_rejected() {
        let temp = TempDir::new().unwrap();
        let queue = queue(temp.path());
        let err = queue
            .enqueue(BuildRequest::new("blackberry", "test"))
            .await
            .unwrap_err();
        assert!(matches!(err, MobciError::UnknownBuilder { .. }));
        assert!(queue.wait_idle().await.is_empty());
    }

    #[tokio::test]
    async fn test_shut_down_queue_rejects_requests() {
        let temp = TempDir::new().unwrap();
        let queue = queue(temp.path());
        queue.cancel_all();
        assert!(queue.enqueue(BuildRequest::new("ios-sim", "test")).await.is_err());
    }

    #[tokio::test]
    async fn test_finished_builds_are_not_kept() {
        let temp = TempDir::new().unwrap();
        let queue = queue(temp.path());

        queue.enqueue(BuildRequest::new("ios-sim", "first")).await.unwrap();
        let mut collected = Vec::new();
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            collected = queue.collect_finished().await;
            if !collected.is_empty() {
                break;
            }
        }
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].build_id, "ios-sim-1-worker1");
        assert_eq!(queue.in_flight().await, 0);

        queue.enqueue(BuildRequest::new("ios-sim", "second")).await.unwrap();
        let outcomes = queue.wait_idle().await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].build_id, "ios-sim-2-worker1");
    }

    #[tokio::test]
    async fn test_enqueue_collects_finished_builds() {
        let temp = TempDir::new().unwrap();
        let queue = queue(temp.path());

        queue.enqueue(BuildRequest::new("ios-sim", "first")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        queue.enqueue(BuildRequest::new("ios-sim", "second")).await.unwrap();

        assert_eq!(queue.in_flight().await, 1);
        queue.wait_idle().await;
    }
}
