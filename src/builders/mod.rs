// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Builders and whole-build execution
//!
//! A builder is a named platform configuration from the config file. The
//! build runner turns one build request for a builder into a fresh build
//! context, runs the prepare pipeline and then the test template, directly
//! or through the matrix runner for builders with variants.

mod queue;
mod steps;

pub use queue::LocalBuildQueue;
pub use steps::{prepare_pipeline, run_template};

use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{BuilderConfig, MobciConfig};
use crate::context::{properties::*, BuildContext};
use crate::errors::{MobciError, MobciResult};
use crate::matrix::{MatrixResult, MatrixRunner};
use crate::pipeline::{ExecutionOptions, PipelineExecutor, PipelineResult, RunVerdict};
use crate::scheduler::BuildRequest;
use crate::terminator::Platform;

/// What the test phase of a build did
#[derive(Debug, Clone)]
pub enum RunPhase {
    Single(PipelineResult),
    Matrix(MatrixResult),
    /// The prepare pipeline failed
    NotRun,
}

/// Outcome of a whole build
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub builder: String,
    pub build_id: String,
    pub prepare: PipelineResult,
    pub run: RunPhase,
    pub verdict: RunVerdict,
}

impl BuildOutcome {
    pub fn print_summary(&self) {
        println!();
        let verdict = match self.verdict {
            RunVerdict::Success => self.verdict.to_string().green(),
            RunVerdict::Warnings => self.verdict.to_string().yellow(),
            RunVerdict::Failure => self.verdict.to_string().red(),
        };
        println!("{} {} {}", "Build".bold(), self.build_id.bold(), verdict.bold());

        if let RunPhase::Matrix(ref matrix) = self.run {
            matrix.print_summary();
        }
    }
}

/// Runs builds of configured builders
pub struct BuildRunner {
    config: Arc<MobciConfig>,
    executor: PipelineExecutor,
    self_exe: PathBuf,
    host: String,
}

impl BuildRunner {
    /// Runner that calls back into the current executable for the kill
    /// and check steps
    pub fn new(config: Arc<MobciConfig>) -> MobciResult<Self> {
        Ok(Self {
            config,
            executor: PipelineExecutor::with_default_executors(),
            self_exe: std::env::current_exe()?,
            host: current_host_name(),
        })
    }

    pub fn with_executor(mut self, executor: PipelineExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_self_exe(mut self, path: impl Into<PathBuf>) -> Self {
        self.self_exe = path.into();
        self
    }

    pub fn with_host_name(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn config(&self) -> &MobciConfig {
        &self.config
    }

    /// Fresh context for build `build_number` of `request.builder`
    pub fn create_context(&self, request: &BuildRequest, build_number: u64) -> MobciResult<BuildContext> {
        let builder = self.config.builder(&request.builder)?;
        let app = self.config.app(&builder.app)?;
        let platform: Platform = builder.platform.parse()?;

        let mut ctx = BuildContext::new();
        ctx.set(BUILDER_NAME, request.builder.as_str());
        ctx.set(BUILD_NUMBER, build_number);
        ctx.set(HOST_NAME, self.host.as_str());
        register_build_id(&mut ctx);

        let build_dir = self.config.work_root().join(ctx.get_string(BUILD_ID)?);
        let app_dir = match &app.directory {
            Some(dir) => build_dir.join(dir),
            None => build_dir.clone(),
        };

        ctx.set(PLATFORM, platform.as_str());
        ctx.set(BUILD_DIR, build_dir.as_path());
        ctx.set(APP_DIR, app_dir.as_path());
        ctx.set(LOG_DIR, build_dir.join("logs").as_path());
        ctx.set(STORE_URI, self.config.store.uri.as_str());
        ctx.set(STORE_DATABASE, self.config.store.database.as_str());
        ctx.set(OVERALL_TIMEOUT, app.timeout_secs);
        ctx.set(RUN_TIMEOUT, run_timeout_secs(app.timeout_secs));
        ctx.set(TEST_SUMMARY, build_dir.join("test-summary.json").as_path());
        ctx.set(DEFAULT_REPOS_CONFIG, build_dir.join("repos.json").as_path());
        ctx.set(EXTERNAL_REPOS_CONFIG, build_dir.join("repos-external.json").as_path());

        for (name, value) in builder.properties.iter().chain(&request.properties) {
            ctx.set(name.as_str(), value.as_str());
        }

        Ok(ctx)
    }

    /// Run one build to completion
    pub async fn run_build(
        &self,
        request: &BuildRequest,
        build_number: u64,
        cancel: CancellationToken,
    ) -> MobciResult<BuildOutcome> {
        let builder = self.config.builder(&request.builder)?;
        let app = self.config.app(&builder.app)?;
        let mut ctx = self.create_context(request, build_number)?;
        let build_id = ctx.get_string(BUILD_ID)?;
        let build_dir = PathBuf::from(ctx.get_string(BUILD_DIR)?);

        info!(%build_id, reason = %request.reason, "starting build");
        println!("{} {}", "Build".bold(), build_id.cyan());

        tokio::fs::create_dir_all(build_dir.join("logs"))
            .await
            .map_err(|e| MobciError::FileWriteError {
                path: build_dir.clone(),
                error: e.to_string(),
            })?;
        self.config
            .write_repos_config(&PathBuf::from(ctx.get_string(DEFAULT_REPOS_CONFIG)?))
            .await?;

        let mut options = ExecutionOptions::new(&build_dir);
        options.cancel = cancel;

        let prepare = steps::prepare_pipeline(&self.config, app, &self.self_exe);
        let prepared = self.executor.run(&prepare, &mut ctx, &options).await?;

        let template = steps::run_template(&self.config, app, &self.self_exe);
        let (run, verdict) = if prepared.verdict == RunVerdict::Failure {
            warn!(%build_id, "prepare failed, tests not run");
            (RunPhase::NotRun, RunVerdict::Failure)
        } else if builder.is_matrix() {
            let matrix = MatrixRunner::new(&self.executor)
                .run_matrix(&builder.variants, &template, &ctx, &options)
                .await;
            let verdict = prepared.verdict.worst(matrix.verdict);
            (RunPhase::Matrix(matrix), verdict)
        } else {
            let result = self.executor.run(&template, &mut ctx, &options).await?;
            let verdict = prepared.verdict.worst(result.verdict);
            (RunPhase::Single(result), verdict)
        };

        info!(%build_id, %verdict, "build finished");
        Ok(BuildOutcome {
            builder: request.builder.clone(),
            build_id,
            prepare: prepared,
            run,
            verdict,
        })
    }

    pub fn builder(&self, name: &str) -> MobciResult<&BuilderConfig> {
        self.config.builder(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::TestSummary;
    use crate::executors::{ExecutionResult, Executor, Invocation, PropertyExecutor, ResolvedAction, SummaryExecutor};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Stands in for every external program. The check step writes a
    /// summary with `failed` failures; steps named in `failing` exit 1.
    /// Running the step named in `cancel_on` cancels `cancel`.
    #[derive(Clone, Default)]
    struct FakeHost {
        programs: Arc<Mutex<Vec<(String, Vec<String>)>>>,
        failed: u64,
        failing: Vec<&'static str>,
        cancel_on: Option<&'static str>,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl Executor for FakeHost {
        async fn execute(&self, invocation: &Invocation<'_>) -> MobciResult<ExecutionResult> {
            let ResolvedAction::Exec { program, args } = invocation.action else {
                unreachable!("builds only run programs");
            };
            self.programs
                .lock()
                .unwrap()
                .push((invocation.step_id.to_string(), args.clone()));

            if self.cancel_on.is_some_and(|id| id == invocation.step_id) {
                self.cancel.cancel();
            }
            if self.failing.iter().any(|id| *id == invocation.step_id) {
                return Ok(ExecutionResult::failure(String::new(), Some(1), Duration::ZERO));
            }
            if invocation.step_id == "check-results" {
                let file = args.iter().skip_while(|a| *a != "--file").nth(1).unwrap();
                TestSummary::from_counts(10, self.failed).write(Path::new(file)).await?;
            }
            let stdout = if program == "git" { "0123abc\n" } else { "" };
            Ok(ExecutionResult::success(stdout.to_string(), Duration::ZERO))
        }
    }

    fn runner(temp: &TempDir, host: &FakeHost) -> BuildRunner {
        let yaml = format!(
            r#"
work_dir: {}
store: {{ uri: "http://localhost:5984" }}
apps: {{ spec: {{ command: [node, run.js], timeout_secs: 1800 }} }}
repos: {{ cordova-android: {{ url: "https://example.com/android.git" }} }}
builders:
  android-nexus: {{ platform: android, app: spec }}
  windows-store:
    platform: windows
    app: spec
    variants:
      - {{ label: store80, extra_args: ["--winvers=store80"] }}
      - {{ label: phone81, extra_args: ["--winvers=phone81"] }}
"#,
            temp.path().display()
        );
        let config = MobciConfig::parse(&yaml, Path::new("mobci.yaml")).unwrap();

        let mut executor = PipelineExecutor::new();
        executor.register_executor("process", Box::new(host.clone()));
        executor.register_executor("property", Box::new(PropertyExecutor));
        executor.register_executor("summary", Box::new(SummaryExecutor));

        BuildRunner::new(Arc::new(config))
            .unwrap()
            .with_executor(executor)
            .with_self_exe("/opt/mobci")
            .with_host_name("worker1")
    }

    fn args_of(host: &FakeHost, step: &str) -> Vec<String> {
        host.programs
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == step)
            .map(|(_, args)| args.clone())
            .unwrap()
    }

    #[test]
    fn test_context_of_new_build() {
        let temp = TempDir::new().unwrap();
        let runner = runner(&temp, &FakeHost::default());
        let request = BuildRequest::new("android-nexus", "test").with_property("extra", "1");

        let ctx = runner.create_context(&request, 7).unwrap();

        assert_eq!(ctx.get_string(BUILD_ID).unwrap(), "android-nexus-7-worker1");
        assert_eq!(ctx.get_string(RUN_TIMEOUT).unwrap(), "1740");
        assert_eq!(
            PathBuf::from(ctx.get_string(BUILD_DIR).unwrap()),
            temp.path().join("android-nexus-7-worker1")
        );
        assert_eq!(ctx.get_string("extra").unwrap(), "1");
        assert!(!ctx.contains(REPOS_CONFIG_URI));
    }

    #[test]
    fn test_unknown_builder_is_rejected() {
        let temp = TempDir::new().unwrap();
        let runner = runner(&temp, &FakeHost::default());
        let err = runner
            .create_context(&BuildRequest::new("blackberry", "test"), 1)
            .unwrap_err();
        assert!(matches!(err, MobciError::UnknownBuilder { .. }));
    }

    #[tokio::test]
    async fn test_single_build_with_failures_warns() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost {
            failed: 2,
            ..Default::default()
        };
        let runner = runner(&temp, &host);

        let outcome = runner
            .run_build(&BuildRequest::new("android-nexus", "test"), 1, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.verdict, RunVerdict::Warnings);
        assert_eq!(outcome.build_id, "android-nexus-1-worker1");

        let build_dir = temp.path().join("android-nexus-1-worker1");
        assert_eq!(
            args_of(&host, "clone").last().map(PathBuf::from),
            Some(build_dir.join("repos.json"))
        );
        assert!(build_dir.join("repos.json").exists());
        assert!(args_of(&host, "run-tests").contains(&"1740".to_string()));
        assert!(args_of(&host, "run-tests").contains(&"0123abc".to_string()));
        assert!(outcome.prepare.record("download-repos-config").is_some());
    }

    #[tokio::test]
    async fn test_external_repos_config_is_downloaded() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost::default();
        let runner = runner(&temp, &host);
        let request = BuildRequest::new("android-nexus", "test")
            .with_property(REPOS_CONFIG_URI, "https://example.com/repos.json");

        let outcome = runner.run_build(&request, 2, CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.verdict, RunVerdict::Success);
        let download = args_of(&host, "download-repos-config");
        assert_eq!(download.last().unwrap(), "https://example.com/repos.json");
        assert!(args_of(&host, "clone").last().unwrap().ends_with("repos-external.json"));
    }

    #[tokio::test]
    async fn test_failed_prepare_skips_tests() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost {
            failing: vec!["clone"],
            ..Default::default()
        };
        let runner = runner(&temp, &host);

        let outcome = runner
            .run_build(&BuildRequest::new("android-nexus", "test"), 3, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.verdict, RunVerdict::Failure);
        assert!(matches!(outcome.run, RunPhase::NotRun));
        assert!(host.programs.lock().unwrap().iter().all(|(id, _)| id != "run-tests"));
    }

    #[tokio::test]
    async fn test_matrix_build_runs_every_variant() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost {
            failing: vec!["run-tests", "check-results"],
            ..Default::default()
        };
        let runner = runner(&temp, &host);

        let outcome = runner
            .run_build(&BuildRequest::new("windows-store", "test"), 4, CancellationToken::new())
            .await
            .unwrap();

        let RunPhase::Matrix(ref matrix) = outcome.run else {
            panic!("windows-store is a matrix builder");
        };
        assert_eq!(matrix.variants.len(), 2);
        assert_eq!(outcome.verdict, RunVerdict::Warnings);

        let runs: Vec<_> = host
            .programs
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == "run-tests")
            .map(|(_, args)| args.last().cloned().unwrap())
            .collect();
        assert_eq!(runs, vec!["--winvers=store80", "--winvers=phone81"]);
    }

    #[tokio::test]
    async fn test_cancelled_matrix_build_fails() {
        let temp = TempDir::new().unwrap();
        let host = FakeHost {
            cancel_on: Some("run-tests"),
            ..Default::default()
        };
        let runner = runner(&temp, &host);

        let outcome = runner
            .run_build(&BuildRequest::new("windows-store", "test"), 5, host.cancel.clone())
            .await
            .unwrap();

        let RunPhase::Matrix(ref matrix) = outcome.run else {
            panic!("windows-store is a matrix builder");
        };
        assert!(matrix.cancelled);
        assert_eq!(matrix.variants.len(), 1);
        assert_eq!(outcome.verdict, RunVerdict::Failure);

        let programs = host.programs.lock().unwrap();
        assert_eq!(programs.iter().filter(|(id, _)| id == "run-tests").count(), 1);
        assert!(programs.iter().all(|(id, _)| id != "check-results"));
    }
}
