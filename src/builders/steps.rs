// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Standard build pipelines

use std::path::Path;
use std::time::Duration;

use crate::config::{AppConfig, CommandSpec, MobciConfig};
use crate::context::properties::*;
use crate::pipeline::{CommandArg, Guard, Pipeline, Step};

/// Upper bound on the kill-tasks step
const KILL_TIMEOUT: Duration = Duration::from_secs(60);

fn command_step(id: &str, spec: &CommandSpec, extra: impl IntoIterator<Item = CommandArg>) -> Step {
    let args = spec.args.iter().cloned().map(CommandArg::Literal).chain(extra);
    Step::exec(id, spec.program.clone(), args)
}

fn app_step(step: Step, app: &AppConfig) -> Step {
    match &app.directory {
        Some(dir) => step.in_dir(dir),
        None => step,
    }
}

/// Steps that get a build ready to run tests
///
/// Clears stale emulators, picks the repository matrix (downloaded when the
/// build carries `repos_config_uri`, the configured default otherwise),
/// checks out and installs, then records the app revision.
pub fn prepare_pipeline(config: &MobciConfig, app: &AppConfig, self_exe: &Path) -> Pipeline {
    let external = Guard::has_property(REPOS_CONFIG_URI);

    Pipeline::new("prepare")
        .step(
            Step::exec(
                "kill-tasks",
                self_exe.display().to_string(),
                [CommandArg::lit("kill"), CommandArg::lit("--platform"), CommandArg::prop(PLATFORM)],
            )
            .describe("Terminate stale emulators and simulators")
            .with_timeout(KILL_TIMEOUT)
            .halt_on_failure(false),
        )
        .step(
            command_step(
                "download-repos-config",
                &config.tools.download,
                [CommandArg::prop(EXTERNAL_REPOS_CONFIG), CommandArg::prop(REPOS_CONFIG_URI)],
            )
            .describe("Download the requested repository matrix")
            .when(external.clone()),
        )
        .step(
            Step::set_property(
                "use-external-repos-config",
                REPOS_CONFIG,
                CommandArg::prop(EXTERNAL_REPOS_CONFIG),
            )
            .when(external.clone()),
        )
        .step(
            Step::set_property(
                "use-default-repos-config",
                REPOS_CONFIG,
                CommandArg::prop(DEFAULT_REPOS_CONFIG),
            )
            .when(external.complement()),
        )
        .step(
            command_step("clone", &config.tools.clone, [CommandArg::prop(REPOS_CONFIG)])
                .describe("Check out the repositories"),
        )
        .step(
            command_step("install", &config.tools.install, [CommandArg::prop(PLATFORM)])
                .describe("Install the test app"),
        )
        .step(
            app_step(
                Step::exec(
                    "app-revision",
                    "git",
                    [CommandArg::lit("rev-parse"), CommandArg::lit("HEAD")],
                ),
                app,
            )
            .store_output_as(APP_REVISION),
        )
}

/// Steps that run the tests and grade the build
///
/// Matrix builds run this template once per variant, with the variant's
/// arguments appended to the test command.
pub fn run_template(config: &MobciConfig, app: &AppConfig, self_exe: &Path) -> Pipeline {
    let (program, leading) = match app.command.split_first() {
        Some((program, rest)) => (program.clone(), rest.to_vec()),
        None => (String::new(), Vec::new()),
    };

    let run_args = leading.into_iter().map(CommandArg::Literal).chain([
        CommandArg::lit("--platform"),
        CommandArg::prop(PLATFORM),
        CommandArg::lit("--id"),
        CommandArg::prop(BUILD_ID),
        CommandArg::lit("--couchdb"),
        CommandArg::prop(STORE_URI),
        CommandArg::lit("--timeout"),
        CommandArg::prop(RUN_TIMEOUT),
        CommandArg::lit("--sha"),
        CommandArg::prop(APP_REVISION),
        CommandArg::VariantArgs,
    ]);

    let mut pipeline = Pipeline::new("run").step(
        app_step(Step::exec("run-tests", program, run_args), app)
            .describe("Run the test app")
            .with_timeout(Duration::from_secs(app.timeout_secs))
            .halt_on_failure(false),
    );

    if let Some(logs) = &config.tools.logs {
        pipeline = pipeline.step(
            command_step("gather-logs", logs, [CommandArg::prop(PLATFORM), CommandArg::prop(LOG_DIR)])
                .describe("Collect device logs")
                .halt_on_failure(false),
        );
    }

    pipeline
        .step(
            Step::exec(
                "check-results",
                self_exe.display().to_string(),
                [
                    CommandArg::lit("check"),
                    CommandArg::lit("--id"),
                    CommandArg::prop(BUILD_ID),
                    CommandArg::lit("--couchdb"),
                    CommandArg::prop(STORE_URI),
                    CommandArg::lit("--database"),
                    CommandArg::prop(STORE_DATABASE),
                    CommandArg::lit("--file"),
                    CommandArg::prop(TEST_SUMMARY),
                ],
            )
            .describe("Fetch the result record")
            .with_timeout(Duration::from_secs(config.store.wait_secs * 2)),
        )
        .step(Step::read_summary("report-status", CommandArg::prop(TEST_SUMMARY)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PipelineValidator, StepAction};
    use std::path::PathBuf;

    const INITIAL: [&str; 15] = [
        BUILDER_NAME,
        BUILD_NUMBER,
        HOST_NAME,
        BUILD_ID,
        PLATFORM,
        BUILD_DIR,
        APP_DIR,
        LOG_DIR,
        STORE_URI,
        STORE_DATABASE,
        OVERALL_TIMEOUT,
        RUN_TIMEOUT,
        TEST_SUMMARY,
        DEFAULT_REPOS_CONFIG,
        EXTERNAL_REPOS_CONFIG,
    ];

    fn config() -> MobciConfig {
        MobciConfig::parse(
            r#"
store: { uri: "http://localhost:5984" }
apps: { spec: { command: [node, medic/run.js], timeout_secs: 1800, directory: mobilespec } }
tools: { logs: { program: node, args: [medic/log.js] } }
"#,
            Path::new("mobci.yaml"),
        )
        .unwrap()
    }

    #[test]
    fn test_pipelines_read_only_earlier_writes() {
        let config = config();
        let app = config.app("spec").unwrap();
        let exe = PathBuf::from("/usr/bin/mobci");

        let full = prepare_pipeline(&config, app, &exe).extend(run_template(&config, app, &exe).steps);
        let result = PipelineValidator::validate(&full, INITIAL);

        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(!result.has_warnings(), "{:?}", result.warnings);
    }

    #[test]
    fn test_run_step_carries_timeouts() {
        let config = config();
        let app = config.app("spec").unwrap();
        let template = run_template(&config, app, Path::new("mobci"));

        let run = template.get_step("run-tests").unwrap();
        assert_eq!(run.timeout, Some(Duration::from_secs(1800)));
        assert_eq!(run.workdir, Some(PathBuf::from("mobilespec")));
        let StepAction::Exec { program, args } = &run.action else {
            panic!("run-tests should run a program");
        };
        assert_eq!(program, "node");
        assert_eq!(args[0], CommandArg::lit("medic/run.js"));
        assert!(args.contains(&CommandArg::prop(RUN_TIMEOUT)));
        assert_eq!(args.last(), Some(&CommandArg::VariantArgs));

        assert_eq!(
            template.step_ids(),
            vec!["run-tests", "gather-logs", "check-results", "report-status"]
        );
    }

    #[test]
    fn test_kill_step_never_halts() {
        let config = config();
        let app = config.app("spec").unwrap();
        let prepare = prepare_pipeline(&config, app, Path::new("mobci"));

        let kill = prepare.get_step("kill-tasks").unwrap();
        assert!(!kill.halt_on_failure);
        assert!(prepare.get_step("clone").unwrap().halt_on_failure);
    }
}
