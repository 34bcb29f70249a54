// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Well-known property names

use super::BuildContext;

pub const BUILDER_NAME: &str = "buildername";
pub const BUILD_NUMBER: &str = "buildnumber";
pub const HOST_NAME: &str = "hostname";
pub const BUILD_ID: &str = "build_id";
pub const PLATFORM: &str = "platform";
pub const BUILD_DIR: &str = "build_dir";
pub const APP_DIR: &str = "app_dir";
pub const LOG_DIR: &str = "log_dir";
pub const STORE_URI: &str = "store_uri";
pub const STORE_DATABASE: &str = "store_database";
pub const OVERALL_TIMEOUT: &str = "overall_timeout";
pub const RUN_TIMEOUT: &str = "run_timeout";
pub const TEST_SUMMARY: &str = "test_summary";
pub const APP_REVISION: &str = "app_revision";

/// Repository matrix config the clone step reads
pub const REPOS_CONFIG: &str = "repos_config";
/// Caller-supplied matrix config location; selects the external config path
pub const REPOS_CONFIG_URI: &str = "repos_config_uri";
pub const DEFAULT_REPOS_CONFIG: &str = "default_repos_config";
pub const EXTERNAL_REPOS_CONFIG: &str = "external_repos_config";

/// Seconds the test app itself is allowed, leaving headroom for teardown
/// inside the step's overall timeout.
pub fn run_timeout_secs(overall_secs: u64) -> u64 {
    if overall_secs > 60 {
        overall_secs - 60
    } else {
        overall_secs
    }
}

pub fn format_build_id(builder: &str, build_number: u64, host: &str) -> String {
    format!("{}-{}-{}", builder, build_number, host)
}

/// Register `build_id` as a computed property over builder, number and host
pub fn register_build_id(ctx: &mut BuildContext) {
    ctx.set_computed(BUILD_ID, |p| {
        let number = p.get(BUILD_NUMBER)?;
        let number = number
            .as_int()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| crate::MobciError::PropertyComputation {
                name: BUILD_ID.to_string(),
                reason: format!("build number '{}' is not a non-negative integer", number),
            })?;

        Ok(format_build_id(&p.get_string(BUILDER_NAME)?, number, &p.get_string(HOST_NAME)?).into())
    });
}

/// Host name of this worker
pub fn current_host_name() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_timeout_leaves_headroom() {
        for overall in [61u64, 120, 1800, 7200] {
            assert_eq!(run_timeout_secs(overall), overall - 60);
        }
        assert_eq!(run_timeout_secs(60), 60);
        assert_eq!(run_timeout_secs(30), 30);
    }

    #[test]
    fn test_build_id_is_computed_from_parts() {
        let mut ctx = BuildContext::new();
        ctx.set(BUILDER_NAME, "android");
        ctx.set(BUILD_NUMBER, 42u64);
        ctx.set(HOST_NAME, "worker1");
        register_build_id(&mut ctx);

        assert_eq!(ctx.get_string(BUILD_ID).unwrap(), "android-42-worker1");
    }

    #[test]
    fn test_build_id_requires_earlier_parts() {
        let mut ctx = BuildContext::new();
        ctx.set(BUILDER_NAME, "android");
        register_build_id(&mut ctx);
        ctx.set(BUILD_NUMBER, 1u64);
        ctx.set(HOST_NAME, "worker1");

        assert!(ctx.get(BUILD_ID).is_err());
    }
}
