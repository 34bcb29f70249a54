// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Configuration validation

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use super::MobciConfig;
use crate::context::properties::run_timeout_secs;
use crate::pipeline::ValidationResult;
use crate::terminator::Platform;

/// Names that end up in build ids and directory names
static SAFE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("valid name pattern"));

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &MobciConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Err(e) = url::Url::parse(&config.store.uri) {
            result.add_error(&format!("Store URI '{}' is invalid: {}", config.store.uri, e));
        }
        if config.store.wait_secs == 0 {
            result.add_error("Store wait must be greater than zero");
        }

        for (name, app) in &config.apps {
            if app.command.first().map_or(true, |p| p.trim().is_empty()) {
                result.add_error(&format!("App '{}': Command is empty", name));
            }
            if app.timeout_secs == 0 {
                result.add_error(&format!("App '{}': Timeout must be greater than zero", name));
            } else if run_timeout_secs(app.timeout_secs) == app.timeout_secs {
                result.add_warning(&format!(
                    "App '{}': Timeout of {}s leaves no headroom for teardown",
                    name, app.timeout_secs
                ));
            }
        }

        if config.repos.is_empty() {
            result.add_warning("No repositories configured; builds need an external repos config");
        }

        for (name, builder) in &config.builders {
            if !SAFE_NAME.is_match(name) {
                result.add_error(&format!(
                    "Builder '{}': Name may only contain letters, digits, '.', '_' and '-'",
                    name
                ));
            }
            if let Err(e) = builder.platform.parse::<Platform>() {
                result.add_error(&format!("Builder '{}': {}", name, e));
            }
            if !config.apps.contains_key(&builder.app) {
                result.add_error(&format!("Builder '{}': Unknown app '{}'", name, builder.app));
            }

            let mut labels = HashSet::new();
            for variant in &builder.variants {
                if !SAFE_NAME.is_match(&variant.label) {
                    result.add_error(&format!(
                        "Builder '{}': Variant label '{}' is not a valid file name part",
                        name, variant.label
                    ));
                }
                if !labels.insert(&variant.label) {
                    result.add_error(&format!(
                        "Builder '{}': Duplicate variant '{}'",
                        name, variant.label
                    ));
                }
            }
        }

        let mut schedule_names = HashSet::new();
        for schedule in &config.schedules {
            if !schedule_names.insert(&schedule.name) {
                result.add_error(&format!("Duplicate schedule name: '{}'", schedule.name));
            }
            if let Err(e) = schedule.to_entry() {
                result.add_error(&format!("Schedule '{}': {}", schedule.name, e));
            }
            if schedule.builders.is_empty() {
                result.add_warning(&format!("Schedule '{}' triggers no builders", schedule.name));
            }
            for builder in &schedule.builders {
                if !config.builders.contains_key(builder) {
                    result.add_error(&format!(
                        "Schedule '{}': Unknown builder '{}'",
                        schedule.name, builder
                    ));
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn parse(yaml: &str) -> MobciConfig {
        MobciConfig::parse(yaml, Path::new("mobci.yaml")).unwrap()
    }

    #[test]
    fn test_valid_config() {
        let config = parse(
            r#"
store: { uri: "http://localhost:5984" }
apps: { spec: { command: [node, run.js], timeout_secs: 900 } }
repos: { cordova-ios: { url: "https://example.com/ios.git" } }
builders: { ios-sim: { platform: ios, app: spec } }
schedules: [ { name: hourly, minutes: [0], builders: [ios-sim] } ]
"#,
        );

        let result = ConfigValidator::validate(&config);
        assert!(result.is_valid(), "{:?}", result.errors);
        assert!(!result.has_warnings(), "{:?}", result.warnings);
    }

    #[test]
    fn test_reports_bad_references() {
        let config = parse(
            r#"
store: { uri: "not a uri" }
apps: { spec: { command: [node] } }
builders:
  "bad name": { platform: blackberry, app: missing }
schedules:
  - { name: nightly, minutes: [75], builders: [nope] }
"#,
        );

        let errors = ConfigValidator::validate(&config).errors;
        assert!(errors.iter().any(|e| e.contains("Store URI")));
        assert!(errors.iter().any(|e| e.contains("Unknown platform")));
        assert!(errors.iter().any(|e| e.contains("Unknown app 'missing'")));
        assert!(errors.iter().any(|e| e.contains("Name may only contain")));
        assert!(errors.iter().any(|e| e.contains("out of range")));
        assert!(errors.iter().any(|e| e.contains("Unknown builder 'nope'")));
    }

    #[test]
    fn test_short_timeout_warns() {
        let config = parse(
            r#"
store: { uri: "http://localhost:5984" }
apps: { spec: { command: [node, run.js], timeout_secs: 45 } }
"#,
        );

        let result = ConfigValidator::validate(&config);
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("headroom")));
    }
}
