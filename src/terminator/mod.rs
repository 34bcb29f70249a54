// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Stray process termination
//!
//! Emulators and simulators left behind by an earlier run hold devices and
//! ports. Before a run the terminator asks the host to kill the processes
//! known for the target platform. Termination is best effort: a failed kill
//! is logged and reported, never turned into a build failure, unless the
//! caller opts out of the ignore-failures policy.

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::{MobciError, MobciResult};

/// Target platform of a builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Android,
    Ios,
    Windows,
    Browser,
}

impl Platform {
    pub const ALL: [Platform; 4] = [Self::Android, Self::Ios, Self::Windows, Self::Browser];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Windows => "windows",
            Self::Browser => "browser",
        }
    }
}

impl FromStr for Platform {
    type Err = MobciError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "android" => Ok(Self::Android),
            "ios" => Ok(Self::Ios),
            "windows" => Ok(Self::Windows),
            "browser" => Ok(Self::Browser),
            _ => Err(MobciError::UnknownPlatform {
                platform: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating system of the build host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Windows,
    MacOs,
    Linux,
}

impl HostOs {
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }
}

/// Process names to terminate for a platform on a host
pub fn tasks_for(platform: Platform, host: HostOs) -> &'static [&'static str] {
    match (platform, host) {
        (Platform::Android, HostOs::Windows) => &["emulator-x86.exe", "emulator-arm.exe", "adb.exe"],
        (Platform::Android, _) => &["emulator64-x86", "emulator64-arm", "adb"],
        (Platform::Ios, _) => &["Simulator", "iOS Simulator"],
        (Platform::Windows, _) => &["WWAHost.exe", "Xde.exe"],
        (Platform::Browser, _) => &[],
    }
}

/// Issues the kill request for a single process name
#[async_trait]
pub trait TaskKiller: Send + Sync {
    /// Returns the exit code of the kill command
    async fn kill(&self, task: &str) -> std::io::Result<Option<i32>>;
}

/// Kills processes with the host's own tools
pub struct SystemKiller {
    host: HostOs,
}

impl SystemKiller {
    pub fn new(host: HostOs) -> Self {
        Self { host }
    }
}

#[async_trait]
impl TaskKiller for SystemKiller {
    async fn kill(&self, task: &str) -> std::io::Result<Option<i32>> {
        let mut cmd = match self.host {
            HostOs::Windows => {
                let mut cmd = Command::new("taskkill");
                cmd.args(["/F", "/IM", task, "/T"]);
                cmd
            }
            HostOs::MacOs | HostOs::Linux => {
                let mut cmd = Command::new("killall");
                cmd.args(["-9", task]);
                cmd
            }
        };

        let status = cmd
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .status()
            .await?;
        Ok(status.code())
    }
}

/// How termination failures are treated
#[derive(Debug, Clone, Copy)]
pub struct KillPolicy {
    /// Upper bound on each kill command
    pub wait: Duration,
    /// Log failures instead of returning them
    pub ignore_failures: bool,
}

impl Default for KillPolicy {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(30),
            ignore_failures: true,
        }
    }
}

/// Outcome of one kill request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillOutcome {
    Killed,
    /// Nonzero exit, usually because no such process was running
    ExitCode(Option<i32>),
    TimedOut,
    SpawnFailed(String),
}

impl KillOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Killed)
    }
}

/// Outcome of a termination pass
#[derive(Debug, Clone)]
pub struct TerminationReport {
    pub platform: Platform,
    pub attempts: Vec<(String, KillOutcome)>,
}

impl TerminationReport {
    pub fn tasks(&self) -> Vec<&str> {
        self.attempts.iter().map(|(t, _)| t.as_str()).collect()
    }

    pub fn failures(&self) -> usize {
        self.attempts.iter().filter(|(_, o)| !o.is_success()).count()
    }
}

/// Best-effort killer of stale platform processes
pub struct TaskTerminator<K> {
    killer: K,
    host: HostOs,
    policy: KillPolicy,
}

impl TaskTerminator<SystemKiller> {
    /// Terminator for the current host
    pub fn for_current_host() -> Self {
        let host = HostOs::current();
        Self::new(SystemKiller::new(host), host)
    }
}

impl<K: TaskKiller> TaskTerminator<K> {
    pub fn new(killer: K, host: HostOs) -> Self {
        Self {
            killer,
            host,
            policy: KillPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: KillPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Process names that would be terminated for `platform`
    pub fn tasks(&self, platform: &str) -> MobciResult<&'static [&'static str]> {
        let platform: Platform = platform.parse()?;
        Ok(tasks_for(platform, self.host))
    }

    /// Terminate the known processes of a platform
    ///
    /// Unknown platforms fail before any command is issued. Every kill is
    /// awaited (bounded by the policy's wait) before this returns.
    pub async fn kill_tasks(&self, platform: &str) -> MobciResult<TerminationReport> {
        let platform: Platform = platform.parse()?;
        let tasks = tasks_for(platform, self.host);

        if tasks.is_empty() {
            warn!(%platform, "no known tasks to terminate");
        }

        let mut attempts = Vec::with_capacity(tasks.len());
        for task in tasks {
            debug!(task, "terminating");
            let outcome = match tokio::time::timeout(self.policy.wait, self.killer.kill(task)).await {
                Ok(Ok(Some(0))) => KillOutcome::Killed,
                Ok(Ok(code)) => KillOutcome::ExitCode(code),
                Ok(Err(e)) => KillOutcome::SpawnFailed(e.to_string()),
                Err(_) => KillOutcome::TimedOut,
            };

            if !outcome.is_success() {
                if !self.policy.ignore_failures {
                    return Err(MobciError::TaskTermination {
                        task: task.to_string(),
                        reason: format!("{:?}", outcome),
                    });
                }
                warn!(task, ?outcome, "task termination did not succeed");
            }

            attempts.push((task.to_string(), outcome));
        }

        info!(%platform, tasks = attempts.len(), "task termination finished");
        Ok(TerminationReport { platform, attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingKiller {
        calls: Mutex<Vec<String>>,
        exit_code: Option<i32>,
    }

    #[async_trait]
    impl TaskKiller for RecordingKiller {
        async fn kill(&self, task: &str) -> std::io::Result<Option<i32>> {
            self.calls.lock().unwrap().push(task.to_string());
            Ok(self.exit_code)
        }
    }

    #[test]
    fn test_android_tasks_on_unix_host() {
        for host in [HostOs::Linux, HostOs::MacOs] {
            assert_eq!(
                tasks_for(Platform::Android, host),
                &["emulator64-x86", "emulator64-arm", "adb"]
            );
        }
        assert_eq!(
            tasks_for(Platform::Android, HostOs::Windows),
            &["emulator-x86.exe", "emulator-arm.exe", "adb.exe"]
        );
    }

    #[test]
    fn test_platform_parsing() {
        assert_eq!("Android".parse::<Platform>().unwrap(), Platform::Android);
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>().unwrap(), platform);
        }
    }

    #[tokio::test]
    async fn test_unknown_platform_issues_no_command() {
        let terminator = TaskTerminator::new(RecordingKiller::default(), HostOs::Linux);

        let err = terminator.kill_tasks("foo").await.unwrap_err();
        assert!(matches!(err, MobciError::UnknownPlatform { ref platform } if platform == "foo"));
        assert!(terminator.killer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_kills_every_android_task() {
        let killer = RecordingKiller {
            exit_code: Some(0),
            ..Default::default()
        };
        let terminator = TaskTerminator::new(killer, HostOs::Linux);

        let report = terminator.kill_tasks("android").await.unwrap();
        assert_eq!(report.tasks(), vec!["emulator64-x86", "emulator64-arm", "adb"]);
        assert_eq!(report.failures(), 0);
        assert_eq!(terminator.killer.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_kills_are_not_fatal() {
        let killer = RecordingKiller {
            exit_code: Some(1),
            ..Default::default()
        };
        let terminator = TaskTerminator::new(killer, HostOs::MacOs);

        let report = terminator.kill_tasks("ios").await.unwrap();
        assert_eq!(report.failures(), 2);
        assert_eq!(report.attempts[0].1, KillOutcome::ExitCode(Some(1)));
    }

    #[tokio::test]
    async fn test_strict_policy_surfaces_failure() {
        let killer = RecordingKiller {
            exit_code: Some(1),
            ..Default::default()
        };
        let terminator = TaskTerminator::new(killer, HostOs::Linux).with_policy(KillPolicy {
            wait: Duration::from_secs(1),
            ignore_failures: false,
        });

        let err = terminator.kill_tasks("windows").await.unwrap_err();
        assert!(matches!(err, MobciError::TaskTermination { .. }));
    }

    #[tokio::test]
    async fn test_browser_has_no_tasks() {
        let terminator = TaskTerminator::new(RecordingKiller::default(), HostOs::Linux);
        let report = terminator.kill_tasks("browser").await.unwrap();
        assert!(report.attempts.is_empty());
    }
}
