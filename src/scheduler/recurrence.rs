// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Minute/hour-stride recurrences

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::errors::{MobciError, MobciResult};

/// Fires at each of `minutes` during every hour divisible by `hour_stride`
///
/// `Recurrence::new([30], 2)` fires at 00:30, 02:30, 04:30 and so on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    minutes: BTreeSet<u32>,
    hour_stride: u32,
}

impl Recurrence {
    pub fn new(minutes: impl IntoIterator<Item = u32>, hour_stride: u32) -> MobciResult<Self> {
        let minutes: BTreeSet<u32> = minutes.into_iter().collect();

        if minutes.is_empty() {
            return Err(MobciError::Scheduler {
                message: "recurrence needs at least one trigger minute".into(),
            });
        }
        if let Some(m) = minutes.iter().find(|m| **m > 59) {
            return Err(MobciError::Scheduler {
                message: format!("trigger minute {} is out of range 0-59", m),
            });
        }
        if hour_stride == 0 || hour_stride > 24 {
            return Err(MobciError::Scheduler {
                message: format!("hour stride {} is out of range 1-24", hour_stride),
            });
        }

        Ok(Self { minutes, hour_stride })
    }

    pub fn minutes(&self) -> impl Iterator<Item = u32> + '_ {
        self.minutes.iter().copied()
    }

    pub fn hour_stride(&self) -> u32 {
        self.hour_stride
    }

    /// Whether the recurrence fires during the minute containing `t`
    pub fn matches(&self, t: NaiveDateTime) -> bool {
        t.hour() % self.hour_stride == 0 && self.minutes.contains(&t.minute())
    }

    /// First trigger time strictly after `t`
    pub fn next_after(&self, t: NaiveDateTime) -> NaiveDateTime {
        let hour_start = t
            .with_minute(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(t);

        // Every stride fires by hour 0 of the next day
        for offset in 0..48 {
            let hour = hour_start + Duration::hours(offset);
            if hour.hour() % self.hour_stride != 0 {
                continue;
            }
            for minute in &self.minutes {
                let candidate = hour + Duration::minutes(i64::from(*minute));
                if candidate > t {
                    return candidate;
                }
            }
        }

        debug_assert!(false, "a valid recurrence fires within two days");
        hour_start + Duration::days(1)
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes: Vec<String> = self.minutes.iter().map(u32::to_string).collect();
        write!(f, "minute {} every {}h", minutes.join(","), self.hour_stride)
    }
}
