//! Next-trigger calculation
//!
//! A task's period decides two intervals:
//! - the *first* trigger, computed from the configured clock time or
//!   minute offset relative to now
//! - every *subsequent* trigger, a fixed step per period type
//!
//! A target equal to the current minute counts as already passed and rolls
//! over to the next occurrence.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Timelike};
use std::fmt;

use crate::error::{Error, Result};

/// Interval used by `minute` tasks, for first and subsequent triggers
pub const MINUTE_PERIOD_MINUTES: i64 = 5;

/// Re-arm step for `hour` tasks
pub const HOURLY_STEP_MINUTES: i64 = 60;

/// Re-arm step for `day` tasks
pub const DAILY_STEP_MINUTES: i64 = 1440;

/// A task's trigger period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// Once a day at `hour:minute` local time (wire: `day` / `HH:MM`)
    Daily {
        /// Hour of day, 0-23
        hour: u32,
        /// Minute of hour, 0-59
        minute: u32,
    },
    /// Once an hour at `minute` (wire: `hour` / `MM`)
    Hourly {
        /// Minute of hour, 0-59
        minute: u32,
    },
    /// Every five minutes (wire: `minute`, value ignored)
    EveryFiveMinutes,
}

impl Period {
    /// Parse the wire encoding used by the inventory service
    pub fn parse(period_type: &str, value: &str) -> Result<Self> {
        let invalid = || Error::InvalidPeriod {
            period_type: period_type.to_string(),
            value: value.to_string(),
        };

        match period_type {
            "day" => {
                let (h, m) = value.trim().split_once(':').ok_or_else(invalid)?;
                let hour: u32 = h.parse().map_err(|_| invalid())?;
                let minute: u32 = m.parse().map_err(|_| invalid())?;
                if hour > 23 || minute > 59 {
                    return Err(invalid());
                }
                Ok(Self::Daily { hour, minute })
            }
            "hour" => {
                let minute: u32 = value.trim().parse().map_err(|_| invalid())?;
                if minute > 59 {
                    return Err(invalid());
                }
                Ok(Self::Hourly { minute })
            }
            "minute" => Ok(Self::EveryFiveMinutes),
            _ => Err(invalid()),
        }
    }

    /// Wire encoding: period type and period value
    pub fn to_wire(&self) -> (&'static str, String) {
        match self {
            Self::Daily { hour, minute } => ("day", format!("{:02}:{:02}", hour, minute)),
            Self::Hourly { minute } => ("hour", minute.to_string()),
            Self::EveryFiveMinutes => ("minute", String::new()),
        }
    }

    /// Minutes between triggers after the first one fired
    pub fn rearm_minutes(&self) -> i64 {
        match self {
            Self::Daily { .. } => DAILY_STEP_MINUTES,
            Self::Hourly { .. } => HOURLY_STEP_MINUTES,
            Self::EveryFiveMinutes => MINUTE_PERIOD_MINUTES,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily { hour, minute } => write!(f, "daily at {:02}:{:02}", hour, minute),
            Self::Hourly { minute } => write!(f, "hourly at :{:02}", minute),
            Self::EveryFiveMinutes => write!(f, "every {} minutes", MINUTE_PERIOD_MINUTES),
        }
    }
}

/// Whole minutes from `now` until the first trigger of `period`.
///
/// Never negative.
pub fn next_trigger_minutes<Tz: TimeZone>(period: &Period, now: &DateTime<Tz>) -> i64 {
    let local = now.naive_local();
    let current = (local.hour(), local.minute());

    let target = match *period {
        Period::EveryFiveMinutes => return MINUTE_PERIOD_MINUTES,
        Period::Daily { hour, minute } => {
            let today = at_clock(&local, hour, minute);
            if (hour, minute) > current {
                today
            } else {
                today + Duration::days(1)
            }
        }
        Period::Hourly { minute } => {
            let this_hour = at_clock(&local, current.0, minute);
            if minute > current.1 {
                this_hour
            } else {
                this_hour + Duration::hours(1)
            }
        }
    };

    let seconds = match now.timezone().from_local_datetime(&target).earliest() {
        Some(instant) => instant.signed_duration_since(now.clone()).num_seconds(),
        // Target falls into a DST gap; measure on the local wall clock instead
        None => (target - local).num_seconds(),
    };

    seconds.max(0).div_euclid(60)
}

fn at_clock(local: &NaiveDateTime, hour: u32, minute: u32) -> NaiveDateTime {
    local
        .date()
        .and_hms_opt(hour, minute, 0)
        .unwrap_or(*local)
}
