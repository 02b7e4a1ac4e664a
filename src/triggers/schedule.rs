// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipeflow contributors

//! Schedule trigger
//!
//! Fires on a cron schedule. The trigger remembers the last instant it fired
//! for and, on each check, fires for the next scheduled instant after it once
//! that instant has passed. A check fires at most once, so a trigger that was
//! not polled for a while catches up one instant per check.

use chrono::{DateTime, Duration, Timelike, Utc};
use cron::Schedule;
use serde_json::Value;
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Mutex;

use super::{lock, PollTrigger, RunRequest, TriggerBase};
use crate::errors::{PipeflowError, PipeflowResult};

/// Cron schedule trigger
#[derive(Debug)]
pub struct ScheduleTrigger {
    base: TriggerBase,
    expression: String,
    schedule: Schedule,
    last_fire: Mutex<DateTime<Utc>>,
}

impl ScheduleTrigger {
    /// Create a trigger that starts counting from now
    pub fn new(
        id: impl Into<String>,
        pipeline_name: impl Into<String>,
        expression: impl Into<String>,
    ) -> PipeflowResult<Self> {
        Self::starting_at(id, pipeline_name, expression, Utc::now())
    }

    /// Create a trigger as if it was started at `now`.
    ///
    /// The last fire is set to the latest scheduled instant at or before
    /// `now`, so instants that already passed never fire.
    pub fn starting_at(
        id: impl Into<String>,
        pipeline_name: impl Into<String>,
        expression: impl Into<String>,
        now: DateTime<Utc>,
    ) -> PipeflowResult<Self> {
        let base = TriggerBase::new(id, pipeline_name)?;
        let expression = expression.into();
        let schedule = parse_schedule(&expression).map_err(|reason| {
            PipeflowError::invalid_config_with_help(
                &base.id,
                format!("invalid cron expression '{}': {}", expression, reason),
                "Use five fields (min hour day month weekday) or six with seconds first",
            )
        })?;

        let last_fire = latest_at_or_before(&schedule, now);
        tracing::info!(
            trigger = %base.id,
            schedule = %expression,
            last_fire = %last_fire,
            "schedule trigger initialized"
        );

        Ok(Self {
            base,
            expression,
            schedule,
            last_fire: Mutex::new(last_fire),
        })
    }

    pub fn id(&self) -> &str {
        &self.base.id
    }

    pub fn pipeline_name(&self) -> &str {
        &self.base.pipeline_name
    }

    /// The cron expression as configured
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Last instant this trigger fired for
    pub fn last_fire(&self) -> DateTime<Utc> {
        *lock(&self.last_fire)
    }

    /// Next instant this trigger will fire for
    pub fn next_fire(&self) -> Option<DateTime<Utc>> {
        self.schedule.after(&self.last_fire()).next()
    }

    /// Check against an explicit clock value.
    ///
    /// Advancing the last fire and returning the request happen under the
    /// same lock.
    pub fn check_at(&self, now: DateTime<Utc>) -> Option<RunRequest> {
        let mut last_fire = lock(&self.last_fire);
        let next = self.schedule.after(&*last_fire).next()?;
        if now < next {
            return None;
        }
        *last_fire = next;
        drop(last_fire);

        tracing::debug!(trigger = %self.base.id, fire_time = %next, "schedule trigger fired");

        let mut params = self.base.parameters();
        params.insert(
            "scheduled_fire_time_utc".into(),
            Value::String(next.to_rfc3339()),
        );
        Some(self.base.request(params))
    }
}

impl PollTrigger for ScheduleTrigger {
    fn check(&self) -> Option<RunRequest> {
        self.check_at(Utc::now())
    }
}

/// Parse a cron expression.
///
/// Five-field expressions use crontab meaning and get a zero seconds field.
/// Six and seven field expressions are passed to the cron crate as they are.
fn parse_schedule(expression: &str) -> Result<Schedule, String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    let normalized = match fields.as_slice() {
        [minute, hour, day, month, weekday] => format!(
            "0 {} {} {} {} {}",
            minute,
            hour,
            day,
            month,
            crontab_weekdays(weekday)?
        ),
        [_, _, _, _, _, _] | [_, _, _, _, _, _, _] => fields.join(" "),
        other => return Err(format!("expected 5, 6 or 7 fields, found {}", other.len())),
    };

    Schedule::from_str(&normalized).map_err(|e| e.to_string())
}

/// Rewrite a crontab weekday field (0-7, Sunday as 0 or 7) into the cron
/// crate's numbering (1-7, Sunday as 1). Numeric items are expanded to an
/// explicit list; named days pass through untouched.
fn crontab_weekdays(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut days = BTreeSet::new();
    let mut named = Vec::new();

    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step = step
                    .parse::<usize>()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| format!("invalid weekday step in '{}'", item))?;
                (range, step)
            }
            None => (item, 1),
        };

        let bounds = if range == "*" {
            Some((0, 6))
        } else if let Some((start, end)) = range.split_once('-') {
            start.parse::<u32>().ok().zip(end.parse::<u32>().ok())
        } else {
            range.parse::<u32>().ok().map(|day| (day, day))
        };

        let Some((start, end)) = bounds else {
            named.push(item.to_string());
            continue;
        };
        if end > 7 || start > end {
            return Err(format!("invalid weekday '{}', expected 0-7", item));
        }

        for day in (start..=end).step_by(step) {
            days.insert(day % 7 + 1);
        }
    }

    let mut items: Vec<String> = days.iter().map(u32::to_string).collect();
    items.extend(named);
    Ok(items.join(","))
}

/// Latest scheduled instant that is not after `now`
fn latest_at_or_before(schedule: &Schedule, now: DateTime<Utc>) -> DateTime<Utc> {
    let whole_second = now.with_nanosecond(0).unwrap_or(now);
    let upper = whole_second + Duration::seconds(1);

    schedule
        .after(&upper)
        .rev()
        .take(2)
        .find(|t| *t <= now)
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Weekday};

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 10, 27, h, m, s).unwrap()
    }

    fn every_minute(now: DateTime<Utc>) -> ScheduleTrigger {
        ScheduleTrigger::starting_at("cron_m", "pipe_m", "* * * * *", now).unwrap()
    }

    #[test]
    fn test_invalid_expression_rejected() {
        let err = ScheduleTrigger::new("cron_bad", "pipe_bad", "invalid cron string").unwrap_err();
        assert!(matches!(err, PipeflowError::InvalidConfiguration { .. }));

        assert!(ScheduleTrigger::new("c", "p", "61 * * * *").is_err());
        assert!(ScheduleTrigger::new("c", "p", "* * *").is_err());
    }

    /// Friday 2023-10-27 12:00 UTC
    fn friday_noon() -> DateTime<Utc> {
        at(12, 0, 0)
    }

    fn next_fire(expression: &str) -> DateTime<Utc> {
        ScheduleTrigger::starting_at("c", "p", expression, friday_noon())
            .unwrap()
            .next_fire()
            .unwrap()
    }

    #[test]
    fn test_weekday_zero_and_seven_are_sunday() {
        let sunday = Utc.with_ymd_and_hms(2023, 10, 29, 9, 0, 0).unwrap();
        assert_eq!(next_fire("0 9 * * 0"), sunday);
        assert_eq!(next_fire("0 9 * * 7"), sunday);
        assert_eq!(next_fire("0 9 * * 0").weekday(), Weekday::Sun);
    }

    #[test]
    fn test_weekday_numbers_follow_crontab() {
        let monday = Utc.with_ymd_and_hms(2023, 10, 30, 9, 0, 0).unwrap();
        assert_eq!(next_fire("0 9 * * 1"), monday);
        assert_eq!(next_fire("0 9 * * 1-5"), monday);
        assert_eq!(next_fire("0 9 * * Mon-Fri"), monday);

        // Friday 09:00 already passed, so the next one is a week later
        let next_friday = Utc.with_ymd_and_hms(2023, 11, 3, 9, 0, 0).unwrap();
        assert_eq!(next_fire("0 9 * * 5"), next_friday);

        // Saturday, via a range ending on 7
        let saturday = Utc.with_ymd_and_hms(2023, 10, 28, 9, 0, 0).unwrap();
        assert_eq!(next_fire("0 9 * * 6-7"), saturday);
    }

    #[test]
    fn test_every_minute_on_sundays() {
        let trigger =
            ScheduleTrigger::starting_at("c", "p", "* * * * 0", friday_noon()).unwrap();
        let first = trigger.next_fire().unwrap();
        assert_eq!(first, Utc.with_ymd_and_hms(2023, 10, 29, 0, 0, 0).unwrap());
        assert!(trigger.check_at(at(23, 59, 0)).is_none());
    }

    #[test]
    fn test_weekday_field_rewrite() {
        assert_eq!(crontab_weekdays("*").unwrap(), "*");
        assert_eq!(crontab_weekdays("0").unwrap(), "1");
        assert_eq!(crontab_weekdays("1-5").unwrap(), "2,3,4,5,6");
        assert_eq!(crontab_weekdays("0,7").unwrap(), "1");
        assert_eq!(crontab_weekdays("*/2").unwrap(), "1,3,5,7");
        assert_eq!(crontab_weekdays("SUN,1").unwrap(), "2,SUN");
        assert!(crontab_weekdays("8").is_err());
        assert!(crontab_weekdays("5-1").is_err());
        assert!(crontab_weekdays("1-5/0").is_err());
        assert!(ScheduleTrigger::new("c", "p", "0 9 * * 9").is_err());
    }

    #[test]
    fn test_six_field_expression_accepted() {
        let trigger =
            ScheduleTrigger::starting_at("c", "p", "30 * * * * *", at(10, 0, 0)).unwrap();
        assert_eq!(trigger.next_fire(), Some(at(10, 0, 30)));
    }

    #[test]
    fn test_initial_last_fire() {
        assert_eq!(every_minute(at(10, 0, 0)).last_fire(), at(10, 0, 0));
        assert_eq!(every_minute(at(10, 0, 42)).last_fire(), at(10, 0, 0));

        let hourly = ScheduleTrigger::starting_at("h", "p", "0 * * * *", at(10, 30, 0)).unwrap();
        assert_eq!(hourly.last_fire(), at(10, 0, 0));
    }

    #[test]
    fn test_not_met_before_next_minute() {
        let trigger = every_minute(at(10, 0, 0));
        assert!(trigger.check_at(at(10, 0, 59)).is_none());
        assert_eq!(trigger.last_fire(), at(10, 0, 0));
    }

    #[test]
    fn test_met_at_next_minute() {
        let trigger = every_minute(at(10, 0, 0));

        let request = trigger.check_at(at(10, 1, 0)).unwrap();
        assert_eq!(request.pipeline_name, "pipe_m");
        assert_eq!(request.trigger_id, "cron_m");
        assert_eq!(request.parameters["trigger_id"], "cron_m");
        assert_eq!(
            request.parameters["scheduled_fire_time_utc"],
            "2023-10-27T10:01:00+00:00"
        );
        assert_eq!(trigger.last_fire(), at(10, 1, 0));
    }

    #[test]
    fn test_never_fires_twice_for_one_instant() {
        let trigger = every_minute(at(10, 0, 0));

        assert!(trigger.check_at(at(10, 1, 0)).is_some());
        assert!(trigger.check_at(at(10, 1, 1)).is_none());
        assert!(trigger.check_at(at(10, 1, 59)).is_none());

        let second = trigger.check_at(at(10, 2, 0)).unwrap();
        assert_eq!(
            second.parameters["scheduled_fire_time_utc"],
            "2023-10-27T10:02:00+00:00"
        );
    }

    #[test]
    fn test_polled_every_minute_fires_once_per_boundary() {
        let start = at(10, 0, 20);
        let trigger = every_minute(start);

        let mut fired = Vec::new();
        for minute in 1..=30 {
            let now = start + Duration::minutes(minute);
            let request = trigger.check_at(now);
            assert!(request.is_some(), "minute {} did not fire", minute);
            fired.push(request.unwrap().parameters["scheduled_fire_time_utc"].clone());
            // A second poll in the same minute never fires
            assert!(trigger.check_at(now + Duration::seconds(5)).is_none());
        }

        assert_eq!(fired.len(), 30);
        assert_eq!(fired[0], "2023-10-27T10:01:00+00:00");
        assert_eq!(fired[29], "2023-10-27T10:30:00+00:00");
    }

    #[test]
    fn test_lapsed_trigger_drains_one_fire_per_check() {
        let trigger = every_minute(at(10, 0, 0));
        let late = at(10, 2, 30);

        let first = trigger.check_at(late).unwrap();
        assert_eq!(
            first.parameters["scheduled_fire_time_utc"],
            "2023-10-27T10:01:00+00:00"
        );
        assert_eq!(trigger.last_fire(), at(10, 1, 0));

        let second = trigger.check_at(late).unwrap();
        assert_eq!(
            second.parameters["scheduled_fire_time_utc"],
            "2023-10-27T10:02:00+00:00"
        );

        assert!(trigger.check_at(late).is_none());
        assert_eq!(trigger.last_fire(), at(10, 2, 0));
    }

    #[test]
    fn test_real_clock_check_does_not_fire_immediately() {
        let trigger = ScheduleTrigger::new("c", "p", "0 0 1 1 *").unwrap();
        assert!(trigger.check().is_none());
    }
}
