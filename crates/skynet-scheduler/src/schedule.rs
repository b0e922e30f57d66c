use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use skynet_core::types::CronSchedule;

use crate::error::{Result, SchedulerError};

/// Compute the next execution instant (ms since epoch) for `schedule`,
/// given the current time `now_ms`.
///
/// - `at{t}`: `t` itself, unconditionally — a one-shot job whose instant
///   has already passed is simply due immediately.
/// - `every{w, anchor?}`: `a = anchor ?? now`; `k = ceil((now - a) / w)`;
///   `next = a + k*w`. Always strictly greater than `now`.
/// - `cron{expr, tz}`: the next instant strictly after `now`, evaluated in
///   `tz` (defaulting to UTC).
pub fn next_run_at_ms(schedule: &CronSchedule, now_ms: i64) -> Result<i64> {
    match schedule {
        CronSchedule::At { at_ms } => Ok(*at_ms),
        CronSchedule::Every { every_ms, anchor_ms } => {
            let every_ms = (*every_ms).max(1);
            let anchor = anchor_ms.unwrap_or(now_ms);
            let k = if now_ms > anchor {
                ((now_ms - anchor) as f64 / every_ms as f64).ceil() as i64
            } else {
                0
            };
            let mut next = anchor + k * every_ms;
            if next <= now_ms {
                next += every_ms;
            }
            Ok(next)
        }
        CronSchedule::Cron { expr, tz } => cron_next(expr, tz.as_deref(), now_ms),
    }
}

/// Spec §3 specifies a "standard 5-field cron expression" (minute hour
/// day-of-month month day-of-week), but the `cron` crate requires a
/// leading seconds field. A 5-field expression is normalized to 6 fields
/// by fixing seconds at `0`; a 6- or 7-field expression passes through
/// unchanged.
fn normalize_cron_expr(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

fn cron_next(expr: &str, tz: Option<&str>, now_ms: i64) -> Result<i64> {
    let normalized = normalize_cron_expr(expr);
    let schedule = cron::Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron {
        expr: expr.to_string(),
        reason: e.to_string(),
    })?;

    let tz: chrono_tz::Tz = match tz {
        Some(name) => name.parse().map_err(|_| SchedulerError::InvalidCron {
            expr: expr.to_string(),
            reason: format!("unknown time zone {name:?}"),
        })?,
        None => chrono_tz::UTC,
    };

    let now_utc = seconds_to_datetime(now_ms);
    let now_local = now_utc.with_timezone(&tz);
    let next_local = schedule
        .after(&now_local)
        .next()
        .ok_or_else(|| SchedulerError::InvalidCron {
            expr: expr.to_string(),
            reason: "expression yields no future occurrence".to_string(),
        })?;
    Ok(next_local.with_timezone(&Utc).timestamp_millis())
}

fn seconds_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_schedule_returns_instant_unconditionally() {
        let s = CronSchedule::At { at_ms: 500 };
        assert_eq!(next_run_at_ms(&s, 1_000).unwrap(), 500);
        assert_eq!(next_run_at_ms(&s, 100).unwrap(), 500);
    }

    #[test]
    fn every_schedule_anchors_and_advances() {
        let s = CronSchedule::Every { every_ms: 1000, anchor_ms: Some(0) };
        assert_eq!(next_run_at_ms(&s, 0).unwrap(), 1000);
        assert_eq!(next_run_at_ms(&s, 999).unwrap(), 1000);
        assert_eq!(next_run_at_ms(&s, 1000).unwrap(), 2000);
        assert_eq!(next_run_at_ms(&s, 2500).unwrap(), 3000);
    }

    #[test]
    fn every_schedule_without_anchor_uses_now() {
        let s = CronSchedule::Every { every_ms: 5000, anchor_ms: None };
        let next = next_run_at_ms(&s, 10_000).unwrap();
        assert_eq!(next, 15_000);
    }

    #[test]
    fn every_schedule_is_always_strictly_future() {
        let s = CronSchedule::Every { every_ms: 1000, anchor_ms: Some(1000) };
        // now exactly on an anchor boundary must still advance by one step.
        let next = next_run_at_ms(&s, 3000).unwrap();
        assert!(next > 3000);
        assert_eq!(next, 4000);
    }

    #[test]
    fn cron_schedule_computes_next_minute_boundary() {
        let s = CronSchedule::Cron { expr: "* * * * * *".to_string(), tz: None };
        // cron crate uses 6/7-field expressions with seconds; every second.
        let now = 1_700_000_000_000;
        let next = next_run_at_ms(&s, now).unwrap();
        assert!(next > now);
        assert!(next - now <= 1000);
    }

    #[test]
    fn invalid_cron_expression_is_rejected() {
        let s = CronSchedule::Cron { expr: "not a cron expr".to_string(), tz: None };
        assert!(next_run_at_ms(&s, 0).is_err());
    }
}
