//! Expiry timestamps and the server-side expiry policy.
//!
//! An expiry is either an absolute instant or `Never`. On disk and on the wire
//! it is encoded as unix seconds where `0` stands for `Never`; no real upload
//! can expire at the epoch, so the sentinel cannot collide with a timestamp.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

/// Standard expiry choices offered to uploaders, in seconds.
pub const EXPIRY_CHOICES: [u64; 7] = [60, 300, 3600, 86400, 604800, 2419200, 31536000];

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Expiry {
    Never,
    At(DateTime<Utc>),
}

impl Expiry {
    /// Expiry `seconds` from `now`. Durations too large to represent never expire.
    pub fn after(now: DateTime<Utc>, seconds: u64) -> Self {
        i64::try_from(seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|delta| now.checked_add_signed(delta))
            .map(Expiry::At)
            .unwrap_or(Expiry::Never)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(ts) => now > *ts,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Unix seconds, `0` for `Never`.
    pub fn unix_timestamp(&self) -> i64 {
        match self {
            Expiry::Never => 0,
            Expiry::At(ts) => ts.timestamp(),
        }
    }
}

impl From<i64> for Expiry {
    fn from(ts: i64) -> Self {
        if ts == 0 {
            return Expiry::Never;
        }
        DateTime::from_timestamp(ts, 0)
            .map(Expiry::At)
            .unwrap_or(Expiry::Never)
    }
}

impl From<Expiry> for i64 {
    fn from(expiry: Expiry) -> Self {
        expiry.unix_timestamp()
    }
}

/// Compute the effective expiry of an upload.
///
/// `max_expiry_secs == 0` means the server has no maximum. With a maximum, an
/// unspecified or zero request gets the maximum and longer requests are
/// clamped down to it. Without one, zero or unspecified means never.
pub fn resolve_expiry(requested_secs: Option<u64>, max_expiry_secs: u64, now: DateTime<Utc>) -> Expiry {
    match (requested_secs.filter(|s| *s > 0), max_expiry_secs) {
        (None, 0) => Expiry::Never,
        (None, max) => Expiry::after(now, max),
        (Some(requested), 0) => Expiry::after(now, requested),
        (Some(requested), max) => Expiry::after(now, requested.min(max)),
    }
}

/// Parse a client-supplied expiry in seconds. Anything that is not a
/// non-negative integer counts as "not specified".
pub fn parse_expiry_secs(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpirationChoice {
    pub seconds: u64,
    pub label: String,
}

/// Expiry options valid under `max_expiry_secs`.
pub fn expiration_choices(max_expiry_secs: u64) -> Vec<ExpirationChoice> {
    let mut choices: Vec<ExpirationChoice> = EXPIRY_CHOICES
        .iter()
        .copied()
        .filter(|secs| max_expiry_secs == 0 || *secs <= max_expiry_secs)
        .map(|seconds| ExpirationChoice {
            seconds,
            label: humanize_duration(seconds),
        })
        .collect();

    if max_expiry_secs == 0 {
        choices.push(ExpirationChoice {
            seconds: 0,
            label: "never".to_string(),
        });
    } else if !EXPIRY_CHOICES.contains(&max_expiry_secs) {
        choices.push(ExpirationChoice {
            seconds: max_expiry_secs,
            label: humanize_duration(max_expiry_secs),
        });
    }

    choices
}

fn humanize_duration(seconds: u64) -> String {
    const UNITS: [(u64, &str); 6] = [
        (31536000, "year"),
        (604800, "week"),
        (86400, "day"),
        (3600, "hour"),
        (60, "minute"),
        (1, "second"),
    ];

    for (unit_secs, name) in UNITS {
        if seconds >= unit_secs {
            let count = seconds / unit_secs;
            return if count == 1 {
                format!("1 {}", name)
            } else {
                format!("{} {}s", count, name)
            };
        }
    }
    "0 seconds".to_string()
}
