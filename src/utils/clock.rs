use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

// Last handed-out timestamp in microseconds since the epoch
static LAST_MICROS: AtomicI64 = AtomicI64::new(0);

/// Current UTC time with fixed microsecond precision.
///
/// Every `created_at`/`updated_at` column is written through this so that
/// timestamps compare correctly as plain strings (the sync feed relies on it).
/// Values are strictly increasing within the process, so records journaled
/// one after the other keep their order in the outbox.
pub fn now_timestamp() -> String {
    let now = Utc::now().timestamp_micros();
    let mut last = LAST_MICROS.load(Ordering::SeqCst);
    let micros = loop {
        let next = now.max(last + 1);
        match LAST_MICROS.compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => break next,
            Err(current) => last = current,
        }
    };

    DateTime::<Utc>::from_timestamp_micros(micros)
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Timestamp in the `now_timestamp` format, `offset` in the past
pub fn timestamp_before(offset: std::time::Duration) -> String {
    let back = i64::try_from(offset.as_micros()).unwrap_or(i64::MAX);
    let micros = Utc::now().timestamp_micros().saturating_sub(back);

    DateTime::<Utc>::from_timestamp_micros(micros)
        .unwrap_or_else(Utc::now)
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Calendar day used in generated delivery references (`20261019`).
pub fn today_compact() -> String {
    Utc::now().format("%Y%m%d").to_string()
}
