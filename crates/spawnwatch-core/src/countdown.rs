//! Remaining-time text for sighting labels.

use chrono::{DateTime, Local, Utc};

/// Time left until `expires_at`, as `MMmSSs` or `HhMMmSSs`.
///
/// Returns `None` once the sighting has expired.
pub fn remaining(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<String> {
    if expires_at < now {
        return None;
    }
    let total = expires_at.signed_duration_since(now).num_seconds();
    let hours = total.div_euclid(3600);
    let minutes = total.rem_euclid(3600).div_euclid(60);
    let seconds = total.rem_euclid(60);

    Some(if hours > 0 {
        format!("{hours}h{minutes:02}m{seconds:02}s")
    } else {
        format!("{minutes:02}m{seconds:02}s")
    })
}

/// Countdown label text: `(04m32s)`, or `(expired)` once the time has passed.
pub fn countdown_text(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    remaining(expires_at, now).map_or_else(|| "(expired)".to_owned(), |left| format!("({left})"))
}

/// Wall-clock disappearance time in the local zone, `HH:MM:SS`.
pub fn clock_time(expires_at: DateTime<Utc>) -> String {
    expires_at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{in_seconds, t0};

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(countdown_text(in_seconds(272), t0()), "(04m32s)");
        assert_eq!(countdown_text(in_seconds(0), t0()), "(00m00s)");
    }

    #[test]
    fn includes_hours_when_needed() {
        assert_eq!(countdown_text(in_seconds(3_725), t0()), "(1h02m05s)");
    }

    #[test]
    fn past_expiry_reads_expired() {
        assert_eq!(countdown_text(in_seconds(-1), t0()), "(expired)");
        assert_eq!(remaining(in_seconds(-30), t0()), None);
    }
}
