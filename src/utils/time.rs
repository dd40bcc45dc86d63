use chrono::{DateTime, Duration, Utc};

pub fn minutes_from(start: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
    start + Duration::minutes(minutes)
}

/// Whole seconds left until `end`, never negative.
pub fn remaining_seconds(end: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    (end - at).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_is_clamped_at_zero() {
        let start = Utc::now();
        let end = minutes_from(start, 220);
        assert_eq!(remaining_seconds(end, start), 220 * 60);
        assert_eq!(remaining_seconds(start, end), 0);
    }
}
