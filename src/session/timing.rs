use time::{Duration, OffsetDateTime};

/// Seconds left on the attempt clock, clamped at zero. The deadline is
/// fixed by `start_time` and the quiz time limit alone; reloads never move
/// it because `start_time` survives in the attempt store.
pub(crate) fn remaining_seconds(
    start_time: OffsetDateTime,
    time_limit_minutes: u32,
    now: OffsetDateTime,
) -> i64 {
    let deadline = start_time + Duration::minutes(i64::from(time_limit_minutes));
    (deadline - now).whole_seconds().max(0)
}

pub(crate) fn window_closed(due_at: OffsetDateTime, now: OffsetDateTime) -> bool {
    now > due_at
}
