use chrono::{Duration, NaiveDate};

/// Tunables for sync runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncSettings {
    /// Extra days fetched before the requested start to absorb institution clock skew.
    pub buffer_days: u32,
    /// Longest span requested from the downloader in one call.
    pub window_days: u32,
    /// Lookback for a recent sync on an empty ledger.
    pub recent_days: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            buffer_days: 2,
            window_days: 30,
            recent_days: 30,
        }
    }
}

/// Split the buffered range ending at `end` into consecutive windows.
///
/// Each window starts where the previous one ended; the last one ends exactly at `end`.
pub fn sync_windows(
    start: NaiveDate,
    end: NaiveDate,
    settings: &SyncSettings,
) -> Vec<(NaiveDate, NaiveDate)> {
    let span = (end - start) + Duration::days(i64::from(settings.buffer_days));
    let step = Duration::days(i64::from(settings.window_days.max(1)));

    let mut windows = Vec::new();
    let mut cursor = end - span;
    while cursor < end {
        let next = (cursor + step).min(end);
        windows.push((cursor, next));
        cursor = next;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn three_and_a_half_months() {
        let start = date(2019, 1, 1);
        let end = date(2019, 4, 15);
        let windows = sync_windows(start, end, &SyncSettings::default());
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0].0, date(2018, 12, 30));
        assert_eq!(windows.last().map(|w| w.1), Some(end));
        for pair in windows.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
        for (from, to) in &windows {
            assert!(*to - *from <= Duration::days(30));
            assert!(from < to);
        }
    }

    #[test]
    fn same_day_sync_still_covers_buffer() {
        let day = date(2019, 3, 1);
        let windows = sync_windows(day, day, &SyncSettings::default());
        assert_eq!(windows, vec![(date(2019, 2, 27), day)]);
    }

    #[test]
    fn zero_width_windows_are_clamped() {
        let settings = SyncSettings {
            buffer_days: 0,
            window_days: 0,
            recent_days: 30,
        };
        let windows = sync_windows(date(2019, 1, 1), date(2019, 1, 4), &settings);
        assert_eq!(windows.len(), 3);
    }
}
