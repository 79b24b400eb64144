use super::*;

fn bounds(intervals: &[SubInterval]) -> Vec<(i64, i64)> {
    intervals.iter().map(|i| (i.start_ts, i.end_ts)).collect()
}

#[test]
fn test_fixed_split_clips_last_interval() {
    let query = ReadQuery::aggregated("temp", 0, 10_000, 3_000, Aggregation::Avg);
    let intervals = split_intervals(&query, 1000).unwrap();
    assert_eq!(
        bounds(&intervals),
        vec![(0, 3000), (3000, 6000), (6000, 9000), (9000, 10_000)]
    );
    assert_eq!(intervals[0].midpoint(), 1500);
    assert_eq!(intervals[3].midpoint(), 9500);
}

#[test]
fn test_fixed_split_respects_min_step() {
    let query = ReadQuery::aggregated("temp", 0, 3_000, 10, Aggregation::Count);
    let intervals = split_intervals(&query, 1000).unwrap();
    assert_eq!(bounds(&intervals), vec![(0, 1000), (1000, 2000), (2000, 3000)]);
    assert_eq!(query.estimate_intervals(1000), 3);
}

#[test]
fn test_intervals_cover_range_exactly() {
    let query = ReadQuery::aggregated("temp", 123, 98_765, 7_001, Aggregation::Sum);
    let intervals = split_intervals(&query, 1000).unwrap();
    assert_eq!(intervals.first().unwrap().start_ts, 123);
    assert_eq!(intervals.last().unwrap().end_ts, 98_765);
    for pair in intervals.windows(2) {
        assert_eq!(pair[0].end_ts, pair[1].start_ts);
    }
    assert!(intervals.len() as u64 <= query.estimate_intervals(1000));
}

#[test]
fn test_empty_range_has_no_intervals() {
    let query = ReadQuery::aggregated("temp", 500, 500, 100, Aggregation::Max);
    assert!(split_intervals(&query, 1).unwrap().is_empty());
}

#[test]
fn test_calendar_months_in_utc() {
    let query = ReadQuery::aggregated("temp", ms("2024-01-15T00:00:00Z"), ms("2024-03-10T00:00:00Z"), 0, Aggregation::Sum)
        .with_calendar(CalendarUnit::Month, None);
    let intervals = split_intervals(&query, 1000).unwrap();
    assert_eq!(
        bounds(&intervals),
        vec![
            (ms("2024-01-15T00:00:00Z"), ms("2024-02-01T00:00:00Z")),
            (ms("2024-02-01T00:00:00Z"), ms("2024-03-01T00:00:00Z")),
            (ms("2024-03-01T00:00:00Z"), ms("2024-03-10T00:00:00Z")),
        ]
    );
}

#[test]
fn test_calendar_weeks() {
    // 2024-01-03 is a Wednesday
    let start = ms("2024-01-03T12:00:00Z");
    let end = ms("2024-01-20T00:00:00Z");

    let iso = ReadQuery::aggregated("temp", start, end, 0, Aggregation::Count)
        .with_calendar(CalendarUnit::WeekIso, Some("UTC"));
    let intervals = split_intervals(&iso, 1000).unwrap();
    assert_eq!(intervals[0].end_ts, ms("2024-01-08T00:00:00Z"));
    assert_eq!(intervals[1].end_ts, ms("2024-01-15T00:00:00Z"));

    let sunday = ReadQuery::aggregated("temp", start, end, 0, Aggregation::Count)
        .with_calendar(CalendarUnit::Week, Some("UTC"));
    let intervals = split_intervals(&sunday, 1000).unwrap();
    assert_eq!(intervals[0].end_ts, ms("2024-01-07T00:00:00Z"));
}

#[test]
fn test_calendar_days_follow_dst() {
    // New York springs forward on 2024-03-10, that day lasts 23 hours
    let start = ms("2024-03-10T05:00:00Z");
    let query = ReadQuery::aggregated("temp", start, ms("2024-03-12T04:00:00Z"), 0, Aggregation::Avg)
        .with_calendar(CalendarUnit::Day, Some("America/New_York"));
    let intervals = split_intervals(&query, 1000).unwrap();
    assert_eq!(
        bounds(&intervals),
        vec![
            (start, ms("2024-03-11T04:00:00Z")),
            (ms("2024-03-11T04:00:00Z"), ms("2024-03-12T04:00:00Z")),
        ]
    );
}

#[test]
fn test_calendar_quarters_and_years() {
    let query = ReadQuery::aggregated("temp", ms("2023-11-02T00:00:00Z"), ms("2024-05-01T00:00:00Z"), 0, Aggregation::Max)
        .with_calendar(CalendarUnit::Quarter, None);
    let ends: Vec<i64> = split_intervals(&query, 1000).unwrap().iter().map(|i| i.end_ts).collect();
    assert_eq!(
        ends,
        vec![ms("2024-01-01T00:00:00Z"), ms("2024-04-01T00:00:00Z"), ms("2024-05-01T00:00:00Z")]
    );

    let query = ReadQuery::aggregated("temp", ms("2022-06-01T00:00:00Z"), ms("2024-01-01T00:00:00Z"), 0, Aggregation::Max)
        .with_calendar(CalendarUnit::Year, None);
    assert_eq!(split_intervals(&query, 1000).unwrap().len(), 2);
}
