use std::collections::BTreeMap;

use crate::model::attendance::{AttendanceEvent, DailyAttendance, EventKind};

/// Collapses raw clock events into one record per (employee, date).
///
/// Events are sorted by `(occurred_at, id)` first, so identical timestamps
/// keep their ingestion order. The earliest `in` and the latest `out` of a
/// date win. Dates without events produce no record.
pub fn reduce_daily(events: &[AttendanceEvent]) -> Vec<DailyAttendance> {
    let mut ordered: Vec<&AttendanceEvent> = events.iter().collect();
    ordered.sort_by_key(|e| (e.occurred_at, e.id));

    let mut days: BTreeMap<(u64, chrono::NaiveDate), DailyAttendance> = BTreeMap::new();

    for event in ordered {
        let date = event.occurred_at.date();
        let time = event.occurred_at.time();

        let day = days
            .entry((event.employee_id, date))
            .or_insert_with(|| DailyAttendance {
                employee_id: event.employee_id,
                date,
                check_in: None,
                check_out: None,
            });

        match event.kind {
            // ascending order: the first `in` seen is the earliest
            EventKind::In => {
                if day.check_in.is_none() {
                    day.check_in = Some(time);
                }
            }
            EventKind::Out => day.check_out = Some(time),
        }
    }

    days.into_values().collect()
}

/// Total valid minutes across reduced days.
pub fn total_worked_minutes(days: &[DailyAttendance]) -> i64 {
    days.iter().filter_map(DailyAttendance::worked_minutes).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attendance::EventSource;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M").unwrap()
    }

    fn event(id: u64, employee_id: u64, when: NaiveDateTime, kind: EventKind) -> AttendanceEvent {
        AttendanceEvent {
            id,
            employee_id,
            occurred_at: when,
            kind,
            source: EventSource::Terminal,
        }
    }

    fn hm(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    #[test]
    fn terminal_noise_reduces_to_first_in_last_out() {
        let events = vec![
            event(1, 7, at("2024-06-03", "08:58"), EventKind::In),
            event(2, 7, at("2024-06-03", "09:05"), EventKind::In),
            event(3, 7, at("2024-06-03", "17:32"), EventKind::Out),
            event(4, 7, at("2024-06-03", "17:02"), EventKind::Out),
        ];

        let days = reduce_daily(&events);

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].check_in, Some(hm("08:58")));
        assert_eq!(days[0].check_out, Some(hm("17:32")));
    }

    #[test]
    fn unordered_input_gives_min_in_and_max_out_per_date() {
        let events = vec![
            event(10, 7, at("2024-06-04", "18:10"), EventKind::Out),
            event(11, 7, at("2024-06-03", "12:00"), EventKind::In),
            event(12, 7, at("2024-06-04", "07:45"), EventKind::In),
            event(13, 7, at("2024-06-03", "08:30"), EventKind::In),
            event(14, 7, at("2024-06-04", "16:00"), EventKind::Out),
            event(15, 7, at("2024-06-03", "16:15"), EventKind::Out),
        ];

        let days = reduce_daily(&events);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
        assert_eq!(days[0].check_in, Some(hm("08:30")));
        assert_eq!(days[0].check_out, Some(hm("16:15")));
        assert_eq!(days[1].check_in, Some(hm("07:45")));
        assert_eq!(days[1].check_out, Some(hm("18:10")));
    }

    #[test]
    fn check_in_only_day_has_no_checkout() {
        let events = vec![event(1, 7, at("2024-06-05", "09:00"), EventKind::In)];

        let days = reduce_daily(&events);

        assert_eq!(days[0].check_out, None);
        assert_eq!(days[0].worked_minutes(), None);
    }

    #[test]
    fn days_without_events_are_absent() {
        let events = vec![
            event(1, 7, at("2024-06-03", "09:00"), EventKind::In),
            event(2, 7, at("2024-06-05", "09:00"), EventKind::In),
        ];

        let dates: Vec<_> = reduce_daily(&events).into_iter().map(|d| d.date).collect();

        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 5).unwrap()
            ]
        );
    }

    #[test]
    fn employees_are_kept_apart() {
        let events = vec![
            event(1, 7, at("2024-06-03", "09:00"), EventKind::In),
            event(2, 8, at("2024-06-03", "08:00"), EventKind::In),
            event(3, 8, at("2024-06-03", "17:00"), EventKind::Out),
        ];

        let days = reduce_daily(&events);

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].employee_id, 7);
        assert_eq!(days[1].check_in, Some(hm("08:00")));
        assert_eq!(total_worked_minutes(&days), 9 * 60);
    }

    #[test]
    fn identical_timestamps_are_stable() {
        let events = vec![
            event(2, 7, at("2024-06-03", "09:00"), EventKind::Out),
            event(1, 7, at("2024-06-03", "09:00"), EventKind::In),
        ];

        let days = reduce_daily(&events);

        assert_eq!(days[0].check_in, Some(hm("09:00")));
        assert_eq!(days[0].check_out, Some(hm("09:00")));
        assert_eq!(days[0].worked_minutes(), Some(0));
    }
}
