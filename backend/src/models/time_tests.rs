#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use qtty::Degrees;

    use crate::db::error::TimeError;
    use crate::models::time::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_keywords() {
        assert_eq!(interpret_date("now", now()), Some(now()));
        assert_eq!(interpret_date("Current", now()), Some(now()));
        assert_eq!(
            interpret_date("tomorrow", now()),
            Some(now() + Duration::days(1))
        );
        assert_eq!(
            interpret_date("yesterday", now()),
            Some(now() - Duration::days(1))
        );
    }

    #[test]
    fn test_relative_offsets() {
        assert_eq!(
            interpret_date("+2h", now()),
            Some(now() + Duration::hours(2))
        );
        assert_eq!(
            interpret_date("now+30", now()),
            Some(now() + Duration::minutes(30))
        );
        assert_eq!(
            interpret_date("now-1d", now()),
            Some(now() - Duration::days(1))
        );
        assert_eq!(
            interpret_date("2025-06-01/3h", now()),
            Some(utc(2025, 6, 1, 3, 0, 0))
        );
        assert_eq!(
            interpret_date("2025/-90s", now()),
            Some(utc(2024, 12, 31, 23, 58, 30))
        );
    }

    #[test]
    fn test_partial_dates() {
        assert_eq!(interpret_date("2026", now()), Some(utc(2026, 1, 1, 0, 0, 0)));
        assert_eq!(
            interpret_date("2025-09", now()),
            Some(utc(2025, 9, 1, 0, 0, 0))
        );
        assert_eq!(
            interpret_date("2025-09-14", now()),
            Some(utc(2025, 9, 14, 0, 0, 0))
        );
    }

    #[test]
    fn test_iso_forms() {
        let expected = utc(2025, 6, 1, 10, 30, 0);
        assert_eq!(interpret_date("2025-06-01T10:30:00", now()), Some(expected));
        assert_eq!(interpret_date("2025-06-01 10:30", now()), Some(expected));
        assert_eq!(interpret_date("2025-06-01T10:30:00.250", now()).map(|t| t.timestamp()), Some(expected.timestamp()));
        assert_eq!(interpret_date("2025-06-01T10:30:00Z", now()), Some(expected));
        assert_eq!(
            interpret_date("2025-06-01T03:30:00-07:00", now()),
            Some(expected)
        );
    }

    #[test]
    fn test_unreadable_dates() {
        assert_eq!(interpret_date("", now()), None);
        assert_eq!(interpret_date("None", now()), None);
        assert_eq!(interpret_date("someday", now()), None);
        assert_eq!(interpret_date("2025-13-45", now()), None);
        assert_eq!(interpret_date("now+abc", now()), None);
    }

    #[test]
    fn test_out_of_range_offsets() {
        assert_eq!(interpret_date("now+100000000d", now()), None);
        assert_eq!(interpret_date("+100000000d", now()), None);
        assert_eq!(interpret_date("-100000000d", now()), None);
        assert_eq!(interpret_date("2025/100000000d", now()), None);
        assert_eq!(interpret_date("now+1e30d", now()), None);
        assert_eq!(interpret_date("now-1e30d", now()), None);
        assert_eq!(interpret_date("now+3000000d", now()), None);
        assert_eq!(parse_offset("-1e30d"), None);
        assert_eq!(parse_day_key("99999-01-01"), None);
        assert_eq!(
            interpret_date("9999-12-31T23:00:00", now()),
            Some(utc(9999, 12, 31, 23, 0, 0))
        );
    }

    #[test]
    fn test_parse_offset_units() {
        assert_eq!(parse_offset("1.5d"), Some(Duration::hours(36)));
        assert_eq!(parse_offset("-45s"), Some(Duration::seconds(-45)));
        assert_eq!(parse_offset("10"), Some(Duration::minutes(10)));
        assert_eq!(parse_offset("m"), None);
    }

    #[test]
    fn test_day_helpers() {
        let t = utc(2025, 6, 1, 23, 59, 59);
        assert_eq!(day_key(t), "2025-06-01");
        assert_eq!(isoformat(t), "2025-06-01T23:59:59");
        assert_eq!(start_of_day(t), utc(2025, 6, 1, 0, 0, 0));
        assert_eq!(
            parse_day_key("2025-06-01").map(day_start),
            Some(utc(2025, 6, 1, 0, 0, 0))
        );
    }

    #[test]
    fn test_julian_date_j2000() {
        let jd = julian_date(utc(2000, 1, 1, 12, 0, 0));
        assert!((jd - J2000_JD).abs() < 1e-9);
    }

    #[test]
    fn test_lst_at_j2000_greenwich() {
        let lst = local_sidereal_time(utc(2000, 1, 1, 12, 0, 0), Degrees::new(0.0));
        assert!((lst.value() - 18.697_374_558).abs() < 1e-4, "lst = {}", lst.value());
    }

    #[test]
    fn test_lst_shifts_with_longitude() {
        let t = utc(2025, 6, 1, 6, 0, 0);
        let greenwich = local_sidereal_time(t, Degrees::new(0.0)).value();
        let west = local_sidereal_time(t, Degrees::new(-120.0)).value();
        let diff = (greenwich - west).rem_euclid(24.0);
        assert!((diff - 8.0).abs() < 1e-9);
        assert!((0.0..24.0).contains(&west));
    }

    #[test]
    fn test_civil_zone_iana() {
        let zone = civil_zone("America/Los_Angeles", now()).unwrap();
        assert_eq!(zone.name, "PDT");
        assert_eq!(zone.offset_hours(), -7.0);

        let winter = civil_zone("America/Los_Angeles", utc(2025, 1, 15, 0, 0, 0)).unwrap();
        assert_eq!(winter.offset_hours(), -8.0);
    }

    #[test]
    fn test_civil_zone_abbreviation() {
        let zone = civil_zone("pst", now()).unwrap();
        assert_eq!(zone.name, "PST");
        assert_eq!(zone.offset_hours(), -8.0);

        let zone = civil_zone("PDT", now()).unwrap();
        assert_eq!(zone.offset_hours(), -7.0);
    }

    #[test]
    fn test_civil_zone_utc_and_unknown() {
        assert_eq!(civil_zone("UTC", now()).unwrap().offset_hours(), 0.0);
        assert!(civil_zone("sys", now()).is_ok());
        assert_eq!(
            civil_zone("Mars/Olympus", now()),
            Err(TimeError::UnknownTimezone("Mars/Olympus".to_string()))
        );
    }

    #[test]
    fn test_civil_zone_local_wall_clock() {
        let zone = civil_zone("UTC", now()).unwrap();
        assert_eq!(zone.local(now()), now().naive_utc());
    }
}
