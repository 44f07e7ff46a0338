#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use crate::db::calendar::*;
    use crate::db::config::CalendarConfig;
    use crate::db::error::CalendarError;
    use crate::models::entry::{EntryField, EntryFields, FieldSubset};
    use crate::models::time::local_sidereal_time;

    fn config() -> CalendarConfig {
        CalendarConfig {
            timezone: "UTC".to_string(),
            ..CalendarConfig::default()
        }
    }

    fn calendar() -> Calendar {
        Calendar::new(&config()).unwrap()
    }

    fn fields(program: &str, start: &str, stop: &str) -> EntryFields {
        EntryFields::new()
            .with("program", program)
            .with("utc_start", start)
            .with("utc_stop", stop)
    }

    fn instant(text: &str) -> DateTime<Utc> {
        format!("{text}Z").parse().unwrap()
    }

    #[test]
    fn test_overlapping_entries_conflict_both_ways() {
        let mut cal = calendar();
        assert!(cal
            .add(fields("a", "2025-06-01T10:00:00", "2025-06-01T14:00:00"))
            .unwrap());
        assert!(cal.last_results().is_clear());

        assert!(cal
            .add(fields("b", "2025-06-01T13:00:00", "2025-06-01T15:00:00"))
            .unwrap());
        assert_eq!(cal.last_results().conflict, vec![0]);
        assert!(cal.last_results().duplicate.is_empty());

        let a = cal.entry("2025-06-01", 0).unwrap();
        let report = cal.conflicts(a, false);
        assert_eq!(report.duplicate, vec![0]);
        assert_eq!(report.conflict, vec![1]);
        assert_eq!(cal.len(), 2);
        assert_eq!(cal.added().len(), 2);
    }

    #[test]
    fn test_other_days_never_conflict() {
        let mut cal = calendar();
        cal.add(fields("a", "2025-06-01T10:00:00", "2025-06-01T14:00:00"))
            .unwrap();
        cal.add(fields("b", "2025-06-02T10:00:00", "2025-06-02T14:00:00"))
            .unwrap();
        assert!(cal.last_results().is_clear());
        assert_eq!(cal.events().len(), 2);
    }

    #[test]
    fn test_duplicate_add_is_rejected() {
        let mut cal = calendar();
        let entry = fields("a", "2025-06-01T10:00:00", "2025-06-01T14:00:00");
        assert!(cal.add(entry.clone()).unwrap());
        assert!(!cal.add(entry).unwrap());
        assert_eq!(cal.last_results().duplicate, vec![0]);
        assert!(cal.last_results().conflict.is_empty());
        assert_eq!(cal.len(), 1);
        assert_eq!(cal.added().len(), 1);
    }

    #[test]
    fn test_shifted_field_text_is_not_a_duplicate() {
        let mut cal = calendar();
        let first = fields("ab", "2025-06-01T10:00:00", "2025-06-01T14:00:00").with("pid", "");
        let second = fields("a", "2025-06-01T10:00:00", "2025-06-01T14:00:00").with("pid", "b");
        assert!(cal.add(first).unwrap());
        assert!(cal.add(second).unwrap());
        assert!(cal.last_results().duplicate.is_empty());
        assert_eq!(cal.len(), 2);
    }

    #[test]
    fn test_email_does_not_make_a_new_entry() {
        let mut cal = calendar();
        cal.add(fields("a", "2025-06-01T10:00:00", "2025-06-01T14:00:00"))
            .unwrap();
        let again = fields("a", "2025-06-01T10:00:00", "2025-06-01T14:00:00")
            .with("email", "obs@example.org");
        assert!(!cal.add(again).unwrap());
    }

    #[test]
    fn test_add_input_failures() {
        let mut cal = calendar();
        let no_start = EntryFields::new()
            .with("program", "a")
            .with("utc_stop", "2025-06-01T14:00:00");
        assert!(!cal.add(no_start).unwrap());

        let bad_start = fields("a", "whenever", "2025-06-01T14:00:00");
        assert!(!cal.add(bad_start).unwrap());

        let no_stop = EntryFields::new()
            .with("program", "a")
            .with("utc_start", "2025-06-01T10:00:00");
        assert!(!cal.add(no_stop).unwrap());
        assert!(cal.is_empty());
    }

    #[test]
    fn test_unknown_location_is_an_error() {
        let mut cal = calendar();
        let entry = fields("a", "2025-06-01T10:00:00", "2025-06-01T14:00:00")
            .with("location", "atlantis");
        assert!(matches!(cal.add(entry), Err(CalendarError::Location(_))));
        assert!(cal.is_empty());
    }

    #[test]
    fn test_invalid_entries_are_stored_flagged() {
        let mut cal = calendar();
        let entry = EntryFields::new()
            .with("commensal", "")
            .with("utc_start", "2025-06-01T10:00:00")
            .with("utc_stop", "2025-06-01T14:00:00");
        assert!(cal.add(entry).unwrap());
        let stored = cal.entry("2025-06-01", 0).unwrap();
        assert!(!stored.valid);
        assert!(!cal.most_recent().unwrap().valid);
    }

    #[test]
    fn test_lst_window_resolves_to_utc() {
        let mut cal = calendar();
        let entry = EntryFields::new()
            .with("program", "drift")
            .with("utc_start", "2025-06-01")
            .with("lst_start", "10h00m00s")
            .with("lst_stop", "02h00m00s");
        assert!(cal.add(entry).unwrap());

        let stored = cal.most_recent().unwrap();
        let start = stored.utc_start.unwrap();
        let stop = stored.utc_stop.unwrap();
        assert!(stop > start);
        assert!(stop - start < Duration::hours(24));
        assert_eq!(start.date_naive(), instant("2025-06-01T00:00:00").date_naive());

        let lst = local_sidereal_time(start, stored.location.longitude).value();
        let diff = (lst - 10.0 + 12.0).rem_euclid(24.0) - 12.0;
        assert!(diff.abs() < 2.0 / 60.0, "diff = {diff} h");
    }

    #[test]
    fn test_straddles_get_negative_display_indices() {
        let mut cal = calendar();
        cal.add(fields("early", "2025-06-01T20:00:00", "2025-06-02T01:00:00"))
            .unwrap();
        cal.add(fields("late", "2025-06-01T22:00:00", "2025-06-02T03:00:00"))
            .unwrap();
        cal.add(fields("noon", "2025-06-02T12:00:00", "2025-06-02T13:00:00"))
            .unwrap();
        cal.add(fields("dawn", "2025-06-02T05:00:00", "2025-06-02T06:00:00"))
            .unwrap();

        assert_eq!(cal.straddle()["2025-06-02"].len(), 2);
        let sorted = cal.sort_day("2025-06-02");
        let order: Vec<(i64, &str)> = sorted
            .entries
            .iter()
            .map(|s| (s.display_index, s.entry.program.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![(-2, "early"), (-1, "late"), (1, "dawn"), (0, "noon")]
        );
        assert_eq!(sorted.index_map()[&0], EntryRef::new("2025-06-01", 0));
        assert_eq!(sorted.index_map()[&2], EntryRef::new("2025-06-02", 1));

        let keys: Vec<_> = sorted
            .entries
            .iter()
            .map(|s| (s.entry.utc_start, s.entry.utc_stop))
            .collect();
        assert!(keys.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_update_in_place_records_hash_change() {
        let mut cal = calendar();
        cal.add(fields("a", "2025-06-01T10:00:00", "2025-06-01T14:00:00"))
            .unwrap();
        let old = cal
            .entry("2025-06-01", 0)
            .unwrap()
            .hash(&FieldSubset::CrossSystem);

        let change = EntryFields::new()
            .with("utc_stop", "2025-06-01T16:00:00")
            .with("telescope", "dish-3");
        assert!(cal.update("2025-06-01", 0, change).unwrap());

        let stored = cal.entry("2025-06-01", 0).unwrap();
        assert_eq!(stored.utc_stop, Some(instant("2025-06-01T16:00:00")));
        assert!(stored.extra.is_empty());
        assert!(stored.modified >= stored.created);
        assert_eq!(
            cal.updated().get(&old),
            Some(&stored.hash(&FieldSubset::CrossSystem))
        );
    }

    #[test]
    fn test_update_to_other_day_relocates() {
        let mut cal = calendar();
        cal.add(fields("a", "2025-06-01T10:00:00", "2025-06-01T14:00:00"))
            .unwrap();
        let change = fields("a", "2025-06-03T10:00:00", "2025-06-03T14:00:00");
        assert!(cal.update("2025-06-01", 0, change).unwrap());

        assert!(cal.entry("2025-06-01", 0).is_none());
        assert_eq!(cal.entry("2025-06-03", 0).unwrap().program, "a");
        assert_eq!(cal.removed().len(), 1);
        assert_eq!(cal.added().len(), 2);
        assert!(cal.updated().is_empty());
    }

    #[test]
    fn test_rejected_relocation_keeps_original() {
        let mut cal = calendar();
        cal.add(fields("a", "2025-06-03T10:00:00", "2025-06-03T14:00:00"))
            .unwrap();
        cal.add(fields("b", "2025-06-01T10:00:00", "2025-06-01T14:00:00"))
            .unwrap();

        let change = fields("a", "2025-06-03T10:00:00", "2025-06-03T14:00:00");
        assert!(!cal.update("2025-06-01", 0, change).unwrap());

        assert_eq!(cal.entry("2025-06-01", 0).unwrap().program, "b");
        assert_eq!(cal.events()["2025-06-03"].len(), 1);
        assert!(cal.removed().is_empty());
        assert_eq!(cal.added().len(), 2);
        assert!(cal.updated().is_empty());
    }

    #[test]
    fn test_far_future_offsets_are_rejected() {
        let mut cal = calendar();
        let far = fields("p", "now+100000000d", "now+100000001d");
        assert!(!cal.add(far).unwrap());
        assert!(cal.is_empty());
        assert!(cal.sort_day("now+100000000d").is_empty());
    }

    #[test]
    fn test_update_and_delete_missing_coordinates() {
        let mut cal = calendar();
        assert!(!cal
            .update("2025-06-01", 0, EntryFields::new().with("note", "x"))
            .unwrap());
        assert!(!cal.delete("2025-06-01", 0));
        assert!(!cal.delete("not a day", 0));
        assert!(cal.removed().is_empty());
    }

    #[test]
    fn test_delete_records_cross_hash() {
        let mut cal = calendar();
        cal.add(fields("a", "2025-06-01T10:00:00", "2025-06-01T14:00:00"))
            .unwrap();
        let hash = cal
            .entry("2025-06-01", 0)
            .unwrap()
            .hash(&FieldSubset::CrossSystem);
        assert!(cal.delete("2025-06-01", 0));
        assert_eq!(cal.removed().to_vec(), vec![hash]);
        assert!(cal.is_empty());
    }

    #[test]
    fn test_hash_keymap_later_entry_wins() {
        let mut cal = calendar();
        cal.add(fields("a", "2025-06-01T10:00:00", "2025-06-01T14:00:00"))
            .unwrap();
        cal.add(
            fields("a", "2025-06-01T10:00:00", "2025-06-01T14:00:00").with("note", "second"),
        )
        .unwrap();
        assert_eq!(cal.len(), 2);

        let keymap = cal.make_hash_keymap(&FieldSubset::CrossSystem);
        assert_eq!(keymap.len(), 1);
        assert_eq!(
            keymap.values().next(),
            Some(&EntryRef::new("2025-06-01", 1))
        );
        assert_eq!(cal.make_hash_keymap(&FieldSubset::Unique).len(), 2);
        assert_eq!(cal.hashmap().len(), 2);
    }

    #[test]
    fn test_by_hash_operations() {
        let mut cal = calendar();
        cal.add(fields("a", "2025-06-01T10:00:00", "2025-06-01T14:00:00"))
            .unwrap();
        let hash = cal
            .entry("2025-06-01", 0)
            .unwrap()
            .hash(&FieldSubset::CrossSystem);

        let note = EntryFields::new().with("note", "moved dish");
        assert!(cal
            .update_by_hash(&hash, &FieldSubset::CrossSystem, note)
            .unwrap());
        assert_eq!(cal.entry("2025-06-01", 0).unwrap().note, "moved dish");

        assert!(!cal.delete_by_hash("0000000000", &FieldSubset::CrossSystem));
        assert!(cal.delete_by_hash(&hash, &FieldSubset::CrossSystem));
        assert!(cal.is_empty());
    }

    #[test]
    fn test_format_day_lists_with_indices() {
        let mut cal = calendar();
        cal.add(fields("b", "2025-06-01T13:00:00", "2025-06-01T15:00:00"))
            .unwrap();
        cal.add(fields("a", "2025-06-01T10:00:00", "2025-06-01T14:00:00"))
            .unwrap();

        let rows = cal.list_day("2025-06-01", &FieldSubset::CrossSystem);
        assert_eq!(
            rows,
            vec![
                vec!["1", "a", "2025-06-01T10:00:00", "2025-06-01T14:00:00"],
                vec!["0", "b", "2025-06-01T13:00:00", "2025-06-01T15:00:00"],
            ]
        );
        let table = cal.format_day("2025-06-01", &FieldSubset::Short);
        let header = table.lines().next().unwrap();
        assert!(header.starts_with('#'));
        assert!(header.contains("lst_start"));
        assert_eq!(table.lines().count(), 4);
    }

    #[test]
    fn test_graph_day_draws_each_entry() {
        let mut cal = calendar();
        cal.add(fields("survey", "2025-06-01T10:00:00", "2025-06-01T14:00:00"))
            .unwrap();
        let graph = cal.graph_day("2025-06-01", EntryField::Program).unwrap();
        let row = graph
            .lines()
            .find(|line| line.contains("survey"))
            .unwrap();
        assert!(row.trim_start().starts_with("0 survey"));
        assert_eq!(row.matches('*').count(), 25);
        assert!(graph.lines().last().unwrap().trim_start().starts_with("LST"));

        let empty = cal.graph_day("2025-06-05", EntryField::Program).unwrap();
        assert_eq!(empty.lines().count(), 6);
        assert!(matches!(
            cal.graph_day_with("2025-06-01", EntryField::Program, "Nowhere/Land", 10.0),
            Err(CalendarError::Time(_))
        ));
    }

    #[test]
    fn test_schedule_centres_window_on_transit() {
        let mut cal = calendar();
        let request = ScheduleRequest::new("5.5", "20")
            .source("crab")
            .day("2025-06-01")
            .duration_hours(4.0);
        assert!(cal.schedule(&request, EntryFields::new()).unwrap());

        let entry = cal.most_recent().unwrap();
        assert_eq!(entry.program, "crab");
        assert_eq!(entry.note, "crab");
        assert_eq!(entry.utc_stop.unwrap() - entry.utc_start.unwrap(), Duration::hours(4));

        let request = request.day("2025-06-02");
        let note = EntryFields::new().with("note", "calibrator");
        assert!(cal.schedule(&request, note).unwrap());
        assert_eq!(cal.most_recent().unwrap().note, "calibrator -- crab");
    }

    #[test]
    fn test_schedule_failures() {
        let mut cal = calendar();
        let never_up = ScheduleRequest::new("5.5", "-80").day("2025-06-01");
        assert!(!cal.schedule(&never_up, EntryFields::new()).unwrap());

        let by_name = ScheduleRequest {
            source: Some("crab".to_string()),
            ..ScheduleRequest::default()
        };
        assert!(!cal.schedule(&by_name, EntryFields::new()).unwrap());
        assert!(cal.is_empty());
    }

    #[test]
    fn test_add_from_file_counts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            br#"[
                {"program": "a", "utc_start": "2025-06-01T10:00:00", "utc_stop": "2025-06-01T14:00:00"},
                {"program": "a", "utc_start": "2025-06-01T10:00:00", "utc_stop": "2025-06-01T14:00:00"},
                {"program": "c"}
            ]"#,
        )
        .unwrap();
        let mut cal = calendar();
        assert_eq!(cal.add_from_file(file.path()).unwrap(), (1, 2));
    }

    #[test]
    fn test_write_without_file() {
        let mut cal = calendar();
        assert!(matches!(cal.write(), Err(CalendarError::NoFile)));
        assert!(matches!(cal.refresh(), Err(CalendarError::NoFile)));
    }
}
