//! Cycle and lead-time resolution across the fixture clocks and inputs.

use chrono::{Datelike, Duration, NaiveDate, Timelike};
use gfs_common::{
    default_publication_latency, parse_lead_token, resolve_cycle, resolve_lead_input,
    resolve_lead_times, CycleInput, LeadTimeInput, ParameterError,
};
use test_utils::time::{
    just_after_midnight, mid_afternoon, on_cycle, GARBAGE_CYCLES, GFS_CYCLES, VALID_CYCLES,
};

#[test]
fn test_valid_cycles_resolve_exactly() {
    for text in VALID_CYCLES {
        let resolved =
            resolve_cycle(&CycleInput::from_text(text), mid_afternoon(), default_publication_latency())
                .unwrap();
        let expected_hour: u32 = text[11..13].parse().unwrap();
        assert_eq!(resolved.cycle.hour(), expected_hour, "{text}");
        assert_eq!(
            resolved.cycle.date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            "{text}"
        );
        assert_eq!(resolved.label, text);
    }
}

#[test]
fn test_every_off_cycle_hour_is_rejected() {
    for hour in (0..24).filter(|h| h % 6 != 0) {
        let text = format!("2024-01-15T{:02}:00:00", hour);
        let err = resolve_cycle(&CycleInput::from_text(&text), mid_afternoon(), Duration::zero())
            .unwrap_err();
        assert!(
            matches!(err, ParameterError::InvalidCycleFormat { ref input, .. } if *input == text),
            "{text}"
        );
        assert!(err.to_string().contains(&format!("{:02}", hour)));
    }
}

#[test]
fn test_garbage_cycles_are_rejected_with_input() {
    for text in GARBAGE_CYCLES {
        let err = resolve_cycle(&CycleInput::from_text(text), mid_afternoon(), Duration::zero())
            .unwrap_err();
        assert!(matches!(err, ParameterError::InvalidCycleFormat { .. }), "{text:?}");
        assert!(err.to_string().contains(&format!("'{}'", text)));
    }
}

#[test]
fn test_aliases_never_run_ahead_of_the_clock() {
    for now in [mid_afternoon(), just_after_midnight(), on_cycle()] {
        for alias in [CycleInput::Today, CycleInput::Latest] {
            let resolved = resolve_cycle(&alias, now, default_publication_latency()).unwrap();
            assert!(GFS_CYCLES.contains(&resolved.cycle.run.token().trim_end_matches('Z')));
            assert!(resolved.cycle.date <= now.date_naive());
            assert!(resolved.cycle.reference_time() <= now);
        }
    }

    // Six hours after 12Z the 12Z run counts as published
    let resolved =
        resolve_cycle(&CycleInput::Latest, on_cycle(), default_publication_latency()).unwrap();
    assert_eq!(resolved.cycle.hour(), 6);
    let resolved = resolve_cycle(&CycleInput::Latest, on_cycle(), Duration::zero()).unwrap();
    assert_eq!(resolved.cycle.hour(), 12);
}

#[test]
fn test_timestamp_objects() {
    let aware = on_cycle();
    let resolved = resolve_cycle(&CycleInput::from(aware), mid_afternoon(), Duration::zero()).unwrap();
    assert_eq!(resolved.cycle.reference_time(), aware);
    assert_eq!(resolved.label, "2024-01-15T12:00:00");

    let naive = just_after_midnight().naive_utc();
    assert_eq!(naive.hour(), 3);
    assert!(resolve_cycle(&CycleInput::from(naive), mid_afternoon(), Duration::zero()).is_err());
}

#[test]
fn test_lead_sequences() {
    assert_eq!(
        resolve_lead_times(24).unwrap().as_slice(),
        &[0, 3, 6, 9, 12, 15, 18, 21, 24]
    );
    assert_eq!(resolve_lead_times(25).unwrap().len(), 9);
    assert_eq!(resolve_lead_times(1).unwrap().as_slice(), &[0]);

    let long = resolve_lead_times(500).unwrap();
    assert_eq!(long.last(), Some(498));
    assert!(long.as_slice().windows(2).all(|w| w[1] - w[0] == 3));

    assert_eq!(resolve_lead_times(999).unwrap().last(), Some(999));

    for bad in [0, -1, -24, 1000, 4_000_000_000] {
        let err = resolve_lead_times(bad).unwrap_err();
        assert!(matches!(err, ParameterError::InvalidMaxLeadTime { .. }));
        assert!(err.to_string().contains(&bad.to_string()));
    }
}

#[test]
fn test_lead_inputs() {
    assert_eq!(parse_lead_token("f003").unwrap(), 3);

    let (max, seq) = resolve_lead_input(&LeadTimeInput::from_text("f003")).unwrap();
    assert_eq!((max, seq.as_slice()), (3, &[3][..]));

    let (max, seq) = resolve_lead_input(&LeadTimeInput::from_text("48")).unwrap();
    assert_eq!(max, 48);
    assert_eq!(seq.len(), 17);
    assert_eq!(seq.file_token(16).as_deref(), Some("f048"));

    for text in ["2.5", "abc", "f0x3"] {
        assert!(matches!(
            resolve_lead_input(&LeadTimeInput::from_text(text)).unwrap_err(),
            ParameterError::InvalidMaxLeadTime { .. }
        ), "{text}");
    }
}

#[test]
fn test_date_accessors() {
    let resolved = resolve_cycle(
        &CycleInput::from_text("2024-02-29T18:00:00"),
        mid_afternoon(),
        Duration::zero(),
    )
    .unwrap();
    assert_eq!(resolved.cycle.date.day(), 29);
    assert_eq!(resolved.cycle.date_string(), "2024-02-29");
    assert_eq!(resolved.cycle.compact_date(), "20240229");
    assert_eq!(resolved.cycle.run.token(), "18Z");
}
