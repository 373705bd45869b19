//! Integration tests for the daily reset.

mod common;

use chrono::{DateTime, Duration, FixedOffset};
use common::{count, Rig};
use screenlimit_core::storage::kv::{self, keys};
use screenlimit_core::{Event, ReminderKind, ReminderState, ResetTrigger};

const APP: &str = "com.app.a";

fn at(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap()
}

fn resets(events: &[Event]) -> usize {
    count(events, |e| matches!(e, Event::ResetPerformed { .. }))
}

/// A spent day: counter past the limit, every flag set, apps blocked.
fn spent_day(rig: &Rig) {
    rig.set_counter(3_000);
    ReminderState {
        first_reminder_sent: true,
        second_reminder_sent: true,
        block_applied: true,
    }
    .save(&rig.store)
    .unwrap();
}

#[test]
fn missed_reset_runs_exactly_once() {
    let rig = Rig::at("2024-03-11T14:00:00+00:00").monitor(&[APP], 45);
    kv::write_date(&rig.store, keys::LAST_RESET_DATE, at("2024-03-10T13:00:00+00:00").date_naive()).unwrap();
    kv::write_timestamp(&rig.store, keys::LAST_RESET_TIMESTAMP, rig.now() - Duration::hours(25)).unwrap();
    spent_day(&rig);
    let mut engine = rig.engine();

    let events = engine.check_reset();
    assert_eq!(resets(&events), 1);
    assert!(events.contains(&Event::ResetPerformed {
        date: rig.now().date_naive(),
        trigger: ResetTrigger::CatchUp,
        at: rig.now(),
    }));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::ReminderDelivered {
            kind: ReminderKind::ResetDone,
            ..
        }
    )));

    assert_eq!(rig.counter(), 0);
    assert_eq!(ReminderState::load(&rig.store).unwrap(), ReminderState::default());
    assert!(rig.blocker.blocked().is_empty());
    assert_eq!(rig.raw(keys::LAST_RESET_DATE).as_deref(), Some("2024-03-11"));

    assert_eq!(resets(&engine.check_reset()), 0);
    rig.clock.advance(Duration::minutes(1));
    assert_eq!(resets(&engine.check_reset()), 0);
}

#[test]
fn recent_reset_is_not_repeated_before_window() {
    let rig = Rig::at("2024-03-11T10:00:00+00:00").monitor(&[APP], 45);
    kv::write_date(&rig.store, keys::LAST_RESET_DATE, at("2024-03-10T14:00:00+00:00").date_naive()).unwrap();
    kv::write_timestamp(&rig.store, keys::LAST_RESET_TIMESTAMP, at("2024-03-10T14:00:00+00:00")).unwrap();
    rig.set_counter(900);
    let mut engine = rig.engine();

    assert_eq!(resets(&engine.check_reset()), 0);
    assert_eq!(rig.counter(), 900);
}

#[test]
fn reset_is_idempotent() {
    let rig = Rig::at("2024-03-11T09:00:00+00:00").monitor(&[APP], 45).reset_today();
    spent_day(&rig);
    let mut engine = rig.engine();

    let (first, _) = engine.force_reset();
    let after_one = (
        rig.counter(),
        ReminderState::load(&rig.store).unwrap(),
        rig.blocker.blocked(),
    );
    let (second, _) = engine.force_reset();
    let after_two = (
        rig.counter(),
        ReminderState::load(&rig.store).unwrap(),
        rig.blocker.blocked(),
    );

    assert!(first.is_complete());
    assert!(second.is_complete());
    assert_eq!(after_one, after_two);
    assert_eq!(after_two.0, 0);
    assert_eq!(after_two.1, ReminderState::default());
    assert!(after_two.2.is_empty());
}

#[test]
fn first_run_records_a_baseline_without_clearing() {
    let rig = Rig::at("2024-03-10T15:20:00+00:00").monitor(&[APP], 45);
    rig.set_counter(300);
    let mut engine = rig.engine();

    let events = engine.check_reset();
    assert!(matches!(events[..], [Event::BaselineRecorded { .. }]));
    assert_eq!(rig.counter(), 300);
    assert!(rig.notifier.delivered().is_empty());
    assert_eq!(rig.raw(keys::LAST_RESET_DATE).as_deref(), Some("2024-03-10"));
    assert_eq!(rig.alarms.scheduled(), vec![at("2024-03-11T00:00:00+00:00")]);
}

#[test]
fn midnight_alarm_resets_and_rearms() {
    let rig = Rig::at("2024-03-10T23:59:30+00:00").monitor(&[APP], 45).reset_today();
    rig.set_counter(1_200);
    let mut engine = rig.engine();
    engine.start();
    assert_eq!(
        kv::read_timestamp(&rig.store, keys::RESET_SCHEDULED_FOR).unwrap(),
        Some(at("2024-03-11T00:00:00+00:00"))
    );
    assert_eq!(engine.until_next_alarm(), Some(std::time::Duration::from_secs(30)));

    rig.clock.set(at("2024-03-11T00:00:00+00:00"));
    let events = engine.on_alarm();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::ResetPerformed {
            trigger: ResetTrigger::Midnight,
            ..
        }
    )));
    assert_eq!(rig.counter(), 0);
    assert_eq!(
        kv::read_timestamp(&rig.store, keys::RESET_SCHEDULED_FOR).unwrap(),
        Some(at("2024-03-12T00:00:00+00:00"))
    );

    // The periodic check in the same minute finds nothing left to do.
    rig.clock.advance(Duration::seconds(20));
    assert_eq!(resets(&engine.check_reset()), 0);
}

#[test]
fn overdue_alarm_fires_on_start() {
    let rig = Rig::at("2024-03-11T00:30:00+00:00").monitor(&[APP], 45);
    kv::write_date(&rig.store, keys::LAST_RESET_DATE, at("2024-03-10T00:00:00+00:00").date_naive()).unwrap();
    kv::write_timestamp(&rig.store, keys::LAST_RESET_TIMESTAMP, at("2024-03-10T00:00:05+00:00")).unwrap();
    kv::write_timestamp(&rig.store, keys::RESET_SCHEDULED_FOR, at("2024-03-11T00:00:00+00:00")).unwrap();
    spent_day(&rig);
    let mut engine = rig.engine();

    let events = engine.start();
    assert_eq!(resets(&events), 1);
    assert_eq!(rig.counter(), 0);
    assert!(rig.alarms.scheduled().contains(&at("2024-03-12T00:00:00+00:00")));
}

#[test]
fn failed_unblock_is_retried_without_clearing_usage_again() {
    let rig = Rig::at("2024-03-11T00:00:10+00:00").monitor(&[APP], 45);
    kv::write_date(&rig.store, keys::LAST_RESET_DATE, at("2024-03-10T14:00:00+00:00").date_naive()).unwrap();
    kv::write_timestamp(&rig.store, keys::LAST_RESET_TIMESTAMP, at("2024-03-10T14:00:00+00:00")).unwrap();
    spent_day(&rig);
    let mut engine = rig.engine();
    engine.check_thresholds();
    assert!(rig.blocker.blocked().contains(APP));

    rig.blocker.set_failing(true);
    let events = engine.check_reset();
    assert_eq!(resets(&events), 1);
    assert_eq!(rig.counter(), 0);
    assert_eq!(rig.raw(keys::LAST_RESET_DATE).as_deref(), Some("2024-03-11"));
    assert!(rig.blocker.blocked().contains(APP));

    // Morning usage is kept while the actuator is down.
    rig.set_counter(600);
    rig.clock.advance(Duration::hours(8));
    assert_eq!(resets(&engine.check_reset()), 0);
    assert_eq!(rig.counter(), 600);

    rig.blocker.set_failing(false);
    engine.check_thresholds();
    assert!(rig.blocker.blocked().is_empty());
    assert_eq!(rig.counter(), 600);
}

#[test]
fn reset_that_cannot_clear_usage_is_retried() {
    let rig = Rig::at("2024-03-11T14:00:00+00:00").monitor(&[APP], 45);
    kv::write_date(&rig.store, keys::LAST_RESET_DATE, at("2024-03-10T00:00:00+00:00").date_naive()).unwrap();
    kv::write_timestamp(&rig.store, keys::LAST_RESET_TIMESTAMP, at("2024-03-10T00:00:00+00:00")).unwrap();
    spent_day(&rig);
    let mut engine = rig.engine();

    rig.store.fail_writes(true);
    assert_eq!(resets(&engine.check_reset()), 0);
    rig.store.fail_writes(false);
    assert_eq!(rig.counter(), 3_000);
    assert_eq!(rig.raw(keys::LAST_RESET_DATE).as_deref(), Some("2024-03-10"));
    assert!(rig.notifier.delivered().is_empty());

    rig.clock.advance(Duration::minutes(1));
    assert_eq!(resets(&engine.check_reset()), 1);
    assert_eq!(rig.counter(), 0);
    assert_eq!(rig.raw(keys::LAST_RESET_DATE).as_deref(), Some("2024-03-11"));
}

#[test]
fn failing_notification_does_not_undo_the_reset() {
    let rig = Rig::at("2024-03-11T14:00:00+00:00").monitor(&[APP], 45);
    kv::write_date(&rig.store, keys::LAST_RESET_DATE, at("2024-03-10T00:00:00+00:00").date_naive()).unwrap();
    kv::write_timestamp(&rig.store, keys::LAST_RESET_TIMESTAMP, at("2024-03-10T00:00:00+00:00")).unwrap();
    spent_day(&rig);
    rig.notifier.fail_notifications(true);
    let mut engine = rig.engine();

    let events = engine.check_reset();
    assert_eq!(resets(&events), 1);
    assert!(rig.notifier.notifications().is_empty());
    assert_eq!(rig.counter(), 0);
    assert_eq!(ReminderState::load(&rig.store).unwrap(), ReminderState::default());
    assert!(rig.blocker.blocked().is_empty());
    assert_eq!(rig.raw(keys::LAST_RESET_DATE).as_deref(), Some("2024-03-11"));

    // Nothing left to retry.
    rig.clock.advance(Duration::minutes(1));
    assert_eq!(resets(&engine.check_reset()), 0);
}

#[test]
fn clock_moving_backwards_skips_reset() {
    let rig = Rig::at("2024-03-09T12:00:00+00:00").monitor(&[APP], 45);
    kv::write_date(&rig.store, keys::LAST_RESET_DATE, at("2024-03-10T00:00:00+00:00").date_naive()).unwrap();
    kv::write_timestamp(&rig.store, keys::LAST_RESET_TIMESTAMP, at("2024-03-10T00:00:00+00:00")).unwrap();
    rig.set_counter(600);
    let mut engine = rig.engine();

    assert_eq!(resets(&engine.check_reset()), 0);
    assert_eq!(rig.counter(), 600);
}

#[test]
fn reset_clears_overlay_throttle() {
    let rig = Rig::at("2024-03-11T14:00:00+00:00").monitor(&[APP], 45).reset_today();
    ReminderState {
        block_applied: true,
        ..Default::default()
    }
    .save(&rig.store)
    .unwrap();
    rig.probe.set_foreground(Some(APP));
    let mut engine = rig.engine();

    engine.check_thresholds();
    engine.force_reset();
    assert!(rig.blocker.blocked().is_empty());

    // Spend the day again within the throttle window: the block and its
    // overlay come straight back.
    rig.set_counter(45 * 60);
    rig.clock.advance(Duration::seconds(5));
    engine.check_thresholds();
    assert_eq!(rig.overlay.block_overlays(), 2);
    assert!(rig.blocker.blocked().contains(APP));
}
