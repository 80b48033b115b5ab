// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use crate::test_helpers::Harness;

fn task(id: u64, kind: TaskKind) -> Task {
    Task {
        id: Token::new(id),
        kind,
    }
}

fn task_id(event: Event<String>) -> u64 {
    match event {
        Event::Task(task) => task.id.get(),
        other => panic!("expected task, got {other:?}"),
    }
}

#[test]
fn events_run_in_due_order_then_insertion_order() {
    let mut scheduler = ManualScheduler::<String>::new();
    scheduler.schedule_after(Duration::from_millis(50), task(1, TaskKind::Resync));
    scheduler.schedule(task(2, TaskKind::MaybeSend));
    scheduler.schedule(task(3, TaskKind::MaybeSend));

    assert_eq!(task_id(scheduler.advance().unwrap()), 2);
    assert_eq!(task_id(scheduler.advance().unwrap()), 3);
    assert_eq!(scheduler.now(), Duration::ZERO);
    assert_eq!(task_id(scheduler.advance().unwrap()), 1);
    assert_eq!(scheduler.now(), Duration::from_millis(50));
    assert!(scheduler.advance().is_none());
}

#[test]
fn cancel_removes_only_that_task() {
    let mut scheduler = ManualScheduler::<String>::new();
    scheduler.schedule(task(1, TaskKind::MaybeSend));
    scheduler.schedule_after(Duration::from_secs(1), task(2, TaskKind::Resync));
    scheduler.cancel(Token::new(2));
    scheduler.cancel(Token::new(99));

    assert_eq!(scheduler.pending(), 1);
    assert_eq!(scheduler.scheduled(TaskKind::Resync), None);
    assert_eq!(task_id(scheduler.advance().unwrap()), 1);
    assert!(scheduler.is_idle());
}

#[test]
fn clones_share_one_timeline() {
    let scheduler = ManualScheduler::<String>::new();
    let network = scheduler.clone();
    network.deliver_after(
        Duration::from_millis(5),
        Event::ProbeResponse {
            token: Token::new(7),
            result: Ok(Revision::new(3)),
        },
    );
    assert_eq!(scheduler.next_due(), Some(Duration::from_millis(5)));
    assert!(matches!(
        scheduler.advance(),
        Some(Event::ProbeResponse { .. })
    ));
    assert_eq!(network.now(), Duration::from_millis(5));
}

#[test]
fn past_due_events_are_clamped_to_now() {
    let scheduler = ManualScheduler::<String>::new();
    scheduler.deliver_after(Duration::from_secs(2), Event::Task(task(1, TaskKind::Resync)));
    scheduler.advance();
    scheduler.deliver_at(Duration::from_secs(1), Event::Task(task(2, TaskKind::Resync)));
    assert_eq!(scheduler.next_due(), Some(Duration::from_secs(2)));
}

#[test]
fn advance_to_never_moves_backwards() {
    let scheduler = ManualScheduler::<String>::new();
    scheduler.advance_to(Duration::from_secs(5));
    scheduler.advance_to(Duration::from_secs(1));
    assert_eq!(scheduler.now(), Duration::from_secs(5));

    scheduler.deliver(Event::Task(task(1, TaskKind::MaybeSend)));
    assert_eq!(scheduler.next_due(), Some(Duration::from_secs(5)));
}

#[test]
fn run_for_stops_at_window_end() {
    let mut h = Harness::connected(0, "A");
    h.send("X");
    h.scheduler.deliver_after(
        Duration::from_secs(10),
        Event::SubmitResponse {
            token: Token::new(999),
            result: Ok(Revision::new(1)),
        },
    );

    let handled = h.scheduler.run_for(&mut h.channel, Duration::from_secs(1));
    assert_eq!(handled, 1);
    assert_eq!(h.scheduler.now(), Duration::from_secs(1));
    assert_eq!(h.scheduler.pending(), 1);
    assert_eq!(h.submit_count(), 1);
}

#[test]
fn run_until_idle_respects_limit() {
    let mut h = Harness::connected(0, "A");
    h.send("X");
    for id in 100..105 {
        h.scheduler.deliver(Event::Task(task(id, TaskKind::MaybeSend)));
    }
    assert_eq!(h.scheduler.run_until_idle(&mut h.channel, 3), 3);
    assert_eq!(h.scheduler.pending(), 3);
    assert_eq!(h.run(), 3);
    assert_eq!(h.submit_count(), 1);
}
