//! Tests for recording, applying and replaying events on aggregates.

mod common;

use pretty_assertions::assert_eq;
use uuid::Uuid;

use eventloom::{Aggregate, AggregateBase, Error, Event, StreamId};

use common::{List, TASK_ADDED, TASK_REMOVED, list_with};

#[test]
fn new_aggregate_starts_empty() {
    let id = Uuid::new_v4();
    let list = List::new(id).expect("new list");

    assert_eq!(list.id(), id);
    assert_eq!(list.base().kind(), "list");
    assert_eq!(list.version(), 0);
    assert!(list.changes().is_empty());
    assert!(list.tasks.is_empty());
}

#[test]
fn next_applies_and_buffers_the_event() {
    let id = Uuid::new_v4();
    let mut list = List::new(id).expect("new list");

    list.add_task("foo").expect("add foo");
    list.add_task("bar").expect("add bar");

    assert_eq!(list.tasks, vec!["foo", "bar"]);
    assert_eq!(list.version(), 2);

    let changes = list.changes();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[1].sequence(), 2);
    assert_eq!(changes[1].name(), TASK_ADDED);
    assert_eq!(changes[1].aggregate_id(), id);
    assert_eq!(changes[1].aggregate_kind(), "list");
    assert_eq!(changes[1].data::<String>().map(String::as_str), Some("bar"));
}

#[test]
fn rejected_command_records_nothing() {
    let mut list = list_with(Uuid::new_v4(), &["foo"]);

    let err = list.add_task("FOO").expect_err("duplicate task");
    assert!(matches!(err, Error::Validation(_)));

    let err = list.remove_task("bar").expect_err("absent task");
    assert!(matches!(err, Error::Validation(_)));

    assert_eq!(list.version(), 1);
    assert_eq!(list.changes().len(), 1);
    assert_eq!(list.tasks, vec!["foo"]);
}

#[test]
fn next_rejects_unregistered_event_type() {
    let mut list = List::new(Uuid::new_v4()).expect("new list");

    let err = list
        .next("task_renamed", "foo".to_owned())
        .expect_err("no applier for task_renamed");

    assert!(matches!(err, Error::UnregisteredEventType(t) if t == "task_renamed"));
    assert_eq!(list.version(), 0);
    assert!(list.changes().is_empty());
}

#[test]
fn next_rejects_mistyped_payload() {
    let mut list = List::new(Uuid::new_v4()).expect("new list");

    let err = list.next(TASK_ADDED, 42_u32).expect_err("payload is not a String");

    assert!(matches!(err, Error::PayloadMismatch { .. }));
    assert_eq!(list.version(), 0);
    assert!(list.changes().is_empty());
}

#[test]
fn duplicate_applier_registration_fails() {
    let mut base = AggregateBase::<List>::new("list", Uuid::new_v4());
    base.register_applier(TASK_ADDED, |list: &mut List, task: &String| {
        list.tasks.push(task.clone())
    })
    .expect("first registration");

    let err = base
        .register_applier(TASK_ADDED, |_: &mut List, _: &String| {})
        .expect_err("second registration");
    assert!(matches!(err, Error::DuplicateRegistration(t) if t == TASK_ADDED));
}

#[test]
fn apply_rejects_sequence_gap() {
    let id = Uuid::new_v4();
    let mut list = List::new(id).expect("new list");
    let event = Event::new(StreamId::new("list", id), 2, TASK_ADDED, "foo".to_owned());

    let err = list.apply(&event).expect_err("gap");

    assert!(matches!(err, Error::SequenceGap { expected: 1, found: 2 }));
    assert_eq!(list.version(), 0);
    assert!(list.tasks.is_empty());
}

#[test]
fn apply_does_not_buffer_events() {
    let id = Uuid::new_v4();
    let mut list = List::new(id).expect("new list");
    let event = Event::new(StreamId::new("list", id), 1, TASK_ADDED, "foo".to_owned());

    list.apply(&event).expect("apply");

    assert_eq!(list.version(), 1);
    assert_eq!(list.tasks, vec!["foo"]);
    assert!(list.changes().is_empty());
}

#[test]
fn replay_is_deterministic() {
    let id = Uuid::new_v4();
    let mut source = list_with(id, &["foo", "bar", "baz", "qux"]);
    source.remove_task("bar").expect("remove bar");
    source.remove_task("qux").expect("remove qux");
    source.add_task("bar").expect("re-add bar");
    let events: Vec<Event> = source.changes().to_vec();

    let replay = || {
        let mut list = List::new(id).expect("new list");
        for event in &events {
            list.apply(event).expect("apply");
        }
        list
    };
    let first = replay();
    let second = replay();

    assert_eq!(first.tasks, vec!["foo", "baz", "bar"]);
    assert_eq!(first.tasks, second.tasks);
    assert_eq!(first.version(), 7);
    assert_eq!(first.version(), second.version());
    assert_eq!(first.tasks, source.tasks);
}

#[test]
fn removal_event_names_the_task() {
    let mut list = list_with(Uuid::new_v4(), &["foo"]);
    list.remove_task("foo").expect("remove foo");

    let last = list.changes().last().expect("removal event");
    assert_eq!(last.name(), TASK_REMOVED);
    assert_eq!(last.data::<String>().map(String::as_str), Some("foo"));
    assert!(list.tasks.is_empty());
}

#[test]
fn tasks_match_regardless_of_case() {
    let mut list = list_with(Uuid::new_v4(), &["Foo", "Ärger"]);

    let err = list.add_task("FOO").expect_err("duplicate in another case");
    assert!(matches!(err, Error::Validation(_)));

    list.remove_task("foo").expect("remove in another case");
    list.remove_task("ärger").expect("remove non-ascii in another case");
    assert!(list.tasks.is_empty());
    assert_eq!(list.version(), 4);
}
