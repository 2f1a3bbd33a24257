use reservation_core::config::DEFAULT_RESERVATIONS_KEY;
use reservation_core::{MemoryMedium, RecordChannel, ReservationEntry, ReservationStore, StorageMedium};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const DAY: &str = "2024-05-01";

fn store_over(medium: &MemoryMedium) -> ReservationStore {
    ReservationStore::new(RecordChannel::new(Arc::new(medium.open_context())))
}

fn entry(date: &str, slots: &[&str]) -> ReservationEntry {
    ReservationEntry {
        date: date.to_string(),
        slots: slots.iter().map(|slot| slot.to_string()).collect(),
    }
}

fn stored_entries(medium: &MemoryMedium) -> Vec<ReservationEntry> {
    let raw = medium.get_item(DEFAULT_RESERVATIONS_KEY).unwrap().unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn set_slots_sorts_and_deduplicates() {
    let medium = MemoryMedium::new();
    let store = store_over(&medium);

    store.set_slots(DAY, ["10:00", "09:00", "10:00"]);

    assert_eq!(store.get_for_date(DAY), ["09:00", "10:00"]);
    assert_eq!(stored_entries(&medium), vec![entry(DAY, &["09:00", "10:00"])]);
}

#[test]
fn set_slots_with_empty_date_is_ignored() {
    let medium = MemoryMedium::new();
    let store = store_over(&medium);

    store.set_slots("", ["09:00"]);

    assert!(store.list().is_empty());
    assert_eq!(medium.get_item(DEFAULT_RESERVATIONS_KEY).unwrap(), None);
    assert_eq!(store.revision(), 0);
}

#[test]
fn set_slots_with_no_slots_removes_the_date() {
    let medium = MemoryMedium::new();
    let store = store_over(&medium);
    store.set_slots(DAY, ["09:00"]);

    store.set_slots(DAY, Vec::<String>::new());

    assert!(store.list().is_empty());
    assert!(store.get_for_date(DAY).is_empty());
    assert!(stored_entries(&medium).is_empty());
}

#[test]
fn add_slots_unions_with_existing_slots() {
    let medium = MemoryMedium::new();
    let store = store_over(&medium);
    store.set_slots(DAY, ["10:00", "09:00", "10:00"]);

    store.add_slots(DAY, ["11:00"]);

    assert_eq!(store.get_for_date(DAY), ["09:00", "10:00", "11:00"]);
}

#[test]
fn repeated_add_slots_matches_single_set_of_union() {
    let medium = MemoryMedium::new();
    let added = store_over(&medium);
    added.add_slots(DAY, ["13:00", "09:00"]);
    added.add_slots(DAY, ["09:00", "11:00"]);
    added.add_slots(DAY, ["09:00", "11:00"]);

    let other = MemoryMedium::new();
    let set = store_over(&other);
    set.set_slots(DAY, ["13:00", "09:00", "11:00"]);

    assert_eq!(added.list(), set.list());
    assert_eq!(stored_entries(&medium), stored_entries(&other));
}

#[test]
fn removing_every_slot_removes_the_date() {
    let medium = MemoryMedium::new();
    let store = store_over(&medium);
    store.set_slots(DAY, ["09:00", "10:00", "11:00"]);
    store.set_slots("2024-05-02", ["08:00"]);

    store.remove_slot(DAY, "09:00");
    store.remove_slot(DAY, "10:00");
    assert_eq!(store.get_for_date(DAY), ["11:00"]);
    store.remove_slot(DAY, "11:00");

    assert_eq!(store.list(), vec![entry("2024-05-02", &["08:00"])]);
    assert_eq!(stored_entries(&medium), vec![entry("2024-05-02", &["08:00"])]);
}

#[test]
fn removing_absent_slot_or_date_is_a_noop() {
    let medium = MemoryMedium::new();
    let store = store_over(&medium);
    store.set_slots(DAY, ["09:00"]);

    store.remove_slot(DAY, "12:00");
    store.remove_slot(DAY, "12:00");
    store.remove_slot("2030-01-01", "09:00");

    assert_eq!(store.get_for_date(DAY), ["09:00"]);
    assert_eq!(stored_entries(&medium), vec![entry(DAY, &["09:00"])]);
}

#[test]
fn list_is_sorted_by_date_regardless_of_mutation_order() {
    let medium = MemoryMedium::new();
    let store = store_over(&medium);
    store.set_slots("2024-07-01", ["10:00"]);
    store.set_slots("2024-05-01", ["10:00"]);
    store.add_slots("2024-06-01", ["10:00"]);

    let dates: Vec<String> = store.list().into_iter().map(|entry| entry.date).collect();
    assert_eq!(dates, ["2024-05-01", "2024-06-01", "2024-07-01"]);

    let persisted: Vec<String> = stored_entries(&medium)
        .into_iter()
        .map(|entry| entry.date)
        .collect();
    assert_eq!(persisted, dates);
}

#[test]
fn returned_collections_are_copies() {
    let medium = MemoryMedium::new();
    let store = store_over(&medium);
    store.set_slots(DAY, ["09:00"]);

    let mut slots = store.get_for_date(DAY);
    slots.push("23:00".to_string());
    let mut listed = store.list();
    listed[0].slots.clear();

    assert_eq!(store.get_for_date(DAY), ["09:00"]);
}

#[test]
fn fresh_store_reproduces_persisted_calendar() {
    let medium = MemoryMedium::new();
    let original = store_over(&medium);
    original.set_slots("2024-05-03", ["15:00", "09:30"]);
    original.add_slots("2024-05-01", ["08:00"]);
    original.add_slots("2024-05-01", ["07:00"]);

    let reloaded = store_over(&medium);
    assert_eq!(reloaded.list(), original.list());
}

#[test]
fn malformed_record_yields_empty_calendar() {
    let medium = MemoryMedium::new();
    medium
        .set_item(DEFAULT_RESERVATIONS_KEY, "{\"date\":\"2024-05-01\"}")
        .unwrap();

    let store = store_over(&medium);
    assert!(store.list().is_empty());

    store.set_slots(DAY, ["09:00"]);
    assert_eq!(stored_entries(&medium), vec![entry(DAY, &["09:00"])]);
}

#[test]
fn loaded_records_are_normalized() {
    let medium = MemoryMedium::new();
    medium
        .set_item(
            DEFAULT_RESERVATIONS_KEY,
            r#"[{"date":"2024-05-02","slots":["10:00","09:00","10:00"]},{"date":"2024-05-01","slots":[]}]"#,
        )
        .unwrap();

    let store = store_over(&medium);
    assert_eq!(store.list(), vec![entry("2024-05-02", &["09:00", "10:00"])]);
}

#[test]
fn listeners_fire_after_each_mutation() {
    let medium = MemoryMedium::new();
    let store = store_over(&medium);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    store.on_change(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    store.set_slots(DAY, ["09:00"]);
    store.add_slots(DAY, ["10:00"]);
    store.remove_slot(DAY, "09:00");
    store.remove_slot("2030-01-01", "09:00");

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(store.revision(), 3);
}
