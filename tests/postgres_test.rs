//! Engine against PostgreSQL
//!
//! Needs Docker or `TEST_DATABASE_URL`; run with `cargo test -- --ignored`.

mod helpers;

use assert_matches::assert_matches;
use chrono::Duration;
use futures::future::join_all;
use helpers::*;
use serial_test::serial;
use SlotKeeper::config::BookingConfig;
use SlotKeeper::models::{BookingRequest, CreateEventRequest, EventFilter, RecurrenceRule};
use SlotKeeper::{BookingConflict, EventStore, SlotKeeperError};

fn config() -> BookingConfig {
    BookingConfig {
        // Losers of a serialization race re-run and see the committed state
        serialization_retries: 5,
        ..BookingConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
#[ignore]
async fn test_postgres_last_slot_race() {
    let db = TestDatabase::new().await.expect("Failed to set up test database");
    let (engine, _receiver) = db.engine(config());

    for user in [club_member(1), club_member(2)] {
        engine.sync_user_facts(&user).await.unwrap();
    }
    let start = days_ahead(3);
    let event = engine
        .create_event(CreateEventRequest::club("Club night", start, start + Duration::hours(2), 1))
        .await
        .unwrap()
        .remove(0);

    let handles: Vec<_> = [club_member(1), club_member(2)]
        .iter()
        .map(|user| {
            let engine = engine.clone();
            let request = BookingRequest::own(event.id, actor_for(user), true);
            tokio::spawn(async move { engine.set_booking(request).await })
        })
        .collect();

    let results: Vec<_> = join_all(handles).await.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(SlotKeeperError::Conflict(BookingConflict::NoMoreSlots)))));
    assert_eq!(db.count_records("booking_records").await.unwrap(), 1);
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_postgres_fifo_promotion_and_capacity() {
    let db = TestDatabase::new().await.expect("Failed to set up test database");
    let (engine, _receiver) = db.engine(config());

    let users: Vec<_> = (1..=4).map(club_member).collect();
    for user in &users {
        engine.sync_user_facts(user).await.unwrap();
    }
    let start = days_ahead(3);
    let event = engine
        .create_event(CreateEventRequest::club("Club night", start, start + Duration::hours(2), 1))
        .await
        .unwrap()
        .remove(0);

    engine.set_booking(BookingRequest::own(event.id, actor_for(&users[0]), true)).await.unwrap();
    for user in &users[1..] {
        engine.set_waitlist(BookingRequest::own(event.id, actor_for(user), true)).await.unwrap();
    }

    let outcome = engine
        .set_booking(BookingRequest::own(event.id, actor_for(&users[0]), false))
        .await
        .unwrap();
    assert_eq!(outcome.promoted_user_id, Some(users[1].user_id));

    let change = engine.update_capacity(event.id, 2).await.unwrap();
    let promoted: Vec<i64> = change.promoted.iter().map(|r| r.user_id).collect();
    assert_eq!(promoted, vec![users[2].user_id]);

    assert_matches!(
        engine.update_capacity(event.id, 1).await,
        Err(SlotKeeperError::Conflict(BookingConflict::TotalSlotsLessThanBooked))
    );

    let participants = engine.event_participants(event.id).await.unwrap();
    assert_eq!(participants.booked.len(), 2);
    assert_eq!(participants.waitlist.len(), 1);
    assert_eq!(participants.waitlist[0].record.user_id, users[3].user_id);
}

#[tokio::test]
#[serial]
#[ignore]
async fn test_postgres_recurrence_group_delete() {
    let db = TestDatabase::new().await.expect("Failed to set up test database");
    let (engine, _receiver) = db.engine(config());

    let start = days_ahead(2);
    let events = engine
        .create_event(
            CreateEventRequest::club("Daily drills", start, start + Duration::hours(1), 5)
                .with_recurrence(RecurrenceRule::Daily, Some(start + Duration::days(4))),
        )
        .await
        .unwrap();
    assert_eq!(events.len(), 5);

    // created_at survives the round trip exactly
    let stored = engine.store().find_event(events[2].id).await.unwrap().unwrap();
    assert_eq!(stored.created_at, events[2].created_at);

    let deleted = engine.delete_event(events[2].id, Some(RecurrenceRule::Daily)).await.unwrap();
    assert_eq!(deleted, 3);
    assert_eq!(engine.list_events(&EventFilter::default()).await.unwrap().len(), 2);
}
