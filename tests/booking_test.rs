//! Booking and cancellation through the engine

mod helpers;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use helpers::*;
use SlotKeeper::models::{Actor, BookingRequest, BookingState, CreateEventRequest, NotificationFact, UserEligibility};
use SlotKeeper::{BookingConflict, SlotKeeperError};

#[tokio::test]
async fn test_book_and_cancel() {
    let ctx = TestContext::new();
    let member = ctx.add_user(club_member(1)).await;
    let event = ctx.club_event(5).await;

    let outcome = ctx.book(event.id, member).await.unwrap();
    let record = outcome.record.expect("booked record");
    assert_eq!(record.user_id, member.user_id);
    assert_eq!(record.state(), BookingState::Booked);

    let availability = ctx.engine.event_availability(event.id).await.unwrap();
    assert_eq!(availability.booked, 1);
    assert_eq!(availability.free_slots, 4);

    let cancelled = ctx.cancel(event.id, member).await.unwrap();
    assert!(cancelled.record.is_none());
    assert_eq!(cancelled.promoted_user_id, None);
    assert!(ctx.booked_users(event.id).await.is_empty());
}

#[tokio::test]
async fn test_last_slot_then_no_more_slots() {
    let ctx = TestContext::new();
    let actors = ctx.add_users([club_member(1), club_member(2)]).await;
    let event = ctx.club_event(1).await;

    ctx.book(event.id, actors[0]).await.unwrap();
    assert_matches!(
        ctx.book(event.id, actors[1]).await,
        Err(SlotKeeperError::Conflict(BookingConflict::NoMoreSlots))
    );
    assert_eq!(ctx.booked_users(event.id).await, vec![actors[0].user_id]);
}

#[tokio::test]
async fn test_double_booking_rejected() {
    let ctx = TestContext::new();
    let member = ctx.add_user(club_member(1)).await;
    let event = ctx.club_event(5).await;

    ctx.book(event.id, member).await.unwrap();
    let err = ctx.book(event.id, member).await.unwrap_err();
    assert_eq!(err.code(), "ALREADY_BOOKED");
}

#[tokio::test]
async fn test_booking_disabled() {
    let ctx = TestContext::new();
    let member = ctx.add_user(club_member(1)).await;
    let start = days_ahead(3);
    let event = ctx
        .create_single(
            CreateEventRequest::club("Closed", start, start + Duration::hours(1), 5).with_booking_enabled(false),
        )
        .await;

    assert_matches!(
        ctx.book(event.id, member).await,
        Err(SlotKeeperError::Conflict(BookingConflict::BookingDisabled))
    );
}

#[tokio::test]
async fn test_cancel_without_booking() {
    let ctx = TestContext::new();
    let member = ctx.add_user(club_member(1)).await;
    let event = ctx.club_event(5).await;

    assert_matches!(
        ctx.cancel(event.id, member).await,
        Err(SlotKeeperError::Conflict(BookingConflict::NotBooked))
    );

    // A waitlist entry is not a booking
    ctx.join_waitlist(event.id, member).await.unwrap();
    assert_matches!(
        ctx.cancel(event.id, member).await,
        Err(SlotKeeperError::Conflict(BookingConflict::NotBooked))
    );
}

#[tokio::test]
async fn test_club_event_requires_membership() {
    let ctx = TestContext::new();
    let outsider = ctx.add_user(UserEligibility::student(OUTSIDER_ID)).await;
    let event = ctx.club_event(5).await;

    assert_matches!(
        ctx.book(event.id, outsider).await,
        Err(SlotKeeperError::Conflict(BookingConflict::NotEligible))
    );
    assert_matches!(
        ctx.join_waitlist(event.id, outsider).await,
        Err(SlotKeeperError::Conflict(BookingConflict::NotEligible))
    );
}

#[tokio::test]
async fn test_course_event_eligibility_and_single_participation() {
    let ctx = TestContext::new();
    let enrolled = ctx.add_user(course_student(1, COURSE_ID)).await;
    let other_course = ctx.add_user(course_student(2, OTHER_COURSE_ID)).await;

    let lab = ctx.predefined_event("Lab", vec![COURSE_ID]).await;
    let first = ctx.course_event_in(lab.id, 3, 10).await;
    let second = ctx.course_event_in(lab.id, 10, 10).await;
    assert_eq!(first.title, "Lab");

    assert_matches!(
        ctx.book(first.id, other_course).await,
        Err(SlotKeeperError::Conflict(BookingConflict::NotEligible))
    );

    ctx.book(first.id, enrolled).await.unwrap();
    assert_matches!(
        ctx.book(second.id, enrolled).await,
        Err(SlotKeeperError::Conflict(BookingConflict::AlreadyBookedPredefinedEvent))
    );

    // Completed participation still counts
    ctx.engine.sweep_completed(first.end_time + Duration::minutes(1)).await.unwrap();
    assert_matches!(
        ctx.book(second.id, enrolled).await,
        Err(SlotKeeperError::Conflict(BookingConflict::AlreadyBookedPredefinedEvent))
    );
}

#[tokio::test]
async fn test_calendar_block() {
    let ctx = TestContext::new();
    let blocked = ctx
        .add_user(club_member(1).calendar_blocked_until(Utc::now() + Duration::days(30)))
        .await;
    let lapsed = ctx
        .add_user(club_member(2).calendar_blocked_until(Utc::now() - Duration::days(1)))
        .await;
    let event = ctx.club_event(5).await;

    assert_matches!(
        ctx.book(event.id, blocked).await,
        Err(SlotKeeperError::Conflict(BookingConflict::CalendarBlocked))
    );
    ctx.book(event.id, lapsed).await.unwrap();
}

#[tokio::test]
async fn test_privileged_actors_book_for_others() {
    let ctx = TestContext::new();
    let admin = ctx.add_user(admin()).await;
    let teacher = ctx.add_user(teacher()).await;
    let student = ctx.add_user(club_member(1)).await;
    let outsider = ctx.add_user(UserEligibility::student(OUTSIDER_ID)).await;
    let event = ctx.club_event(5).await;

    // Admins bypass the membership check
    ctx.engine
        .set_booking(BookingRequest { event_id: event.id, user_id: outsider.user_id, actor: admin, join: true })
        .await
        .unwrap();

    ctx.engine
        .set_booking(BookingRequest { event_id: event.id, user_id: student.user_id, actor: teacher, join: true })
        .await
        .unwrap();

    assert_eq!(ctx.booked_users(event.id).await, vec![student.user_id, outsider.user_id]);

    let err = ctx
        .engine
        .set_booking(BookingRequest { event_id: event.id, user_id: outsider.user_id, actor: student, join: false })
        .await
        .unwrap_err();
    assert_matches!(err, SlotKeeperError::PermissionDenied(_));
}

#[tokio::test]
async fn test_unknown_event_and_user() {
    let ctx = TestContext::new();
    let member = ctx.add_user(club_member(1)).await;
    let event = ctx.club_event(5).await;

    assert_matches!(
        ctx.book(9_999, member).await,
        Err(SlotKeeperError::EventNotFound { event_id: 9_999 })
    );
    assert_matches!(
        ctx.book(event.id, Actor::student(4_242)).await,
        Err(SlotKeeperError::UserNotFound { user_id: 4_242 })
    );
}

#[tokio::test]
async fn test_low_slots_fact() {
    let mut ctx = TestContext::new();
    let actors = ctx.add_users([club_member(1), club_member(2)]).await;
    let event = ctx.club_event(3).await;

    let first = ctx.book(event.id, actors[0]).await.unwrap();
    assert!(first.facts.is_empty());

    let second = ctx.book(event.id, actors[1]).await.unwrap();
    let expected = NotificationFact::SlotsLow { event_id: event.id, free_slots: 1, total_slots: 3 };
    assert_eq!(second.facts, vec![expected.clone()]);
    assert_eq!(ctx.drain_facts(), vec![expected]);
}

#[tokio::test]
async fn test_low_slots_threshold_is_configurable() {
    let mut config = SlotKeeper::config::BookingConfig::default();
    config.low_slots_threshold = 5;
    let ctx = TestContext::with_config(config);
    let member = ctx.add_user(club_member(1)).await;
    let event = ctx.club_event(10).await;

    let outcome = ctx.book(event.id, member).await.unwrap();
    assert!(outcome.facts.is_empty());

    let change = ctx.engine.update_capacity(event.id, 5).await.unwrap();
    assert_eq!(
        change.facts,
        vec![NotificationFact::SlotsLow { event_id: event.id, free_slots: 4, total_slots: 5 }]
    );
}

#[tokio::test]
async fn test_club_cap_released_by_cancellation() {
    let ctx = TestContext::new();
    let member = ctx.add_user(club_member(1)).await;
    let first = ctx.club_event_in(2, 5).await;
    let second = ctx.club_event_in(3, 5).await;
    let third = ctx.club_event_in(4, 5).await;

    ctx.book(first.id, member).await.unwrap();
    ctx.join_waitlist(second.id, member).await.unwrap();

    assert_matches!(
        ctx.book(third.id, member).await,
        Err(SlotKeeperError::Conflict(BookingConflict::ClubLimitReached))
    );
    assert_matches!(
        ctx.join_waitlist(third.id, member).await,
        Err(SlotKeeperError::Conflict(BookingConflict::ClubLimitReached))
    );

    ctx.cancel(first.id, member).await.unwrap();
    ctx.book(third.id, member).await.unwrap();
}

#[tokio::test]
async fn test_club_cap_released_by_completion() {
    let ctx = TestContext::new();
    let member = ctx.add_user(club_member(1)).await;
    let first = ctx.club_event_in(2, 5).await;
    let second = ctx.club_event_in(3, 5).await;
    let later = ctx.club_event_in(10, 5).await;

    ctx.book(first.id, member).await.unwrap();
    ctx.book(second.id, member).await.unwrap();
    assert_matches!(
        ctx.book(later.id, member).await,
        Err(SlotKeeperError::Conflict(BookingConflict::ClubLimitReached))
    );

    let marked = ctx.engine.sweep_completed(second.end_time + Duration::hours(1)).await.unwrap();
    assert_eq!(marked, 2);

    ctx.book(later.id, member).await.unwrap();

    let active = ctx.engine.user_bookings(member.user_id, false).await.unwrap();
    assert_eq!(active.len(), 1);
    let all = ctx.engine.user_bookings(member.user_id, true).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let ctx = TestContext::new();
    let member = ctx.add_user(club_member(1)).await;
    let event = ctx.club_event(5).await;
    ctx.book(event.id, member).await.unwrap();

    let cutoff = event.end_time + Duration::minutes(5);
    assert_eq!(ctx.engine.sweep_completed(cutoff).await.unwrap(), 1);
    assert_eq!(ctx.engine.sweep_completed(cutoff).await.unwrap(), 0);
}

#[tokio::test]
async fn test_booking_while_waitlisted_is_rejected() {
    let ctx = TestContext::new();
    let member = ctx.add_user(club_member(1)).await;
    let event = ctx.club_event(2).await;

    let waitlisted = ctx.join_waitlist(event.id, member).await.unwrap().record.unwrap();
    assert_matches!(
        ctx.book(event.id, member).await,
        Err(SlotKeeperError::Conflict(BookingConflict::AlreadyInWaitlist))
    );

    // The queued record is untouched
    let participants = ctx.engine.event_participants(event.id).await.unwrap();
    assert_eq!(participants.state_of(member.user_id), BookingState::Waitlisted);
    assert_eq!(participants.waitlist[0].record.id, waitlisted.id);
    assert!(participants.booked.is_empty());
}

#[tokio::test]
async fn test_started_event_rejects_join() {
    let ctx = TestContext::new();
    let member = ctx.add_user(club_member(1)).await;
    let event = ctx.club_event(5).await;

    ctx.engine
        .update_event(
            event.id,
            SlotKeeper::models::UpdateEventRequest {
                start_time: Some(Utc::now() - Duration::hours(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_matches!(
        ctx.book(event.id, member).await,
        Err(SlotKeeperError::Conflict(BookingConflict::AlreadyStarted))
    );
}
