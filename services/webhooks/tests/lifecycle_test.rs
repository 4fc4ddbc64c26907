mod common;

use parley_webhooks::lifecycle::{LifecycleError, LifecycleOutcome, SideEffect};
use shared::models::MeetingStatus;
use shared::DispatchOutcome;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_call_started_twice_keeps_first_call_ref() {
    let fixture = common::setup_test_fixture();
    let agent = fixture.store.add_agent("Scribe", "");
    let meeting = fixture.store.add_meeting(&agent.id, MeetingStatus::Upcoming);

    let first = fixture
        .lifecycle
        .call_started(&meeting.id, Some("default:first"))
        .await
        .unwrap();
    assert_eq!(first, LifecycleOutcome::Transitioned(MeetingStatus::Active));
    let started_at = fixture.store.meeting(&meeting.id).unwrap().started_at;

    let second = fixture
        .lifecycle
        .call_started(&meeting.id, Some("default:second"))
        .await
        .unwrap();
    assert_eq!(second, LifecycleOutcome::NoChange);

    let current = fixture.store.meeting(&meeting.id).unwrap();
    assert_eq!(current.status, MeetingStatus::Active);
    assert_eq!(current.external_call_ref.as_deref(), Some("default:first"));
    assert_eq!(current.started_at, started_at);

    // The redelivery joins the call already on record.
    let connections = fixture.voice.connections();
    assert_eq!(connections.len(), 2);
    assert_eq!(connections[0].call_id, "first");
    assert_eq!(connections[1].call_id, "second");
}

#[tokio::test]
async fn test_call_started_fills_missing_call_ref_on_active_meeting() {
    let fixture = common::setup_test_fixture();
    let agent = fixture.store.add_agent("Scribe", "");
    let meeting = fixture.store.add_meeting(&agent.id, MeetingStatus::Active);

    let outcome = fixture
        .lifecycle
        .call_started(&meeting.id, Some("default:late"))
        .await
        .unwrap();

    assert_eq!(outcome, LifecycleOutcome::Recorded);
    assert_eq!(
        fixture.store.meeting(&meeting.id).unwrap().external_call_ref.as_deref(),
        Some("default:late")
    );
    let connections = fixture.voice.connections();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].call_id, "late");
}

#[tokio::test]
async fn test_call_started_with_missing_agent_changes_nothing() {
    let fixture = common::setup_test_fixture();
    let meeting = fixture.store.add_meeting("no-such-agent", MeetingStatus::Upcoming);

    let err = fixture
        .lifecycle
        .call_started(&meeting.id, Some("default:x"))
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::AgentNotFound(_)));
    assert_eq!(fixture.store.meeting(&meeting.id).unwrap(), meeting);
    assert!(fixture.voice.connections().is_empty());
}

#[tokio::test]
async fn test_voice_agent_failure_does_not_undo_activation() {
    let fixture = common::setup_test_fixture();
    let agent = fixture.store.add_agent("Scribe", "");
    let meeting = fixture.store.add_meeting(&agent.id, MeetingStatus::Upcoming);
    fixture.voice.fail.store(true, Ordering::SeqCst);

    let outcome = fixture
        .lifecycle
        .call_started(&meeting.id, Some("default:x"))
        .await
        .unwrap();

    assert_eq!(outcome, LifecycleOutcome::Transitioned(MeetingStatus::Active));
    assert_eq!(fixture.store.meeting(&meeting.id).unwrap().status, MeetingStatus::Active);
    assert_eq!(fixture.voice.connections().len(), 1);
}

#[tokio::test]
async fn test_redelivered_call_start_retries_failed_voice_connection() {
    let fixture = common::setup_test_fixture();
    let agent = fixture.store.add_agent("Scribe", "Take notes");
    let meeting = fixture.store.add_meeting(&agent.id, MeetingStatus::Upcoming);

    fixture.voice.fail.store(true, Ordering::SeqCst);
    fixture
        .lifecycle
        .call_started(&meeting.id, Some("default:call-7"))
        .await
        .unwrap();

    fixture.voice.fail.store(false, Ordering::SeqCst);
    let outcome = fixture
        .lifecycle
        .call_started(&meeting.id, None)
        .await
        .unwrap();

    assert_eq!(outcome, LifecycleOutcome::NoChange);
    let connections = fixture.voice.connections();
    assert_eq!(connections.len(), 2);
    assert_eq!(connections[1].call_id, "call-7");
    assert_eq!(connections[1].session.instructions, "Take notes");
    assert_eq!(
        fixture.store.meeting(&meeting.id).unwrap().status,
        MeetingStatus::Active
    );
}

#[tokio::test]
async fn test_call_ended_only_from_active() {
    let fixture = common::setup_test_fixture();
    let agent = fixture.store.add_agent("Scribe", "");

    for status in [
        MeetingStatus::Upcoming,
        MeetingStatus::Processing,
        MeetingStatus::Completed,
        MeetingStatus::Cancelled,
    ] {
        let meeting = fixture.store.add_meeting(&agent.id, status);
        let outcome = fixture.lifecycle.call_ended(&meeting.id).await.unwrap();
        assert_eq!(outcome, LifecycleOutcome::NoChange, "from {}", status);

        let current = fixture.store.meeting(&meeting.id).unwrap();
        assert_eq!(current.status, status);
        assert!(current.ended_at.is_none());
    }

    let active = fixture.store.add_meeting(&agent.id, MeetingStatus::Active);
    let outcome = fixture.lifecycle.call_ended(&active.id).await.unwrap();
    assert_eq!(outcome, LifecycleOutcome::Transitioned(MeetingStatus::Processing));
}

#[tokio::test]
async fn test_transcript_ready_moves_active_meeting_to_processing() {
    let fixture = common::setup_test_fixture();
    let agent = fixture.store.add_agent("Scribe", "");
    let meeting = fixture.store.add_meeting(&agent.id, MeetingStatus::Active);

    let outcome = fixture
        .lifecycle
        .transcript_ready(&meeting.id, "https://cdn.example/t.jsonl")
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        LifecycleOutcome::Dispatched(DispatchOutcome::Enqueued(_))
    ));
    assert_eq!(
        fixture.store.meeting(&meeting.id).unwrap().status,
        MeetingStatus::Processing
    );

    let again = fixture
        .lifecycle
        .transcript_ready(&meeting.id, "https://cdn.example/t.jsonl")
        .await
        .unwrap();
    assert_eq!(again, LifecycleOutcome::Dispatched(DispatchOutcome::Duplicate));
    assert_eq!(fixture.queue.enqueued().len(), 1);
}

#[tokio::test]
async fn test_cancelled_meeting_absorbs_every_event() {
    let fixture = common::setup_test_fixture();
    let agent = fixture.store.add_agent("Scribe", "");
    let meeting = fixture.store.add_meeting(&agent.id, MeetingStatus::Cancelled);
    let lifecycle = &fixture.lifecycle;

    let outcomes = vec![
        lifecycle.call_started(&meeting.id, Some("default:x")).await.unwrap(),
        lifecycle.call_ended(&meeting.id).await.unwrap(),
        lifecycle
            .transcript_ready(&meeting.id, "https://cdn.example/t.jsonl")
            .await
            .unwrap(),
        lifecycle
            .recording_ready(&meeting.id, "https://cdn.example/r.mp4")
            .await
            .unwrap(),
        lifecycle.cancel(&meeting.id).await.unwrap(),
    ];

    assert!(outcomes.iter().all(|o| *o == LifecycleOutcome::NoChange));
    assert_eq!(fixture.store.meeting(&meeting.id).unwrap(), meeting);
    assert_eq!(fixture.store.write_count(), 0);
    assert_eq!(fixture.queue.dispatch_calls(), 0);
    assert!(fixture.voice.connections().is_empty());
}

#[tokio::test]
async fn test_cancel_rejected_once_processing() {
    let fixture = common::setup_test_fixture();
    let agent = fixture.store.add_agent("Scribe", "");
    let meeting = fixture.store.add_meeting(&agent.id, MeetingStatus::Processing);

    let err = fixture.lifecycle.cancel(&meeting.id).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::NotCancellable(_, MeetingStatus::Processing)
    ));
}

#[tokio::test]
async fn test_participant_left_reports_failure() {
    let fixture = common::setup_test_fixture();
    fixture.calls.fail.store(true, Ordering::SeqCst);

    let effect = fixture.lifecycle.participant_left("call-1").await;
    assert!(matches!(effect, SideEffect::Failed(_)));
}

/// Drives every event against every starting status and checks that the
/// resulting status is either unchanged or a legal lifecycle edge.
#[tokio::test]
async fn test_events_only_follow_legal_edges() {
    let fixture = common::setup_test_fixture();
    let agent = fixture.store.add_agent("Scribe", "");

    for from in MeetingStatus::ALL {
        for event in 0..5 {
            let meeting = fixture.store.add_meeting(&agent.id, from);
            let id = meeting.id.as_str();
            let lifecycle = &fixture.lifecycle;
            let _ = match event {
                0 => lifecycle.call_started(id, Some("default:x")).await,
                1 => lifecycle.call_ended(id).await,
                2 => {
                    lifecycle
                        .transcript_ready(id, &format!("https://cdn.example/{}.jsonl", id))
                        .await
                }
                3 => lifecycle.recording_ready(id, "https://cdn.example/r.mp4").await,
                _ => lifecycle.cancel(id).await,
            };

            let to = fixture.store.meeting(id).unwrap().status;
            assert!(
                to == from || from.can_advance_to(to),
                "event {} moved {} -> {}",
                event,
                from,
                to
            );
        }
    }
}
