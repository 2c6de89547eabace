use crate::stubs::{approx, t0, Harness, RacingStates, ReadOnlyStates};
use chrono::Duration;
use slivi::emotion::Emotion;
use slivi::model::{Metric, Metrics};
use slivi::ports::{NotificationLedger, StateRepository, UserDirectory};
use slivi::sim::PetAction;
use slivi::storage::JsonStore;
use slivi::{PetError, PetService, Ports, Rules};
use std::cell::Cell;

// ── State queries ─────────────────────────────────────────────

#[test]
fn first_query_creates_a_happy_pet() {
    let h = Harness::new();
    let svc = h.service();

    let state = svc.get_full_state(7, t0()).unwrap();

    assert_eq!(state.emotion, Emotion::Feliz);
    assert_eq!(state.color, "#FFA500");
    assert!(!state.sleeping);
    assert_eq!(state.metrics, Metrics::initial());

    let first = h.store.last_emotion(7).unwrap().unwrap();
    assert_eq!(first.emotion, Emotion::Feliz);
    assert_eq!(first.created_at, t0());
    assert_eq!(h.store.active_users().unwrap(), vec![7]);
}

#[test]
fn full_state_wire_shape() {
    let h = Harness::new();
    let state = h.service().get_full_state(7, t0()).unwrap();
    let v = serde_json::to_value(&state).unwrap();

    assert_eq!(v["emotion"], "FELIZ");
    assert_eq!(v["image"], "body_laranja_feliz.png");
    assert_eq!(v["isSleeping"], false);
    assert_eq!(v["states"]["HUNGER"], 80.0);
}

#[test]
fn decay_is_persisted_and_emotion_logged_only_on_change() {
    let h = Harness::new();
    let svc = h.service();
    svc.get_full_state(7, t0()).unwrap();

    let hour = svc.get_full_state(7, t0() + Duration::minutes(60)).unwrap();
    assert_eq!(hour.emotion, Emotion::Feliz);
    assert!(approx(hour.metrics.get(Metric::Hunger), 65.0));
    // same label, no new record
    assert_eq!(h.store.last_emotion(7).unwrap().unwrap().created_at, t0());

    let later = t0() + Duration::minutes(120);
    let two = svc.get_full_state(7, later).unwrap();
    assert_eq!(two.emotion, Emotion::Neutro);
    assert!(approx(two.metrics.get(Metric::Hunger), 50.0));
    assert!(approx(two.metrics.get(Metric::Energy), 66.0));

    let row = h.store.load(7).unwrap();
    assert_eq!(row.last_update, later);
    assert_eq!(row.revision, 2);
    assert_eq!(h.store.last_emotion(7).unwrap().unwrap().created_at, later);
}

#[test]
fn queries_inside_the_same_minute_do_not_write() {
    let h = Harness::new();
    let svc = h.service();
    svc.get_full_state(7, t0()).unwrap();
    svc.get_full_state(7, t0() + Duration::seconds(59)).unwrap();

    assert_eq!(h.store.load(7).unwrap().revision, 0);
}

#[test]
fn sub_minute_remainder_carries_between_queries() {
    let h = Harness::new();
    let svc = h.service();
    svc.get_full_state(7, t0()).unwrap();

    svc.get_full_state(7, t0() + Duration::seconds(90)).unwrap();
    assert_eq!(
        h.store.load(7).unwrap().last_update,
        t0() + Duration::seconds(60)
    );

    let state = svc.get_full_state(7, t0() + Duration::seconds(150)).unwrap();
    assert!(approx(state.metrics.get(Metric::Hunger), 79.5));
}

// ── Actions ───────────────────────────────────────────────────

#[test]
fn feeding_clamps_at_the_top() {
    let h = Harness::new();
    let svc = h.service();

    let fed = svc
        .perform_action(7, &PetAction::Feed { food_id: 2 }, t0())
        .unwrap();

    assert!(approx(fed.metrics.get(Metric::Hunger), 100.0));
    assert!(approx(fed.metrics.get(Metric::Energy), 95.0));
}

#[test]
fn rejected_actions_leave_state_untouched() {
    let h = Harness::new();
    let svc = h.service();
    svc.get_full_state(7, t0()).unwrap();
    let before = h.store.load(7).unwrap();

    let err = svc
        .perform_action(7, &PetAction::Feed { food_id: 999 }, t0())
        .unwrap_err();
    assert!(matches!(err, PetError::InvalidFood(999)));

    assert!(matches!(
        PetAction::parse("DANCE", None),
        Err(PetError::InvalidAction(_))
    ));
    assert!(matches!(
        PetAction::parse("feed", None),
        Err(PetError::MissingParameter("foodId"))
    ));

    assert_eq!(h.store.load(7).unwrap(), before);
}

#[test]
fn sleeping_switches_to_recovery_rates() {
    let h = Harness::new();
    let svc = h.service();
    svc.get_full_state(7, t0()).unwrap();

    let asleep = svc.perform_action(7, &PetAction::Sleep, t0()).unwrap();
    assert!(asleep.sleeping);
    assert_eq!(h.store.load(7).unwrap().sleep.started_at, Some(t0()));

    let hour = t0() + Duration::minutes(60);
    let rested = svc.get_full_state(7, hour).unwrap();
    assert!(rested.sleeping);
    assert!(approx(rested.metrics.get(Metric::Energy), 100.0));
    assert!(approx(rested.metrics.get(Metric::Sleep), 94.0));
    assert!(approx(rested.metrics.get(Metric::Fun), 77.0));
    assert!(approx(rested.metrics.get(Metric::Hunger), 71.0));
    assert!(approx(rested.metrics.get(Metric::Stress), 20.0));

    let awake = svc.perform_action(7, &PetAction::Wake, hour).unwrap();
    assert!(!awake.sleeping);
    assert_eq!(h.store.load(7).unwrap().sleep.ended_at, Some(hour));

    let after = svc
        .get_full_state(7, hour + Duration::minutes(60))
        .unwrap();
    assert!(approx(after.metrics.get(Metric::Hunger), 56.0));
    assert!(approx(after.metrics.get(Metric::Energy), 88.0));
    assert!(approx(after.metrics.get(Metric::Sleep), 85.0));
    assert!(approx(after.metrics.get(Metric::Stress), 26.0));
}

#[test]
fn sleeping_twice_keeps_the_first_start() {
    let h = Harness::new();
    let svc = h.service();
    svc.perform_action(7, &PetAction::Sleep, t0()).unwrap();
    svc.perform_action(7, &PetAction::Sleep, t0() + Duration::minutes(5))
        .unwrap();

    assert_eq!(h.store.load(7).unwrap().sleep.started_at, Some(t0()));
}

// ── Games ─────────────────────────────────────────────────────

#[test]
fn short_rounds_change_nothing() {
    let h = Harness::new();
    let svc = h.service();

    let state = svc.record_game_result(7, "FLAPPY", 5000, 3, t0()).unwrap();
    assert_eq!(state.metrics, Metrics::initial());
}

#[test]
fn good_round_lowers_stress() {
    let h = Harness::new();
    let svc = h.service();

    let state = svc.record_game_result(7, "flappy", 1200, 30, t0()).unwrap();
    assert!(approx(state.metrics.get(Metric::Energy), 75.0));
    assert!(approx(state.metrics.get(Metric::Fun), 100.0));
    assert!(approx(state.metrics.get(Metric::Stress), 10.0));
}

#[test]
fn unknown_game_is_rejected() {
    let h = Harness::new();
    let err = h
        .service()
        .record_game_result(7, "TETRIS", 10, 30, t0())
        .unwrap_err();
    assert!(matches!(err, PetError::InvalidGame(_)));
}

// ── Concurrency ───────────────────────────────────────────────

fn racing_service<'a>(h: &'a Harness, racing: &'a RacingStates<'a>) -> PetService<'a> {
    PetService::new(
        Ports {
            states: racing,
            ..h.ports()
        },
        Rules::default(),
    )
}

#[test]
fn one_lost_race_is_retried() {
    let h = Harness::new();
    h.service().get_full_state(7, t0()).unwrap();
    let racing = RacingStates {
        inner: &h.store,
        interference: Cell::new(1),
    };

    let state = racing_service(&h, &racing)
        .perform_action(7, &PetAction::Play, t0())
        .unwrap();

    // applied on top of the other writer's FUN=5
    assert!(approx(state.metrics.get(Metric::Fun), 25.0));
    assert!(approx(state.metrics.get(Metric::Energy), 80.0));
    assert_eq!(h.store.load(7).unwrap().revision, 2);
}

#[test]
fn two_lost_races_surface_as_concurrent_update() {
    let h = Harness::new();
    h.service().get_full_state(7, t0()).unwrap();
    let racing = RacingStates {
        inner: &h.store,
        interference: Cell::new(2),
    };

    let err = racing_service(&h, &racing)
        .perform_action(7, &PetAction::Play, t0())
        .unwrap_err();

    assert!(matches!(err, PetError::ConcurrentUpdate(7)));
    assert!(approx(h.store.load(7).unwrap().metrics.get(Metric::Fun), 5.0));
}

#[test]
fn failed_commit_leaves_metrics_and_sleep_as_they_were() {
    let h = Harness::new();
    h.service().get_full_state(7, t0()).unwrap();
    let before = h.store.load(7).unwrap();
    let broken = ReadOnlyStates { inner: &h.store };
    let svc = PetService::new(
        Ports {
            states: &broken,
            ..h.ports()
        },
        Rules::default(),
    );

    let err = svc
        .perform_action(7, &PetAction::Sleep, t0() + Duration::minutes(10))
        .unwrap_err();

    assert!(matches!(err, PetError::TransientStore(_)));
    let after = h.store.load(7).unwrap();
    assert_eq!(after, before);
    assert!(!after.sleep.is_sleeping());
    assert_eq!(h.store.last_emotion(7).unwrap().unwrap().created_at, t0());
}

// ── Persistence ───────────────────────────────────────────────

#[test]
fn state_survives_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slivi.json");
    let played = {
        let store = JsonStore::open(&path).unwrap();
        let h = Harness::new();
        let svc = on_store(&h, &store);
        svc.get_full_state(1, t0()).unwrap();
        svc.perform_action(1, &PetAction::Play, t0() + Duration::minutes(10))
            .unwrap()
    };

    let store = JsonStore::open(&path).unwrap();
    let row = store.load(1).unwrap();
    assert_eq!(row.metrics, played.metrics);
    assert_eq!(row.last_update, t0() + Duration::minutes(10));
    assert!(store.last_emotion(1).unwrap().is_some());
    assert_eq!(store.active_users().unwrap(), vec![1]);
}

fn on_store<'a>(h: &'a Harness, store: &'a JsonStore) -> PetService<'a> {
    PetService::new(
        Ports {
            states: store,
            foods: store,
            ledger: store,
            users: store,
            ..h.ports()
        },
        Rules::default(),
    )
}

#[test]
fn two_services_on_one_file_keep_each_others_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slivi.json");
    let first = JsonStore::open(&path).unwrap();
    let second = JsonStore::open(&path).unwrap();
    let h = Harness::new();
    let a = on_store(&h, &first);
    let b = on_store(&h, &second);

    a.get_full_state(1, t0()).unwrap();
    assert_eq!(a.evaluate_notifications(1, t0() + Duration::hours(3)).unwrap(), 1);
    a.perform_action(1, &PetAction::Sleep, t0() + Duration::hours(3))
        .unwrap();

    // b opened the file before any of that and still builds on it
    b.get_full_state(2, t0()).unwrap();
    b.register_device(2, "ExponentPushToken[b]").unwrap();
    let wake_at = t0() + Duration::hours(4);
    let woke = b.perform_action(1, &PetAction::Wake, wake_at).unwrap();
    assert!(!woke.sleeping);

    let reopened = JsonStore::open(&path).unwrap();
    assert_eq!(reopened.active_users().unwrap(), vec![1, 2]);
    assert_eq!(reopened.list_recent(1, 20).unwrap().len(), 1);
    assert!(reopened.device_token(2).unwrap().is_some());
    let row = reopened.load(1).unwrap();
    assert_eq!(row.sleep.ended_at, Some(wake_at));
    assert_eq!(row.revision, 3);
}
