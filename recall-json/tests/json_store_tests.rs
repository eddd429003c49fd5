use chrono::{Duration, Utc};
use recall_core::{
    CoreError, FixedClock, Rating, Repository, ReviewSession, SessionConfig, SessionState,
};
use recall_json::JsonStore;
use std::sync::Arc;

async fn open(dir: &std::path::Path) -> JsonStore {
    JsonStore::open_with(dir.join("recall.json"), dir.join("backups"), 3)
        .await
        .unwrap()
}

#[tokio::test]
async fn schedules_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let later = Utc::now() + Duration::seconds(5);

    let card_id = {
        let store = Arc::new(open(dir.path()).await);
        let subject = store.create_subject("Physics").await.unwrap();
        let card = store.add_card(subject.id, "F = ?", "m * a").await.unwrap();

        let mut session = ReviewSession::start(
            store.clone(),
            FixedClock::new(later),
            Some(subject.id),
            SessionConfig::default(),
        )
        .await
        .unwrap();
        session.reveal().unwrap();
        let out = session.rate(Rating::Easy).await.unwrap();
        assert!(out.persisted);
        assert_eq!(session.state(), SessionState::Completed);
        card.id
    };

    let reopened = open(dir.path()).await;
    let card = reopened.get_card(card_id).await.unwrap();
    assert_eq!(card.interval, 4);
    assert!((card.ease_factor - 2.65).abs() < 1e-9);
    assert_eq!(card.next_review_at, later + Duration::days(4));
    assert!(reopened.fetch_due_cards(None, later).await.unwrap().is_empty());
}

#[tokio::test]
async fn subject_delete_cascades_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open(dir.path()).await;
        let keep = store.create_subject("Keep").await.unwrap();
        let drop = store.create_subject("Drop").await.unwrap();
        store.add_card(keep.id, "a", "b").await.unwrap();
        store.add_card(drop.id, "c", "d").await.unwrap();
        store.delete_subject(drop.id).await.unwrap();
        assert!(matches!(
            store.delete_subject(drop.id).await,
            Err(CoreError::NotFound("subject"))
        ));
    }
    let store = open(dir.path()).await;
    assert_eq!(store.list_subjects().await.unwrap().len(), 1);
    let cards = store.list_cards(None).await.unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].front, "a");
}

#[tokio::test]
async fn backups_are_rotated() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path()).await;
    let s = store.create_subject("Many").await.unwrap();
    for i in 0..5 {
        store.add_card(s.id, &format!("q{i}"), "a").await.unwrap();
    }
    let backups = std::fs::read_dir(dir.path().join("backups")).unwrap().count();
    assert!(backups >= 1 && backups <= 3, "found {backups} backups");
}

#[tokio::test]
async fn unknown_card_schedule_write_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path()).await;
    let out = recall_core::schedule(0, 2.5, Rating::Good, Utc::now());
    assert!(matches!(
        store.update_card_schedule(uuid::Uuid::new_v4(), &out).await,
        Err(CoreError::NotFound("card"))
    ));
}


#[tokio::test]
async fn failed_write_leaves_store_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let backups = dir.path().join("backups");
    let store = open(dir.path()).await;
    let subject = store.create_subject("Chemistry").await.unwrap();
    let card = store.add_card(subject.id, "H2O", "water").await.unwrap();
    let now = Utc::now() + Duration::seconds(5);

    // A plain file where the backups directory should be makes every write fail.
    std::fs::remove_dir_all(&backups).unwrap();
    std::fs::write(&backups, b"not a directory").unwrap();

    let easy = recall_core::schedule(0, 2.5, Rating::Easy, now);
    assert!(matches!(
        store.update_card_schedule(card.id, &easy).await,
        Err(CoreError::Storage(_))
    ));
    assert_eq!(store.get_card(card.id).await.unwrap().interval, 0);
    assert_eq!(store.fetch_due_cards(None, now).await.unwrap().len(), 1);

    assert!(store.add_card(subject.id, "NaCl", "salt").await.is_err());
    assert!(store.delete_card(card.id).await.is_err());
    assert_eq!(store.list_cards(None).await.unwrap().len(), 1);

    // Once writes work again, the lost schedule does not ride along.
    std::fs::remove_file(&backups).unwrap();
    std::fs::create_dir(&backups).unwrap();
    store.update_card_content(card.id, "H2O?", "water").await.unwrap();

    let reopened = open(dir.path()).await;
    let card = reopened.get_card(card.id).await.unwrap();
    assert_eq!(card.front, "H2O?");
    assert_eq!(card.interval, 0);
    assert_eq!(card.ease_factor, recall_core::EASE_DEFAULT);
}

#[tokio::test]
async fn best_effort_session_over_failing_store_keeps_card_due() {
    let dir = tempfile::tempdir().unwrap();
    let backups = dir.path().join("backups");
    let store = Arc::new(open(dir.path()).await);
    let subject = store.create_subject("Geology").await.unwrap();
    store.add_card(subject.id, "Hardest mineral", "diamond").await.unwrap();
    let now = Utc::now() + Duration::seconds(5);

    std::fs::remove_dir_all(&backups).unwrap();
    std::fs::write(&backups, b"").unwrap();

    let mut session =
        ReviewSession::start(store.clone(), FixedClock::new(now), None, SessionConfig::default())
            .await
            .unwrap();
    session.reveal().unwrap();
    let out = session.rate(Rating::Good).await.unwrap();
    assert!(!out.persisted);
    assert_eq!(session.stats().reviewed, 1);
    assert_eq!(store.fetch_due_cards(None, now).await.unwrap().len(), 1);
}
