use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use recall_core::{Calendar, CoreError, Rating, Repository, ReviewSession, SystemClock};

use crate::api::dto::{CardOut, RateIn, RateOut, SessionIn, SessionOut, SubjectOut};
use crate::cli::commands::{resolve_subject, session_config};

pub type ApiError = (StatusCode, String);

pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub calendar: Calendar,
    /// Each session sits behind its own lock so reveal/rate never interleave.
    pub sessions: RwLock<HashMap<Uuid, Arc<Mutex<ReviewSession>>>>,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>, calendar: Calendar) -> Self {
        Self { repo, calendar, sessions: RwLock::new(HashMap::new()) }
    }

    fn session(&self, id: Uuid) -> Result<Arc<Mutex<ReviewSession>>, ApiError> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or((StatusCode::NOT_FOUND, format!("no session {id}")))
    }
}

pub fn api_error(err: CoreError) -> ApiError {
    let status = match &err {
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Invalid(_) | CoreError::InvalidRating(_) => StatusCode::BAD_REQUEST,
        CoreError::Conflict(_) | CoreError::IllegalTransition { .. } => StatusCode::CONFLICT,
        CoreError::Persistence { .. } => StatusCode::SERVICE_UNAVAILABLE,
        CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

#[derive(Deserialize)]
pub struct DueQuery {
    subject: Option<String>,
    max: Option<usize>,
}

async fn subject_filter(repo: &dyn Repository, sel: Option<String>) -> Result<Option<Uuid>, ApiError> {
    match sel {
        Some(sel) => resolve_subject(repo, &sel)
            .await
            .map(|s| Some(s.id))
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string())),
        None => Ok(None),
    }
}

pub async fn list_subjects(State(st): State<Arc<AppState>>) -> Result<Json<Vec<SubjectOut>>, ApiError> {
    let mut subjects = st.repo.list_subjects().await.map_err(api_error)?;
    subjects.sort_by_key(|s| s.created_at);
    Ok(Json(subjects.into_iter().map(SubjectOut::from).collect()))
}

pub async fn due_cards(
    State(st): State<Arc<AppState>>,
    Query(q): Query<DueQuery>,
) -> Result<Json<Vec<CardOut>>, ApiError> {
    let subject_id = subject_filter(&*st.repo, q.subject).await?;
    let mut due = st
        .repo
        .fetch_due_cards(subject_id, chrono::Utc::now())
        .await
        .map_err(api_error)?;
    if let Some(m) = q.max {
        due.truncate(m);
    }
    Ok(Json(due.into_iter().map(CardOut::from).collect()))
}

pub async fn create_session(
    State(st): State<Arc<AppState>>,
    Json(body): Json<SessionIn>,
) -> Result<(StatusCode, Json<SessionOut>), ApiError> {
    let subject_id = subject_filter(&*st.repo, body.subject).await?;
    let config = session_config(st.calendar, body.strict.unwrap_or(false), body.max);
    let session = ReviewSession::start(st.repo.clone(), SystemClock, subject_id, config)
        .await
        .map_err(api_error)?;

    let id = Uuid::new_v4();
    let out = SessionOut::from_session(id, &session);
    st.sessions.write().insert(id, Arc::new(Mutex::new(session)));
    info!(session = %id, cards = out.total, "api session opened");
    Ok((StatusCode::CREATED, Json(out)))
}

pub async fn get_session(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionOut>, ApiError> {
    let handle = st.session(id)?;
    let session = handle.lock().await;
    Ok(Json(SessionOut::from_session(id, &session)))
}

pub async fn reveal(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionOut>, ApiError> {
    let handle = st.session(id)?;
    let mut session = handle.lock().await;
    session.reveal().map_err(api_error)?;
    Ok(Json(SessionOut::from_session(id, &session)))
}

pub async fn rate(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<RateIn>,
) -> Result<Json<RateOut>, ApiError> {
    let rating: Rating = body.rating.parse().map_err(api_error)?;
    let handle = st.session(id)?;
    let mut session = handle.lock().await;
    let out = session.rate(rating).await.map_err(api_error)?;
    let view = SessionOut::from_session(id, &session);
    if out.summary.is_some() {
        st.sessions.write().remove(&id);
        info!(session = %id, "api session completed");
    }
    Ok(Json(RateOut::new(out, view)))
}

/// Drops an unfinished session. Ratings already given stay saved.
pub async fn close_session(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionOut>, ApiError> {
    let handle = st
        .sessions
        .write()
        .remove(&id)
        .ok_or((StatusCode::NOT_FOUND, format!("no session {id}")))?;
    let session = handle.lock().await;
    info!(session = %id, reviewed = session.stats().reviewed, "api session closed");
    Ok(Json(SessionOut::from_session(id, &session)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_core::{MemoryRepo, SessionState};

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(
            api_error(CoreError::InvalidRating("meh".into())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            api_error(CoreError::IllegalTransition { op: "rate", state: SessionState::AwaitingReveal }).0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            api_error(CoreError::Persistence { card_id: Uuid::new_v4(), reason: "x".into() }).0,
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(api_error(CoreError::NotFound("card")).0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn abandoned_session_can_be_closed() {
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepo::new());
        let s = repo.create_subject("Botany").await.unwrap();
        repo.add_card(s.id, "Plant energy organelle", "chloroplast").await.unwrap();
        repo.add_card(s.id, "Water transport tissue", "xylem").await.unwrap();
        let st = Arc::new(AppState::new(repo, Calendar::Utc));

        let (_, Json(created)) =
            create_session(State(st.clone()), Json(SessionIn::default())).await.unwrap();
        reveal(State(st.clone()), Path(created.id)).await.unwrap();
        let Json(rated) = rate(State(st.clone()), Path(created.id), Json(RateIn { rating: "again".into() }))
            .await
            .unwrap();
        assert_eq!(rated.summary, None);
        assert_eq!(st.sessions.read().len(), 1);

        let Json(closed) = close_session(State(st.clone()), Path(created.id)).await.unwrap();
        assert_eq!(closed.stats.reviewed, 1);
        assert_eq!(closed.remaining, 1);
        assert!(st.sessions.read().is_empty());

        let again = close_session(State(st.clone()), Path(created.id)).await;
        assert_eq!(again.unwrap_err().0, StatusCode::NOT_FOUND);
        let gone = reveal(State(st), Path(created.id)).await;
        assert_eq!(gone.unwrap_err().0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn session_lifecycle_through_handlers() {
        let repo: Arc<dyn Repository> = Arc::new(MemoryRepo::new());
        let s = repo.create_subject("Astronomy").await.unwrap();
        repo.add_card(s.id, "Closest star", "Proxima Centauri").await.unwrap();
        let st = Arc::new(AppState::new(repo.clone(), Calendar::Utc));

        let body = SessionIn { subject: Some("astronomy".into()), ..SessionIn::default() };
        let (code, Json(created)) = create_session(State(st.clone()), Json(body)).await.unwrap();
        assert_eq!(code, StatusCode::CREATED);
        assert_eq!(created.total, 1);
        assert_eq!(created.card.as_ref().unwrap().back, None);

        let early = rate(State(st.clone()), Path(created.id), Json(RateIn { rating: "good".into() })).await;
        assert_eq!(early.unwrap_err().0, StatusCode::CONFLICT);

        let bad = rate(State(st.clone()), Path(created.id), Json(RateIn { rating: "meh".into() })).await;
        assert_eq!(bad.unwrap_err().0, StatusCode::BAD_REQUEST);

        let Json(revealed) = reveal(State(st.clone()), Path(created.id)).await.unwrap();
        assert_eq!(revealed.state, SessionState::AwaitingRating);
        assert_eq!(revealed.card.unwrap().back.as_deref(), Some("Proxima Centauri"));

        let Json(rated) = rate(State(st.clone()), Path(created.id), Json(RateIn { rating: "4".into() }))
            .await
            .unwrap();
        assert_eq!(rated.interval, 4);
        assert!(rated.persisted);
        assert_eq!(rated.session.state, SessionState::Completed);
        assert_eq!(rated.summary.map(|s| (s.reviewed, s.correct)), Some((1, 1)));

        assert_eq!(repo.list_cards(None).await.unwrap()[0].interval, 4);

        let finished = get_session(State(st.clone()), Path(created.id)).await;
        assert_eq!(finished.unwrap_err().0, StatusCode::NOT_FOUND);
        assert!(st.sessions.read().is_empty());

        let missing = get_session(State(st), Path(Uuid::new_v4())).await;
        assert_eq!(missing.unwrap_err().0, StatusCode::NOT_FOUND);
    }
}
