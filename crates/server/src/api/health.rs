use axum::extract::State;
use axum::Json;

use crate::state::AppState;

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn journal_snapshot(State(state): State<AppState>) -> Json<adaptor_domain::JournalSnapshot> {
    Json(state.journal.snapshot())
}
