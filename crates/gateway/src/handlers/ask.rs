//! Question answering handlers

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use ragwise_agent::{Node, TurnEvent, TurnStatus};
use ragwise_common::{
    errors::{AppError, Result},
    DocumentMetadata,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Instant;
use tracing::{info, instrument};
use validator::Validate;

use crate::AppState;

/// Question request
#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 1, max = 4000))]
    pub question: String,
}

impl AskRequest {
    fn validated(self) -> Result<Self> {
        self.validate().map_err(|e| AppError::Validation {
            message: e.to_string(),
            field: Some("question".to_string()),
        })?;
        Ok(self)
    }
}

/// Answer with the evidence it was generated from
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub status: TurnStatus,
    pub sources: Vec<DocumentMetadata>,
    pub path: Vec<Node>,
    pub generate_attempts: u32,
    pub processing_time_ms: u64,
}

/// Run one turn and return the final answer
///
/// A dropped connection drops the turn future, which stops the turn.
#[instrument(skip_all)]
pub async fn ask(State(state): State<AppState>, Json(request): Json<AskRequest>) -> Result<Json<AskResponse>> {
    let start = Instant::now();
    let request = request.validated()?;

    let output = state.agent.run(&request.question).await?;
    let processing_time_ms = start.elapsed().as_millis() as u64;

    info!(
        status = output.status.as_str(),
        attempts = output.generate_attempts,
        duration_ms = processing_time_ms,
        "Question answered"
    );

    Ok(Json(AskResponse {
        answer: output.answer,
        status: output.status,
        sources: output.documents.into_iter().map(|d| d.metadata).collect(),
        path: output.path,
        generate_attempts: output.generate_attempts,
        processing_time_ms,
    }))
}

/// Run one turn as server-sent events
///
/// Each event is named after its `type` and carries the JSON encoded event.
/// The stream ends after `completed` or `error`; closing the connection
/// cancels the turn.
pub async fn ask_stream(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let request = request.validated()?;

    let events = state
        .agent
        .stream(request.question)
        .map(|event| Ok::<_, Infallible>(to_sse(&event)));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &TurnEvent) -> Event {
    match Event::default().event(event.name()).json_data(event) {
        Ok(sse) => sse,
        Err(e) => Event::default().event("error").data(e.to_string()),
    }
}
