//! Itinerary build route handlers (HTMX fragments).
//!
//! `POST /itinerary` checks the submission quota, starts a background build,
//! and responds with the status fragment. The fragment polls
//! `GET /itinerary/status` while the build runs; once the build is ready the
//! endpoint answers with the rendered per-day sections and the polling stops.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Form,
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::middleware::RequireMember;
use crate::models::{SubmissionWindow, session_keys};
use crate::render;
use crate::services::builds::BuildPhase;
use crate::state::AppState;

/// User-visible message when the hourly quota is exhausted.
const MSG_LIMIT: &str = "Itinerary limit reached for this hour, please try again later.";

/// Itinerary request form data.
#[derive(Debug, Deserialize)]
pub struct BuildForm {
    pub city: String,
    pub days: String,
}

/// Empty status container; nothing to show and no polling.
#[derive(Template, WebTemplate)]
#[template(path = "itinerary/idle.html")]
pub struct IdleTemplate;

/// In-progress fragment; re-arms its own polling.
#[derive(Template, WebTemplate)]
#[template(path = "itinerary/pending.html")]
pub struct PendingTemplate {
    pub message: String,
}

/// Finished fragment with one HTML block per day.
#[derive(Template, WebTemplate)]
#[template(path = "itinerary/days.html")]
pub struct DaysTemplate {
    pub days: Vec<String>,
}

/// Failure fragment; terminal, no polling.
#[derive(Template, WebTemplate)]
#[template(path = "itinerary/failed.html")]
pub struct FailedTemplate {
    pub message: String,
}

/// Start an itinerary build (HTMX).
///
/// Both form fields are required; a blank submission is a silent no-op. A
/// submission over the hourly quota is answered with the limit message and
/// never reaches the planner.
///
/// # Route
///
/// `POST /itinerary`
#[instrument(skip_all, fields(city = %form.city, days = %form.days))]
pub async fn submit(
    State(state): State<AppState>,
    RequireMember(_visitor): RequireMember,
    session: Session,
    Form(form): Form<BuildForm>,
) -> Result<Response> {
    let city = form.city.trim().to_string();
    let days = form.days.trim().to_string();
    if city.is_empty() || days.is_empty() {
        // Nothing to build; leave the page as it is.
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    // Per-browser hourly quota. The incremented window is persisted even on
    // rejection so the decision is stable for the rest of the hour.
    let previous: Option<SubmissionWindow> =
        session.get(session_keys::SUBMISSION_WINDOW).await?;
    let (window, allowed) = SubmissionWindow::record(previous, Utc::now());
    session
        .insert(session_keys::SUBMISSION_WINDOW, &window)
        .await?;

    if !allowed {
        tracing::info!(count = window.count, "Submission over hourly quota");
        return Ok(FailedTemplate {
            message: MSG_LIMIT.to_string(),
        }
        .into_response());
    }

    let build_id = state
        .builds()
        .start(state.planner().clone(), city, days)
        .await;
    session
        .insert(session_keys::CURRENT_BUILD, &build_id)
        .await?;

    let phase = state.builds().phase(build_id).await;
    Ok(render_phase(phase))
}

/// Current build phase (HTMX polling fragment).
///
/// # Route
///
/// `GET /itinerary/status`
pub async fn status(State(state): State<AppState>, session: Session) -> Result<Response> {
    let build_id: Option<u64> = session.get(session_keys::CURRENT_BUILD).await?;
    let phase = match build_id {
        Some(id) => state.builds().phase(id).await,
        None => None,
    };
    Ok(render_phase(phase))
}

/// Render a build phase as its status fragment.
fn render_phase(phase: Option<BuildPhase>) -> Response {
    match phase {
        None => IdleTemplate.into_response(),
        Some(BuildPhase::Running { message }) => PendingTemplate { message }.into_response(),
        Some(BuildPhase::Ready { markdown }) => DaysTemplate {
            days: render::split_days(&markdown)
                .iter()
                .map(|section| render::render_day(section))
                .collect(),
        }
        .into_response(),
        Some(BuildPhase::Failed { message }) => FailedTemplate { message }.into_response(),
    }
}
