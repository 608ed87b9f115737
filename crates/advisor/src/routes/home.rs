//! Home page route handler.
//!
//! The home page is where access resolution happens: membership signals in
//! the URL and session are reconciled before the page is rendered, so the
//! view always reflects the freshest entitlement the advisor can prove.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::filters;
use crate::models::VisitorStore;
use crate::services::access::{self, AccessParams, Resolution};
use crate::state::AppState;

/// Membership signals carried in the URL.
#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    /// Membership id from a provider link.
    #[serde(rename = "membershipId")]
    pub membership_id: Option<String>,
    /// Redemption code from a comp link.
    pub code: Option<String>,
}

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    /// Name to show in the signed-in header, if any identity resolved.
    pub display_name: Option<String>,
    /// Whether the visitor may use the itinerary form.
    pub membership: bool,
    /// Checkout link for the recommended plan.
    pub purchase_url: String,
}

/// Display the home page.
#[instrument(skip(state, session))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<HomeQuery>,
) -> Response {
    let mut store = VisitorStore::load(session).await;
    let params = AccessParams {
        membership_id: query.membership_id,
        code: query.code,
    };

    let resolution = access::resolve(
        state.membership(),
        &state.config().membership,
        &mut store,
        &params,
    )
    .await;

    // A successful code redemption redirects to the bare path so the fresh
    // identity is picked up without the one-shot query parameters.
    if resolution == Resolution::Reload {
        return Redirect::to("/").into_response();
    }

    let visitor = store.state();
    let purchase_url = state
        .membership()
        .checkout_url(&state.config().membership.recommended_plan_id);

    HomeTemplate {
        display_name: visitor.identity.display_name().map(ToString::to_string),
        membership: visitor.membership,
        purchase_url,
    }
    .into_response()
}
