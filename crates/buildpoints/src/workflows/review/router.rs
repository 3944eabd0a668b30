use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::domain::{BuildKind, Grade, GuildId, ReviewInput, SubmissionId, UserId};
use super::leaderboard::{BuilderMetric, ReviewerMetric, Scope};
use super::repository::{
    BuilderStore, GuildDirectory, RejectionStore, ReviewNotifier, ReviewerStore, StoreError,
    SubmissionStore,
};
use super::service::{DeclineRequest, ReviewError, ReviewService};

/// Shared state for the review routes: the service facade plus the
/// injected guild configuration lookup.
pub struct ReviewRouterState<S, J, B, R, N, G> {
    pub service: Arc<ReviewService<S, J, B, R, N>>,
    pub guilds: Arc<G>,
}

impl<S, J, B, R, N, G> Clone for ReviewRouterState<S, J, B, R, N, G> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            guilds: Arc::clone(&self.guilds),
        }
    }
}

/// Router builder exposing the review operations over HTTP.
pub fn review_router<S, J, B, R, N, G>(
    service: Arc<ReviewService<S, J, B, R, N>>,
    guilds: Arc<G>,
) -> Router
where
    S: SubmissionStore + 'static,
    J: RejectionStore + 'static,
    B: BuilderStore + 'static,
    R: ReviewerStore + 'static,
    N: ReviewNotifier + 'static,
    G: GuildDirectory + 'static,
{
    let state = ReviewRouterState { service, guilds };

    Router::new()
        .route("/api/v1/reviews", post(accept_handler::<S, J, B, R, N, G>))
        .route(
            "/api/v1/reviews/:submission_id",
            put(edit_handler::<S, J, B, R, N, G>)
                .delete(purge_handler::<S, J, B, R, N, G>),
        )
        .route(
            "/api/v1/reviews/:submission_id/decline",
            post(decline_handler::<S, J, B, R, N, G>),
        )
        .route(
            "/api/v1/reviews/:submission_id/feedback",
            get(feedback_handler::<S, J, B, R, N, G>),
        )
        .route(
            "/api/v1/leaderboards/builders",
            get(builder_leaderboard_handler::<S, J, B, R, N, G>),
        )
        .route(
            "/api/v1/leaderboards/reviewers",
            get(reviewer_leaderboard_handler::<S, J, B, R, N, G>),
        )
        .route(
            "/api/v1/builders/:user/stats",
            get(builder_stats_handler::<S, J, B, R, N, G>),
        )
        .route(
            "/api/v1/builders/:user/progress",
            get(builder_progress_handler::<S, J, B, R, N, G>),
        )
        .route(
            "/api/v1/builders/:user/preferences",
            put(preferences_handler::<S, J, B, R, N, G>),
        )
        .route(
            "/api/v1/reviewers/:user/stats",
            get(reviewer_stats_handler::<S, J, B, R, N, G>),
        )
        .route(
            "/api/v1/guilds/:guild/progress",
            get(guild_progress_handler::<S, J, B, R, N, G>),
        )
        .with_state(state)
}

fn default_bonus() -> f64 {
    1.0
}

fn default_collaborators() -> u32 {
    1
}

/// Review submission body shared by accept and edit.
#[derive(Debug, Deserialize)]
pub(crate) struct ReviewRequest {
    pub guild_id: String,
    pub builder: String,
    pub reviewer: String,
    #[serde(flatten)]
    pub kind: BuildKind,
    pub quality: Grade,
    pub complexity: Grade,
    #[serde(default = "default_bonus")]
    pub bonus: f64,
    #[serde(default = "default_collaborators")]
    pub collaborators: u32,
    #[serde(default)]
    pub feedback: Option<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Role ids the builder currently holds, for rank idempotence.
    #[serde(default)]
    pub builder_roles: Vec<String>,
}

impl ReviewRequest {
    fn into_input(self, submission_id: SubmissionId) -> (ReviewInput, Vec<String>, GuildId) {
        let guild_id = GuildId(self.guild_id);
        let input = ReviewInput {
            submission_id,
            guild_id: guild_id.clone(),
            builder: UserId(self.builder),
            reviewer: UserId(self.reviewer),
            kind: self.kind,
            quality: self.quality,
            complexity: self.complexity,
            bonus: self.bonus,
            collaborators: self.collaborators,
            feedback: self.feedback,
            submitted_at: self.submitted_at,
            reviewed_at: self.reviewed_at.unwrap_or_else(Utc::now),
        };
        (input, self.builder_roles, guild_id)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeclineBody {
    pub guild_id: String,
    pub builder: String,
    pub reviewer: String,
    pub feedback: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScopeQuery {
    pub guild_id: Option<String>,
    #[serde(default)]
    pub global: bool,
}

impl ScopeQuery {
    fn scope(&self) -> Result<Scope, Response> {
        if self.global {
            return Ok(Scope::Global);
        }
        match &self.guild_id {
            Some(guild) => Ok(Scope::Guild(GuildId(guild.clone()))),
            None => Err(bad_request("guild_id is required unless global=true")),
        }
    }
}

// Query strings cannot carry flattened structs, so the board queries
// repeat the scope fields.
#[derive(Debug, Deserialize)]
pub(crate) struct BuilderBoardQuery {
    pub guild_id: Option<String>,
    #[serde(default)]
    pub global: bool,
    #[serde(default = "default_builder_metric")]
    pub metric: BuilderMetric,
}

impl BuilderBoardQuery {
    fn scope(&self) -> Result<Scope, Response> {
        ScopeQuery {
            guild_id: self.guild_id.clone(),
            global: self.global,
        }
        .scope()
    }
}

fn default_builder_metric() -> BuilderMetric {
    BuilderMetric::Points
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewerBoardQuery {
    pub guild_id: Option<String>,
    #[serde(default)]
    pub global: bool,
    pub metric: ReviewerMetric,
}

impl ReviewerBoardQuery {
    fn scope(&self) -> Result<Scope, Response> {
        ScopeQuery {
            guild_id: self.guild_id.clone(),
            global: self.global,
        }
        .scope()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GuildQuery {
    pub guild_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PreferencesBody {
    pub guild_id: String,
    pub dm_enabled: bool,
}

pub(crate) async fn accept_handler<S, J, B, R, N, G>(
    State(state): State<ReviewRouterState<S, J, B, R, N, G>>,
    Json(request): Json<AcceptBody>,
) -> Response
where
    S: SubmissionStore + 'static,
    J: RejectionStore + 'static,
    B: BuilderStore + 'static,
    R: ReviewerStore + 'static,
    N: ReviewNotifier + 'static,
    G: GuildDirectory + 'static,
{
    let AcceptBody {
        submission_id,
        review,
    } = request;
    let (input, roles, guild_id) = review.into_input(SubmissionId(submission_id));

    let Some(guild) = state.guilds.guild(&guild_id) else {
        return unknown_guild(&guild_id);
    };

    match state.service.accept_review(&guild, &roles, input) {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Accept takes the submission id in the body; edit takes it from the
/// path.
#[derive(Debug, Deserialize)]
pub(crate) struct AcceptBody {
    pub submission_id: String,
    #[serde(flatten)]
    pub review: ReviewRequest,
}

pub(crate) async fn edit_handler<S, J, B, R, N, G>(
    State(state): State<ReviewRouterState<S, J, B, R, N, G>>,
    Path(submission_id): Path<String>,
    Json(request): Json<ReviewRequest>,
) -> Response
where
    S: SubmissionStore + 'static,
    J: RejectionStore + 'static,
    B: BuilderStore + 'static,
    R: ReviewerStore + 'static,
    N: ReviewNotifier + 'static,
    G: GuildDirectory + 'static,
{
    let (input, roles, guild_id) = request.into_input(SubmissionId(submission_id));

    let Some(guild) = state.guilds.guild(&guild_id) else {
        return unknown_guild(&guild_id);
    };

    match state.service.edit_review(&guild, &roles, input) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn decline_handler<S, J, B, R, N, G>(
    State(state): State<ReviewRouterState<S, J, B, R, N, G>>,
    Path(submission_id): Path<String>,
    Json(body): Json<DeclineBody>,
) -> Response
where
    S: SubmissionStore + 'static,
    J: RejectionStore + 'static,
    B: BuilderStore + 'static,
    R: ReviewerStore + 'static,
    N: ReviewNotifier + 'static,
    G: GuildDirectory + 'static,
{
    let request = DeclineRequest {
        submission_id: SubmissionId(submission_id),
        guild_id: GuildId(body.guild_id),
        builder: UserId(body.builder),
        reviewer: UserId(body.reviewer),
        feedback: body.feedback,
        submitted_at: body.submitted_at,
        reviewed_at: body.reviewed_at.unwrap_or_else(Utc::now),
    };

    match state.service.decline_review(request) {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "declined" }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn purge_handler<S, J, B, R, N, G>(
    State(state): State<ReviewRouterState<S, J, B, R, N, G>>,
    Path(submission_id): Path<String>,
    Query(query): Query<GuildQuery>,
) -> Response
where
    S: SubmissionStore + 'static,
    J: RejectionStore + 'static,
    B: BuilderStore + 'static,
    R: ReviewerStore + 'static,
    N: ReviewNotifier + 'static,
    G: GuildDirectory + 'static,
{
    let id = SubmissionId(submission_id);
    match state
        .service
        .purge_submission(&id, &GuildId(query.guild_id))
    {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "purged" }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn feedback_handler<S, J, B, R, N, G>(
    State(state): State<ReviewRouterState<S, J, B, R, N, G>>,
    Path(submission_id): Path<String>,
) -> Response
where
    S: SubmissionStore + 'static,
    J: RejectionStore + 'static,
    B: BuilderStore + 'static,
    R: ReviewerStore + 'static,
    N: ReviewNotifier + 'static,
    G: GuildDirectory + 'static,
{
    match state
        .service
        .submission_feedback(&SubmissionId(submission_id))
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn builder_leaderboard_handler<S, J, B, R, N, G>(
    State(state): State<ReviewRouterState<S, J, B, R, N, G>>,
    Query(query): Query<BuilderBoardQuery>,
) -> Response
where
    S: SubmissionStore + 'static,
    J: RejectionStore + 'static,
    B: BuilderStore + 'static,
    R: ReviewerStore + 'static,
    N: ReviewNotifier + 'static,
    G: GuildDirectory + 'static,
{
    let scope = match query.scope() {
        Ok(scope) => scope,
        Err(response) => return response,
    };
    match state.service.builder_leaderboard(&scope, query.metric) {
        Ok(board) => (StatusCode::OK, Json(board)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reviewer_leaderboard_handler<S, J, B, R, N, G>(
    State(state): State<ReviewRouterState<S, J, B, R, N, G>>,
    Query(query): Query<ReviewerBoardQuery>,
) -> Response
where
    S: SubmissionStore + 'static,
    J: RejectionStore + 'static,
    B: BuilderStore + 'static,
    R: ReviewerStore + 'static,
    N: ReviewNotifier + 'static,
    G: GuildDirectory + 'static,
{
    let scope = match query.scope() {
        Ok(scope) => scope,
        Err(response) => return response,
    };
    match state.service.reviewer_leaderboard(&scope, query.metric) {
        Ok(board) => (StatusCode::OK, Json(board)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn builder_stats_handler<S, J, B, R, N, G>(
    State(state): State<ReviewRouterState<S, J, B, R, N, G>>,
    Path(user): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> Response
where
    S: SubmissionStore + 'static,
    J: RejectionStore + 'static,
    B: BuilderStore + 'static,
    R: ReviewerStore + 'static,
    N: ReviewNotifier + 'static,
    G: GuildDirectory + 'static,
{
    let scope = match query.scope() {
        Ok(scope) => scope,
        Err(response) => return response,
    };
    match state.service.builder_stats(&UserId(user), &scope) {
        Ok(totals) => (StatusCode::OK, Json(totals)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reviewer_stats_handler<S, J, B, R, N, G>(
    State(state): State<ReviewRouterState<S, J, B, R, N, G>>,
    Path(user): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> Response
where
    S: SubmissionStore + 'static,
    J: RejectionStore + 'static,
    B: BuilderStore + 'static,
    R: ReviewerStore + 'static,
    N: ReviewNotifier + 'static,
    G: GuildDirectory + 'static,
{
    let scope = match query.scope() {
        Ok(scope) => scope,
        Err(response) => return response,
    };
    match state.service.reviewer_stats(&UserId(user), &scope) {
        Ok(totals) => (StatusCode::OK, Json(totals)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn builder_progress_handler<S, J, B, R, N, G>(
    State(state): State<ReviewRouterState<S, J, B, R, N, G>>,
    Path(user): Path<String>,
    Query(query): Query<GuildQuery>,
) -> Response
where
    S: SubmissionStore + 'static,
    J: RejectionStore + 'static,
    B: BuilderStore + 'static,
    R: ReviewerStore + 'static,
    N: ReviewNotifier + 'static,
    G: GuildDirectory + 'static,
{
    let guild_id = GuildId(query.guild_id);
    let Some(guild) = state.guilds.guild(&guild_id) else {
        return unknown_guild(&guild_id);
    };

    match state.service.builder_progress(&guild, &UserId(user)) {
        Ok(progress) => (StatusCode::OK, Json(progress)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn preferences_handler<S, J, B, R, N, G>(
    State(state): State<ReviewRouterState<S, J, B, R, N, G>>,
    Path(user): Path<String>,
    Json(body): Json<PreferencesBody>,
) -> Response
where
    S: SubmissionStore + 'static,
    J: RejectionStore + 'static,
    B: BuilderStore + 'static,
    R: ReviewerStore + 'static,
    N: ReviewNotifier + 'static,
    G: GuildDirectory + 'static,
{
    match state.service.set_dm_preference(
        &GuildId(body.guild_id),
        &UserId(user),
        body.dm_enabled,
    ) {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "updated" }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn guild_progress_handler<S, J, B, R, N, G>(
    State(state): State<ReviewRouterState<S, J, B, R, N, G>>,
    Path(guild): Path<String>,
) -> Response
where
    S: SubmissionStore + 'static,
    J: RejectionStore + 'static,
    B: BuilderStore + 'static,
    R: ReviewerStore + 'static,
    N: ReviewNotifier + 'static,
    G: GuildDirectory + 'static,
{
    match state.service.guild_progress(&GuildId(guild)) {
        Ok(totals) => (StatusCode::OK, Json(totals)).into_response(),
        Err(err) => error_response(err),
    }
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message })),
    )
        .into_response()
}

fn unknown_guild(guild: &GuildId) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("no configuration for guild '{}'", guild.0) })),
    )
        .into_response()
}

/// Map a service error to a status. Validation conflicts get 409/404/422
/// so the command layer can relay precise messages; everything the caller
/// cannot fix is a 500.
fn error_response(err: ReviewError) -> Response {
    let status = match &err {
        ReviewError::AlreadyAccepted | ReviewError::AlreadyRejected => StatusCode::CONFLICT,
        ReviewError::UnknownSubmission | ReviewError::NotYetReviewed => StatusCode::NOT_FOUND,
        ReviewError::SelfReview
        | ReviewError::ZeroCollaborators
        | ReviewError::KindChanged
        | ReviewError::OwnerChanged
        | ReviewError::EmptyFeedback => StatusCode::UNPROCESSABLE_ENTITY,
        ReviewError::ForeignGuild => StatusCode::FORBIDDEN,
        ReviewError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        ReviewError::MissingReviewer { .. } | ReviewError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
