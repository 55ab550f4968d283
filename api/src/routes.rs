use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::Method,
    middleware,
    routing::{get, post, put, MethodRouter},
    Extension, Json, Router,
};
use event_assistant::{
    Category, City, Event, GenerationResult, LoginOutcome, NewEvent, NewUser, ProxyError, User,
    MAX_IMAGE_BYTES,
};
use std::sync::Arc;

use crate::auth::{generate_session_token, require_session, CurrentUser};
use crate::client_ip::ClientAddress;
use crate::error::ApiError;
use crate::payloads::{HealthResponse, LoginPayload, ReviewPayload, SessionResponse, VerifyPayload};
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Largest image as base64, plus room for the prompt and catalog.
pub const GENERATE_BODY_LIMIT: usize = MAX_IMAGE_BYTES.div_ceil(3) * 4 + 1024 * 1024;

fn generate_route() -> MethodRouter<Arc<AppState>> {
    post(generate_event)
        .fallback(method_not_allowed)
        .layer(DefaultBodyLimit::max(GENERATE_BODY_LIMIT))
}

pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/events", post(create_event))
        .route("/api/events/:id", put(update_event))
        .route("/api/events/:id/reviews", post(add_review))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/api/generate-event", generate_route())
        .route("/api/gemini", generate_route())
        .route("/api/cities", get(list_cities))
        .route("/api/categories", get(list_categories))
        .route("/api/events", get(list_events))
        .route("/api/events/:id", get(get_event))
        .route("/api/auth/login", post(login))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/verify", post(verify))
        .route("/health", get(health))
        .merge(protected)
        .with_state(state)
}

async fn method_not_allowed(method: Method) -> ApiError {
    ProxyError::MethodNotAllowed(method.to_string()).into()
}

/// The body is taken raw so that malformed JSON maps to the proxy's own 400.
async fn generate_event(
    State(state): State<Arc<AppState>>,
    ClientAddress(caller): ClientAddress,
    body: Bytes,
) -> ApiResult<GenerationResult> {
    log::info!("AI suggestion request from {}", caller);
    let result = state.proxy.handle(&caller, &body).await?;
    Ok(Json(result))
}

async fn list_cities(State(state): State<Arc<AppState>>) -> Json<Vec<City>> {
    Json(state.store.cities().to_vec())
}

async fn list_categories(State(state): State<Arc<AppState>>) -> Json<Vec<Category>> {
    Json(state.store.categories().to_vec())
}

async fn list_events(State(state): State<Arc<AppState>>) -> Json<Vec<Event>> {
    Json(state.store.events().await)
}

async fn get_event(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Event> {
    Ok(Json(state.store.event(&id).await?))
}

async fn create_event(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(event): Json<NewEvent>,
) -> ApiResult<Event> {
    Ok(Json(state.store.add_event(event, &user_id).await?))
}

async fn update_event(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(event): Json<NewEvent>,
) -> ApiResult<Event> {
    let existing = state.store.event(&id).await?;
    if existing.organizer_id != user_id {
        return Err(ApiError::Unauthorized("Only the organizer can edit this event".into()));
    }
    Ok(Json(state.store.update_event(&id, event).await?))
}

async fn add_review(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(review): Json<ReviewPayload>,
) -> ApiResult<Event> {
    let event = state
        .store
        .add_review(&id, review.rating, &review.comment, &user_id)
        .await?;
    Ok(Json(event))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginPayload>,
) -> ApiResult<SessionResponse> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest("Please enter email and password.".into()));
    }
    match state.store.login(payload.email.trim(), &payload.password).await? {
        LoginOutcome::LoggedIn(user) => {
            let token = generate_session_token(&user.id);
            state.sessions.insert(token.clone(), user.id.clone());
            Ok(Json(SessionResponse { token, user }))
        }
        LoginOutcome::Unverified { email } => Err(ApiError::Unverified { email }),
    }
}

async fn signup(State(state): State<Arc<AppState>>, Json(new_user): Json<NewUser>) -> ApiResult<User> {
    if new_user.name.trim().is_empty() || new_user.phone.trim().is_empty() || new_user.password.is_empty() {
        return Err(ApiError::BadRequest("Please fill all fields.".into()));
    }
    Ok(Json(state.store.signup(new_user).await?))
}

async fn verify(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyPayload>,
) -> ApiResult<User> {
    Ok(Json(state.store.verify_user(payload.email.trim()).await?))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        ai_configured: state.proxy.is_configured(),
    })
}
