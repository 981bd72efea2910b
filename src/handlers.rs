use axum::{
    Json,
    body::Bytes,
    extract::{FromRequestParts, Path, Query, State},
    http::{StatusCode, request::Parts},
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    AppState,
    auth::{self, AuthUser},
    error::{AppError, MessageResponse},
    models::{
        CreateSongRequest, CreateSongResponse, HealthResponse, NewUser, ROLE_USER,
        RegisterUserRequest, RegisterUserResponse, Song, SongChanges, SongFilter,
        SongListResponse, User,
    },
    pagination::{Page, PageRequest},
    validation::{Input, ValidationErrors},
};

/// Collection path used for the paginator links.
const SONGS_PATH: &str = "/api/songs";

// --- Query / Path Extractors ---

/// SongQuery
///
/// Query parameters of `GET /api/songs`. `page` is kept raw so malformed values
/// fall back to the first page instead of failing the request.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SongQuery {
    /// Exact-match genre filter. Empty means no filter.
    pub genre: Option<String>,
    /// 1-based page number.
    pub page: Option<String>,
}

/// A query string that does not fit `SongQuery` (a repeated `genre`, for
/// example) is reported as a 422 rather than axum's plain-text 400.
impl<S> FromRequestParts<S> for SongQuery
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<SongQuery>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                tracing::debug!(%rejection, "rejected song query string");
                ValidationErrors::single("query", "The query string is invalid.")
            })?;
        Ok(query)
    }
}

impl SongQuery {
    pub fn filter(&self) -> SongFilter {
        SongFilter {
            genre: self
                .genre
                .as_deref()
                .map(str::trim)
                .filter(|genre| !genre.is_empty())
                .map(str::to_string),
        }
    }
}

/// SongId
///
/// The `{id}` path segment. Anything that is not an integer cannot name a song,
/// so it is rejected as 404 rather than 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SongId(pub i64);

impl<S> FromRequestParts<S> for SongId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound("Not Found".to_string()))?;
        raw.trim()
            .parse()
            .map(SongId)
            .map_err(|_| AppError::NotFound(format!("No song found with id {raw}.")))
    }
}

/// Owner-or-admin check for mutations.
fn authorize_mutation(user: &User, song: &Song) -> Result<(), AppError> {
    if song.is_owned_by(user) || user.is_admin() {
        Ok(())
    } else {
        tracing::warn!(user_id = user.id, song_id = song.id, "rejected mutation by non-owner");
        Err(AppError::Forbidden)
    }
}

// --- Handlers ---

/// health
///
/// [Public Route] Liveness plus a database round-trip.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Healthy", body = HealthResponse),
        (status = 503, description = "Database unavailable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.repo.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                database: "ok".to_string(),
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded".to_string(),
                    database: "unavailable".to_string(),
                }),
            )
        }
    }
}

/// register_user
///
/// [Public Route] Creates a user with role `user` and returns a bearer token for
/// it. Answers 404 when registration is disabled by configuration.
#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = RegisterUserResponse),
        (status = 404, description = "Registration disabled", body = MessageResponse),
        (status = 422, description = "Invalid payload", body = crate::validation::ValidationErrorResponse)
    ),
    tag = "users"
)]
pub async fn register_user(
    State(state): State<AppState>,
    input: Input,
) -> Result<(StatusCode, Json<RegisterUserResponse>), AppError> {
    if !state.config.allow_registration {
        return Err(AppError::NotFound("Not Found".to_string()));
    }

    let request: RegisterUserRequest = input.validated()?;
    if state.repo.get_user_by_email(&request.email).await?.is_some() {
        return Err(ValidationErrors::single("email", "The email has already been taken.").into());
    }

    let user = state
        .repo
        .create_user(NewUser {
            name: request.name,
            email: request.email,
            role: ROLE_USER.to_string(),
            email_verified_at: None,
        })
        .await?;
    let token = auth::issue_token(&state.config, user.id)?;

    tracing::info!(user_id = user.id, "registered user");
    Ok((
        StatusCode::CREATED,
        Json(RegisterUserResponse {
            user,
            token,
            token_type: "Bearer".to_string(),
        }),
    ))
}

/// get_me
///
/// [Authenticated Route] The principal's public profile.
#[utoipa::path(
    get,
    path = "/api/user",
    responses(
        (status = 200, description = "Profile", body = User),
        (status = 401, description = "Unauthenticated", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_me(AuthUser { user }: AuthUser) -> Json<User> {
    Json(user)
}

/// list_songs
///
/// [Authenticated Route] One page of songs, optionally filtered by genre.
/// Listing is not restricted to the principal's own songs.
#[utoipa::path(
    get,
    path = "/api/songs",
    params(SongQuery),
    responses(
        (status = 200, description = "Paginated songs", body = SongListResponse),
        (status = 401, description = "Unauthenticated", body = MessageResponse),
        (status = 422, description = "Malformed query string", body = crate::validation::ValidationErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "songs"
)]
pub async fn list_songs(
    _auth: AuthUser,
    State(state): State<AppState>,
    query: SongQuery,
) -> Result<Json<SongListResponse>, AppError> {
    let page = PageRequest::from_query(query.page.as_deref(), state.config.per_page);
    let (songs, total) = state.repo.list_songs(&query.filter(), page).await?;
    Ok(Json(SongListResponse {
        songs: Page::new(songs, total, page, SONGS_PATH),
    }))
}

/// create_song
///
/// [Authenticated Route] Validates and stores a song. The owner is always the
/// principal; a `user_id` in the body is ignored.
#[utoipa::path(
    post,
    path = "/api/songs",
    request_body = CreateSongRequest,
    responses(
        (status = 200, description = "Created", body = CreateSongResponse),
        (status = 401, description = "Unauthenticated", body = MessageResponse),
        (status = 422, description = "Invalid payload", body = crate::validation::ValidationErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "songs"
)]
pub async fn create_song(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    input: Input,
) -> Result<Json<CreateSongResponse>, AppError> {
    let request: CreateSongRequest = input.validated()?;
    let song = state.repo.create_song(request.into_new_song(user.id)).await?;
    tracing::info!(song_id = song.id, user_id = user.id, "created song");
    Ok(Json(CreateSongResponse { song, user }))
}

/// get_song
///
/// [Authenticated Route] A single song by id.
#[utoipa::path(
    get,
    path = "/api/songs/{id}",
    params(("id" = i64, Path, description = "Song ID")),
    responses(
        (status = 200, description = "Found", body = Song),
        (status = 401, description = "Unauthenticated", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "songs"
)]
pub async fn get_song(
    _auth: AuthUser,
    State(state): State<AppState>,
    SongId(id): SongId,
) -> Result<Json<Song>, AppError> {
    state
        .repo
        .get_song(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::song_not_found(id))
}

/// update_song
///
/// [Authenticated Route] Partial update: only the keys present in the body are
/// written. The body is parsed only once the song is known to exist and the
/// principal may modify it, so 404 and 403 take precedence over 422.
#[utoipa::path(
    put,
    path = "/api/songs/{id}",
    params(("id" = i64, Path, description = "Song ID")),
    request_body = SongChanges,
    responses(
        (status = 200, description = "Updated", body = MessageResponse),
        (status = 401, description = "Unauthenticated", body = MessageResponse),
        (status = 403, description = "Not owner", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse),
        (status = 422, description = "Invalid payload", body = crate::validation::ValidationErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "songs"
)]
pub async fn update_song(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    SongId(id): SongId,
    body: Bytes,
) -> Result<Json<MessageResponse>, AppError> {
    let song = state
        .repo
        .get_song(id)
        .await?
        .ok_or_else(|| AppError::song_not_found(id))?;
    authorize_mutation(&user, &song)?;

    let changes: SongChanges = Input::from_slice(&body)?.validated()?;
    if !changes.is_empty() {
        state
            .repo
            .update_song(id, changes)
            .await?
            .ok_or_else(|| AppError::song_not_found(id))?;
    }

    tracing::info!(song_id = id, user_id = user.id, "updated song");
    Ok(Json(MessageResponse::new("Song updated successfully.")))
}

/// delete_song
///
/// [Authenticated Route] Hard delete.
#[utoipa::path(
    delete,
    path = "/api/songs/{id}",
    params(("id" = i64, Path, description = "Song ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 401, description = "Unauthenticated", body = MessageResponse),
        (status = 403, description = "Not owner", body = MessageResponse),
        (status = 404, description = "Not Found", body = MessageResponse)
    ),
    security(("bearer" = [])),
    tag = "songs"
)]
pub async fn delete_song(
    AuthUser { user }: AuthUser,
    State(state): State<AppState>,
    SongId(id): SongId,
) -> Result<Json<MessageResponse>, AppError> {
    let song = state
        .repo
        .get_song(id)
        .await?
        .ok_or_else(|| AppError::song_not_found(id))?;
    authorize_mutation(&user, &song)?;

    // A concurrent delete between the lookup and here still reads as 404.
    if !state.repo.delete_song(id).await? {
        return Err(AppError::song_not_found(id));
    }

    tracing::info!(song_id = id, user_id = user.id, "deleted song");
    Ok(Json(MessageResponse::new("Song deleted successfully!")))
}
