use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    pagination::Page,
    validation::{FieldRules, FromInput, Input, Rule},
};

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The owner of songs, stored in the `users` table. Every column is part of the
/// public profile returned alongside a newly created song.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[ts(type = "string | null")]
    pub email_verified_at: Option<DateTime<Utc>>,
    // RBAC field: 'user' or 'admin'.
    pub role: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

/// Song
///
/// A row of the `songs` table. `user_id` always comes from the authenticated
/// principal that created it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub genre: String,
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>, format = Date, example = "2024-05-17")]
    pub release_date: Option<NaiveDate>,
    pub user_id: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Song {
    /// Applies the fields present in `changes`, leaving the rest untouched.
    pub fn apply(&mut self, changes: SongChanges) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(genre) = changes.genre {
            self.genre = genre;
        }
        if let Some(release_date) = changes.release_date {
            self.release_date = release_date;
        }
    }

    pub fn is_owned_by(&self, user: &User) -> bool {
        self.user_id == user.id
    }
}

/// NewSong
///
/// Insert payload for the repository. Built from a validated create request plus
/// the principal's id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSong {
    pub title: String,
    pub description: Option<String>,
    pub genre: String,
    pub release_date: Option<NaiveDate>,
    pub user_id: i64,
}

/// NewUser
///
/// Insert payload for registration and seeding.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: String,
    pub email_verified_at: Option<DateTime<Utc>>,
}

/// SongFilter
///
/// Listing filters. `genre` is an exact match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SongFilter {
    pub genre: Option<String>,
}

// --- Request Payloads (Input Schemas) ---

/// CreateSongRequest
///
/// Input payload for `POST /api/songs`. Any `user_id` in the body is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct CreateSongRequest {
    #[schema(example = "Bohemian Rhapsody")]
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "Rock")]
    pub genre: String,
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>, format = Date, example = "1975-10-31")]
    pub release_date: Option<NaiveDate>,
}

impl FromInput for CreateSongRequest {
    const RULES: &'static [FieldRules] = &[
        ("title", &[Rule::Required, Rule::String, Rule::Max(255)]),
        ("description", &[Rule::Nullable, Rule::String]),
        ("genre", &[Rule::Required, Rule::String, Rule::Max(255)]),
        ("release_date", &[Rule::Nullable, Rule::Date]),
    ];

    fn from_input(input: &Input) -> Self {
        Self {
            title: input.string("title").unwrap_or_default(),
            description: input.string("description"),
            genre: input.string("genre").unwrap_or_default(),
            release_date: input.date("release_date"),
        }
    }
}

impl CreateSongRequest {
    pub fn into_new_song(self, user_id: i64) -> NewSong {
        NewSong {
            title: self.title,
            description: self.description,
            genre: self.genre,
            release_date: self.release_date,
            user_id,
        }
    }
}

/// SongChanges
///
/// Partial update payload for `PUT /api/songs/{id}`. The outer `Option` records
/// whether a key was sent at all; the inner one (nullable columns only) whether
/// it was sent as `null`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct SongChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<String>, format = Date)]
    pub release_date: Option<Option<NaiveDate>>,
}

impl FromInput for SongChanges {
    const RULES: &'static [FieldRules] = &[
        ("title", &[Rule::Sometimes, Rule::Required, Rule::String, Rule::Max(255)]),
        ("description", &[Rule::Sometimes, Rule::Nullable, Rule::String]),
        ("genre", &[Rule::Sometimes, Rule::Required, Rule::String, Rule::Max(255)]),
        ("release_date", &[Rule::Sometimes, Rule::Nullable, Rule::Date]),
    ];

    fn from_input(input: &Input) -> Self {
        Self {
            title: input.string("title"),
            description: input.has("description").then(|| input.string("description")),
            genre: input.string("genre"),
            release_date: input.has("release_date").then(|| input.date("release_date")),
        }
    }
}

impl SongChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.genre.is_none()
            && self.release_date.is_none()
    }
}

/// RegisterUserRequest
///
/// Input payload for `POST /api/register`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct RegisterUserRequest {
    #[schema(example = "Freddie Mercury")]
    pub name: String,
    #[schema(example = "freddie@example.com")]
    pub email: String,
}

impl FromInput for RegisterUserRequest {
    const RULES: &'static [FieldRules] = &[
        ("name", &[Rule::Required, Rule::String, Rule::Max(255)]),
        ("email", &[Rule::Required, Rule::String, Rule::Email, Rule::Max(255)]),
    ];

    fn from_input(input: &Input) -> Self {
        Self {
            name: input.string("name").unwrap_or_default(),
            email: input.string("email").unwrap_or_default().to_lowercase(),
        }
    }
}

// --- Response Schemas (Output) ---

/// SongListResponse
///
/// Output of `GET /api/songs`: the paginator envelope under a `songs` key.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SongListResponse {
    pub songs: Page<Song>,
}

/// CreateSongResponse
///
/// Output of `POST /api/songs`: the stored song and its owner's profile.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateSongResponse {
    pub song: Song,
    pub user: User,
}

/// RegisterUserResponse
///
/// Output of `POST /api/register`. `token` is sent back as `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserResponse {
    pub user: User,
    pub token: String,
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}
