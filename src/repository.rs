use std::{str::FromStr, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{
    QueryBuilder, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::{
    config::AppConfig,
    error::AppError,
    models::{NewSong, NewUser, Song, SongChanges, SongFilter, User},
    pagination::PageRequest,
    validation::ValidationErrors,
};

/// Repository Trait
///
/// The persistence contract the handlers and the `AuthUser` extractor depend on.
/// `Send + Sync + async_trait` make `Arc<dyn Repository>` shareable across
/// Axum's task boundaries and let tests substitute in-memory mocks.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Cheap round-trip used by the health check.
    async fn ping(&self) -> Result<(), AppError>;

    // --- Users ---
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    // --- Songs ---
    /// Returns one page of songs ordered by id, plus the total number of matches.
    async fn list_songs(
        &self,
        filter: &SongFilter,
        page: PageRequest,
    ) -> Result<(Vec<Song>, u64), AppError>;
    async fn get_song(&self, id: i64) -> Result<Option<Song>, AppError>;
    async fn create_song(&self, song: NewSong) -> Result<Song, AppError>;
    /// Applies only the provided fields. Returns `None` when the song does not exist.
    async fn update_song(&self, id: i64, changes: SongChanges) -> Result<Option<Song>, AppError>;
    /// Hard delete. Returns whether a row was removed.
    async fn delete_song(&self, id: i64) -> Result<bool, AppError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Opens a connection pool for `config.db_url`, creating the database file if needed.
///
/// In-memory databases live only as long as their connection, so they get a
/// single connection that is never recycled.
pub async fn connect(config: &AppConfig) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(&config.db_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let in_memory = config.db_url.contains(":memory:") || config.db_url.contains("mode=memory");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.db_max_connections.max(1))
    };

    Ok(pool_options.connect_with(options).await?)
}

/// SqliteRepository
///
/// The concrete implementation of the `Repository` trait, backed by SQLite.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects using `config` and brings the schema up to date.
    pub async fn connect(config: &AppConfig) -> Result<Self, AppError> {
        let repo = Self::new(connect(config).await?);
        repo.migrate().await?;
        Ok(repo)
    }

    /// Runs the embedded migrations from `migrations/`.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn push_song_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &SongFilter) {
    if let Some(genre) = &filter.genre {
        builder.push(" WHERE genre = ");
        builder.push_bind(genre.clone());
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, email_verified_at, role, created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, email_verified_at, role, created_at, updated_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// create_user
    ///
    /// A concurrent insert losing the race on the unique e-mail index surfaces as
    /// the same validation error the handler reports for a known duplicate.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let now = Utc::now();
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, email_verified_at, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, name, email, email_verified_at, role, created_at, updated_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.email_verified_at)
        .bind(&user.role)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ValidationErrors::single("email", "The email has already been taken.").into()
            }
            other => AppError::from(other),
        })
    }

    /// list_songs
    ///
    /// Builds the filtered count and page queries with `QueryBuilder` so the genre
    /// is always bound, never interpolated.
    async fn list_songs(
        &self,
        filter: &SongFilter,
        page: PageRequest,
    ) -> Result<(Vec<Song>, u64), AppError> {
        let mut count: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM songs");
        push_song_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut select: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT id, title, description, genre, release_date, user_id, created_at, updated_at FROM songs",
        );
        push_song_filter(&mut select, filter);
        select.push(" ORDER BY id ASC LIMIT ");
        select.push_bind(page.limit());
        select.push(" OFFSET ");
        select.push_bind(page.offset());

        let songs = select.build_query_as::<Song>().fetch_all(&self.pool).await?;
        Ok((songs, u64::try_from(total).unwrap_or_default()))
    }

    async fn get_song(&self, id: i64) -> Result<Option<Song>, AppError> {
        let song = sqlx::query_as::<_, Song>(
            "SELECT id, title, description, genre, release_date, user_id, created_at, updated_at FROM songs WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(song)
    }

    async fn create_song(&self, song: NewSong) -> Result<Song, AppError> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, Song>(
            r#"
            INSERT INTO songs (title, description, genre, release_date, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, title, description, genre, release_date, user_id, created_at, updated_at
            "#,
        )
        .bind(&song.title)
        .bind(&song.description)
        .bind(&song.genre)
        .bind(song.release_date)
        .bind(song.user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// update_song
    ///
    /// A single `UPDATE … RETURNING`, so concurrent writers only contend for
    /// SQLite's write lock and never hold a read lock they must upgrade. Each
    /// column pairs a "provided" flag with its new value; unflagged columns
    /// keep what is stored.
    async fn update_song(&self, id: i64, changes: SongChanges) -> Result<Option<Song>, AppError> {
        let SongChanges {
            title,
            description,
            genre,
            release_date,
        } = changes;

        let updated = sqlx::query_as::<_, Song>(
            r#"
            UPDATE songs
            SET title = CASE WHEN ? THEN ? ELSE title END,
                description = CASE WHEN ? THEN ? ELSE description END,
                genre = CASE WHEN ? THEN ? ELSE genre END,
                release_date = CASE WHEN ? THEN ? ELSE release_date END,
                updated_at = ?
            WHERE id = ?
            RETURNING id, title, description, genre, release_date, user_id, created_at, updated_at
            "#,
        )
        .bind(title.is_some())
        .bind(title)
        .bind(description.is_some())
        .bind(description.flatten())
        .bind(genre.is_some())
        .bind(genre)
        .bind(release_date.is_some())
        .bind(release_date.flatten())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(updated)
    }

    async fn delete_song(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM songs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
