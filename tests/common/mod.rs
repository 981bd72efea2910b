#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
};
use chrono::{NaiveDate, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use songs_api::{
    AppConfig, AppState, auth, create_router,
    models::{NewSong, NewUser, ROLE_ADMIN, ROLE_USER, Song, User},
    repository::{Repository, RepositoryState, SqliteRepository},
};
use tower::ServiceExt;

static NEXT_USER: AtomicU64 = AtomicU64::new(1);

/// An in-process app over a private in-memory database.
pub struct TestApp {
    pub router: Router,
    pub repo: SqliteRepository,
    pub config: AppConfig,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(AppConfig::default()).await
}

pub async fn setup_test_app_with(config: AppConfig) -> TestApp {
    let repo = SqliteRepository::connect(&config)
        .await
        .expect("Failed to open in-memory database");
    let state = AppState {
        repo: Arc::new(repo.clone()) as RepositoryState,
        config: config.clone(),
    };
    TestApp {
        router: create_router(state),
        repo,
        config,
    }
}

impl TestApp {
    // --- Factories ---

    pub async fn create_user(&self, role: &str) -> User {
        let n = NEXT_USER.fetch_add(1, Ordering::Relaxed);
        self.repo
            .create_user(NewUser {
                name: format!("Test User {n}"),
                email: format!("user{n}@example.com"),
                role: role.to_string(),
                email_verified_at: Some(Utc::now()),
            })
            .await
            .expect("Failed to create test user")
    }

    pub async fn create_regular_user(&self) -> User {
        self.create_user(ROLE_USER).await
    }

    pub async fn create_admin(&self) -> User {
        self.create_user(ROLE_ADMIN).await
    }

    pub async fn create_song(&self, user_id: i64, title: &str, genre: &str) -> Song {
        self.repo
            .create_song(NewSong {
                title: title.to_string(),
                description: Some(format!("{title} description")),
                genre: genre.to_string(),
                release_date: NaiveDate::from_ymd_opt(2020, 1, 1),
                user_id,
            })
            .await
            .expect("Failed to create test song")
    }

    pub async fn create_songs(&self, user_id: i64, count: usize, genre: &str) -> Vec<Song> {
        let mut songs = Vec::with_capacity(count);
        for i in 0..count {
            songs.push(self.create_song(user_id, &format!("Song {i}"), genre).await);
        }
        songs
    }

    pub fn token_for(&self, user: &User) -> String {
        auth::issue_token(&self.config, user.id).expect("Failed to issue token")
    }

    // --- Requests ---

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("accept", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post_json(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put_json(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.call(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.call(Method::DELETE, uri, Some(token), None).await
    }
}
