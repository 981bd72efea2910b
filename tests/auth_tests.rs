use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{Method, Request, Uri, header, request::Parts},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use songs_api::{
    AppError, AppState,
    auth::{self, AuthUser, Claims},
    config::{AppConfig, Env},
    models::{NewSong, NewUser, Song, SongChanges, SongFilter, User},
    pagination::PageRequest,
    repository::Repository,
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::SystemTime,
};

// --- Mock Repository for Auth Logic ---

#[derive(Default)]
struct MockAuthRepo {
    user_to_return: Option<User>,
    user_lookups: AtomicUsize,
}

#[async_trait]
impl Repository for MockAuthRepo {
    async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.user_to_return.clone().filter(|user| user.id == id))
    }

    // Unused by the extractor.
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
    async fn get_user_by_email(&self, _email: &str) -> Result<Option<User>, AppError> {
        Ok(None)
    }
    async fn create_user(&self, _user: NewUser) -> Result<User, AppError> {
        Ok(User::default())
    }
    async fn list_songs(
        &self,
        _filter: &SongFilter,
        _page: PageRequest,
    ) -> Result<(Vec<Song>, u64), AppError> {
        Ok((vec![], 0))
    }
    async fn get_song(&self, _id: i64) -> Result<Option<Song>, AppError> {
        Ok(None)
    }
    async fn create_song(&self, _song: NewSong) -> Result<Song, AppError> {
        Ok(Song::default())
    }
    async fn update_song(&self, _id: i64, _changes: SongChanges) -> Result<Option<Song>, AppError> {
        Ok(None)
    }
    async fn delete_song(&self, _id: i64) -> Result<bool, AppError> {
        Ok(false)
    }
}

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_USER_ID: i64 = 1;

fn test_config(env: Env) -> AppConfig {
    AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    }
}

fn test_user(role: &str) -> User {
    User {
        id: TEST_USER_ID,
        name: "Test User".to_string(),
        email: "test@example.com".to_string(),
        role: role.to_string(),
        ..User::default()
    }
}

/// Signs claims by hand so expiry can be placed in the past.
fn create_token(sub: &str, secret: &str, exp_offset: i64) -> String {
    let now = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: sub.to_string(),
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

fn create_app_state(env: Env, repo: Arc<MockAuthRepo>) -> AppState {
    AppState {
        repo,
        config: test_config(env),
    }
}

fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(parts: &mut Parts, token: &str) {
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
}

fn with_user_id(parts: &mut Parts, id: &str) {
    parts.headers.insert(
        header::HeaderName::from_static(auth::USER_ID_HEADER),
        header::HeaderValue::from_str(id).unwrap(),
    );
}

// --- Token Tests ---

#[test]
fn test_issued_token_round_trips_user_id() {
    let config = test_config(Env::Production);

    let token = auth::issue_token(&config, 314).unwrap();

    assert_eq!(auth::verify_token(&config, &token).unwrap(), 314);
}

#[test]
fn test_oversized_ttl_saturates_instead_of_expiring() {
    let config = AppConfig {
        token_ttl_secs: u64::MAX,
        ..test_config(Env::Production)
    };

    let token = auth::issue_token(&config, 5).unwrap();

    assert_eq!(auth::verify_token(&config, &token).unwrap(), 5);
}

#[test]
fn test_token_signed_with_other_secret_is_rejected() {
    let config = test_config(Env::Production);
    let token = create_token("1", "some-other-secret", 3600);

    let result = auth::verify_token(&config, &token);

    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[test]
fn test_expired_token_is_rejected() {
    let config = test_config(Env::Production);
    let token = create_token("1", TEST_JWT_SECRET, -60);

    let result = auth::verify_token(&config, &token);

    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[test]
fn test_non_numeric_subject_is_rejected() {
    let config = test_config(Env::Production);
    let token = create_token("not-a-user", TEST_JWT_SECRET, 3600);

    let result = auth::verify_token(&config, &token);

    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

// --- Extractor Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let repo = Arc::new(MockAuthRepo {
        user_to_return: Some(test_user("user")),
        ..MockAuthRepo::default()
    });
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token("1", TEST_JWT_SECRET, 3600));

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    let AuthUser { user } = auth_user.unwrap();
    assert_eq!(user.id, TEST_USER_ID);
    assert_eq!(user.role, "user");
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let app_state = create_app_state(Env::Production, Arc::new(MockAuthRepo::default()));

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(auth_user, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_auth_failure_with_non_bearer_scheme() {
    let app_state = create_app_state(Env::Production, Arc::new(MockAuthRepo::default()));

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_static("Basic dXNlcjpwYXNz"),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(auth_user, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_auth_failure_when_user_no_longer_exists() {
    let app_state = create_app_state(Env::Production, Arc::new(MockAuthRepo::default()));

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token("1", TEST_JWT_SECRET, 3600));

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(auth_user, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_resolved_user_is_cached_for_the_request() {
    let repo = Arc::new(MockAuthRepo {
        user_to_return: Some(test_user("user")),
        ..MockAuthRepo::default()
    });
    let app_state = create_app_state(Env::Production, repo.clone());

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &create_token("1", TEST_JWT_SECRET, 3600));

    AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();

    assert_eq!(repo.user_lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_local_bypass_success() {
    let repo = Arc::new(MockAuthRepo {
        user_to_return: Some(test_user("admin")),
        ..MockAuthRepo::default()
    });
    let app_state = create_app_state(Env::Local, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_user_id(&mut parts, "1");

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    let AuthUser { user } = auth_user.unwrap();
    assert_eq!(user.id, TEST_USER_ID);
    assert!(user.is_admin());
}

#[tokio::test]
async fn test_local_bypass_unknown_user_falls_through_to_bearer() {
    let app_state = create_app_state(Env::Local, Arc::new(MockAuthRepo::default()));

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_user_id(&mut parts, "999");

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(auth_user, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let repo = Arc::new(MockAuthRepo {
        user_to_return: Some(test_user("admin")),
        ..MockAuthRepo::default()
    });
    let app_state = create_app_state(Env::Production, repo);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    // Provide ONLY the local bypass header
    with_user_id(&mut parts, "1");

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(auth_user, Err(AppError::Unauthenticated)));
}
