//! HTTP Server
//!
//! Route wiring and the listener loop. Shuts down gracefully on the daemon's
//! shutdown token.

use crate::error::ApiError;
use crate::handler::ApiHandler;
use crate::types::{CreateUserRequest, HealthResponse, UserResponse};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use keyrelay_core::application::ShutdownToken;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
const DEFAULT_HTTP_PORT: u16 = 3000;

/// HTTP Server Configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
        }
    }
}

impl HttpServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Build the application router
pub fn router(handler: Arc<ApiHandler>) -> Router {
    Router::new()
        .route("/api/users", post(create_user).get(list_users))
        .route("/health", get(health))
        .with_state(handler)
}

async fn create_user(
    State(handler): State<Arc<ApiHandler>>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let Json(request) = body?;
    let user = handler.create_user(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(
    State(handler): State<Arc<ApiHandler>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    Ok(Json(handler.list_users(&params).await?))
}

async fn health(State(handler): State<Arc<ApiHandler>>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(handler.health().await?))
}

/// HTTP Server
pub struct HttpServer {
    config: HttpServerConfig,
    handler: Arc<ApiHandler>,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, handler: Arc<ApiHandler>) -> Self {
        Self { config, handler }
    }

    /// Serve until the shutdown token fires, then drain in-flight requests
    pub async fn run(self, mut shutdown: ShutdownToken) -> std::io::Result<()> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr).await?;

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "HTTP server listening"
        );

        axum::serve(listener, router(self.handler))
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorBody;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use keyrelay_core::application::{JobQueue, UserService, DEFAULT_QUEUE};
    use keyrelay_core::domain::{JobArgs, JobKind};
    use keyrelay_core::port::credential_hasher::mocks::FakeCredentialHasher;
    use keyrelay_core::port::id_provider::{RandomKeyProvider, SequentialIdProvider};
    use keyrelay_core::port::job_repository::mocks::InMemoryJobRepository;
    use keyrelay_core::port::time_provider::ManualTimeProvider;
    use keyrelay_core::port::user_repository::mocks::InMemoryUserRepository;
    use serde::de::DeserializeOwned;
    use serde_json::json;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        handler: Arc<ApiHandler>,
        jobs: Arc<InMemoryJobRepository>,
        clock: Arc<ManualTimeProvider>,
    }

    fn app() -> TestApp {
        let clock = Arc::new(ManualTimeProvider::new(1_000));
        let jobs = Arc::new(InMemoryJobRepository::new(clock.clone()));
        let queue = Arc::new(JobQueue::new(
            DEFAULT_QUEUE,
            jobs.clone(),
            Arc::new(SequentialIdProvider::new("job")),
            clock.clone(),
        ));
        let users = Arc::new(UserService::new(
            Arc::new(InMemoryUserRepository::new()),
            queue.clone(),
            Arc::new(FakeCredentialHasher),
            Arc::new(SequentialIdProvider::new("user")),
            Arc::new(RandomKeyProvider),
            clock.clone(),
        ));
        let handler = Arc::new(ApiHandler::new(users, queue));
        TestApp {
            router: router(handler.clone()),
            handler,
            jobs,
            clock,
        }
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
        serde_json::from_slice(bytes).unwrap()
    }

    fn post_user(user: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/users")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "user": user }).to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn create(app: &TestApp, email: &str, phone: &str, full_name: &str, metadata: &str) {
        let (status, _) = send(
            &app.router,
            post_user(json!({
                "email": email,
                "phone_number": phone,
                "full_name": full_name,
                "metadata": metadata,
                "password": "secret",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        app.clock.advance(10);
    }

    #[tokio::test]
    async fn test_create_user_returns_created_and_enqueues_fetch() {
        let app = app();

        let (status, body) = send(
            &app.router,
            post_user(json!({
                "email": "Alice@Example.com",
                "phone_number": "555-0100",
                "full_name": "Alice",
                "metadata": "male, age 32",
                "password": "secret",
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let user: UserResponse = parse(&body);
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.key.len(), 200);
        assert!(user.account_key.is_none());

        let raw: serde_json::Value = parse(&body);
        assert!(raw.get("password").is_none());
        assert!(raw.get("password_digest").is_none());

        let jobs = app.jobs.all();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].kind, JobKind::FetchAccountKey);
        assert_eq!(jobs[0].args, JobArgs::from_strs(&["user-1"]));
    }

    #[tokio::test]
    async fn test_invalid_user_lists_every_error() {
        let app = app();

        let (status, body) = send(&app.router, post_user(json!({ "full_name": "Nobody" }))).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let errors: ErrorBody = parse(&body);
        assert!(errors.errors.contains(&"Email can't be blank".to_string()));
        assert!(errors.errors.contains(&"Phone number can't be blank".to_string()));
        assert!(errors.errors.contains(&"Password can't be blank".to_string()));
        assert!(app.jobs.all().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_taken() {
        let app = app();
        create(&app, "bob@example.com", "555-0101", "Bob", "").await;

        let (status, body) = send(
            &app.router,
            post_user(json!({
                "email": "BOB@example.com",
                "phone_number": "555-0199",
                "password": "secret",
            })),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let errors: ErrorBody = parse(&body);
        assert_eq!(errors.errors, vec!["Email has already been taken"]);
    }

    #[tokio::test]
    async fn test_missing_user_envelope_is_bad_request() {
        let app = app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/users")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"email":"a@example.com"}"#))
            .unwrap();

        let (status, body) = send(&app.router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let errors: ErrorBody = parse(&body);
        assert_eq!(errors.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let app = app();
        create(&app, "a@example.com", "555-0001", "A", "").await;
        create(&app, "b@example.com", "555-0002", "B", "").await;

        let (status, body) = send(&app.router, get("/api/users")).await;

        assert_eq!(status, StatusCode::OK);
        let users: Vec<UserResponse> = parse(&body);
        let emails: Vec<_> = users.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["b@example.com", "a@example.com"]);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let app = app();
        create(&app, "a@example.com", "555-0001", "Ann Lee", "Male, Age 32").await;
        create(&app, "b@example.com", "555-0002", "Bo Chan", "female, age 40").await;

        let (_, body) = send(&app.router, get("/api/users?email=A%40Example.com")).await;
        let users: Vec<UserResponse> = parse(&body);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "a@example.com");

        let (_, body) = send(&app.router, get("/api/users?full_name=Bo%20Chan")).await;
        let users: Vec<UserResponse> = parse(&body);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "b@example.com");

        let (_, body) = send(&app.router, get("/api/users?metadata=male")).await;
        let users: Vec<UserResponse> = parse(&body);
        assert_eq!(users.len(), 2);

        let (_, body) = send(&app.router, get("/api/users?metadata=AGE%2032")).await;
        let users: Vec<UserResponse> = parse(&body);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "a@example.com");

        // Blank filters are ignored
        let (_, body) = send(&app.router, get("/api/users?email=&full_name=")).await;
        let users: Vec<UserResponse> = parse(&body);
        assert_eq!(users.len(), 2);
    }

    #[tokio::test]
    async fn test_unexpected_query_parameters() {
        let app = app();

        let (status, body) = send(&app.router, get("/api/users?a=1&email=x&b=2&a=3")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let errors: ErrorBody = parse(&body);
        assert_eq!(errors.errors, vec!["Unexpected parameter(s): a, b"]);
    }

    #[tokio::test]
    async fn test_health_reports_job_counts() {
        let app = app();
        create(&app, "a@example.com", "555-0001", "A", "").await;

        let (status, body) = send(&app.router, get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        let health: serde_json::Value = parse(&body);
        assert_eq!(health["status"], "ok");
        assert_eq!(health["version"], keyrelay_core::VERSION);
        assert_eq!(health["jobs"]["queued"], 1);
        assert_eq!(health["jobs"]["failed"], 0);
    }

    #[tokio::test]
    async fn test_server_stops_on_shutdown() {
        let (sender, token) = keyrelay_core::application::shutdown_channel();
        let app = app();
        let server = HttpServer::new(
            HttpServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            app.handler.clone(),
        );

        let handle = tokio::spawn(server.run(token));
        sender.shutdown();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
