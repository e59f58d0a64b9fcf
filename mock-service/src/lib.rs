use axum::{
    debug_handler,
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use serde::{Deserialize, Serialize};
use std::collections::{hash_map::Entry, HashMap};
use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock,
    },
    time::Duration,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Behaviour knobs for the mock auth API.
#[derive(Clone, Debug, Default)]
pub struct MockConfig {
    /// Added to every request before it is answered.
    pub delay: Duration,
    /// Requests per second above which the service answers `503`.
    pub max_rps: Option<u32>,
    /// Answer every request with `500`.
    pub outage: bool,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    fn is_valid(&self) -> bool {
        self.email.contains('@') && (8..=32).contains(&self.password.len())
    }
}

#[derive(Debug, Serialize)]
pub struct Session {
    pub email: String,
    pub token: String,
}

struct AppState {
    config: MockConfig,
    users: RwLock<HashMap<String, String>>,
    limiter: Option<DefaultDirectRateLimiter>,
    sessions: AtomicU64,
}

impl AppState {
    fn session(&self, email: String) -> Json<Session> {
        let id = self.sessions.fetch_add(1, Ordering::Relaxed);
        Json(Session {
            email,
            token: format!("session-{id}"),
        })
    }

    async fn admit(&self, route: &'static str) -> Result<(), StatusCode> {
        counter!("mock_service_requests", "route" => route).increment(1);
        RPS_MEASURE.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.config.delay).await;

        if self.config.outage {
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                debug!("Shedding {route}");
                return Err(StatusCode::SERVICE_UNAVAILABLE);
            }
        }
        Ok(())
    }
}

/// The auth API under `/api/v1`.
pub fn router(config: MockConfig) -> Router {
    let state = Arc::new(AppState {
        limiter: config.max_rps.map(rate_limiter),
        config,
        users: RwLock::new(HashMap::new()),
        sessions: AtomicU64::new(0),
    });

    Router::new()
        .route("/api/v1/register", post(register))
        .route("/api/v1/login", post(login))
        .route("/health", get(|| async { StatusCode::OK }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(listener: TcpListener, config: MockConfig) -> anyhow::Result<()> {
    axum::serve(listener, router(config)).await?;
    Ok(())
}

#[debug_handler]
async fn register(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, Json<Session>), StatusCode> {
    state.admit("register").await?;
    if !credentials.is_valid() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    {
        let mut users = state.users.write().unwrap_or_else(PoisonError::into_inner);
        match users.entry(credentials.email.clone()) {
            Entry::Occupied(_) => return Err(StatusCode::CONFLICT),
            Entry::Vacant(entry) => {
                entry.insert(credentials.password);
            }
        }
    }
    Ok((StatusCode::CREATED, state.session(credentials.email)))
}

#[debug_handler]
async fn login(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<Session>, StatusCode> {
    state.admit("login").await?;
    if !credentials.is_valid() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let matches = {
        let users = state.users.read().unwrap_or_else(PoisonError::into_inner);
        match users.get(&credentials.email) {
            None => return Err(StatusCode::NOT_FOUND),
            Some(password) => *password == credentials.password,
        }
    };
    if !matches {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok(state.session(credentials.email))
}

/** Utils **/

pub fn rate_limiter(rps: u32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(NonZeroU32::new(rps).unwrap_or(NonZeroU32::MIN)))
}

/** RPS Printer **/

static RPS_MEASURE: AtomicU64 = AtomicU64::new(0);

pub async fn rps_measure_task() {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let requests = RPS_MEASURE.swap(0, Ordering::Relaxed);
        gauge!("mock_service_rps").set(requests as f64);
        println!("{requests} RPS");
    }
}
