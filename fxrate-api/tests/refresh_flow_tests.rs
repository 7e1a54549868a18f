//! End-to-end refresh flow against a stub upstream over real HTTP.
//!
//! Lookups use the token endpoint and the rate endpoint directly. The
//! scheduler queues popular pairs, and the worker writes the fetched rates
//! so later lookups are served from the cache.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use fxrate_api::{AppConfig, AppServices, CredentialConfig, HttpRateSource, HttpTokenIssuer};
use fxrate_core::{ConversionState, Pair, SchedulerConfig, WorkerConfig};
use fxrate_storage::{InMemoryCache, InMemoryQueue, MarkerStore};
use serde_json::json;
use support::body_json;

#[derive(Default)]
struct Upstream {
    tokens_issued: AtomicUsize,
    rate_calls: AtomicUsize,
}

async fn issue_token(State(upstream): State<Arc<Upstream>>, body: String) -> Response {
    if !body.contains("grant_type=client_credentials") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let n = upstream.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "access_token": format!("upstream-{}", n), "expires_in": 3600 })).into_response()
}

async fn rate(
    State(upstream): State<Arc<Upstream>>,
    Path(pair): Path<String>,
    headers: HeaderMap,
) -> Response {
    upstream.rate_calls.fetch_add(1, Ordering::SeqCst);
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !bearer.starts_with("Bearer upstream-") {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match pair.as_str() {
        "EUR_CHF" => Json(json!({ "rate": 0.95, "source": "snb" })).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn serve_upstream(upstream: Arc<Upstream>) -> String {
    let router = Router::new()
        .route("/oauth/token", post(issue_token))
        .route("/rates/:pair", get(rate))
        .with_state(upstream);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}

struct Flow {
    upstream: Arc<Upstream>,
    cache: Arc<InMemoryCache>,
    queue: Arc<InMemoryQueue>,
    services: AppServices,
}

async fn flow(scheduler: SchedulerConfig) -> Flow {
    let upstream = Arc::new(Upstream::default());
    let base = serve_upstream(upstream.clone()).await;

    let config = AppConfig {
        credentials: CredentialConfig {
            token_url: format!("{}/oauth/token", base),
            ..Default::default()
        },
        scheduler,
        worker: WorkerConfig {
            wait_time: Duration::from_millis(100),
            ..Default::default()
        },
        ..Default::default()
    };

    let client = reqwest::Client::new();
    let issuer = Arc::new(HttpTokenIssuer::with_client(
        client.clone(),
        &config.credentials,
    ));
    let source = Arc::new(HttpRateSource::with_client(client, format!("{}/rates", base)));
    let cache = Arc::new(InMemoryCache::new());
    let queue = Arc::new(InMemoryQueue::new(Duration::from_secs(5)));
    let services = AppServices::new(config, cache.clone(), queue.clone(), issuer, source);

    Flow {
        upstream,
        cache,
        queue,
        services,
    }
}

async fn convert(services: &AppServices, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = support::get(&services.router(), uri).await;
    let status = response.status();
    (status, body_json(response).await)
}

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn test_worker_populates_cache_after_miss() {
    let f = flow(SchedulerConfig {
        period: Duration::from_secs(3600),
        ..Default::default()
    })
    .await;

    // Unknown upstream: queued for refresh.
    let (status, body) = convert(&f.services, "/convert?from=XAU&to=CHF&amount=1").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["state"], "UNAVAILABLE");

    // EUR_CHF is known upstream, so the first lookup is a fallback.
    let (status, body) = convert(&f.services, "/convert?from=EUR&to=CHF&amount=100").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "FALLBACK");
    assert_eq!(body["source"], "snb");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let jobs = f.services.spawn_jobs(shutdown_rx);

    // The lookup queued XAU_CHF; the first scheduler tick queues EUR_CHF.
    let markers = MarkerStore::new(f.cache.clone());
    let pairs = vec![Pair::new("XAU", "CHF"), Pair::new("EUR", "CHF")];
    wait_until(|| {
        let markers = markers.clone();
        let pairs = pairs.clone();
        async move {
            for pair in &pairs {
                if !matches!(
                    markers.last_refresh(pair).await,
                    Ok(fxrate_storage::LastRefresh::At(_))
                ) {
                    return false;
                }
            }
            true
        }
    })
    .await;

    shutdown_tx.send(true).unwrap();
    jobs.join().await;

    assert_eq!(f.queue.ready_len().await, 0);
    assert_eq!(f.queue.in_flight_len().await, 0);
    // One token serves the lookups, the worker and the proactive check.
    assert_eq!(f.upstream.tokens_issued.load(Ordering::SeqCst), 1);
    assert!(fxrate_storage::RateCache::new(f.cache.clone())
        .get(&Pair::new("EUR", "CHF"))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_scheduler_refreshes_popular_pair_and_lookup_hits_cache() {
    let f = flow(SchedulerConfig {
        period: Duration::from_millis(50),
        refresh_interval: Duration::from_secs(60),
        ..Default::default()
    })
    .await;

    let (_, body) = convert(&f.services, "/convert?from=EUR&to=CHF&amount=10").await;
    assert_eq!(body["state"], "FALLBACK");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let jobs = f.services.spawn_jobs(shutdown_rx);

    let rates = fxrate_storage::RateCache::new(f.cache.clone());
    let pair = Pair::new("EUR", "CHF");
    wait_until(|| {
        let rates = rates.clone();
        let pair = pair.clone();
        async move { matches!(rates.get(&pair).await, Ok(Some(_))) }
    })
    .await;

    let (status, body) = convert(&f.services, "/convert?from=EUR&to=CHF&amount=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], ConversionState::Cached.as_str());
    assert_eq!(body["rate"], 0.95);

    // Freshly refreshed and still popular: later ticks must not re-queue it.
    let calls = f.upstream.rate_calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(f.upstream.rate_calls.load(Ordering::SeqCst), calls);

    shutdown_tx.send(true).unwrap();
    jobs.join().await;
}
