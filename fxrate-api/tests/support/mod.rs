//! Shared harness for router-level tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use fxrate_api::{AppConfig, AppServices};
use fxrate_core::Pair;
use fxrate_storage::{
    InMemoryCache, InMemoryQueue, KeyValueCache, RateCache, RefreshQueue, UsageTracker,
};
use fxrate_test_utils::{MockRateSource, MockTokenIssuer};
use tower::ServiceExt;

pub struct TestApp {
    pub cache: Arc<InMemoryCache>,
    pub queue: Arc<InMemoryQueue>,
    pub source: Arc<MockRateSource>,
    pub issuer: Arc<MockTokenIssuer>,
    pub services: AppServices,
    pub router: Router,
}

impl TestApp {
    pub fn new(source: MockRateSource) -> Self {
        Self::with_config(source, AppConfig::default())
    }

    pub fn with_config(source: MockRateSource, config: AppConfig) -> Self {
        let cache = Arc::new(InMemoryCache::new());
        let queue = Arc::new(InMemoryQueue::default());
        let source = Arc::new(source);
        let issuer = Arc::new(MockTokenIssuer::new());
        let services = AppServices::new(
            config,
            cache.clone(),
            queue.clone(),
            issuer.clone(),
            source.clone(),
        );
        let router = services.router();
        Self {
            cache,
            queue,
            source,
            issuer,
            services,
            router,
        }
    }

    /// Router over a caller-supplied cache and queue.
    pub fn with_collaborators(
        source: MockRateSource,
        cache: Arc<dyn KeyValueCache>,
        queue: Arc<dyn RefreshQueue>,
    ) -> Router {
        AppServices::new(
            AppConfig::default(),
            cache,
            queue,
            Arc::new(MockTokenIssuer::new()),
            Arc::new(source),
        )
        .router()
    }

    pub fn rates(&self) -> RateCache {
        RateCache::new(self.cache.clone())
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        get(&self.router, uri).await
    }

    /// Usage score once detached increments have run, or the last value
    /// seen if `expected` is never reached.
    pub async fn settled_score(&self, pair: &Pair, expected: f64) -> f64 {
        let usage = UsageTracker::new(self.cache.clone());
        let mut score = 0.0;
        for _ in 0..100 {
            score = usage.score(pair).await.unwrap();
            if score == expected {
                break;
            }
            tokio::task::yield_now().await;
        }
        score
    }
}

pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
