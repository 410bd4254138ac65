//! Shared fixtures for the engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rigenera::application::coordinator::RequestCoordinator;
use rigenera::application::observer::RegenObserver;
use rigenera::application::regen::{RegenError, RegenerationService};
use rigenera::application::renderer::{RenderError, RenderedPage, Renderer};
use rigenera::cache::config::EngineConfig;
use rigenera::cache::registry::{FallbackPolicy, PathRegistry};
use rigenera::cache::store::{ArtifactStore, MemoryStore};
use rigenera::domain::artifact::{Artifact, Generation, Revalidate};
use rigenera::domain::key::RouteKey;
use time::OffsetDateTime;

/// What the scripted renderer should do on the next calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Succeed,
    Fail,
    NotFound,
}

/// Renderer test double: counts calls, optionally sleeps, and answers
/// according to its current mode.
pub struct ScriptedRenderer {
    calls: AtomicUsize,
    delay: Duration,
    mode: std::sync::Mutex<RenderMode>,
    revalidate: Option<Revalidate>,
}

impl ScriptedRenderer {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            mode: std::sync::Mutex::new(RenderMode::Succeed),
            revalidate: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_mode(self, mode: RenderMode) -> Self {
        *self.mode.lock().unwrap() = mode;
        self
    }

    pub fn with_revalidate(mut self, revalidate: Revalidate) -> Self {
        self.revalidate = Some(revalidate);
        self
    }

    pub fn set_mode(&self, mode: RenderMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn render(&self, key: &RouteKey) -> Result<RenderedPage, RenderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match *self.mode.lock().unwrap() {
            RenderMode::Succeed => {
                let mut page = RenderedPage::new(format!("render #{call} of {key}"));
                page.revalidate = self.revalidate;
                Ok(page)
            }
            RenderMode::Fail => Err(RenderError::failed("scripted failure")),
            RenderMode::NotFound => Err(RenderError::not_found(key)),
        }
    }
}

/// Observer test double counting outcomes.
#[derive(Default)]
pub struct CountingObserver {
    successes: AtomicUsize,
    failures: AtomicUsize,
}

impl CountingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn successes(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl RegenObserver for CountingObserver {
    fn regeneration_succeeded(&self, _key: &RouteKey, _duration: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn regeneration_failed(&self, _key: &RouteKey, _error: &RegenError) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }
}

/// A store that always fails, for outage propagation tests.
pub struct UnavailableStore;

#[async_trait]
impl ArtifactStore for UnavailableStore {
    async fn get(
        &self,
        _key: &RouteKey,
    ) -> Result<Option<Arc<Artifact>>, rigenera::cache::store::StoreError> {
        Err(rigenera::cache::store::StoreError::unavailable(
            "backing store offline",
        ))
    }

    async fn put_if_newer(
        &self,
        _key: RouteKey,
        _artifact: Arc<Artifact>,
    ) -> Result<rigenera::cache::store::Commit, rigenera::cache::store::StoreError> {
        Err(rigenera::cache::store::StoreError::unavailable(
            "backing store offline",
        ))
    }

    async fn evict(
        &self,
        _key: &RouteKey,
    ) -> Result<bool, rigenera::cache::store::StoreError> {
        Err(rigenera::cache::store::StoreError::unavailable(
            "backing store offline",
        ))
    }
}

/// Fully wired engine over a memory store.
pub struct TestEngine {
    pub coordinator: Arc<RequestCoordinator>,
    pub store: Arc<MemoryStore>,
    pub registry: Arc<PathRegistry>,
    pub renderer: Arc<ScriptedRenderer>,
    pub observer: Arc<CountingObserver>,
}

pub struct EngineOptions {
    pub fallback: FallbackPolicy,
    pub known: Vec<&'static str>,
    pub default_revalidate: Revalidate,
    pub max_regen: Duration,
    pub renderer: ScriptedRenderer,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            fallback: FallbackPolicy::Block,
            known: Vec::new(),
            default_revalidate: Revalidate::AfterSeconds(10),
            max_regen: Duration::from_secs(30),
            renderer: ScriptedRenderer::new(),
        }
    }
}

pub fn engine(options: EngineOptions) -> TestEngine {
    let config = EngineConfig {
        default_revalidate: options.default_revalidate,
        fallback: options.fallback,
        max_regen_duration: options.max_regen,
        ..Default::default()
    };

    let store = Arc::new(MemoryStore::new(&config));
    let registry = Arc::new(PathRegistry::with_known(options.fallback, options.known));
    let renderer = Arc::new(options.renderer);
    let observer = Arc::new(CountingObserver::new());

    let regen = Arc::new(RegenerationService::new(
        &config,
        Arc::clone(&renderer) as Arc<dyn Renderer>,
        Arc::clone(&store) as Arc<dyn ArtifactStore>,
        Arc::clone(&observer) as Arc<dyn RegenObserver>,
    ));
    let coordinator = Arc::new(RequestCoordinator::new(
        Arc::clone(&store) as Arc<dyn ArtifactStore>,
        Arc::clone(&registry),
        regen,
    ));

    TestEngine {
        coordinator,
        store,
        registry,
        renderer,
        observer,
    }
}

/// Insert an artifact whose production time lies `age_secs` in the past.
pub async fn seed_artifact(
    store: &MemoryStore,
    key: &str,
    body: &str,
    age_secs: i64,
    revalidate: Revalidate,
    generation: Generation,
) {
    let artifact = Artifact {
        payload: Bytes::from(body.to_string()),
        produced_at: OffsetDateTime::now_utc() - time::Duration::seconds(age_secs),
        revalidate,
        generation,
    };
    store
        .put_if_newer(RouteKey::from(key), Arc::new(artifact))
        .await
        .expect("seed artifact");
}

/// Poll the store until `key` reaches `min_generation`, bounded by a
/// timeout.
pub async fn wait_for_generation(store: &MemoryStore, key: &str, min_generation: Generation) {
    let key = RouteKey::from(key);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        if let Ok(Some(artifact)) = store.get(&key).await {
            if artifact.generation >= min_generation {
                return;
            }
        }
        if tokio::time::Instant::now() > deadline {
            panic!("artifact for {key} never reached generation {min_generation}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
