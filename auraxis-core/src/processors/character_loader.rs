//! CharacterLoader processor.
//!
//! The CharacterLoader is responsible for:
//! - Receiving single-character lookups through a [`CharacterLoaderHandle`]
//! - Answering from a TTL cache when possible
//! - Collecting misses for a short window and resolving them with one
//!   [`CharacterResolver`] round-trip
//!
//! A batch is sent when its window elapses or when it reaches the configured
//! maximum size, whichever comes first. A batch still waiting on the
//! resolver when shutdown arrives is abandoned and its callers see
//! [`LoadError::Closed`].

use crate::config::LoaderConfig;
use crate::utils::shutdown_requested;
use async_trait::async_trait;
use auraxis_sdk::objects::Character;
use compact_str::CompactString;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Errors reported by an identity source.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The source could not be reached or answered with a failure
    #[error("identity source unavailable: {0}")]
    Unavailable(String),

    /// The source answered with something that could not be understood
    #[error("identity source returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors returned to callers of [`CharacterLoaderHandle::load`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The identity source does not know this character
    #[error("character not found: {0}")]
    NotFound(CompactString),

    /// The lookup for this character's batch failed
    #[error("character lookup failed: {0}")]
    Resolve(String),

    /// The loader has shut down
    #[error("character loader is not running")]
    Closed,
}

/// Source of character identities.
///
/// Implementations may return fewer characters than requested; missing ids
/// are reported to callers as [`LoadError::NotFound`].
#[async_trait]
pub trait CharacterResolver: Send + Sync {
    async fn resolve_characters(
        &self,
        ids: &[CompactString],
    ) -> Result<HashMap<CompactString, Character>, ResolveError>;
}

struct LoadRequest {
    id: CompactString,
    reply: oneshot::Sender<Result<Character, LoadError>>,
}

/// Cloneable front end of a running [`CharacterLoader`].
#[derive(Clone)]
pub struct CharacterLoaderHandle {
    tx: mpsc::Sender<LoadRequest>,
}

impl CharacterLoaderHandle {
    pub async fn load(&self, id: CompactString) -> Result<Character, LoadError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LoadRequest { id, reply })
            .await
            .map_err(|_| LoadError::Closed)?;
        rx.await.map_err(|_| LoadError::Closed)?
    }
}

/// Batches and caches lookups against a [`CharacterResolver`].
pub struct CharacterLoader {
    resolver: Arc<dyn CharacterResolver>,
    config: LoaderConfig,
    cache: HashMap<CompactString, (Character, Instant)>,
    pending: HashMap<CompactString, Vec<oneshot::Sender<Result<Character, LoadError>>>>,
    rx: mpsc::Receiver<LoadRequest>,
}

impl CharacterLoader {
    /// Create a loader and the handle used to query it.
    pub fn new(
        resolver: Arc<dyn CharacterResolver>,
        config: LoaderConfig,
    ) -> (Self, CharacterLoaderHandle) {
        let (tx, rx) = mpsc::channel(crate::events::DEFAULT_CHANNEL_BUFFER);
        let loader = Self {
            resolver,
            config,
            cache: HashMap::new(),
            pending: HashMap::new(),
            rx,
        };
        (loader, CharacterLoaderHandle { tx })
    }

    /// Run the loader until shutdown or until every handle is dropped.
    ///
    /// Lookups still waiting when the loader stops fail with
    /// [`LoadError::Closed`].
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            batch_window = ?self.config.batch_window,
            max_batch = self.config.max_batch,
            "CharacterLoader started"
        );

        let mut deadline: Option<Instant> = None;

        loop {
            let flush_at = deadline.unwrap_or_else(Instant::now);

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("CharacterLoader received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep_until(flush_at), if deadline.is_some() => {
                    deadline = None;
                    if !self.flush(&mut shutdown_rx).await {
                        break;
                    }
                }

                Some(request) = self.rx.recv() => {
                    if self.enqueue(request) && deadline.is_none() {
                        deadline = Some(Instant::now() + self.config.batch_window);
                    }
                    if self.pending.len() >= self.config.max_batch.max(1) {
                        deadline = None;
                        if !self.flush(&mut shutdown_rx).await {
                            break;
                        }
                    }
                }

                else => {
                    info!("CharacterLoader request channel closed");
                    break;
                }
            }
        }

        // Dropping the reply senders fails the waiting lookups.
        self.pending.clear();
        info!("CharacterLoader shutdown complete");
    }

    /// Answer from cache or queue for the next batch. Returns `true` when queued.
    fn enqueue(&mut self, request: LoadRequest) -> bool {
        if let Some((character, cached_at)) = self.cache.get(&request.id) {
            if cached_at.elapsed() < self.config.cache_ttl {
                let _ = request.reply.send(Ok(character.clone()));
                return false;
            }
            self.cache.remove(&request.id);
        }
        self.pending.entry(request.id).or_default().push(request.reply);
        true
    }

    /// Resolve the pending batch. Returns `false` when shutdown arrived
    /// before the resolver answered.
    async fn flush(&mut self, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
        if self.pending.is_empty() {
            return true;
        }
        let batch = std::mem::take(&mut self.pending);
        let ids: Vec<CompactString> = batch.keys().cloned().collect();
        debug!(count = ids.len(), "Resolving character batch");

        let resolver = Arc::clone(&self.resolver);
        let outcome = tokio::select! {
            biased;

            _ = shutdown_requested(shutdown_rx) => None,
            result = resolver.resolve_characters(&ids) => Some(result),
        };
        let Some(outcome) = outcome else {
            info!(count = ids.len(), "CharacterLoader received shutdown signal, abandoning batch");
            return false;
        };

        match outcome {
            Ok(mut found) => {
                let now = Instant::now();
                for (id, replies) in batch {
                    let result = match found.remove(&id) {
                        Some(character) => {
                            self.cache.insert(id, (character.clone(), now));
                            Ok(character)
                        }
                        None => Err(LoadError::NotFound(id)),
                    };
                    for reply in replies {
                        let _ = reply.send(result.clone());
                    }
                }
            }
            Err(e) => {
                warn!(count = ids.len(), error = %e, "Character batch lookup failed");
                let error = LoadError::Resolve(e.to_string());
                for reply in batch.into_values().flatten() {
                    let _ = reply.send(Err(error.clone()));
                }
            }
        }

        self.evict_expired();
        true
    }

    fn evict_expired(&mut self) {
        let ttl = self.config.cache_ttl;
        self.cache.retain(|_, (_, cached_at)| cached_at.elapsed() < ttl);
    }
}
