//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;

use crate::catalog::{Catalog, OrderLedger};
use crate::config::AssistantConfig;
use crate::imaging::ProductImages;
use crate::line::LineClient;
use crate::llm::{ChatModel, LlmError, build_model};
use crate::services::{ConversationService, ImageCache, SessionStore};
use crate::tools::ToolExecutor;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// conversation service, the LINE client, the reply image cache and the
/// tracker for in-flight reply tasks.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AssistantConfig,
    conversation: ConversationService,
    line: LineClient,
    images: ImageCache,
    replies: TaskTracker,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("conversation", &self.inner.conversation)
            .field("images", &self.inner.images)
            .field("pending_replies", &self.inner.replies.len())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create application state with the chat model named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat model client cannot be built.
    pub fn new(config: AssistantConfig) -> Result<Self, LlmError> {
        let model = build_model(&config.llm)?;
        Ok(Self::with_model(config, model))
    }

    /// Create application state around an already-built chat model.
    #[must_use]
    pub fn with_model(config: AssistantConfig, model: Arc<dyn ChatModel>) -> Self {
        let executor = ToolExecutor::new(
            Arc::new(Catalog::demo()),
            OrderLedger::demo(config.ledger),
            ProductImages::new(config.assets_dir.clone()),
            config.demo_today,
        );
        let conversation = ConversationService::new(
            model,
            executor,
            SessionStore::new(config.sessions),
            config.conversation,
        );
        let line = LineClient::new(&config.line);
        let images = ImageCache::new(config.image_cache_ttl);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                conversation,
                line,
                images,
                replies: TaskTracker::new(),
            }),
        }
    }

    /// Get a reference to the assistant configuration.
    #[must_use]
    pub fn config(&self) -> &AssistantConfig {
        &self.inner.config
    }

    /// Get a reference to the conversation service.
    #[must_use]
    pub fn conversation(&self) -> &ConversationService {
        &self.inner.conversation
    }

    /// Get a reference to the LINE Messaging API client.
    #[must_use]
    pub fn line(&self) -> &LineClient {
        &self.inner.line
    }

    /// Get a reference to the reply image cache.
    #[must_use]
    pub fn images(&self) -> &ImageCache {
        &self.inner.images
    }

    /// Run a reply task in the background, tracked for shutdown.
    pub fn spawn_reply<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.inner.replies.spawn(task);
    }

    /// Close the reply tracker and wait up to `deadline` for in-flight
    /// replies to finish.
    ///
    /// Returns `false` if replies were still running at the deadline.
    pub async fn drain_replies(&self, deadline: Duration) -> bool {
        self.inner.replies.close();
        let pending = self.inner.replies.len();
        if pending > 0 {
            tracing::info!(pending, "Waiting for in-flight replies");
        }
        tokio::time::timeout(deadline, self.inner.replies.wait())
            .await
            .is_ok()
    }
}
