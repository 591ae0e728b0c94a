use super::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Offline researcher returning fixed text
#[derive(Default)]
pub struct CannedResearcher {
    text: Option<String>,
    delay: Option<Duration>,
    failing: AtomicBool,
    lookups: AtomicUsize,
}

impl CannedResearcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with `text` instead of a generated one-liner
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sleep before answering, to widen race windows in tests
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopicResearcher for CannedResearcher {
    async fn lookup(&self, theme: &str, topic: &str) -> ResearchResult<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ResearchError::Unavailable("canned failure".to_string()));
        }
        Ok(self
            .text
            .clone()
            .unwrap_or_else(|| format!("{} is a topic from the theme {}.", topic, theme)))
    }
}
