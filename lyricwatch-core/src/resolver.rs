//! Lyrics resolver that walks the provider list behind the lyrics cache.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::LyricsCache;
use crate::provider::{LyricsProvider, LyricsResult};
use crate::track::Track;

/// Resolves lyrics for a track from the cache or the first provider that has them.
pub struct LyricsResolver {
    providers: Vec<Box<dyn LyricsProvider>>,
    cache: Option<Arc<dyn LyricsCache>>,
}

impl LyricsResolver {
    /// Create a new lyrics resolver
    ///
    /// # Arguments
    /// * `providers` - Lyrics providers to try in order; the first one owns the cache key
    /// * `cache` - Lyrics cache, or `None` to always go to the providers
    pub fn new(
        providers: Vec<Box<dyn LyricsProvider>>,
        cache: Option<Arc<dyn LyricsCache>>,
    ) -> Self {
        Self { providers, cache }
    }

    /// Names of the configured providers, in priority order
    #[must_use]
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Resolve lyrics for a track.
    ///
    /// Returns `None` when no provider had lyrics. Provider and cache failures
    /// are logged and otherwise treated like a miss.
    pub async fn resolve(&self, track: &Track) -> Option<String> {
        let provider_names = self.provider_names();
        info!(
            "Resolving lyrics for: {} (providers: {:?})",
            track, provider_names
        );

        let cache_key = self
            .providers
            .first()
            .and_then(|primary| primary.cache_key(track));
        let cache = self.cache.as_ref().zip(cache_key.as_deref());

        if let Some((cache, key)) = cache {
            match cache.get(key).await {
                Ok(Some(content)) if !content.is_empty() => match String::from_utf8(content) {
                    Ok(lyrics) => {
                        info!("Using cached lyrics for {}", track);
                        return Some(lyrics);
                    }
                    Err(_) => debug!("Cached lyrics under {} are not UTF-8, ignoring", key),
                },
                Ok(_) => debug!("No cached lyrics under {}", key),
                Err(e) => debug!("Cache read for {} failed: {}", key, e),
            }
        }

        let lyrics = self.fetch_from_providers(track).await?;

        if let Some((cache, key)) = cache {
            if let Err(e) = cache.put(key, lyrics.as_bytes()).await {
                warn!("Failed to cache lyrics: {}", e);
            }
        }

        Some(lyrics)
    }

    async fn fetch_from_providers(&self, track: &Track) -> Option<String> {
        for provider in &self.providers {
            debug!("Trying provider: {}", provider.name());
            match provider.fetch(track).await {
                Ok(LyricsResult::Found(text)) if !text.trim().is_empty() => {
                    info!("Found lyrics from {}", provider.name());
                    return Some(text);
                }
                Ok(_) => {
                    info!("Provider {} returned no lyrics", provider.name());
                }
                Err(e) => {
                    warn!("Provider {} failed with error: {}", provider.name(), e);
                }
            }
        }

        info!(
            "No lyrics found for {} (tried {} providers)",
            track,
            self.providers.len()
        );
        None
    }
}
