use async_trait::async_trait;
use lyricwatch_core::{CoreError, LyricsProvider, LyricsResult, Track};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const LRCLIB_API_URL: &str = "https://lrclib.net/api";

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 3;

/// LRCLIB.net lyrics provider
pub struct LrclibProvider {
    client: ClientWithMiddleware,
    base_url: String,
}

impl LrclibProvider {
    /// Create a new LRCLIB provider with default 10-second timeout and 3 retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, CoreError> {
        Self::with_base_url(LRCLIB_API_URL)
    }

    /// Create a provider talking to another LRCLIB instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, CoreError> {
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("lyricwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Wrap with retry middleware (exponential backoff)
        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(DEFAULT_MAX_RETRIES);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

/// Response from LRCLIB API
/// Note: API returns additional fields (albumName, duration) that we don't use;
/// serde ignores unknown fields by default.
#[derive(Debug, Deserialize)]
struct LrclibResponse {
    id: i64,
    #[serde(rename = "trackName", default)]
    track_name: String,
    #[serde(rename = "artistName", default)]
    artist_name: String,
    #[serde(default)]
    instrumental: bool,
    #[serde(rename = "plainLyrics")]
    plain_lyrics: Option<String>,
    #[serde(rename = "syncedLyrics")]
    synced_lyrics: Option<String>,
}

#[async_trait]
impl LyricsProvider for LrclibProvider {
    fn name(&self) -> &'static str {
        "lrclib"
    }

    async fn fetch(&self, track: &Track) -> Result<LyricsResult, CoreError> {
        info!("Fetching lyrics from LRCLIB for: {}", track);

        // Exact match on artist + track first
        let url = format!(
            "{}/get?artist_name={}&track_name={}",
            self.base_url,
            urlencoding::encode(&track.artist),
            urlencoding::encode(&track.name)
        );

        debug!("LRCLIB GET (exact match): {}", url);

        let response = self.client.get(&url).send().await?;
        debug!("LRCLIB response status: {}", response.status());

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            info!("LRCLIB exact match not found, trying search");
            return self.search(track).await;
        }

        if !response.status().is_success() {
            warn!("LRCLIB returned status: {}", response.status());
            return Err(self.failed(format!("LRCLIB returned status: {}", response.status())));
        }

        let result: LrclibResponse = response.json().await?;
        info!("LRCLIB found match with id: {}", result.id);
        Ok(parse_response(result))
    }
}

impl LrclibProvider {
    /// Free-text search with the provider query, taking the first usable hit
    async fn search(&self, track: &Track) -> Result<LyricsResult, CoreError> {
        let url = format!(
            "{}/search?q={}",
            self.base_url,
            urlencoding::encode(&track.query())
        );

        debug!("LRCLIB GET (search): {}", url);

        let response = self.client.get(&url).send().await?;
        debug!("LRCLIB response status: {}", response.status());

        if !response.status().is_success() {
            return Err(self.failed(format!(
                "LRCLIB search returned status: {}",
                response.status()
            )));
        }

        let results: Vec<LrclibResponse> = response.json().await?;
        Ok(pick_search_result(results))
    }

    fn failed(&self, reason: String) -> CoreError {
        CoreError::ProviderFailed {
            provider: self.name().to_string(),
            reason,
        }
    }
}

/// First search hit with lyrics; hits with plain text win over synced-only ones.
fn pick_search_result(results: Vec<LrclibResponse>) -> LyricsResult {
    let best = results
        .into_iter()
        .filter(|r| !r.instrumental && (has_text(&r.plain_lyrics) || has_text(&r.synced_lyrics)))
        .min_by_key(|r| u8::from(!has_text(&r.plain_lyrics)));

    match best {
        Some(result) => {
            info!(
                "LRCLIB found match via search (id: {}, {} - {})",
                result.id, result.track_name, result.artist_name
            );
            parse_response(result)
        }
        None => LyricsResult::NotFound,
    }
}

fn has_text(lyrics: &Option<String>) -> bool {
    lyrics.as_deref().is_some_and(|text| !text.trim().is_empty())
}

fn parse_response(result: LrclibResponse) -> LyricsResult {
    if result.instrumental {
        debug!("Track is instrumental (lrclib id: {})", result.id);
        return LyricsResult::NotFound;
    }

    // Prefer plain lyrics
    if let Some(plain) = result.plain_lyrics.filter(|p| !p.trim().is_empty()) {
        debug!("Got plain lyrics (lrclib id: {})", result.id);
        return LyricsResult::from_text(plain.trim_end());
    }

    // Fall back to synced lyrics without their timestamps
    if let Some(synced) = result.synced_lyrics {
        debug!("Got synced lyrics only (lrclib id: {})", result.id);
        return LyricsResult::from_text(strip_timestamps(&synced));
    }

    LyricsResult::NotFound
}

/// Drop the leading `[mm:ss.xx]` tags of every LRC line.
fn strip_timestamps(synced: &str) -> String {
    synced
        .lines()
        .map(|line| {
            let mut rest = line.trim_start();
            while let Some(tag) = rest.strip_prefix('[') {
                match tag.split_once(']') {
                    Some((stamp, after)) if is_timestamp(stamp) => rest = after,
                    _ => break,
                }
            }
            rest.trim()
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn is_timestamp(stamp: &str) -> bool {
    !stamp.is_empty() && stamp.chars().all(|c| c.is_ascii_digit() || c == ':' || c == '.')
}
