mod html;

use async_trait::async_trait;
use lyricwatch_core::{cache_key_for, CoreError, LyricsProvider, LyricsResult, Track};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::time::Duration;
use tracing::{debug, info, warn};

const SEARCH_URL: &str = "https://search.azlyrics.com/search.php";

/// Song pages are only trusted under these prefixes
const LYRICS_URL_PREFIXES: &[&str] = &[
    "https://www.azlyrics.com/lyrics/",
    "http://www.azlyrics.com/lyrics/",
];

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 2;

/// The site answers bots with a captcha page
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// AZLyrics lyrics provider: search page, then the first song page it links to.
pub struct AzlyricsProvider {
    client: ClientWithMiddleware,
}

impl AzlyricsProvider {
    /// Create a new AZLyrics provider with default 10-second timeout and 2 retries.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self, CoreError> {
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(USER_AGENT)
            .build()?;

        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(DEFAULT_MAX_RETRIES);
        let client = ClientBuilder::new(base_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client })
    }

    async fn get_page(&self, url: &str) -> Result<String, CoreError> {
        debug!("AZLyrics GET: {}", url);
        let response = self.client.get(url).send().await?;
        debug!("AZLyrics response status: {}", response.status());

        if !response.status().is_success() {
            warn!("AZLyrics returned status: {}", response.status());
            return Err(CoreError::ProviderFailed {
                provider: self.name().to_string(),
                reason: format!("AZLyrics returned status: {}", response.status()),
            });
        }

        Ok(response.text().await?)
    }
}

/// Header shown above the lyrics: `<song> by <artist>`, then a blank line.
///
/// Song and artist come from the page, falling back to what the player reported.
fn render(page: &str, track: &Track, lyrics: &str) -> String {
    let song = html::extract_title(page).unwrap_or_else(|| track.name.clone());
    let artist = html::extract_artist(page).unwrap_or_else(|| track.artist.trim().to_string());
    if artist.is_empty() {
        format!("{song}\n\n{lyrics}")
    } else {
        format!("{song} by {artist}\n\n{lyrics}")
    }
}

#[async_trait]
impl LyricsProvider for AzlyricsProvider {
    fn name(&self) -> &'static str {
        "azlyrics"
    }

    fn cache_key(&self, track: &Track) -> Option<String> {
        cache_key_for(track)
    }

    async fn fetch(&self, track: &Track) -> Result<LyricsResult, CoreError> {
        info!("Searching AZLyrics for: {}", track);

        let search_url = format!("{SEARCH_URL}?q={}", urlencoding::encode(&track.query()));
        let search_page = self.get_page(&search_url).await?;

        let links = html::lyrics_links(&search_page, LYRICS_URL_PREFIXES);
        let Some(song_url) = links.first() else {
            info!("AZLyrics search returned no song pages");
            return Ok(LyricsResult::NotFound);
        };

        info!("AZLyrics song page: {} ({} candidates)", song_url, links.len());
        let song_page = self.get_page(song_url).await?;

        match html::extract_lyrics(&song_page) {
            Some(lyrics) => Ok(LyricsResult::Found(render(&song_page, track, &lyrics))),
            None => {
                warn!("No lyrics block on {}", song_url);
                Ok(LyricsResult::NotFound)
            }
        }
    }
}
