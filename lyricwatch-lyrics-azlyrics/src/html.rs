//! Just enough HTML handling to read AZLyrics pages.

/// Marker comment that precedes the lyrics block on a song page
const LYRICS_MARKER: &str = "<!-- Usage of azlyrics.com content";

/// Song page links in a search results page, in page order, without duplicates.
pub fn lyrics_links(page: &str, prefixes: &[&str]) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    let mut rest = page;

    while let Some(pos) = rest.find("href=") {
        rest = &rest[pos + "href=".len()..];
        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        rest = &rest[1..];
        let Some(end) = rest.find(quote) else {
            break;
        };

        let href = decode_entities(&rest[..end]);
        rest = &rest[end..];

        if prefixes.iter().any(|prefix| href.starts_with(prefix)) && !links.contains(&href) {
            links.push(href);
        }
    }

    links
}

/// Plain-text lyrics from a song page, or `None` when the page has no lyrics block.
pub fn extract_lyrics(page: &str) -> Option<String> {
    let start = page.find(LYRICS_MARKER)?;
    let after_marker = &page[start..];
    let comment_end = after_marker.find("-->")? + "-->".len();
    let body = &after_marker[comment_end..];
    let end = body.find("</div>").unwrap_or(body.len());

    let text = to_text(&body[..end]);
    (!text.is_empty()).then_some(text)
}

/// Title of a song page's lyrics header, e.g. `"Bohemian Rhapsody" lyrics`.
pub fn extract_title(page: &str) -> Option<String> {
    let title = heading_text(page, "h1")?;
    let title = strip_lyrics_suffix(&title).trim_matches('"').trim();
    (!title.is_empty()).then(|| title.to_string())
}

/// Artist named in a song page's banner, e.g. `Queen Lyrics`.
pub fn extract_artist(page: &str) -> Option<String> {
    let artist = heading_text(page, "h2")?;
    let artist = strip_lyrics_suffix(&artist);
    (!artist.is_empty()).then(|| artist.to_string())
}

fn heading_text(page: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let start = page.find(&open)? + open.len();
    let end = page[start..].find(&format!("</{tag}>"))? + start;
    Some(to_text(&page[start..end]))
}

fn strip_lyrics_suffix(text: &str) -> &str {
    let text = text.trim();
    let cut = text.len().saturating_sub("lyrics".len());
    match text.get(cut..) {
        Some(suffix) if suffix.eq_ignore_ascii_case("lyrics") => text[..cut].trim(),
        _ => text,
    }
}

/// Flatten an HTML fragment: `<br>` becomes a line break, other tags are
/// dropped and entities decoded. Source line breaks count as plain spaces.
pub fn to_text(fragment: &str) -> String {
    fn push_source(text: &mut String, source: &str) {
        text.extend(source.chars().map(|c| if c == '\r' || c == '\n' { ' ' } else { c }));
    }

    let mut text = String::with_capacity(fragment.len());
    let mut rest = fragment;

    while let Some(open) = rest.find('<') {
        push_source(&mut text, &rest[..open]);
        let Some(close) = rest[open..].find('>') else {
            rest = "";
            break;
        };
        let tag = rest[open + 1..open + close].trim().to_ascii_lowercase();
        if tag.starts_with("br") || tag == "/p" || tag == "/div" {
            text.push('\n');
        }
        rest = &rest[open + close + 1..];
    }
    push_source(&mut text, rest);

    decode_entities(&text)
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Decode the named entities AZLyrics uses plus numeric character references.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => entity.strip_prefix('#').and_then(|code| {
                    let value = code
                        .strip_prefix(['x', 'X'])
                        .map_or_else(|| code.parse().ok(), |hex| u32::from_str_radix(hex, 16).ok());
                    value.and_then(char::from_u32)
                }),
            };
            c.map(|c| (c, end))
        });

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
