//! Parsing of user-supplied references: link extraction, identifiers,
//! YouTube video ids and `t=` timecodes.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

static ANCHOR_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("anchor regex")
});

/// The reference a user meant: the first link's `href` if the message is
/// markup, otherwise the trimmed text itself.
pub fn canonicalize(input: &str) -> String {
    if let Some(caps) = ANCHOR_HREF.captures(input) {
        if let Some(href) = caps.get(1).or_else(|| caps.get(2)) {
            return decode_entities(href.as_str().trim());
        }
    }
    input.trim().to_string()
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Track identifier: lowercase hex SHA-256 of the canonical reference.
pub fn identifier(canonical: &str) -> String {
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Parse `reference` as a URL, assuming `http://` when the scheme is missing.
fn parse_url(reference: &str) -> Option<Url> {
    Url::parse(reference)
        .ok()
        .filter(|u| u.has_host())
        .or_else(|| Url::parse(&format!("http://{reference}")).ok())
}

/// Extract the video id from the usual YouTube URL shapes.
///
/// `youtube.*/watch?v=ID`, `youtube.*/embed/ID`, `youtube.*/v/ID` and
/// `youtu.be/ID`. Anything else, including `youtu.be/watch?v=ID`, is `None`.
pub fn youtube_video_id(reference: &str) -> Option<String> {
    let url = if reference.starts_with("youtu") || reference.starts_with("www") {
        Url::parse(&format!("http://{reference}")).ok()?
    } else {
        Url::parse(reference).ok()?
    };
    let host = url.host_str()?;
    let path = url.path();

    let id = if host.contains("youtube") {
        if path == "/watch" {
            url.query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned())
        } else if let Some(rest) = path
            .strip_prefix("/embed/")
            .or_else(|| path.strip_prefix("/v/"))
        {
            rest.split('/').next().map(str::to_string)
        } else {
            None
        }
    } else if host.contains("youtu.be") {
        let rest = path.trim_start_matches('/');
        (!rest.contains('/') && rest != "watch").then(|| rest.to_string())
    } else {
        None
    };

    id.filter(|id| !id.is_empty())
}

/// Start offset in seconds from a `t=` query parameter or `#t=` fragment.
pub fn start_offset(reference: &str) -> Option<u32> {
    let url = parse_url(reference)?;
    let from_query = url
        .query_pairs()
        .find(|(k, _)| k == "t")
        .map(|(_, v)| v.into_owned());
    let from_fragment = url.fragment().and_then(|f| {
        f.split('&')
            .find_map(|kv| kv.strip_prefix("t="))
            .map(str::to_string)
    });
    from_query.or(from_fragment).and_then(|t| parse_timecode(&t))
}

/// `1h2m3s` -> 3723, `90` -> 90, `2m` -> 120. A trailing unlabelled number is
/// an absolute offset and replaces whatever the labelled parts added up to.
pub fn parse_timecode(timecode: &str) -> Option<u32> {
    let mut rest = timecode.trim();
    if rest.is_empty() {
        return None;
    }
    let mut total: u32 = 0;

    for (unit, scale) in [('h', 3600u32), ('m', 60), ('s', 1)] {
        if let Some((n, tail)) = rest.split_once(unit) {
            let n: u32 = n.parse().ok()?;
            total = total.checked_add(n.checked_mul(scale)?)?;
            rest = tail;
        }
    }

    if !rest.is_empty() {
        total = rest.parse().ok()?;
    }
    Some(total)
}
