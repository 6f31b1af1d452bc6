//! Structural check for video-page URLs.
//!
//! The accepted shape is matched as a prefix: anything after a valid
//! `host/selector/11-char-id` prefix is ignored, so share links with
//! trailing query parameters pass unchanged.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ServiceError;

/// Host tokens: the main site, its short-link alias and the no-cookie embed host.
pub const HOSTS: [&str; 3] = ["youtube", "youtu", "youtube-nocookie"];

pub const TOP_LEVEL_DOMAINS: [&str; 2] = ["com", "be"];

/// Literal path selectors that may precede the video id.
pub const PATH_SELECTORS: [&str; 3] = ["watch?v=", "embed/", "v/"];

/// Any non-empty path ending in this also selects a video (`/foo/bar?v=`).
pub const QUERY_SELECTOR_SUFFIX: &str = "?v=";

pub const VIDEO_ID_LEN: usize = 11;

/// Characters that end a video id.
pub const VIDEO_ID_TERMINATORS: [char; 4] = ['&', '=', '%', '?'];

fn alternation(items: &[&str]) -> String {
    items
        .iter()
        .map(|s| regex::escape(s))
        .collect::<Vec<_>>()
        .join("|")
}

static VIDEO_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    let terminators: String = VIDEO_ID_TERMINATORS
        .iter()
        .map(|c| regex::escape(&c.to_string()))
        .collect();
    let pattern = format!(
        r"^(?:https?://)?(?:www\.)?(?:{hosts})\.(?:{tlds})/(?:{selectors}|.+{query})?[^{terminators}]{{{len}}}",
        hosts = alternation(&HOSTS),
        tlds = alternation(&TOP_LEVEL_DOMAINS),
        selectors = alternation(&PATH_SELECTORS),
        query = regex::escape(QUERY_SELECTOR_SUFFIX),
        terminators = terminators,
        len = VIDEO_ID_LEN,
    );
    Regex::new(&pattern).expect("video URL pattern is built from constants")
});

/// A URL that passed [`validate`]. Holds the caller's string untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReference(String);

impl VideoReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn is_supported_url(url: &str) -> bool {
    VIDEO_URL_PATTERN.is_match(url)
}

pub fn validate(url: &str) -> Result<VideoReference, ServiceError> {
    if !is_supported_url(url) {
        return Err(ServiceError::InvalidUrl);
    }
    Ok(VideoReference(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_forms_unchanged() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "http://youtube.com/watch?v=dQw4w9WgXcQ",
            "www.youtube.com/watch?v=dQw4w9WgXcQ",
            "youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/v/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/attribution_link?a=x&u=/watch?v=dQw4w9WgXcQ",
        ] {
            let video = validate(url).unwrap_or_else(|_| panic!("should accept {url}"));
            assert_eq!(video.as_str(), url);
        }
    }

    #[test]
    fn rejects_foreign_or_malformed_urls() {
        for url in [
            "https://example.com/watch?v=abc",
            "https://www.youtube.com/watch?v=abc",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.org/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/playlist?list=PL1",
            "ftp://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://YOUTUBE.com/watch?v=dQw4w9WgXcQ",
            "",
            "dQw4w9WgXcQ",
        ] {
            assert!(
                matches!(validate(url), Err(ServiceError::InvalidUrl)),
                "should reject {url:?}"
            );
        }
    }

    #[test]
    fn trailing_content_after_valid_prefix_is_accepted() {
        let url = "https://youtu.be/dQw4w9WgXcQ&feature=share<script>";
        assert_eq!(validate(url).unwrap().as_str(), url);
    }

    #[test]
    fn id_stops_at_terminators() {
        assert!(!is_supported_url("https://youtu.be/dQw4w%9WgXcQ"));
        assert!(!is_supported_url("https://youtu.be/dQw4=9WgXcQ"));
    }

    #[test]
    fn id_length_counts_characters_not_bytes() {
        assert!(is_supported_url("https://youtu.be/ééééééééééé"));
        assert!(!is_supported_url("https://youtu.be/éééééééééé"));
    }
}
