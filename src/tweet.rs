//! Post lookup helpers: id extraction, proxy allow-list and syndication payload parsing.
//!
//! Only the parsing side lives here; fetching is left to the caller.

use crate::{GridsplitError, Result};
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use tracing::warn;

const IMAGE_HOST_PREFIX: &str = "https://pbs.twimg.com/";
const LARGE_JPEG_SUFFIX: &str = "?format=jpg&name=large";

fn status_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:twitter\.com|x\.com)/\w+/status/(\d+)").expect("static pattern compiles")
    })
}

/// Numeric post id from a status URL, e.g. `https://x.com/user/status/123?s=20`
pub fn extract_tweet_id(url: &str) -> Option<String> {
    status_pattern().captures(url).map(|caps| caps[1].to_string())
}

pub fn syndication_url(tweet_id: &str) -> String {
    format!("https://cdn.syndication.twimg.com/tweet-result?id={tweet_id}&token=0")
}

/// Only image CDN URLs may go through the proxy.
pub fn is_proxyable_image_url(url: &str) -> bool {
    url.starts_with(IMAGE_HOST_PREFIX)
}

/// Maps a lookup HTTP status to an error; success statuses pass.
pub fn classify_lookup_status(status: u16) -> Result<()> {
    match status {
        200..=299 => Ok(()),
        404 => Err(GridsplitError::NotFound(
            "post not found; it may have been deleted or be private".into(),
        )),
        other => Err(GridsplitError::Fetch(format!("post lookup failed with status {other}"))),
    }
}

#[derive(Deserialize)]
struct MediaDetail {
    #[serde(rename = "type")]
    kind: String,
    media_url_https: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Photo {
    url: Option<String>,
    expanded_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TweetData {
    #[serde(default)]
    media_details: Vec<MediaDetail>,
    #[serde(default)]
    photos: Vec<Photo>,
}

/// Large-size image URLs from a syndication response, in post order.
pub fn parse_syndication_images(json: &str) -> Result<Vec<String>> {
    let data: TweetData = serde_json::from_str(json)?;

    let mut images: Vec<String> = data
        .media_details
        .iter()
        .filter(|media| media.kind == "photo")
        .filter_map(|media| media.media_url_https.as_deref())
        .map(|url| format!("{url}{LARGE_JPEG_SUFFIX}"))
        .collect();

    if images.is_empty() {
        images = data
            .photos
            .iter()
            .filter_map(|photo| photo.expanded_url.as_deref().or(photo.url.as_deref()))
            .filter(|url| url.contains("pbs.twimg.com"))
            .map(|url| format!("{url}{LARGE_JPEG_SUFFIX}"))
            .collect();
    }

    if images.is_empty() {
        return Err(GridsplitError::NotFound("no images in this post".into()));
    }
    Ok(images)
}

/// Image URLs from a saved lookup response that the image proxy would serve.
pub fn lookup_images(status: u16, json: &str) -> Result<Vec<String>> {
    classify_lookup_status(status)?;
    let (images, rejected): (Vec<String>, Vec<String>) =
        parse_syndication_images(json)?.into_iter().partition(|url| is_proxyable_image_url(url));
    for url in &rejected {
        warn!(%url, "skipping image outside the image CDN");
    }
    if images.is_empty() {
        return Err(GridsplitError::NotFound("no proxyable images in this post".into()));
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_ids_from_known_hosts() {
        assert_eq!(
            extract_tweet_id("https://twitter.com/user/status/123456789").as_deref(),
            Some("123456789")
        );
        assert_eq!(
            extract_tweet_id("https://x.com/some_user/status/42?s=20").as_deref(),
            Some("42")
        );
        assert_eq!(
            extract_tweet_id("https://mobile.twitter.com/u/status/7").as_deref(),
            Some("7")
        );
        assert_eq!(extract_tweet_id("https://example.com/u/status/7"), None);
        assert_eq!(extract_tweet_id("https://x.com/user"), None);
    }

    #[test]
    fn proxy_only_accepts_image_cdn() {
        assert!(is_proxyable_image_url("https://pbs.twimg.com/media/abc.jpg"));
        assert!(!is_proxyable_image_url("http://pbs.twimg.com/media/abc.jpg"));
        assert!(!is_proxyable_image_url("https://evil.example/pbs.twimg.com/"));
    }

    #[test]
    fn classifies_statuses() {
        assert!(classify_lookup_status(200).is_ok());
        assert!(matches!(classify_lookup_status(404), Err(GridsplitError::NotFound(_))));
        assert!(matches!(classify_lookup_status(500), Err(GridsplitError::Fetch(_))));
    }

    #[test]
    fn prefers_media_details() {
        let json = r#"{
            "mediaDetails": [
                {"type": "photo", "media_url_https": "https://pbs.twimg.com/media/a.jpg"},
                {"type": "video", "media_url_https": "https://pbs.twimg.com/media/v.jpg"},
                {"type": "photo", "media_url_https": "https://pbs.twimg.com/media/b.jpg"}
            ],
            "photos": [{"url": "https://pbs.twimg.com/media/ignored.jpg"}]
        }"#;
        let images = parse_syndication_images(json).unwrap();
        assert_eq!(
            images,
            vec![
                "https://pbs.twimg.com/media/a.jpg?format=jpg&name=large",
                "https://pbs.twimg.com/media/b.jpg?format=jpg&name=large",
            ]
        );
    }

    #[test]
    fn falls_back_to_photos() {
        let json = r#"{"photos": [
            {"url": "https://t.co/x", "expandedUrl": "https://pbs.twimg.com/media/c.jpg"},
            {"url": "https://elsewhere.example/d.jpg"}
        ]}"#;
        let images = parse_syndication_images(json).unwrap();
        assert_eq!(images, vec!["https://pbs.twimg.com/media/c.jpg?format=jpg&name=large"]);
    }

    #[test]
    fn empty_payload_is_not_found() {
        assert!(matches!(parse_syndication_images("{}"), Err(GridsplitError::NotFound(_))));
        assert!(matches!(parse_syndication_images("not json"), Err(GridsplitError::Config(_))));
    }

    #[test]
    fn lookup_keeps_only_proxyable_images() {
        let json = r#"{"mediaDetails": [
            {"type": "photo", "media_url_https": "https://pbs.twimg.com/media/a.jpg"},
            {"type": "photo", "media_url_https": "https://cdn.example/b.jpg"}
        ]}"#;
        assert_eq!(
            lookup_images(200, json).unwrap(),
            vec!["https://pbs.twimg.com/media/a.jpg?format=jpg&name=large"]
        );
        assert!(matches!(lookup_images(404, json), Err(GridsplitError::NotFound(_))));

        let offsite = r#"{"mediaDetails": [
            {"type": "photo", "media_url_https": "https://cdn.example/b.jpg"}
        ]}"#;
        assert!(matches!(lookup_images(200, offsite), Err(GridsplitError::NotFound(_))));
    }
}
