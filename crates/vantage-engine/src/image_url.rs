// Copyright 2025 The Vantage Authors
// SPDX-License-Identifier: Apache-2.0

//! Quality-tiered URL resolution and placeholder synthesis.
//!
//! Sources served by a transform-capable CDN accept compression and format
//! adjustments through query parameters; everything else is passed through
//! unchanged. Placeholders resolve in order: explicit placeholder, generated
//! low-fidelity variant of the same source, synthesized neutral graphic.

/// Hosts known to honor query-based image transforms.
const TRANSFORMABLE_HOSTS: &[&str] = &["unsplash.com"];

const DEFAULT_PLACEHOLDER_WIDTH: u32 = 400;
const DEFAULT_PLACEHOLDER_HEIGHT: u32 = 300;

/// Target compression tier for the full image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageQuality {
    Low,
    Medium,
    High,
}

impl ImageQuality {
    fn compression(&self) -> &'static str {
        match self {
            ImageQuality::Low => "50",
            ImageQuality::Medium => "75",
            ImageQuality::High => "90",
        }
    }
}

pub fn supports_transforms(source: &str) -> bool {
    TRANSFORMABLE_HOSTS.iter().any(|host| source.contains(host))
}

/// Resolves the URL to fetch for the requested quality tier. Sources that do
/// not support transforms come back unchanged.
pub fn quality_url(source: &str, quality: ImageQuality) -> String {
    if !supports_transforms(source) {
        return source.to_owned();
    }
    set_query_params(source, &[("q", quality.compression()), ("fm", "webp")])
}

/// Generated low-fidelity/blurred variant of the source, used as the
/// blur-up placeholder when the source supports transforms.
pub fn low_fidelity_url(source: &str) -> Option<String> {
    if !supports_transforms(source) {
        return None;
    }
    Some(set_query_params(
        source,
        &[("w", "50"), ("q", "10"), ("blur", "5")],
    ))
}

/// Neutral placeholder graphic sized to the requested dimensions, encoded as
/// an SVG data URI so it never requires a fetch.
pub fn neutral_placeholder(width: Option<u32>, height: Option<u32>) -> String {
    let width = width.unwrap_or(DEFAULT_PLACEHOLDER_WIDTH);
    let height = height.unwrap_or(DEFAULT_PLACEHOLDER_HEIGHT);
    format!(
        "data:image/svg+xml;utf8,<svg xmlns='http://www.w3.org/2000/svg' \
         width='{width}' height='{height}'>\
         <rect width='100%25' height='100%25' fill='%23f3f4f6'/></svg>"
    )
}

/// Sets each `(key, value)` pair in the URL's query string, replacing an
/// existing occurrence of the key and appending otherwise. The fragment, if
/// any, is preserved.
fn set_query_params(url: &str, params: &[(&str, &str)]) -> String {
    let (without_fragment, fragment) = match url.split_once('#') {
        Some((head, tail)) => (head, Some(tail)),
        None => (url, None),
    };
    let (base, query) = match without_fragment.split_once('?') {
        Some((base, query)) => (base, query),
        None => (without_fragment, ""),
    };

    let mut pairs: Vec<(String, String)> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_owned(), value.to_owned()),
            None => (pair.to_owned(), String::new()),
        })
        .collect();

    for (key, value) in params {
        match pairs.iter_mut().find(|(existing, _)| existing == key) {
            Some(pair) => pair.1 = (*value).to_owned(),
            None => pairs.push(((*key).to_owned(), (*value).to_owned())),
        }
    }

    let query = pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    match fragment {
        Some(fragment) => format!("{base}?{query}#{fragment}"),
        None => format!("{base}?{query}"),
    }
}
