// src/utils/html.rs

use std::collections::HashSet;

/// Inline tags an examiner may use in question text and options.
const ALLOWED_TAGS: [&str; 9] = ["b", "i", "em", "strong", "code", "sub", "sup", "u", "br"];

/// Tags removed together with everything inside them.
const DROPPED_WITH_CONTENT: [&str; 2] = ["script", "style"];

/// Sanitizes examiner-authored exam text.
///
/// Only inline formatting survives; block elements, links, images and all
/// attributes are removed, and `<script>`/`<style>` are dropped with their content.
pub fn clean_html(input: &str) -> String {
    let tags: HashSet<&str> = ALLOWED_TAGS.into_iter().collect();
    let dropped: HashSet<&str> = DROPPED_WITH_CONTENT.into_iter().collect();
    ammonia::Builder::empty()
        .tags(tags)
        .clean_content_tags(dropped)
        .clean(input)
        .to_string()
}
