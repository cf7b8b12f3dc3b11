//! Conditional request evaluation (`If-None-Match`, `If-Modified-Since`).

use cachectl_core::header_names::{IF_MODIFIED_SINCE, IF_NONE_MATCH};
use cachectl_core::httpdate::parse_http_date;
use cachectl_core::{RequestContext, Response};

/// Whether `response` is still fresh for the client that sent `request`.
///
/// Only `GET` and `HEAD` can be answered with `304`. Entity tags compare
/// weakly and take priority: when the request lists tags and the response
/// carries one, `If-Modified-Since` is not consulted.
pub fn is_not_modified(request: &RequestContext, response: &Response) -> bool {
    if !request.is_safe_method() {
        return false;
    }

    let candidates: Vec<String> = request
        .headers
        .get_all(IF_NONE_MATCH)
        .flat_map(parse_entity_tags)
        .collect();

    if !candidates.is_empty() {
        if let Some(etag) = response.etag() {
            let etag = strip_weak(etag);
            return candidates
                .iter()
                .any(|candidate| candidate == "*" || strip_weak(candidate) == etag);
        }
    }

    match (request.header(IF_MODIFIED_SINCE), response.last_modified()) {
        (Some(since), Some(last_modified)) => {
            parse_http_date(since).is_some_and(|since| since >= last_modified)
        }
        _ => false,
    }
}

/// Evaluate the request and, if the client copy is fresh, turn the response
/// into a `304 Not Modified`. Returns whether it did.
pub fn apply(request: &RequestContext, response: &mut Response) -> bool {
    let not_modified = is_not_modified(request, response);
    if not_modified {
        response.set_not_modified();
    }
    not_modified
}

/// Split an `If-None-Match` value into entity tags. Commas inside quotes do
/// not separate tags.
pub fn parse_entity_tags(value: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in value.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' if !quoted => {
                push_tag(&mut tags, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_tag(&mut tags, &current);
    tags
}

fn push_tag(tags: &mut Vec<String>, raw: &str) {
    let tag = raw.trim();
    if !tag.is_empty() {
        tags.push(tag.to_string());
    }
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}
