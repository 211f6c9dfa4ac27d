use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{id, structs::Channel};

const INFO_DIRECTIVE: &str = "#EXTINF:";
const GROUP_DIRECTIVE: &str = "#EXTGRP:";
const URL_SCHEME: &str = "http";

static ATTRIBUTE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([A-Za-z0-9_-]+)="([^"]*)""#).unwrap());

/// Metadata of the last info directive, waiting for its URL line
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingInfo {
    name: Option<String>,
    group: String,
    logo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Idle,
    InfoPending(PendingInfo),
}

/// Parses a playlist document into channels, in document order
///
/// Never fails. Entries without a display name or without a URL are dropped.
#[must_use]
pub fn parse_playlist(content: &str) -> Vec<Channel> {
    let mut channels = Vec::new();
    let mut state = State::Idle;

    for line in content.lines().map(str::trim) {
        state = step(state, line, &mut channels);
    }

    debug!("Parsed {} channels from playlist", channels.len());
    channels
}

fn step(state: State, line: &str, channels: &mut Vec<Channel>) -> State {
    if let Some(info) = line.strip_prefix(INFO_DIRECTIVE) {
        // A repeated directive replaces whatever was pending
        return State::InfoPending(parse_info(info));
    }

    if line.starts_with(GROUP_DIRECTIVE) {
        return state;
    }

    if line.starts_with(URL_SCHEME) {
        if let State::InfoPending(PendingInfo {
            name: Some(name),
            group,
            logo,
        }) = state
        {
            channels.push(Channel {
                id: id::derive(line),
                name,
                group,
                url: line.to_string(),
                logo,
            });
        }
        return State::Idle;
    }

    state
}

fn parse_info(info: &str) -> PendingInfo {
    let (attributes, name) = split_info(info);
    let mut group = String::new();
    let mut logo = None;

    for caps in ATTRIBUTE_REGEX.captures_iter(attributes) {
        match &caps[1] {
            "group-title" => group = caps[2].to_string(),
            "tvg-logo" if !caps[2].is_empty() => logo = Some(caps[2].to_string()),
            _ => {}
        }
    }

    PendingInfo {
        name: non_empty(name),
        group,
        logo,
    }
}

/// Splits a directive into its attributes and its display name
///
/// The display name follows the first comma outside of quoted attribute
/// values. Without a comma, whatever trails the last attribute is used.
/// Without either, there is no name.
fn split_info(info: &str) -> (&str, &str) {
    let mut in_quotes = false;
    let mut attributes_end = None;

    for (i, c) in info.char_indices() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                if !in_quotes {
                    attributes_end = Some(i + 1);
                }
            }
            ',' if !in_quotes => return (&info[..i], &info[i + 1..]),
            _ => {}
        }
    }

    attributes_end.map_or((info, ""), |end| (&info[..end], &info[end..]))
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}
