use std::collections::BTreeMap;

use serde::Serialize;

/// Catalog listing record of a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Namespaced id, `<namespace><channel id>`
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub poster: Option<String>,
    pub poster_shape: String,
}

/// One playable variant of a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDescriptor {
    pub name: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_live: bool,
    pub behavior_hints: BehaviorHints,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorHints {
    pub not_web_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_headers: Option<ProxyHeaders>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binge_group: Option<String>,
}

/// Headers a player should send when opening the stream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProxyHeaders {
    pub request: BTreeMap<String, String>,
}
