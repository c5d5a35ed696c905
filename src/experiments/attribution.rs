//! Campaign attribution read from landing-page query strings.
//!
//! The first touch is kept for good once it carries anything; the last touch
//! is replaced by every visit that arrives with campaign parameters. Both are
//! flattened into `ft_*` and `lt_*` event parameters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longer values are cut to keep analytics payloads small.
pub const MAX_VALUE_LEN: usize = 120;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gclid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fbclid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wbraid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gbraid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msclkid: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

impl Attribution {
    /// Reads the utm_* parameters and click ids from a query string, with or
    /// without the leading `?`. The first occurrence of a key wins.
    pub fn from_query(query: &str, now: DateTime<Utc>) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let param = |key: &str| query_param(query, key).and_then(|v| sanitize(&v));
        Self {
            source: param("utm_source"),
            medium: param("utm_medium"),
            campaign: param("utm_campaign"),
            content: param("utm_content"),
            term: param("utm_term"),
            gclid: param("gclid"),
            fbclid: param("fbclid"),
            wbraid: param("wbraid"),
            gbraid: param("gbraid"),
            msclkid: param("msclkid"),
            ts: Some(now.timestamp_millis()),
        }
    }

    /// True when any campaign field or click id is set. The timestamp alone
    /// does not count.
    pub fn has_any(&self) -> bool {
        self.fields()
            .into_iter()
            .any(|(_, value)| value.is_some_and(|v| !v.is_empty()))
    }

    /// `<prefix>_<field>` for every non-empty field, timestamp last.
    pub fn event_params(&self, prefix: &str) -> serde_json::Map<String, serde_json::Value> {
        let mut out = serde_json::Map::new();
        for (field, value) in self.fields() {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                out.insert(format!("{prefix}_{field}"), value.into());
            }
        }
        if let Some(ts) = self.ts {
            out.insert(format!("{prefix}_ts"), ts.into());
        }
        out
    }

    fn fields(&self) -> [(&'static str, Option<&str>); 10] {
        [
            ("source", self.source.as_deref()),
            ("medium", self.medium.as_deref()),
            ("campaign", self.campaign.as_deref()),
            ("content", self.content.as_deref()),
            ("term", self.term.as_deref()),
            ("gclid", self.gclid.as_deref()),
            ("fbclid", self.fbclid.as_deref()),
            ("wbraid", self.wbraid.as_deref()),
            ("gbraid", self.gbraid.as_deref()),
            ("msclkid", self.msclkid.as_deref()),
        ]
    }
}

/// Stored first and last touch for one visitor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchHistory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<Attribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<Attribution>,
}

impl TouchHistory {
    /// Merges a new visit. Visits without campaign parameters change nothing
    /// and return false.
    pub fn record(&mut self, incoming: Attribution) -> bool {
        if !incoming.has_any() {
            return false;
        }
        if !self.first.as_ref().is_some_and(Attribution::has_any) {
            self.first = Some(incoming.clone());
        }
        self.last = Some(incoming);
        true
    }

    /// `ft_*` followed by `lt_*`, ready to merge into an analytics event.
    pub fn event_params(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut out = serde_json::Map::new();
        if let Some(first) = &self.first {
            out.extend(first.event_params("ft"));
        }
        if let Some(last) = &self.last {
            out.extend(last.event_params("lt"));
        }
        out
    }
}

fn query_param(query: &str, key: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if decode_component(k) == key {
            Some(decode_component(v))
        } else {
            None
        }
    })
}

/// Form decoding: `+` is a space, bad percent escapes are kept as written.
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

fn sanitize(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_VALUE_LEN).collect())
}
