//! Cookie codec for visitor assignments.
//!
//! The cookie holds a single flat JSON object `{experimentId: variantId}`,
//! percent-encoded so the browser can read it back with `decodeURIComponent`.
//! Decoding never fails: anything unreadable is treated as "no assignments".

use std::collections::BTreeMap;

pub const AB_COOKIE_NAME: &str = "flocken_ab_assignments";

/// 90 days.
pub const AB_COOKIE_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 90;

/// experiment id → variant id
pub type Assignments = BTreeMap<String, String>;

pub fn parse_assignments(raw: &str) -> Assignments {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => map
            .into_iter()
            .filter_map(|(k, v)| match v {
                serde_json::Value::String(s) => Some((k, s)),
                _ => None,
            })
            .collect(),
        Ok(_) => Assignments::new(),
        Err(e) => {
            if !raw.trim().is_empty() {
                tracing::debug!(error = %e, "Discarding malformed assignment cookie");
            }
            Assignments::new()
        }
    }
}

pub fn serialize_assignments(assignments: &Assignments) -> String {
    serde_json::to_string(assignments).unwrap_or_else(|_| "{}".to_string())
}

/// Additive merge: entries in `updates` overwrite, everything else is kept.
pub fn merge_assignments<I>(existing: &mut Assignments, updates: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (experiment_id, variant_id) in updates {
        existing.insert(experiment_id, variant_id);
    }
}

pub fn encode_cookie_value(assignments: &Assignments) -> String {
    urlencoding::encode(&serialize_assignments(assignments)).into_owned()
}

pub fn decode_cookie_value(raw: &str) -> Assignments {
    match urlencoding::decode(raw) {
        Ok(decoded) => parse_assignments(&decoded),
        Err(_) => Assignments::new(),
    }
}

/// Finds `name` in a raw `Cookie:` header (`a=1; b=2`) and decodes it.
pub fn assignments_from_cookie_header(header: &str, name: &str) -> Assignments {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| decode_cookie_value(value))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes of the assignment cookie. Not HTTP-only: client code reads it
/// to attach experiment ids to tracking calls.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub max_age_secs: u64,
    pub path: String,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: AB_COOKIE_NAME.to_string(),
            secure: true,
            http_only: false,
            same_site: SameSite::Lax,
            max_age_secs: AB_COOKIE_MAX_AGE_SECS,
            path: "/".to_string(),
        }
    }
}

impl CookieSettings {
    /// `Secure` is dropped only for local development over plain http.
    pub fn for_environment(env_mode: &str) -> Self {
        Self {
            secure: env_mode != "development",
            ..Self::default()
        }
    }

    pub fn set_cookie_header(&self, assignments: &Assignments) -> String {
        let mut header = format!(
            "{}={}; Path={}; Max-Age={}; SameSite={}",
            self.name,
            encode_cookie_value(assignments),
            self.path,
            self.max_age_secs,
            self.same_site.as_str()
        );
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Assignments {
        let mut m = Assignments::new();
        m.insert("valkommen_hero_v1".to_string(), "variant_c".to_string());
        m.insert("pricing_copy".to_string(), "control".to_string());
        m
    }

    #[test]
    fn roundtrip_preserves_mapping() {
        let m = sample();
        assert_eq!(parse_assignments(&serialize_assignments(&m)), m);
    }

    #[test]
    fn empty_mapping_serializes_to_empty_object() {
        assert_eq!(serialize_assignments(&Assignments::new()), "{}");
    }

    #[test]
    fn malformed_json_is_empty() {
        assert!(parse_assignments("{not json").is_empty());
        assert!(parse_assignments("").is_empty());
        assert!(parse_assignments("undefined").is_empty());
    }

    #[test]
    fn non_object_json_is_empty() {
        assert!(parse_assignments("[1,2,3]").is_empty());
        assert!(parse_assignments("\"control\"").is_empty());
        assert!(parse_assignments("null").is_empty());
    }

    #[test]
    fn non_string_values_are_dropped() {
        let m = parse_assignments(r#"{"a":"control","b":3,"c":null,"d":{"x":1}}"#);
        assert_eq!(m.len(), 1);
        assert_eq!(m["a"], "control");
    }

    #[test]
    fn merge_is_additive() {
        let mut m = sample();
        merge_assignments(
            &mut m,
            vec![("valkommen_hero_v1".to_string(), "control".to_string())],
        );
        assert_eq!(m["valkommen_hero_v1"], "control");
        assert_eq!(m["pricing_copy"], "control");
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn merge_with_nothing_keeps_everything() {
        let mut m = sample();
        merge_assignments(&mut m, Vec::new());
        assert_eq!(m, sample());
    }

    #[test]
    fn cookie_value_is_percent_encoded() {
        let encoded = encode_cookie_value(&sample());
        assert!(!encoded.contains('"'));
        assert!(!encoded.contains(','));
        assert!(!encoded.contains(';'));
        assert_eq!(decode_cookie_value(&encoded), sample());
    }

    #[test]
    fn decode_accepts_raw_json() {
        let m = decode_cookie_value(r#"{"a":"b"}"#);
        assert_eq!(m["a"], "b");
    }

    #[test]
    fn decode_invalid_percent_sequence_is_empty() {
        assert!(decode_cookie_value("%FF%FE").is_empty());
    }

    #[test]
    fn reads_named_cookie_from_header() {
        let header = format!(
            "_ga=GA1.1.123; {}={}; theme=dark",
            AB_COOKIE_NAME,
            encode_cookie_value(&sample())
        );
        assert_eq!(assignments_from_cookie_header(&header, AB_COOKIE_NAME), sample());
    }

    #[test]
    fn missing_cookie_in_header_is_empty() {
        assert!(assignments_from_cookie_header("_ga=1; theme=dark", AB_COOKIE_NAME).is_empty());
        assert!(assignments_from_cookie_header("", AB_COOKIE_NAME).is_empty());
    }

    #[test]
    fn set_cookie_header_carries_attributes() {
        let header = CookieSettings::for_environment("production").set_cookie_header(&sample());
        assert!(header.starts_with("flocken_ab_assignments="));
        assert!(header.contains("Path=/"));
        assert!(header.contains("Max-Age=7776000"));
        assert!(header.contains("SameSite=Lax"));
        assert!(header.contains("Secure"));
        assert!(!header.contains("HttpOnly"));
    }

    #[test]
    fn development_drops_secure() {
        let header = CookieSettings::for_environment("development").set_cookie_header(&sample());
        assert!(!header.contains("Secure"));
    }
}
