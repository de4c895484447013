use std::sync::LazyLock;

use regex::Regex;

use crate::spec::Validator;

static WEB_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^https?://[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?",
        r"(\.[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?)*",
        r"(:[0-9]{1,5})?([/?#][^\s]*)?$",
    ))
    .expect("static url pattern")
});

const LOWER_ALPHANUMERIC: &str = "abcdefghijklmnopqrstuvwxyz1234567890";

/// Runs a named rule against a string value; `Some(message)` on failure.
///
/// Empty strings pass every rule, required-ness is checked separately.
pub fn check(validator: Validator, value: &str) -> Option<&'static str> {
    if value.is_empty() {
        return None;
    }
    match validator {
        Validator::KubernetesName => kubernetes_name(value),
        Validator::Rfc1123Label => dns_label(value, false),
        Validator::Rfc1035Label => dns_label(value, true),
        Validator::WebUrl => {
            if WEB_URL.is_match(value) {
                None
            } else {
                Some("The URL is not valid.")
            }
        }
    }
}

fn kubernetes_name(value: &str) -> Option<&'static str> {
    if value.len() > 253 {
        return Some("This value can contain at most 253 characters");
    }
    if value
        .chars()
        .any(|c| !LOWER_ALPHANUMERIC.contains(c) && c != '-' && c != '.')
    {
        return Some("This value can only contain lowercase alphanumeric characters or '-' or '.'");
    }
    edges(value)
}

fn dns_label(value: &str, alphabetic_start: bool) -> Option<&'static str> {
    if value.len() > 63 {
        return Some("This value can contain at most 63 characters");
    }
    if value
        .chars()
        .any(|c| !LOWER_ALPHANUMERIC.contains(c) && c != '-')
    {
        return Some("This value can only contain lowercase alphanumeric characters or '-'");
    }
    if alphabetic_start && !value.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Some("This value must start with an alphabetic character");
    }
    edges(value)
}

fn edges(value: &str) -> Option<&'static str> {
    if !value.starts_with(|c: char| LOWER_ALPHANUMERIC.contains(c)) {
        return Some("This value must start with an alphanumeric character");
    }
    if !value.ends_with(|c: char| LOWER_ALPHANUMERIC.contains(c)) {
        return Some("This value must end with an alphanumeric character");
    }
    None
}
