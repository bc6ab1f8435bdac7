//! Glob matching of hostnames against a project's allowed-domain list.
//!
//! A pattern is a hostname where `*` stands for zero or more characters of any
//! kind; every other character is literal. Hostnames are compared exactly: no
//! case folding and no trailing-dot removal.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

static DOMAIN_FORMAT: OnceLock<Regex> = OnceLock::new();

#[derive(Clone, Debug)]
pub struct DomainPattern {
    raw: String,
    regex: Regex,
}

impl DomainPattern {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            raw: pattern.to_string(),
            regex: Regex::new(&glob_to_regex(pattern))?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, hostname: &str) -> bool {
        self.regex.is_match(hostname)
    }
}

/// Anchored regex source for a glob pattern.
pub fn glob_to_regex(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^{body}$")
}

/// An empty pattern list allows every hostname.
pub fn is_allowed<S: AsRef<str>>(hostname: &str, patterns: &[S]) -> bool {
    if patterns.is_empty() {
        return true;
    }
    patterns
        .iter()
        .any(|pattern| match DomainPattern::compile(pattern.as_ref()) {
            Ok(compiled) => compiled.matches(hostname),
            Err(err) => {
                warn!("skipping uncompilable domain pattern={} err={err}", pattern.as_ref());
                false
            }
        })
}

/// Format accepted for stored allow-list entries: at least one dot and a
/// final label made of letters, digits or hyphens.
pub fn is_valid_domain_pattern(pattern: &str) -> bool {
    DOMAIN_FORMAT
        .get_or_init(|| {
            Regex::new(r"^[a-zA-Z0-9.*-]+\.[a-zA-Z0-9.-]*[a-zA-Z0-9-]+$")
                .expect("domain format regex is valid")
        })
        .is_match(pattern)
}
