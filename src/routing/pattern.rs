//! Path templates compiled into matchers
//!
//! A template is made of literal segments, named parameters (`:id`) and an
//! optional trailing wildcard (`*`):
//!
//! ```rust,ignore
//! let pattern = PathPattern::parse("/todos/:id")?;
//! let params = pattern.matches("/todos/42").unwrap();
//! assert_eq!(params["id"], "42");
//! ```
//!
//! Precompiled regular expressions are accepted too. Parameter names come from
//! named capture groups, or from an explicit ordered key list when the groups
//! are positional.

use regex::Regex;
use std::collections::HashMap;

use crate::core::error::ConfigError;

/// Parameters extracted from a matched path
pub type PathParams = HashMap<String, String>;

/// Name under which a trailing wildcard is captured
pub const WILDCARD: &str = "*";

/// A compiled route pattern
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    /// (capture group index, parameter name)
    slots: Vec<(usize, String)>,
}

impl PathPattern {
    /// Compile a string template
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let malformed = |reason: &str| ConfigError::MalformedPattern {
            pattern: template.to_string(),
            reason: reason.to_string(),
        };

        if !template.starts_with('/') {
            return Err(malformed("must start with '/'"));
        }

        let segments: Vec<&str> = template[1..].split('/').collect();
        let last = segments.len() - 1;
        let mut body = String::new();
        let mut slots: Vec<(usize, String)> = Vec::new();

        for (index, segment) in segments.iter().enumerate() {
            if segment.is_empty() {
                // "/" alone or a trailing slash
                if index == last {
                    break;
                }
                return Err(malformed("empty segment"));
            }

            if *segment == WILDCARD {
                if index != last {
                    return Err(malformed("'*' is only allowed as the last segment"));
                }
                body.push_str("(?:/(.*))?");
                slots.push((slots.len() + 1, WILDCARD.to_string()));
                continue;
            }

            if let Some(name) = segment.strip_prefix(':') {
                if !is_identifier(name) {
                    return Err(malformed("parameter names must be identifiers"));
                }
                if slots.iter().any(|(_, existing)| existing == name) {
                    return Err(malformed("duplicate parameter name"));
                }
                body.push_str("/([^/]+)");
                slots.push((slots.len() + 1, name.to_string()));
                continue;
            }

            if segment.contains(':') || segment.contains('*') {
                return Err(malformed("':' and '*' must start a segment"));
            }
            body.push('/');
            body.push_str(&regex::escape(segment));
        }

        let regex = Regex::new(&format!("^{}/?$", body))
            .map_err(|e| malformed(&e.to_string()))?;

        Ok(Self {
            source: template.to_string(),
            regex,
            slots,
        })
    }

    /// Use a regular expression whose parameters are named capture groups
    pub fn from_regex(regex: Regex) -> Self {
        let slots = regex
            .capture_names()
            .enumerate()
            .filter_map(|(index, name)| name.map(|n| (index, n.to_string())))
            .collect();

        Self {
            source: regex.as_str().to_string(),
            regex,
            slots,
        }
    }

    /// Use a regular expression with positional groups named by `keys`
    ///
    /// The number of keys must equal the number of capture groups.
    pub fn from_regex_with_keys<K: Into<String>>(
        regex: Regex,
        keys: impl IntoIterator<Item = K>,
    ) -> Result<Self, ConfigError> {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        let groups = regex.captures_len() - 1;
        if keys.len() != groups {
            return Err(ConfigError::MalformedPattern {
                pattern: regex.as_str().to_string(),
                reason: format!("{} keys supplied for {} capture groups", keys.len(), groups),
            });
        }

        let slots = keys
            .into_iter()
            .enumerate()
            .map(|(i, key)| (i + 1, key))
            .collect();

        Ok(Self {
            source: regex.as_str().to_string(),
            regex,
            slots,
        })
    }

    /// The template or regex source this pattern was built from
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Parameter names in capture order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(_, name)| name.as_str())
    }

    /// Match a path, returning the captured parameters
    ///
    /// Groups that did not participate in the match are left out, except the
    /// trailing wildcard, which is always present and empty when nothing
    /// follows the prefix.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let captures = self.regex.captures(path)?;
        let params = self
            .slots
            .iter()
            .filter_map(|(index, name)| match captures.get(*index) {
                Some(m) => Some((name.clone(), m.as_str().to_string())),
                None if name == WILDCARD => Some((name.clone(), String::new())),
                None => None,
            })
            .collect();
        Some(params)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Anything that can be turned into a [`PathPattern`] at declaration time
pub trait IntoPattern {
    fn into_pattern(self) -> Result<PathPattern, ConfigError>;
}

impl IntoPattern for PathPattern {
    fn into_pattern(self) -> Result<PathPattern, ConfigError> {
        Ok(self)
    }
}

impl IntoPattern for &str {
    fn into_pattern(self) -> Result<PathPattern, ConfigError> {
        PathPattern::parse(self)
    }
}

impl IntoPattern for String {
    fn into_pattern(self) -> Result<PathPattern, ConfigError> {
        PathPattern::parse(&self)
    }
}

impl IntoPattern for Regex {
    fn into_pattern(self) -> Result<PathPattern, ConfigError> {
        Ok(PathPattern::from_regex(self))
    }
}

impl<K: Into<String>> IntoPattern for (Regex, Vec<K>) {
    fn into_pattern(self) -> Result<PathPattern, ConfigError> {
        PathPattern::from_regex_with_keys(self.0, self.1)
    }
}
