//! Auth token resolution.
//!
//! The token comes from, in priority order: an explicit value, the
//! session-scoped value (`IRIS_TOKEN`), then the `access_token` cookie of a
//! raw `Cookie` header (`IRIS_COOKIE`). Empty values count as absent.

/// Cookie that carries the token when nothing else provides one.
pub const TOKEN_COOKIE: &str = "access_token";

/// Candidate token sources, highest priority first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenSources {
    pub explicit: Option<String>,
    pub session: Option<String>,
    /// Raw `Cookie` header value, e.g. `a=1; access_token="xyz"`.
    pub cookie_header: Option<String>,
}

impl TokenSources {
    /// Session value and cookie header from `IRIS_TOKEN` and `IRIS_COOKIE`.
    #[must_use]
    pub fn from_env(explicit: Option<String>) -> Self {
        Self {
            explicit,
            session: std::env::var("IRIS_TOKEN").ok(),
            cookie_header: std::env::var("IRIS_COOKIE").ok(),
        }
    }

    /// First non-empty token.
    #[must_use]
    pub fn resolve(&self) -> Option<String> {
        non_empty(self.explicit.as_deref())
            .or_else(|| non_empty(self.session.as_deref()))
            .or_else(|| {
                self.cookie_header
                    .as_deref()
                    .and_then(|header| cookie_value(header, TOKEN_COOKIE))
                    .and_then(|value| non_empty(Some(&value)))
            })
    }
}

/// Value of cookie `name` in a `Cookie` header, with surrounding double
/// quotes removed.
#[must_use]
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| strip_quotes(value.trim()).to_owned())
    })
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;
