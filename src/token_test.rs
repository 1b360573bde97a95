use super::*;

fn sources(explicit: Option<&str>, session: Option<&str>, cookie: Option<&str>) -> TokenSources {
    TokenSources {
        explicit: explicit.map(str::to_owned),
        session: session.map(str::to_owned),
        cookie_header: cookie.map(str::to_owned),
    }
}

#[test]
fn explicit_token_wins() {
    let s = sources(Some("a"), Some("b"), Some("access_token=c"));
    assert_eq!(s.resolve().as_deref(), Some("a"));
}

#[test]
fn session_token_beats_cookie() {
    let s = sources(None, Some("b"), Some("access_token=c"));
    assert_eq!(s.resolve().as_deref(), Some("b"));
}

#[test]
fn cookie_is_the_fallback_and_is_unquoted() {
    let s = sources(None, None, Some(r#"theme=dark; access_token="xyz.123"; lang=en"#));
    assert_eq!(s.resolve().as_deref(), Some("xyz.123"));
}

#[test]
fn empty_values_are_skipped() {
    let s = sources(Some(""), Some("  "), Some("access_token=c"));
    assert_eq!(s.resolve().as_deref(), Some("c"));
}

#[test]
fn nothing_resolves_to_none() {
    assert_eq!(TokenSources::default().resolve(), None);
    let s = sources(None, None, Some("access_token=\"\""));
    assert_eq!(s.resolve(), None);
}

#[test]
fn cookie_value_matches_exact_name() {
    assert_eq!(cookie_value("my_access_token=x; access_token=y", "access_token").as_deref(), Some("y"));
    assert_eq!(cookie_value("other=1", "access_token"), None);
}

#[test]
fn lone_quote_is_kept() {
    assert_eq!(cookie_value("access_token=\"abc", "access_token").as_deref(), Some("\"abc"));
}
