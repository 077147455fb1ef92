//! Built-in `format` checkers.
//!
//! Checkers only see strings; the executor lets other instance types pass.

use chrono::{DateTime, NaiveDate};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use url::Url;

pub(crate) type FormatCheck = fn(&str) -> bool;

pub(crate) fn date_time(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
}

pub(crate) fn date(s: &str) -> bool {
    s.len() == 10
        && s.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        })
        && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

pub(crate) fn time(s: &str) -> bool {
    // RFC 3339 full-time: reuse the date-time parser on a fixed date.
    s.contains(|c: char| c == 'Z' || c == 'z' || c == '+' || c == '-')
        && DateTime::parse_from_rfc3339(&format!("1970-01-01T{}", s)).is_ok()
}

pub(crate) fn email(s: &str) -> bool {
    s.is_ascii() && idn_email(s)
}

pub(crate) fn idn_email(s: &str) -> bool {
    match s.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !local.starts_with('.')
                && !local.ends_with('.')
                && !local.contains("..")
                && !s.contains(char::is_whitespace)
        }
        None => false,
    }
}

pub(crate) fn hostname(s: &str) -> bool {
    s.is_ascii() && idn_hostname(s)
}

pub(crate) fn idn_hostname(s: &str) -> bool {
    let s = s.strip_suffix('.').unwrap_or(s);
    !s.is_empty()
        && s.len() <= 253
        && s.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        })
}

pub(crate) fn ipv4(s: &str) -> bool {
    Ipv4Addr::from_str(s).is_ok()
}

pub(crate) fn ipv6(s: &str) -> bool {
    Ipv6Addr::from_str(s).is_ok()
}

pub(crate) fn uri(s: &str) -> bool {
    s.is_ascii() && iri(s)
}

pub(crate) fn iri(s: &str) -> bool {
    !s.contains(char::is_whitespace) && Url::parse(s).is_ok()
}

pub(crate) fn uri_reference(s: &str) -> bool {
    s.is_ascii() && iri_reference(s)
}

pub(crate) fn iri_reference(s: &str) -> bool {
    if s.contains(|c: char| c.is_whitespace() || c == '\\') {
        return false;
    }
    match Url::parse("json-schema:///") {
        Ok(base) => base.join(s).is_ok(),
        Err(_) => false,
    }
}

pub(crate) fn uri_template(s: &str) -> bool {
    let mut open = false;
    for c in s.chars() {
        match c {
            '{' if open => return false,
            '{' => open = true,
            '}' if !open => return false,
            '}' => open = false,
            _ => {}
        }
    }
    !open
}

pub(crate) fn json_pointer(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    if !s.starts_with('/') {
        return false;
    }

    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '~' && !matches!(chars.next(), Some('0') | Some('1')) {
            return false;
        }
    }
    true
}

pub(crate) fn relative_json_pointer(s: &str) -> bool {
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 || (digits > 1 && s.starts_with('0')) {
        return false;
    }

    let rest = &s[digits..];
    rest == "#" || json_pointer(rest)
}

pub(crate) fn regex(s: &str) -> bool {
    regex::Regex::new(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_and_time() {
        assert!(date_time("1963-06-19T08:30:06.283185Z"));
        assert!(date_time("1963-06-19T08:30:06+02:00"));
        assert!(!date_time("1963-06-19"));
        assert!(!date_time("06/19/1963 08:30:06 PST"));

        assert!(date("1963-06-19"));
        assert!(date("2020-02-29"));
        assert!(!date("2021-02-29"));
        assert!(!date("1963-6-19"));
        assert!(!date("06/19/1963"));

        assert!(time("08:30:06Z"));
        assert!(time("08:30:06.283185+01:00"));
        assert!(!time("08:30:06"));
        assert!(!time("8:30 AM"));
    }

    #[test]
    fn network_names() {
        assert!(email("joe.bloggs@example.com"));
        assert!(!email("2962"));
        assert!(!email(".test@example.com"));
        assert!(!email("te..st@example.com"));
        assert!(idn_email("실례@실례.테스트"));

        assert!(hostname("www.example.com"));
        assert!(hostname("xn--4gbwdl.xn--wgbh1c"));
        assert!(!hostname("-a-host-name-that-starts-with--"));
        assert!(!hostname("not_a_valid_host_name"));
        assert!(!hostname(&"a".repeat(64)));
        assert!(idn_hostname("실례.테스트"));

        assert!(ipv4("192.168.0.1"));
        assert!(!ipv4("127.0.0.0.1"));
        assert!(!ipv4("256.256.256.256"));
        assert!(ipv6("::1"));
        assert!(!ipv6("12345::"));
    }

    #[test]
    fn references() {
        assert!(uri("http://foo.bar/?baz=qux#quux"));
        assert!(!uri("//foo.bar/?baz=qux#quux"));
        assert!(!uri("http:// shouldfail.com"));
        assert!(uri_reference("/abc"));
        assert!(uri_reference("#fragment"));
        assert!(!uri_reference("\\\\WINDOWS\\fileshare"));
        assert!(iri("http://example.com/∂éœ?q=πîx"));

        assert!(uri_template("http://example.com/dictionary/{term:1}/{term}"));
        assert!(!uri_template("http://example.com/dictionary/{term:1}/{term"));

        assert!(json_pointer(""));
        assert!(json_pointer("/foo/0/~0~1"));
        assert!(!json_pointer("foo"));
        assert!(!json_pointer("/foo/~2"));

        assert!(relative_json_pointer("1"));
        assert!(relative_json_pointer("0#"));
        assert!(relative_json_pointer("2/foo/0"));
        assert!(!relative_json_pointer("/foo"));
        assert!(!relative_json_pointer("01/a"));

        assert!(regex("^[a-z]+$"));
        assert!(!regex("^(abc]"));
    }
}
