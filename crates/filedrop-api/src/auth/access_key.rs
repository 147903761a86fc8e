//! Per-object access keys.
//!
//! A request may carry the key in a cookie, a header, a form field or the
//! query string, consulted in that order. The first source that is present
//! decides; a wrong key is never retried against a later source.

use axum::{
    http::{header, HeaderMap, HeaderValue},
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use filedrop_core::{Config, Metadata};
use subtle::ConstantTimeEq;

/// Cookie holding a validated access key
pub const ACCESS_KEY_COOKIE: &str = "Access-Key";
pub const ACCESS_KEY_HEADERS: [&str; 2] = ["Access-Key", "Linx-Access-Key"];
/// Form and query parameter name
pub const ACCESS_KEY_PARAM: &str = "access_key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKeySource {
    None,
    Cookie,
    Header,
    Form,
    Query,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// The object has no access key
    Public,
    Granted(AccessKeySource),
    Denied(AccessKeySource),
}

/// Candidate keys found on a request
#[derive(Debug, Default)]
pub struct AccessKeyCandidates<'a> {
    pub cookie: Option<&'a str>,
    pub header: Option<&'a str>,
    pub form: Option<&'a str>,
    pub query: Option<&'a str>,
}

impl<'a> AccessKeyCandidates<'a> {
    pub fn from_request(
        jar: &'a CookieJar,
        headers: &'a HeaderMap,
        form: Option<&'a str>,
        query: Option<&'a str>,
    ) -> Self {
        let header = ACCESS_KEY_HEADERS
            .iter()
            .filter_map(|name| headers.get(*name))
            .filter_map(|value| value.to_str().ok())
            .find(|value| !value.is_empty());
        Self {
            cookie: jar.get(ACCESS_KEY_COOKIE).map(|c| c.value()),
            header,
            form,
            query,
        }
    }

    /// First present source, with its value. A cookie counts as present
    /// even when empty; the other sources need a value.
    fn first_present(&self) -> Option<(AccessKeySource, &'a str)> {
        if let Some(value) = self.cookie {
            return Some((AccessKeySource::Cookie, value));
        }
        [
            (AccessKeySource::Header, self.header),
            (AccessKeySource::Form, self.form),
            (AccessKeySource::Query, self.query),
        ]
        .into_iter()
        .find_map(|(source, value)| value.filter(|v| !v.is_empty()).map(|v| (source, v)))
    }
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

pub fn check_access_key(metadata: &Metadata, candidates: &AccessKeyCandidates<'_>) -> AccessDecision {
    if !metadata.requires_access_key() {
        return AccessDecision::Public;
    }

    match candidates.first_present() {
        Some((source, value)) if secure_compare(value, &metadata.access_key) => {
            AccessDecision::Granted(source)
        }
        Some((source, _)) => AccessDecision::Denied(source),
        None => AccessDecision::Denied(AccessKeySource::None),
    }
}

/// Cookies for both the display and the raw path of `filename`.
fn access_cookies(config: &Config, filename: &str, value: &str) -> [Cookie<'static>; 2] {
    let site_path = config.site_path();
    let paths = [
        format!("{}{}", site_path, filename),
        format!("{}{}/{}", site_path, config.selif_path(), filename),
    ];
    paths.map(|path| {
        Cookie::build((ACCESS_KEY_COOKIE, value.to_string()))
            .path(path)
            .http_only(true)
            .build()
    })
}

/// Cookies remembering a validated key. Session cookies unless a lifetime
/// is configured.
pub fn remember_cookies(config: &Config, filename: &str, key: &str) -> Vec<Cookie<'static>> {
    access_cookies(config, filename, key)
        .into_iter()
        .map(|mut cookie| {
            if config.access_key_cookie_expiry_secs > 0 {
                let secs = i64::try_from(config.access_key_cookie_expiry_secs).unwrap_or(i64::MAX);
                cookie.set_max_age(time::Duration::seconds(secs));
            }
            cookie
        })
        .collect()
}

/// Cookies expiring the key on both paths.
pub fn clearing_cookies(config: &Config, filename: &str) -> Vec<Cookie<'static>> {
    access_cookies(config, filename, "")
        .into_iter()
        .map(|mut cookie| {
            cookie.set_max_age(time::Duration::ZERO);
            cookie.set_expires(time::OffsetDateTime::UNIX_EPOCH);
            cookie
        })
        .collect()
}

/// Outcome of a read-side access check
#[derive(Debug)]
pub struct AccessOutcome {
    pub granted: bool,
    /// Cookies to send back, whatever the decision
    pub set_cookies: Vec<Cookie<'static>>,
}

impl AccessOutcome {
    /// Append the `Set-Cookie` headers. The jar type keys cookies by name
    /// only, so the two paths are written as separate headers.
    pub fn apply(&self, response: &mut Response) {
        for cookie in &self.set_cookies {
            match HeaderValue::from_str(&cookie.to_string()) {
                Ok(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(e) => tracing::warn!(error = %e, "Skipping unencodable cookie"),
            }
        }
    }
}

/// Check access to `filename` and prepare the cookie changes that go with it.
pub fn authorize_read(
    config: &Config,
    filename: &str,
    metadata: &Metadata,
    jar: &CookieJar,
    headers: &HeaderMap,
    form: Option<&str>,
    query: Option<&str>,
) -> AccessOutcome {
    let candidates = AccessKeyCandidates::from_request(jar, headers, form, query);

    match check_access_key(metadata, &candidates) {
        AccessDecision::Public | AccessDecision::Granted(AccessKeySource::Cookie) => AccessOutcome {
            granted: true,
            set_cookies: Vec::new(),
        },
        AccessDecision::Granted(_) => AccessOutcome {
            granted: true,
            set_cookies: remember_cookies(config, filename, &metadata.access_key),
        },
        AccessDecision::Denied(AccessKeySource::Cookie) => {
            tracing::debug!(filename = %filename, "Clearing invalid access key cookie");
            AccessOutcome {
                granted: false,
                set_cookies: clearing_cookies(config, filename),
            }
        }
        AccessDecision::Denied(_) => AccessOutcome {
            granted: false,
            set_cookies: Vec::new(),
        },
    }
}
