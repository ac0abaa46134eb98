//! Outcome of the external authorization step.

use reqwest::Url;
use strum::Display;

/// How the external user-agent returned control to the app.
///
/// `Display` prints only the kind (`success`, `cancelled`, ...), so it is
/// safe to log; the authorization code never ends up in logs.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RedirectOutcome {
    /// The provider redirected back with an authorization code.
    Success { code: String, state: Option<String> },
    /// The user closed the authorization UI without finishing.
    Cancelled,
    /// The provider redirected back with an `error` parameter.
    Denied {
        error: String,
        description: Option<String>,
    },
    /// Control came back, but not in a shape we understand.
    Malformed(String),
}

impl RedirectOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Parse the full URL the provider redirected to.
    pub fn from_redirect_url(raw: &str) -> Self {
        match Url::parse(raw.trim()) {
            Ok(url) => Self::from_url(&url),
            Err(err) => Self::Malformed(format!("not a URL: {err}")),
        }
    }

    /// Parse an HTTP request target (`/callback?code=...`) relative to the
    /// redirect URI it was delivered to.
    pub fn from_request_target(redirect_uri: &Url, target: &str) -> Self {
        match redirect_uri.join(target) {
            Ok(url) => Self::from_url(&url),
            Err(err) => Self::Malformed(format!("bad request target: {err}")),
        }
    }

    fn from_url(url: &Url) -> Self {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut description = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Self::Denied { error, description };
        }
        match code.filter(|c| !c.is_empty()) {
            Some(code) => Self::Success { code, state },
            None => Self::Malformed("redirect carried no authorization code".to_string()),
        }
    }
}
