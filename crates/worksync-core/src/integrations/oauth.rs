//! OAuth2 Authorization Code flow pieces for the Upwork API.
//!
//! 1. Build the authorization URL with a fresh CSRF `state`
//! 2. Optionally listen on the redirect URI's localhost port for the callback
//! 3. Parse the token endpoint payload into a [`Credential`]

use rand::RngCore;
use serde_json::Value;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;

use crate::error::{ConfigError, CoreError, ValidationError};
use crate::storage::{Credential, Settings};

/// Bytes of randomness in the `state` parameter (hex-encoded on the wire).
pub const STATE_BYTES: usize = 16;

/// Longest token lifetime accepted from the token endpoint (one year).
pub const MAX_EXPIRES_IN_SECS: i64 = 365 * 24 * 60 * 60;

/// Where to send the user, and the state to expect back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Random hex CSRF token.
pub fn generate_state() -> String {
    let mut bytes = [0u8; STATE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Build the authorization redirect from settings.
///
/// # Errors
/// Fails if the client id or redirect URI is unset, or the configured
/// authorization URL is not a valid URL.
pub fn authorization_request(settings: &Settings) -> Result<AuthorizationRequest, ConfigError> {
    let client_id = settings.client_id()?;
    let redirect_uri = settings.redirect_uri()?;
    let state = generate_state();
    let scope = settings.scopes();

    let url = url::Url::parse_with_params(
        &settings.upwork.authorize_url,
        &[
            ("response_type", "code"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("scope", scope.as_str()),
            ("state", state.as_str()),
        ],
    )
    .map_err(|e| ConfigError::InvalidValue {
        key: "UPWORK_AUTHORIZE_URL".into(),
        message: e.to_string(),
    })?;

    Ok(AuthorizationRequest {
        url: url.to_string(),
        state,
    })
}

/// Parsed body of a successful token endpoint response.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPayload {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub scope: Option<String>,
}

impl TokenPayload {
    /// # Errors
    /// Fails when `access_token` or a numeric `expires_in` is missing.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let access_token = body
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ValidationError::MissingField("access_token".into()))?
            .to_string();

        let expires_in = match body.get("expires_in") {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(|| ValidationError::invalid("expires_in", "not an integer"))?,
            Some(Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| ValidationError::invalid("expires_in", format!("'{s}' is not numeric")))?,
            Some(_) => return Err(ValidationError::invalid("expires_in", "not numeric")),
            None => return Err(ValidationError::MissingField("expires_in".into())),
        };
        if expires_in <= 0 {
            return Err(ValidationError::invalid("expires_in", "must be positive"));
        }
        if expires_in > MAX_EXPIRES_IN_SECS {
            return Err(ValidationError::invalid(
                "expires_in",
                format!("exceeds {MAX_EXPIRES_IN_SECS} seconds"),
            ));
        }

        let refresh_token = body
            .get("refresh_token")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from);
        let scope = body.get("scope").and_then(Value::as_str).map(String::from);

        Ok(Self {
            access_token,
            refresh_token,
            expires_in,
            scope,
        })
    }

    /// Build the credential to persist, expiring `expires_in` seconds after `now_ms`.
    ///
    /// `fallback_refresh` is used when the server did not rotate the refresh token.
    pub fn into_credential(
        self,
        fallback_refresh: Option<&str>,
        now_ms: i64,
    ) -> Result<Credential, ValidationError> {
        let refresh_token = self
            .refresh_token
            .or_else(|| fallback_refresh.map(String::from))
            .ok_or_else(|| ValidationError::MissingField("refresh_token".into()))?;
        let expires_at = self
            .expires_in
            .checked_mul(1000)
            .and_then(|ms| now_ms.checked_add(ms))
            .ok_or_else(|| ValidationError::invalid("expires_in", "lifetime overflows"))?;

        Ok(Credential {
            access_token: self.access_token,
            refresh_token,
            expires_at,
            scope: self.scope,
        })
    }
}

/// Query parameters delivered to the redirect URI.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Localhost port a redirect URI points at.
pub fn redirect_port(redirect_uri: &str) -> Result<u16, ConfigError> {
    let url = url::Url::parse(redirect_uri).map_err(|e| ConfigError::InvalidValue {
        key: "UPWORK_REDIRECT_URI".into(),
        message: e.to_string(),
    })?;
    url.port_or_known_default().ok_or_else(|| ConfigError::InvalidValue {
        key: "UPWORK_REDIRECT_URI".into(),
        message: "no port".into(),
    })
}

/// Most bytes read from the callback connection.
const MAX_REQUEST_BYTES: u64 = 16 * 1024;

/// Block until one HTTP request arrives on `127.0.0.1:port` and return its query.
pub fn wait_for_callback(port: u16) -> Result<CallbackParams, CoreError> {
    let listener = TcpListener::bind(format!("127.0.0.1:{port}"))?;
    accept_callback(&listener)
}

/// Accept one connection on `listener` and answer it once the request line is in.
pub fn accept_callback(listener: &TcpListener) -> Result<CallbackParams, CoreError> {
    listener.set_nonblocking(false)?;
    let (mut stream, _) = listener.accept()?;

    // The request line may span several reads; headers are drained before replying.
    let mut request_line = String::new();
    {
        let mut reader = BufReader::new(Read::by_ref(&mut stream).take(MAX_REQUEST_BYTES));
        reader.read_line(&mut request_line)?;
        let mut header = String::new();
        while reader.read_line(&mut header)? > 0 && !header.trim().is_empty() {
            header.clear();
        }
    }

    let params = parse_callback_request(&request_line).ok_or_else(|| {
        ValidationError::MissingParameter("malformed callback request".into())
    })?;

    let response = "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h2>Authorization received.</h2><p>You can close this tab.</p><script>window.close()</script></body></html>";
    stream.write_all(response.as_bytes())?;
    Ok(params)
}

/// Extract callback parameters from the raw request line `GET /callback?code=..`.
pub fn parse_callback_request(request: &str) -> Option<CallbackParams> {
    let first_line = request.lines().next()?;
    let path = first_line.split_whitespace().nth(1)?;
    let url = url::Url::parse(&format!("http://localhost{path}")).ok()?;

    let mut params = CallbackParams::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            _ => {}
        }
    }
    Some(params)
}
