//! Credential and gateway resolution.
//!
//! # Design
//! `ClientConfig::new` is the explicit factory: it takes a token and a
//! gateway and does nothing else. Falling back to the process environment
//! is a separate strategy (`resolve` with a lookup function, and `from_env`
//! which plugs in `std::env::var`), so the client type itself never reads
//! global state.
//!
//! Two surfaces share one token. The app gateway (`gateway`) authenticates
//! with [`AUTH_HEADER`]; the console OpenAPI ([`OpenApiConfig`]) lives on a
//! different host under a prefix and version and uses plain
//! [`OPENAPI_AUTH_HEADER`].

use std::fmt;
use std::time::Duration;

use crate::error::ApiError;

/// Environment variable holding the secret token.
pub const TOKEN_ENV: &str = "APPBUILDER_TOKEN";
/// Environment variable overriding the gateway base URL.
pub const GATEWAY_ENV: &str = "GATEWAY_URL";
/// Gateway used when neither an explicit value nor the environment provide one.
pub const DEFAULT_GATEWAY: &str = "https://appbuilder.baidu.com";

pub const OPENAPI_GATEWAY_ENV: &str = "GATEWAY_URL_V2";
pub const OPENAPI_PREFIX_ENV: &str = "CONSOLE_OPENAPI_PREFIX";
pub const OPENAPI_VERSION_ENV: &str = "CONSOLE_OPENAPI_VERSION";
/// Environment variable replacing the `Bearer` scheme of the token.
pub const TOKEN_SCHEME_ENV: &str = "SECRET_KEY_PREFIX";

pub const DEFAULT_OPENAPI_GATEWAY: &str = "https://qianfan.baidubce.com";
pub const DEFAULT_OPENAPI_PREFIX: &str = "";
pub const DEFAULT_OPENAPI_VERSION: &str = "/v2";
pub const DEFAULT_TOKEN_SCHEME: &str = "Bearer";

/// Vendor header carrying the (Bearer-prefixed) token on app gateway requests.
pub const AUTH_HEADER: &str = "X-Appbuilder-Authorization";
/// Standard header carrying the same token on console OpenAPI requests.
pub const OPENAPI_AUTH_HEADER: &str = "Authorization";
/// Vendor response header carrying the gateway-assigned request id.
pub const REQUEST_ID_HEADER: &str = "X-Appbuilder-Request-Id";

/// How long to wait for response headers before giving up.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(300);

/// Location of the console OpenAPI: `gateway + prefix + version + path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenApiConfig {
    pub gateway: String,
    pub prefix: String,
    pub version: String,
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            gateway: DEFAULT_OPENAPI_GATEWAY.to_string(),
            prefix: DEFAULT_OPENAPI_PREFIX.to_string(),
            version: DEFAULT_OPENAPI_VERSION.to_string(),
        }
    }
}

impl OpenApiConfig {
    /// Base URL that OpenAPI paths are appended to.
    pub fn base_url(&self) -> String {
        format!("{}{}{}", self.gateway, self.prefix, self.version)
    }
}

/// Resolved identity of a client: normalized token plus gateway base URLs.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    token: String,
    gateway: String,
    openapi: OpenApiConfig,
    response_timeout: Duration,
    body_limit: u64,
}

impl ClientConfig {
    /// Build a configuration from explicit values.
    ///
    /// Fails with `ApiError::Config` when `token` is empty. The token is
    /// prefixed with `"Bearer "` unless it already carries that prefix.
    pub fn new(token: &str, gateway: &str) -> Result<Self, ApiError> {
        Self::with_scheme(token, gateway, DEFAULT_TOKEN_SCHEME)
    }

    fn with_scheme(token: &str, gateway: &str, scheme: &str) -> Result<Self, ApiError> {
        if token.is_empty() {
            return Err(ApiError::Config(format!("token is empty; set {TOKEN_ENV}")));
        }
        Ok(Self {
            token: normalize_token(token, scheme),
            gateway: gateway.to_string(),
            openapi: OpenApiConfig::default(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            body_limit: u64::MAX,
        })
    }

    /// Resolve token and gateways from explicit values, falling back to `lookup`.
    ///
    /// Empty strings count as absent. An explicit token short-circuits the
    /// token lookup; the gateway falls back to [`DEFAULT_GATEWAY`]. The
    /// OpenAPI location and the token scheme come from `lookup` or their
    /// defaults.
    pub fn resolve<F>(
        explicit_token: Option<&str>,
        explicit_gateway: Option<&str>,
        lookup: F,
    ) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = match non_empty(explicit_token) {
            Some(token) => token.to_string(),
            None => lookup(TOKEN_ENV)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| ApiError::Config(format!("no token given and {TOKEN_ENV} is not set")))?,
        };
        let gateway = match non_empty(explicit_gateway) {
            Some(gateway) => gateway.to_string(),
            None => lookup_or(&lookup, GATEWAY_ENV, DEFAULT_GATEWAY),
        };
        let scheme = lookup_or(&lookup, TOKEN_SCHEME_ENV, DEFAULT_TOKEN_SCHEME);
        let openapi = OpenApiConfig {
            gateway: lookup_or(&lookup, OPENAPI_GATEWAY_ENV, DEFAULT_OPENAPI_GATEWAY),
            prefix: lookup_or(&lookup, OPENAPI_PREFIX_ENV, DEFAULT_OPENAPI_PREFIX),
            version: lookup_or(&lookup, OPENAPI_VERSION_ENV, DEFAULT_OPENAPI_VERSION),
        };
        Ok(Self::with_scheme(&token, &gateway, &scheme)?.with_openapi(openapi))
    }

    /// `resolve` backed by the process environment.
    pub fn from_env(explicit_token: Option<&str>, explicit_gateway: Option<&str>) -> Result<Self, ApiError> {
        Self::resolve(explicit_token, explicit_gateway, |key| std::env::var(key).ok())
    }

    /// Bound the wait for response headers. Reading the body, including a
    /// long event stream, is not limited by this.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Cap the size of bodies buffered by `execute`. Unlimited by default;
    /// a larger body fails with `ApiError::Transport`.
    pub fn with_body_limit(mut self, limit: u64) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn with_openapi(mut self, openapi: OpenApiConfig) -> Self {
        self.openapi = openapi;
        self
    }

    /// The normalized token, exactly as sent in the auth header.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    pub fn openapi(&self) -> &OpenApiConfig {
        &self.openapi
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    pub fn body_limit(&self) -> u64 {
        self.body_limit
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &"<redacted>")
            .field("gateway", &self.gateway)
            .field("openapi", &self.openapi)
            .field("response_timeout", &self.response_timeout)
            .field("body_limit", &self.body_limit)
            .finish()
    }
}

fn normalize_token(token: &str, scheme: &str) -> String {
    let prefix = format!("{scheme} ");
    if token.starts_with(&prefix) {
        token.to_string()
    } else {
        format!("{prefix}{token}")
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn lookup_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string())
}
