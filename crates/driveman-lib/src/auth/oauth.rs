//! OAuth consent flow: authorization URL with PKCE, then code exchange.

use oauth2::basic::BasicClient;
use oauth2::url::Url;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};

use crate::config::dynamic::DynamicConfig;
use crate::errors::{DrivemanError, Result};

/// Scopes requested at consent time.
pub const SCOPES: [&str; 4] = [
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/drive.file",
    "https://www.googleapis.com/auth/userinfo.profile",
    "https://www.googleapis.com/auth/userinfo.email",
];

/// Token lifetime assumed when the provider does not say.
pub const DEFAULT_EXPIRES_IN: u64 = 3600;

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Access token handed back by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN
}

impl TokenGrant {
    pub fn new(access_token: impl Into<String>, expires_in: Option<u64>) -> Result<Self> {
        let access_token = access_token.into().trim().to_string();
        if access_token.is_empty() {
            return Err(DrivemanError::Validation("Access token cannot be empty".into()));
        }
        Ok(Self {
            access_token,
            expires_in: expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
        })
    }
}

/// State kept between showing the consent URL and exchanging the code.
pub struct PendingAuthorization {
    pub url: Url,
    csrf: CsrfToken,
    verifier: PkceCodeVerifier,
}

impl PendingAuthorization {
    pub fn csrf_state(&self) -> &str {
        self.csrf.secret()
    }
}

/// Authorization-code flow against the configured provider.
pub struct OAuthFlow {
    client: ConfiguredClient,
    http: oauth2::reqwest::Client,
}

impl OAuthFlow {
    pub fn from_config(config: &DynamicConfig) -> Result<Self> {
        if config.client_id.trim().is_empty() {
            return Err(DrivemanError::Config(
                "No OAuth client id configured. Set one with `driveman config set clientId <ID>` \
                 or the DRIVEMAN_CLIENT_ID environment variable."
                    .into(),
            ));
        }

        let auth_url = AuthUrl::new(config.auth_url.clone())
            .map_err(|e| DrivemanError::Config(format!("Invalid auth URL: {e}")))?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| DrivemanError::Config(format!("Invalid token URL: {e}")))?;
        let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
            .map_err(|e| DrivemanError::Config(format!("Invalid redirect URI: {e}")))?;

        let mut client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);
        if !config.client_secret.is_empty() {
            client = client.set_client_secret(ClientSecret::new(config.client_secret.clone()));
        }

        // The token endpoint must not be allowed to redirect (SSRF).
        let http = oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| DrivemanError::OAuth2(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, http })
    }

    /// Consent URL with every scope, a PKCE S256 challenge and a CSRF state.
    pub fn authorize(&self) -> PendingAuthorization {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        let (url, csrf) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(SCOPES.iter().map(|s| Scope::new(s.to_string())))
            .set_pkce_challenge(challenge)
            .url();

        PendingAuthorization {
            url,
            csrf,
            verifier,
        }
    }

    /// Exchange what the user pasted (a bare code, or the whole redirect URL)
    /// for an access token.
    pub async fn exchange(&self, pending: PendingAuthorization, pasted: &str) -> Result<TokenGrant> {
        let code = extract_code(pasted, pending.csrf.secret())?;

        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pending.verifier)
            .request_async(&self.http)
            .await
            .map_err(|e| DrivemanError::OAuth2(format!("Token exchange failed: {e}")))?;

        let expires_in = response.expires_in().map(|d| d.as_secs());
        tracing::debug!(?expires_in, "token exchange succeeded");
        TokenGrant::new(response.access_token().secret().clone(), expires_in)
    }
}

/// Pull the authorization code out of pasted input.
///
/// A redirect URL must carry `code` and, when present, a `state` equal to the
/// one we issued. Anything else is taken as the code itself.
pub fn extract_code(pasted: &str, expected_state: &str) -> Result<String> {
    let pasted = pasted.trim();
    if pasted.is_empty() {
        return Err(DrivemanError::Validation("Authorization code is required".into()));
    }

    let url = match Url::parse(pasted) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        _ => return Ok(pasted.to_string()),
    };

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => {
                return Err(DrivemanError::OAuth2(format!(
                    "Authorization was denied: {value}"
                )))
            }
            _ => {}
        }
    }

    if let Some(state) = state {
        if state != expected_state {
            return Err(DrivemanError::OAuth2(
                "State mismatch in redirect URL; start the login again".into(),
            ));
        }
    }
    code.ok_or_else(|| DrivemanError::Validation("No authorization code in the pasted URL".into()))
}
