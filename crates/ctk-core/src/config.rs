//! Configuration management for the test kit.
//!
//! Configuration is read from a TOML file (an explicit path, or
//! `~/.ctk/ctk.toml`), then `.env` and `CTK_*` environment variables are
//! applied on top.
//!
//! ```toml
//! [idp]
//! entity_id = "https://idp.example.org"
//! signing_certificate = "idp.pem"
//! sso = { redirect = "https://idp.example.org/sso", post = "https://idp.example.org/sso" }
//! slo = { redirect = "https://idp.example.org/slo", post = "https://idp.example.org/slo" }
//!
//! [[service_providers]]
//! entity_id = "https://sp1.example.org"
//! acs_url = "https://sp1.example.org/acs"
//! slo_url = "https://sp1.example.org/slo"
//! signing_key = "sp1.key"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Complete test kit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CtkConfig {
    /// The identity provider under test.
    #[serde(default)]
    pub idp: IdpConfig,
    /// Service providers the kit plays, in order. Multi-SP scenarios use the
    /// first two.
    #[serde(default)]
    pub service_providers: Vec<ServiceProviderConfig>,
    /// Test user.
    #[serde(default)]
    pub user: UserConfig,
    /// Network timeouts.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Rule toggles for the verification engine.
    #[serde(default)]
    pub verification: VerificationConfig,
}

/// Identity provider under test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdpConfig {
    /// Entity ID; the expected `Issuer` of everything the IdP sends.
    #[serde(default)]
    pub entity_id: String,
    /// Single Sign-On endpoints.
    #[serde(default)]
    pub sso: BindingEndpoints,
    /// Single Logout endpoints.
    #[serde(default)]
    pub slo: BindingEndpoints,
    /// PEM certificate or public key the IdP signs with.
    pub signing_certificate: Option<PathBuf>,
}

/// One URL per binding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingEndpoints {
    /// HTTP-Redirect endpoint.
    pub redirect: Option<String>,
    /// HTTP-POST endpoint.
    pub post: Option<String>,
}

impl BindingEndpoints {
    /// Same URL for both bindings.
    #[must_use]
    pub fn both(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            redirect: Some(url.clone()),
            post: Some(url),
        }
    }

    fn is_empty(&self) -> bool {
        self.redirect.is_none() && self.post.is_none()
    }
}

/// A service provider impersonated by the kit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceProviderConfig {
    /// Entity ID, as registered with the IdP.
    pub entity_id: String,
    /// Assertion Consumer Service URL.
    pub acs_url: String,
    /// Single Logout Service URL.
    pub slo_url: String,
    /// PEM private key used to sign requests and responses. An ephemeral key
    /// is generated when absent.
    pub signing_key: Option<PathBuf>,
    /// PEM certificate matching `signing_key`, embedded in XML signatures.
    pub certificate: Option<PathBuf>,
    /// SP metadata file; enables ACS resolution by index.
    pub metadata: Option<PathBuf>,
    /// NameID format URI requested in `AuthnRequest`s.
    pub name_id_format: Option<String>,
    /// XML-DSig signature method URI.
    pub signature_algorithm: Option<String>,
}

/// Test user credentials and login form field names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Username.
    #[serde(default)]
    pub username: String,
    /// Password.
    #[serde(default, skip_serializing)]
    pub password: String,
    /// Name of the login form's username field.
    #[serde(default = "default_username_field")]
    pub username_field: String,
    /// Name of the login form's password field.
    #[serde(default = "default_password_field")]
    pub password_field: String,
}

fn default_username_field() -> String {
    "username".to_string()
}

fn default_password_field() -> String {
    "password".to_string()
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            username_field: default_username_field(),
            password_field: default_password_field(),
        }
    }
}

/// Network timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_secs")]
    pub request_secs: u64,
}

const fn default_request_secs() -> u64 {
    30
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: default_request_secs(),
        }
    }
}

/// Rule toggles for the verification engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Accepted clock difference in seconds for time windows.
    #[serde(default = "default_clock_skew_secs")]
    pub clock_skew_secs: u64,
    /// Check the returned NameID format against the requested NameIDPolicy.
    #[serde(default)]
    pub enforce_name_id_policy: bool,
    /// Require a `Destination` on signed messages.
    #[serde(default = "enabled")]
    pub require_signed_destination: bool,
    /// Reject IdP messages that carry no signature at all.
    #[serde(default = "enabled")]
    pub require_signatures: bool,
}

const fn default_clock_skew_secs() -> u64 {
    60
}

const fn enabled() -> bool {
    true
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            clock_skew_secs: default_clock_skew_secs(),
            enforce_name_id_policy: false,
            require_signed_destination: true,
            require_signatures: true,
        }
    }
}

impl CtkConfig {
    /// Loads the configuration.
    ///
    /// Reads `path` when given, otherwise `~/.ctk/ctk.toml` if it exists,
    /// otherwise starts from defaults. `.env` and `CTK_*` overrides are
    /// applied last, then the result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, an override is
    /// malformed, or the result fails [`CtkConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    tracing::debug!("no configuration file found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Self::from_toml(&content)
    }

    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Default configuration path, `~/.ctk/ctk.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".ctk").join("ctk.toml"))
    }

    /// Applies `CTK_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOverride`] for numbers or booleans that do
    /// not parse.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("CTK_IDP_ENTITY_ID") {
            self.idp.entity_id = v;
        }
        if let Some(v) = lookup("CTK_IDP_SSO_URL") {
            self.idp.sso = BindingEndpoints::both(v);
        }
        if let Some(v) = lookup("CTK_IDP_SLO_URL") {
            self.idp.slo = BindingEndpoints::both(v);
        }
        if let Some(v) = lookup("CTK_IDP_SSO_REDIRECT_URL") {
            self.idp.sso.redirect = Some(v);
        }
        if let Some(v) = lookup("CTK_IDP_SSO_POST_URL") {
            self.idp.sso.post = Some(v);
        }
        if let Some(v) = lookup("CTK_IDP_SLO_REDIRECT_URL") {
            self.idp.slo.redirect = Some(v);
        }
        if let Some(v) = lookup("CTK_IDP_SLO_POST_URL") {
            self.idp.slo.post = Some(v);
        }
        if let Some(v) = lookup("CTK_IDP_CERTIFICATE") {
            self.idp.signing_certificate = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("CTK_USERNAME") {
            self.user.username = v;
        }
        if let Some(v) = lookup("CTK_PASSWORD") {
            self.user.password = v;
        }
        if let Some(v) = lookup("CTK_TIMEOUT_SECS") {
            self.timeouts.request_secs = parse_override("CTK_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = lookup("CTK_CLOCK_SKEW_SECS") {
            self.verification.clock_skew_secs = parse_override("CTK_CLOCK_SKEW_SECS", v)?;
        }
        if let Some(v) = lookup("CTK_ENFORCE_NAME_ID_POLICY") {
            self.verification.enforce_name_id_policy =
                parse_override("CTK_ENFORCE_NAME_ID_POLICY", v)?;
        }
        Ok(())
    }

    /// Checks that the configuration describes a runnable setup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.idp.entity_id.trim().is_empty() {
            return Err(Error::Validation("idp.entity_id is required".to_string()));
        }
        if self.idp.sso.is_empty() && self.idp.slo.is_empty() {
            return Err(Error::Validation(
                "the idp needs at least one sso or slo endpoint".to_string(),
            ));
        }
        if self.service_providers.is_empty() {
            return Err(Error::Validation(
                "at least one service provider is required".to_string(),
            ));
        }
        for (i, sp) in self.service_providers.iter().enumerate() {
            if sp.entity_id.trim().is_empty() {
                return Err(Error::Validation(format!(
                    "service_providers[{i}].entity_id is required"
                )));
            }
            if sp.acs_url.trim().is_empty() || sp.slo_url.trim().is_empty() {
                return Err(Error::Validation(format!(
                    "service provider {} needs acs_url and slo_url",
                    sp.entity_id
                )));
            }
            if self.service_providers[..i]
                .iter()
                .any(|other| other.entity_id == sp.entity_id)
            {
                return Err(Error::Validation(format!(
                    "service provider {} is listed twice",
                    sp.entity_id
                )));
            }
        }
        if self.timeouts.request_secs == 0 {
            return Err(Error::Validation(
                "timeouts.request_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(name: &str, value: String) -> Result<T> {
    value.trim().parse().map_err(|_| Error::InvalidOverride {
        name: name.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
        [idp]
        entity_id = "https://idp.example.org"
        sso = { redirect = "https://idp.example.org/sso/redirect", post = "https://idp.example.org/sso/post" }
        slo = { redirect = "https://idp.example.org/slo" }

        [[service_providers]]
        entity_id = "https://sp1.example.org"
        acs_url = "https://sp1.example.org/acs"
        slo_url = "https://sp1.example.org/slo"

        [[service_providers]]
        entity_id = "https://sp2.example.org"
        acs_url = "https://sp2.example.org/acs"
        slo_url = "https://sp2.example.org/slo"
        name_id_format = "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent"

        [user]
        username = "alice"
        password = "secret"

        [verification]
        enforce_name_id_policy = true
    "#;

    #[test]
    fn parses_sample() {
        let config = CtkConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.idp.entity_id, "https://idp.example.org");
        assert_eq!(config.idp.slo.post, None);
        assert_eq!(config.service_providers.len(), 2);
        assert_eq!(config.user.username_field, "username");
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(config.verification.enforce_name_id_policy);
        assert!(config.verification.require_signed_destination);
        assert_eq!(config.verification.clock_skew_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn defaults_do_not_validate() {
        let err = CtkConfig::default().validate().unwrap_err();
        assert!(err.is_user_error());
        assert!(err.to_string().contains("idp.entity_id"));
    }

    #[test]
    fn duplicate_service_providers_are_rejected() {
        let mut config = CtkConfig::from_toml(SAMPLE).unwrap();
        config.service_providers[1].entity_id = config.service_providers[0].entity_id.clone();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn environment_overrides() {
        let env: HashMap<&str, &str> = [
            ("CTK_IDP_SLO_URL", "https://other.example.org/slo"),
            ("CTK_PASSWORD", "from-env"),
            ("CTK_TIMEOUT_SECS", "5"),
        ]
        .into_iter()
        .collect();

        let mut config = CtkConfig::from_toml(SAMPLE).unwrap();
        config
            .apply_overrides(|name| env.get(name).map(|v| (*v).to_string()))
            .unwrap();
        assert_eq!(
            config.idp.slo,
            BindingEndpoints::both("https://other.example.org/slo")
        );
        assert_eq!(config.user.password, "from-env");
        assert_eq!(config.timeouts.request_secs, 5);
    }

    #[test]
    fn malformed_override_is_reported() {
        let mut config = CtkConfig::default();
        let err = config
            .apply_overrides(|name| (name == "CTK_CLOCK_SKEW_SECS").then(|| "a minute".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidOverride { .. }));
    }

    #[test]
    fn password_is_not_written_back() {
        let config = CtkConfig::from_toml(SAMPLE).unwrap();
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("secret"));
    }
}
