//! The parties of a scenario: the identity provider under test and the
//! service providers the kit plays.

use std::path::Path;

use ctk_core::{BindingEndpoints, CtkConfig, IdpConfig, ServiceProviderConfig};
use ctk_crypto::RsaAlgorithm;
use ctk_saml::messages::NameIdPolicy;
use ctk_saml::metadata::{EntityInformation, SpMetadata};
use ctk_saml::signature::{pem_to_der, RedirectSigner, SigningKey, VerificationKey, XmlSigner};
use ctk_saml::{rsa_algorithm_from_uri, NameIdFormat, SamlBinding};

use crate::error::{ScenarioError, ScenarioResult};

const SUPPORTED_BINDINGS: [SamlBinding; 2] = [SamlBinding::HttpRedirect, SamlBinding::HttpPost];

/// The identity provider under test.
#[derive(Debug, Clone)]
pub struct IdentityProvider {
    entity_id: String,
    sso: Vec<(SamlBinding, String)>,
    slo: Vec<(SamlBinding, String)>,
    keys: Vec<VerificationKey>,
}

impl IdentityProvider {
    /// Creates an identity provider with no endpoints or keys.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            sso: Vec::new(),
            slo: Vec::new(),
            keys: Vec::new(),
        }
    }

    /// Adds a Single Sign-On endpoint.
    #[must_use]
    pub fn with_sso_endpoint(mut self, binding: SamlBinding, url: impl Into<String>) -> Self {
        self.sso.push((binding, url.into()));
        self
    }

    /// Adds a Single Logout endpoint.
    #[must_use]
    pub fn with_slo_endpoint(mut self, binding: SamlBinding, url: impl Into<String>) -> Self {
        self.slo.push((binding, url.into()));
        self
    }

    /// Trusts `key` for the IdP's signatures.
    #[must_use]
    pub fn with_verification_key(mut self, key: VerificationKey) -> Self {
        self.keys.push(key);
        self
    }

    /// Builds the identity provider from configuration, reading its signing
    /// certificate.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Configuration`] if the certificate cannot be
    /// read.
    pub fn from_config(config: &IdpConfig) -> ScenarioResult<Self> {
        let mut idp = Self::new(&config.entity_id);
        for (binding, url) in by_binding(&config.sso) {
            idp = idp.with_sso_endpoint(binding, url);
        }
        for (binding, url) in by_binding(&config.slo) {
            idp = idp.with_slo_endpoint(binding, url);
        }
        if let Some(path) = &config.signing_certificate {
            let key = VerificationKey::from_pem(&read_file(path)?)
                .map_err(|e| configuration(path, e))?;
            idp = idp.with_verification_key(key);
        } else {
            tracing::warn!(
                idp = %config.entity_id,
                "no IdP signing certificate configured, embedded signatures will not be checked"
            );
        }
        Ok(idp)
    }

    /// Entity ID.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Single Sign-On endpoint for `binding`.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Configuration`] if none is configured.
    pub fn sso_url(&self, binding: SamlBinding) -> ScenarioResult<&str> {
        endpoint(&self.sso, binding, "SSO")
    }

    /// Single Logout endpoint for `binding`.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Configuration`] if none is configured.
    pub fn slo_url(&self, binding: SamlBinding) -> ScenarioResult<&str> {
        endpoint(&self.slo, binding, "SLO")
    }

    /// Keys trusted for the IdP's signatures.
    #[must_use]
    pub fn verification_keys(&self) -> &[VerificationKey] {
        &self.keys
    }
}

fn by_binding(endpoints: &BindingEndpoints) -> impl Iterator<Item = (SamlBinding, &str)> {
    [
        (SamlBinding::HttpRedirect, endpoints.redirect.as_deref()),
        (SamlBinding::HttpPost, endpoints.post.as_deref()),
    ]
    .into_iter()
    .filter_map(|(binding, url)| url.map(|url| (binding, url)))
}

fn endpoint<'a>(
    endpoints: &'a [(SamlBinding, String)],
    binding: SamlBinding,
    service: &str,
) -> ScenarioResult<&'a str> {
    endpoints
        .iter()
        .find(|(b, _)| *b == binding)
        .map(|(_, url)| url.as_str())
        .ok_or_else(|| {
            ScenarioError::Configuration(format!(
                "the identity provider has no {service} endpoint for {}",
                binding.short_name()
            ))
        })
}

/// A service provider impersonated by the kit.
#[derive(Clone)]
pub struct ServiceProvider {
    entity_id: String,
    acs_url: String,
    slo_url: String,
    key: SigningKey,
    certificate: Option<Vec<u8>>,
    metadata: Option<EntityInformation>,
    name_id_policy: Option<NameIdPolicy>,
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("entity_id", &self.entity_id)
            .field("acs_url", &self.acs_url)
            .field("slo_url", &self.slo_url)
            .field("metadata", &self.metadata.is_some())
            .finish_non_exhaustive()
    }
}

impl ServiceProvider {
    /// Creates a service provider that signs with `key`.
    #[must_use]
    pub fn new(
        entity_id: impl Into<String>,
        acs_url: impl Into<String>,
        slo_url: impl Into<String>,
        key: SigningKey,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            acs_url: acs_url.into(),
            slo_url: slo_url.into(),
            key,
            certificate: None,
            metadata: None,
            name_id_policy: None,
        }
    }

    /// Embeds `certificate_der` in XML signatures.
    #[must_use]
    pub fn with_certificate(mut self, certificate_der: Vec<u8>) -> Self {
        self.certificate = Some(certificate_der);
        self
    }

    /// Attaches the SP's metadata for ACS resolution.
    #[must_use]
    pub fn with_metadata(mut self, metadata: EntityInformation) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Requests `policy` in every `AuthnRequest`.
    #[must_use]
    pub fn with_name_id_policy(mut self, policy: NameIdPolicy) -> Self {
        self.name_id_policy = Some(policy);
        self
    }

    /// Builds a service provider from configuration.
    ///
    /// A missing `signing_key` is replaced by a freshly generated one; the
    /// IdP will then only accept the SP's messages if it does not check
    /// their signatures.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Configuration`] for unreadable keys,
    /// certificates or metadata, and for unknown algorithm or NameID
    /// format URIs.
    pub fn from_config(config: &ServiceProviderConfig) -> ScenarioResult<Self> {
        let algorithm = match &config.signature_algorithm {
            Some(uri) => rsa_algorithm_from_uri(uri).ok_or_else(|| {
                ScenarioError::Configuration(format!("unknown signature algorithm {uri}"))
            })?,
            None => RsaAlgorithm::Rs256,
        };

        let key = match &config.signing_key {
            Some(path) => SigningKey::from_pem(&read_file(path)?, algorithm)
                .map_err(|e| configuration(path, e))?,
            None => {
                tracing::warn!(sp = %config.entity_id, "no signing key configured, generating one");
                let material = ctk_crypto::generate_rsa_key()
                    .map_err(|e| ScenarioError::Configuration(e.to_string()))?;
                SigningKey::new(material.private_key_pkcs8, algorithm)
                    .map_err(|e| ScenarioError::Configuration(e.to_string()))?
            }
        };

        let mut sp = Self::new(&config.entity_id, &config.acs_url, &config.slo_url, key);

        if let Some(path) = &config.certificate {
            let der = pem_to_der(&read_file(path)?, "CERTIFICATE").ok_or_else(|| {
                ScenarioError::Configuration(format!("{}: no CERTIFICATE block", path.display()))
            })?;
            sp = sp.with_certificate(der);
        }
        if let Some(path) = &config.metadata {
            let metadata = SpMetadata::load(path, &SUPPORTED_BINDINGS)
                .map_err(|e| configuration(path, e))?;
            let entity = metadata
                .require(&config.entity_id)
                .map_err(|e| configuration(path, e))?;
            sp = sp.with_metadata(entity.clone());
        }
        if let Some(uri) = &config.name_id_format {
            let format = NameIdFormat::from_uri(uri).ok_or_else(|| {
                ScenarioError::Configuration(format!("unknown NameID format {uri}"))
            })?;
            sp = sp.with_name_id_policy(NameIdPolicy::with_format(format));
        }
        Ok(sp)
    }

    /// Entity ID.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Assertion Consumer Service URL.
    #[must_use]
    pub fn acs_url(&self) -> &str {
        &self.acs_url
    }

    /// Single Logout Service URL.
    #[must_use]
    pub fn slo_url(&self) -> &str {
        &self.slo_url
    }

    /// Metadata, when configured.
    #[must_use]
    pub const fn metadata(&self) -> Option<&EntityInformation> {
        self.metadata.as_ref()
    }

    /// Requested NameID policy.
    #[must_use]
    pub const fn name_id_policy(&self) -> Option<&NameIdPolicy> {
        self.name_id_policy.as_ref()
    }

    /// Signer for Redirect query strings.
    #[must_use]
    pub fn redirect_signer(&self) -> RedirectSigner {
        RedirectSigner::new(self.key.clone())
    }

    /// Signer for enveloped XML signatures.
    #[must_use]
    pub fn xml_signer(&self) -> XmlSigner {
        let signer = XmlSigner::new(self.key.clone());
        match &self.certificate {
            Some(der) => signer.with_certificate(der.clone()),
            None => signer,
        }
    }
}

/// Every party of a run.
#[derive(Debug, Clone)]
pub struct Participants {
    /// The identity provider under test.
    pub idp: IdentityProvider,
    /// Impersonated service providers, in configuration order.
    pub service_providers: Vec<ServiceProvider>,
}

impl Participants {
    /// Builds all parties from configuration.
    ///
    /// # Errors
    ///
    /// See [`IdentityProvider::from_config`] and
    /// [`ServiceProvider::from_config`].
    pub fn from_config(config: &CtkConfig) -> ScenarioResult<Self> {
        Ok(Self {
            idp: IdentityProvider::from_config(&config.idp)?,
            service_providers: config
                .service_providers
                .iter()
                .map(ServiceProvider::from_config)
                .collect::<ScenarioResult<_>>()?,
        })
    }

    /// The SP that starts every flow.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Configuration`] if no SP is configured.
    pub fn primary(&self) -> ScenarioResult<&ServiceProvider> {
        self.service_providers
            .first()
            .ok_or_else(|| ScenarioError::Configuration("no service provider configured".into()))
    }

    /// The second session participant of multi-SP scenarios.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Configuration`] if fewer than two SPs are
    /// configured.
    pub fn secondary(&self) -> ScenarioResult<&ServiceProvider> {
        self.service_providers.get(1).ok_or_else(|| {
            ScenarioError::Configuration("multi-SP scenarios need two service providers".into())
        })
    }
}

fn read_file(path: &Path) -> ScenarioResult<String> {
    std::fs::read_to_string(path).map_err(|e| configuration(path, e))
}

fn configuration(path: &Path, err: impl std::fmt::Display) -> ScenarioError {
    ScenarioError::Configuration(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idp_config() -> IdpConfig {
        IdpConfig {
            entity_id: "https://idp.example.org".to_string(),
            sso: BindingEndpoints {
                redirect: Some("https://idp.example.org/sso".to_string()),
                post: None,
            },
            slo: BindingEndpoints::both("https://idp.example.org/slo"),
            signing_certificate: None,
        }
    }

    #[test]
    fn endpoints_are_looked_up_per_binding() {
        let idp = IdentityProvider::from_config(&idp_config()).unwrap();
        assert_eq!(
            idp.sso_url(SamlBinding::HttpRedirect).unwrap(),
            "https://idp.example.org/sso"
        );
        assert!(matches!(
            idp.sso_url(SamlBinding::HttpPost),
            Err(ScenarioError::Configuration(_))
        ));
        assert_eq!(
            idp.slo_url(SamlBinding::HttpPost).unwrap(),
            "https://idp.example.org/slo"
        );
        assert!(idp.verification_keys().is_empty());
    }

    #[test]
    fn missing_certificate_file_is_a_configuration_error() {
        let mut config = idp_config();
        config.signing_certificate = Some("/nonexistent/idp.pem".into());
        let err = IdentityProvider::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/idp.pem"));
    }

    #[test]
    fn service_provider_without_key_gets_an_ephemeral_one() {
        let config = ServiceProviderConfig {
            entity_id: "https://sp1.example.org".to_string(),
            acs_url: "https://sp1.example.org/acs".to_string(),
            slo_url: "https://sp1.example.org/slo".to_string(),
            name_id_format: Some(NameIdFormat::Persistent.uri().to_string()),
            ..ServiceProviderConfig::default()
        };
        let sp = ServiceProvider::from_config(&config).unwrap();
        assert_eq!(sp.entity_id(), "https://sp1.example.org");
        assert_eq!(
            sp.name_id_policy().and_then(|p| p.format),
            Some(NameIdFormat::Persistent)
        );
        assert!(sp.metadata().is_none());
    }

    #[test]
    fn unknown_uris_are_rejected() {
        let config = ServiceProviderConfig {
            entity_id: "https://sp1.example.org".to_string(),
            signature_algorithm: Some("urn:example:rot13".to_string()),
            ..ServiceProviderConfig::default()
        };
        assert!(ServiceProvider::from_config(&config).is_err());
    }

    #[test]
    fn multi_sp_needs_two_providers() {
        let participants = Participants {
            idp: IdentityProvider::new("https://idp.example.org"),
            service_providers: Vec::new(),
        };
        assert!(participants.primary().is_err());
        assert!(participants.secondary().is_err());
    }
}
