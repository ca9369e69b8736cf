//! Service Provider metadata.
//!
//! Reads `md:EntityDescriptor` / `md:EntitiesDescriptor` documents into one
//! [`EntityInformation`] per SP, keeping only endpoints whose binding the kit
//! supports. Entities without an `SPSSODescriptor` are skipped.

use std::collections::HashMap;
use std::path::Path;

use crate::constants::SamlBinding;
use crate::document::{parse_element, Element};
use crate::error::{SamlError, SamlResult};
use crate::signature::VerificationKey;

/// An indexed or plain metadata endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Endpoint binding.
    pub binding: SamlBinding,
    /// `Location`.
    pub location: String,
    /// `ResponseLocation`, when different from `Location`.
    pub response_location: Option<String>,
    /// `index` (indexed endpoints only).
    pub index: Option<u16>,
    /// `isDefault`, when stated.
    pub is_default: Option<bool>,
}

impl Endpoint {
    fn from_element(element: &Element, supported: &[SamlBinding]) -> Option<Self> {
        let binding = SamlBinding::from_uri(element.optional_attribute("Binding")?)?;
        if !supported.contains(&binding) {
            return None;
        }
        Some(Self {
            binding,
            location: element.optional_attribute("Location")?.to_string(),
            response_location: element.optional_attribute("ResponseLocation").map(String::from),
            index: element.optional_attribute("index").and_then(|i| i.parse().ok()),
            is_default: element
                .optional_attribute("isDefault")
                .map(|d| matches!(d, "true" | "1")),
        })
    }

    /// Where responses to this endpoint are sent.
    #[must_use]
    pub fn response_url(&self) -> &str {
        self.response_location.as_deref().unwrap_or(&self.location)
    }
}

/// Everything the kit needs to know about one Service Provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInformation {
    /// `entityID`.
    pub entity_id: String,
    /// Base64 signing certificates from `KeyDescriptor`s.
    pub signing_certificates: Vec<String>,
    /// Assertion Consumer Service endpoints in document order.
    pub assertion_consumer_services: Vec<Endpoint>,
    /// Single Logout Service endpoints in document order.
    pub single_logout_services: Vec<Endpoint>,
    /// `AuthnRequestsSigned`.
    pub authn_requests_signed: bool,
    /// `WantAssertionsSigned`.
    pub want_assertions_signed: bool,
}

impl EntityInformation {
    fn from_descriptor(entity: &Element, supported: &[SamlBinding]) -> Option<Self> {
        let entity_id = entity.optional_attribute("entityID")?.to_string();
        let sp = entity.child("SPSSODescriptor")?;

        let signing_certificates = sp
            .children("KeyDescriptor")
            .into_iter()
            .filter(|kd| kd.optional_attribute("use").map_or(true, |u| u == "signing"))
            .flat_map(|kd| kd.recursive_children("X509Certificate"))
            .map(|c| c.text().chars().filter(|ch| !ch.is_whitespace()).collect())
            .collect();

        let endpoints = |name: &str| -> Vec<Endpoint> {
            sp.children(name)
                .into_iter()
                .filter_map(|e| Endpoint::from_element(e, supported))
                .collect()
        };

        Some(Self {
            entity_id,
            signing_certificates,
            assertion_consumer_services: endpoints("AssertionConsumerService"),
            single_logout_services: endpoints("SingleLogoutService"),
            authn_requests_signed: sp.optional_attribute("AuthnRequestsSigned") == Some("true"),
            want_assertions_signed: sp.optional_attribute("WantAssertionsSigned") == Some("true"),
        })
    }

    /// Resolves the ACS a response must be delivered to (Core §3.4.1):
    /// an explicit URL must be one the SP registered, then an explicit
    /// index, then the default endpoint, then the first one.
    #[must_use]
    pub fn assertion_consumer_service(
        &self,
        url: Option<&str>,
        binding: Option<SamlBinding>,
        index: Option<u16>,
    ) -> Option<&Endpoint> {
        let candidates = || {
            self.assertion_consumer_services
                .iter()
                .filter(move |e| binding.map_or(true, |b| e.binding == b))
        };

        if let Some(url) = url {
            return candidates().find(|e| e.location == url);
        }
        if let Some(index) = index {
            return self
                .assertion_consumer_services
                .iter()
                .find(|e| e.index == Some(index));
        }
        candidates()
            .find(|e| e.is_default == Some(true))
            .or_else(|| candidates().find(|e| e.is_default.is_none()))
            .or_else(|| candidates().next())
    }

    /// First Single Logout endpoint for the binding.
    #[must_use]
    pub fn single_logout_service(&self, binding: SamlBinding) -> Option<&Endpoint> {
        self.single_logout_services
            .iter()
            .find(|e| e.binding == binding)
    }

    /// Signing keys taken from the certificates.
    ///
    /// # Errors
    ///
    /// Returns an error if a certificate is not valid base64.
    pub fn signing_keys(&self) -> SamlResult<Vec<VerificationKey>> {
        self.signing_certificates
            .iter()
            .map(|c| VerificationKey::from_base64(c))
            .collect()
    }
}

/// Parsed SP metadata, keyed by entity ID.
#[derive(Debug, Clone, Default)]
pub struct SpMetadata {
    entities: HashMap<String, EntityInformation>,
}

impl SpMetadata {
    /// Parses a metadata document, keeping endpoints with a supported binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the XML is malformed or the document element is
    /// not an entity or entities descriptor.
    pub fn parse(xml: &str, supported: &[SamlBinding]) -> SamlResult<Self> {
        let root = parse_element(xml)?;

        let descriptors: Vec<&Element> = match root.local_name() {
            "EntityDescriptor" => vec![&root],
            "EntitiesDescriptor" => root.recursive_children("EntityDescriptor"),
            other => {
                return Err(SamlError::Metadata(format!(
                    "expected EntityDescriptor or EntitiesDescriptor, found {other}"
                )));
            }
        };

        let entities = descriptors
            .into_iter()
            .filter_map(|d| EntityInformation::from_descriptor(d, supported))
            .map(|info| (info.entity_id.clone(), info))
            .collect();

        Ok(Self { entities })
    }

    /// Reads and parses a metadata file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path, supported: &[SamlBinding]) -> SamlResult<Self> {
        let xml = std::fs::read_to_string(path)
            .map_err(|e| SamlError::Metadata(format!("{}: {e}", path.display())))?;
        Self::parse(&xml, supported)
    }

    /// Looks up an entity.
    #[must_use]
    pub fn get(&self, entity_id: &str) -> Option<&EntityInformation> {
        self.entities.get(entity_id)
    }

    /// Looks up an entity, failing with `UnknownServiceProvider`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not in the metadata.
    pub fn require(&self, entity_id: &str) -> SamlResult<&EntityInformation> {
        self.get(entity_id)
            .ok_or_else(|| SamlError::UnknownServiceProvider(entity_id.to_string()))
    }

    /// Merges another document's entities into this one.
    pub fn extend(&mut self, other: Self) {
        self.entities.extend(other.entities);
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
