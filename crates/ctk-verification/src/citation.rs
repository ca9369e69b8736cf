//! Normative clause registry.
//!
//! Every compliance violation is tagged with one or more of these clauses so
//! a failure can be traced straight back to the sentence it breaks. The
//! registry is a set of `static` values: it is built at compile time and
//! never changes.

use std::fmt;

use serde::Serialize;

/// The OASIS document a clause belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum SpecDocument {
    /// Assertions and Protocols for SAML 2.0.
    Core,
    /// Bindings for SAML 2.0.
    Bindings,
    /// Profiles for SAML 2.0.
    Profiles,
}

impl SpecDocument {
    /// Short name used in citation identifiers.
    #[must_use]
    pub const fn short_name(&self) -> &'static str {
        match self {
            Self::Core => "SAMLCore",
            Self::Bindings => "SAMLBindings",
            Self::Profiles => "SAMLProfiles",
        }
    }
}

/// One normative clause: document, section, sub-clause letter and prose.
#[derive(Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SpecCitation {
    /// Source document.
    pub document: SpecDocument,
    /// Section number, e.g. `3.4.1.4`.
    pub section: &'static str,
    /// Sub-clause letter within the section.
    pub clause: char,
    /// The clause text.
    pub text: &'static str,
}

impl SpecCitation {
    /// Identifier such as `SAMLCore.3.4.1.4_a`.
    #[must_use]
    pub fn id(&self) -> String {
        format!(
            "{}.{}_{}",
            self.document.short_name(),
            self.section,
            self.clause
        )
    }

    /// Looks a clause up by its identifier.
    #[must_use]
    pub fn find(id: &str) -> Option<&'static SpecCitation> {
        ALL.iter().copied().find(|c| c.id() == id)
    }
}

impl fmt::Display for SpecCitation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id(), self.text)
    }
}

macro_rules! citation {
    ($name:ident, $doc:ident, $section:literal, $clause:literal, $text:literal) => {
        #[doc = concat!(stringify!($doc), " §", $section, " (", $clause, ").")]
        pub static $name: SpecCitation = SpecCitation {
            document: SpecDocument::$doc,
            section: $section,
            clause: $clause,
            text: $text,
        };
    };
}

// ============================================================================
// SAML Core: common data types
// ============================================================================

citation!(SAML_CORE_1_3_1_A, Core, "1.3.1", 'a',
    "Unless otherwise noted in this specification or particular profiles, all elements in SAML documents that have the XML Schema xs:string type, or a type derived from that, MUST be compared using an exact binary comparison and MUST contain at least one non-whitespace character.");

citation!(SAML_CORE_1_3_2_A, Core, "1.3.2", 'a',
    "Unless otherwise indicated in this specification, all URI reference values used within SAML-defined elements or attributes MUST consist of at least one non-whitespace character, and are REQUIRED to be absolute.");

citation!(SAML_CORE_1_3_3_A, Core, "1.3.3", 'a',
    "All SAML time values have the type xs:dateTime and MUST be expressed in UTC form, with no time zone component.");

citation!(SAML_CORE_1_3_4_A, Core, "1.3.4", 'a',
    "Any party that assigns an identifier MUST ensure that there is negligible probability that that party or any other party will accidentally assign the same identifier to a different data object.");

// ============================================================================
// SAML Core: assertions
// ============================================================================

citation!(SAML_CORE_2_3_3_A, Core, "2.3.3", 'a',
    "The <Assertion> element MUST contain the Version, ID and IssueInstant attributes and an <Issuer> element.");

citation!(SAML_CORE_2_4_1_1_A, Core, "2.4.1.1", 'a',
    "Method [Required]: A URI reference that identifies a protocol or mechanism to be used to confirm the subject.");

citation!(SAML_CORE_2_4_1_2_A, Core, "2.4.1.2", 'a',
    "NotBefore [Optional]: A time instant before which the subject cannot be confirmed. NotOnOrAfter [Optional]: A time instant at which the subject can no longer be confirmed.");

citation!(SAML_CORE_2_4_1_2_B, Core, "2.4.1.2", 'b',
    "<SubjectConfirmationData> may carry arbitrary attributes only from namespaces other than the SAML-defined ones; its SAML attributes are NotBefore, NotOnOrAfter, Recipient, InResponseTo and Address.");

citation!(SAML_CORE_2_5_1_A, Core, "2.5.1", 'a',
    "If both NotBefore and NotOnOrAfter are specified, the value for NotBefore MUST be less than the value for NotOnOrAfter; the assertion is valid only within that window.");

citation!(SAML_CORE_2_5_1_B, Core, "2.5.1", 'b',
    "A SAML authority MUST NOT include more than one <OneTimeUse> element, nor more than one <ProxyRestriction> element, within a <Conditions> element of an assertion.");

citation!(SAML_CORE_2_5_1_4_A, Core, "2.5.1.4", 'a',
    "<Audience>: A URI reference that identifies an intended audience. The <AudienceRestriction> element MUST contain one or more <Audience> elements.");

citation!(SAML_CORE_2_7_2_A, Core, "2.7.2", 'a',
    "The <AuthnStatement> element MUST contain an AuthnInstant attribute and an <AuthnContext> element.");

// ============================================================================
// SAML Core: protocols
// ============================================================================

citation!(SAML_CORE_3_2_1_A, Core, "3.2.1", 'a',
    "All SAML requests MUST contain the ID, Version and IssueInstant attributes; Version MUST be 2.0.");

citation!(SAML_CORE_3_2_2_A, Core, "3.2.2", 'a',
    "All SAML responses MUST contain the ID, Version and IssueInstant attributes; Version MUST be 2.0.");

citation!(SAML_CORE_3_2_2_B, Core, "3.2.2", 'b',
    "InResponseTo: A reference to the identifier of the request to which the response corresponds. If the response is not generated in response to a request, or if the ID attribute value of a request cannot be determined, this attribute MUST NOT be present; otherwise it MUST be present and its value MUST match the value of the corresponding request's ID attribute.");

citation!(SAML_CORE_3_2_2_C, Core, "3.2.2", 'c',
    "<Status> [Required]: A code representing the status of the corresponding request.");

citation!(SAML_CORE_3_2_2_2_A, Core, "3.2.2.2", 'a',
    "The value of the topmost <StatusCode> element MUST be from the top-level list: Success, Requester, Responder or VersionMismatch.");

citation!(SAML_CORE_3_4_A, Core, "3.4", 'a',
    "When a principal is successfully authenticated, the identity provider MUST return a <Response> containing at least one assertion with an authentication statement.");

citation!(SAML_CORE_3_4_1_A, Core, "3.4.1", 'a',
    "AssertionConsumerServiceIndex / AssertionConsumerServiceURL: indirectly or directly identifies the location to which the <Response> message should be returned to the requester.");

citation!(SAML_CORE_3_4_1_1_A, Core, "3.4.1.1", 'a',
    "Format [Optional]: Specifies the URI reference corresponding to a name identifier format. If a specific format is requested, the identity provider MUST return an identifier of that format or fail with InvalidNameIDPolicy.");

citation!(SAML_CORE_3_4_1_1_B, Core, "3.4.1.1", 'b',
    "When the requested format is urn:oasis:names:tc:SAML:2.0:nameid-format:encrypted, the resulting assertion subject MUST contain an <EncryptedID>.");

citation!(SAML_CORE_3_4_1_4_A, Core, "3.4.1.4", 'a',
    "If the responder wishes to return an assertion to the requester, it MUST return a <Response> message containing one or more assertions.");

citation!(SAML_CORE_3_4_1_4_C, Core, "3.4.1.4", 'c',
    "At least one of the assertions returned MUST contain an <AuthnStatement> describing the authentication of the principal.");

citation!(SAML_CORE_3_4_1_4_D, Core, "3.4.1.4", 'd',
    "The assertion(s) containing a bearer subject confirmation MUST contain an <AudienceRestriction> including the service provider's unique identifier as an <Audience>.");

citation!(SAML_CORE_3_7_1_A, Core, "3.7.1", 'a',
    "The <LogoutRequest> MUST identify the principal with exactly one of <BaseID>, <NameID> or <EncryptedID>.");

citation!(SAML_CORE_3_7_3_2_A, Core, "3.7.3.2", 'a',
    "A session authority that successfully logged out every session participant MUST return a <LogoutResponse> with a top-level Success status.");

citation!(SAML_CORE_3_7_3_2_D, Core, "3.7.3.2", 'd',
    "If the session authority is unable to propagate the logout to every session participant, it MUST return a <LogoutResponse> containing a PartialLogout status code.");

// ============================================================================
// SAML Core: signatures
// ============================================================================

citation!(SAML_CORE_5_1_A, Core, "5.1", 'a',
    "A relying party that receives a signed SAML assertion or protocol message MUST validate the signature before relying on its content.");

// ============================================================================
// SAML Bindings
// ============================================================================

citation!(SAML_BINDINGS_3_4_3_A, Bindings, "3.4.3", 'a',
    "If a SAML request message is accompanied by RelayState data, then the SAML responder MUST place the exact RelayState data it received with the request into the corresponding RelayState parameter in the response.");

citation!(SAML_BINDINGS_3_4_5_2_A, Bindings, "3.4.5.2", 'a',
    "If the message is signed, the Destination XML attribute in the root SAML element of the protocol message MUST contain the URL to which the sender has instructed the user agent to deliver the message.");

citation!(SAML_BINDINGS_3_5_3_A, Bindings, "3.5.3", 'a',
    "If a SAML request message is accompanied by RelayState data, then the SAML responder MUST return its SAML protocol response using a binding that also supports a RelayState mechanism, and it MUST place the exact RelayState data it received with the request into the corresponding RelayState parameter in the response.");

citation!(SAML_BINDINGS_3_5_5_2_A, Bindings, "3.5.5.2", 'a',
    "If the message is signed, the Destination XML attribute in the root SAML element of the protocol message MUST contain the URL to which the sender has instructed the user agent to deliver the message.");

// ============================================================================
// SAML Profiles
// ============================================================================

citation!(SAML_PROFILES_4_1_4_2_A, Profiles, "4.1.4.2", 'a',
    "The <Issuer> element MUST be present and MUST contain the unique identifier of the issuing identity provider.");

citation!(SAML_PROFILES_4_1_4_2_B, Profiles, "4.1.4.2", 'b',
    "The Format attribute of the <Issuer> element MUST be omitted or have a value of urn:oasis:names:tc:SAML:2.0:nameid-format:entity.");

citation!(SAML_PROFILES_4_4_4_1_A, Profiles, "4.4.4.1", 'a',
    "The <Issuer> element of a <LogoutRequest> MUST be present and MUST contain the unique identifier of the requesting entity; the Format attribute MUST be omitted or have a value of entity.");

citation!(SAML_PROFILES_4_4_4_2_A, Profiles, "4.4.4.2", 'a',
    "The <Issuer> element of a <LogoutResponse> MUST be present and MUST contain the unique identifier of the responding entity; the Format attribute MUST be omitted or have a value of entity.");

/// Every clause the engine can cite, in document order.
pub static ALL: &[&SpecCitation] = &[
    &SAML_CORE_1_3_1_A,
    &SAML_CORE_1_3_2_A,
    &SAML_CORE_1_3_3_A,
    &SAML_CORE_1_3_4_A,
    &SAML_CORE_2_3_3_A,
    &SAML_CORE_2_4_1_1_A,
    &SAML_CORE_2_4_1_2_A,
    &SAML_CORE_2_4_1_2_B,
    &SAML_CORE_2_5_1_A,
    &SAML_CORE_2_5_1_B,
    &SAML_CORE_2_5_1_4_A,
    &SAML_CORE_2_7_2_A,
    &SAML_CORE_3_2_1_A,
    &SAML_CORE_3_2_2_A,
    &SAML_CORE_3_2_2_B,
    &SAML_CORE_3_2_2_C,
    &SAML_CORE_3_2_2_2_A,
    &SAML_CORE_3_4_A,
    &SAML_CORE_3_4_1_A,
    &SAML_CORE_3_4_1_1_A,
    &SAML_CORE_3_4_1_1_B,
    &SAML_CORE_3_4_1_4_A,
    &SAML_CORE_3_4_1_4_C,
    &SAML_CORE_3_4_1_4_D,
    &SAML_CORE_3_7_1_A,
    &SAML_CORE_3_7_3_2_A,
    &SAML_CORE_3_7_3_2_D,
    &SAML_CORE_5_1_A,
    &SAML_BINDINGS_3_4_3_A,
    &SAML_BINDINGS_3_4_5_2_A,
    &SAML_BINDINGS_3_5_3_A,
    &SAML_BINDINGS_3_5_5_2_A,
    &SAML_PROFILES_4_1_4_2_A,
    &SAML_PROFILES_4_1_4_2_B,
    &SAML_PROFILES_4_4_4_1_A,
    &SAML_PROFILES_4_4_4_2_A,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identifiers_are_unique() {
        let ids: HashSet<String> = ALL.iter().map(|c| c.id()).collect();
        assert_eq!(ids.len(), ALL.len());
    }

    #[test]
    fn identifier_format() {
        assert_eq!(SAML_CORE_3_4_1_4_A.id(), "SAMLCore.3.4.1.4_a");
        assert_eq!(SAML_BINDINGS_3_4_3_A.id(), "SAMLBindings.3.4.3_a");
    }

    #[test]
    fn lookup_by_identifier() {
        let found = SpecCitation::find("SAMLProfiles.4.1.4.2_b").unwrap();
        assert!(std::ptr::eq(found, &SAML_PROFILES_4_1_4_2_B));
        assert!(SpecCitation::find("SAMLCore.9.9_z").is_none());
    }

    #[test]
    fn display_includes_clause_text() {
        let shown = SAML_CORE_3_4_1_4_D.to_string();
        assert!(shown.starts_with("SAMLCore.3.4.1.4_d: "));
        assert!(shown.contains("<AudienceRestriction>"));
    }
}
