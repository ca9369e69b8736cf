//! Common data-type verifiers (Core §1.3).
//!
//! Syntax checks on primitive SAML values that do not depend on which element
//! carries them. Each check looks at one attribute and reports at most one
//! violation; an absent attribute is never a violation here.

use chrono::{DateTime, Utc};
use ctk_saml::{Element, NodePath};

use crate::citation::{
    SpecCitation, SAML_CORE_1_3_1_A, SAML_CORE_1_3_2_A, SAML_CORE_1_3_3_A, SAML_CORE_1_3_4_A,
};
use crate::context::VerificationContext;
use crate::violation::{ComplianceViolation, ViolationKind};

/// Result of a single-value check.
pub type CheckResult<T = ()> = Result<T, ComplianceViolation>;

/// Returns true if `value` is an absolute URI with no surrounding or embedded
/// whitespace.
#[must_use]
pub fn is_absolute_uri(value: &str) -> bool {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return false;
    }
    url::Url::parse(value).is_ok()
}

/// Checks that `attribute`, if present, is an absolute URI (Core §1.3.2).
///
/// # Errors
///
/// Returns `InvalidUriSyntax` if the value is present but not a URI.
pub fn verify_uri_values(node: &Element, attribute: &str, at: &NodePath) -> CheckResult {
    match node.optional_attribute(attribute) {
        Some(value) => verify_uri(value, &format!("{attribute} attribute"), at),
        None => Ok(()),
    }
}

/// Checks that `value` is an absolute URI.
///
/// # Errors
///
/// Returns `InvalidUriSyntax` otherwise.
pub fn verify_uri(value: &str, what: &str, at: &NodePath) -> CheckResult {
    if is_absolute_uri(value) {
        Ok(())
    } else {
        Err(ComplianceViolation::new(
            ViolationKind::InvalidUriSyntax,
            &SAML_CORE_1_3_2_A,
            format!("The {what} of {} [{value}] is not an absolute URI.", at.leaf()),
        )
        .at(at))
    }
}

/// Checks that `attribute`, if present, has at least one non-whitespace
/// character (Core §1.3.1).
///
/// # Errors
///
/// Returns `EmptyRequiredString` if the value is present but blank.
pub fn verify_string_values(node: &Element, attribute: &str, at: &NodePath) -> CheckResult {
    match node.optional_attribute(attribute) {
        Some(value) if value.trim().is_empty() => Err(ComplianceViolation::new(
            ViolationKind::EmptyRequiredString,
            &SAML_CORE_1_3_1_A,
            format!("The {attribute} attribute of {} is empty.", at.leaf()),
        )
        .at(at)),
        _ => Ok(()),
    }
}

/// Checks that an element's text content is not blank (Core §1.3.1).
///
/// # Errors
///
/// Returns `EmptyRequiredString` if the text is blank.
pub fn verify_string_content(node: &Element, at: &NodePath) -> CheckResult {
    if node.text().trim().is_empty() {
        Err(ComplianceViolation::new(
            ViolationKind::EmptyRequiredString,
            &SAML_CORE_1_3_1_A,
            format!("The {} element is empty.", at.leaf()),
        )
        .at(at))
    } else {
        Ok(())
    }
}

/// Parses `attribute`, if present, as a UTC `xs:dateTime` (Core §1.3.3).
///
/// # Errors
///
/// Returns `InvalidDateTime` if the value does not parse or carries a time
/// zone other than `Z`.
pub fn verify_time_values(
    node: &Element,
    attribute: &str,
    at: &NodePath,
) -> CheckResult<Option<DateTime<Utc>>> {
    let Some(value) = node.optional_attribute(attribute) else {
        return Ok(None);
    };
    parse_utc(value).map(Some).ok_or_else(|| {
        ComplianceViolation::new(
            ViolationKind::InvalidDateTime,
            &SAML_CORE_1_3_3_A,
            format!(
                "The {attribute} attribute of {} [{value}] is not a UTC dateTime.",
                at.leaf()
            ),
        )
        .at(at)
    })
}

/// Parses a SAML time value. Only the `Z` designator is accepted.
#[must_use]
pub fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    if !value.ends_with('Z') {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Checks that `attribute` is present and is a well-formed identifier
/// (Core §1.3.4: an `xs:ID`, so an NCName).
///
/// # Errors
///
/// Returns `MissingRequiredAttribute` or `MalformedDocument`.
pub fn verify_id_values(node: &Element, attribute: &str, at: &NodePath) -> CheckResult {
    let value = require_attribute(node, attribute, &SAML_CORE_1_3_4_A, at)?;
    let mut chars = value.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(ComplianceViolation::new(
            ViolationKind::MalformedDocument,
            &SAML_CORE_1_3_4_A,
            format!("The {attribute} attribute of {} [{value}] is not a valid xs:ID.", at.leaf()),
        )
        .at(at))
    }
}

/// Returns the value of a required attribute.
///
/// # Errors
///
/// Returns `MissingRequiredAttribute` tagged with `citation`.
pub fn require_attribute<'a>(
    node: &'a Element,
    attribute: &str,
    citation: &'static SpecCitation,
    at: &NodePath,
) -> CheckResult<&'a str> {
    node.optional_attribute(attribute).ok_or_else(|| {
        ComplianceViolation::new(
            ViolationKind::MissingRequiredAttribute,
            citation,
            format!("{} has no {attribute} attribute.", at.leaf()),
        )
        .at(at)
    })
}

/// Checks the `NotBefore`/`NotOnOrAfter` window of `node`.
///
/// The window is inverted if `NotBefore > NotOnOrAfter`. Otherwise the
/// evaluation instant must lie in `[NotBefore, NotOnOrAfter)`, widened on
/// both sides by the clock skew tolerance. A missing bound is open.
///
/// # Errors
///
/// Returns `TimeWindowInvalid` tagged with `citation`, or `InvalidDateTime`
/// if a bound is not a UTC dateTime.
pub fn validate_time_window(
    node: &Element,
    at: &NodePath,
    citation: &'static SpecCitation,
    ctx: &VerificationContext,
) -> CheckResult {
    let not_before =
        verify_time_values(node, "NotBefore", at).map_err(|v| v.also(citation))?;
    let not_on_or_after =
        verify_time_values(node, "NotOnOrAfter", at).map_err(|v| v.also(citation))?;

    let now = ctx.evaluated_at();
    let skew = ctx.clock_skew();
    let window_violation = |message: String| {
        ComplianceViolation::new(ViolationKind::TimeWindowInvalid, citation, message).at(at)
    };

    if let (Some(nb), Some(noa)) = (not_before, not_on_or_after) {
        if nb > noa {
            return Err(window_violation(format!(
                "{} has NotBefore [{nb}] after NotOnOrAfter [{noa}].",
                at.leaf()
            )));
        }
    }
    if let Some(nb) = not_before {
        if now + skew < nb {
            return Err(window_violation(format!(
                "{} is not valid before {nb}; evaluated at {now}.",
                at.leaf()
            )));
        }
    }
    if let Some(noa) = not_on_or_after {
        if now - skew >= noa {
            return Err(window_violation(format!(
                "{} expired at {noa}; evaluated at {now}.",
                at.leaf()
            )));
        }
    }
    Ok(())
}

/// Checks that every unqualified attribute is one of `expected_saml_names`.
///
/// SAML schemas declare their attributes unqualified, so an unqualified name
/// outside the expected set is a core attribute that does not exist.
/// Namespace-qualified attributes are legitimate extensions and pass.
#[must_use]
pub fn verify_saml_extensions(
    attributes: &[(String, String)],
    expected_saml_names: &[&str],
    citation: &'static SpecCitation,
    at: &NodePath,
) -> Vec<ComplianceViolation> {
    attributes
        .iter()
        .filter(|(name, _)| !name.contains(':'))
        .filter(|(name, _)| !expected_saml_names.contains(&name.as_str()))
        .map(|(name, _)| {
            ComplianceViolation::new(
                ViolationKind::UnexpectedExtensionAttribute,
                citation,
                format!(
                    "{} carries the unexpected attribute {name}; allowed SAML attributes are {}.",
                    at.leaf(),
                    expected_saml_names.join(", ")
                ),
            )
            .at(at)
        })
        .collect()
}
