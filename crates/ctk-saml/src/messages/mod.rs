//! Outbound protocol messages.
//!
//! The kit only ever builds the minimal, well-formed requests and responses
//! it needs to provoke the system under test. Each type renders itself with
//! `to_xml()`; values are XML-escaped, nothing else is normalized.

mod authn_request;
mod logout;
mod name_id;
mod status;

pub use authn_request::AuthnRequest;
pub use logout::{LogoutRequest, LogoutResponse};
pub use name_id::{NameId, NameIdPolicy};
pub use status::{Status, StatusCode};

use chrono::{DateTime, SecondsFormat, Utc};

/// Generates a message ID. IDs must not start with a digit (xs:ID), hence
/// the underscore.
#[must_use]
pub fn generate_id() -> String {
    format!("_{}", uuid::Uuid::new_v4().simple())
}

/// Formats an instant the way SAML expects: UTC with a trailing `Z`.
#[must_use]
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn escape(value: &str) -> std::borrow::Cow<'_, str> {
    quick_xml::escape::escape(value)
}

pub(crate) fn optional_attr(name: &str, value: Option<&str>) -> String {
    value
        .map(|v| format!(r#" {name}="{}""#, escape(v)))
        .unwrap_or_default()
}
