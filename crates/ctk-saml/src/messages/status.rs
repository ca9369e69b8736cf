//! `samlp:Status` for outbound responses.

use serde::{Deserialize, Serialize};

use super::escape;
use crate::constants::{status_codes, sub_status_codes};

/// A status code, optionally nesting a second-level code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode {
    /// Code URI.
    pub value: String,
    /// Nested code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<Box<StatusCode>>,
}

impl StatusCode {
    /// Creates a code without a nested code.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            status_code: None,
        }
    }

    fn write_xml(&self, out: &mut String) {
        out.push_str(&format!(r#"<samlp:StatusCode Value="{}""#, escape(&self.value)));
        match &self.status_code {
            Some(nested) => {
                out.push('>');
                nested.write_xml(out);
                out.push_str("</samlp:StatusCode>");
            }
            None => out.push_str("/>"),
        }
    }
}

/// Response status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Top-level code.
    pub status_code: StatusCode,
    /// Optional message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl Status {
    /// `Success`.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status_code: StatusCode::new(status_codes::SUCCESS),
            status_message: None,
        }
    }

    /// `Requester` error with a message.
    #[must_use]
    pub fn requester_error(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::new(status_codes::REQUESTER),
            status_message: Some(message.into()),
        }
    }

    /// `Responder` error with a message.
    #[must_use]
    pub fn responder_error(message: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::new(status_codes::RESPONDER),
            status_message: Some(message.into()),
        }
    }

    /// `Responder` with a nested `PartialLogout`.
    #[must_use]
    pub fn partial_logout() -> Self {
        Self::responder_error("not every session participant logged out")
            .with_sub_code(sub_status_codes::PARTIAL_LOGOUT)
    }

    /// Nests a second-level code under the top-level one.
    #[must_use]
    pub fn with_sub_code(mut self, value: impl Into<String>) -> Self {
        self.status_code.status_code = Some(Box::new(StatusCode::new(value)));
        self
    }

    /// Returns true for a top-level `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code.value == status_codes::SUCCESS
    }

    /// Renders the element.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<samlp:Status>");
        self.status_code.write_xml(&mut out);
        if let Some(message) = &self.status_message {
            out.push_str(&format!(
                "<samlp:StatusMessage>{}</samlp:StatusMessage>",
                escape(message)
            ));
        }
        out.push_str("</samlp:Status>");
        out
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::success()
    }
}
