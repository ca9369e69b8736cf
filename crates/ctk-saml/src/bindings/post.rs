//! HTTP-POST binding (Bindings §3.5).

use base64::Engine;
use scraper::{Html, Selector};

use crate::error::{SamlError, SamlResult};

use super::{DecodedMessage, SamlMessageType};

/// HTTP-POST binding encoder/decoder.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Renders an auto-submitting form carrying a request.
    #[must_use]
    pub fn encode_request(xml: &str, destination: &str, relay_state: Option<&str>) -> String {
        Self::encode(xml, destination, relay_state, SamlMessageType::Request)
    }

    /// Renders an auto-submitting form carrying a response.
    #[must_use]
    pub fn encode_response(xml: &str, destination: &str, relay_state: Option<&str>) -> String {
        Self::encode(xml, destination, relay_state, SamlMessageType::Response)
    }

    fn encode(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(xml);

        let relay_state_input = relay_state
            .map(|rs| {
                format!(
                    r#"<input type="hidden" name="RelayState" value="{}"/>"#,
                    html_escape(rs)
                )
            })
            .unwrap_or_default();

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>SAML POST Binding</title>
</head>
<body onload="document.forms[0].submit()">
    <form method="post" action="{}">
        <input type="hidden" name="{}" value="{}"/>
        {}
        <noscript>
            <input type="submit" value="Continue"/>
        </noscript>
    </form>
</body>
</html>"#,
            html_escape(destination),
            message_type.form_param(),
            encoded,
            relay_state_input
        )
    }

    /// Form fields for posting a message directly, without the HTML page.
    #[must_use]
    pub fn form_fields(
        xml: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> Vec<(String, String)> {
        let mut fields = vec![(
            message_type.form_param().to_string(),
            base64::engine::general_purpose::STANDARD.encode(xml),
        )];
        if let Some(rs) = relay_state {
            fields.push(("RelayState".to_string(), rs.to_string()));
        }
        fields
    }

    /// Decodes form parameter values.
    ///
    /// # Errors
    ///
    /// Returns an error if neither message parameter is present or the value
    /// is not base64 of UTF-8 text.
    pub fn decode(
        saml_request: Option<&str>,
        saml_response: Option<&str>,
        relay_state: Option<&str>,
    ) -> SamlResult<DecodedMessage> {
        let (encoded, message_type) = match (saml_request, saml_response) {
            (Some(req), None) => (req, SamlMessageType::Request),
            (None, Some(resp)) => (resp, SamlMessageType::Response),
            (Some(_), Some(_)) => {
                return Err(SamlError::InvalidMessage(
                    "both SAMLRequest and SAMLResponse present".to_string(),
                ));
            }
            (None, None) => {
                return Err(SamlError::InvalidMessage(
                    "no SAMLRequest or SAMLResponse parameter".to_string(),
                ));
            }
        };

        // Line breaks are legal inside the field value.
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let decoded = base64::engine::general_purpose::STANDARD.decode(compact)?;
        let xml = String::from_utf8(decoded)
            .map_err(|e| SamlError::InvalidMessage(format!("message is not UTF-8: {e}")))?;

        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state: relay_state.map(String::from),
            signature: None,
            sig_alg: None,
            raw_query: None,
        })
    }

    /// Extracts the first form of an HTML page.
    ///
    /// # Errors
    ///
    /// Returns an error if the page contains no form.
    pub fn extract_form(html: &str) -> SamlResult<PostForm> {
        let document = Html::parse_document(html);
        let form_selector = selector("form")?;
        let input_selector = selector("input, textarea")?;

        let form = document
            .select(&form_selector)
            .next()
            .ok_or_else(|| SamlError::InvalidMessage("page contains no form".to_string()))?;

        let action = form.value().attr("action").unwrap_or_default().to_string();
        let method = form
            .value()
            .attr("method")
            .unwrap_or("get")
            .to_ascii_lowercase();

        let fields = form
            .select(&input_selector)
            .filter_map(|input| {
                let name = input.value().attr("name")?;
                let value = match input.value().name() {
                    "textarea" => input.text().collect::<String>(),
                    _ => input.value().attr("value").unwrap_or_default().to_string(),
                };
                Some((name.to_string(), value))
            })
            .collect();

        Ok(PostForm {
            action,
            method,
            fields,
        })
    }
}

/// A form scraped from an HTML page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostForm {
    /// The `action` attribute (may be relative or empty).
    pub action: String,
    /// Lowercased `method` attribute, `get` when absent.
    pub method: String,
    /// Named fields in document order.
    pub fields: Vec<(String, String)>,
}

impl PostForm {
    /// Returns the first field with the given name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if the form carries a SAML message.
    #[must_use]
    pub fn carries_saml(&self) -> bool {
        self.field("SAMLRequest").is_some() || self.field("SAMLResponse").is_some()
    }

    /// Decodes the SAML message the form carries.
    ///
    /// # Errors
    ///
    /// See [`HttpPostBinding::decode`].
    pub fn decode(&self) -> SamlResult<DecodedMessage> {
        HttpPostBinding::decode(
            self.field("SAMLRequest"),
            self.field("SAMLResponse"),
            self.field("RelayState"),
        )
    }
}

fn selector(css: &str) -> SamlResult<Selector> {
    Selector::parse(css).map_err(|e| SamlError::InvalidMessage(format!("selector {css}: {e}")))
}

/// Escapes HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
