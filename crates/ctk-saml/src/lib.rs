//! SAML 2.0 wire layer for the conformance test kit.
//!
//! This crate turns bytes on the wire into something the verification engine
//! can reason about, and turns the kit's synthetic requests back into bytes:
//!
//! - **Bindings** - HTTP-Redirect and HTTP-POST encoding, decoding and form
//!   extraction
//! - **Signatures** - Redirect query-string signing and verification, and
//!   embedded XML-DSig validation
//! - **Documents** - the immutable [`ProtocolMessage`] tree and the
//!   [`MessageParser`] seam that produces it
//! - **Messages** - minimal AuthnRequest, LogoutRequest and LogoutResponse
//!   builders used to provoke the system under test
//! - **Metadata** - Service Provider metadata parsing (ACS and SLO endpoints)
//!
//! # Architecture
//!
//! - [`bindings`] - POST and Redirect binding implementations
//! - [`signature`] - signing and signature validation
//! - [`document`] - document tree and parser
//! - [`messages`] - outbound protocol message builders
//! - [`metadata`] - SP metadata
//! - [`constants`] - SAML URIs
//! - [`error`] - error types
//!
//! # SAML Specifications
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [SAML 2.0 Profiles](https://docs.oasis-open.org/security/saml/v2.0/saml-profiles-2.0-os.pdf)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod constants;
pub mod document;
pub mod error;
pub mod messages;
pub mod metadata;
pub mod signature;

pub use constants::*;
pub use document::{Element, MessageParser, NodePath, ProtocolMessage, XmlMessageParser};
pub use error::{SamlError, SamlResult};
