//! # ctk-crypto
//!
//! Cryptographic operations for the SAML conformance test kit using aws-lc-rs.
//!
//! The kit only needs what the SAML bindings need:
//! - RSA PKCS#1 v1.5 signatures over Redirect-binding query strings and
//!   XML-DSig `SignedInfo` blocks
//! - message digests for XML-DSig `DigestValue` checks
//!
//! SHA-1 is accepted for verification only. Identity Providers in the wild
//! still emit `rsa-sha1` signatures and the kit must be able to judge them.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod hash;
pub mod rsa;

pub use error::SignatureError;
pub use hash::{digest, sha1, sha256, sha384, sha512, DigestAlgorithm};
pub use rsa::{generate_rsa_key, rsa_sign, rsa_verify, RsaAlgorithm, RsaKeyMaterial};
