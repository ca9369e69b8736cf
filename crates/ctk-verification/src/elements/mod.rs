//! Element verifiers.
//!
//! One verifier per SAML element family. They all have the same shape:
//! select nodes by name below the node they are given, apply data-type,
//! window and extension checks, and return every violation found. They never
//! stop at the first problem and never touch the context.

mod assertion;
mod authn_statement;
mod conditions;
mod issuer;
mod name_id_policy;
mod status;
mod subject;

pub use assertion::AssertionVerifier;
pub use authn_statement::AuthnStatementVerifier;
pub use conditions::ConditionsVerifier;
pub use issuer::IssuerVerifier;
pub use name_id_policy::NameIdPolicyVerifier;
pub use status::StatusVerifier;
pub use subject::SubjectVerifier;

use ctk_saml::{Element, NodePath};

use crate::context::VerificationContext;
use crate::violation::ComplianceViolation;

/// A check over one node and everything below it.
pub trait ElementVerifier {
    /// Verifies `node`, located at `at`, collecting every violation.
    fn verify(
        &self,
        node: &Element,
        at: &NodePath,
        ctx: &VerificationContext,
    ) -> Vec<ComplianceViolation>;
}

/// Pushes the error of a single check, if any.
pub(crate) fn collect(found: &mut Vec<ComplianceViolation>, check: Result<(), ComplianceViolation>) {
    if let Err(violation) = check {
        found.push(violation);
    }
}
