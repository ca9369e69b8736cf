//! Ordered stage pipeline shared by every protocol-flow verifier.

use std::fmt;

use ctk_saml::document::SignatureStatus;
use ctk_saml::ProtocolMessage;

use crate::citation::SAML_CORE_5_1_A;
use crate::context::VerificationContext;
use crate::violation::{ComplianceViolation, VerificationFailure, ViolationKind};

/// Where a stage runs. Stages run in this order; stages of the same kind run
/// in the order they were added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Preconditions such as the signature having been checked.
    Pre,
    /// Protocol rules.
    Core,
    /// Binding-specific rules.
    Binding,
    /// Encrypted element rules.
    EncryptedElements,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pre => "pre",
            Self::Core => "core",
            Self::Binding => "binding",
            Self::EncryptedElements => "encrypted-elements",
        })
    }
}

/// Outcome of one stage. `Ok` carries the violations collected by the stage;
/// `Err` is a structural failure that stops the pipeline.
pub type StageResult = Result<Vec<ComplianceViolation>, ComplianceViolation>;

type StageFn = Box<dyn Fn(&ProtocolMessage, &VerificationContext) -> StageResult + Send + Sync>;

struct StageEntry {
    stage: Stage,
    label: &'static str,
    check: StageFn,
}

/// A named sequence of stages.
pub struct Pipeline {
    name: &'static str,
    stages: Vec<StageEntry>,
}

impl Pipeline {
    /// Creates a pipeline whose only stage rejects messages whose signatures
    /// were never checked.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            stages: Vec::new(),
        }
        .stage(Stage::Pre, "signature-checked", |message, _| {
            signature_checked(message).map(|()| Vec::new())
        })
    }

    /// Adds a stage.
    #[must_use]
    pub fn stage<F>(mut self, stage: Stage, label: &'static str, check: F) -> Self
    where
        F: Fn(&ProtocolMessage, &VerificationContext) -> StageResult + Send + Sync + 'static,
    {
        let position = self.stages.partition_point(|entry| entry.stage <= stage);
        self.stages.insert(
            position,
            StageEntry {
                stage,
                label,
                check: Box::new(check),
            },
        );
        self
    }

    /// Name of the verifier this pipeline belongs to.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Stage labels in execution order.
    #[must_use]
    pub fn labels(&self) -> Vec<(Stage, &'static str)> {
        self.stages.iter().map(|e| (e.stage, e.label)).collect()
    }

    /// Runs every stage over `message`.
    ///
    /// # Errors
    ///
    /// Returns every violation collected, in stage order. A structural
    /// failure ends the run after being recorded.
    pub fn run(
        &self,
        message: &ProtocolMessage,
        ctx: &VerificationContext,
    ) -> Result<(), VerificationFailure> {
        let mut found = Vec::new();
        for entry in &self.stages {
            match (entry.check)(message, ctx) {
                Ok(violations) => {
                    for violation in &violations {
                        tracing::debug!(
                            verifier = self.name,
                            stage = %entry.stage,
                            check = entry.label,
                            "{violation}"
                        );
                    }
                    found.extend(violations);
                }
                Err(violation) => {
                    tracing::debug!(
                        verifier = self.name,
                        stage = %entry.stage,
                        check = entry.label,
                        "structural failure: {violation}"
                    );
                    found.push(violation);
                    break;
                }
            }
        }
        VerificationFailure::check(found)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("stages", &self.labels())
            .finish()
    }
}

fn signature_checked(message: &ProtocolMessage) -> Result<(), ComplianceViolation> {
    if message.signature_status() == SignatureStatus::Unchecked {
        return Err(ComplianceViolation::new(
            ViolationKind::SignatureInvalid,
            &SAML_CORE_5_1_A,
            format!(
                "{} carries a signature that was not validated against a trusted certificate.",
                message.kind()
            ),
        )
        .at(&message.root_path()));
    }
    Ok(())
}
