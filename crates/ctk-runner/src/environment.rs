//! Read-only state shared by every scenario of a run.

use ctk_core::{CtkConfig, UserConfig, VerificationConfig};
use ctk_verification::{RulePolicy, VerificationContext};

use crate::binding::BindingVerifier;
use crate::error::ScenarioResult;
use crate::participants::{Participants, ServiceProvider};

const MAX_CLOCK_SKEW_SECS: u64 = 86_400;

/// Participants, credentials and verification settings for a run.
#[derive(Debug)]
pub struct Environment {
    participants: Participants,
    user: UserConfig,
    policy: RulePolicy,
    clock_skew: chrono::Duration,
    verifier: BindingVerifier,
}

impl Environment {
    /// Assembles an environment.
    #[must_use]
    pub fn new(participants: Participants, user: UserConfig, settings: &VerificationConfig) -> Self {
        let verifier = BindingVerifier::new(
            participants.idp.verification_keys(),
            settings.require_signatures,
        );
        let policy = RulePolicy {
            enforce_name_id_policy: settings.enforce_name_id_policy,
            require_signed_destination: settings.require_signed_destination,
        };
        let clock_skew = chrono::Duration::seconds(
            i64::try_from(settings.clock_skew_secs.min(MAX_CLOCK_SKEW_SECS)).unwrap_or_default(),
        );
        Self {
            participants,
            user,
            policy,
            clock_skew,
            verifier,
        }
    }

    /// Builds the environment from configuration.
    ///
    /// # Errors
    ///
    /// See [`Participants::from_config`].
    pub fn from_config(config: &CtkConfig) -> ScenarioResult<Self> {
        Ok(Self::new(
            Participants::from_config(config)?,
            config.user.clone(),
            &config.verification,
        ))
    }

    /// Every party of the run.
    #[must_use]
    pub const fn participants(&self) -> &Participants {
        &self.participants
    }

    /// Test user.
    #[must_use]
    pub const fn user(&self) -> &UserConfig {
        &self.user
    }

    /// Rule toggles.
    #[must_use]
    pub const fn policy(&self) -> &RulePolicy {
        &self.policy
    }

    /// Decoder for IdP messages.
    #[must_use]
    pub const fn binding_verifier(&self) -> &BindingVerifier {
        &self.verifier
    }

    /// A fresh context expecting messages from the IdP addressed to `sp`.
    #[must_use]
    pub fn context_for(&self, sp: &ServiceProvider) -> VerificationContext {
        let ctx = VerificationContext::new(sp.entity_id())
            .with_expected_issuer(self.participants.idp.entity_id())
            .with_policy(self.policy)
            .with_clock_skew(self.clock_skew);
        match sp.metadata() {
            Some(metadata) => ctx.with_service_provider(metadata.clone()),
            None => ctx,
        }
    }
}
