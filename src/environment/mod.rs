//! Immutable per-session bundle handed to every pipeline invocation.

use crate::config::Config;
use crate::domain::{Address, ContractKind, U256};
use crate::error::PipelineError;
use crate::ledger::{HttpLedger, Ledger};
use crate::signer::Signer;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

pub mod deployment;
pub mod nonce;
pub mod signers;

pub use deployment::{Deployment, ExchangeConfig};
pub use nonce::{NonceGuard, NonceManager};
pub use signers::{with_keystore_signer, with_new_account, with_private_key_signer};

/// Numeric configuration applied to every transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub gas_price: U256,
    /// Upper bound on gas per transaction; `None` submits with the estimate.
    pub gas_limit: Option<u64>,
    pub chain_id: u64,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    /// Fixed execution incentive attached when an operation asks for one.
    pub incentive: U256,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            gas_price: U256::from(2_000_000_000u64),
            gas_limit: Some(8_000_000),
            chain_id: 1337,
            confirmation_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
            incentive: U256::from(10_000_000_000_000_000u64),
        }
    }
}

impl Options {
    pub fn from_config(config: &Config, chain_id: u64) -> Self {
        Self {
            gas_price: config.gas_price,
            gas_limit: Some(config.gas_limit),
            chain_id,
            confirmation_timeout: config.confirmation_timeout,
            poll_interval: config.poll_interval,
            incentive: config.request_incentive,
        }
    }
}

/// Network handle, deployment registry, optional signing identity and
/// options.
///
/// Never mutated: every `with_*` method returns a new value. Clones share the
/// ledger connection, the registry and the nonce manager, so Environments
/// derived from one base can run pipelines concurrently, including several
/// holding the same signer.
#[derive(Debug, Clone)]
pub struct Environment {
    ledger: Arc<dyn Ledger>,
    deployment: Arc<Deployment>,
    wallet: Option<Arc<dyn Signer>>,
    options: Options,
    nonces: Arc<NonceManager>,
    session: Uuid,
}

impl Environment {
    pub fn new(ledger: Arc<dyn Ledger>, deployment: Deployment, options: Options) -> Self {
        Self {
            ledger,
            deployment: Arc::new(deployment),
            wallet: None,
            options,
            nonces: Arc::new(NonceManager::new()),
            session: Uuid::new_v4(),
        }
    }

    /// HTTP ledger at the configured URL, deployment for the configured track.
    /// The chain id is asked from the node unless configured.
    pub async fn connect(config: &Config) -> Result<Self, PipelineError> {
        let deployment = Deployment::load(&config.deployment_path, config.track)?;
        let ledger = Arc::new(HttpLedger::new(config.ledger_rpc_url.clone()));
        let chain_id = match config.chain_id {
            Some(id) => id,
            None => ledger.chain_id().await.map_err(PipelineError::Node)?,
        };
        let env = Self::new(ledger, deployment, Options::from_config(config, chain_id));
        info!(
            "Connected to {} (chain {}, track {}, session {})",
            config.ledger_rpc_url, chain_id, config.track, env.session
        );
        Ok(env)
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn wallet(&self) -> Option<&Arc<dyn Signer>> {
        self.wallet.as_ref()
    }

    pub fn wallet_address(&self) -> Option<Address> {
        self.wallet.as_ref().map(|w| w.address())
    }

    /// Signing identity or `MissingSigner`.
    pub fn require_wallet(&self) -> Result<&Arc<dyn Signer>, PipelineError> {
        self.wallet.as_ref().ok_or(PipelineError::MissingSigner)
    }

    pub(crate) fn nonces(&self) -> &NonceManager {
        &self.nonces
    }

    pub fn address_of(&self, kind: ContractKind) -> Result<Address, PipelineError> {
        self.deployment.address_of(kind)
    }

    pub fn with_options(&self, options: Options) -> Self {
        Self {
            options,
            ..self.clone()
        }
    }

    /// New Environment signing with `signer`.
    pub fn with_signer(&self, signer: Arc<dyn Signer>) -> Self {
        Self {
            wallet: Some(signer),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MockLedger;
    use crate::signer::LocalSigner;

    fn base() -> Environment {
        Environment::new(
            Arc::new(MockLedger::new()),
            Deployment::default(),
            Options::default(),
        )
    }

    #[test]
    fn test_with_signer_leaves_base_untouched() {
        let base = base();
        let signer = Arc::new(LocalSigner::random());
        let signed = base.with_signer(signer.clone());

        assert!(base.wallet().is_none());
        assert_eq!(signed.wallet_address(), Some(signer.address()));
        assert_eq!(signed.session(), base.session());
        assert!(Arc::ptr_eq(&base.nonces, &signed.nonces));
        assert!(matches!(
            base.require_wallet(),
            Err(PipelineError::MissingSigner)
        ));
    }

    #[test]
    fn test_with_options() {
        let base = base();
        let tight = base.with_options(Options {
            gas_limit: Some(1000),
            ..Options::default()
        });
        assert_eq!(tight.options().gas_limit, Some(1000));
        assert_eq!(base.options().gas_limit, Some(8_000_000));
    }
}
