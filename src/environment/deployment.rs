//! Deployment registry: logical contract role to deployed address, per track.

use crate::domain::{Address, ContractKind, Token, Track};
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Exchange integration known to the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeConfig {
    pub exchange: Address,
    pub adapter: Address,
    #[serde(default)]
    pub takes_custody: bool,
}

/// Addresses resolved for one track. Read-only once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub contracts: HashMap<ContractKind, Address>,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub exchanges: HashMap<String, ExchangeConfig>,
    /// Symbol of the token protocol fees are priced in.
    pub fee_token: String,
    /// Symbol of the wrapped native asset fees are paid in.
    pub native_token: String,
}

impl Deployment {
    /// Parse a registry file holding one deployment per track and select `track`.
    pub fn from_json(json: &str, track: Track) -> Result<Self, PipelineError> {
        let mut tracks: HashMap<String, Deployment> = serde_json::from_str(json)
            .map_err(|e| PipelineError::Deployment(format!("invalid deployment file: {}", e)))?;
        let deployment = tracks.remove(track.as_str()).ok_or_else(|| {
            PipelineError::Deployment(format!("no deployment for track {}", track))
        })?;
        deployment.validate()?;
        Ok(deployment)
    }

    pub fn load(path: impl AsRef<Path>, track: Track) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Deployment(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content, track)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        self.fee_token()?;
        self.native_token()?;
        Ok(())
    }

    pub fn address_of(&self, kind: ContractKind) -> Result<Address, PipelineError> {
        self.contracts
            .get(&kind)
            .copied()
            .ok_or_else(|| PipelineError::Deployment(format!("no {} in deployment", kind)))
    }

    pub fn token_by_symbol(&self, symbol: &str) -> Result<Token, PipelineError> {
        self.tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
            .ok_or_else(|| PipelineError::Deployment(format!("unknown token {}", symbol)))
    }

    pub fn token_by_address(&self, address: Address) -> Result<Token, PipelineError> {
        self.tokens
            .iter()
            .find(|t| t.address == address)
            .cloned()
            .ok_or_else(|| PipelineError::Deployment(format!("no token at {}", address)))
    }

    pub fn exchange(&self, name: &str) -> Result<&ExchangeConfig, PipelineError> {
        self.exchanges
            .get(name)
            .ok_or_else(|| PipelineError::Deployment(format!("unknown exchange {}", name)))
    }

    pub fn fee_token(&self) -> Result<Token, PipelineError> {
        self.token_by_symbol(&self.fee_token)
    }

    pub fn native_token(&self) -> Result<Token, PipelineError> {
        self.token_by_symbol(&self.native_token)
    }
}
