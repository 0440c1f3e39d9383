//! JSON-RPC 2.0 client for a ledger node over HTTP.

use super::{CallRequest, Ledger, LedgerError};
use crate::domain::{Address, LogEntry, Receipt, TxHash, U256};
use crate::signer::RawTransaction;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Ledger node reached through its HTTP JSON-RPC endpoint.
#[derive(Debug)]
pub struct HttpLedger {
    client: Client,
    url: String,
    next_id: AtomicU64,
    max_elapsed: Duration,
}

impl HttpLedger {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
            max_elapsed: Duration::from_secs(30),
        }
    }

    /// Cap on the total time spent retrying one read.
    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Read request, retried with exponential backoff on transient failures.
    async fn rpc(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            self.post(method, &params).await.map_err(|e| match e {
                LedgerError::NetworkError(_)
                | LedgerError::RateLimited
                | LedgerError::HttpError { status: 500..=599, .. } => {
                    warn!("Transient failure on {}: {}", method, e);
                    backoff::Error::transient(e)
                }
                other => backoff::Error::permanent(other),
            })
        })
        .await
    }

    /// Single attempt, no retry.
    async fn post(&self, method: &str, params: &Value) -> Result<Value, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!("RPC request id={} method={}", id, method);

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LedgerError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == 429 {
            return Err(LedgerError::RateLimited);
        }
        if status.is_server_error() {
            return Err(LedgerError::HttpError {
                status: status.as_u16(),
                message: "Server error".to_string(),
            });
        }
        if !status.is_success() {
            return Err(LedgerError::HttpError {
                status: status.as_u16(),
                message: "Client error".to_string(),
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| LedgerError::ParseError(e.to_string()))?;
        extract_result(body)
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        parse_u64(&self.rpc("eth_chainId", json!([])).await?)
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        parse_u64(&self.rpc("eth_blockNumber", json!([])).await?)
    }

    async fn balance(&self, address: Address) -> Result<U256, LedgerError> {
        let result = self
            .rpc("eth_getBalance", json!([address.to_string(), "latest"]))
            .await?;
        parse_u256(&result)
    }

    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, LedgerError> {
        let result = self
            .rpc("eth_call", json!([call_object(request), "latest"]))
            .await?;
        parse_bytes(&result)
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, LedgerError> {
        parse_u64(&self.rpc("eth_estimateGas", json!([call_object(request)])).await?)
    }

    async fn transaction_count(&self, address: Address) -> Result<u64, LedgerError> {
        let result = self
            .rpc(
                "eth_getTransactionCount",
                json!([address.to_string(), "pending"]),
            )
            .await?;
        parse_u64(&result)
    }

    async fn send_raw_transaction(&self, raw: &RawTransaction) -> Result<TxHash, LedgerError> {
        let result = self
            .post("eth_sendRawTransaction", &json!([raw.to_hex()]))
            .await?;
        parse_hash(&result)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>, LedgerError> {
        let result = self
            .rpc("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        parse_receipt(&result).map(Some)
    }

    async fn increase_time(&self, seconds: u64) -> Result<(), LedgerError> {
        self.post("evm_increaseTime", &json!([seconds])).await?;
        Ok(())
    }

    async fn mine_block(&self) -> Result<(), LedgerError> {
        self.post("evm_mine", &json!([])).await?;
        Ok(())
    }
}

fn extract_result(mut body: Value) -> Result<Value, LedgerError> {
    if let Some(error) = body.get("error") {
        let code = error.get("code").and_then(|v| v.as_i64()).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
            .to_string();
        return Err(LedgerError::Rpc { code, message });
    }
    body.get_mut("result")
        .map(Value::take)
        .ok_or_else(|| LedgerError::ParseError("Missing result field".to_string()))
}

fn call_object(request: &CallRequest) -> Value {
    let mut object = serde_json::Map::new();
    if let Some(from) = request.from {
        object.insert("from".to_string(), json!(from.to_string()));
    }
    if let Some(to) = request.to {
        object.insert("to".to_string(), json!(to.to_string()));
    }
    object.insert(
        "data".to_string(),
        json!(format!("0x{}", hex::encode(&request.data))),
    );
    if !request.value.is_zero() {
        object.insert("value".to_string(), json!(format!("0x{:x}", request.value)));
    }
    Value::Object(object)
}

fn hex_str(value: &Value) -> Result<&str, LedgerError> {
    let s = value
        .as_str()
        .ok_or_else(|| LedgerError::ParseError(format!("Expected hex string, got {}", value)))?;
    Ok(s.strip_prefix("0x").unwrap_or(s))
}

pub(crate) fn parse_u64(value: &Value) -> Result<u64, LedgerError> {
    let digits = hex_str(value)?;
    u64::from_str_radix(if digits.is_empty() { "0" } else { digits }, 16)
        .map_err(|e| LedgerError::ParseError(format!("Invalid quantity {}: {}", value, e)))
}

pub(crate) fn parse_u256(value: &Value) -> Result<U256, LedgerError> {
    let digits = hex_str(value)?;
    U256::from_str_radix(if digits.is_empty() { "0" } else { digits }, 16)
        .map_err(|e| LedgerError::ParseError(format!("Invalid quantity {}: {:?}", value, e)))
}

fn parse_bytes(value: &Value) -> Result<Vec<u8>, LedgerError> {
    hex::decode(hex_str(value)?)
        .map_err(|e| LedgerError::ParseError(format!("Invalid data {}: {}", value, e)))
}

fn parse_hash(value: &Value) -> Result<TxHash, LedgerError> {
    let s = value
        .as_str()
        .ok_or_else(|| LedgerError::ParseError("Expected hash string".to_string()))?;
    s.parse().map_err(LedgerError::ParseError)
}

fn parse_address(value: &Value) -> Result<Address, LedgerError> {
    let s = value
        .as_str()
        .ok_or_else(|| LedgerError::ParseError("Expected address string".to_string()))?;
    Address::parse(s).map_err(|e| LedgerError::ParseError(e.to_string()))
}

fn parse_receipt(json: &Value) -> Result<Receipt, LedgerError> {
    let transaction_hash = json
        .get("transactionHash")
        .ok_or_else(|| LedgerError::ParseError("Missing transactionHash field".to_string()))
        .and_then(parse_hash)?;

    // Pre-Byzantium receipts carry no status; treat as success.
    let status = match json.get("status") {
        Some(v) if !v.is_null() => parse_u64(v)? == 1,
        _ => true,
    };

    let gas_used = json
        .get("gasUsed")
        .ok_or_else(|| LedgerError::ParseError("Missing gasUsed field".to_string()))
        .and_then(parse_u64)?;

    let block_number = json
        .get("blockNumber")
        .ok_or_else(|| LedgerError::ParseError("Missing blockNumber field".to_string()))
        .and_then(parse_u64)?;

    let block_hash = match json.get("blockHash") {
        Some(v) if !v.is_null() => Some(parse_hash(v)?),
        _ => None,
    };

    let contract_address = match json.get("contractAddress") {
        Some(v) if !v.is_null() => Some(parse_address(v)?),
        _ => None,
    };

    let mut logs = Vec::new();
    if let Some(entries) = json.get("logs").and_then(|v| v.as_array()) {
        for entry in entries {
            match parse_log(entry) {
                Ok(log) => logs.push(log),
                Err(e) => warn!("Failed to parse log entry: {}", e),
            }
        }
    }

    Ok(Receipt {
        transaction_hash,
        status,
        gas_used,
        block_number,
        block_hash,
        contract_address,
        logs,
    })
}

fn parse_log(json: &Value) -> Result<LogEntry, LedgerError> {
    let address = json
        .get("address")
        .ok_or_else(|| LedgerError::ParseError("Missing address field".to_string()))
        .and_then(parse_address)?;
    let topics = json
        .get("topics")
        .and_then(|v| v.as_array())
        .map(|topics| {
            topics
                .iter()
                .map(|t| parse_hash(t).map(|h| h.0))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();
    let data = match json.get("data") {
        Some(v) => parse_bytes(v)?,
        None => Vec::new(),
    };
    Ok(LogEntry {
        address,
        topics,
        data,
    })
}
