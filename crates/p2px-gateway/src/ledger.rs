//! JSON-RPC escrow ledger client.
//!
//! Reads `orderById(string)` from the escrow contract with `eth_call` and
//! decodes the returned tuple into an [`EscrowRecord`].

use alloy::primitives::U256;
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use p2px_core::{EscrowRecord, EscrowStatus, OrderId, TokenAmount};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{GatewayError, GatewayResult};
use crate::traits::EscrowLedger;

sol! {
    function orderById(string id) external view returns (
        uint8 status,
        address token,
        address buyer,
        bytes32 buyerHash,
        bytes32 sellerHash,
        uint256 amount,
        uint256 fee,
        bool adminAction
    );
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcLedgerConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default)]
    pub contract_address: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for RpcLedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            contract_address: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

pub struct RpcEscrowLedger {
    client: Client,
    rpc_url: String,
    contract_address: String,
}

impl RpcEscrowLedger {
    pub fn new(config: &RpcLedgerConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::HttpClient(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            rpc_url: config.rpc_url.clone(),
            contract_address: config.contract_address.clone(),
        })
    }

    async fn eth_call(&self, data: Vec<u8>) -> GatewayResult<Vec<u8>> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                { "to": self.contract_address, "data": format!("0x{}", hex::encode(data)) },
                "latest"
            ]
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::HttpClient(format!("HTTP {status}: {body}")));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::HttpClient(format!("Failed to parse response: {e}")))?;

        if let Some(err) = body.error {
            return Err(GatewayError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        let result = body.result.unwrap_or_default();
        let trimmed = result.trim_start_matches("0x");
        hex::decode(trimmed).map_err(|e| GatewayError::Decode(format!("result is not hex: {e}")))
    }
}

fn u256_to_amount(value: U256) -> GatewayResult<TokenAmount> {
    let decimal = Decimal::from_str(&value.to_string())
        .map_err(|e| GatewayError::Decode(format!("uint256 {value} out of range: {e}")))?;
    Ok(TokenAmount::from_base_units(decimal)?)
}

/// Decode `orderById` return data. Empty data or status NONE means no escrow.
pub fn decode_escrow_record(data: &[u8]) -> GatewayResult<Option<EscrowRecord>> {
    if data.is_empty() {
        return Ok(None);
    }
    let ret = orderByIdCall::abi_decode_returns(data, true)
        .map_err(|e| GatewayError::Decode(e.to_string()))?;

    let status = EscrowStatus::from_code(ret.status);
    if status == EscrowStatus::None {
        return Ok(None);
    }

    Ok(Some(EscrowRecord {
        status,
        token_contract_address: ret.token.to_string(),
        buyer_address: ret.buyer.to_string(),
        buyer_hash: hex::encode(ret.buyerHash),
        seller_hash: hex::encode(ret.sellerHash),
        amount: u256_to_amount(ret.amount)?,
        fee: u256_to_amount(ret.fee)?,
        admin_triggered: ret.adminAction,
    }))
}

#[async_trait]
impl EscrowLedger for RpcEscrowLedger {
    async fn get_escrow_record(&self, order_id: &OrderId) -> GatewayResult<Option<EscrowRecord>> {
        let call = orderByIdCall {
            id: order_id.to_string(),
        };
        trace!(order_id = %order_id, "eth_call orderById");
        let data = self.eth_call(call.abi_encode()).await?;
        let record = decode_escrow_record(&data)?;
        debug!(
            order_id = %order_id,
            status = ?record.as_ref().map(|r| r.status),
            "Escrow record fetched"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, B256};

    fn encoded(status: u8, amount: U256) -> Vec<u8> {
        orderByIdCall::abi_encode_returns(&(
            status,
            Address::repeat_byte(0x11),
            Address::repeat_byte(0x22),
            B256::repeat_byte(0xab),
            B256::repeat_byte(0xcd),
            amount,
            U256::from(3_000u64),
            true,
        ))
    }

    #[test]
    fn test_decode_locked_record() {
        let record = decode_escrow_record(&encoded(1, U256::from(1_000_000u64)))
            .unwrap()
            .unwrap();
        assert_eq!(record.status, EscrowStatus::Locked);
        assert_eq!(record.amount, TokenAmount::from(1_000_000));
        assert_eq!(record.fee, TokenAmount::from(3_000));
        assert_eq!(record.buyer_hash, "ab".repeat(32));
        assert_eq!(
            p2px_core::normalize_hex(&record.buyer_address),
            "22".repeat(20)
        );
        assert!(record.admin_triggered);
    }

    #[test]
    fn test_decode_none_status_is_absent() {
        assert!(decode_escrow_record(&encoded(0, U256::ZERO)).unwrap().is_none());
        assert!(decode_escrow_record(&[]).unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_escrow_record(&[1, 2, 3]),
            Err(GatewayError::Decode(_))
        ));
    }
}
