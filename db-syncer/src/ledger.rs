//! Ledger RPC client
//!
//! The ledger exposes its table catalog, paginated queries, chain status and
//! transaction submission over JSON-RPC 2.0 (HTTP POST to the ledger
//! address).

use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use sync_core::{LedgerSnapshot, SignedTransaction};
use tracing::debug;

/// RPC method names
pub mod methods {
    /// List ledger tables
    pub const LIST_TABLES: &str = "ListTables";
    /// Paginated table query
    pub const QUERY_DATA: &str = "QueryData";
    /// Chain status (tail block)
    pub const STATUS: &str = "Status";
    /// Submit a signed data transaction
    pub const CREATE_DATA_TRANSACTION: &str = "CreateDataTransaction";
}

/// Chain status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStatus {
    /// Hash of the latest committed block, used as the write witness
    pub tail_hash: String,
}

/// Ledger capability consumed by the syncer
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Names of the tables the ledger exposes
    async fn list_tables(&self, address: &str) -> Result<Vec<String>>;

    /// One page of `table_name`, starting at row offset `start`
    async fn query_data(
        &self,
        address: &str,
        table_name: &str,
        start: usize,
        count: usize,
    ) -> Result<LedgerSnapshot>;

    /// Current chain status
    async fn status(&self, address: &str) -> Result<LedgerStatus>;

    /// Submit a signed transaction, returning its id
    async fn submit_transaction(
        &self,
        address: &str,
        transaction: &SignedTransaction,
    ) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<P>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcError>,
}

/// Error envelope returned by the ledger
#[derive(Debug, Clone, Deserialize)]
pub struct RpcError {
    /// Error code
    pub code: i64,
    /// Error message
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ListTablesResult {
    #[serde(default)]
    tables: Vec<TableInfo>,
}

#[derive(Debug, Deserialize)]
struct TableInfo {
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryDataParams<'a> {
    table_name: &'a str,
    start: usize,
    count: usize,
}

#[derive(Debug, Deserialize)]
struct StatusResult {
    tail: TailInfo,
}

#[derive(Debug, Deserialize)]
struct TailInfo {
    hash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTransactionResult {
    transaction_id: String,
}

/// JSON-RPC over HTTP ledger client
#[derive(Debug)]
pub struct JsonRpcLedgerClient {
    http_client: Client,
    next_id: AtomicU64,
}

impl JsonRpcLedgerClient {
    /// Create a client with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<P, R>(&self, address: &str, method: &str, params: Option<P>) -> Result<RpcResponse<R>>
    where
        P: Serialize + Send,
        R: DeserializeOwned + Send,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        debug!(address, method, id = request.id, "Ledger RPC request");

        let response = self
            .http_client
            .post(address)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                Error::Connection(format!("Cannot connect to server {}, due to {}", address, e))
            })?;

        if !response.status().is_success() {
            return Err(Error::Connection(format!(
                "{} returned HTTP {} for {}",
                address,
                response.status(),
                method
            )));
        }

        let body = response.bytes().await?;
        decode_response(method, &body)
    }
}

/// JSON-RPC parse error code
const PARSE_ERROR: i64 = -32700;

fn decode_response<R: DeserializeOwned>(method: &str, body: &[u8]) -> Result<RpcResponse<R>> {
    serde_json::from_slice(body).map_err(|e| Error::Rpc {
        code: PARSE_ERROR,
        message: format!("Malformed {} response: {}", method, e),
    })
}

fn into_result<R>(method: &str, response: RpcResponse<R>) -> Result<R> {
    if let Some(error) = response.error {
        return Err(Error::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    response
        .result
        .ok_or_else(|| Error::Connection(format!("{} response carried no result", method)))
}

#[async_trait]
impl LedgerClient for JsonRpcLedgerClient {
    async fn list_tables(&self, address: &str) -> Result<Vec<String>> {
        let response = self
            .call::<(), ListTablesResult>(address, methods::LIST_TABLES, None)
            .await?;
        let result = into_result(methods::LIST_TABLES, response)?;

        Ok(result.tables.into_iter().map(|t| t.name).collect())
    }

    async fn query_data(
        &self,
        address: &str,
        table_name: &str,
        start: usize,
        count: usize,
    ) -> Result<LedgerSnapshot> {
        let params = QueryDataParams {
            table_name,
            start,
            count,
        };
        let response = self
            .call(address, methods::QUERY_DATA, Some(params))
            .await?;

        into_result(methods::QUERY_DATA, response)
    }

    async fn status(&self, address: &str) -> Result<LedgerStatus> {
        let response = self
            .call::<(), StatusResult>(address, methods::STATUS, None)
            .await?;
        let result = into_result(methods::STATUS, response)?;

        Ok(LedgerStatus {
            tail_hash: result.tail.hash,
        })
    }

    async fn submit_transaction(
        &self,
        address: &str,
        transaction: &SignedTransaction,
    ) -> Result<String> {
        let response: RpcResponse<CreateTransactionResult> = self
            .call(address, methods::CREATE_DATA_TRANSACTION, Some(transaction))
            .await?;

        if let Some(error) = response.error {
            return Err(Error::Transaction {
                code: error.code,
                message: error.message,
            });
        }

        response
            .result
            .map(|r| r.transaction_id)
            .ok_or_else(|| Error::Transaction {
                code: -1,
                message: "response carried no transaction id".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope() {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: methods::QUERY_DATA,
            params: Some(QueryDataParams {
                table_name: "orders",
                start: 100,
                count: 100,
            }),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["method"], "QueryData");
        assert_eq!(json["params"]["tableName"], "orders");
        assert_eq!(json["params"]["start"], 100);
    }

    #[test]
    fn test_request_without_params() {
        let request = RpcRequest::<()> {
            jsonrpc: "2.0",
            id: 1,
            method: methods::STATUS,
            params: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("params").is_none());
    }

    #[test]
    fn test_query_response_parsing() {
        let body = r#"{
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "headers": ["id", "name"],
                "primaryKeyName": "id",
                "rows": [{"cells": ["1", "alice"]}]
            }
        }"#;

        let response: RpcResponse<LedgerSnapshot> = serde_json::from_str(body).unwrap();
        let page = into_result(methods::QUERY_DATA, response).unwrap();
        assert_eq!(page.primary_key_name, "id");
        assert_eq!(page.rows[0].cells, vec!["1", "alice"]);
    }

    #[test]
    fn test_error_envelope() {
        let body = r#"{"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "boom"}}"#;

        let response: RpcResponse<StatusResult> = serde_json::from_str(body).unwrap();
        match into_result(methods::STATUS, response) {
            Err(Error::Rpc { code, message }) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_malformed_body_is_rpc_error() {
        let result = decode_response::<StatusResult>(methods::STATUS, b"<html>502</html>");

        match result {
            Err(Error::Rpc { code, message }) => {
                assert_eq!(code, PARSE_ERROR);
                assert!(message.starts_with("Malformed Status response"));
            }
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unexpected_result_shape_is_rpc_error() {
        let body = br#"{"result": {"tail": "00ff"}}"#;
        let result = decode_response::<StatusResult>(methods::STATUS, body);

        assert!(matches!(result, Err(Error::Rpc { code: PARSE_ERROR, .. })));
    }

    #[test]
    fn test_status_parsing() {
        let body = br#"{"result": {"tail": {"hash": "00ff"}}}"#;
        let response: RpcResponse<StatusResult> =
            decode_response(methods::STATUS, body).unwrap();
        assert_eq!(response.result.unwrap().tail.hash, "00ff");
    }

    #[tokio::test]
    async fn test_unreachable_ledger_is_connection_error() {
        let client = JsonRpcLedgerClient::new(Duration::from_secs(1)).unwrap();
        let result = client.list_tables("http://127.0.0.1:1").await;

        assert!(matches!(result, Err(Error::Connection(_))));
    }
}
