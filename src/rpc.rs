//! Block lookups against a node's JSON-RPC interface.

use crate::block::Block;
use crate::config::RpcConfig;
use bitcoin::BlockHash;
use bitcoincore_rpc::{jsonrpc, RpcApi};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use serde_json::value::{to_raw_value, RawValue};

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error(transparent)]
    Client(#[from] bitcoincore_rpc::Error),
    #[error(transparent)]
    JsonRpc(#[from] jsonrpc::Error),
    #[error("cannot serialize RPC parameters")]
    Params(#[from] serde_json::Error),
    #[error("no response to `{method}` request #{index} of the batch")]
    MissingResponse { method: &'static str, index: usize },
}

impl RpcError {
    /// Errors worth another attempt: the request never got a proper answer.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Client(bitcoincore_rpc::Error::JsonRpc(e)) | Self::JsonRpc(e) => {
                matches!(e, jsonrpc::Error::Transport(_))
            }
            Self::Client(bitcoincore_rpc::Error::Io(_)) => true,
            Self::MissingResponse { .. } => true,
            _ => false,
        }
    }
}

/// Read access to a chain's blocks.
///
/// Batched lookups return their results in the order of the input.
pub trait BlockSource {
    /// Height of the current chain tip.
    fn block_count(&self) -> Result<u64, RpcError>;

    fn block_hashes(&self, heights: &[u64]) -> Result<Vec<BlockHash>, RpcError>;

    fn blocks(&self, hashes: &[BlockHash]) -> Result<Vec<Block>, RpcError>;
}

impl<T: BlockSource + ?Sized> BlockSource for &T {
    fn block_count(&self) -> Result<u64, RpcError> {
        (**self).block_count()
    }

    fn block_hashes(&self, heights: &[u64]) -> Result<Vec<BlockHash>, RpcError> {
        (**self).block_hashes(heights)
    }

    fn blocks(&self, hashes: &[BlockHash]) -> Result<Vec<Block>, RpcError> {
        (**self).blocks(hashes)
    }
}

#[derive(Debug)]
pub struct RpcBlockSource {
    inner: bitcoincore_rpc::Client,
}

impl RpcBlockSource {
    pub fn new(config: &RpcConfig) -> Result<Self, RpcError> {
        let inner = bitcoincore_rpc::Client::new(&config.url, config.auth.clone())?;
        Ok(Self { inner })
    }

    /// Sends one JSON-RPC batch with a `method` call per entry of `params`.
    fn batch<P, R>(&self, method: &'static str, params: &[P]) -> Result<Vec<R>, RpcError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        if params.is_empty() {
            return Ok(Vec::new());
        }
        let client = self.inner.get_jsonrpc_client();
        let params = params
            .iter()
            .map(to_raw_value)
            .collect::<Result<Vec<Box<RawValue>>, _>>()?;
        let requests = params
            .iter()
            .map(|x| client.build_request(method, Some(&**x)))
            .collect::<Vec<_>>();
        debug!("Batch: {} x `{method}`", requests.len());

        let responses = client.send_batch(&requests)?;
        responses
            .into_iter()
            .enumerate()
            .map(|(index, response)| {
                let response = response.ok_or(RpcError::MissingResponse { method, index })?;
                Ok(response.result::<R>()?)
            })
            .collect()
    }
}

impl BlockSource for RpcBlockSource {
    fn block_count(&self) -> Result<u64, RpcError> {
        Ok(self.inner.get_block_count()?)
    }

    fn block_hashes(&self, heights: &[u64]) -> Result<Vec<BlockHash>, RpcError> {
        let params = heights.iter().map(|h| json!([h])).collect::<Vec<_>>();
        self.batch("getblockhash", &params)
    }

    fn blocks(&self, hashes: &[BlockHash]) -> Result<Vec<Block>, RpcError> {
        // verbosity 1: decoded header fields plus the `auxpow` object
        let params = hashes.iter().map(|h| json!([h, 1])).collect::<Vec<_>>();
        self.batch("getblock", &params)
    }
}
