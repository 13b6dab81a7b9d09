//! Block records as returned by `getblock <hash> 1` on a merge-mined chain, and the CSV row
//! projected from them.
//!
//! Only the fields the export needs are modelled; everything else in the JSON is ignored.

use crate::address::{AddressError, AddressTranslator};
use bitcoin::BlockHash;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    pub hash: BlockHash,
    pub height: u64,
    pub time: u64,
    /// Compact difficulty target, hex as printed by the node
    pub bits: String,
    pub size: u64,
    pub weight: u64,
    #[serde(default)]
    pub auxpow: Option<AuxPow>,
}

/// Auxiliary proof-of-work: the parent chain's coinbase transaction and block header.
#[derive(Debug, Clone, Deserialize)]
pub struct AuxPow {
    pub tx: AuxPowTx,
    /// Serialized parent block header, hex
    #[serde(rename = "parentblock")]
    pub parent_block: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuxPowTx {
    #[serde(default)]
    pub vin: Vec<TxIn>,
    #[serde(default)]
    pub vout: Vec<TxOut>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxIn {
    pub coinbase: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxOut {
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

/// Older nodes report `addresses: [..]`, newer ones a single `address`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptPubKey {
    pub address: Option<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("no coinbase input in the parent coinbase transaction")]
    MissingCoinbase,
    #[error("first output of the parent coinbase transaction has no address")]
    MissingAddress,
    #[error("parent block header is too short ({0} hex characters)")]
    ShortParentBlock(usize),
    #[error("invalid hex in parent block header")]
    ParentBlockHex(#[from] hex::FromHexError),
    #[error(transparent)]
    Address(#[from] AddressError),
}

impl AuxPow {
    /// Hex of the parent chain's coinbase input script.
    pub fn coinbase(&self) -> Result<String, FieldError> {
        self.tx
            .vin
            .first()
            .and_then(|x| x.coinbase.clone())
            .ok_or(FieldError::MissingCoinbase)
    }

    /// Parent-chain address paid by the first coinbase output.
    pub fn miner_address(&self) -> Result<&str, FieldError> {
        let script = &self
            .tx
            .vout
            .first()
            .ok_or(FieldError::MissingAddress)?
            .script_pub_key;
        script
            .address
            .as_deref()
            .or(script.addresses.first().map(String::as_str))
            .ok_or(FieldError::MissingAddress)
    }

    pub fn translated_address(
        &self,
        translator: &AddressTranslator,
    ) -> Result<String, FieldError> {
        Ok(translator.translate(self.miner_address()?)?)
    }

    /// `nBits` of the parent block header, in the same big-endian hex form as [`Block::bits`].
    ///
    /// Header layout ends with `<bits: u32 LE> <nonce: u32 LE>`, so the field sits at
    /// hex offset `[-16, -8)`.
    pub fn parent_bits(&self) -> Result<String, FieldError> {
        let header = self.parent_block.as_str();
        let field = header
            .len()
            .checked_sub(16)
            .and_then(|start| header.get(start..(start + 8)))
            .ok_or(FieldError::ShortParentBlock(header.len()))?;
        let mut bits = [0_u8; 4];
        hex::decode_to_slice(field, &mut bits)?;
        bits.reverse();
        Ok(hex::encode(bits))
    }
}

/// One output line. Field order is the CSV column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Row {
    pub height: u64,
    pub time: u64,
    pub bits: String,
    pub coinbase: String,
    pub address: String,
    pub parent_bits: String,
    pub size: u64,
    pub weight: u64,
}

impl Row {
    pub const HEADER: [&'static str; 8] = [
        "height",
        "time",
        "bits",
        "coinbase",
        "address",
        "parent_bits",
        "size",
        "weight",
    ];

    /// Row with the AuxPoW columns left empty.
    pub fn new(block: &Block) -> Self {
        Self {
            height: block.height,
            time: block.time,
            bits: block.bits.clone(),
            size: block.size,
            weight: block.weight,
            ..Default::default()
        }
    }
}
