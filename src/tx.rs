//! Signed transaction decoding for `eth_sendRawTransaction` payloads.
//!
//! Accepts the canonical Ethereum serialization: legacy RLP lists and
//! EIP-2718 typed envelopes for EIP-2930 (`0x01`) and EIP-1559 (`0x02`).
//! Decoding is strict: wrong type bytes, field counts, truncated items and
//! trailing bytes are all rejected.

use ethers::types::transaction::eip2930::AccessList;
use ethers::types::{Address, Bytes, H256, U256, U64};
use ethers::utils::keccak256;
use ethers::utils::rlp::{DecoderError, PayloadInfo, Rlp};
use serde::Serialize;
use thiserror::Error;

const ACCESS_LIST_TX_TYPE: u8 = 0x01;
const DYNAMIC_FEE_TX_TYPE: u8 = 0x02;

/// Lowest first byte of an RLP list header.
const RLP_LIST_OFFSET: u8 = 0xc0;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("empty transaction envelope")]
    Empty,

    #[error("unsupported transaction type 0x{0:02x}")]
    UnsupportedType(u8),

    #[error("transaction payload is not an RLP list")]
    NotAList,

    #[error("truncated transaction: header declares {declared} bytes, {available} available")]
    Truncated { declared: usize, available: usize },

    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),

    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid destination address length {0}")]
    InvalidAddress(usize),

    #[error("invalid signature v value {0}")]
    InvalidSignatureV(u64),

    #[error("malformed RLP: {0}")]
    Rlp(#[from] DecoderError),
}

/// A decoded signed transaction. Quantities serialize as `0x` hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedTransaction {
    /// keccak-256 of the raw envelope, i.e. the transaction hash.
    pub hash: H256,
    #[serde(rename = "type")]
    pub tx_type: U64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<U64>,
    pub nonce: U256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    pub gas_limit: U256,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_list: Option<AccessList>,
    pub v: U64,
    pub r: U256,
    pub s: U256,
}

/// Decode a hex string (with or without `0x`) into a signed transaction.
pub fn decode_raw_transaction(raw: &str) -> Result<DecodedTransaction, DecodeError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    let bytes = hex::decode(digits)?;
    decode_envelope(&bytes)
}

/// Decode raw envelope bytes into a signed transaction.
pub fn decode_envelope(bytes: &[u8]) -> Result<DecodedTransaction, DecodeError> {
    let first = *bytes.first().ok_or(DecodeError::Empty)?;
    let hash = H256::from(keccak256(bytes));

    match first {
        ACCESS_LIST_TX_TYPE => decode_access_list(&bytes[1..], hash),
        DYNAMIC_FEE_TX_TYPE => decode_dynamic_fee(&bytes[1..], hash),
        b if b >= RLP_LIST_OFFSET => decode_legacy(bytes, hash),
        // 0x80..=0xbf is an RLP string header, not an envelope
        b if b >= 0x80 => Err(DecodeError::NotAList),
        b => Err(DecodeError::UnsupportedType(b)),
    }
}

// ── Envelope layouts ────────────────────────────────────────────

/// `[nonce, gasPrice, gas, to, value, data, v, r, s]`
fn decode_legacy(bytes: &[u8], hash: H256) -> Result<DecodedTransaction, DecodeError> {
    let rlp = strict_list(bytes, 9)?;

    let v: u64 = rlp.val_at(6)?;
    let chain_id = match v {
        27 | 28 => None,
        v if v >= 35 => Some(U64::from((v - 35) / 2)),
        v => return Err(DecodeError::InvalidSignatureV(v)),
    };

    Ok(DecodedTransaction {
        hash,
        tx_type: U64::zero(),
        chain_id,
        nonce: rlp.val_at(0)?,
        gas_price: Some(rlp.val_at(1)?),
        max_priority_fee_per_gas: None,
        max_fee_per_gas: None,
        gas_limit: rlp.val_at(2)?,
        to: destination(&rlp, 3)?,
        value: rlp.val_at(4)?,
        data: payload(&rlp, 5)?,
        access_list: None,
        v: U64::from(v),
        r: rlp.val_at(7)?,
        s: rlp.val_at(8)?,
    })
}

/// `0x01 || [chainId, nonce, gasPrice, gas, to, value, data, accessList, yParity, r, s]`
fn decode_access_list(bytes: &[u8], hash: H256) -> Result<DecodedTransaction, DecodeError> {
    let rlp = strict_list(bytes, 11)?;

    Ok(DecodedTransaction {
        hash,
        tx_type: U64::from(ACCESS_LIST_TX_TYPE),
        chain_id: Some(U64::from(rlp.val_at::<u64>(0)?)),
        nonce: rlp.val_at(1)?,
        gas_price: Some(rlp.val_at(2)?),
        max_priority_fee_per_gas: None,
        max_fee_per_gas: None,
        gas_limit: rlp.val_at(3)?,
        to: destination(&rlp, 4)?,
        value: rlp.val_at(5)?,
        data: payload(&rlp, 6)?,
        access_list: Some(rlp.val_at(7)?),
        v: y_parity(&rlp, 8)?,
        r: rlp.val_at(9)?,
        s: rlp.val_at(10)?,
    })
}

/// `0x02 || [chainId, nonce, maxPriorityFeePerGas, maxFeePerGas, gas, to, value, data,
/// accessList, yParity, r, s]`
fn decode_dynamic_fee(bytes: &[u8], hash: H256) -> Result<DecodedTransaction, DecodeError> {
    let rlp = strict_list(bytes, 12)?;

    Ok(DecodedTransaction {
        hash,
        tx_type: U64::from(DYNAMIC_FEE_TX_TYPE),
        chain_id: Some(U64::from(rlp.val_at::<u64>(0)?)),
        nonce: rlp.val_at(1)?,
        gas_price: None,
        max_priority_fee_per_gas: Some(rlp.val_at(2)?),
        max_fee_per_gas: Some(rlp.val_at(3)?),
        gas_limit: rlp.val_at(4)?,
        to: destination(&rlp, 5)?,
        value: rlp.val_at(6)?,
        data: payload(&rlp, 7)?,
        access_list: Some(rlp.val_at(8)?),
        v: y_parity(&rlp, 9)?,
        r: rlp.val_at(10)?,
        s: rlp.val_at(11)?,
    })
}

// ── Field helpers ───────────────────────────────────────────────

/// The whole of `bytes` must be exactly one RLP list of `expected` items,
/// and every item must fit inside the list payload.
fn strict_list(bytes: &[u8], expected: usize) -> Result<Rlp<'_>, DecodeError> {
    let rlp = Rlp::new(bytes);
    if !rlp.is_list() {
        return Err(DecodeError::NotAList);
    }

    let info = PayloadInfo::from(bytes)?;
    let declared = info.header_len + info.value_len;
    if declared > bytes.len() {
        return Err(DecodeError::Truncated {
            declared,
            available: bytes.len(),
        });
    }
    if declared < bytes.len() {
        return Err(DecodeError::TrailingBytes(bytes.len() - declared));
    }

    let found = count_items(&bytes[info.header_len..])?;
    if found != expected {
        return Err(DecodeError::FieldCount { expected, found });
    }
    Ok(rlp)
}

/// Walk a list payload item by item. `Rlp::item_count` stops at the first
/// unreadable item, so a broken tail would otherwise go unnoticed.
fn count_items(payload: &[u8]) -> Result<usize, DecodeError> {
    let mut offset = 0;
    let mut count = 0;
    while offset < payload.len() {
        let item = PayloadInfo::from(&payload[offset..])?;
        let end = offset + item.header_len + item.value_len;
        if end > payload.len() {
            return Err(DecodeError::Truncated {
                declared: end,
                available: payload.len(),
            });
        }
        offset = end;
        count += 1;
    }
    Ok(count)
}

/// Empty string means contract creation; anything else must be 20 bytes.
fn destination(rlp: &Rlp<'_>, index: usize) -> Result<Option<Address>, DecodeError> {
    let item = rlp.at(index)?;
    let raw = item.data()?;
    match raw.len() {
        0 => Ok(None),
        20 => Ok(Some(Address::from_slice(raw))),
        n => Err(DecodeError::InvalidAddress(n)),
    }
}

fn payload(rlp: &Rlp<'_>, index: usize) -> Result<Bytes, DecodeError> {
    let data: Vec<u8> = rlp.val_at(index)?;
    Ok(Bytes::from(data))
}

fn y_parity(rlp: &Rlp<'_>, index: usize) -> Result<U64, DecodeError> {
    match rlp.val_at::<u64>(index)? {
        parity @ (0 | 1) => Ok(U64::from(parity)),
        other => Err(DecodeError::InvalidSignatureV(other)),
    }
}

// ── Tests ───────────────────────────────────────────────────────
