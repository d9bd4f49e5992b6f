//! Minimal ABI plumbing for the handful of view calls the scanners need.
//!
//! The scanners only ever read `uint256`, `address`, `string`, and the two
//! dynamic arrays returned by EigenLayer's `getDeposits`, so a full ABI
//! codec is not warranted. Calldata is selector + 32-byte words.

use alloy_primitives::{hex, keccak256, Address, U256};
use anyhow::{anyhow, Context, Result};

const WORD: usize = 32;

/// Argument word for an `eth_call` payload.
#[derive(Debug, Clone, Copy)]
pub enum Word {
    Addr(Address),
    Uint(U256),
}

/// First four bytes of the keccak-256 hash of the function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Build calldata for `signature` with the given argument words.
pub fn encode_call(signature: &str, args: &[Word]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    for arg in args {
        match arg {
            Word::Addr(address) => {
                let mut word = [0u8; WORD];
                word[12..].copy_from_slice(address.as_slice());
                data.extend_from_slice(&word);
            }
            Word::Uint(value) => data.extend_from_slice(&value.to_be_bytes::<WORD>()),
        }
    }
    data
}

/// Read the 32-byte word at `index` as a `U256`.
pub fn decode_u256(data: &[u8], index: usize) -> Option<U256> {
    let start = index.checked_mul(WORD)?;
    let word = data.get(start..start + WORD)?;
    Some(U256::from_be_slice(word))
}

/// Read the word at `index` as an address (last 20 bytes).
pub fn decode_address(data: &[u8], index: usize) -> Option<Address> {
    let start = index.checked_mul(WORD)?;
    let word = data.get(start..start + WORD)?;
    Some(Address::from_slice(&word[12..]))
}

/// Decode a single dynamic `string` return value.
pub fn decode_string(data: &[u8]) -> Option<String> {
    let offset = decode_u256(data, 0)?.try_into().ok()?;
    let len: usize = U256::from_be_slice(data.get(offset..offset + WORD)?)
        .try_into()
        .ok()?;
    let bytes = data.get(offset + WORD..offset + WORD + len)?;
    String::from_utf8(bytes.to_vec()).ok()
}

/// Decode the `(address[], uint256[])` pair returned by EigenLayer's
/// `getDeposits`.
pub fn decode_address_u256_arrays(data: &[u8]) -> Option<(Vec<Address>, Vec<U256>)> {
    let addr_offset: usize = decode_u256(data, 0)?.try_into().ok()?;
    let uint_offset: usize = decode_u256(data, 1)?.try_into().ok()?;

    let addr_len: usize = U256::from_be_slice(data.get(addr_offset..addr_offset + WORD)?)
        .try_into()
        .ok()?;
    let uint_len: usize = U256::from_be_slice(data.get(uint_offset..uint_offset + WORD)?)
        .try_into()
        .ok()?;

    let mut addresses = Vec::with_capacity(addr_len);
    for i in 0..addr_len {
        let start = addr_offset + WORD * (1 + i);
        let word = data.get(start..start + WORD)?;
        addresses.push(Address::from_slice(&word[12..]));
    }

    let mut values = Vec::with_capacity(uint_len);
    for i in 0..uint_len {
        let start = uint_offset + WORD * (1 + i);
        values.push(U256::from_be_slice(data.get(start..start + WORD)?));
    }

    Some((addresses, values))
}

/// Convert a raw token amount to a display value.
///
/// f64 precision is acceptable here; amounts feed valuation and display,
/// never transaction construction.
pub fn format_units(value: U256, decimals: u8) -> f64 {
    if value.is_zero() {
        return 0.0;
    }
    let raw: f64 = value.to_string().parse().unwrap_or(0.0);
    raw / 10f64.powi(decimals as i32)
}

/// Parse a 0x-prefixed hex quantity as returned by JSON-RPC.
pub fn parse_hex_u256(raw: &str) -> Result<U256> {
    let trimmed = raw.trim().trim_start_matches("0x");
    if trimmed.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(trimmed, 16).map_err(|err| anyhow!("invalid hex quantity {raw:?}: {err}"))
}

/// Parse 0x-prefixed hex call-return data into bytes.
pub fn parse_hex_bytes(raw: &str) -> Result<Vec<u8>> {
    hex::decode(raw.trim()).with_context(|| format!("invalid hex data {raw:?}"))
}
