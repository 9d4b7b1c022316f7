//! ABI encoding for the option contract and its creation event.
//!
//! Only static types appear in this interface, so every value occupies one
//! 32-byte word (64 hex chars) and no offset decoding is needed.

use binopt_core::{ChainError, LogEntry, OptionId, OptionState};
use chrono::DateTime;
use rust_decimal::Decimal;
use sha3::{Digest, Keccak256};

pub const GET_OPTION: &str = "getOption(uint256)";
pub const EXECUTE_OPTION: &str = "executeOption(uint256)";
pub const OPTION_CREATED: &str = "OptionCreated(uint256,address,bytes32,uint256,uint256,bool)";

/// `latestRoundData()` on a Chainlink aggregator.
pub const LATEST_ROUND_DATA: &str = "latestRoundData()";

const WORD_HEX: usize = 64;
const GET_OPTION_WORDS: usize = 10;

#[must_use]
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// topic0 of an event, `0x`-prefixed.
#[must_use]
pub fn event_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(Keccak256::digest(signature.as_bytes())))
}

/// Calldata for a function taking a single `uint256` option id.
#[must_use]
pub fn encode_option_call(signature: &str, option_id: OptionId) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(&[0u8; 16]);
    data.extend_from_slice(&option_id.value().to_be_bytes());
    data
}

#[must_use]
pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Splits return data into 32-byte words.
///
/// # Errors
/// [`ChainError::BadData`] for empty or ragged data.
pub fn words(data: &str) -> Result<Vec<&str>, ChainError> {
    let hex = data.strip_prefix("0x").unwrap_or(data);
    if hex.is_empty() {
        return Err(ChainError::BadData("empty return data".into()));
    }
    if hex.len() % WORD_HEX != 0 || !hex.is_ascii() {
        return Err(ChainError::BadData(format!(
            "return data is not word aligned ({} hex chars)",
            hex.len()
        )));
    }
    Ok((0..hex.len() / WORD_HEX)
        .map(|i| &hex[i * WORD_HEX..(i + 1) * WORD_HEX])
        .collect())
}

/// Reads an unsigned word that must fit in 128 bits.
///
/// # Errors
/// [`ChainError::BadData`] on overflow or non-hex input.
pub fn word_to_u128(word: &str) -> Result<u128, ChainError> {
    let (high, low) = word.split_at(word.len().saturating_sub(32));
    if high.chars().any(|c| c != '0') {
        return Err(ChainError::BadData(format!("uint256 exceeds 128 bits: 0x{word}")));
    }
    u128::from_str_radix(low, 16).map_err(|e| ChainError::BadData(format!("bad word 0x{word}: {e}")))
}

fn word_to_bool(word: &str) -> Result<bool, ChainError> {
    match word_to_u128(word)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ChainError::BadData(format!("bool word holds {other}"))),
    }
}

fn word_to_address(word: &str) -> String {
    format!("0x{}", word[word.len() - 40..].to_ascii_lowercase())
}

/// Decodes a right-padded `bytes32` symbol such as `"BTC"`.
fn word_to_symbol(word: &str) -> Result<String, ChainError> {
    let bytes = hex::decode(word).map_err(|e| ChainError::BadData(format!("bytes32: {e}")))?;
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
}

/// Converts a fixed-point integer with `decimals` places to a decimal.
///
/// # Errors
/// [`ChainError::BadData`] when the value does not fit a `Decimal`.
pub fn fixed_to_decimal(raw: u128, decimals: u32) -> Result<Decimal, ChainError> {
    let signed = i128::try_from(raw)
        .map_err(|_| ChainError::BadData(format!("fixed-point value {raw} out of range")))?;
    Decimal::try_from_i128_with_scale(signed, decimals)
        .map(|d| d.normalize())
        .map_err(|e| ChainError::BadData(format!("fixed-point value {raw} (scale {decimals}): {e}")))
}

/// Decodes the `getOption` return tuple.
///
/// An unassigned id decodes successfully with a zero trader; the caller
/// decides what that means.
///
/// # Errors
/// [`ChainError::BadData`] for short or malformed data.
pub fn decode_option(
    option_id: OptionId,
    data: &str,
    amount_decimals: u32,
    price_decimals: u32,
) -> Result<OptionState, ChainError> {
    let w = words(data)?;
    if w.len() < GET_OPTION_WORDS {
        return Err(ChainError::BadData(format!(
            "getOption returned {} words, expected {GET_OPTION_WORDS}",
            w.len()
        )));
    }

    let expiry_secs = i64::try_from(word_to_u128(w[6])?)
        .map_err(|_| ChainError::BadData("expiry out of range".into()))?;
    let expiry = DateTime::from_timestamp(expiry_secs, 0)
        .ok_or_else(|| ChainError::BadData(format!("invalid expiry timestamp {expiry_secs}")))?;

    Ok(OptionState {
        option_id,
        trader: word_to_address(w[0]),
        asset: word_to_symbol(w[1])?,
        amount: fixed_to_decimal(word_to_u128(w[2])?, amount_decimals)?,
        entry_price: fixed_to_decimal(word_to_u128(w[3])?, price_decimals)?,
        exit_price: fixed_to_decimal(word_to_u128(w[4])?, price_decimals)?,
        payout: fixed_to_decimal(word_to_u128(w[5])?, amount_decimals)?,
        expiry,
        is_up: word_to_bool(w[7])?,
        is_win: word_to_bool(w[8])?,
        executed: word_to_bool(w[9])?,
    })
}

/// Finds the option id assigned by `contract` in a creation receipt's logs.
#[must_use]
pub fn option_id_from_logs(logs: &[LogEntry], contract: &str) -> Option<OptionId> {
    let topic0 = event_topic(OPTION_CREATED);
    logs.iter()
        .filter(|log| log.address.eq_ignore_ascii_case(contract))
        .filter(|log| log.topics.first().is_some_and(|t| t.eq_ignore_ascii_case(&topic0)))
        .find_map(|log| {
            let topic = log.topics.get(1)?;
            let word = topic.strip_prefix("0x").unwrap_or(topic);
            word_to_u128(word).ok().map(OptionId::new)
        })
}
