//! Legacy EIP-155 transaction signing for settlement calls.

use binopt_core::ChainError;
use k256::ecdsa::SigningKey;
use secrecy::{ExposeSecret, SecretString};
use sha3::{Digest, Keccak256};

// =============================================================================
// RLP
// =============================================================================

/// Minimal RLP writer: a list of byte strings and unsigned integers.
#[derive(Default)]
struct RlpList {
    payload: Vec<u8>,
}

impl RlpList {
    fn bytes(mut self, data: &[u8]) -> Self {
        match data {
            [single] if *single < 0x80 => self.payload.push(*single),
            _ => {
                write_length_prefix(&mut self.payload, 0x80, data.len());
                self.payload.extend_from_slice(data);
            }
        }
        self
    }

    fn uint(self, value: u128) -> Self {
        let be = value.to_be_bytes();
        let start = be.iter().position(|&b| b != 0).unwrap_or(be.len());
        self.bytes(&be[start..])
    }

    fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + 9);
        write_length_prefix(&mut out, 0xc0, self.payload.len());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Short form for payloads up to 55 bytes, long form with a big-endian
/// length after that.
fn write_length_prefix(out: &mut Vec<u8>, offset: u8, len: usize) {
    if len <= 55 {
        out.push(offset + len as u8);
    } else {
        let be = (len as u64).to_be_bytes();
        let start = be.iter().position(|&b| b != 0).unwrap_or(be.len() - 1);
        out.push(offset + 55 + (be.len() - start) as u8);
        out.extend_from_slice(&be[start..]);
    }
}

// =============================================================================
// Signer
// =============================================================================

/// Settlement signer; the key never leaves this struct.
pub struct Signer {
    key: SigningKey,
    address: String,
}

impl Signer {
    /// # Errors
    /// [`ChainError::Configuration`] if the key is not 32 bytes of hex.
    pub fn from_secret(secret: &SecretString) -> Result<Self, ChainError> {
        let raw = secret.expose_secret();
        let bytes = hex::decode(raw.trim().trim_start_matches("0x"))
            .map_err(|e| ChainError::Configuration(format!("private key is not hex: {e}")))?;
        let key = SigningKey::from_slice(&bytes)
            .map_err(|e| ChainError::Configuration(format!("invalid private key: {e}")))?;
        let address = derive_address(&key);
        Ok(Self { key, address })
    }

    /// Lowercase `0x` address of the signer.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

fn derive_address(key: &SigningKey) -> String {
    let point = key.verifying_key().to_encoded_point(false);
    // Skip the 0x04 uncompressed-point tag.
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

// =============================================================================
// Transaction
// =============================================================================

/// A type-0 transaction carrying no value.
#[derive(Debug, Clone)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: [u8; 20],
    pub data: Vec<u8>,
}

impl LegacyTransaction {
    fn fields(&self) -> RlpList {
        RlpList::default()
            .uint(u128::from(self.nonce))
            .uint(self.gas_price)
            .uint(u128::from(self.gas_limit))
            .bytes(&self.to)
            .uint(0)
            .bytes(&self.data)
    }

    /// Signs with EIP-155 replay protection and returns the raw encoding.
    ///
    /// # Errors
    /// [`ChainError::Signing`] if the signature cannot be produced.
    pub fn sign(&self, signer: &Signer, chain_id: u64) -> Result<Vec<u8>, ChainError> {
        let unsigned = self.fields().uint(u128::from(chain_id)).uint(0).uint(0).finish();
        let digest = Keccak256::digest(&unsigned);

        let (signature, recovery_id) = signer
            .key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| ChainError::Signing(e.to_string()))?;

        let v = u128::from(chain_id) * 2 + 35 + u128::from(recovery_id.to_byte());
        let r = signature.r().to_bytes();
        let s = signature.s().to_bytes();

        Ok(self
            .fields()
            .uint(v)
            .bytes(strip_zeros(r.as_slice()))
            .bytes(strip_zeros(s.as_slice()))
            .finish())
    }
}

fn strip_zeros(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|&b| b != 0).unwrap_or(data.len());
    &data[start..]
}

/// Hash a node assigns to a raw signed transaction.
#[must_use]
pub fn transaction_hash(raw: &[u8]) -> String {
    format!("0x{}", hex::encode(Keccak256::digest(raw)))
}

/// Parses a `0x` hex address into bytes.
///
/// # Errors
/// [`ChainError::Configuration`] for anything but 20 bytes of hex.
pub fn parse_address(address: &str) -> Result<[u8; 20], ChainError> {
    let bytes = hex::decode(address.trim_start_matches("0x"))
        .map_err(|e| ChainError::Configuration(format!("invalid address {address:?}: {e}")))?;
    <[u8; 20]>::try_from(bytes.as_slice()).map_err(|_| {
        ChainError::Configuration(format!("address {address:?} is {} bytes", bytes.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (hardhat/anvil account 0).
    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn signer() -> Signer {
        Signer::from_secret(&SecretString::from(DEV_KEY.to_string())).unwrap()
    }

    #[test]
    fn test_rlp_single_bytes_and_strings() {
        assert_eq!(RlpList::default().bytes(&[]).payload, vec![0x80]);
        assert_eq!(RlpList::default().bytes(&[0x7f]).payload, vec![0x7f]);
        assert_eq!(RlpList::default().bytes(&[0x80]).payload, vec![0x81, 0x80]);
        assert_eq!(RlpList::default().uint(0).payload, vec![0x80]);
        assert_eq!(RlpList::default().uint(1000).payload, vec![0x82, 0x03, 0xe8]);
    }

    #[test]
    fn test_rlp_lists() {
        assert_eq!(RlpList::default().finish(), vec![0xc0]);
        assert_eq!(RlpList::default().uint(1).uint(2).finish(), vec![0xc2, 0x01, 0x02]);
    }

    #[test]
    fn test_rlp_long_string_uses_length_of_length() {
        let data = [0xaa; 60];
        let payload = RlpList::default().bytes(&data).payload;
        assert_eq!(&payload[..2], &[0xb8, 60]);
        assert_eq!(payload.len(), 62);
    }

    #[test]
    fn test_signer_derives_known_address() {
        assert_eq!(signer().address(), "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");
    }

    #[test]
    fn test_signer_rejects_garbage_and_hides_key() {
        assert!(Signer::from_secret(&SecretString::from("zz".to_string())).is_err());
        assert!(!format!("{:?}", signer()).contains(DEV_KEY));
    }

    #[test]
    fn test_sign_is_deterministic_and_nonce_sensitive() {
        let tx = LegacyTransaction {
            nonce: 0,
            gas_price: 30_000_000_000,
            gas_limit: 300_000,
            to: [0x11; 20],
            data: vec![0xde, 0xad],
        };
        let first = tx.sign(&signer(), 137).unwrap();
        let again = tx.sign(&signer(), 137).unwrap();
        let bumped = LegacyTransaction { nonce: 1, ..tx }.sign(&signer(), 137).unwrap();

        assert!(first[0] >= 0xc0);
        assert_eq!(first, again);
        assert_ne!(first, bumped);
        assert_eq!(transaction_hash(&first).len(), 66);
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address(&format!("0x{}", "11".repeat(20))).unwrap(), [0x11; 20]);
        assert!(parse_address("0x1234").is_err());
    }
}
