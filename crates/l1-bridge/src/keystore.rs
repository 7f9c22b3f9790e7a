//! Keystore - batch-signing identity
//!
//! Keypair files use the Solana CLI layout: a JSON array of 64 bytes
//! (32-byte secret followed by the 32-byte public key).

use crate::error::L1Error;
use ed25519_dalek::{Signer, SigningKey};
use solana_pubkey::Pubkey;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Signs arbitrary payloads with the node's identity
pub type DataSigner = Arc<dyn Fn(&[u8]) -> Vec<u8> + Send + Sync>;

/// Authenticated signing identity used to submit batches
pub struct Wallet {
    signing_key: SigningKey,
    address: Pubkey,
}

impl Wallet {
    /// Build from a raw 32-byte secret
    pub fn from_secret(secret: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&secret);
        let address = Pubkey::new_from_array(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
        }
    }

    /// Build from a 64-byte keypair, checking that both halves match
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, String> {
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| format!("expected 64 keypair bytes, got {}", bytes.len()))?;
        let signing_key = SigningKey::from_keypair_bytes(&bytes).map_err(|e| e.to_string())?;
        let address = Pubkey::new_from_array(signing_key.verifying_key().to_bytes());
        Ok(Self {
            signing_key,
            address,
        })
    }

    /// Public address on L1
    pub fn address(&self) -> Pubkey {
        self.address
    }

    /// Sign a payload, returning the 64-byte signature
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        self.signing_key.sign(data).to_bytes().to_vec()
    }

    /// Signer closure sharing this wallet
    pub fn signer(self: &Arc<Self>) -> DataSigner {
        let wallet = self.clone();
        Arc::new(move |data: &[u8]| wallet.sign(data))
    }

    /// Keypair bytes in keystore layout
    pub fn to_keypair_bytes(&self) -> [u8; 64] {
        self.signing_key.to_keypair_bytes()
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address.to_string())
            .finish()
    }
}

/// Load the signing identity from a keypair file
pub fn load_keystore(path: &Path) -> Result<Wallet, L1Error> {
    let keystore_error = |message: String| L1Error::Keystore {
        path: path.display().to_string(),
        message,
    };

    let contents = std::fs::read_to_string(path).map_err(|e| keystore_error(e.to_string()))?;
    let bytes: Vec<u8> =
        serde_json::from_str(&contents).map_err(|e| keystore_error(e.to_string()))?;
    let wallet = Wallet::from_keypair_bytes(&bytes).map_err(keystore_error)?;

    tracing::debug!("Loaded keystore for {}", wallet.address());
    Ok(wallet)
}
