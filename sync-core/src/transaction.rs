//! Signed data transactions
//!
//! Every batch of actions is submitted as one transaction anchored to the
//! witness block captured at the start of the submit stage. Signing is
//! two-step:
//!
//! 1. the unlock script signs the lock hash (SHA-256 of the canonical bytes)
//! 2. the transaction signature covers the canonical bytes plus the unlock scripts

use crate::crypto::{hash_bytes, KeyPair};
use crate::types::DataAction;
use crate::{Error, Result};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Unsigned data transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTransaction {
    /// Address of the signing key
    pub initiator: String,

    /// Tail hash this transaction is anchored to
    pub witness: String,

    /// Ordered actions
    pub actions: Vec<DataAction>,
}

impl DataTransaction {
    /// Create a transaction initiated by `keypair`'s address
    pub fn new(keypair: &KeyPair, witness: impl Into<String>, actions: Vec<DataAction>) -> Self {
        Self {
            initiator: keypair.address(),
            witness: witness.into(),
            actions,
        }
    }

    /// Deterministic bytes covered by the signatures
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// SHA-256 of the canonical bytes
    pub fn lock_hash(&self) -> Result<[u8; 32]> {
        Ok(hash_bytes(&self.canonical_bytes()?))
    }

    /// Sign with `keypair`, consuming the transaction
    pub fn sign(self, keypair: &KeyPair) -> Result<SignedTransaction> {
        let canonical = self.canonical_bytes()?;
        let unlock_script = hex::encode(keypair.sign(&self.lock_hash()?));
        let unlock_scripts = vec![unlock_script];

        let signature = hex::encode(keypair.sign(&signature_payload(&canonical, &unlock_scripts)));

        Ok(SignedTransaction {
            initiator: self.initiator,
            signature,
            witness_block: self.witness,
            unlock_scripts,
            actions: self.actions,
        })
    }
}

/// Transaction ready for submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    /// Address of the signing key
    pub initiator: String,

    /// Hex signature over canonical bytes and unlock scripts
    pub signature: String,

    /// Witness block hash
    pub witness_block: String,

    /// Hex signatures over the lock hash
    pub unlock_scripts: Vec<String>,

    /// Ordered actions
    pub actions: Vec<DataAction>,
}

impl SignedTransaction {
    /// Rebuild the unsigned transaction
    pub fn unsigned(&self) -> DataTransaction {
        DataTransaction {
            initiator: self.initiator.clone(),
            witness: self.witness_block.clone(),
            actions: self.actions.clone(),
        }
    }

    /// Verify both signature layers against a public key
    pub fn verify(&self, public_key: &[u8; 32]) -> Result<()> {
        let verifying_key = VerifyingKey::from_bytes(public_key)
            .map_err(|e| Error::Signing(format!("Invalid public key: {}", e)))?;
        let unsigned = self.unsigned();
        let canonical = unsigned.canonical_bytes()?;

        let lock_hash = unsigned.lock_hash()?;
        for script in &self.unlock_scripts {
            verify_hex(&verifying_key, &lock_hash, script)?;
        }

        verify_hex(
            &verifying_key,
            &signature_payload(&canonical, &self.unlock_scripts),
            &self.signature,
        )
    }
}

fn signature_payload(canonical: &[u8], unlock_scripts: &[String]) -> Vec<u8> {
    let mut payload = canonical.to_vec();
    for script in unlock_scripts {
        payload.extend_from_slice(script.as_bytes());
    }
    payload
}

fn verify_hex(key: &VerifyingKey, message: &[u8], signature_hex: &str) -> Result<()> {
    let bytes = hex::decode(signature_hex)
        .map_err(|e| Error::Signing(format!("Signature is not valid hex: {}", e)))?;
    let signature = Signature::from_slice(&bytes)
        .map_err(|e| Error::Signing(format!("Malformed signature: {}", e)))?;

    key.verify(message, &signature)
        .map_err(|e| Error::Signing(format!("Verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnData;

    fn keypair() -> KeyPair {
        KeyPair::from_seed(&[42u8; 32])
    }

    fn actions() -> Vec<DataAction> {
        vec![
            DataAction::Delete {
                table_name: "orders".to_string(),
                key: "1".to_string(),
            },
            DataAction::Insert {
                table_name: "orders".to_string(),
                columns: vec![ColumnData::new("id", "2"), ColumnData::new("status", "new")],
            },
        ]
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = keypair();
        let signed = DataTransaction::new(&keypair, "abc123", actions())
            .sign(&keypair)
            .unwrap();

        assert_eq!(signed.initiator, keypair.address());
        assert_eq!(signed.witness_block, "abc123");
        assert_eq!(signed.unlock_scripts.len(), 1);
        assert!(signed.verify(&keypair.public_key()).is_ok());
    }

    #[test]
    fn test_signing_is_deterministic() {
        let keypair = keypair();
        let a = DataTransaction::new(&keypair, "w", actions()).sign(&keypair).unwrap();
        let b = DataTransaction::new(&keypair, "w", actions()).sign(&keypair).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_tampered_actions_fail_verification() {
        let keypair = keypair();
        let mut signed = DataTransaction::new(&keypair, "w", actions())
            .sign(&keypair)
            .unwrap();
        signed.actions.pop();

        assert!(signed.verify(&keypair.public_key()).is_err());
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let keypair = keypair();
        let other = KeyPair::from_seed(&[7u8; 32]);
        let signed = DataTransaction::new(&keypair, "w", actions())
            .sign(&keypair)
            .unwrap();

        assert!(signed.verify(&other.public_key()).is_err());
    }

    #[test]
    fn test_wire_field_names() {
        let keypair = keypair();
        let signed = DataTransaction::new(&keypair, "w", actions())
            .sign(&keypair)
            .unwrap();

        let json = serde_json::to_value(&signed).unwrap();
        assert!(json.get("witnessBlock").is_some());
        assert!(json.get("unlockScripts").is_some());
    }

    #[test]
    fn test_unlock_script_signs_lock_hash() {
        let keypair = keypair();
        let transaction = DataTransaction::new(&keypair, "w", actions());
        let lock_hash = transaction.lock_hash().unwrap();
        assert_eq!(lock_hash, hash_bytes(&transaction.canonical_bytes().unwrap()));

        let signed = transaction.sign(&keypair).unwrap();
        let script: [u8; 64] = hex::decode(&signed.unlock_scripts[0])
            .unwrap()
            .try_into()
            .unwrap();

        assert!(keypair.verify(&lock_hash, &script).is_ok());
        assert_eq!(signed.unsigned().lock_hash().unwrap(), lock_hash);
    }
}
