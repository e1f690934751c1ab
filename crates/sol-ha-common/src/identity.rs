//! ---
//! ha_section: "02-configuration-identity"
//! ha_subsection: "module"
//! ha_type: "source"
//! ha_scope: "code"
//! ha_description: "Configuration, identity, and shared runtime primitives."
//! ha_version: "v0.1.0"
//! ha_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use ed25519_dalek::SigningKey;
use thiserror::Error;

use crate::cache::Role;
use crate::config::{IdentityPathsConfig, TemplateData};

/// Errors raised while loading or validating identity keypairs.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to read identity file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("identity file {path} is not a JSON byte array")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("identity file {path} holds {len} bytes, expected 64")]
    Length { path: PathBuf, len: usize },
    #[error("identity file {path} holds inconsistent key material")]
    Key { path: PathBuf },
    #[error("active and passive identities must differ, both are {pubkey}")]
    MatchingPubkeys { pubkey: String },
}

/// An ed25519 keypair in the standard Solana keygen file format: a JSON
/// array of 64 integers holding the full secret key bytes.
#[derive(Debug, Clone)]
pub struct Keypair {
    signing: SigningKey,
    pubkey: String,
}

impl Keypair {
    /// Load a keypair from a Solana keygen JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, IdentityError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| IdentityError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bytes: Vec<u8> = serde_json::from_str(&raw).map_err(|source| IdentityError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let keypair_bytes: [u8; 64] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| IdentityError::Length {
                    path: path.to_path_buf(),
                    len: bytes.len(),
                })?;
        let signing = SigningKey::from_keypair_bytes(&keypair_bytes).map_err(|_| {
            IdentityError::Key {
                path: path.to_path_buf(),
            }
        })?;
        Ok(Self::from_signing_key(signing))
    }

    /// Construct a keypair from a raw 32-byte seed. Intended for fixtures.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(&seed))
    }

    fn from_signing_key(signing: SigningKey) -> Self {
        let pubkey = bs58::encode(signing.verifying_key().as_bytes()).into_string();
        Self { signing, pubkey }
    }

    /// Base58 public key string, as reported by the cluster RPC.
    pub fn pubkey(&self) -> &str {
        &self.pubkey
    }

    /// Full 64-byte secret key in keygen file layout.
    pub fn to_keypair_bytes(&self) -> [u8; 64] {
        self.signing.to_keypair_bytes()
    }
}

/// The active/passive identity pair every supervisor carries.
///
/// The active keypair is expected to be shared across all supervisors of a
/// cluster; each supervisor holds its own passive keypair.
#[derive(Debug, Clone)]
pub struct IdentityPair {
    pub active: Keypair,
    pub passive: Keypair,
    active_path: PathBuf,
    passive_path: PathBuf,
}

impl IdentityPair {
    /// Load both keypairs from the configured file paths and validate that
    /// their public keys differ.
    pub fn load(paths: &IdentityPathsConfig) -> Result<Self, IdentityError> {
        let active = Keypair::from_file(&paths.active)?;
        let passive = Keypair::from_file(&paths.passive)?;
        let pair = Self {
            active,
            passive,
            active_path: paths.active.clone(),
            passive_path: paths.passive.clone(),
        };
        pair.validate()?;
        Ok(pair)
    }

    pub fn validate(&self) -> Result<(), IdentityError> {
        if self.active.pubkey() == self.passive.pubkey() {
            return Err(IdentityError::MatchingPubkeys {
                pubkey: self.active.pubkey().to_owned(),
            });
        }
        Ok(())
    }

    /// Map a pubkey reported by the local validator to a supervisor role.
    pub fn role_for(&self, pubkey: &str) -> Role {
        if pubkey == self.active.pubkey() {
            Role::Active
        } else if pubkey == self.passive.pubkey() {
            Role::Passive
        } else {
            Role::Unknown
        }
    }

    /// Variables available to role-command and hook templates.
    pub fn template_data(&self) -> TemplateData {
        TemplateData {
            active_identity_keypair_file: self.active_path.display().to_string(),
            active_identity_pubkey: self.active.pubkey().to_owned(),
            passive_identity_keypair_file: self.passive_path.display().to_string(),
            passive_identity_pubkey: self.passive.pubkey().to_owned(),
        }
    }
}
