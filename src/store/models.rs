// Sealstore — Store data models
//
// SECURITY: Authorization values are held in `Zeroizing` wrappers and the
// Debug implementations for records carrying sealed material never print
// blob contents, only their lengths.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::hsm::HsmHandle;

/// Hard cap on persisted tokens, mirrored by a declarative trigger in the
/// schema so writers unaware of the limit still hit it.
pub const MAX_TOKEN_COUNT: usize = 255;

/// Hard cap on persisted token objects, also trigger-enforced.
pub const MAX_OBJECT_COUNT: usize = 16_777_215;

/// Fixed width of a token display label. Labels are space-padded on the wire
/// and trimmed of trailing pad spaces before persisting.
pub const LABEL_LEN: usize = 32;

/// Who chooses a record's identity at insert time.
///
/// Tokens are caller-assigned so an in-memory placeholder keeps its identity
/// across persistence; a duplicate identity is rejected by the primary-key
/// constraint. This is a known extension point — a future revision may let
/// the store assign token identities too. Primary objects and token objects
/// are store-assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    CallerAssigned,
    StoreAssigned,
}

// ─── Token ───────────────────────────────────────────────────────────────────

/// Structured token configuration, persisted as JSON text in the `config`
/// column. `is_initialized` flips when a seal object is attached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default)]
    pub is_initialized: bool,

    /// Hex spelling of the provisioning-time token identifier, when the
    /// provisioning tool recorded one.
    #[serde(rename = "token-id", skip_serializing_if = "Option::is_none")]
    pub token_id_hex: Option<String>,

    /// Unrecognized configuration keys round-trip untouched so older and
    /// newer writers can share a store.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// One credential-provider identity, roughly a smart card.
///
/// Owns its seal object and token object collection outright; the persisted
/// store is the source of truth and this value is a point-in-time snapshot.
#[derive(Debug)]
pub struct Token {
    /// Small positive integer, unique across the store, caller-assigned.
    pub id: u32,
    /// The primary object this token chains from.
    pub pid: u32,
    /// Display label, at most [`LABEL_LEN`] bytes, pad spaces trimmed.
    pub label: String,
    pub config: TokenConfig,
    /// Loaded eagerly for every persisted token; `None` only on the
    /// synthesized uninitialized placeholder.
    pub primary: Option<PrimaryObject>,
    /// Present exactly when `config.is_initialized`.
    pub seal: Option<SealObject>,
    /// Order-preserving, exclusively owned. Empty until initialized.
    pub objects: Vec<TokenObject>,
}

impl Token {
    /// A fresh uninitialized placeholder slot, not yet persisted.
    pub fn uninitialized(id: u32) -> Self {
        Self {
            id,
            pid: 0,
            label: String::new(),
            config: TokenConfig::default(),
            primary: None,
            seal: None,
            objects: Vec::new(),
        }
    }
}

// ─── Primary object ──────────────────────────────────────────────────────────

/// A hardware-backed root key record. Immutable after creation; many tokens
/// may reference one; never deleted by this crate.
pub struct PrimaryObject {
    pub id: u32,
    /// Fixed classification tag of the hierarchy it was created under.
    pub hierarchy: String,
    /// Live handle produced by the hardware abstraction from the persisted
    /// blob. The blob itself never surfaces past the repository.
    pub handle: HsmHandle,
    /// Authorization value; zeroized on drop.
    pub objauth: Zeroizing<String>,
}

impl fmt::Debug for PrimaryObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimaryObject")
            .field("id", &self.id)
            .field("hierarchy", &self.hierarchy)
            .field("handle", &self.handle)
            .field("objauth", &"[REDACTED]")
            .finish()
    }
}

// ─── Seal object ─────────────────────────────────────────────────────────────

/// Which credential line a pin rotation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    SecurityOfficer,
    User,
}

/// The pair of PIN-derived sealed-authorization blob lines for a token.
///
/// The Security-Officer line is complete once a token is initialized; the
/// User line may be entirely or partially absent until a user PIN is set.
pub struct SealObject {
    pub id: u32,
    pub userpub: Option<Vec<u8>>,
    pub userpriv: Option<Vec<u8>>,
    pub userauthsalt: Option<String>,
    pub sopub: Vec<u8>,
    pub sopriv: Vec<u8>,
    pub soauthsalt: String,
}

impl fmt::Debug for SealObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealObject")
            .field("id", &self.id)
            .field("userpub", &self.userpub.as_ref().map(Vec::len))
            .field("userpriv", &self.userpriv.as_ref().map(Vec::len))
            .field("userauthsalt", &self.userauthsalt.is_some())
            .field("sopub", &self.sopub.len())
            .field("sopriv", &self.sopriv.len())
            .field("soauthsalt", &"[present]")
            .finish()
    }
}

// ─── Token object and attribute bag ──────────────────────────────────────────

/// Well-known attribute types materialized as direct fields on a loaded
/// token object.
pub mod attr_type {
    /// Authorization-encryption blob slot.
    pub const OBJAUTH_ENC: u64 = 0x8000_0001;
    /// Public-material blob slot.
    pub const PUB_BLOB: u64 = 0x8000_0002;
    /// Private-material blob slot.
    pub const PRIV_BLOB: u64 = 0x8000_0003;
}

/// One typed attribute: a numeric type and an opaque value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub attr_type: u64,
    pub value: Vec<u8>,
}

impl Attribute {
    pub fn new(attr_type: u64, value: Vec<u8>) -> Self {
        Self { attr_type, value }
    }
}

/// Insertion-ordered set of attributes with unique types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeBag {
    entries: Vec<Attribute>,
}

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bag from decoded entries, rejecting duplicate types.
    pub fn from_entries(entries: Vec<Attribute>) -> Result<Self, String> {
        let mut bag = Self::new();
        for attr in entries {
            bag.put(attr)?;
        }
        Ok(bag)
    }

    /// Append an attribute; errors if its type is already present.
    pub fn put(&mut self, attr: Attribute) -> Result<(), String> {
        if self.get(attr.attr_type).is_some() {
            return Err(format!("duplicate attribute type {:#x}", attr.attr_type));
        }
        self.entries.push(attr);
        Ok(())
    }

    pub fn get(&self, attr_type: u64) -> Option<&Attribute> {
        self.entries.iter().find(|a| a.attr_type == attr_type)
    }

    pub fn entries(&self) -> &[Attribute] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A generic stored secret/key belonging to a token.
///
/// The bag is authoritative; the three blob fields are opportunistic copies
/// of well-known slots for fast access. If `priv_blob` is present, `pub_blob`
/// must be too — an object cannot have a private half without a public half.
pub struct TokenObject {
    /// Store-assigned; zero until persisted.
    pub id: u32,
    pub attrs: AttributeBag,
    pub objauth_enc: Option<Vec<u8>>,
    pub pub_blob: Option<Vec<u8>>,
    pub priv_blob: Option<Vec<u8>>,
}

impl TokenObject {
    /// A new, not-yet-persisted object around an attribute bag.
    pub fn new(attrs: AttributeBag) -> Self {
        Self {
            id: 0,
            attrs,
            objauth_enc: None,
            pub_blob: None,
            priv_blob: None,
        }
    }
}

impl fmt::Debug for TokenObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenObject")
            .field("id", &self.id)
            .field("attrs", &self.attrs.len())
            .field("objauth_enc", &self.objauth_enc.as_ref().map(Vec::len))
            .field("pub_blob", &self.pub_blob.as_ref().map(Vec::len))
            .field("priv_blob", &self.priv_blob.as_ref().map(Vec::len))
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
