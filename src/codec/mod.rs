//! Capability tokens: encrypted, digest-checked instructions embedded in
//! notification links, plus the single-use gate that acts on them.

pub mod capability;
pub mod cipher;

pub use capability::CapabilityGate;
pub use cipher::{Cipher, CipherPayload};
