//! Cryptographic primitives for the OrderNet peer-to-peer chat node.
//!
//! This crate is the **sole** location for all cryptographic operations:
//!
//! - **Ed25519** signing and verification
//! - **X25519** ECDH key agreement (with Ed25519 conversion)
//! - **XChaCha20-Poly1305** AEAD encryption/decryption
//! - **Argon2id** key derivation for identity encryption at rest
//! - **HKDF-SHA256** for key-exchange key derivation
//! - Channel group keys and public-key fingerprints
//!
//! No other crate in the workspace should perform raw crypto operations.

pub mod aead;
pub mod ecdh;
pub mod hkdf;
pub mod kdf;
pub mod keys;
pub mod signing;
