// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! SHA-512 crypt hashing for blueprint user passwords.
//!
//! The salt is drawn from a secure RNG at compose time (spec §9, "Password
//! crypting"), never at blueprint creation — the plaintext is replaced with
//! its hash the moment a recipe is composed and is never persisted.

use sha_crypt::{sha512_simple, Sha512Params};
use thiserror::Error;

const ROUNDS: usize = 5_000;

/// `true` if `value` already looks like a crypt hash (`$6$...`) rather than
/// plaintext — such values are passed through unchanged.
pub fn is_crypt_hash(value: &str) -> bool {
    value.starts_with("$6$") || value.starts_with("$5$") || value.starts_with("$1$")
}

/// Hash `password` with SHA-512 crypt and a freshly drawn random salt.
pub fn hash_password(password: &str) -> Result<String, Error> {
    let params = Sha512Params::new(ROUNDS).map_err(|_| Error::Params)?;
    sha512_simple(password, &params).map_err(|_| Error::Hash)
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid crypt parameters")]
    Params,
    #[error("failed to hash password")]
    Hash,
}
