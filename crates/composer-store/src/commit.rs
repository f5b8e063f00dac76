// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Content-addressed commits (spec §3, §4.3): an append-only log per
//! blueprint name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::blueprint::Blueprint;

/// One immutable snapshot of a blueprint in a name's commit chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintCommit {
    pub commit_id: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub revision: Option<u64>,
    pub payload: Blueprint,
    #[serde(default)]
    pub parent: Option<String>,
}

impl BlueprintCommit {
    pub fn new(payload: Blueprint, parent: Option<String>, timestamp: DateTime<Utc>) -> Result<Self, Error> {
        let commit_id = commit_id(&payload)?;
        Ok(Self {
            commit_id,
            name: payload.name.clone(),
            timestamp,
            revision: None,
            payload,
            parent,
        })
    }
}

/// `commit-id` is the sha256 hex digest of the blueprint's canonical JSON
/// serialization, so the same payload always hashes to the same id (spec
/// §4.3 persistence requirement).
pub fn commit_id(payload: &Blueprint) -> Result<String, Error> {
    let canonical = serde_json::to_vec(payload).map_err(Error::Serialize)?;
    let digest = Sha256::digest(canonical);
    Ok(hex::encode(digest))
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("serialize blueprint payload")]
    Serialize(#[source] serde_json::Error),
}
