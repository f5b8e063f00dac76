// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// A repository passed to the solver subprocess. Exactly one of
/// `baseurl`, `metalink`, `mirrorlist` must be set (spec §3, `RepoConfig`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoConfig {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub baseurl: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metalink: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mirrorlist: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub gpgkey: Option<String>,
}

impl RepoConfig {
    pub fn with_baseurl(id: impl Into<String>, name: impl Into<String>, baseurl: Url) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            baseurl: Some(baseurl),
            metalink: None,
            mirrorlist: None,
            checksum: None,
            gpgkey: None,
        }
    }

    /// Enforce the "exactly one source URL kind" invariant.
    pub fn validate(&self) -> Result<(), RepoConfigError> {
        let set = [self.baseurl.is_some(), self.metalink.is_some(), self.mirrorlist.is_some()];
        match set.iter().filter(|present| **present).count() {
            1 => Ok(()),
            0 => Err(RepoConfigError::NoSource(self.id.clone())),
            _ => Err(RepoConfigError::MultipleSources(self.id.clone())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepoConfigError {
    #[error("repo {0:?} has no baseurl, metalink, or mirrorlist")]
    NoSource(String),
    #[error("repo {0:?} has more than one of baseurl, metalink, mirrorlist")]
    MultipleSources(String),
}
