// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Immutable value types describing a build recipe: pipelines of stages
//! feeding an assembler. The types here are pure data — composing a
//! [`Recipe`] from a blueprint lives in `composer-distro`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

mod stage;

pub use stage::{RepoRef, StageKind, UserEntry};

/// A named bag of stage-specific options. Kept as a `BTreeMap` (never a
/// `HashMap`) so that serialization order is deterministic without a
/// separate canonicalization pass.
pub type Options = BTreeMap<String, Value>;

/// A fully materialized build recipe: a build pipeline, a stages pipeline,
/// and the assembler that turns the result into an output artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub build: Pipeline,
    pub stages: Pipeline,
    pub assembler: Assembler,
}

impl Recipe {
    /// Serialize to canonical JSON: sorted keys, no insignificant
    /// whitespace. Two recipes produced from equal inputs must be
    /// byte-equal under this encoding — this is the core reproducibility
    /// invariant (spec §4.1).
    pub fn canonical_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(Error::Serialize)
    }
}

/// An ordered sequence of [`Stage`]s, optionally bound to a named runner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner: Option<String>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runner(runner: impl Into<String>) -> Self {
        Self {
            stages: Vec::new(),
            runner: Some(runner.into()),
        }
    }

    pub fn push(&mut self, stage: Stage) -> &mut Self {
        self.stages.push(stage);
        self
    }
}

/// A single build step. The option schema is stage-name-specific; the
/// stage itself is opaque past this point. Use [`StageKind`] to build one
/// with a known, checked schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub options: Options,
}

impl Stage {
    pub fn new(name: impl Into<String>, options: Options) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }
}

/// The terminal step of a recipe: turns the assembled tree into an output
/// artifact (raw disk, qcow2, vmdk, vhd, tar, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assembler {
    pub name: String,
    pub options: Options,
}

impl Assembler {
    pub fn new(name: impl Into<String>, options: Options) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("serialize recipe")]
    Serialize(#[source] serde_json::Error),
}
