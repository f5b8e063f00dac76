// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Optional local overrides of a distribution's base package list,
//! loaded the same vendor/admin/user way as any other [`Config`] domain.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Config;

/// Additions and removals applied to one distribution's base package set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PackageOverrides {
    #[serde(default)]
    pub add_packages: Vec<String>,
    #[serde(default)]
    pub remove_packages: Vec<String>,
}

/// Per-distribution package overrides, keyed by distribution name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DistroOverrides {
    #[serde(default)]
    pub distributions: BTreeMap<String, PackageOverrides>,
}

impl DistroOverrides {
    pub fn for_distribution(&self, name: &str) -> Option<&PackageOverrides> {
        self.distributions.get(name)
    }
}

impl Config for DistroOverrides {
    fn domain() -> String {
        "distro-overrides".to_string()
    }

    fn merge(self, other: Self) -> Self {
        let mut distributions = self.distributions;
        for (name, incoming) in other.distributions {
            distributions
                .entry(name)
                .and_modify(|existing| {
                    existing.add_packages.extend(incoming.add_packages.iter().cloned());
                    existing.remove_packages.extend(incoming.remove_packages.iter().cloned());
                })
                .or_insert(incoming);
        }
        Self { distributions }
    }
}
