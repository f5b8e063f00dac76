// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Typed constructors for the stage kinds the composer emits. Each
//! variant knows its own option schema; [`StageKind::into_stage`] lowers
//! it into the opaque `{name, options}` shape the build engine consumes.
//!
//! This is the "tagged-variant of known stage kinds" shape called for
//! instead of open inheritance — stages outside this enum simply cannot
//! be constructed by the registry.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{Options, Stage};

/// A repository reference carried into the package-install stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoRef {
    pub id: String,
    pub name: String,
    pub baseurl: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpgkey: Option<String>,
}

/// One user to materialize in the `users` stage. `password` is always a
/// crypt hash by the time it reaches this type — never plaintext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<i64>,
}

/// Known, checked stage kinds. Anything not representable here is not a
/// stage the composer can emit.
#[derive(Debug, Clone, PartialEq)]
pub enum StageKind {
    Dnf {
        packages: Vec<String>,
        excluded: Vec<String>,
        repositories: Vec<RepoRef>,
    },
    FixBls,
    Locale {
        language: String,
    },
    Keymap {
        keymap: String,
    },
    Hostname {
        hostname: String,
    },
    Timezone {
        timezone: String,
    },
    Chrony {
        servers: Vec<String>,
    },
    Users {
        users: Vec<UserEntry>,
    },
    Groups {
        groups: Vec<(String, Option<i64>)>,
    },
    Fstab {
        root_fs_uuid: String,
    },
    Grub2 {
        kernel_options: String,
        root_fs_uuid: String,
    },
    Systemd {
        enabled: Vec<String>,
        disabled: Vec<String>,
    },
    Firewall {
        ports: Vec<String>,
        enabled_services: Vec<String>,
        disabled_services: Vec<String>,
    },
    Selinux {
        file_contexts: String,
    },
}

impl StageKind {
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Dnf { .. } => "dnf",
            StageKind::FixBls => "fix-bls",
            StageKind::Locale { .. } => "locale",
            StageKind::Keymap { .. } => "keymap",
            StageKind::Hostname { .. } => "hostname",
            StageKind::Timezone { .. } => "timezone",
            StageKind::Chrony { .. } => "chrony",
            StageKind::Users { .. } => "users",
            StageKind::Groups { .. } => "groups",
            StageKind::Fstab { .. } => "fstab",
            StageKind::Grub2 { .. } => "grub2",
            StageKind::Systemd { .. } => "systemd",
            StageKind::Firewall { .. } => "firewall",
            StageKind::Selinux { .. } => "selinux",
        }
    }

    pub fn into_stage(self) -> Stage {
        let name = self.name();
        let options = self.into_options();
        Stage::new(name, options)
    }

    fn into_options(self) -> Options {
        let mut options = Options::new();
        match self {
            StageKind::Dnf {
                packages,
                excluded,
                repositories,
            } => {
                options.insert("packages".into(), json!(packages));
                options.insert("excludePackages".into(), json!(excluded));
                options.insert("repositories".into(), json!(repositories));
            }
            StageKind::FixBls => {}
            StageKind::Locale { language } => {
                options.insert("language".into(), Value::from(language));
            }
            StageKind::Keymap { keymap } => {
                options.insert("keymap".into(), Value::from(keymap));
            }
            StageKind::Hostname { hostname } => {
                options.insert("hostname".into(), Value::from(hostname));
            }
            StageKind::Timezone { timezone } => {
                options.insert("timezone".into(), Value::from(timezone));
            }
            StageKind::Chrony { servers } => {
                options.insert("timeservers".into(), json!(servers));
            }
            StageKind::Users { users } => {
                options.insert("users".into(), json!(users));
            }
            StageKind::Groups { groups } => {
                let value: Vec<Value> = groups
                    .into_iter()
                    .map(|(name, gid)| json!({ "name": name, "gid": gid }))
                    .collect();
                options.insert("groups".into(), Value::Array(value));
            }
            StageKind::Fstab { root_fs_uuid } => {
                options.insert("rootFsUuid".into(), Value::from(root_fs_uuid));
            }
            StageKind::Grub2 {
                kernel_options,
                root_fs_uuid,
            } => {
                options.insert("kernelOptions".into(), Value::from(kernel_options));
                options.insert("rootFsUuid".into(), Value::from(root_fs_uuid));
            }
            StageKind::Systemd { enabled, disabled } => {
                options.insert("enabledServices".into(), json!(enabled));
                options.insert("disabledServices".into(), json!(disabled));
            }
            StageKind::Firewall {
                ports,
                enabled_services,
                disabled_services,
            } => {
                options.insert("ports".into(), json!(ports));
                options.insert("enabledServices".into(), json!(enabled_services));
                options.insert("disabledServices".into(), json!(disabled_services));
            }
            StageKind::Selinux { file_contexts } => {
                options.insert("fileContexts".into(), Value::from(file_contexts));
            }
        }
        options
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dnf_stage_carries_package_lists() {
        let stage = StageKind::Dnf {
            packages: vec!["bash".into()],
            excluded: vec!["nano".into()],
            repositories: vec![],
        }
        .into_stage();

        assert_eq!(stage.name, "dnf");
        assert_eq!(stage.options["packages"], json!(["bash"]));
        assert_eq!(stage.options["excludePackages"], json!(["nano"]));
    }

    #[test]
    fn fix_bls_has_no_options() {
        let stage = StageKind::FixBls.into_stage();
        assert!(stage.options.is_empty());
    }
}
