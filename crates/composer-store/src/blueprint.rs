// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The `Blueprint` value type (spec §3) and its serialization /
//! validation contracts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// User-authored declarative image customization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub version: String,
    #[serde(default)]
    pub packages: Vec<PackageRef>,
    #[serde(default)]
    pub modules: Vec<PackageRef>,
    #[serde(default)]
    pub groups: Vec<GroupRef>,
    #[serde(default)]
    pub customizations: Customizations,
}

impl Blueprint {
    /// Invariants from spec §3: non-empty printable name, semver version,
    /// unique user names (which also implies at most one password/key
    /// pair per user, since each name has exactly one entry).
    pub fn validate(&self) -> Result<(), InvalidBlueprint> {
        if self.name.is_empty() || !self.name.chars().all(|c| !c.is_control()) {
            return Err(InvalidBlueprint(format!("blueprint name {:?} is not a non-empty printable string", self.name)));
        }

        semver::Version::parse(&self.version)
            .map_err(|e| InvalidBlueprint(format!("version {:?} is not valid semver: {e}", self.version)))?;

        let mut seen = std::collections::HashSet::new();
        for user in &self.customizations.user {
            if !seen.insert(&user.name) {
                return Err(InvalidBlueprint(format!("duplicate user name {:?}", user.name)));
            }
        }

        Ok(())
    }

    /// Bump the patch component of `version` by one, per spec §4.3
    /// `put-blueprint` re-posting semantics.
    pub fn bump_patch_version(&mut self) -> Result<(), InvalidBlueprint> {
        let mut version =
            semver::Version::parse(&self.version).map_err(|e| InvalidBlueprint(format!("version {:?} is not valid semver: {e}", self.version)))?;
        version.patch += 1;
        version.pre = semver::Prerelease::EMPTY;
        version.build = semver::BuildMetadata::EMPTY;
        self.version = version.to_string();
        Ok(())
    }
}

#[derive(Debug, Error)]
#[error("invalid blueprint: {0}")]
pub struct InvalidBlueprint(pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRef {
    pub name: String,
    #[serde(default = "default_version_glob")]
    pub version: String,
}

fn default_version_glob() -> String {
    "*".to_string()
}

impl PackageRef {
    /// The spec string passed to the solver: bare name for a wildcard
    /// version, `name-version` otherwise.
    pub fn spec(&self) -> String {
        if self.version == "*" {
            self.name.clone()
        } else {
            format!("{}-{}", self.name, self.version)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Customizations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel: Option<KernelCustomization>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sshkey: Vec<SshKeyCustomization>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user: Vec<UserCustomization>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group: Vec<GroupCustomization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<TimezoneCustomization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<LocaleCustomization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firewall: Option<FirewallCustomization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<ServicesCustomization>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelCustomization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub append: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshKeyCustomization {
    pub user: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCustomization {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCustomization {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimezoneCustomization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ntpservers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocaleCustomization {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirewallCustomization {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<ServicesCustomization>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServicesCustomization {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enabled: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled: Vec<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    fn minimal(name: &str, version: &str) -> Blueprint {
        Blueprint {
            name: name.into(),
            description: String::new(),
            version: version.into(),
            packages: vec![],
            modules: vec![],
            groups: vec![],
            customizations: Customizations::default(),
        }
    }

    #[test]
    fn rejects_empty_name() {
        let bp = minimal("", "1.0.0");
        assert!(bp.validate().is_err());
    }

    #[test]
    fn rejects_non_semver_version() {
        let bp = minimal("bp", "not-a-version");
        assert!(bp.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_user_names() {
        let mut bp = minimal("bp", "1.0.0");
        bp.customizations.user = vec![
            UserCustomization {
                name: "redhat".into(),
                description: None,
                password: None,
                key: None,
                home: None,
                shell: None,
                groups: vec![],
                uid: None,
                gid: None,
            },
            UserCustomization {
                name: "redhat".into(),
                description: None,
                password: None,
                key: None,
                home: None,
                shell: None,
                groups: vec![],
                uid: None,
                gid: None,
            },
        ];
        assert!(bp.validate().is_err());
    }

    #[test]
    fn bump_patch_version_increments_and_clears_prerelease() {
        let mut bp = minimal("bp", "2.1.2");
        bp.bump_patch_version().unwrap();
        assert_eq!(bp.version, "2.1.3");
    }

    #[test]
    fn json_and_toml_round_trip() {
        let mut bp = minimal("bp", "1.0.0");
        bp.customizations.hostname = Some("image".into());
        bp.packages.push(PackageRef {
            name: "bash".into(),
            version: "*".into(),
        });

        let json = serde_json::to_string(&bp).unwrap();
        let from_json: Blueprint = serde_json::from_str(&json).unwrap();
        assert_eq!(bp, from_json);

        let toml = toml::to_string(&bp).unwrap();
        let from_toml: Blueprint = toml::from_str(&toml).unwrap();
        assert_eq!(bp, from_toml);
    }

    #[test]
    fn package_spec_formats_wildcard_and_pinned() {
        let wildcard = PackageRef {
            name: "bash".into(),
            version: "*".into(),
        };
        assert_eq!(wildcard.spec(), "bash");

        let pinned = PackageRef {
            name: "bash".into(),
            version: "5.2.*".into(),
        };
        assert_eq!(pinned.spec(), "bash-5.2.*");
    }
}
