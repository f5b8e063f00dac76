// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The distribution registry (spec §4.2): per-distribution repository
//! lists and `format -> OutputSpec` tables, plus the deterministic
//! `compose` operation that lowers a blueprint into a [`Recipe`].
//!
//! Distributions are plain data plus one algorithm, not a plugin
//! interface — there is exactly one shape (`{list-formats, filename-mime,
//! compose}`), so a single struct suffices rather than a capability enum.

use std::collections::BTreeMap;

use composer_recipe::{Assembler, Options, Pipeline, Recipe, RepoRef, Stage, StageKind, UserEntry};
use composer_solver::RepoConfig;
use composer_store::Blueprint;
use thiserror::Error;

pub mod fedora30;

/// The assembler family an [`OutputSpec`] lowers to. Narrower than full
/// open-ended polymorphism: every assembler is `{name, options}` and the
/// composer only ever emits one of these three families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerKind {
    /// `qemu-img`-backed disk images; `format` selects raw/raw.xz/qcow2/vmdk/vpc.
    Qemu,
    Tar,
    RawFs,
}

/// Everything the composer needs to know about one output format for one
/// distribution (spec §4.2).
#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub filename: String,
    pub mime_type: String,
    pub base_packages: Vec<String>,
    pub excluded_packages: Vec<String>,
    pub base_enabled_services: Vec<String>,
    pub base_disabled_services: Vec<String>,
    pub kernel_options_default: String,
    pub include_fstab: bool,
    pub assembler: AssemblerKind,
}

/// One distribution: its repositories, build pipeline, deterministic
/// filesystem UUIDs, and its table of supported output formats.
#[derive(Debug, Clone)]
pub struct Distribution {
    pub name: String,
    pub repos: Vec<RepoConfig>,
    pub build_runner: String,
    pub root_fs_uuid: String,
    pub ptuuid: String,
    formats: BTreeMap<String, OutputSpec>,
}

impl Distribution {
    pub fn new(name: impl Into<String>, build_runner: impl Into<String>, root_fs_uuid: impl Into<String>, ptuuid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            repos: Vec::new(),
            build_runner: build_runner.into(),
            root_fs_uuid: root_fs_uuid.into(),
            ptuuid: ptuuid.into(),
            formats: BTreeMap::new(),
        }
    }

    pub fn with_repo(mut self, repo: RepoConfig) -> Self {
        self.repos.push(repo);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>, spec: OutputSpec) -> Self {
        self.formats.insert(format.into(), spec);
        self
    }

    /// Apply a local admin's additions/removals (spec §4.8
    /// `DistroOverrides`) to every format's base package list. A no-op if
    /// `overrides` has no entry for this distribution's name.
    pub fn with_overrides(mut self, overrides: &composer_config::DistroOverrides) -> Self {
        let Some(package_overrides) = overrides.for_distribution(&self.name) else {
            return self;
        };

        for spec in self.formats.values_mut() {
            spec.base_packages.retain(|pkg| !package_overrides.remove_packages.contains(pkg));
            for added in &package_overrides.add_packages {
                if !spec.base_packages.contains(added) {
                    spec.base_packages.push(added.clone());
                }
            }
        }

        self
    }

    /// Sorted sequence of supported format names.
    pub fn list_formats(&self) -> Vec<String> {
        self.formats.keys().cloned().collect()
    }

    pub fn filename_mime(&self, format: &str) -> Result<(String, String), Error> {
        let spec = self.formats.get(format).ok_or_else(|| Error::UnknownFormat(format.to_string()))?;
        Ok((spec.filename.clone(), spec.mime_type.clone()))
    }

    /// Lower `bp` into a fully materialized [`Recipe`] for `format`,
    /// following the fifteen-step composition algorithm (spec §4.2).
    pub fn compose(&self, bp: &Blueprint, format: &str) -> Result<Recipe, Error> {
        bp.validate().map_err(|e| Error::InvalidBlueprint(e.to_string()))?;
        let spec = self.formats.get(format).ok_or_else(|| Error::UnknownFormat(format.to_string()))?;

        let build = Pipeline::with_runner(self.build_runner.clone());
        let mut stages = Pipeline::new();

        stages.push(self.dnf_stage(spec, bp));
        stages.push(StageKind::FixBls.into_stage());

        let language = bp
            .customizations
            .locale
            .as_ref()
            .and_then(|l| l.languages.first())
            .cloned()
            .unwrap_or_else(|| "en_US".to_string());
        stages.push(StageKind::Locale { language }.into_stage());

        if let Some(keyboard) = bp.customizations.locale.as_ref().and_then(|l| l.keyboard.clone()) {
            stages.push(StageKind::Keymap { keymap: keyboard }.into_stage());
        }

        if let Some(hostname) = bp.customizations.hostname.clone() {
            stages.push(StageKind::Hostname { hostname }.into_stage());
        }

        if let Some(tz) = &bp.customizations.timezone {
            if let Some(timezone) = tz.timezone.clone() {
                stages.push(StageKind::Timezone { timezone }.into_stage());
            }
            if !tz.ntpservers.is_empty() {
                stages.push(
                    StageKind::Chrony {
                        servers: tz.ntpservers.clone(),
                    }
                    .into_stage(),
                );
            }
        }

        if !bp.customizations.user.is_empty() {
            let users = bp
                .customizations
                .user
                .iter()
                .map(|u| crypt_user(u))
                .collect::<Result<Vec<_>, Error>>()?;
            stages.push(StageKind::Users { users }.into_stage());
        }

        if !bp.customizations.group.is_empty() {
            let groups = bp.customizations.group.iter().map(|g| (g.name.clone(), g.gid)).collect();
            stages.push(StageKind::Groups { groups }.into_stage());
        }

        if spec.include_fstab {
            stages.push(
                StageKind::Fstab {
                    root_fs_uuid: self.root_fs_uuid.clone(),
                }
                .into_stage(),
            );
        }

        let mut kernel_options = spec.kernel_options_default.clone();
        if let Some(append) = bp.customizations.kernel.as_ref().and_then(|k| k.append.clone()) {
            kernel_options.push(' ');
            kernel_options.push_str(&append);
        }
        stages.push(
            StageKind::Grub2 {
                kernel_options,
                root_fs_uuid: self.root_fs_uuid.clone(),
            }
            .into_stage(),
        );

        let bp_enabled = &bp.customizations.services.as_ref().map(|s| s.enabled.clone()).unwrap_or_default();
        let bp_disabled = &bp.customizations.services.as_ref().map(|s| s.disabled.clone()).unwrap_or_default();
        if !spec.base_enabled_services.is_empty() || !spec.base_disabled_services.is_empty() || !bp_enabled.is_empty() || !bp_disabled.is_empty() {
            stages.push(
                StageKind::Systemd {
                    enabled: merge_unique(&spec.base_enabled_services, bp_enabled),
                    disabled: merge_unique(&spec.base_disabled_services, bp_disabled),
                }
                .into_stage(),
            );
        }

        if let Some(firewall) = &bp.customizations.firewall {
            let enabled = firewall.services.as_ref().map(|s| s.enabled.clone()).unwrap_or_default();
            let disabled = firewall.services.as_ref().map(|s| s.disabled.clone()).unwrap_or_default();
            stages.push(
                StageKind::Firewall {
                    ports: firewall.ports.clone(),
                    enabled_services: enabled,
                    disabled_services: disabled,
                }
                .into_stage(),
            );
        }

        stages.push(
            StageKind::Selinux {
                file_contexts: "etc/selinux/targeted/contexts/files/file_contexts".to_string(),
            }
            .into_stage(),
        );

        let assembler = self.assembler(spec, format);

        Ok(Recipe { build, stages, assembler })
    }

    fn dnf_stage(&self, spec: &OutputSpec, bp: &Blueprint) -> Stage {
        let mut packages = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for name in spec
            .base_packages
            .iter()
            .cloned()
            .chain(bp.packages.iter().map(|p| p.name.clone()))
            .chain(bp.modules.iter().map(|p| p.name.clone()))
        {
            if seen.insert(name.clone()) {
                packages.push(name);
            }
        }

        StageKind::Dnf {
            packages,
            excluded: spec.excluded_packages.clone(),
            repositories: self.repos.iter().map(repo_ref).collect(),
        }
        .into_stage()
    }

    fn assembler(&self, spec: &OutputSpec, format: &str) -> Assembler {
        let mut options = Options::new();
        options.insert("filename".into(), serde_json::Value::from(spec.filename.clone()));
        options.insert("mimeType".into(), serde_json::Value::from(spec.mime_type.clone()));
        options.insert("format".into(), serde_json::Value::from(format));

        match spec.assembler {
            AssemblerKind::Qemu => {
                options.insert("ptuuid".into(), serde_json::Value::from(self.ptuuid.clone()));
                options.insert("rootFsUuid".into(), serde_json::Value::from(self.root_fs_uuid.clone()));
                Assembler::new("qemu", options)
            }
            AssemblerKind::Tar => Assembler::new("tar", options),
            AssemblerKind::RawFs => {
                options.insert("rootFsUuid".into(), serde_json::Value::from(self.root_fs_uuid.clone()));
                Assembler::new("rawfs", options)
            }
        }
    }
}

fn repo_ref(repo: &RepoConfig) -> RepoRef {
    let baseurl = repo
        .baseurl
        .as_ref()
        .or(repo.metalink.as_ref())
        .or(repo.mirrorlist.as_ref())
        .map(|url| url.to_string())
        .unwrap_or_default();

    RepoRef {
        id: repo.id.clone(),
        name: repo.name.clone(),
        baseurl,
        checksum: repo.checksum.clone(),
        gpgkey: repo.gpgkey.clone(),
    }
}

/// Replace a plaintext password with its SHA-512 crypt hash; pass existing
/// hashes through unchanged (spec §4.2 step 8).
fn crypt_user(user: &composer_store::UserCustomization) -> Result<UserEntry, Error> {
    let password = match &user.password {
        Some(p) if composer_crypt::is_crypt_hash(p) => Some(p.clone()),
        Some(p) => Some(composer_crypt::hash_password(p).map_err(|e| Error::Crypt(e.to_string()))?),
        None => None,
    };

    Ok(UserEntry {
        name: user.name.clone(),
        description: user.description.clone(),
        password,
        key: user.key.clone(),
        home: user.home.clone(),
        shell: user.shell.clone(),
        groups: user.groups.clone(),
        uid: user.uid,
        gid: user.gid,
    })
}

fn merge_unique(base: &[String], extra: &[String]) -> Vec<String> {
    let mut merged = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for name in base.iter().chain(extra.iter()) {
        if seen.insert(name.clone()) {
            merged.push(name.clone());
        }
    }
    merged
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown format {0:?}")]
    UnknownFormat(String),
    #[error("invalid blueprint: {0}")]
    InvalidBlueprint(String),
    #[error("password crypting failed: {0}")]
    Crypt(String),
}
