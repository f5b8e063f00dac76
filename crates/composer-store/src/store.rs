// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The blueprint store (spec §4.3): an append-only commit log per name,
//! plus a mutable workspace overlay. Commits and workspace entries live in
//! two separate containers (spec §9 design note) so that "undo is
//! forward-only" stays obvious and `delete-workspace` can never prune
//! history.
//!
//! Persistence, when enabled, mirrors each committed and workspace write
//! to a content-addressed file tree under a root directory; the in-memory
//! index stays authoritative for reads. This is the "small file-tree
//! commit store" the spec allows in place of a database.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Utc;
use composer_solver::{DepsolveEntry, RepoConfig, SolverClient};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::blueprint::{Blueprint, InvalidBlueprint};
use crate::commit::{self, BlueprintCommit};

/// The effective blueprint for a name plus whether a workspace overlay
/// shadows its latest commit (spec §4.3 `get-info`).
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    pub blueprint: Blueprint,
    pub changed: bool,
}

#[derive(Default)]
struct Index {
    commits: HashMap<String, Vec<BlueprintCommit>>,
    workspace: HashMap<String, Blueprint>,
}

pub struct BlueprintStore {
    index: Mutex<Index>,
    persist: Option<PathBuf>,
}

impl Default for BlueprintStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl BlueprintStore {
    pub fn in_memory() -> Self {
        Self {
            index: Mutex::new(Index::default()),
            persist: None,
        }
    }

    /// Open (creating if absent) a file-tree-backed store rooted at `root`,
    /// loading any previously persisted commits and workspace entries.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, Error> {
        let root = root.into();
        fs_err::create_dir_all(root.join("commits"))?;
        fs_err::create_dir_all(root.join("workspace"))?;

        let mut index = Index::default();

        for entry in fs_err::read_dir(root.join("commits"))? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let mut chain = Vec::new();
            for commit_entry in fs_err::read_dir(entry.path())? {
                let commit_entry = commit_entry?;
                let bytes = fs_err::read(commit_entry.path())?;
                let commit: BlueprintCommit = serde_json::from_slice(&bytes).map_err(|e| Error::Parse(e.to_string()))?;
                chain.push(commit);
            }
            chain.sort_by_key(|c| c.timestamp);
            index.commits.insert(name, chain);
        }

        for entry in fs_err::read_dir(root.join("workspace"))? {
            let entry = entry?;
            let bytes = fs_err::read(entry.path())?;
            let bp: Blueprint = serde_json::from_slice(&bytes).map_err(|e| Error::Parse(e.to_string()))?;
            index.workspace.insert(bp.name.clone(), bp);
        }

        Ok(Self {
            index: Mutex::new(index),
            persist: Some(root),
        })
    }

    /// Commit `bp` under its name. If a commit chain already exists, the
    /// patch component of `bp.version` is auto-bumped first (spec §4.3,
    /// property 4). Clears any workspace overlay for the same name.
    pub async fn put_blueprint(&self, mut bp: Blueprint) -> Result<BlueprintCommit, Error> {
        let mut index = self.index.lock().await;

        let chain = index.commits.entry(bp.name.clone()).or_default();
        let parent = chain.last().map(|c| c.commit_id.clone());
        if parent.is_some() {
            bp.bump_patch_version()?;
        }
        bp.validate()?;

        let commit = BlueprintCommit::new(bp.clone(), parent, Utc::now())?;
        self.persist_commit(&commit)?;

        let chain = index.commits.get_mut(&commit.name).expect("chain entry exists");
        chain.push(commit.clone());
        index.workspace.remove(&commit.name);
        self.remove_persisted_workspace(&commit.name)?;

        Ok(commit)
    }

    /// Store `bp` as the workspace overlay. Never touches the commit log.
    pub async fn put_workspace(&self, bp: Blueprint) -> Result<(), Error> {
        bp.validate()?;
        self.persist_workspace(&bp)?;

        let mut index = self.index.lock().await;
        index.workspace.insert(bp.name.clone(), bp);
        Ok(())
    }

    /// The workspace overlay if present, else the latest commit.
    pub async fn get_info(&self, name: &str) -> Result<Info, Error> {
        let index = self.index.lock().await;
        if let Some(bp) = index.workspace.get(name) {
            return Ok(Info {
                blueprint: bp.clone(),
                changed: true,
            });
        }

        let commit = index
            .commits
            .get(name)
            .and_then(|chain| chain.last())
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        Ok(Info {
            blueprint: commit.payload.clone(),
            changed: false,
        })
    }

    /// Names with any commit or workspace entry, sorted lexicographically.
    pub async fn list(&self) -> Vec<String> {
        let index = self.index.lock().await;
        let mut names: std::collections::BTreeSet<String> = index.commits.keys().cloned().collect();
        names.extend(index.workspace.keys().cloned());
        names.into_iter().collect()
    }

    /// Remove the commit chain and workspace overlay for `name`.
    pub async fn delete_blueprint(&self, name: &str) -> Result<(), Error> {
        let mut index = self.index.lock().await;
        let had_commits = index.commits.remove(name).is_some();
        let had_workspace = index.workspace.remove(name).is_some();
        if !had_commits && !had_workspace {
            return Err(Error::NotFound(name.to_string()));
        }

        if let Some(root) = &self.persist {
            let dir = root.join("commits").join(name);
            if dir.exists() {
                fs_err::remove_dir_all(dir)?;
            }
        }
        self.remove_persisted_workspace(name)?;

        Ok(())
    }

    /// Remove the workspace overlay only; the latest commit becomes
    /// visible again, unchanged.
    pub async fn delete_workspace(&self, name: &str) -> Result<(), Error> {
        let mut index = self.index.lock().await;
        if index.workspace.remove(name).is_none() {
            return Err(Error::NotFound(name.to_string()));
        }
        drop(index);
        self.remove_persisted_workspace(name)?;
        Ok(())
    }

    /// The commit chain for each requested name, newest-first.
    pub async fn changes(&self, names: &[String]) -> Result<HashMap<String, Vec<BlueprintCommit>>, Error> {
        let index = self.index.lock().await;
        let mut result = HashMap::new();
        for name in names {
            let mut chain = index.commits.get(name).ok_or_else(|| Error::NotFound(name.clone()))?.clone();
            chain.reverse();
            result.insert(name.clone(), chain);
        }
        Ok(result)
    }

    /// Assign the next unused positive revision to the head commit. A
    /// no-op returning the existing revision if the head is already
    /// tagged.
    pub async fn tag(&self, name: &str) -> Result<u64, Error> {
        let mut index = self.index.lock().await;
        let chain = index.commits.get_mut(name).ok_or_else(|| Error::NotFound(name.to_string()))?;
        let max_revision = chain.iter().filter_map(|c| c.revision).max().unwrap_or(0);

        let head = chain.last_mut().ok_or_else(|| Error::NotFound(name.to_string()))?;
        if let Some(existing) = head.revision {
            return Ok(existing);
        }

        let revision = max_revision + 1;
        head.revision = Some(revision);
        let head = head.clone();
        self.persist_commit(&head)?;

        Ok(revision)
    }

    /// Append a new commit whose payload equals that of `commit_id`,
    /// keeping the chain intact (undo is forward-only).
    pub async fn undo(&self, name: &str, commit_id: &str) -> Result<BlueprintCommit, Error> {
        let mut index = self.index.lock().await;
        let chain = index.commits.get(name).ok_or_else(|| Error::NotFound(name.to_string()))?;

        let target = chain
            .iter()
            .find(|c| c.commit_id == commit_id)
            .ok_or_else(|| Error::UnknownCommit(commit_id.to_string()))?
            .payload
            .clone();

        let parent = chain.last().map(|c| c.commit_id.clone());
        let commit = BlueprintCommit::new(target, parent, Utc::now())?;
        self.persist_commit(&commit)?;

        index.commits.get_mut(name).expect("chain entry exists").push(commit.clone());

        Ok(commit)
    }

    /// Resolve the latest-visible blueprint's package and module specs
    /// against `repos`.
    pub async fn depsolve(&self, name: &str, repos: &[RepoConfig], solver: &SolverClient) -> Result<Vec<DepsolveEntry>, Error> {
        let info = self.get_info(name).await?;
        let specs: Vec<String> = info
            .blueprint
            .packages
            .iter()
            .chain(info.blueprint.modules.iter())
            .map(|p| p.spec())
            .collect();
        Ok(solver.depsolve(repos, &specs).await?)
    }

    /// Resolve and rewrite the latest-visible blueprint's package and
    /// module versions to exact NEVRA strings.
    pub async fn freeze(&self, name: &str, repos: &[RepoConfig], solver: &SolverClient) -> Result<Blueprint, Error> {
        let mut info = self.get_info(name).await?;
        let resolved = self.depsolve(name, repos, solver).await?;
        let by_name: HashMap<&str, &DepsolveEntry> = resolved.iter().map(|e| (e.name.as_str(), e)).collect();

        for package in info.blueprint.packages.iter_mut().chain(info.blueprint.modules.iter_mut()) {
            if let Some(entry) = by_name.get(package.name.as_str()) {
                package.version = entry.nevra();
            }
        }

        Ok(info.blueprint)
    }

    fn persist_commit(&self, commit: &BlueprintCommit) -> Result<(), Error> {
        let Some(root) = &self.persist else { return Ok(()) };
        let dir = root.join("commits").join(&commit.name);
        fs_err::create_dir_all(&dir)?;
        let bytes = serde_json::to_vec_pretty(commit).map_err(|e| Error::Parse(e.to_string()))?;
        fs_err::write(dir.join(format!("{}.json", commit.commit_id)), bytes)?;
        Ok(())
    }

    fn persist_workspace(&self, bp: &Blueprint) -> Result<(), Error> {
        let Some(root) = &self.persist else { return Ok(()) };
        let bytes = serde_json::to_vec_pretty(bp).map_err(|e| Error::Parse(e.to_string()))?;
        fs_err::write(root.join("workspace").join(format!("{}.json", bp.name)), bytes)?;
        Ok(())
    }

    fn remove_persisted_workspace(&self, name: &str) -> Result<(), Error> {
        let Some(root) = &self.persist else { return Ok(()) };
        let path = root.join("workspace").join(format!("{name}.json"));
        if path.exists() {
            fs_err::remove_file(path)?;
        }
        Ok(())
    }
}

/// Source format for a POSTed blueprint body (spec §4.6 content
/// negotiation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

/// Parse a blueprint from a request body in either TOML or JSON.
pub fn parse_blueprint(bytes: &[u8], format: Format) -> Result<Blueprint, Error> {
    match format {
        Format::Json => serde_json::from_slice(bytes).map_err(|e| Error::Parse(e.to_string())),
        Format::Toml => {
            let text = std::str::from_utf8(bytes).map_err(|e| Error::Parse(e.to_string()))?;
            toml::from_str(text).map_err(|e| Error::Parse(e.to_string()))
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("blueprint {0:?} not found")]
    NotFound(String),
    #[error("parse blueprint: {0}")]
    Parse(String),
    #[error(transparent)]
    InvalidBlueprint(#[from] InvalidBlueprint),
    #[error("unknown commit {0:?}")]
    UnknownCommit(String),
    #[error(transparent)]
    Commit(#[from] commit::Error),
    #[error(transparent)]
    Solver(#[from] composer_solver::Error),
    #[error("store I/O")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blueprint::PackageRef;

    fn blueprint(name: &str, version: &str) -> Blueprint {
        Blueprint {
            name: name.into(),
            description: "orig".into(),
            version: version.into(),
            packages: vec![PackageRef {
                name: "bash".into(),
                version: "*".into(),
            }],
            modules: vec![],
            groups: vec![],
            customizations: Default::default(),
        }
    }

    #[tokio::test]
    async fn put_blueprint_then_get_info_round_trips() {
        let store = BlueprintStore::in_memory();
        store.put_blueprint(blueprint("bp", "1.0.0")).await.unwrap();
        let info = store.get_info("bp").await.unwrap();
        assert_eq!(info.blueprint.version, "1.0.0");
        assert!(!info.changed);
    }

    #[tokio::test]
    async fn reposting_bumps_patch_version() {
        let store = BlueprintStore::in_memory();
        store.put_blueprint(blueprint("bp", "2.1.2")).await.unwrap();
        store.put_blueprint(blueprint("bp", "2.1.2")).await.unwrap();
        assert_eq!(store.get_info("bp").await.unwrap().blueprint.version, "2.1.3");
    }

    #[tokio::test]
    async fn workspace_shadows_then_restores_on_delete() {
        let store = BlueprintStore::in_memory();
        store.put_blueprint(blueprint("bp", "0.0.1")).await.unwrap();

        let mut wip = blueprint("bp", "0.0.1");
        wip.description = "wip".into();
        store.put_workspace(wip).await.unwrap();

        let info = store.get_info("bp").await.unwrap();
        assert!(info.changed);
        assert_eq!(info.blueprint.description, "wip");

        store.delete_workspace("bp").await.unwrap();
        let info = store.get_info("bp").await.unwrap();
        assert!(!info.changed);
        assert_eq!(info.blueprint.description, "orig");
    }

    #[tokio::test]
    async fn undo_restores_prior_payload_without_truncating_chain() {
        let store = BlueprintStore::in_memory();

        let mut first = blueprint("bp", "0.0.5");
        first.packages[0].version = "*".into();
        let first_commit = store.put_blueprint(first).await.unwrap();

        let mut second = blueprint("bp", "0.0.5");
        second.packages[0].version = "0.5.*".into();
        store.put_blueprint(second).await.unwrap();

        store.undo("bp", &first_commit.commit_id).await.unwrap();

        let info = store.get_info("bp").await.unwrap();
        assert_eq!(info.blueprint.packages[0].version, "*");

        let chain = store.changes(&["bp".to_string()]).await.unwrap();
        assert_eq!(chain["bp"].len(), 3);
    }

    #[tokio::test]
    async fn tag_is_monotone_and_idempotent_without_new_commits() {
        let store = BlueprintStore::in_memory();
        store.put_blueprint(blueprint("bp", "1.0.0")).await.unwrap();

        let r1 = store.tag("bp").await.unwrap();
        let r1_again = store.tag("bp").await.unwrap();
        assert_eq!(r1, r1_again);

        store.put_blueprint(blueprint("bp", "1.0.0")).await.unwrap();
        let r2 = store.tag("bp").await.unwrap();
        assert_eq!(r2, r1 + 1);
    }

    #[tokio::test]
    async fn undo_against_unknown_commit_is_rejected() {
        let store = BlueprintStore::in_memory();
        store.put_blueprint(blueprint("bp", "1.0.0")).await.unwrap();
        let err = store.undo("bp", "FFFF").await.unwrap_err();
        assert!(matches!(err, Error::UnknownCommit(_)));
    }

    #[tokio::test]
    async fn list_is_sorted_and_covers_commits_and_workspace_only_names() {
        let store = BlueprintStore::in_memory();
        store.put_blueprint(blueprint("zeta", "1.0.0")).await.unwrap();
        store.put_workspace(blueprint("alpha", "1.0.0")).await.unwrap();
        assert_eq!(store.list().await, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[tokio::test]
    async fn delete_blueprint_removes_commits_and_workspace() {
        let store = BlueprintStore::in_memory();
        store.put_blueprint(blueprint("bp", "1.0.0")).await.unwrap();
        store.put_workspace(blueprint("bp", "1.0.0")).await.unwrap();
        store.delete_blueprint("bp").await.unwrap();
        assert!(matches!(store.get_info("bp").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn file_tree_persistence_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("composer-store-test-{}", std::process::id()));
        let _ = fs_err::remove_dir_all(&dir);

        {
            let store = BlueprintStore::open(&dir).unwrap();
            store.put_blueprint(blueprint("bp", "1.0.0")).await.unwrap();
        }

        let reopened = BlueprintStore::open(&dir).unwrap();
        let info = reopened.get_info("bp").await.unwrap();
        assert_eq!(info.blueprint.version, "1.0.0");

        fs_err::remove_dir_all(&dir).unwrap();
    }
}
