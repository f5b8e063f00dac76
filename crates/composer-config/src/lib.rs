// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Layered YAML configuration loading: vendor defaults under
//! `/usr/share/<program>`, admin overrides under `/etc/<program>`, merged
//! in that order. A user scope (`~/.config/<program>`) is used instead when
//! running unprivileged.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

mod distro_overrides;

pub use distro_overrides::{DistroOverrides, PackageOverrides};

const EXTENSION: &str = "yaml";

/// A loadable configuration domain: one YAML document per `domain()`,
/// merged across scopes with `merge()` (later entries take precedence).
pub trait Config: DeserializeOwned {
    fn domain() -> String;

    fn merge(self, other: Self) -> Self;
}

#[derive(Debug, Clone)]
pub struct Manager {
    program: String,
    scope: Scope,
}

impl Manager {
    pub fn system(root: impl Into<PathBuf>, program: impl ToString) -> Self {
        Self {
            program: program.to_string(),
            scope: Scope::System(root.into()),
        }
    }

    pub fn user(program: impl ToString) -> Option<Self> {
        Some(Self {
            program: program.to_string(),
            scope: Scope::User(dirs::config_dir()?),
        })
    }

    /// Load and merge every matching config file across this manager's
    /// scope, in vendor-then-admin (or user) order. Returns `None` if no
    /// file was found; malformed files are surfaced via [`Error`] to the
    /// caller of [`Manager::try_load`], while this convenience method
    /// silently skips unreadable entries the way the teacher's loader does.
    pub fn load<T: Config>(&self) -> Option<T> {
        self.try_load().ok().flatten()
    }

    /// Like [`Manager::load`], but returns a [`Error::Parse`] instead of
    /// silently skipping a file that exists but fails to parse.
    pub fn try_load<T: Config>(&self) -> Result<Option<T>, Error> {
        let domain = T::domain();
        let mut configs = Vec::new();

        for (entry, search) in self.searches() {
            for path in enumerate_paths(entry, &search, &self.program, &domain) {
                configs.push(read_config::<T>(&path)?);
            }
        }

        Ok(configs.into_iter().reduce(T::merge))
    }

    pub fn save<T: Config + Serialize>(&self, name: impl fmt::Display, config: &T) -> Result<(), Error> {
        let domain = T::domain();

        let search = match &self.scope {
            Scope::System(root) => Search::System {
                root: root.clone(),
                base: Base::Admin,
            },
            Scope::User(root) => Search::Home(root.clone()),
        };
        let dir = search.dir(&self.program, &domain);

        fs_err::create_dir_all(&dir).map_err(Error::Io)?;

        let path = dir.join(format!("{name}.{EXTENSION}"));
        let serialized = serde_yaml::to_string(config).map_err(Error::Yaml)?;
        fs_err::write(&path, serialized).map_err(Error::Io)?;

        Ok(())
    }

    fn searches(&self) -> Vec<(Entry, Search)> {
        match &self.scope {
            Scope::System(root) => vec![
                (
                    Entry::File,
                    Search::System {
                        root: root.clone(),
                        base: Base::Vendor,
                    },
                ),
                (
                    Entry::Directory,
                    Search::System {
                        root: root.clone(),
                        base: Base::Vendor,
                    },
                ),
                (
                    Entry::File,
                    Search::System {
                        root: root.clone(),
                        base: Base::Admin,
                    },
                ),
                (
                    Entry::Directory,
                    Search::System {
                        root: root.clone(),
                        base: Base::Admin,
                    },
                ),
            ],
            Scope::User(root) => vec![(Entry::Directory, Search::Home(root.clone()))],
        }
    }
}

fn enumerate_paths(entry: Entry, search: &Search, program: &str, domain: &str) -> Vec<PathBuf> {
    match entry {
        Entry::File => {
            let file = search.file(program, domain);
            if file.exists() {
                vec![file]
            } else {
                vec![]
            }
        }
        Entry::Directory => {
            let Ok(read_dir) = fs_err::read_dir(search.dir(program, domain)) else {
                return vec![];
            };

            read_dir
                .filter_map(|entry| {
                    let entry = entry.ok()?;
                    let path = entry.path();
                    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or_default();
                    (path.is_file() && extension == EXTENSION).then_some(path)
                })
                .collect()
        }
    }
}

fn read_config<T: Config>(path: &Path) -> Result<T, Error> {
    let bytes = fs_err::read(path).map_err(Error::Io)?;
    serde_yaml::from_slice(&bytes).map_err(Error::Yaml)
}

#[derive(Clone, Copy)]
enum Base {
    Admin,
    Vendor,
}

impl Base {
    fn path(&self) -> &'static str {
        match self {
            Base::Admin => "etc",
            Base::Vendor => "usr/share",
        }
    }
}

enum Entry {
    File,
    Directory,
}

enum Search {
    System { root: PathBuf, base: Base },
    Home(PathBuf),
}

impl Search {
    fn file(&self, program: &str, domain: &str) -> PathBuf {
        match self {
            Search::System { root, base } => root.join(base.path()).join(program),
            Search::Home(root) => root.join(program),
        }
        .join(format!("{domain}.{EXTENSION}"))
    }

    fn dir(&self, program: &str, domain: &str) -> PathBuf {
        match self {
            Search::System { root, base } => root.join(base.path()).join(program).join(format!("{domain}.d")),
            Search::Home(root) => root.join(program).join(format!("{domain}.d")),
        }
    }
}

#[derive(Debug, Clone)]
enum Scope {
    System(PathBuf),
    User(PathBuf),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("read or create config path")]
    Io(#[source] std::io::Error),
    #[error("parse config yaml")]
    Yaml(#[source] serde_yaml::Error),
}
