// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The blueprint store: versioned, revision-tagged storage of blueprints
//! and a workspace holding un-committed edits, with change history and
//! undo.

mod blueprint;
mod commit;
mod store;

pub use blueprint::{
    Blueprint, Customizations, FirewallCustomization, GroupCustomization, GroupRef, InvalidBlueprint, KernelCustomization, LocaleCustomization,
    PackageRef, ServicesCustomization, SshKeyCustomization, TimezoneCustomization, UserCustomization,
};
pub use commit::{commit_id, BlueprintCommit};
pub use store::{parse_blueprint, BlueprintStore, Error, Format, Info};
