// SPDX-FileCopyrightText: Copyright © 2020-2024 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! A reference distribution fixture used by tests and, until a real
//! distribution catalog exists, by the server's default configuration.

use composer_solver::RepoConfig;

use crate::{AssemblerKind, Distribution, OutputSpec};

const ROOT_FS_UUID: &str = "76a22bf4-f153-4541-b6c7-0332c0dfaeac";
const PTUUID: &str = "0x14fc63d2";
const KERNEL_OPTIONS: &str = "ro no_timer_check console=ttyS0,115200n8 console=tty1 biosdevname=0 net.ifnames=0";

pub fn distribution() -> Distribution {
    let repo = RepoConfig::with_baseurl(
        "fedora",
        "Fedora 30 - x86_64",
        "https://dl.fedoraproject.org/pub/fedora/linux/releases/30/Everything/x86_64/os/"
            .parse()
            .expect("fixture URL is valid"),
    );

    Distribution::new("fedora-30", "org.osbuild.fedora30", ROOT_FS_UUID, PTUUID)
        .with_repo(repo)
        .with_format(
            "vmdk",
            OutputSpec {
                filename: "disk.vmdk".into(),
                mime_type: "application/x-vmdk".into(),
                base_packages: vec![
                    "@core".into(),
                    "chrony".into(),
                    "firewalld".into(),
                    "grub2-pc".into(),
                    "kernel".into(),
                    "langpacks-en".into(),
                    "open-vm-tools".into(),
                    "selinux-policy-targeted".into(),
                ],
                excluded_packages: vec![],
                base_enabled_services: vec![],
                base_disabled_services: vec![],
                kernel_options_default: KERNEL_OPTIONS.into(),
                include_fstab: true,
                assembler: AssemblerKind::Qemu,
            },
        )
        .with_format(
            "qcow2",
            OutputSpec {
                filename: "disk.qcow2".into(),
                mime_type: "application/x-qemu-disk".into(),
                base_packages: vec!["@core".into(), "kernel".into(), "grub2-pc".into(), "langpacks-en".into()],
                excluded_packages: vec![],
                base_enabled_services: vec![],
                base_disabled_services: vec![],
                kernel_options_default: KERNEL_OPTIONS.into(),
                include_fstab: true,
                assembler: AssemblerKind::Qemu,
            },
        )
        .with_format(
            "raw",
            OutputSpec {
                filename: "disk.raw".into(),
                mime_type: "application/octet-stream".into(),
                base_packages: vec!["@core".into(), "kernel".into(), "grub2-pc".into(), "langpacks-en".into()],
                excluded_packages: vec![],
                base_enabled_services: vec![],
                base_disabled_services: vec![],
                kernel_options_default: KERNEL_OPTIONS.into(),
                include_fstab: true,
                assembler: AssemblerKind::Qemu,
            },
        )
        .with_format(
            "raw.xz",
            OutputSpec {
                filename: "disk.raw.xz".into(),
                mime_type: "application/x-xz".into(),
                base_packages: vec!["@core".into(), "kernel".into(), "grub2-pc".into(), "langpacks-en".into()],
                excluded_packages: vec![],
                base_enabled_services: vec![],
                base_disabled_services: vec![],
                kernel_options_default: KERNEL_OPTIONS.into(),
                include_fstab: true,
                assembler: AssemblerKind::Qemu,
            },
        )
        .with_format(
            "vpc",
            OutputSpec {
                filename: "disk.vhd".into(),
                mime_type: "application/x-vhd".into(),
                base_packages: vec!["@core".into(), "kernel".into(), "grub2-pc".into(), "langpacks-en".into(), "WALinuxAgent".into()],
                excluded_packages: vec![],
                base_enabled_services: vec!["waagent".into()],
                base_disabled_services: vec![],
                kernel_options_default: KERNEL_OPTIONS.into(),
                include_fstab: true,
                assembler: AssemblerKind::Qemu,
            },
        )
        .with_format(
            "tar",
            OutputSpec {
                filename: "root.tar.xz".into(),
                mime_type: "application/x-tar".into(),
                base_packages: vec!["@core".into()],
                excluded_packages: vec!["kernel".into()],
                base_enabled_services: vec![],
                base_disabled_services: vec![],
                kernel_options_default: String::new(),
                include_fstab: false,
                assembler: AssemblerKind::Tar,
            },
        )
        .with_format(
            "rawfs",
            OutputSpec {
                filename: "filesystem.img".into(),
                mime_type: "application/octet-stream".into(),
                base_packages: vec!["@core".into(), "kernel".into()],
                excluded_packages: vec![],
                base_enabled_services: vec![],
                base_disabled_services: vec![],
                kernel_options_default: KERNEL_OPTIONS.into(),
                include_fstab: true,
                assembler: AssemblerKind::RawFs,
            },
        )
}

#[cfg(test)]
mod test {
    use composer_store::{Blueprint, PackageRef, ServicesCustomization, UserCustomization};

    use super::*;

    fn vmdk_blueprint() -> Blueprint {
        Blueprint {
            name: "example-vmdk".into(),
            description: String::new(),
            version: "0.0.1".into(),
            packages: vec![],
            modules: vec![],
            groups: vec![],
            customizations: composer_store::Customizations {
                user: vec![UserCustomization {
                    name: "redhat".into(),
                    description: None,
                    password: None,
                    key: None,
                    home: None,
                    shell: None,
                    groups: vec![],
                    uid: None,
                    gid: None,
                }],
                services: Some(ServicesCustomization {
                    enabled: vec!["sshd".into()],
                    disabled: vec![],
                }),
                ..Default::default()
            },
        }
    }

    // Scenario S1: compose-vmdk.
    #[test]
    fn composes_vmdk_with_expected_assembler_and_package_list() {
        let dist = distribution();
        let recipe = dist.compose(&vmdk_blueprint(), "vmdk").unwrap();

        assert_eq!(recipe.assembler.name, "qemu");
        assert_eq!(recipe.assembler.options["format"], "vmdk");
        assert_eq!(recipe.assembler.options["filename"], "disk.vmdk");
        assert_eq!(
            recipe.assembler.options["rootFsUuid"],
            "76a22bf4-f153-4541-b6c7-0332c0dfaeac"
        );

        let dnf = recipe.stages.stages.iter().find(|s| s.name == "dnf").unwrap();
        let packages: Vec<&str> = dnf.options["packages"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(
            packages,
            vec![
                "@core",
                "chrony",
                "firewalld",
                "grub2-pc",
                "kernel",
                "langpacks-en",
                "open-vm-tools",
                "selinux-policy-targeted",
            ]
        );

        let users = recipe.stages.stages.iter().find(|s| s.name == "users").unwrap();
        assert_eq!(users.options["users"][0]["name"], "redhat");

        let systemd = recipe.stages.stages.iter().find(|s| s.name == "systemd").unwrap();
        assert_eq!(systemd.options["enabledServices"], serde_json::json!(["sshd"]));
    }

    #[test]
    fn plaintext_password_is_crypted_before_reaching_the_recipe() {
        let dist = distribution();
        let mut bp = vmdk_blueprint();
        bp.customizations.user[0].password = Some("hunter2".into());

        let recipe = dist.compose(&bp, "vmdk").unwrap();
        let users = recipe.stages.stages.iter().find(|s| s.name == "users").unwrap();
        let password = users.options["users"][0]["password"].as_str().unwrap();
        assert!(composer_crypt::is_crypt_hash(password));
    }

    #[test]
    fn blueprint_packages_and_modules_append_after_base_in_declaration_order() {
        let dist = distribution();
        let mut bp = vmdk_blueprint();
        bp.packages.push(PackageRef {
            name: "vim".into(),
            version: "*".into(),
        });
        bp.modules.push(PackageRef {
            name: "nodejs".into(),
            version: "*".into(),
        });

        let recipe = dist.compose(&bp, "vmdk").unwrap();
        let dnf = recipe.stages.stages.iter().find(|s| s.name == "dnf").unwrap();
        let packages: Vec<&str> = dnf.options["packages"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();

        assert_eq!(packages.last(), Some(&"nodejs"));
        assert_eq!(packages[packages.len() - 2], "vim");
    }
}
