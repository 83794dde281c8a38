//! Operating system families and their provisioning policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Public archive family used as the boot image.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    /// Ubuntu LTS.
    Ubuntu,
    /// CentOS.
    #[serde(rename = "centos")]
    CentOs,
    /// Container Linux.
    #[serde(rename = "coreos")]
    CoreOs,
    /// RancherOS.
    #[serde(rename = "rancheros")]
    RancherOs,
}

/// Script dialect used for first-boot customisation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScriptFamily {
    /// Debian-style `/etc/network/interfaces` and sudoers edits.
    Debian,
    /// Red Hat style `ifcfg` files, `yum` and `firewalld`.
    RedHat,
}

/// Per-family provisioning policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OsPolicy {
    /// Default SSH login user.
    pub login_user: &'static str,
    /// Customisation dialect, or `None` when the image takes no scripts.
    pub scripts: Option<ScriptFamily>,
    /// Whether the customisation scripts end with a self-initiated shutdown
    /// that must be followed by a second power-on.
    pub needs_reboot: bool,
}

const ALLOWED: &str = "ubuntu, centos, coreos, rancheros";

const POLICIES: [(OsFamily, OsPolicy); 4] = [
    (
        OsFamily::Ubuntu,
        OsPolicy {
            login_user: "ubuntu",
            scripts: Some(ScriptFamily::Debian),
            needs_reboot: true,
        },
    ),
    (
        OsFamily::CentOs,
        OsPolicy {
            login_user: "root",
            scripts: Some(ScriptFamily::RedHat),
            needs_reboot: true,
        },
    ),
    (
        OsFamily::CoreOs,
        OsPolicy {
            login_user: "core",
            scripts: None,
            needs_reboot: false,
        },
    ),
    (
        OsFamily::RancherOs,
        OsPolicy {
            login_user: "rancher",
            scripts: None,
            needs_reboot: false,
        },
    ),
];

impl OsFamily {
    /// Every supported family in flag order.
    pub const ALL: [Self; 4] = [Self::Ubuntu, Self::CentOs, Self::CoreOs, Self::RancherOs];

    /// Returns the lower-case flag value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ubuntu => "ubuntu",
            Self::CentOs => "centos",
            Self::CoreOs => "coreos",
            Self::RancherOs => "rancheros",
        }
    }

    /// Looks the family's provisioning policy up.
    #[must_use]
    pub fn policy(self) -> OsPolicy {
        POLICIES
            .iter()
            .find(|(family, _)| *family == self)
            .map_or(POLICIES[0].1, |(_, policy)| *policy)
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for OsFamily {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalised = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|family| family.as_str() == normalised)
            .ok_or_else(|| ValidationError::UnknownOsType {
                value: value.to_owned(),
                allowed: ALLOWED,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(OsFamily::Ubuntu, "ubuntu", Some(ScriptFamily::Debian), true)]
    #[case(OsFamily::CentOs, "root", Some(ScriptFamily::RedHat), true)]
    #[case(OsFamily::CoreOs, "core", None, false)]
    #[case(OsFamily::RancherOs, "rancher", None, false)]
    fn policy_table(
        #[case] family: OsFamily,
        #[case] user: &str,
        #[case] scripts: Option<ScriptFamily>,
        #[case] reboot: bool,
    ) {
        let policy = family.policy();
        assert_eq!(policy.login_user, user);
        assert_eq!(policy.scripts, scripts);
        assert_eq!(policy.needs_reboot, reboot);
    }

    #[rstest]
    #[case("ubuntu", OsFamily::Ubuntu)]
    #[case(" CentOS ", OsFamily::CentOs)]
    #[case("rancheros", OsFamily::RancherOs)]
    fn parses_flag_values(#[case] raw: &str, #[case] expected: OsFamily) {
        assert_eq!(raw.parse::<OsFamily>(), Ok(expected));
    }

    #[test]
    fn rejects_unknown_family() {
        let err = "windows"
            .parse::<OsFamily>()
            .expect_err("windows is not a supported family");
        assert!(err.to_string().contains("--sakuracloud-os-type"));
    }
}
