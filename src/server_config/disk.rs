//! Disk and interface enumerations with their legal values.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ValidationError;

const SSD_SIZES_GB: [u32; 8] = [20, 40, 100, 250, 500, 1024, 2048, 4096];
const HDD_SIZES_GB: [u32; 10] = [40, 60, 80, 100, 250, 500, 750, 1024, 2048, 4096];

/// Storage tier of the boot disk.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskPlan {
    /// Solid state storage (provider plan 4).
    Ssd,
    /// Spinning storage (provider plan 2).
    Hdd,
}

impl DiskPlan {
    /// Flag value of the tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ssd => "ssd",
            Self::Hdd => "hdd",
        }
    }

    /// Provider plan identifier.
    #[must_use]
    pub const fn plan_id(self) -> u32 {
        match self {
            Self::Ssd => 4,
            Self::Hdd => 2,
        }
    }

    /// Sizes in GB accepted for the tier.
    #[must_use]
    pub const fn legal_sizes_gb(self) -> &'static [u32] {
        match self {
            Self::Ssd => &SSD_SIZES_GB,
            Self::Hdd => &HDD_SIZES_GB,
        }
    }

    /// Checks a requested size against the tier's legal set.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnsupportedDiskSize`] when the size is not
    /// offered for this tier.
    pub fn check_size(self, size_gb: u32) -> Result<(), ValidationError> {
        if self.legal_sizes_gb().contains(&size_gb) {
            return Ok(());
        }
        let allowed = self
            .legal_sizes_gb()
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        Err(ValidationError::UnsupportedDiskSize {
            plan: self.as_str(),
            size_gb,
            allowed,
        })
    }
}

impl FromStr for DiskPlan {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ssd" => Ok(Self::Ssd),
            "hdd" => Ok(Self::Hdd),
            _ => Err(ValidationError::UnknownDiskPlan(value.to_owned())),
        }
    }
}

/// Bus used to connect the boot disk.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskConnection {
    /// Paravirtualised block device.
    Virtio,
    /// Emulated IDE controller.
    Ide,
}

impl DiskConnection {
    /// Provider wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Virtio => "virtio",
            Self::Ide => "ide",
        }
    }
}

impl FromStr for DiskConnection {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "virtio" => Ok(Self::Virtio),
            "ide" => Ok(Self::Ide),
            _ => Err(ValidationError::UnknownDiskConnection(value.to_owned())),
        }
    }
}

/// Emulated network interface model.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceDriver {
    /// Paravirtualised NIC.
    Virtio,
    /// Intel e1000 emulation.
    E1000,
}

impl InterfaceDriver {
    /// Provider wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Virtio => "virtio",
            Self::E1000 => "e1000",
        }
    }
}

impl FromStr for InterfaceDriver {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "virtio" => Ok(Self::Virtio),
            "e1000" => Ok(Self::E1000),
            _ => Err(ValidationError::UnknownInterfaceDriver(value.to_owned())),
        }
    }
}
