//! Public archive and server plan catalogue lookups.

use serde_json::json;

use super::wire::{ArchiveSearch, ServerPlanEnvelope};
use super::{ApiResult, SakuraCloudClient, SakuraCloudError};
use crate::server_config::{OsFamily, plan_id};
use crate::types::ArchiveId;

const AVAILABLE: &str = "available";

/// Tags identifying the current public archive of an OS family.
const fn archive_tags(os: OsFamily) -> [&'static str; 2] {
    let distro = match os {
        OsFamily::Ubuntu => "distro-ubuntu",
        OsFamily::CentOs => "distro-centos",
        OsFamily::CoreOs => "distro-coreos",
        OsFamily::RancherOs => "distro-rancheros",
    };
    ["current-stable", distro]
}

impl SakuraCloudClient {
    pub(super) async fn plan_available(&self, core: u32, memory_gb: u32) -> ApiResult<bool> {
        let plan: Option<ServerPlanEnvelope> = self
            .get_optional(
                &format!("product/server/{}", plan_id(core, memory_gb)),
                "read server plan",
            )
            .await?;
        Ok(plan.is_some_and(|found| found.server_plan.availability == AVAILABLE))
    }

    pub(super) async fn find_base_archive(&self, os: OsFamily) -> ApiResult<ArchiveId> {
        let tags = archive_tags(os);
        let result: ArchiveSearch = self
            .search(
                "archive",
                "search archives",
                json!({ "Scope": "shared", "Tags.Name": tags }),
            )
            .await?;
        result
            .archives
            .into_iter()
            .next()
            .map(|archive| ArchiveId::from(archive.id))
            .ok_or_else(|| SakuraCloudError::NotFound {
                kind: "public archive",
                key: tags.join(","),
                zone: self.zone().to_owned(),
            })
    }
}
