//! Disk endpoints.

use reqwest::Method;

use super::wire::{DiskCreate, DiskCreateRequest, DiskEdit, DiskEnvelope, IdRef, SshKey};
use super::{ApiResult, SakuraCloudClient};
use crate::api::{DiskEditSpec, DiskSpec};
use crate::types::{DiskId, ServerId};

impl SakuraCloudClient {
    pub(super) async fn post_disk(&self, spec: &DiskSpec) -> ApiResult<DiskId> {
        let body = DiskCreateRequest {
            disk: DiskCreate {
                name: spec.name.clone(),
                plan: IdRef::new(spec.plan.plan_id().to_string()),
                size_mb: spec.size_mb,
                connection: spec.connection.as_str(),
                source_archive: IdRef::new(spec.source_archive.as_str()),
            },
        };
        let created: DiskEnvelope = self
            .call(Method::POST, "disk", "create disk", &body)
            .await?;
        Ok(DiskId::from(created.disk.id))
    }

    pub(super) async fn disk_availability(&self, id: &DiskId) -> ApiResult<String> {
        let found: DiskEnvelope = self.get(&format!("disk/{id}"), "read disk").await?;
        Ok(found.disk.availability)
    }

    pub(super) async fn connect_disk(&self, disk: &DiskId, server: &ServerId) -> ApiResult<()> {
        self.execute::<()>(
            Method::PUT,
            &format!("disk/{disk}/to/server/{server}"),
            "attach disk",
            None,
        )
        .await
    }

    pub(super) async fn put_disk_config(&self, disk: &DiskId, edit: &DiskEditSpec) -> ApiResult<()> {
        let body = DiskEdit {
            password: edit.password.clone(),
            ssh_key: SshKey {
                public_key: edit.ssh_public_key.trim().to_owned(),
            },
            host_name: edit.host_name.clone(),
            notes: edit
                .notes
                .iter()
                .map(|note| IdRef::new(note.as_str()))
                .collect(),
            disable_pw_auth: edit.disable_password_auth,
        };
        self.execute(
            Method::PUT,
            &format!("disk/{disk}/config"),
            "configure disk",
            Some(&body),
        )
        .await
    }
}
