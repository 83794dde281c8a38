//! Server and interface endpoints.

use std::net::IpAddr;

use reqwest::Method;

use super::wire::{
    DeleteServerRequest, IdRef, InterfaceUpdate, InterfaceUpdateRequest, PowerOffRequest,
    ServerCreate, ServerCreateRequest, ServerEnvelope, SwitchRef,
};
use super::{ApiResult, SakuraCloudClient, parse_ip, wire};
use crate::api::{CreatedServer, InterfaceInfo, NicSpec, PowerOffMode, ServerSnapshot, ServerSpec};
use crate::types::{DiskId, InterfaceId, ServerId};

fn switch_ref(nic: &NicSpec) -> Option<SwitchRef> {
    match nic {
        NicSpec::Shared => Some(SwitchRef {
            scope: Some("shared"),
            id: None,
        }),
        NicSpec::Switch(id) => Some(SwitchRef {
            scope: None,
            id: Some(id.clone()),
        }),
        NicSpec::Disconnected => None,
    }
}

fn interfaces(server: &wire::Server) -> ApiResult<Vec<InterfaceInfo>> {
    server
        .interfaces
        .iter()
        .flatten()
        .map(|nic| {
            Ok(InterfaceInfo {
                id: InterfaceId::from(nic.id.as_str()),
                ip_address: parse_ip(nic.ip_address.as_deref())?,
                user_ip_address: parse_ip(nic.user_ip_address.as_deref())?,
            })
        })
        .collect()
}

fn snapshot(server: &wire::Server) -> ApiResult<ServerSnapshot> {
    Ok(ServerSnapshot {
        id: ServerId::from(server.id.as_str()),
        status: server
            .instance
            .as_ref()
            .map(|instance| instance.status.clone())
            .unwrap_or_default(),
        disks: server
            .disks
            .iter()
            .flatten()
            .map(|disk| DiskId::from(disk.id.as_str()))
            .collect(),
        interfaces: interfaces(server)?,
    })
}

impl SakuraCloudClient {
    pub(super) async fn post_server(&self, spec: &ServerSpec) -> ApiResult<CreatedServer> {
        let body = ServerCreateRequest {
            server: ServerCreate {
                name: spec.name.clone(),
                server_plan: IdRef::new(spec.plan_id.as_str()),
                connected_switches: spec.interfaces.iter().map(switch_ref).collect(),
                interface_driver: spec.interface_driver.as_str(),
                tags: spec.tags.clone(),
            },
        };
        let created: ServerEnvelope = self
            .call(Method::POST, "server", "create server", &body)
            .await?;
        Ok(CreatedServer {
            id: ServerId::from(created.server.id.as_str()),
            interfaces: interfaces(&created.server)?,
        })
    }

    pub(super) async fn put_interface_ip(
        &self,
        interface: &InterfaceId,
        ip: IpAddr,
    ) -> ApiResult<()> {
        let body = InterfaceUpdateRequest {
            interface: InterfaceUpdate {
                user_ip_address: ip.to_string(),
            },
        };
        self.execute(
            Method::PUT,
            &format!("interface/{interface}"),
            "assign interface address",
            Some(&body),
        )
        .await
    }

    pub(super) async fn get_server(&self, id: &ServerId) -> ApiResult<ServerSnapshot> {
        let found: ServerEnvelope = self.get(&format!("server/{id}"), "read server").await?;
        snapshot(&found.server)
    }

    pub(super) async fn put_power(&self, id: &ServerId) -> ApiResult<()> {
        self.execute::<()>(Method::PUT, &format!("server/{id}/power"), "power on", None)
            .await
    }

    pub(super) async fn delete_power(&self, id: &ServerId, mode: PowerOffMode) -> ApiResult<()> {
        let body = PowerOffRequest {
            force: mode == PowerOffMode::Forced,
        };
        self.execute(
            Method::DELETE,
            &format!("server/{id}/power"),
            "power off",
            Some(&body),
        )
        .await
    }

    pub(super) async fn remove_server(&self, id: &ServerId, disks: &[DiskId]) -> ApiResult<()> {
        let body = DeleteServerRequest {
            with_disk: disks.iter().map(ToString::to_string).collect(),
        };
        self.execute(
            Method::DELETE,
            &format!("server/{id}"),
            "delete server",
            Some(&body),
        )
        .await
    }
}
