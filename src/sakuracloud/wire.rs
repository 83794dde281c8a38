//! JSON shapes exchanged with the Sakura Cloud API.
//!
//! The API uses PascalCase keys and returns identifiers either as strings or
//! as bare numbers depending on the resource, so identifiers are decoded
//! through [`flexible_id`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Decodes an identifier sent as a JSON string or number.
pub fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

fn optional_flexible_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "flexible_id")] String);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(id)| id))
}

/// Reference to another resource by ID.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdRef {
    /// Identifier.
    #[serde(rename = "ID", deserialize_with = "flexible_id")]
    pub id: String,
}

impl IdRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Connection entry of a new server's interface list.
#[derive(Debug, Serialize)]
pub struct SwitchRef {
    #[serde(rename = "Scope", skip_serializing_if = "Option::is_none")]
    pub scope: Option<&'static str>,
    #[serde(rename = "ID", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerCreate {
    pub name: String,
    pub server_plan: IdRef,
    pub connected_switches: Vec<Option<SwitchRef>>,
    pub interface_driver: &'static str,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerCreateRequest {
    pub server: ServerCreate,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceStatus {
    #[serde(default)]
    pub status: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Interface {
    #[serde(rename = "ID", deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(rename = "IPAddress", default)]
    pub ip_address: Option<String>,
    #[serde(rename = "UserIPAddress", default)]
    pub user_ip_address: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Server {
    #[serde(rename = "ID", deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default)]
    pub instance: Option<InstanceStatus>,
    #[serde(default)]
    pub disks: Option<Vec<IdRef>>,
    #[serde(default)]
    pub interfaces: Option<Vec<Interface>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerEnvelope {
    pub server: Server,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InterfaceUpdate {
    #[serde(rename = "UserIPAddress")]
    pub user_ip_address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InterfaceUpdateRequest {
    pub interface: InterfaceUpdate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PowerOffRequest {
    pub force: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteServerRequest {
    pub with_disk: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskCreate {
    pub name: String,
    pub plan: IdRef,
    #[serde(rename = "SizeMB")]
    pub size_mb: u32,
    pub connection: &'static str,
    pub source_archive: IdRef,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskCreateRequest {
    pub disk: DiskCreate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Disk {
    #[serde(rename = "ID", deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default)]
    pub availability: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskEnvelope {
    pub disk: Disk,
}

#[derive(Debug, Serialize)]
pub struct SshKey {
    #[serde(rename = "PublicKey")]
    pub public_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskEdit {
    pub password: String,
    #[serde(rename = "SSHKey")]
    pub ssh_key: SshKey,
    pub host_name: String,
    pub notes: Vec<IdRef>,
    #[serde(rename = "DisablePWAuth")]
    pub disable_pw_auth: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NoteCreate {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NoteCreateRequest {
    pub note: NoteCreate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NoteEnvelope {
    pub note: IdRef,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NamedResource {
    #[serde(rename = "ID", deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PacketFilterEnvelope {
    pub packet_filter: NamedResource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PacketFilterSearch {
    #[serde(default)]
    pub packet_filters: Vec<NamedResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArchiveSearch {
    #[serde(default)]
    pub archives: Vec<NamedResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerPlan {
    #[serde(default)]
    pub availability: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerPlanEnvelope {
    pub server_plan: ServerPlan,
}

/// Search request serialised into the query string.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Search {
    pub filter: Value,
}

/// Common-service item (DNS zone or GSLB group).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommonServiceItem {
    #[serde(
        rename = "ID",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_flexible_id"
    )]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub status: Value,
    #[serde(default)]
    pub settings: Value,
    pub provider: Provider,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Provider {
    pub class: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommonServiceItemEnvelope {
    pub common_service_item: CommonServiceItem,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CommonServiceItemSearch {
    #[serde(default)]
    pub common_service_items: Vec<CommonServiceItem>,
}

/// `Settings` of a DNS zone item.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DnsSettings {
    #[serde(rename = "DNS", default)]
    pub dns: DnsZone,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DnsZone {
    #[serde(rename = "ResourceRecordSets", default)]
    pub records: Vec<DnsRecordSet>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DnsRecordSet {
    pub name: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "RData")]
    pub rdata: String,
    #[serde(rename = "TTL", default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

/// `Settings` of a GSLB item.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GslbSettings {
    #[serde(rename = "GSLB", default)]
    pub gslb: GslbGroup,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GslbGroup {
    #[serde(rename = "Servers", default)]
    pub servers: Vec<GslbServer>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GslbServer {
    #[serde(rename = "IPAddress")]
    pub ip_address: String,
    #[serde(default)]
    pub enabled: String,
    #[serde(default)]
    pub weight: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_decode_from_numbers_and_strings() {
        let from_number: IdRef =
            serde_json::from_str(r#"{"ID": 112233}"#).expect("numeric id decodes");
        let from_text: IdRef =
            serde_json::from_str(r#"{"ID": "112233"}"#).expect("string id decodes");
        assert_eq!(from_number.id, "112233");
        assert_eq!(from_text.id, "112233");
    }

    #[test]
    fn server_create_lists_shared_switch_and_disconnected_slots() {
        let request = ServerCreateRequest {
            server: ServerCreate {
                name: "web".to_owned(),
                server_plan: IdRef::new("1001"),
                connected_switches: vec![
                    Some(SwitchRef {
                        scope: Some("shared"),
                        id: None,
                    }),
                    None,
                ],
                interface_driver: "virtio",
                tags: vec!["@virtio-net-pci".to_owned()],
            },
        };
        let json = serde_json::to_value(&request).expect("serialises");
        assert_eq!(
            json,
            serde_json::json!({
                "Server": {
                    "Name": "web",
                    "ServerPlan": {"ID": "1001"},
                    "ConnectedSwitches": [{"Scope": "shared"}, null],
                    "InterfaceDriver": "virtio",
                    "Tags": ["@virtio-net-pci"]
                }
            })
        );
    }
}
