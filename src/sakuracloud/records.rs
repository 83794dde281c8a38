//! DNS zone and GSLB group maintenance through common-service items.
//!
//! Both resources are edited read-modify-write: the item is fetched (or
//! created when missing), its settings are decoded, changed and written back
//! in full.

use std::net::IpAddr;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::info;

use super::wire::{
    CommonServiceItem, CommonServiceItemEnvelope, CommonServiceItemSearch, DnsRecordSet,
    DnsSettings, GslbServer, GslbSettings, Provider,
};
use super::{ApiResult, SakuraCloudClient, SakuraCloudError};
use crate::api::{DnsRecord, GslbRecord};

const DNS_CLASS: &str = "dns";
const GSLB_CLASS: &str = "gslb";
const A_RECORD: &str = "A";
const DEFAULT_TTL: u32 = 3600;
const GSLB_DELAY_LOOP_SECS: u32 = 10;

fn settings_of<T: DeserializeOwned + Default>(
    item: &CommonServiceItem,
    endpoint: &'static str,
) -> ApiResult<T> {
    if item.settings.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(item.settings.clone()).map_err(|err| SakuraCloudError::Decode {
        endpoint,
        message: err.to_string(),
    })
}

fn encode<T: Serialize>(value: &T, endpoint: &'static str) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|err| SakuraCloudError::Decode {
        endpoint,
        message: err.to_string(),
    })
}

fn strings_at(status: &Value, key: &str) -> Vec<String> {
    status
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Replaces any A record for `host` with one pointing at `ip`.
fn upsert_a_record(settings: &mut DnsSettings, host: &str, ip: IpAddr) {
    settings
        .dns
        .records
        .retain(|record| !(record.name == host && record.kind == A_RECORD));
    settings.dns.records.push(DnsRecordSet {
        name: host.to_owned(),
        kind: A_RECORD.to_owned(),
        rdata: ip.to_string(),
        ttl: Some(DEFAULT_TTL),
    });
}

/// Removes the A record for `host` pointing at `ip`. Returns whether a record
/// was removed.
fn remove_a_record(settings: &mut DnsSettings, host: &str, ip: IpAddr) -> bool {
    let before = settings.dns.records.len();
    let rdata = ip.to_string();
    settings.dns.records.retain(|record| {
        !(record.name == host && record.kind == A_RECORD && record.rdata == rdata)
    });
    settings.dns.records.len() != before
}

/// Adds `ip` as an enabled member unless it is already present.
fn add_gslb_member(settings: &mut GslbSettings, ip: IpAddr) -> bool {
    let address = ip.to_string();
    if settings
        .gslb
        .servers
        .iter()
        .any(|server| server.ip_address == address)
    {
        return false;
    }
    settings.gslb.servers.push(GslbServer {
        ip_address: address,
        enabled: "True".to_owned(),
        weight: "1".to_owned(),
    });
    true
}

fn remove_gslb_member(settings: &mut GslbSettings, ip: IpAddr) -> bool {
    let before = settings.gslb.servers.len();
    let address = ip.to_string();
    settings
        .gslb
        .servers
        .retain(|server| server.ip_address != address);
    settings.gslb.servers.len() != before
}

impl SakuraCloudClient {
    async fn find_service_item(
        &self,
        class: &str,
        name: &str,
        endpoint: &'static str,
    ) -> ApiResult<Option<CommonServiceItem>> {
        let result: CommonServiceItemSearch = self
            .search(
                "commonserviceitem",
                endpoint,
                json!({ "Provider.Class": class, "Name": name }),
            )
            .await?;
        Ok(result
            .common_service_items
            .into_iter()
            .find(|item| item.name == name))
    }

    async fn create_service_item(
        &self,
        item: CommonServiceItem,
        endpoint: &'static str,
    ) -> ApiResult<CommonServiceItem> {
        let body = CommonServiceItemEnvelope {
            common_service_item: item,
        };
        let created: CommonServiceItemEnvelope = self
            .call(Method::POST, "commonserviceitem", endpoint, &body)
            .await?;
        Ok(created.common_service_item)
    }

    async fn update_service_item(
        &self,
        item: CommonServiceItem,
        endpoint: &'static str,
    ) -> ApiResult<CommonServiceItem> {
        let id = item.id.clone().ok_or_else(|| SakuraCloudError::Decode {
            endpoint,
            message: format!("common service item {} has no ID", item.name),
        })?;
        let body = CommonServiceItemEnvelope {
            common_service_item: item,
        };
        let updated: CommonServiceItemEnvelope = self
            .call(
                Method::PUT,
                &format!("commonserviceitem/{id}"),
                endpoint,
                &body,
            )
            .await?;
        Ok(updated.common_service_item)
    }

    pub(super) async fn setup_dns_record(&self, record: &DnsRecord) -> ApiResult<Vec<String>> {
        const ENDPOINT: &str = "register dns record";
        let mut zone = match self
            .find_service_item(DNS_CLASS, &record.zone, ENDPOINT)
            .await?
        {
            Some(existing) => existing,
            None => {
                info!(zone = %record.zone, "creating dns zone");
                self.create_service_item(
                    CommonServiceItem {
                        id: None,
                        name: record.zone.clone(),
                        status: json!({ "Zone": record.zone }),
                        settings: encode(&DnsSettings::default(), ENDPOINT)?,
                        provider: Provider {
                            class: DNS_CLASS.to_owned(),
                        },
                    },
                    ENDPOINT,
                )
                .await?
            }
        };
        let mut settings: DnsSettings = settings_of(&zone, ENDPOINT)?;
        upsert_a_record(&mut settings, &record.host_name, record.ip);
        zone.settings = encode(&settings, ENDPOINT)?;
        let updated = self.update_service_item(zone, ENDPOINT).await?;
        Ok(strings_at(&updated.status, "NS"))
    }

    pub(super) async fn remove_dns_record(&self, record: &DnsRecord) -> ApiResult<()> {
        const ENDPOINT: &str = "delete dns record";
        let Some(mut zone) = self
            .find_service_item(DNS_CLASS, &record.zone, ENDPOINT)
            .await?
        else {
            return Ok(());
        };
        let mut settings: DnsSettings = settings_of(&zone, ENDPOINT)?;
        if !remove_a_record(&mut settings, &record.host_name, record.ip) {
            return Ok(());
        }
        zone.settings = encode(&settings, ENDPOINT)?;
        self.update_service_item(zone, ENDPOINT).await.map(|_| ())
    }

    pub(super) async fn setup_gslb_record(&self, record: &GslbRecord) -> ApiResult<String> {
        const ENDPOINT: &str = "register gslb member";
        let mut group = match self
            .find_service_item(GSLB_CLASS, &record.group, ENDPOINT)
            .await?
        {
            Some(existing) => existing,
            None => {
                info!(group = %record.group, "creating gslb group");
                self.create_service_item(
                    CommonServiceItem {
                        id: None,
                        name: record.group.clone(),
                        status: Value::Null,
                        settings: json!({
                            "GSLB": {
                                "DelayLoop": GSLB_DELAY_LOOP_SECS,
                                "HealthCheck": { "Protocol": "ping" },
                                "Weighted": "True",
                                "Servers": []
                            }
                        }),
                        provider: Provider {
                            class: GSLB_CLASS.to_owned(),
                        },
                    },
                    ENDPOINT,
                )
                .await?
            }
        };
        let mut settings: GslbSettings = settings_of(&group, ENDPOINT)?;
        if add_gslb_member(&mut settings, record.ip) {
            group.settings = encode(&settings, ENDPOINT)?;
            group = self.update_service_item(group, ENDPOINT).await?;
        }
        Ok(group
            .status
            .get("FQDN")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned())
    }

    pub(super) async fn remove_gslb_record(&self, record: &GslbRecord) -> ApiResult<()> {
        const ENDPOINT: &str = "delete gslb member";
        let Some(mut group) = self
            .find_service_item(GSLB_CLASS, &record.group, ENDPOINT)
            .await?
        else {
            return Ok(());
        };
        let mut settings: GslbSettings = settings_of(&group, ENDPOINT)?;
        if !remove_gslb_member(&mut settings, record.ip) {
            return Ok(());
        }
        group.settings = encode(&settings, ENDPOINT)?;
        self.update_service_item(group, ENDPOINT).await.map(|_| ())
    }
}
