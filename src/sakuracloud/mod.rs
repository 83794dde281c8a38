//! Sakura Cloud API client implementing [`CloudApi`].
//!
//! Requests go to `{api_root}/{zone}/api/cloud/1.1/{path}` with HTTP basic
//! authentication. Search operations pass their JSON filter as the raw query
//! string, which is how the API expects it.

mod archive;
mod disk;
mod error;
mod network;
mod note;
mod records;
mod server;
mod wire;

use std::net::IpAddr;

use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::{
    ApiFuture, CloudApi, CreatedServer, DiskEditSpec, DiskSpec, DnsRecord, GslbRecord,
    PowerOffMode, ServerSnapshot, ServerSpec,
};
use crate::config::ProviderConfig;
use crate::server_config::OsFamily;
use crate::types::{ArchiveId, DiskId, InterfaceId, NoteId, PacketFilterId, ServerId};

pub use error::SakuraCloudError;

const API_SUFFIX: &str = "api/cloud/1.1";
const USER_AGENT: &str = concat!("sacloud-machine/", env!("CARGO_PKG_VERSION"));

type ApiResult<T> = Result<T, SakuraCloudError>;

/// HTTP client bound to one zone.
#[derive(Clone, Debug)]
pub struct SakuraCloudClient {
    http: reqwest::Client,
    endpoint: String,
    zone: String,
    access_token: String,
    access_token_secret: String,
}

impl SakuraCloudClient {
    /// Builds a client from validated provider configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SakuraCloudError::Config`] when the configuration fails
    /// validation and [`SakuraCloudError::Transport`] when the HTTP client
    /// cannot be built. Every request is bounded by the configured request
    /// timeout.
    pub fn new(config: &ProviderConfig) -> Result<Self, SakuraCloudError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            endpoint: format!(
                "{}/{}/{API_SUFFIX}",
                config.api_root_url.trim_end_matches('/'),
                config.zone
            ),
            zone: config.zone.clone(),
            access_token: config.access_token.clone(),
            access_token_secret: config.access_token_secret.clone(),
        })
    }

    /// Zone this client talks to.
    #[must_use]
    pub fn zone(&self) -> &str {
        &self.zone
    }

    fn url(&self, path: &str) -> ApiResult<Url> {
        let raw = format!("{}/{}", self.endpoint, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|err| SakuraCloudError::InvalidUrl {
            url: raw,
            message: err.to_string(),
        })
    }

    fn search_url<F: Serialize>(
        &self,
        path: &str,
        endpoint: &'static str,
        filter: F,
    ) -> ApiResult<Url> {
        let mut url = self.url(path)?;
        let search = wire::Search {
            filter: serde_json::to_value(filter).map_err(|err| decode(endpoint, &err))?,
        };
        let query = serde_json::to_string(&search).map_err(|err| decode(endpoint, &err))?;
        url.set_query(Some(&query));
        Ok(url)
    }

    async fn send<B: Serialize + Sync>(
        &self,
        method: Method,
        url: Url,
        endpoint: &'static str,
        body: Option<&B>,
    ) -> ApiResult<reqwest::Response> {
        debug!(%method, %url, endpoint, "sakura cloud request");
        let mut request = self
            .http
            .request(method, url)
            .basic_auth(&self.access_token, Some(&self.access_token_secret));
        if let Some(payload) = body {
            request = request.json(payload);
        }
        let response = request.send().await?;
        Self::check(response, endpoint).await
    }

    async fn check(
        response: reqwest::Response,
        endpoint: &'static str,
    ) -> ApiResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SakuraCloudError::Status {
                endpoint,
                status,
                body,
            });
        }
        Ok(response)
    }

    async fn decode_json<T: DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &'static str,
    ) -> ApiResult<T> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| decode(endpoint, &err))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, endpoint: &'static str) -> ApiResult<T> {
        let url = self.url(path)?;
        let response = self.send::<()>(Method::GET, url, endpoint, None).await?;
        Self::decode_json(response, endpoint).await
    }

    /// Like [`Self::get`] but maps 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        endpoint: &'static str,
    ) -> ApiResult<Option<T>> {
        match self.get(path, endpoint).await {
            Ok(found) => Ok(Some(found)),
            Err(SakuraCloudError::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn search<T: DeserializeOwned, F: Serialize>(
        &self,
        path: &str,
        endpoint: &'static str,
        filter: F,
    ) -> ApiResult<T> {
        let url = self.search_url(path, endpoint, filter)?;
        let response = self.send::<()>(Method::GET, url, endpoint, None).await?;
        Self::decode_json(response, endpoint).await
    }

    async fn call<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        endpoint: &'static str,
        body: &B,
    ) -> ApiResult<T> {
        let url = self.url(path)?;
        let response = self.send(method, url, endpoint, Some(body)).await?;
        Self::decode_json(response, endpoint).await
    }

    /// Sends a request whose response body is irrelevant.
    async fn execute<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        endpoint: &'static str,
        body: Option<&B>,
    ) -> ApiResult<()> {
        let url = self.url(path)?;
        self.send(method, url, endpoint, body).await.map(|_| ())
    }
}

fn decode(endpoint: &'static str, err: &serde_json::Error) -> SakuraCloudError {
    SakuraCloudError::Decode {
        endpoint,
        message: err.to_string(),
    }
}

fn parse_ip(raw: Option<&str>) -> ApiResult<Option<IpAddr>> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value
                .parse::<IpAddr>()
                .map_err(|_| SakuraCloudError::InvalidAddress {
                    value: value.to_owned(),
                })
        })
        .transpose()
}

impl CloudApi for SakuraCloudClient {
    type Error = SakuraCloudError;

    fn validate_plan(&self, core: u32, memory_gb: u32) -> ApiFuture<'_, bool, Self::Error> {
        Box::pin(async move { self.plan_available(core, memory_gb).await })
    }

    fn resolve_base_image(&self, os: OsFamily) -> ApiFuture<'_, ArchiveId, Self::Error> {
        Box::pin(async move { self.find_base_archive(os).await })
    }

    fn create_server<'a>(
        &'a self,
        spec: &'a ServerSpec,
    ) -> ApiFuture<'a, CreatedServer, Self::Error> {
        Box::pin(async move { self.post_server(spec).await })
    }

    fn assign_interface_ip<'a>(
        &'a self,
        interface: &'a InterfaceId,
        ip: IpAddr,
    ) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move { self.put_interface_ip(interface, ip).await })
    }

    fn read_server<'a>(&'a self, id: &'a ServerId) -> ApiFuture<'a, ServerSnapshot, Self::Error> {
        Box::pin(async move { self.get_server(id).await })
    }

    fn power_on<'a>(&'a self, id: &'a ServerId) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move { self.put_power(id).await })
    }

    fn power_off<'a>(
        &'a self,
        id: &'a ServerId,
        mode: PowerOffMode,
    ) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move { self.delete_power(id, mode).await })
    }

    fn delete_server<'a>(
        &'a self,
        id: &'a ServerId,
        disks: &'a [DiskId],
    ) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move { self.remove_server(id, disks).await })
    }

    fn create_disk<'a>(&'a self, spec: &'a DiskSpec) -> ApiFuture<'a, DiskId, Self::Error> {
        Box::pin(async move { self.post_disk(spec).await })
    }

    fn read_disk<'a>(&'a self, id: &'a DiskId) -> ApiFuture<'a, String, Self::Error> {
        Box::pin(async move { self.disk_availability(id).await })
    }

    fn attach_disk<'a>(
        &'a self,
        disk: &'a DiskId,
        server: &'a ServerId,
    ) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move { self.connect_disk(disk, server).await })
    }

    fn configure_disk<'a>(
        &'a self,
        disk: &'a DiskId,
        edit: &'a DiskEditSpec,
    ) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move { self.put_disk_config(disk, edit).await })
    }

    fn create_note<'a>(
        &'a self,
        name: &'a str,
        content: &'a str,
    ) -> ApiFuture<'a, NoteId, Self::Error> {
        Box::pin(async move { self.post_note(name, content).await })
    }

    fn delete_note<'a>(&'a self, id: &'a NoteId) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move { self.remove_note(id).await })
    }

    fn packet_filter_by_id<'a>(
        &'a self,
        id: &'a PacketFilterId,
    ) -> ApiFuture<'a, Option<PacketFilterId>, Self::Error> {
        Box::pin(async move { self.get_packet_filter(id).await })
    }

    fn packet_filter_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> ApiFuture<'a, Option<PacketFilterId>, Self::Error> {
        Box::pin(async move { self.search_packet_filter(name).await })
    }

    fn connect_packet_filter<'a>(
        &'a self,
        interface: &'a InterfaceId,
        filter: &'a PacketFilterId,
    ) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move { self.put_packet_filter(interface, filter).await })
    }

    fn upsert_dns_record<'a>(
        &'a self,
        record: &'a DnsRecord,
    ) -> ApiFuture<'a, Vec<String>, Self::Error> {
        Box::pin(async move { self.setup_dns_record(record).await })
    }

    fn delete_dns_record<'a>(&'a self, record: &'a DnsRecord) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move { self.remove_dns_record(record).await })
    }

    fn upsert_gslb_record<'a>(
        &'a self,
        record: &'a GslbRecord,
    ) -> ApiFuture<'a, String, Self::Error> {
        Box::pin(async move { self.setup_gslb_record(record).await })
    }

    fn delete_gslb_record<'a>(&'a self, record: &'a GslbRecord)
    -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move { self.remove_gslb_record(record).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &str) -> ProviderConfig {
        ProviderConfig {
            access_token: "token".to_owned(),
            access_token_secret: "secret".to_owned(),
            zone: "tk1a".to_owned(),
            api_root_url: root.to_owned(),
            poll_interval_secs: 5,
            wait_timeout_secs: 1200,
            gslb_settle_delay_secs: 10,
            request_timeout_secs: 60,
        }
    }

    #[test]
    fn urls_are_rooted_in_the_zone_endpoint() {
        let client = SakuraCloudClient::new(&config("https://secure.sakura.ad.jp/cloud/zone/"))
            .expect("client builds");
        let url = client.url("/server/113").expect("url parses");
        assert_eq!(
            url.as_str(),
            "https://secure.sakura.ad.jp/cloud/zone/tk1a/api/cloud/1.1/server/113"
        );
    }

    #[test]
    fn search_filters_become_the_query_string() {
        let client = SakuraCloudClient::new(&config("https://example.test/cloud/zone"))
            .expect("client builds");
        let url = client
            .search_url(
                "packetfilter",
                "search packet filters",
                serde_json::json!({"Name": "web"}),
            )
            .expect("url parses");
        let query = url.query().expect("query is set");
        assert!(query.contains("Filter"), "unexpected query {query}");
        assert!(query.contains("web"), "unexpected query {query}");
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let mut cfg = config("https://example.test");
        cfg.access_token_secret.clear();
        let err = SakuraCloudClient::new(&cfg).expect_err("secret required");
        assert!(err.to_string().contains("SAKURACLOUD_ACCESS_TOKEN_SECRET"));
    }

    #[test]
    fn blank_addresses_are_absent() {
        assert_eq!(parse_ip(Some(" ")).expect("blank is fine"), None);
        assert!(parse_ip(Some("not-an-ip")).is_err());
    }
}
