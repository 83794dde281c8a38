//! Packet filter lookup and connection.

use reqwest::Method;
use serde_json::json;

use super::wire::{NamedResource, PacketFilterEnvelope, PacketFilterSearch};
use super::{ApiResult, SakuraCloudClient};
use crate::types::{InterfaceId, PacketFilterId};

/// Picks the exact name match from a partial-match search result, falling
/// back to the first hit.
fn pick_by_name(candidates: Vec<NamedResource>, name: &str) -> Option<PacketFilterId> {
    let exact = candidates
        .iter()
        .position(|candidate| candidate.name == name);
    let chosen = match exact {
        Some(index) => candidates.into_iter().nth(index),
        None => candidates.into_iter().next(),
    };
    chosen.map(|found| PacketFilterId::from(found.id))
}

impl SakuraCloudClient {
    pub(super) async fn get_packet_filter(
        &self,
        id: &PacketFilterId,
    ) -> ApiResult<Option<PacketFilterId>> {
        let found: Option<PacketFilterEnvelope> = self
            .get_optional(&format!("packetfilter/{id}"), "read packet filter")
            .await?;
        Ok(found.map(|envelope| PacketFilterId::from(envelope.packet_filter.id)))
    }

    pub(super) async fn search_packet_filter(
        &self,
        name: &str,
    ) -> ApiResult<Option<PacketFilterId>> {
        let result: PacketFilterSearch = self
            .search(
                "packetfilter",
                "search packet filters",
                json!({ "Name": name }),
            )
            .await?;
        Ok(pick_by_name(result.packet_filters, name))
    }

    pub(super) async fn put_packet_filter(
        &self,
        interface: &InterfaceId,
        filter: &PacketFilterId,
    ) -> ApiResult<()> {
        self.execute::<()>(
            Method::PUT,
            &format!("interface/{interface}/to/packetfilter/{filter}"),
            "connect packet filter",
            None,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(id: &str, name: &str) -> NamedResource {
        NamedResource {
            id: id.to_owned(),
            name: name.to_owned(),
        }
    }

    #[test]
    fn exact_name_beats_partial_match() {
        let found = pick_by_name(vec![named("1", "web-old"), named("2", "web")], "web");
        assert_eq!(found, Some(PacketFilterId::from("2")));
    }

    #[test]
    fn falls_back_to_first_hit() {
        let found = pick_by_name(vec![named("7", "web-a"), named("8", "web-b")], "web");
        assert_eq!(found, Some(PacketFilterId::from("7")));
        assert_eq!(pick_by_name(Vec::new(), "web"), None);
    }
}
