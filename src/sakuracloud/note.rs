//! Startup-script note endpoints.

use reqwest::Method;

use super::wire::{NoteCreate, NoteCreateRequest, NoteEnvelope};
use super::{ApiResult, SakuraCloudClient};
use crate::types::NoteId;

impl SakuraCloudClient {
    pub(super) async fn post_note(&self, name: &str, content: &str) -> ApiResult<NoteId> {
        let body = NoteCreateRequest {
            note: NoteCreate {
                name: name.to_owned(),
                content: content.to_owned(),
            },
        };
        let created: NoteEnvelope = self
            .call(Method::POST, "note", "create note", &body)
            .await?;
        Ok(NoteId::from(created.note.id))
    }

    pub(super) async fn remove_note(&self, id: &NoteId) -> ApiResult<()> {
        self.execute::<()>(Method::DELETE, &format!("note/{id}"), "delete note", None)
            .await
    }
}
