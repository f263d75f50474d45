//! HTTP implementation of the bundle service API.
//!
//! Endpoints: `POST /bundle` (create), `PUT /bundle/{id}` (extend),
//! `GET /bundle/{id}` (check), `POST /file/{id}` (upload). Every request
//! carries the session token header; every call has a client-level timeout.

use super::{remote_error, BundleApi, FileHashes, RemoteBundle, UploadedFile};
use crate::utils::errors::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const SESSION_TOKEN_HEADER: &str = "Session-Token";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Bundle service client backed by reqwest.
pub struct HttpBundleApi {
    client: reqwest::Client,
    base_url: String,
    session_token: String,
}

#[derive(Serialize)]
struct CreateBundleRequest<'a> {
    files: &'a FileHashes,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtendBundleRequest<'a> {
    files: &'a FileHashes,
    removed_files: &'a [String],
}

#[derive(Serialize)]
struct UploadFilesRequest<'a> {
    content: &'a [UploadedFile],
}

impl HttpBundleApi {
    pub fn new(base_url: impl Into<String>, session_token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_token: session_token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Parse a bundle response, mapping non-2xx statuses to `Remote` errors.
    async fn bundle_response(&self, response: reqwest::Response) -> Result<RemoteBundle> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(remote_error(
                status.as_u16(),
                if text.is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    text
                },
            ));
        }
        Ok(response.json::<RemoteBundle>().await?)
    }
}

#[async_trait]
impl BundleApi for HttpBundleApi {
    async fn create_bundle(&self, files: &FileHashes) -> Result<RemoteBundle> {
        debug!("POST /bundle ({} files)", files.len());
        let response = self
            .client
            .post(self.url("/bundle"))
            .header(SESSION_TOKEN_HEADER, &self.session_token)
            .json(&CreateBundleRequest { files })
            .send()
            .await?;
        self.bundle_response(response).await
    }

    async fn extend_bundle(
        &self,
        bundle_id: &str,
        files: &FileHashes,
        removed_files: &[String],
    ) -> Result<RemoteBundle> {
        debug!(
            "PUT /bundle/{} ({} files, {} removed)",
            bundle_id,
            files.len(),
            removed_files.len()
        );
        let response = self
            .client
            .put(self.url(&format!("/bundle/{bundle_id}")))
            .header(SESSION_TOKEN_HEADER, &self.session_token)
            .json(&ExtendBundleRequest {
                files,
                removed_files,
            })
            .send()
            .await?;
        self.bundle_response(response).await
    }

    async fn check_bundle(&self, bundle_id: &str) -> Result<RemoteBundle> {
        debug!("GET /bundle/{}", bundle_id);
        let response = self
            .client
            .get(self.url(&format!("/bundle/{bundle_id}")))
            .header(SESSION_TOKEN_HEADER, &self.session_token)
            .send()
            .await?;
        self.bundle_response(response).await
    }

    async fn upload_files(&self, bundle_id: &str, content: &[UploadedFile]) -> Result<()> {
        debug!("POST /file/{} ({} files)", bundle_id, content.len());
        let response = self
            .client
            .post(self.url(&format!("/file/{bundle_id}")))
            .header(SESSION_TOKEN_HEADER, &self.session_token)
            .json(&UploadFilesRequest { content })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(remote_error(
                status.as_u16(),
                if text.is_empty() {
                    status.canonical_reason().unwrap_or("upload failed").to_string()
                } else {
                    text
                },
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let api = HttpBundleApi::new("http://localhost:3000/", "t").unwrap();
        assert_eq!(api.url("/bundle"), "http://localhost:3000/bundle");
        assert_eq!(api.url("/bundle/b-1"), "http://localhost:3000/bundle/b-1");
    }

    #[test]
    fn extend_request_serializes_camel_case() {
        let mut files = FileHashes::new();
        files.insert("/a.js".into(), "deadbeef".into());
        let removed = vec!["/b.java".to_string()];
        let json = serde_json::to_string(&ExtendBundleRequest {
            files: &files,
            removed_files: &removed,
        })
        .unwrap();
        assert_eq!(
            json,
            r#"{"files":{"/a.js":"deadbeef"},"removedFiles":["/b.java"]}"#
        );
    }
}
