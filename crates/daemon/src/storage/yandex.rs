//! Yandex.Disk REST implementation of [`RemoteStorage`].

use protocol::{EntryKind, RemoteEntry};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response};
use serde::Deserialize;

use super::{RemoteStorage, StorageError};
use crate::config::StorageConfig;

/// Prefix the service puts in front of every resource path.
const DISK_SCHEME: &str = "disk:";

/// Storage backend talking to the Yandex.Disk REST API.
#[derive(Clone)]
pub struct YandexDisk {
    client: Client,
    api_base: String,
    token: String,
    list_limit: u32,
}

impl std::fmt::Debug for YandexDisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YandexDisk")
            .field("api_base", &self.api_base)
            .field("list_limit", &self.list_limit)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ResourceResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<EmbeddedItems>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedItems {
    #[serde(default)]
    items: Vec<ResourceItem>,
}

#[derive(Debug, Deserialize)]
struct ResourceItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct DownloadLink {
    href: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    description: Option<String>,
    error: Option<String>,
}

impl YandexDisk {
    /// Build a client from the storage configuration.
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            list_limit: config.list_limit,
        })
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/{}", self.api_base, resource)
    }

    fn auth_header(&self) -> String {
        format!("OAuth {}", self.token)
    }
}

/// Turn a non-success response into [`StorageError::Status`].
async fn check_status(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Status {
        status: status.as_u16(),
        message: error_message(&body, status.canonical_reason().unwrap_or("error")),
    })
}

fn error_message(body: &str, fallback: &str) -> String {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .description
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| fallback.to_string())
}

/// Strip the `disk:` scheme so paths compare equal to configured roots.
fn normalize_path(path: &str) -> String {
    match path.strip_prefix(DISK_SCHEME) {
        Some(rest) if rest.starts_with('/') => rest.to_string(),
        Some(rest) => format!("/{rest}"),
        None => path.to_string(),
    }
}

fn into_entries(response: ResourceResponse) -> Vec<RemoteEntry> {
    let items = response.embedded.map(|e| e.items).unwrap_or_default();
    items
        .into_iter()
        .filter_map(|item| {
            let kind = match item.kind.as_str() {
                "dir" => EntryKind::Dir,
                "file" => EntryKind::File,
                other => {
                    tracing::debug!(name = %item.name, kind = other, "Skipping unknown resource type");
                    return None;
                }
            };
            Some(RemoteEntry {
                name: item.name,
                path: normalize_path(&item.path),
                kind,
            })
        })
        .collect()
}

impl RemoteStorage for YandexDisk {
    async fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, StorageError> {
        let limit = self.list_limit.to_string();
        let response = self
            .client
            .get(self.endpoint("resources"))
            .header(AUTHORIZATION, self.auth_header())
            .query(&[("path", path), ("limit", limit.as_str())])
            .send()
            .await?;
        let body: ResourceResponse = check_status(response).await?.json().await?;
        Ok(into_entries(body))
    }

    async fn download_url(&self, path: &str) -> Result<String, StorageError> {
        let response = self
            .client
            .get(self.endpoint("resources/download"))
            .header(AUTHORIZATION, self.auth_header())
            .query(&[("path", path)])
            .send()
            .await?;
        let link: DownloadLink = check_status(response).await?.json().await?;
        Ok(link.href)
    }

    async fn fetch_prefix(&self, url: &str, max_bytes: usize) -> Result<Vec<u8>, StorageError> {
        let mut response = check_status(self.client.get(url).send().await?).await?;
        let mut buf = Vec::with_capacity(max_bytes.min(16 * 1024));
        while buf.len() < max_bytes {
            let Some(chunk) = response.chunk().await? else {
                break;
            };
            let take = chunk.len().min(max_bytes - buf.len());
            buf.extend_from_slice(&chunk[..take]);
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_error_hides_signed_href() {
        let disk = YandexDisk::new(&StorageConfig::default()).unwrap();

        let err = disk
            .fetch_prefix("http://127.0.0.1:9/get/file?sign=SECRETSIG", 16)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Http(_)));
        assert!(!err.to_string().contains("SECRETSIG"));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("disk:/materials/a"), "/materials/a");
        assert_eq!(normalize_path("disk:materials"), "/materials");
        assert_eq!(normalize_path("/materials"), "/materials");
    }

    #[test]
    fn test_into_entries_parses_listing() {
        let json = r#"{
            "name": "materials",
            "path": "disk:/materials",
            "_embedded": {
                "items": [
                    {"name": "Курс 1", "path": "disk:/materials/Курс 1", "type": "dir"},
                    {"name": "a.pdf", "path": "disk:/materials/a.pdf", "type": "file", "size": 10},
                    {"name": "weird", "path": "disk:/materials/weird", "type": "symlink"}
                ],
                "limit": 200
            }
        }"#;
        let response: ResourceResponse = serde_json::from_str(json).unwrap();
        let entries = into_entries(response);

        assert_eq!(
            entries,
            vec![
                RemoteEntry::dir("Курс 1", "/materials/Курс 1"),
                RemoteEntry::file("a.pdf", "/materials/a.pdf"),
            ]
        );
    }

    #[test]
    fn test_file_resource_has_no_children() {
        let json = r#"{"name": "a.pdf", "path": "disk:/a.pdf", "type": "file"}"#;
        let response: ResourceResponse = serde_json::from_str(json).unwrap();
        assert!(into_entries(response).is_empty());
    }

    #[test]
    fn test_error_message_prefers_description() {
        let body = r#"{"message": "Не удалось найти", "description": "Resource not found.", "error": "DiskNotFoundError"}"#;
        assert_eq!(error_message(body, "Not Found"), "Resource not found.");
        assert_eq!(error_message(r#"{"error": "Unauthorized"}"#, "x"), "Unauthorized");
        assert_eq!(error_message("<html>", "Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_new_trims_api_base() {
        let config = StorageConfig {
            api_base: "https://disk.test/v1/disk/".to_string(),
            token: "secret".to_string(),
            ..StorageConfig::default()
        };
        let disk = YandexDisk::new(&config).unwrap();
        assert_eq!(disk.endpoint("resources"), "https://disk.test/v1/disk/resources");
        assert_eq!(disk.auth_header(), "OAuth secret");
        assert!(!format!("{disk:?}").contains("secret"));
    }
}
