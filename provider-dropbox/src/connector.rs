//! Dropbox Business API connector implementation
//!
//! Implements the `TeamProvider` trait for Dropbox API v2 with a team token.

use async_trait::async_trait;
use remote_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use remote_traits::provider::{
    ChangeEntry, ChangeKind, ChangePage, Member, MemberId, MemberStatus, TeamProvider,
};
use remote_traits::RemoteError;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::DropboxError;
use crate::types::{ApiErrorResponse, EntryMetadata, ListFolderResponse, MembersListResponse};

/// Dropbox RPC API base URL
const API_BASE: &str = "https://api.dropboxapi.com/2";

/// Dropbox content API base URL (downloads)
const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";

/// Header selecting which team member an API call acts as
const SELECT_USER_HEADER: &str = "Dropbox-API-Select-User";

/// Header carrying call arguments on content endpoints
const API_ARG_HEADER: &str = "Dropbox-API-Arg";

/// Page size for roster listing (Dropbox maximum is 1000)
const MEMBERS_PAGE_LIMIT: u32 = 100;

/// Page size for list_folder (Dropbox maximum is 2000)
const FOLDER_PAGE_LIMIT: u32 = 2000;

/// Dropbox Business API connector
///
/// Implements `TeamProvider` for Dropbox API v2.
///
/// # Features
///
/// - Team roster enumeration via `team/members/list_v2`
/// - Recursive, cursor-paged change feeds via `files/list_folder`,
///   scoped per member with the `Dropbox-API-Select-User` header
/// - Streaming revision downloads from the content endpoint
/// - Retry with exponential backoff on throttling and server errors,
///   honouring `Retry-After` when the server sends one
///
/// # Example
///
/// ```ignore
/// use provider_dropbox::DropboxTeamConnector;
/// use remote_traits::TeamProvider;
///
/// let connector = DropboxTeamConnector::new(http_client, team_token);
/// let roster = connector.list_members().await?;
/// ```
pub struct DropboxTeamConnector {
    /// HTTP client for API requests
    http_client: Arc<dyn HttpClient>,

    /// Dropbox Business team token
    team_token: String,

    /// Backoff policy for throttled and transient request failures
    retry_policy: RetryPolicy,

    /// Per-request timeout for RPC endpoints
    rpc_timeout: Duration,
}

impl DropboxTeamConnector {
    /// Create a new connector with the default retry policy
    ///
    /// # Arguments
    ///
    /// * `http_client` - HTTP client implementation
    /// * `team_token` - Dropbox Business API token with team member file access
    pub fn new(http_client: Arc<dyn HttpClient>, team_token: String) -> Self {
        Self {
            http_client,
            team_token,
            retry_policy: RetryPolicy::default(),
            rpc_timeout: Duration::from_secs(30),
        }
    }

    /// Override the retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Override the RPC timeout
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Serialize a JSON value for use inside an HTTP header.
    ///
    /// Header values must stay ASCII, so any character outside the printable
    /// range is escaped as `\uXXXX` the way the Dropbox SDKs do.
    fn http_safe_json(value: &serde_json::Value) -> String {
        let raw = value.to_string();
        let mut out = String::with_capacity(raw.len());
        for c in raw.chars() {
            if (' '..='\u{7e}').contains(&c) {
                out.push(c);
            } else {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
        }
        out
    }

    fn parse_retry_after(response: &HttpResponse) -> Option<Duration> {
        response
            .header("Retry-After")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Map a non-2xx response into the connector error taxonomy.
    fn classify(response: HttpResponse) -> Result<HttpResponse, DropboxError> {
        let status = response.status;
        if response.is_success() {
            return Ok(response);
        }

        match status {
            401 => Err(DropboxError::Auth(response.text())),
            409 => {
                // Endpoint-specific conflict; error_summary is a dotted path
                // like "reset/..." or "path/not_found/..".
                let summary = response
                    .json::<ApiErrorResponse>()
                    .map(|e| e.error_summary)
                    .unwrap_or_else(|_| response.text());

                if summary.starts_with("reset") {
                    Err(DropboxError::CursorReset(summary))
                } else if summary.contains("not_found") {
                    Err(DropboxError::PathNotFound(summary))
                } else {
                    Err(DropboxError::Api { status, summary })
                }
            }
            429 => Err(DropboxError::RateLimited {
                retry_after: Self::parse_retry_after(&response),
            }),
            s if response.is_server_error() => {
                Err(DropboxError::Network(format!("server error (status {})", s)))
            }
            _ => Err(DropboxError::Api {
                status,
                summary: response.text(),
            }),
        }
    }

    /// Execute one RPC endpoint with retry on throttling and server errors.
    ///
    /// Retries re-send the identical request, so a throttled page fetch
    /// resumes from the same cursor position.
    async fn rpc(
        &self,
        url: &str,
        member: Option<&MemberId>,
        body: &serde_json::Value,
    ) -> Result<HttpResponse, DropboxError> {
        let mut attempt: u32 = 0;

        loop {
            let mut request = HttpRequest::new(HttpMethod::Post, url)
                .bearer_token(&self.team_token)
                .json(body)?
                .timeout(self.rpc_timeout);
            if let Some(member) = member {
                request = request.header(SELECT_USER_HEADER, member.as_str());
            }

            let result = match self.http_client.execute(request).await {
                Ok(response) => Self::classify(response),
                Err(e) => Err(DropboxError::Remote(e)),
            };

            match result {
                Ok(response) => {
                    debug!(url, attempt, "Dropbox RPC succeeded");
                    return Ok(response);
                }
                Err(e) if e.is_retryable() => {
                    attempt += 1;
                    if attempt >= self.retry_policy.max_attempts {
                        warn!(url, attempts = attempt, error = %e, "Dropbox RPC exhausted retries");
                        return Err(e);
                    }
                    let delay = e
                        .retry_after()
                        .unwrap_or_else(|| self.retry_policy.jittered_delay(attempt - 1));
                    warn!(
                        url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Dropbox RPC failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn convert_member(info: crate::types::TeamMemberInfo) -> Member {
        let profile = info.profile;
        let status = if profile.status.tag == "removed" {
            MemberStatus::Removed
        } else {
            // invited and suspended members still own files worth backing up
            MemberStatus::Active
        };

        Member {
            id: MemberId::new(profile.team_member_id),
            display_name: profile.name.display_name,
            email: profile.email,
            status,
        }
    }

    fn convert_entry(entry: EntryMetadata) -> Option<ChangeEntry> {
        match entry {
            EntryMetadata::File(f) => {
                let path_display = f.path_display.clone().unwrap_or_else(|| f.name.clone());
                let path_key = f
                    .path_lower
                    .unwrap_or_else(|| path_display.to_lowercase());
                Some(ChangeEntry {
                    path_display,
                    path_key,
                    kind: ChangeKind::File {
                        size: f.size,
                        modified: f.server_modified,
                        revision: f.rev,
                    },
                })
            }
            EntryMetadata::Folder(f) => {
                let path_display = f.path_display.unwrap_or_else(|| f.name.clone());
                let path_key = f
                    .path_lower
                    .unwrap_or_else(|| path_display.to_lowercase());
                Some(ChangeEntry {
                    path_display,
                    path_key,
                    kind: ChangeKind::Folder,
                })
            }
            EntryMetadata::Deleted(d) => {
                let path_display = d.path_display.unwrap_or_else(|| d.name.clone());
                let path_key = d
                    .path_lower
                    .unwrap_or_else(|| path_display.to_lowercase());
                Some(ChangeEntry {
                    path_display,
                    path_key,
                    kind: ChangeKind::Deleted,
                })
            }
            EntryMetadata::Unknown => None,
        }
    }

    fn map_download_error(e: RemoteError, path: &str) -> DropboxError {
        match e {
            RemoteError::Api { status: 401, message } => DropboxError::Auth(message),
            RemoteError::Api { status: 409, message } => {
                if message.contains("not_found") {
                    DropboxError::PathNotFound(path.to_string())
                } else {
                    DropboxError::Api {
                        status: 409,
                        summary: message,
                    }
                }
            }
            RemoteError::Api { status: 429, .. } => DropboxError::RateLimited { retry_after: None },
            RemoteError::Api { status, message } if (500..600).contains(&status) => {
                DropboxError::Network(format!("server error (status {}): {}", status, message))
            }
            other => DropboxError::Remote(other),
        }
    }
}

#[async_trait]
impl TeamProvider for DropboxTeamConnector {
    #[instrument(skip(self))]
    async fn list_members(&self) -> remote_traits::error::Result<Vec<Member>> {
        info!("Listing Dropbox team members");

        let mut members = Vec::new();

        let response = self
            .rpc(
                &format!("{}/team/members/list_v2", API_BASE),
                None,
                &json!({ "limit": MEMBERS_PAGE_LIMIT, "include_removed": false }),
            )
            .await
            // A token that cannot list the roster is unusable for the whole
            // run, whatever the precise failure was.
            .map_err(|e| RemoteError::DirectoryUnavailable(e.to_string()))?;

        let mut page: MembersListResponse = response
            .json()
            .map_err(|e| RemoteError::DirectoryUnavailable(e.to_string()))?;
        members.extend(page.members.drain(..).map(Self::convert_member));

        while page.has_more {
            let response = self
                .rpc(
                    &format!("{}/team/members/list/continue_v2", API_BASE),
                    None,
                    &json!({ "cursor": page.cursor }),
                )
                .await
                .map_err(|e| RemoteError::DirectoryUnavailable(e.to_string()))?;

            page = response
                .json()
                .map_err(|e| RemoteError::DirectoryUnavailable(e.to_string()))?;
            members.extend(page.members.drain(..).map(Self::convert_member));
        }

        info!(count = members.len(), "Listed Dropbox team members");
        Ok(members)
    }

    #[instrument(skip(self, cursor), fields(member = %member))]
    async fn fetch_changes(
        &self,
        member: &MemberId,
        cursor: Option<&str>,
    ) -> remote_traits::error::Result<ChangePage> {
        let response = match cursor {
            Some(cursor) => {
                self.rpc(
                    &format!("{}/files/list_folder/continue", API_BASE),
                    Some(member),
                    &json!({ "cursor": cursor }),
                )
                .await
            }
            None => {
                self.rpc(
                    &format!("{}/files/list_folder", API_BASE),
                    Some(member),
                    &json!({
                        "path": "",
                        "recursive": true,
                        "include_deleted": true,
                        "limit": FOLDER_PAGE_LIMIT,
                    }),
                )
                .await
            }
        }
        .map_err(RemoteError::from)?;

        let page: ListFolderResponse = response.json().map_err(RemoteError::from)?;

        let mut entries = Vec::with_capacity(page.entries.len());
        for raw in page.entries {
            match Self::convert_entry(raw) {
                Some(entry) => entries.push(entry),
                None => {
                    warn!(member = %member, "Skipping change entry with unrecognized tag");
                }
            }
        }

        debug!(
            member = %member,
            entries = entries.len(),
            has_more = page.has_more,
            "Fetched change page"
        );

        Ok(ChangePage {
            entries,
            cursor: page.cursor,
            has_more: page.has_more,
        })
    }

    #[instrument(skip(self), fields(member = %member, path = %path))]
    async fn download(
        &self,
        member: &MemberId,
        path: &str,
        revision: &str,
    ) -> remote_traits::error::Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        // Pin the download to the listed revision so a file edited mid-run
        // cannot produce a torn copy.
        let arg = if revision.is_empty() {
            json!({ "path": path })
        } else {
            json!({ "path": format!("rev:{}", revision) })
        };

        let mut attempt: u32 = 0;
        loop {
            let request = HttpRequest::new(
                HttpMethod::Post,
                format!("{}/files/download", CONTENT_BASE),
            )
            .bearer_token(&self.team_token)
            .header(SELECT_USER_HEADER, member.as_str())
            .header(API_ARG_HEADER, Self::http_safe_json(&arg));

            match self.http_client.download_stream(request).await {
                Ok(reader) => return Ok(reader),
                Err(e) => {
                    let mapped = Self::map_download_error(e, path);
                    if mapped.is_retryable() {
                        attempt += 1;
                        if attempt >= self.retry_policy.max_attempts {
                            return Err(mapped.into());
                        }
                        let delay = mapped
                            .retry_after()
                            .unwrap_or_else(|| self.retry_policy.jittered_delay(attempt - 1));
                        warn!(
                            path,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Download failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        return Err(mapped.into());
                    }
                }
            }
        }
    }
}
