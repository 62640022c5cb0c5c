use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Maximum number of candidates announced to a caller.
pub const MAX_MATCHES: usize = 2;

/// Filter criteria accumulated over one dialogue.
///
/// District, category, gender and ordering carry the caller's raw digits;
/// the IVR does not validate them locally, the backend owns their meaning.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WorkerFilter {
    pub district: String,
    pub category: String,
    pub gender: String,
    pub ordering: String,
    pub language: String,
}

/// One ranked candidate returned by the marketplace backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerMatch {
    pub name: String,
    pub phone: String,
}

/// The worker-match collaborator the orchestrator invokes once per session.
#[async_trait]
pub trait WorkerLookup: Send + Sync {
    /// Return up to [`MAX_MATCHES`] ranked candidates for the filter.
    ///
    /// Contract: implementations backed by the marketplace never fail — a
    /// data-source error surfaces as an empty list. The orchestrator still
    /// guards the call site against a contract-violating `Err`.
    async fn find_workers(&self, filter: &WorkerFilter) -> Result<Vec<WorkerMatch>>;
}

/// [`WorkerLookup`] over the marketplace backend's HTTP matching endpoint.
pub struct HttpWorkerLookup {
    url: String,
    http: reqwest::Client,
}

impl HttpWorkerLookup {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl WorkerLookup for HttpWorkerLookup {
    async fn find_workers(&self, filter: &WorkerFilter) -> Result<Vec<WorkerMatch>> {
        let response = self.http.get(&self.url).query(filter).send().await;
        let mut matches = match response {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<Vec<WorkerMatch>>().await {
                    Ok(list) => list,
                    Err(e) => {
                        warn!("lookup: failed to decode backend response: {}", e);
                        Vec::new()
                    }
                }
            }
            Ok(resp) => {
                warn!("lookup: backend returned {}", resp.status());
                Vec::new()
            }
            Err(e) => {
                warn!("lookup: request failed: {}", e);
                Vec::new()
            }
        };
        matches.truncate(MAX_MATCHES);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_decoding() {
        let list: Vec<WorkerMatch> = serde_json::from_str(
            r#"[
                { "name": "Avi Cohen", "phone": "052-1234567", "rating": 4.7 },
                { "name": "Dana Levi", "phone": "054-7654321" }
            ]"#,
        )
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Avi Cohen");
        assert_eq!(list[1].phone, "054-7654321");
    }

    #[tokio::test]
    async fn test_unreachable_backend_means_no_matches() {
        // Contract: the collaborator never fails, a broken data source is
        // reported as an empty list.
        let lookup = HttpWorkerLookup::new("http://127.0.0.1:1/api/workers/match");
        let filter = WorkerFilter {
            district: "1".into(),
            category: "2".into(),
            gender: "1".into(),
            ordering: "1".into(),
            language: "he".into(),
        };
        let matches = lookup.find_workers(&filter).await.unwrap();
        assert!(matches.is_empty());
    }
}
