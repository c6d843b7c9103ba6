use serde::{Deserialize, Serialize};

/// The operator control-plane protocol (§10.6), carried over a Unix domain
/// socket as newline-delimited JSON. This is not the HTTP/JSON query API —
/// it is a second, narrower transport onto the same `QueryEngine`, meant
/// for local operator tooling (`hound` CLI) rather than the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Request {
    Status,
    Reindex {
        #[serde(default)]
        repo: Option<String>,
    },
    Shutdown,
    Search {
        pattern: String,
        /// A regex over the candidate's path (§4.5), not a glob.
        #[serde(default)]
        files: Option<String>,
        #[serde(default)]
        repos: Option<Vec<String>>,
        #[serde(default)]
        ignore_case: bool,
        #[serde(default)]
        limit: Option<usize>,
        #[serde(default)]
        max_files_per_repo: Option<usize>,
        #[serde(default)]
        context_lines: u32,
        /// Per-query deadline in milliseconds (§5); `None` means no deadline.
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Response {
    Status {
        build: crate::build_info::BuildInfo,
        repos: Vec<RepoStatus>,
    },
    Ok,
    Error {
        message: String,
    },
    SearchResults {
        repos: std::collections::BTreeMap<String, std::collections::BTreeMap<String, Vec<MatchRecord>>>,
        errors: std::collections::BTreeMap<String, String>,
        truncated: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoStatus {
    pub name: String,
    pub state: String,
    pub last_indexed_revision: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub line_number: u32,
    pub byte_start: u32,
    pub byte_end: u32,
    pub line_text: String,
    pub before: Vec<String>,
    pub after: Vec<String>,
}

impl Request {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> crate::Result<Request> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl Response {
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> crate::Result<Response> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl From<serde_json::Error> for crate::Error {
    fn from(e: serde_json::Error) -> Self {
        crate::Error::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_json() {
        let req = Request::Search {
            pattern: "foo".to_string(),
            files: None,
            repos: None,
            ignore_case: true,
            limit: Some(10),
            max_files_per_repo: None,
            context_lines: 2,
            timeout_ms: None,
        };
        let raw = req.to_json().unwrap();
        let back = Request::from_json(&raw).unwrap();
        match back {
            Request::Search { pattern, ignore_case, .. } => {
                assert_eq!(pattern, "foo");
                assert!(ignore_case);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn status_request_has_no_payload() {
        let raw = Request::Status.to_json().unwrap();
        assert!(raw.contains("status"));
    }
}
