use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:9001";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("server returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Result of the repository update endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateReport {
    pub ok: bool,
    #[serde(default)]
    pub log: String,
}

/// The two calls the picker makes against the repository server.
/// How files are read or how the repo is updated is the server's business.
pub trait Backend {
    /// Merged contents of `paths`, concatenated by the server.
    fn read_files(&self, paths: &[String]) -> Result<String, BackendError>;
    fn update_repo(&self, branch: Option<&str>) -> Result<UpdateReport, BackendError>;
}

#[derive(Serialize)]
struct ReadRequest<'a> {
    paths: &'a [String],
}

#[derive(Deserialize)]
struct ReadResponse {
    merged: String,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

/// Blocking JSON-over-HTTP client. Requests carry no timeout.
#[derive(Clone)]
pub struct HttpBackend {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(concat!("repopick/", env!("CARGO_PKG_VERSION")))
            .build();
        HttpBackend {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route)
    }
}

impl Backend for HttpBackend {
    fn read_files(&self, paths: &[String]) -> Result<String, BackendError> {
        let res = self
            .agent
            .post(&self.endpoint("read-files"))
            .send_json(ReadRequest { paths });

        let ok = match res {
            Ok(r) => r,
            Err(ureq::Error::Status(code, r)) => {
                let body = r.into_string().unwrap_or_default();
                return Err(BackendError::Status { code, body });
            }
            Err(e) => return Err(BackendError::Transport(e.to_string())),
        };

        let parsed: ReadResponse = ok
            .into_json()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(parsed.merged)
    }

    fn update_repo(&self, branch: Option<&str>) -> Result<UpdateReport, BackendError> {
        let res = self
            .agent
            .post(&self.endpoint("update-repo"))
            .send_json(UpdateRequest { branch });

        match res {
            Ok(r) => r
                .into_json()
                .map_err(|e| BackendError::Decode(e.to_string())),
            // A failed update still comes back with `{ok: false, log}`.
            Err(ureq::Error::Status(code, r)) => {
                let body = r.into_string().unwrap_or_default();
                match serde_json::from_str::<UpdateReport>(&body) {
                    Ok(report) => Ok(UpdateReport { ok: false, ..report }),
                    Err(_) => Err(BackendError::Status { code, body }),
                }
            }
            Err(e) => Err(BackendError::Transport(e.to_string())),
        }
    }
}
