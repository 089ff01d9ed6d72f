// Error types shared by both tools. Every remote call goes through
// `ensure_status`, so a failure always names the step that broke and the
// status code the service answered with.

use reqwest::blocking::Response;
use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, Error>;

/// A remote transition performed by one of the tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fetch,
    CreateEmpty,
    CreateNewVersion,
    ReadDraft,
    ListFiles,
    DeleteFile,
    UploadFile,
    AttachMetadata,
    Publish,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Step::Fetch => "fetching task result",
            Step::CreateEmpty => "creating empty deposition",
            Step::CreateNewVersion => "creating new version",
            Step::ReadDraft => "reading draft deposition",
            Step::ListFiles => "listing draft files",
            Step::DeleteFile => "deleting draft file",
            Step::UploadFile => "uploading file",
            Step::AttachMetadata => "sending metadata",
            Step::Publish => "publishing deposition",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// A parameter is missing from the parameter file or has a bad value.
    #[error("parameter `{key}`: {message}")]
    Param { key: String, message: String },

    /// Metadata failed validation before any network call was made.
    #[error("invalid metadata: {0}")]
    Validation(String),

    /// The service answered with a status other than the expected one.
    #[error("error {step}: status code {status}{}", body_suffix(.body))]
    Status {
        step: Step,
        status: StatusCode,
        body: String,
    },

    /// The request never produced a response.
    #[error("error {step}: {source}")]
    Network {
        step: Step,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),

    /// A successful response lacked something we depend on.
    #[error("error {step}: {message}")]
    Response { step: Step, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parameter file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(" - {}", body)
    }
}

impl Error {
    pub fn param(key: &str, message: impl Into<String>) -> Self {
        Error::Param {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// The step this error belongs to, if it came from a remote call.
    pub fn step(&self) -> Option<Step> {
        match self {
            Error::Status { step, .. } | Error::Network { step, .. } | Error::Response { step, .. } => {
                Some(*step)
            }
            _ => None,
        }
    }
}

/// Which status codes count as success for a step.
#[derive(Debug, Clone, Copy)]
pub enum Expected {
    /// Any 2xx.
    Success,
    Exactly(StatusCode),
}

impl Expected {
    fn accepts(self, status: StatusCode) -> bool {
        match self {
            Expected::Success => status.is_success(),
            Expected::Exactly(code) => status == code,
        }
    }
}

/// Attach the step to a transport error.
pub fn network(step: Step) -> impl FnOnce(reqwest::Error) -> Error {
    move |source| Error::Network { step, source }
}

/// Pass the response through when its status is expected, otherwise turn it
/// into `Error::Status` carrying the response body.
pub fn ensure_status(step: Step, res: Response, expected: Expected) -> Result<Response> {
    let status = res.status();
    if expected.accepts(status) {
        return Ok(res);
    }
    let body = res.text().unwrap_or_default();
    Err(Error::Status { step, status, body })
}
