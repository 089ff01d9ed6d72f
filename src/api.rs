// Zenodo client: a small blocking HTTP client for the deposition API.
// Each method is one remote transition and checks its response status
// with `ensure_status`, so the deposit flow only has to chain them.

use crate::error::{ensure_status, network, Error, Expected, Result, Step};
use crate::metadata::MetadataDocument;
use reqwest::blocking::{Body, Client};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

/// Holds the HTTP client (carrying the bearer token as a default header)
/// and the depositions collection URL.
#[derive(Clone)]
pub struct ZenodoClient {
    client: Client,
    base_url: String,
}

/// A freshly created, still editable deposition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub id: u64,
    pub bucket_url: String,
}

/// A file attached to a deposition.
#[derive(Deserialize, Debug, Clone)]
pub struct DepositionFile {
    pub id: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Deserialize, Debug, Default)]
struct Links {
    bucket: Option<String>,
    latest_draft: Option<String>,
}

/// The parts of a deposition resource we read.
#[derive(Deserialize, Debug)]
struct DepositionResponse {
    id: Option<u64>,
    #[serde(default)]
    links: Links,
}

impl ZenodoClient {
    /// `base_url` is the depositions collection,
    /// e.g. `https://zenodo.org/api/deposit/depositions`.
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| Error::param("access_token", "contains characters not allowed in a header"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        // No timeout: archives can be large and the upload is one request.
        let client = Client::builder()
            .default_headers(headers)
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(Error::Client)?;
        Ok(ZenodoClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn deposition_url(&self, id: u64) -> String {
        format!("{}/{}", self.base_url, id)
    }

    /// POST an empty deposition to the collection.
    pub fn create_empty(&self) -> Result<Draft> {
        let step = Step::CreateEmpty;
        let res = self
            .client
            .post(&self.base_url)
            .json(&serde_json::json!({}))
            .send()
            .map_err(network(step))?;
        let res = ensure_status(step, res, Expected::Success)?;
        let body: DepositionResponse = res.json().map_err(network(step))?;

        let id = body.id.ok_or_else(|| Error::Response {
            step,
            message: "response has no deposition id".into(),
        })?;
        let bucket_url = body.links.bucket.ok_or_else(|| Error::Response {
            step,
            message: "response has no bucket link".into(),
        })?;
        Ok(Draft { id, bucket_url })
    }

    /// Open a new version draft of a published deposition and clear the
    /// files it inherited from its parent. Returns the draft and how many
    /// inherited files were removed.
    pub fn create_new_version(&self, parent_id: u64) -> Result<(Draft, usize)> {
        let step = Step::CreateNewVersion;
        let url = format!("{}/actions/newversion", self.deposition_url(parent_id));
        let res = self.client.post(&url).send().map_err(network(step))?;
        let res = ensure_status(step, res, Expected::Success)?;
        let body: DepositionResponse = res.json().map_err(network(step))?;

        let latest = body.links.latest_draft.ok_or_else(|| Error::Response {
            step,
            message: "response has no latest_draft link".into(),
        })?;
        let id = draft_id_from_link(&latest).ok_or_else(|| Error::Response {
            step,
            message: format!("cannot read a deposition id from `{}`", latest),
        })?;

        // The action answers with the parent; the bucket is on the draft.
        let bucket_url = match self.draft_bucket(id)? {
            Some(bucket) => bucket,
            None => body.links.bucket.ok_or_else(|| Error::Response {
                step,
                message: format!("draft {} has no bucket link", id),
            })?,
        };

        let purged = self.purge_files(id)?;
        Ok((Draft { id, bucket_url }, purged))
    }

    fn draft_bucket(&self, id: u64) -> Result<Option<String>> {
        let step = Step::ReadDraft;
        let res = self
            .client
            .get(self.deposition_url(id))
            .send()
            .map_err(network(step))?;
        let res = ensure_status(step, res, Expected::Success)?;
        let body: DepositionResponse = res.json().map_err(network(step))?;
        Ok(body.links.bucket)
    }

    pub fn list_files(&self, id: u64) -> Result<Vec<DepositionFile>> {
        let step = Step::ListFiles;
        let res = self
            .client
            .get(format!("{}/files", self.deposition_url(id)))
            .send()
            .map_err(network(step))?;
        let res = ensure_status(step, res, Expected::Success)?;
        res.json().map_err(network(step))
    }

    pub fn delete_file(&self, id: u64, file_id: &str) -> Result<()> {
        let step = Step::DeleteFile;
        let res = self
            .client
            .delete(format!("{}/files/{}", self.deposition_url(id), file_id))
            .send()
            .map_err(network(step))?;
        ensure_status(step, res, Expected::Success)?;
        Ok(())
    }

    /// Delete every file attached to a draft, one call per file.
    pub fn purge_files(&self, id: u64) -> Result<usize> {
        let files = self.list_files(id)?;
        for file in &files {
            tracing::debug!(deposition_id = id, file_id = %file.id, filename = %file.filename, "deleting inherited file");
            self.delete_file(id, &file.id)?;
        }
        Ok(files.len())
    }

    /// PUT the file body into the draft bucket under its file name.
    /// Returns the number of bytes sent.
    pub fn upload_file(&self, bucket_url: &str, path: &Path) -> Result<u64> {
        let step = Step::UploadFile;
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::param("input_upload_file", format!("{} has no file name", path.display())))?;
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        let url = upload_url(bucket_url, file_name).ok_or_else(|| Error::Response {
            step,
            message: format!("bucket link `{}` is not a usable URL", bucket_url),
        })?;
        let res = self
            .client
            .put(url)
            .body(Body::sized(file, size))
            .send()
            .map_err(network(step))?;
        ensure_status(step, res, Expected::Success)?;
        Ok(size)
    }

    pub fn attach_metadata(&self, id: u64, document: &MetadataDocument) -> Result<()> {
        let step = Step::AttachMetadata;
        let res = self
            .client
            .put(self.deposition_url(id))
            .json(document)
            .send()
            .map_err(network(step))?;
        ensure_status(step, res, Expected::Success)?;
        Ok(())
    }

    pub fn publish(&self, id: u64) -> Result<()> {
        let step = Step::Publish;
        let res = self
            .client
            .post(format!("{}/actions/publish", self.deposition_url(id)))
            .send()
            .map_err(network(step))?;
        ensure_status(step, res, Expected::Exactly(StatusCode::ACCEPTED))?;
        Ok(())
    }
}

impl std::fmt::Debug for ZenodoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZenodoClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// `{bucket_url}/{file_name}` with the name added as one percent-encoded
/// path segment, so `#`, `?` or `/` in it stay part of the object key.
pub fn upload_url(bucket_url: &str, file_name: &str) -> Option<Url> {
    let mut url = Url::parse(bucket_url).ok()?;
    url.path_segments_mut().ok()?.pop_if_empty().push(file_name);
    Some(url)
}

/// The draft id is the trailing path segment of its `latest_draft` link.
pub fn draft_id_from_link(link: &str) -> Option<u64> {
    link.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}
