// Parameter file handling.
//
// Both tools receive a flat YAML document written by the workflow that
// launches them. Keys are dotted strings such as `metadata.title` and the
// values may come through as any YAML scalar, so everything is read back
// as a string and interpreted here.
//
// Unquoted numbers are parsed by YAML before we see them, so
// `metadata.version: 1.10` reads back as "1.1". Quote version strings
// (`metadata.version: "1.10"`) to keep them verbatim.

use crate::error::{Error, Result};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Name of the per-user file holding a Zenodo token.
pub const TOKEN_FILE: &str = ".zenodo_token";

/// A loaded parameter document.
#[derive(Debug, Clone, Default)]
pub struct ParamFile {
    values: Mapping,
}

impl ParamFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(contents)?;
        match value {
            Value::Mapping(values) => Ok(ParamFile { values }),
            Value::Null => Ok(ParamFile::default()),
            _ => Err(Error::param("<root>", "parameter file must be a mapping")),
        }
    }

    /// Raw lookup. `None` when the key is absent, an empty string for null.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = self.values.get(key)?;
        Some(match value {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
        })
    }

    pub fn require(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| Error::param(key, "missing from parameter file"))
    }

    /// Absent and empty values both map to `None`.
    pub fn optional(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn flag(&self, key: &str, default: bool) -> Result<bool> {
        match self.optional(key) {
            None => Ok(default),
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(Error::param(key, format!("expected true or false, got `{}`", v))),
            },
        }
    }
}

/// Where a task was run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Classic GNPS (ProteoSAFe).
    Legacy,
    Gnps2,
}

impl FromStr for DataSource {
    type Err = Error;

    // The workflow sends `datasource: true` for classic GNPS tasks.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "gnps" | "legacy" => Ok(DataSource::Legacy),
            "" | "false" | "gnps2" => Ok(DataSource::Gnps2),
            other => Err(Error::param(
                "datasource",
                format!("unknown data source `{}`", other),
            )),
        }
    }
}

/// A task id together with the service it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReference {
    pub task_id: String,
    pub source: DataSource,
}

impl TaskReference {
    fn from_params(params: &ParamFile) -> Result<Self> {
        let task_id = params
            .optional("uploaded_task_id")
            .ok_or_else(|| Error::param("uploaded_task_id", "must not be empty"))?;
        let source = match params.get("datasource") {
            Some(v) => v.parse()?,
            None => DataSource::Gnps2,
        };
        Ok(TaskReference { task_id, source })
    }

    /// Human-facing status page of the task.
    pub fn status_url(&self) -> String {
        match self.source {
            DataSource::Legacy => format!(
                "https://gnps.ucsd.edu/ProteoSAFe/status.jsp?task={}",
                self.task_id
            ),
            DataSource::Gnps2 => format!("https://gnps2.org/status?task={}", self.task_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchParams {
    pub task: TaskReference,
}

impl FetchParams {
    pub fn from_params(params: &ParamFile) -> Result<Self> {
        Ok(FetchParams {
            task: TaskReference::from_params(params)?,
        })
    }
}

/// The `metadata.*` block exactly as written in the parameter file.
#[derive(Debug, Clone, Default)]
pub struct RawMetadata {
    pub title: String,
    pub creators: String,
    pub description: String,
    pub keywords: String,
    pub upload_type: String,
    pub version: String,
    pub access_right: String,
    pub license: String,
    pub embargo_date: String,
    pub notes: String,
}

#[derive(Debug, Clone)]
pub struct DepositParams {
    pub metadata: RawMetadata,
    pub task: TaskReference,
    pub dry_run: bool,
    pub publish: bool,
    /// Published deposition to derive a new version from.
    pub parent_id: Option<u64>,
    pub access_token: Option<String>,
}

impl DepositParams {
    pub fn from_params(params: &ParamFile) -> Result<Self> {
        let metadata = RawMetadata {
            title: params.require("metadata.title")?,
            creators: params.require("metadata.creators")?,
            description: params.require("metadata.description")?,
            keywords: params.get("metadata.keywords").unwrap_or_default(),
            upload_type: params.require("metadata.upload_type")?,
            version: params.get("metadata.version").unwrap_or_default(),
            access_right: params.require("metadata.access_right")?,
            license: params.get("metadata.license").unwrap_or_default(),
            embargo_date: params.get("metadata.embargo_date").unwrap_or_default(),
            notes: params.get("metadata.notes").unwrap_or_default(),
        };

        let parent_id = match params.optional("zenodo_deposition_id") {
            None => None,
            Some(id) => Some(id.parse::<u64>().map_err(|_| {
                Error::param("zenodo_deposition_id", format!("`{}` is not a deposition id", id))
            })?),
        };

        Ok(DepositParams {
            metadata,
            task: TaskReference::from_params(params)?,
            dry_run: params.flag("dry_run", false)?,
            publish: params.flag("publish", true)?,
            parent_id,
            access_token: params.optional("access_token"),
        })
    }
}

/// Remote service locations. Each can be overridden from the environment
/// so the tools can be pointed at production Zenodo or a local mock.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub zenodo: String,
    pub gnps2: String,
    pub gnps_legacy: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            zenodo: "https://sandbox.zenodo.org/api/deposit/depositions".into(),
            gnps2: "https://gnps2.org".into(),
            gnps_legacy: "https://gnps.ucsd.edu".into(),
        }
    }
}

impl Endpoints {
    /// Defaults overridden by `ZENODO_API_URL`, `GNPS2_URL` and
    /// `GNPS_LEGACY_URL`.
    pub fn from_env() -> Self {
        let defaults = Endpoints::default();
        let var = |name: &str, fallback: String| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(fallback)
        };
        Endpoints {
            zenodo: var("ZENODO_API_URL", defaults.zenodo),
            gnps2: var("GNPS2_URL", defaults.gnps2),
            gnps_legacy: var("GNPS_LEGACY_URL", defaults.gnps_legacy),
        }
    }
}

/// Pick the token to deposit with: the parameter file first, then `TOKEN`
/// from a `.env` file in the working directory, then `~/.zenodo_token`.
pub fn resolve_token(from_params: Option<&str>) -> Result<String> {
    let home = dirs::home_dir().map(|d| d.join(TOKEN_FILE));
    resolve_token_from(from_params, Path::new(".env"), home)
}

fn resolve_token_from(
    from_params: Option<&str>,
    env_file: &Path,
    token_file: Option<PathBuf>,
) -> Result<String> {
    if let Some(token) = from_params.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }

    if env_file.exists() {
        let iter = dotenvy::from_path_iter(env_file)
            .map_err(|e| Error::param("access_token", format!("reading {}: {}", env_file.display(), e)))?;
        for item in iter {
            let (key, value) = item
                .map_err(|e| Error::param("access_token", format!("reading {}: {}", env_file.display(), e)))?;
            if key == "TOKEN" && !value.trim().is_empty() {
                return Ok(value.trim().to_string());
            }
        }
    }

    if let Some(path) = token_file {
        if let Ok(data) = std::fs::read_to_string(&path) {
            let token = data.trim();
            if !token.is_empty() {
                return Ok(token.to_string());
            }
        }
    }

    Err(Error::param(
        "access_token",
        "no token in parameters, .env or ~/.zenodo_token",
    ))
}
