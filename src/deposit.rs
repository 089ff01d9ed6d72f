// Deposition flow: create or version a draft, upload the file, attach the
// metadata and publish. Steps run in order and the first failure stops the
// run; nothing is retried.

use crate::api::{Draft, ZenodoClient};
use crate::error::Result;
use crate::log::{format_size, RunLog};
use crate::metadata::{build_metadata, MetadataDocument};
use crate::params::{resolve_token, DepositParams, Endpoints, TaskReference};
use std::path::PathBuf;

pub const DRY_RUN_NOTICE: &str = "### This was just a dry run test. No data was deposited ###";

/// Everything needed to run one deposition, resolved before the first call.
#[derive(Debug, Clone)]
pub struct DepositionPlan {
    pub metadata: MetadataDocument,
    pub file: PathBuf,
    pub task: TaskReference,
    /// Published deposition to derive a new version from.
    pub parent: Option<u64>,
    pub publish: bool,
    pub dry_run: bool,
}

impl DepositionPlan {
    /// Validate the parameters and build the metadata. Fails before any
    /// network access when the metadata is inconsistent.
    pub fn new(params: &DepositParams, file: PathBuf) -> Result<Self> {
        let metadata = build_metadata(&params.metadata, &params.task)?;
        Ok(DepositionPlan {
            metadata,
            file,
            task: params.task.clone(),
            parent: params.parent_id,
            publish: params.publish,
            dry_run: params.dry_run,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    DryRun,
    Deposited { deposition_id: u64, published: bool },
}

/// Build the Zenodo client for a run. A dry run never talks to Zenodo, so
/// it does not need a token. Failures are written to `log` before they are
/// returned.
pub fn connect(
    endpoints: &Endpoints,
    access_token: Option<&str>,
    dry_run: bool,
    log: &mut RunLog,
) -> Result<ZenodoClient> {
    let token = if dry_run {
        Ok(access_token.unwrap_or_default().to_string())
    } else {
        resolve_token(access_token)
    };
    token
        .and_then(|token| ZenodoClient::new(&endpoints.zenodo, &token))
        .map_err(|e| {
            log.error(format!("Error preparing Zenodo client: {}", e));
            e
        })
}

/// Run the plan against Zenodo, recording every step in `log`.
pub fn run(client: &ZenodoClient, plan: &DepositionPlan, log: &mut RunLog) -> Result<Outcome> {
    let size = std::fs::metadata(&plan.file)?.len();

    let outcome = if plan.dry_run {
        log.warn(DRY_RUN_NOTICE);
        Outcome::DryRun
    } else {
        let draft = open_draft(client, plan.parent, log)?;
        let published = fill_draft(client, &draft, plan, log).map_err(|e| {
            log.error(format!(
                "Draft deposition {} was left on the server and may need to be discarded",
                draft.id
            ));
            e
        })?;
        Outcome::Deposited {
            deposition_id: draft.id,
            published,
        }
    };

    log.info(format!("Deposited file: {}", plan.file.display()));
    log.info(format!("Deposited file size: {}", format_size(size)));
    log.info(format!("File generated from task ID: {}", plan.task.task_id));
    log.info(format!(
        "Deposition metadata sent to Zenodo: {}",
        serde_json::to_string_pretty(&plan.metadata)?
    ));
    Ok(outcome)
}

fn open_draft(client: &ZenodoClient, parent: Option<u64>, log: &mut RunLog) -> Result<Draft> {
    match parent {
        Some(parent_id) => {
            log.info(format!("Creating new version for deposition ID: {}", parent_id));
            let (draft, purged) = client.create_new_version(parent_id).map_err(|e| {
                log.error(format!("Error creating new version: {}", e));
                e
            })?;
            log.info(format!("Zenodo deposition ID (new version): {}", draft.id));
            if purged > 0 {
                log.info(format!("Removed {} file(s) inherited from the previous version", purged));
            }
            Ok(draft)
        }
        None => {
            let draft = client.create_empty().map_err(|e| {
                log.error(format!("Error creating empty deposition: {}", e));
                e
            })?;
            log.info(format!("Empty deposition created successfully with ID: {}", draft.id));
            Ok(draft)
        }
    }
}

// Upload, metadata, publish. Returns whether the draft was published.
fn fill_draft(client: &ZenodoClient, draft: &Draft, plan: &DepositionPlan, log: &mut RunLog) -> Result<bool> {
    client.upload_file(&draft.bucket_url, &plan.file).map_err(|e| {
        log.error(format!("Error uploading file: {}", e));
        e
    })?;
    log.info("File uploaded successfully.");

    client.attach_metadata(draft.id, &plan.metadata).map_err(|e| {
        log.error(format!("Error sending metadata to the server: {}", e));
        e
    })?;
    log.info("Metadata sent successfully to the server.");

    if !plan.publish {
        log.info(format!("Deposition {} left as an unpublished draft.", draft.id));
        return Ok(false);
    }

    client.publish(draft.id).map_err(|e| {
        log.error(format!("Error publishing deposition: {}", e));
        e
    })?;
    log.info("Deposition published successfully.");
    Ok(true)
}
