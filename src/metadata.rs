// Deposition metadata: typed records sent to Zenodo and the pure functions
// that build them from the flat parameter strings. Nothing here touches the
// network, so every invariant is checked before a draft is created.

use crate::error::{Error, Result};
use crate::params::{RawMetadata, TaskReference};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Creator {
    pub name: String,
    pub affiliation: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessRight {
    Open,
    Embargoed,
    Closed,
    Restricted,
}

impl FromStr for AccessRight {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "open" => Ok(AccessRight::Open),
            "embargoed" => Ok(AccessRight::Embargoed),
            "closed" => Ok(AccessRight::Closed),
            "restricted" => Ok(AccessRight::Restricted),
            other => Err(Error::Validation(format!(
                "unknown access_right `{}` (expected open, embargoed, closed or restricted)",
                other
            ))),
        }
    }
}

impl fmt::Display for AccessRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessRight::Open => "open",
            AccessRight::Embargoed => "embargoed",
            AccessRight::Closed => "closed",
            AccessRight::Restricted => "restricted",
        })
    }
}

/// Link from the deposition to another resource, here the GNPS task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RelatedIdentifier {
    pub identifier: String,
    pub relation: String,
    pub resource_type: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DepositionMetadata {
    pub title: String,
    pub creators: Vec<Creator>,
    pub description: String,
    pub keywords: Vec<String>,
    pub upload_type: String,
    pub version: String,
    pub access_right: AccessRight,
    pub license: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embargo_date: Option<String>,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_identifiers: Vec<RelatedIdentifier>,
}

/// Body of the metadata PUT: Zenodo expects the block under `metadata`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MetadataDocument {
    pub metadata: DepositionMetadata,
}

/// Parse `name;affiliation;name;affiliation...`.
///
/// A name seen more than once keeps its first position and takes the last
/// affiliation given for it.
pub fn parse_creators(input: &str) -> Result<Vec<Creator>> {
    let mut parts: Vec<&str> = input.split(';').map(str::trim).collect();
    while parts.last().map_or(false, |p| p.is_empty()) {
        parts.pop();
    }
    if parts.len() % 2 != 0 {
        return Err(Error::Validation(format!(
            "creator `{}` has no affiliation",
            parts[parts.len() - 1]
        )));
    }

    let mut creators: Vec<Creator> = Vec::new();
    for pair in parts.chunks(2) {
        let (name, affiliation) = (pair[0], pair[1]);
        if name.is_empty() {
            return Err(Error::Validation("creator name must not be empty".into()));
        }
        match creators.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.affiliation = affiliation.to_string(),
            None => creators.push(Creator {
                name: name.to_string(),
                affiliation: affiliation.to_string(),
            }),
        }
    }
    Ok(creators)
}

pub fn parse_keywords(input: &str) -> Vec<String> {
    input
        .split(';')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

/// An embargo date is required for embargoed records and forbidden for
/// every other access right. Dates are `YYYY-MM-DD`.
pub fn validate_embargo(access_right: AccessRight, embargo_date: &str) -> Result<Option<String>> {
    let date = embargo_date.trim();
    match (access_right, date.is_empty()) {
        (AccessRight::Embargoed, true) => Err(Error::Validation(
            "the 'embargo_date' must be provided when 'access_right' is set to 'embargoed'".into(),
        )),
        (AccessRight::Embargoed, false) => {
            NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                Error::Validation(format!("embargo_date `{}` is not a YYYY-MM-DD date", date))
            })?;
            Ok(Some(date.to_string()))
        }
        (_, true) => Ok(None),
        (other, false) => Err(Error::Validation(format!(
            "the 'embargo_date' must be empty when 'access_right' is set to '{}'",
            other
        ))),
    }
}

pub fn task_link(task: &TaskReference) -> String {
    format!("<a href=\"{}\">GNPS Task link</a>", task.status_url())
}

/// Append the task link to the free-text notes.
pub fn task_link_notes(notes: &str, task: &TaskReference) -> String {
    let link = task_link(task);
    if notes.trim().is_empty() {
        link
    } else {
        format!("{}; {}", notes, link)
    }
}

/// Build the full metadata document for a deposition.
pub fn build_metadata(raw: &RawMetadata, task: &TaskReference) -> Result<MetadataDocument> {
    let access_right: AccessRight = raw.access_right.parse()?;
    let embargo_date = validate_embargo(access_right, &raw.embargo_date)?;
    let creators = parse_creators(&raw.creators)?;
    if creators.is_empty() {
        return Err(Error::Validation("at least one creator is required".into()));
    }

    Ok(MetadataDocument {
        metadata: DepositionMetadata {
            title: raw.title.clone(),
            creators,
            description: raw.description.clone(),
            keywords: parse_keywords(&raw.keywords),
            upload_type: raw.upload_type.clone(),
            version: raw.version.clone(),
            access_right,
            license: raw.license.clone(),
            embargo_date,
            notes: task_link_notes(&raw.notes, task),
            related_identifiers: vec![RelatedIdentifier {
                identifier: task.status_url(),
                relation: "isSupplementTo".into(),
                resource_type: "dataset".into(),
            }],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::DataSource;

    fn task() -> TaskReference {
        TaskReference {
            task_id: "abc123".into(),
            source: DataSource::Gnps2,
        }
    }

    fn raw(access_right: &str, embargo_date: &str) -> RawMetadata {
        RawMetadata {
            title: "Plant extracts".into(),
            creators: "Alice;MIT;Bob;Stanford".into(),
            description: "FBMN run".into(),
            keywords: "lipid; MS2 ;;spectra".into(),
            upload_type: "dataset".into(),
            version: "1.0".into(),
            access_right: access_right.into(),
            license: "cc-by-4.0".into(),
            embargo_date: embargo_date.into(),
            notes: String::new(),
        }
    }

    #[test]
    fn creators_are_paired() {
        let creators = parse_creators("Alice;MIT;Bob;Stanford").unwrap();
        assert_eq!(
            creators,
            vec![
                Creator { name: "Alice".into(), affiliation: "MIT".into() },
                Creator { name: "Bob".into(), affiliation: "Stanford".into() },
            ]
        );
    }

    #[test]
    fn repeated_creator_keeps_last_affiliation() {
        let creators = parse_creators("Alice;MIT;Bob;Stanford;Alice; UCSD ").unwrap();
        assert_eq!(creators.len(), 2);
        assert_eq!(creators[0].name, "Alice");
        assert_eq!(creators[0].affiliation, "UCSD");
        assert_eq!(creators[1].name, "Bob");
    }

    #[test]
    fn trailing_separator_is_ignored() {
        let creators = parse_creators("Alice;MIT;").unwrap();
        assert_eq!(creators.len(), 1);
    }

    #[test]
    fn creator_without_affiliation_is_rejected() {
        let err = parse_creators("Alice;MIT;Bob").unwrap_err();
        assert!(err.to_string().contains("Bob"));
    }

    #[test]
    fn keywords_drop_empty_segments() {
        assert_eq!(parse_keywords("lipid; MS2 ;;spectra"), vec!["lipid", "MS2", "spectra"]);
        assert!(parse_keywords("").is_empty());
    }

    #[test]
    fn open_with_embargo_date_fails() {
        for date in ["2030-01-01", "tomorrow"] {
            let err = build_metadata(&raw("open", date), &task()).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
    }

    #[test]
    fn embargoed_without_date_fails() {
        for date in ["", "   "] {
            let err = build_metadata(&raw("embargoed", date), &task()).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
    }

    #[test]
    fn embargoed_with_date_is_kept() {
        let doc = build_metadata(&raw("embargoed", "2030-06-01"), &task()).unwrap();
        assert_eq!(doc.metadata.embargo_date.as_deref(), Some("2030-06-01"));
        assert_eq!(doc.metadata.access_right, AccessRight::Embargoed);
    }

    #[test]
    fn embargo_date_must_be_a_date() {
        assert!(validate_embargo(AccessRight::Embargoed, "06/01/2030").is_err());
    }

    #[test]
    fn closed_and_restricted_reject_embargo_date() {
        assert!(validate_embargo(AccessRight::Closed, "2030-01-01").is_err());
        assert!(validate_embargo(AccessRight::Restricted, "").unwrap().is_none());
    }

    #[test]
    fn unknown_access_right_fails() {
        assert!(build_metadata(&raw("public", ""), &task()).is_err());
    }

    #[test]
    fn notes_get_task_link() {
        assert_eq!(
            task_link_notes("", &task()),
            "<a href=\"https://gnps2.org/status?task=abc123\">GNPS Task link</a>"
        );
        assert_eq!(
            task_link_notes("Negative mode", &task()),
            "Negative mode; <a href=\"https://gnps2.org/status?task=abc123\">GNPS Task link</a>"
        );
    }

    #[test]
    fn document_serializes_under_metadata_key() {
        let doc = build_metadata(&raw("open", ""), &task()).unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        let metadata = &json["metadata"];
        assert_eq!(metadata["access_right"], "open");
        assert_eq!(metadata["keywords"], serde_json::json!(["lipid", "MS2", "spectra"]));
        assert!(metadata.get("embargo_date").is_none());
        assert_eq!(metadata["related_identifiers"][0]["relation"], "isSupplementTo");
        assert_eq!(
            metadata["related_identifiers"][0]["identifier"],
            "https://gnps2.org/status?task=abc123"
        );
    }
}
