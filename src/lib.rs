// Library root
// ------------
// Two small command-line tools are built on this crate:
// - `gnps-fetch` downloads the result archive of a GNPS task.
// - `zenodo-deposit` deposits a file with its metadata on Zenodo, either as
//   a new record or as a new version of an existing one.
//
// Module responsibilities:
// - `params`: the YAML parameter file, endpoints and token lookup.
// - `metadata`: typed Zenodo metadata built from the parameters.
// - `api`: blocking Zenodo deposition client.
// - `deposit`: the create/upload/metadata/publish sequence.
// - `fetch`: streaming download of task results.
// - `log`: the run log handed to each operation.
// - `ui`: terminal progress bars.
pub mod api;
pub mod deposit;
pub mod error;
pub mod fetch;
pub mod log;
pub mod metadata;
pub mod params;
pub mod ui;

pub use error::{Error, Result, Step};
