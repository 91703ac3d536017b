//! The three administrative tools built on the shared engine.
//!
//! - [`directory`] drives an external directory-administration binary.
//! - [`quality`] talks to a code-quality platform's Web API.
//! - [`forge`] talks to a source forge's REST API v4.

pub mod directory;
pub mod forge;
pub mod quality;

use crate::error::AdminError;
use reqwest::Url;
use serde::de::DeserializeOwned;

/// Joins `segments` onto `base`, percent-encoding each one, then appends `query`.
///
/// A segment such as `infra/dns` becomes `infra%2Fdns`, which is how REST
/// APIs address namespaced resources by path.
pub(crate) fn api_url(
    base: &str,
    segments: &[&str],
    query: &[(&str, &str)],
) -> Result<String, AdminError> {
    let mut url = Url::parse(base)
        .map_err(|e| AdminError::Precondition(format!("invalid endpoint '{}': {}", base, e)))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| AdminError::Precondition(format!("endpoint '{}' cannot be a base URL", base)))?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }
    Ok(url.to_string())
}

/// Decodes a successful JSON body into a typed view.
pub(crate) fn decode<T: DeserializeOwned>(body: &str, what: &str) -> Result<T, AdminError> {
    serde_json::from_str(body).map_err(|e| AdminError::Output(format!("unexpected {} response: {}", what, e)))
}
