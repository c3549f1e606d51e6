//! Fetch requests and the page -> URL/filename mapping
//!
//! Every page a session fetches is described by a `FetchRequest` built here.
//! Keeping the mapping in plain functions means URL and filename generation can
//! be checked without touching the network.

use crate::config::{Config, SessionConfig};
use crate::{ConfigError, HarvestError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use url::Url;

/// One parameter set for parameterized sessions (key order is stable)
pub type ParamSet = BTreeMap<String, String>;

/// Identifies one page to retrieve
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Page number (sequential) or 1-based parameter-set index
    pub page_id: String,

    /// Fully constructed target URL
    pub url: Url,

    /// Destination filename inside the session directory
    pub filename: String,

    /// Retries allowed after the first attempt
    pub max_retries: u32,
}

/// Builds `FetchRequest`s from the session configuration
#[derive(Debug, Clone)]
pub struct RequestBuilder<'a> {
    base_url: &'a str,
    session: &'a SessionConfig,
    max_retries: u32,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            base_url: &config.scraper.base_url,
            session: &config.session,
            max_retries: config.scraper.max_retries,
        }
    }

    /// Request for page `page` of a sequential session
    pub fn sequential(&self, page: u32) -> Result<FetchRequest> {
        let page = page.to_string();
        let path = self.session.path_template.replace("{page}", &page);

        Ok(FetchRequest {
            url: build_url(self.base_url, &path)?,
            filename: filename_for(&self.session.filename_template, "{page}", &page),
            page_id: page,
            max_retries: self.max_retries,
        })
    }

    /// Request for the `index`-th (1-based) parameter set
    ///
    /// Parameters matching a `{name}` placeholder in the path template are
    /// substituted into the path; the rest become query pairs in key order.
    /// Substituted values are percent-encoded, so a value never spans more
    /// than its own path segment.
    pub fn parameterized(&self, index: usize, params: &ParamSet) -> Result<FetchRequest> {
        let mut used = BTreeSet::new();
        let segments: Vec<String> = self
            .session
            .param_path_template
            .split('/')
            .map(|segment| fill_segment(segment, params, &mut used))
            .collect();

        let mut url = join_segments(self.base_url, &segments)?;
        let query: Vec<_> = params
            .iter()
            .filter(|(key, _)| !used.contains(key.as_str()))
            .collect();
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        let index = index.to_string();
        Ok(FetchRequest {
            url,
            filename: filename_for(&self.session.param_filename_template, "{index}", &index),
            page_id: index,
            max_retries: self.max_retries,
        })
    }
}

/// Joins a path fragment onto the base URL
///
/// The fragment is appended after the base path rather than resolved against
/// it, so `https://example.test/p` + `2` gives `https://example.test/p/2`.
/// Anything after a `?` in the fragment becomes the query string.
pub fn build_url(base_url: &str, path: &str) -> Result<Url> {
    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };

    let mut url = join_segments(base_url, path.split('/'))?;
    if let Some(query) = query {
        url.set_query(Some(query));
    }
    Ok(url)
}

/// Appends path segments to the base URL, percent-encoding each one
fn join_segments<I>(base_url: &str, segments: I) -> Result<Url>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut url = Url::parse(base_url)?;
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must not carry a query or fragment",
            base_url
        ))
        .into());
    }

    {
        let mut path = url.path_segments_mut().map_err(|_| {
            ConfigError::InvalidUrl(format!("base-url '{}' cannot take a path", base_url))
        })?;
        path.pop_if_empty();
        for segment in segments {
            let segment = segment.as_ref();
            if !segment.is_empty() {
                path.push(segment);
            }
        }
    }

    Ok(url)
}

/// Replaces `{key}` placeholders in one path segment with parameter values
///
/// Values are inserted verbatim and never rescanned. Unknown placeholders
/// are left as written. Keys that were substituted are added to `used`.
fn fill_segment(segment: &str, params: &ParamSet, used: &mut BTreeSet<String>) -> String {
    let mut filled = String::with_capacity(segment.len());
    let mut rest = segment;

    while let Some(open) = rest.find('{') {
        filled.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            filled.push_str(&rest[open..]);
            return filled;
        };

        let key = &after[..close];
        match params.get(key) {
            Some(value) => {
                filled.push_str(value);
                used.insert(key.to_string());
            }
            None => filled.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }

    filled.push_str(rest);
    filled
}

/// Substitutes `value` for `placeholder` in a filename template
pub fn filename_for(template: &str, placeholder: &str, value: &str) -> String {
    template.replace(placeholder, value)
}

#[derive(Debug, Deserialize)]
struct ParamFile {
    #[serde(default)]
    set: Vec<BTreeMap<String, toml::Value>>,
}

/// Loads parameter sets from a TOML file of `[[set]]` tables
///
/// Non-string values are written using their TOML representation, so
/// `page = 3` becomes `"3"`.
pub fn load_param_sets(path: &Path) -> Result<Vec<ParamSet>> {
    let content = std::fs::read_to_string(path)?;
    parse_param_sets(&content)
}

pub fn parse_param_sets(content: &str) -> Result<Vec<ParamSet>> {
    let file: ParamFile =
        toml::from_str(content).map_err(|e| HarvestError::InvalidParams(e.to_string()))?;

    if file.set.is_empty() {
        return Err(HarvestError::InvalidParams(
            "no [[set]] tables found".to_string(),
        ));
    }

    file.set
        .into_iter()
        .enumerate()
        .map(|(i, table)| {
            table
                .into_iter()
                .map(|(key, value)| match value {
                    toml::Value::String(s) => Ok((key, s)),
                    toml::Value::Integer(_) | toml::Value::Float(_) | toml::Value::Boolean(_) => {
                        Ok((key, value.to_string()))
                    }
                    other => Err(HarvestError::InvalidParams(format!(
                        "set {} key '{}' has unsupported type {}",
                        i + 1,
                        key,
                        other.type_str()
                    ))),
                })
                .collect()
        })
        .collect()
}
