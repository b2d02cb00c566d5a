//! Namespace configuration: the predefined prefix table and URI encoding.
//!
//! A table starts from a [`Preset`] and is then adjusted by an optional
//! TOML file and `prefix=uri` pairs, each layer overriding the previous one.

use crate::error::{Error, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static RE_NCNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}_][\p{L}\p{N}_.\-]*$").unwrap());

const W3C_NAMESPACES: &[(&str, &str)] = &[
    ("fn", "http://www.w3.org/2003/05/xpath-functions"),
    ("local", "http://www.w3.org/2005/xquery-local-functions"),
    ("xs", "http://www.w3.org/2001/XMLSchema"),
    ("xsi", "http://www.w3.org/2001/XMLSchema-instance"),
    ("xml", "http://www.w3.org/XML/1998/namespace"),
    ("err", "http://www.w3.org/2005/xqt-errors"),
    ("math", "http://www.w3.org/2005/xpath-functions/math"),
    ("map", "http://www.w3.org/2005/xpath-functions/map"),
    ("array", "http://www.w3.org/2005/xpath-functions/array"),
    ("output", "http://www.w3.org/2010/xslt-xquery-serialization"),
];

const MARKLOGIC_NAMESPACES: &[(&str, &str)] = &[
    ("cts", "http://marklogic.com/cts"),
    ("dav", "DAV:"),
    ("dbg", "http://marklogic.com/xdmp/debug"),
    ("dir", "http://marklogic.com/xdmp/directory"),
    ("error", "http://marklogic.com/xdmp/error"),
    ("lock", "http://marklogic.com/xdmp/lock"),
    ("map", "http://marklogic.com/xdmp/map"),
    ("math", "http://marklogic.com/xdmp/math"),
    ("prof", "http://marklogic.com/xdmp/profile"),
    ("prop", "http://marklogic.com/xdmp/property"),
    ("sec", "http://marklogic.com/xdmp/security"),
    ("sem", "http://marklogic.com/semantics"),
    ("spell", "http://marklogic.com/xdmp/spell"),
    ("xdmp", "http://marklogic.com/xdmp"),
    ("xmlns", "http://www.w3.org/2000/xmlns/"),
    ("xqe", "http://marklogic.com/xqe"),
    ("xqterr", "http://www.w3.org/2005/xqt-errors"),
];

const EXIST_NAMESPACES: &[(&str, &str)] = &[
    ("lucene", "http://exist-db.org/xquery/lucene"),
    ("ngram", "http://exist-db.org/xquery/ngram"),
    ("sort", "http://exist-db.org/xquery/sort"),
    ("range", "http://exist-db.org/xquery/range"),
    ("spatial", "http://exist-db.org/xquery/spatial"),
    ("inspection", "http://exist-db.org/xquery/inspection"),
    ("mail", "http://exist-db.org/xquery/mail"),
    ("request", "http://exist-db.org/xquery/request"),
    ("response", "http://exist-db.org/xquery/response"),
    ("sm", "http://exist-db.org/xquery/securitymanager"),
    ("session", "http://exist-db.org/xquery/session"),
    ("system", "http://exist-db.org/xquery/system"),
    ("transform", "http://exist-db.org/xquery/transform"),
    ("util", "http://exist-db.org/xquery/util"),
    ("validation", "http://exist-db.org/xquery/validation"),
    ("xmldb", "http://exist-db.org/xquery/xmldb"),
    ("process", "http://exist-db.org/xquery/process"),
];

/// Built-in prefix tables for the processors xqDoc is commonly run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Preset {
    /// Standard W3C prefixes only
    #[default]
    W3c,
    /// MarkLogic Server built-in modules
    Marklogic,
    /// eXist-db extension modules
    Exist,
}

/// Layout of a `--namespaces` file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct NamespaceFile {
    #[serde(default)]
    namespaces: HashMap<String, String>,
    encode_uris: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Predefined prefix table, consulted after the module's own bindings.
    pub prefixes: HashMap<String, String>,
    /// Replace `/` in resolved URIs with `~2F`.
    pub encode_uris: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self::preset(Preset::default())
    }
}

impl NamespaceConfig {
    pub fn preset(preset: Preset) -> Self {
        let extra = match preset {
            Preset::W3c => &[][..],
            Preset::Marklogic => MARKLOGIC_NAMESPACES,
            Preset::Exist => EXIST_NAMESPACES,
        };
        let prefixes = W3C_NAMESPACES
            .iter()
            .chain(extra)
            .map(|(prefix, uri)| (prefix.to_string(), uri.to_string()))
            .collect();
        NamespaceConfig {
            prefixes,
            encode_uris: false,
        }
    }

    pub fn lookup(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    /// Add or override one binding given as `prefix=uri`.
    pub fn define(&mut self, pair: &str) -> Result<()> {
        let (prefix, uri) = pair
            .split_once('=')
            .ok_or_else(|| Error::config(format!("expected prefix=uri, got '{}'", pair)))?;
        self.insert(prefix.trim(), uri.trim())
    }

    /// Merge the contents of a TOML namespace file.
    pub fn merge_toml(&mut self, text: &str) -> Result<()> {
        let file: NamespaceFile = toml::from_str(text)?;
        for (prefix, uri) in &file.namespaces {
            self.insert(prefix, uri)?;
        }
        if let Some(encode) = file.encode_uris {
            self.encode_uris = encode;
        }
        Ok(())
    }

    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path)?;
        self.merge_toml(&text)
    }

    fn insert(&mut self, prefix: &str, uri: &str) -> Result<()> {
        if !RE_NCNAME.is_match(prefix) {
            return Err(Error::config(format!("invalid namespace prefix '{}'", prefix)));
        }
        if uri.is_empty() {
            return Err(Error::config(format!("empty namespace URI for prefix '{}'", prefix)));
        }
        self.prefixes.insert(prefix.to_string(), uri.to_string());
        Ok(())
    }
}
