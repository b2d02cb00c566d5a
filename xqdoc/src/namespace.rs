//! Prefix to namespace URI resolution.
//!
//! Prefixed names look in the module's own bindings first, then in the
//! predefined table from [`NamespaceConfig`]. Unprefixed function names
//! fall back to the module's default function namespace and then to
//! [`DEFAULT_FUNCTION_NAMESPACE`]. Unprefixed variables never resolve.
//! A `None` result means the caller drops the name.

use crate::config::NamespaceConfig;
use std::collections::HashMap;
use xqdoc_syntax::QName;

/// Namespace of unprefixed function names when the module declares none.
pub const DEFAULT_FUNCTION_NAMESPACE: &str = "http://www.w3.org/2003/05/xpath-functions";

pub struct NamespaceResolver<'c> {
    config: &'c NamespaceConfig,
    local: HashMap<String, String>,
    default_function_ns: Option<String>,
}

impl<'c> NamespaceResolver<'c> {
    pub fn new(config: &'c NamespaceConfig) -> Self {
        NamespaceResolver {
            config,
            local: HashMap::new(),
            default_function_ns: None,
        }
    }

    /// Bind `prefix` in the module table. The first binding of a prefix
    /// wins; returns `false` when it was already bound.
    pub fn bind(&mut self, prefix: &str, uri: &str) -> bool {
        if self.local.contains_key(prefix) {
            return false;
        }
        self.local.insert(prefix.to_string(), uri.to_string());
        true
    }

    pub fn set_default_function_namespace(&mut self, uri: &str) {
        if self.default_function_ns.is_none() {
            self.default_function_ns = Some(uri.to_string());
        }
    }

    pub fn resolve_prefix(&self, prefix: &str) -> Option<String> {
        self.local
            .get(prefix)
            .map(String::as_str)
            .or_else(|| self.config.lookup(prefix))
            .map(|uri| self.encode(uri))
    }

    pub fn resolve_function(&self, name: &QName) -> Option<String> {
        match (&name.prefix, &name.uri) {
            (Some(prefix), _) => self.resolve_prefix(prefix),
            (None, Some(uri)) => Some(self.encode(uri)),
            (None, None) => {
                let uri = self
                    .default_function_ns
                    .as_deref()
                    .unwrap_or(DEFAULT_FUNCTION_NAMESPACE);
                Some(self.encode(uri))
            }
        }
    }

    pub fn resolve_variable(&self, name: &QName) -> Option<String> {
        match (&name.prefix, &name.uri) {
            (Some(prefix), _) => self.resolve_prefix(prefix),
            (None, Some(uri)) => Some(self.encode(uri)),
            (None, None) => None,
        }
    }

    fn encode(&self, uri: &str) -> String {
        if self.config.encode_uris {
            uri.replace('/', "~2F")
        } else {
            uri.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xqdoc_syntax::Span;

    fn name(text: &str) -> QName {
        QName::parse(text, Span::default())
    }

    #[test]
    fn local_binding_shadows_predefined() {
        let config = NamespaceConfig::default();
        let mut resolver = NamespaceResolver::new(&config);
        assert!(resolver.bind("fn", "urn:mine"));
        assert_eq!(resolver.resolve_prefix("fn").as_deref(), Some("urn:mine"));
        assert_eq!(
            resolver.resolve_prefix("xs").as_deref(),
            Some("http://www.w3.org/2001/XMLSchema")
        );
    }

    #[test]
    fn first_binding_wins() {
        let config = NamespaceConfig::default();
        let mut resolver = NamespaceResolver::new(&config);
        assert!(resolver.bind("a", "urn:first"));
        assert!(!resolver.bind("a", "urn:second"));
        assert_eq!(resolver.resolve_prefix("a").as_deref(), Some("urn:first"));
    }

    #[test]
    fn unknown_prefix_is_unresolved() {
        let config = NamespaceConfig::default();
        let resolver = NamespaceResolver::new(&config);
        assert_eq!(resolver.resolve_function(&name("nope:f")), None);
        assert_eq!(resolver.resolve_variable(&name("nope:v")), None);
    }

    #[test]
    fn unprefixed_function_uses_defaults() {
        let config = NamespaceConfig::default();
        let mut resolver = NamespaceResolver::new(&config);
        assert_eq!(
            resolver.resolve_function(&name("count")).as_deref(),
            Some(DEFAULT_FUNCTION_NAMESPACE)
        );
        resolver.set_default_function_namespace("urn:default");
        resolver.set_default_function_namespace("urn:ignored");
        assert_eq!(resolver.resolve_function(&name("count")).as_deref(), Some("urn:default"));
    }

    #[test]
    fn unprefixed_variable_never_resolves() {
        let config = NamespaceConfig::default();
        let mut resolver = NamespaceResolver::new(&config);
        resolver.set_default_function_namespace("urn:default");
        assert_eq!(resolver.resolve_variable(&name("x")), None);
    }

    #[test]
    fn uri_qualified_names_resolve_directly() {
        let config = NamespaceConfig::default();
        let resolver = NamespaceResolver::new(&config);
        assert_eq!(
            resolver.resolve_variable(&name("Q{urn:v}x")).as_deref(),
            Some("urn:v")
        );
    }

    #[test]
    fn encoding_replaces_slashes() {
        let config = NamespaceConfig {
            encode_uris: true,
            ..NamespaceConfig::default()
        };
        let resolver = NamespaceResolver::new(&config);
        assert_eq!(
            resolver.resolve_prefix("xs").as_deref(),
            Some("http:~2F~2Fwww.w3.org~2F2001~2FXMLSchema")
        );
    }
}
