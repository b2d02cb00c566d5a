//! Data model for an assembled xqDoc document, independent of output format.

use crate::comment::TaggedComment;
use std::collections::HashSet;
use xqdoc_syntax::Occurrence;

/// Everything documented about one module.
#[derive(Debug)]
pub struct ModuleDoc {
    pub kind: ModuleKind,
    pub comment: Option<TaggedComment>,
    /// Full module source, surrounding whitespace trimmed
    pub body: String,
    pub imports: Vec<ImportDoc>,
    pub namespaces: Vec<NamespaceBinding>,
    pub variables: Vec<VariableDoc>,
    pub functions: Vec<FunctionDoc>,
    /// Calls made from a main module's query body
    pub invoked: References,
    /// Variables referenced from a main module's query body
    pub ref_variables: References,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleKind {
    Main,
    Library { uri: String, prefix: String },
}

impl ModuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Main => "main",
            ModuleKind::Library { .. } => "library",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Schema,
    Library,
}

impl ImportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportKind::Schema => "schema",
            ImportKind::Library => "library",
        }
    }
}

#[derive(Debug)]
pub struct ImportDoc {
    pub uri: String,
    pub kind: ImportKind,
    /// First `at` location hint
    pub location: Option<String>,
    pub comment: Option<TaggedComment>,
}

/// `declare namespace` binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceBinding {
    pub prefix: String,
    pub uri: String,
}

#[derive(Debug)]
pub struct VariableDoc {
    pub uri: String,
    pub name: String,
    pub comment: Option<TaggedComment>,
    pub annotations: Vec<AnnotationDoc>,
    pub type_doc: Option<TypeDoc>,
}

#[derive(Debug)]
pub struct FunctionDoc {
    /// Local part of the function name
    pub name: String,
    pub comment: Option<TaggedComment>,
    pub annotations: Vec<AnnotationDoc>,
    /// `declare function name(params) as type`, built from source text
    pub signature: String,
    pub parameters: Vec<ParameterDoc>,
    pub return_type: Option<TypeDoc>,
    pub invoked: References,
    pub ref_variables: References,
    /// Declaration source from the first annotation to the closing brace
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationDoc {
    pub name: String,
    /// Literal arguments, verbatim source text
    pub literals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDoc {
    /// Parameter name without the leading `$`
    pub name: String,
    pub type_doc: Option<TypeDoc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDoc {
    pub item_type: String,
    pub occurrence: Option<Occurrence>,
}

/// A resolved function or variable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub uri: String,
    pub name: String,
}

/// Set of references that remembers first-seen order.
#[derive(Debug, Default)]
pub struct References {
    entries: Vec<Reference>,
    seen: HashSet<Reference>,
}

impl References {
    /// Record a reference; returns `false` for a duplicate.
    pub fn insert(&mut self, uri: String, name: String) -> bool {
        let reference = Reference { uri, name };
        if self.seen.contains(&reference) {
            return false;
        }
        self.seen.insert(reference.clone());
        self.entries.push(reference);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reference> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
