//! Syntax tree for a single XQuery module.
//!
//! The tree only models what a documentation pass needs: prolog
//! declarations in full, and expressions reduced to the calls, variable
//! references and nesting that appear in them. Every node carries a
//! [`Span`] into the source buffer owned by [`Module`].

use std::fmt;

/// Half-open byte range `[start, end)` into the module source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A qualified name as written in the source.
///
/// `prefix:local`, a bare `local`, or a URI-qualified `Q{uri}local`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: Option<String>,
    /// Namespace written inline with the `Q{uri}local` syntax.
    pub uri: Option<String>,
    pub local: String,
    pub span: Span,
}

impl QName {
    /// Split lexical name text on the first `:`.
    pub fn parse(text: &str, span: Span) -> QName {
        if let Some(rest) = text.strip_prefix("Q{") {
            if let Some(close) = rest.find('}') {
                return QName {
                    prefix: None,
                    uri: Some(rest[..close].to_string()),
                    local: rest[close + 1..].to_string(),
                    span,
                };
            }
        }
        match text.split_once(':') {
            Some((prefix, local)) => QName {
                prefix: Some(prefix.to_string()),
                uri: None,
                local: local.to_string(),
                span,
            },
            None => QName {
                prefix: None,
                uri: None,
                local: text.to_string(),
                span,
            },
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.prefix, &self.uri) {
            (Some(prefix), _) => write!(f, "{}:{}", prefix, self.local),
            (None, Some(uri)) => write!(f, "Q{{{}}}{}", uri, self.local),
            (None, None) => f.write_str(&self.local),
        }
    }
}

/// Raw text of a `(:~ … :)` block, delimiters included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocComment {
    pub text: String,
    pub span: Span,
}

/// A parsed module: the source buffer plus its tree.
#[derive(Debug, Clone)]
pub struct Module {
    source: String,
    pub kind: ModuleKind,
    /// Doc comment placed before the module / version declaration.
    pub doc: Option<DocComment>,
    pub decls: Vec<Decl>,
    /// Query body of a main module. Always `None` for library modules.
    pub body: Option<QueryBody>,
    pub span: Span,
}

impl Module {
    pub fn new(
        source: impl Into<String>,
        kind: ModuleKind,
        doc: Option<DocComment>,
        decls: Vec<Decl>,
        body: Option<QueryBody>,
    ) -> Module {
        let source = source.into();
        let trimmed_start = source.len() - source.trim_start().len();
        let span = Span::new(trimmed_start, source.trim_end().len().max(trimmed_start));
        Module {
            source,
            kind,
            doc,
            decls,
            body,
            span,
        }
    }

    /// Exact source text covered by `span`, or `None` when the span does
    /// not fall on character boundaries inside the buffer.
    pub fn slice(&self, span: Span) -> Option<&str> {
        if span.start > span.end {
            return None;
        }
        self.source.get(span.start..span.end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleKind {
    Library(ModuleDecl),
    Main,
}

/// `module namespace prefix = "uri";`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecl {
    pub prefix: String,
    pub uri: String,
    pub span: Span,
}

/// One prolog declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decl {
    DefaultFunctionNamespace(DefaultNamespaceDecl),
    Namespace(NamespaceDecl),
    SchemaImport(ImportDecl),
    ModuleImport(ImportDecl),
    Variable(VarDecl),
    Function(FunctionDecl),
    Option(OptionDecl),
    /// Any other `declare …;` setter (boundary-space, ordering, …).
    Setter(SetterDecl),
}

impl Decl {
    pub fn doc(&self) -> Option<&DocComment> {
        match self {
            Decl::DefaultFunctionNamespace(d) => d.doc.as_ref(),
            Decl::Namespace(d) => d.doc.as_ref(),
            Decl::SchemaImport(d) | Decl::ModuleImport(d) => d.doc.as_ref(),
            Decl::Variable(d) => d.doc.as_ref(),
            Decl::Function(d) => d.doc.as_ref(),
            Decl::Option(d) => d.doc.as_ref(),
            Decl::Setter(d) => d.doc.as_ref(),
        }
    }
}

/// `declare default function namespace "uri";`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultNamespaceDecl {
    pub uri: String,
    pub doc: Option<DocComment>,
    pub span: Span,
}

/// `declare namespace prefix = "uri";`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDecl {
    pub prefix: String,
    pub uri: String,
    pub doc: Option<DocComment>,
    pub span: Span,
}

/// `import schema …` or `import module …`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    /// Bound prefix; `None` for `default element namespace` or bare imports.
    pub prefix: Option<String>,
    pub uri: String,
    /// `at` location hints, in source order.
    pub locations: Vec<String>,
    pub doc: Option<DocComment>,
    pub span: Span,
}

/// `declare %ann variable $name as type := expr;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub name: QName,
    pub annotations: Vec<Annotation>,
    pub type_decl: Option<SequenceType>,
    /// Initializer (or default value of an external variable).
    pub init: Option<Vec<Expr>>,
    pub doc: Option<DocComment>,
    pub span: Span,
}

/// `declare %ann function name($p as t, …) as t { … }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDecl {
    pub name: QName,
    pub annotations: Vec<Annotation>,
    pub params: Vec<Param>,
    /// Text between the parentheses of the parameter list, if non-empty.
    pub params_span: Option<Span>,
    pub return_type: Option<SequenceType>,
    /// `as …` return clause, keyword included.
    pub return_span: Option<Span>,
    pub body: FunctionBody,
    /// From the first annotation (or `function`) to the end of the body.
    pub span: Span,
    pub doc: Option<DocComment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionBody {
    Block { exprs: Vec<Expr>, span: Span },
    External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: QName,
    pub type_decl: Option<SequenceType>,
}

/// `%name` or `%name(literal, …)`. Bare `updating` / `private` modifiers
/// are represented as annotations without literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub name: QName,
    pub literals: Vec<Span>,
    pub span: Span,
}

/// `declare option name "value";`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDecl {
    pub name: QName,
    pub value: String,
    pub doc: Option<DocComment>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetterDecl {
    /// Keyword following `declare`, e.g. `boundary-space`.
    pub keyword: String,
    pub doc: Option<DocComment>,
    pub span: Span,
}

/// `item-type occurrence?`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceType {
    /// Item type text with all whitespace removed.
    pub item_type: String,
    pub occurrence: Option<Occurrence>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Occurrence {
    pub fn as_str(self) -> &'static str {
        match self {
            Occurrence::ZeroOrOne => "?",
            Occurrence::ZeroOrMore => "*",
            Occurrence::OneOrMore => "+",
        }
    }
}

/// Query body of a main module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBody {
    pub exprs: Vec<Expr>,
}

/// Expression nodes relevant to cross-referencing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// `name(args…)`
    Call {
        name: QName,
        args: Vec<Expr>,
        span: Span,
    },
    /// `$name` used as a value.
    VarRef { name: QName, span: Span },
    /// `$name` introduced by `for`, `let`, `some`, `every` or `at`.
    Binding { name: QName, span: Span },
    /// Parenthesised, bracketed or braced sub-expression, including the
    /// enclosed expressions of direct constructors.
    Group { items: Vec<Expr>, span: Span },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Call { span, .. }
            | Expr::VarRef { span, .. }
            | Expr::Binding { span, .. }
            | Expr::Group { span, .. } => *span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qname_prefixed() {
        let name = QName::parse("functx:trim", Span::new(0, 11));
        assert_eq!(name.prefix.as_deref(), Some("functx"));
        assert_eq!(name.local, "trim");
        assert_eq!(name.to_string(), "functx:trim");
    }

    #[test]
    fn qname_unprefixed() {
        let name = QName::parse("count", Span::default());
        assert!(name.prefix.is_none());
        assert_eq!(name.local, "count");
    }

    #[test]
    fn qname_uri_qualified() {
        let name = QName::parse("Q{http://example.com/ns}f", Span::default());
        assert!(name.prefix.is_none());
        assert_eq!(name.uri.as_deref(), Some("http://example.com/ns"));
        assert_eq!(name.local, "f");
    }

    #[test]
    fn module_slice_rejects_out_of_range() {
        let module = Module::new("1 + 2", ModuleKind::Main, None, vec![], None);
        assert_eq!(module.slice(Span::new(0, 1)), Some("1"));
        assert_eq!(module.slice(Span::new(3, 99)), None);
        assert_eq!(module.slice(Span::new(4, 2)), None);
    }

    #[test]
    fn module_span_skips_surrounding_whitespace() {
        let module = Module::new("\n  1 + 2 \n", ModuleKind::Main, None, vec![], None);
        assert_eq!(module.slice(module.span), Some("1 + 2"));
    }
}
