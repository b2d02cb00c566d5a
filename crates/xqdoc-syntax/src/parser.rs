//! Recursive-descent parser for XQuery modules.
//!
//! The prolog is parsed declaration by declaration. Expressions are only
//! parsed as far as a documenter needs them: nesting, function calls and
//! variable references. Everything else is stepped over token by token.

use crate::ast::{
    Annotation, Decl, DefaultNamespaceDecl, DocComment, Expr, FunctionBody, FunctionDecl,
    ImportDecl, Module, ModuleDecl, ModuleKind, NamespaceDecl, Occurrence, OptionDecl, Param,
    QName, QueryBody, SequenceType, SetterDecl, Span, VarDecl,
};
use crate::error::{Result, SyntaxError};
use crate::scanner::{tokenize, Token, TokenKind};

/// Names that are followed by `(` without being function calls.
const RESERVED_FUNCTION_NAMES: &[&str] = &[
    "array",
    "attribute",
    "comment",
    "document-node",
    "element",
    "empty-sequence",
    "function",
    "if",
    "item",
    "map",
    "namespace-node",
    "node",
    "processing-instruction",
    "schema-attribute",
    "schema-element",
    "switch",
    "text",
    "typeswitch",
];

/// Unprefixed keywords that may directly precede a parenthesised expression.
const EXPR_KEYWORDS: &[&str] = &[
    "return", "where", "and", "or", "then", "else", "in", "satisfies", "div", "idiv", "mod",
    "to", "eq", "ne", "lt", "le", "gt", "ge", "is", "union", "intersect", "except", "case",
    "default", "as", "of", "by", "at", "let", "for", "some", "every", "order", "stable",
    "ascending", "descending", "instance", "treat", "cast", "castable",
    // window clauses
    "when", "start", "end", "only", "previous", "next",
    // try/catch and update expressions
    "catch", "modify", "into", "with", "before", "after", "nodes",
];

/// Keywords after which `$name` introduces a new variable.
const BINDING_KEYWORDS: &[&str] = &["for", "let", "some", "every", "at", "count"];

/// Parse a complete module.
pub fn parse(source: &str) -> Result<Module> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        src: source,
        tokens,
        pos: 0,
    };
    let (kind, doc, decls, body) = parser.module()?;
    Ok(Module::new(source, kind, doc, decls, body))
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    // -- Token helpers --------------------------------------------------------

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn nth(&self, n: usize) -> Option<Token> {
        self.tokens.get(self.pos + n).copied()
    }

    fn text(&self, tok: Token) -> &'a str {
        tok.text(self.src)
    }

    fn nth_is_name(&self, n: usize, name: &str) -> bool {
        self.nth(n)
            .is_some_and(|t| t.kind == TokenKind::Name && self.text(t) == name)
    }

    fn at_name(&self, name: &str) -> bool {
        self.nth_is_name(0, name)
    }

    fn at_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    fn at_symbol(&self, symbol: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Symbol && self.text(t) == symbol)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.peek()?;
        self.pos += 1;
        Some(tok)
    }

    fn error_here(&self, message: impl Into<String>) -> SyntaxError {
        let offset = self.peek().map_or(self.src.len(), |t| t.span.start);
        SyntaxError::at(self.src, offset, message)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token> {
        match self.peek() {
            Some(t) if t.kind == kind => {
                self.pos += 1;
                Ok(t)
            }
            Some(t) => Err(self.error_here(format!(
                "expected {}, found '{}'",
                what,
                self.text(t)
            ))),
            None => Err(self.error_here(format!("expected {}, found end of input", what))),
        }
    }

    fn expect_name(&mut self, name: &str) -> Result<Token> {
        if self.at_name(name) {
            self.expect(TokenKind::Name, name)
        } else {
            Err(self.error_here(format!("expected '{}'", name)))
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<Token> {
        if self.at_symbol(symbol) {
            self.expect(TokenKind::Symbol, symbol)
        } else {
            Err(self.error_here(format!("expected '{}'", symbol)))
        }
    }

    fn expect_qname(&mut self, what: &str) -> Result<QName> {
        let tok = self.expect(TokenKind::Name, what)?;
        Ok(QName::parse(self.text(tok), tok.span))
    }

    fn expect_string(&mut self, what: &str) -> Result<String> {
        let tok = self.expect(TokenKind::StringLit, what)?;
        Ok(string_value(self.text(tok)))
    }

    fn expect_semicolon(&mut self) -> Result<Token> {
        self.expect(TokenKind::Semicolon, "';'")
    }

    /// Consume a run of doc comments, keeping the last.
    fn doc_comments(&mut self) -> Option<DocComment> {
        let mut doc = None;
        while let Some(tok) = self.peek().filter(|t| t.kind == TokenKind::DocComment) {
            self.pos += 1;
            doc = Some(DocComment {
                text: self.text(tok).to_string(),
                span: tok.span,
            });
        }
        doc
    }

    // -- Module structure -----------------------------------------------------

    /// Leading doc comments of a module. When the first prolog item is
    /// a function or variable declaration, the comment right before it is
    /// left for that declaration.
    fn leading_doc(&mut self) -> Option<DocComment> {
        let run = self.tokens[self.pos..]
            .iter()
            .take_while(|t| t.kind == TokenKind::DocComment)
            .count();
        let take = if run > 0 && self.documented_decl_at(run) {
            run - 1
        } else {
            run
        };

        let mut doc = None;
        for tok in &self.tokens[self.pos..self.pos + take] {
            doc = Some(DocComment {
                text: self.text(*tok).to_string(),
                span: tok.span,
            });
        }
        self.pos += take;
        doc
    }

    /// Whether the `n`th token starts a function or variable declaration.
    fn documented_decl_at(&self, n: usize) -> bool {
        if !self.nth_is_name(n, "declare") {
            return false;
        }
        ["function", "variable", "updating", "private"]
            .iter()
            .any(|kw| self.nth_is_name(n + 1, kw))
            || self.nth(n + 1).is_some_and(|t| t.kind == TokenKind::Percent)
    }

    #[allow(clippy::type_complexity)]
    fn module(
        &mut self,
    ) -> Result<(ModuleKind, Option<DocComment>, Vec<Decl>, Option<QueryBody>)> {
        let mut doc = self.leading_doc();
        if self.at_name("xquery") && (self.nth_is_name(1, "version") || self.nth_is_name(1, "encoding"))
        {
            self.skip_statement()?;
            doc = self.leading_doc().or(doc);
        }

        let kind = if self.at_name("module") && self.nth_is_name(1, "namespace") {
            ModuleKind::Library(self.module_decl()?)
        } else {
            doc = self.leading_doc().or(doc);
            ModuleKind::Main
        };

        let decls = self.prolog()?;

        let body = match kind {
            ModuleKind::Library(_) => {
                self.doc_comments();
                if self.peek().is_some() {
                    return Err(self.error_here("unexpected content after library module prolog"));
                }
                None
            }
            ModuleKind::Main => self.query_body()?,
        };
        Ok((kind, doc, decls, body))
    }

    fn module_decl(&mut self) -> Result<ModuleDecl> {
        let start = self.expect_name("module")?.span.start;
        self.expect_name("namespace")?;
        let prefix = self.expect(TokenKind::Name, "module prefix")?;
        self.expect_symbol("=")?;
        let uri = self.expect_string("module namespace URI")?;
        let end = self.expect_semicolon()?.span.end;
        Ok(ModuleDecl {
            prefix: self.text(prefix).to_string(),
            uri,
            span: Span::new(start, end),
        })
    }

    fn prolog(&mut self) -> Result<Vec<Decl>> {
        let mut decls = Vec::new();
        loop {
            let doc = self.doc_comments();
            let is_declare = self.at_name("declare")
                && self
                    .nth(1)
                    .is_some_and(|t| matches!(t.kind, TokenKind::Name | TokenKind::Percent));
            let is_import = self.at_name("import")
                && (self.nth_is_name(1, "schema") || self.nth_is_name(1, "module"));
            if is_declare {
                decls.push(self.declaration(doc)?);
            } else if is_import {
                decls.push(self.import(doc)?);
            } else {
                return Ok(decls);
            }
        }
    }

    fn query_body(&mut self) -> Result<Option<QueryBody>> {
        let has_body = self.tokens[self.pos..]
            .iter()
            .any(|t| t.kind != TokenKind::DocComment);
        if !has_body {
            self.pos = self.tokens.len();
            return Ok(None);
        }
        Ok(Some(QueryBody {
            exprs: self.exprs(None)?,
        }))
    }

    // -- Declarations ---------------------------------------------------------

    fn declaration(&mut self, doc: Option<DocComment>) -> Result<Decl> {
        let start = self.expect_name("declare")?.span.start;

        if self.at_name("default") && self.nth_is_name(1, "function") && self.nth_is_name(2, "namespace")
        {
            self.pos += 3;
            let uri = self.expect_string("default function namespace URI")?;
            let end = self.expect_semicolon()?.span.end;
            return Ok(Decl::DefaultFunctionNamespace(DefaultNamespaceDecl {
                uri,
                doc,
                span: Span::new(start, end),
            }));
        }
        if self.at_name("namespace") {
            self.pos += 1;
            let prefix = self.expect(TokenKind::Name, "namespace prefix")?;
            self.expect_symbol("=")?;
            let uri = self.expect_string("namespace URI")?;
            let end = self.expect_semicolon()?.span.end;
            return Ok(Decl::Namespace(NamespaceDecl {
                prefix: self.text(prefix).to_string(),
                uri,
                doc,
                span: Span::new(start, end),
            }));
        }
        if self.at_name("option") {
            self.pos += 1;
            let name = self.expect_qname("option name")?;
            let value = self.expect_string("option value")?;
            let end = self.expect_semicolon()?.span.end;
            return Ok(Decl::Option(OptionDecl {
                name,
                value,
                doc,
                span: Span::new(start, end),
            }));
        }

        let annotations = self.annotations()?;
        if self.at_name("variable") {
            return self.variable(start, annotations, doc).map(Decl::Variable);
        }
        if self.at_name("function") {
            return self.function(annotations, doc).map(Decl::Function);
        }
        if !annotations.is_empty() {
            return Err(self.error_here("expected 'variable' or 'function' after annotations"));
        }

        let keyword = self.expect(TokenKind::Name, "declaration keyword")?;
        let keyword = self.text(keyword).to_string();
        let end = self.skip_statement()?;
        Ok(Decl::Setter(SetterDecl {
            keyword,
            doc,
            span: Span::new(start, end),
        }))
    }

    /// `%name(literals)` annotations and the bare `updating` / `private`
    /// modifiers.
    fn annotations(&mut self) -> Result<Vec<Annotation>> {
        let mut annotations = Vec::new();
        loop {
            if self.at_kind(TokenKind::Percent) {
                let start = self.expect(TokenKind::Percent, "'%'")?.span.start;
                let name = self.expect_qname("annotation name")?;
                let mut end = name.span.end;
                let mut literals = Vec::new();
                if self.at_kind(TokenKind::LParen) {
                    self.pos += 1;
                    loop {
                        match self.peek() {
                            Some(t) if matches!(t.kind, TokenKind::StringLit | TokenKind::NumberLit) => {
                                self.pos += 1;
                                literals.push(t.span);
                            }
                            _ => return Err(self.error_here("expected annotation literal")),
                        }
                        if self.at_kind(TokenKind::Comma) {
                            self.pos += 1;
                            continue;
                        }
                        end = self.expect(TokenKind::RParen, "')'")?.span.end;
                        break;
                    }
                }
                annotations.push(Annotation {
                    name,
                    literals,
                    span: Span::new(start, end),
                });
            } else if (self.at_name("updating") || self.at_name("private"))
                && self
                    .nth(1)
                    .is_some_and(|t| matches!(t.kind, TokenKind::Name | TokenKind::Percent))
            {
                let name = self.expect_qname("modifier")?;
                let span = name.span;
                annotations.push(Annotation {
                    name,
                    literals: Vec::new(),
                    span,
                });
            } else {
                return Ok(annotations);
            }
        }
    }

    fn variable(
        &mut self,
        start: usize,
        annotations: Vec<Annotation>,
        doc: Option<DocComment>,
    ) -> Result<VarDecl> {
        self.expect_name("variable")?;
        self.expect(TokenKind::Dollar, "'$'")?;
        let name = self.expect_qname("variable name")?;
        let type_decl = self.type_declaration()?;

        let init = if self.at_kind(TokenKind::Assign) {
            self.pos += 1;
            Some(self.exprs(Some(TokenKind::Semicolon))?)
        } else if self.at_name("external") {
            self.pos += 1;
            if self.at_kind(TokenKind::Assign) {
                self.pos += 1;
                Some(self.exprs(Some(TokenKind::Semicolon))?)
            } else {
                None
            }
        } else {
            return Err(self.error_here("expected ':=' or 'external' in variable declaration"));
        };
        let end = self.expect_semicolon()?.span.end;

        Ok(VarDecl {
            name,
            annotations,
            type_decl,
            init,
            doc,
            span: Span::new(start, end),
        })
    }

    fn function(
        &mut self,
        annotations: Vec<Annotation>,
        doc: Option<DocComment>,
    ) -> Result<FunctionDecl> {
        let keyword = self.expect_name("function")?;
        let start = annotations
            .first()
            .map_or(keyword.span.start, |a| a.span.start);
        let name = self.expect_qname("function name")?;

        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        let mut params_span: Option<Span> = None;
        if !self.at_kind(TokenKind::RParen) {
            loop {
                let dollar = self.expect(TokenKind::Dollar, "'$'")?;
                let param_name = self.expect_qname("parameter name")?;
                let type_decl = self.type_declaration()?;
                let end = type_decl
                    .as_ref()
                    .map_or(param_name.span.end, |t| t.span.end);
                let span = Span::new(dollar.span.start, end);
                params_span = Some(params_span.map_or(span, |s| s.to(span)));
                params.push(Param {
                    name: param_name,
                    type_decl,
                });
                if self.at_kind(TokenKind::Comma) {
                    self.pos += 1;
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;

        let (return_type, return_span) = if self.at_name("as") {
            let as_start = self.expect_name("as")?.span.start;
            let ty = self.sequence_type()?;
            let span = Span::new(as_start, ty.span.end);
            (Some(ty), Some(span))
        } else {
            (None, None)
        };

        let (body, end) = if self.at_kind(TokenKind::LBrace) {
            let open = self.expect(TokenKind::LBrace, "'{'")?;
            let exprs = self.exprs(Some(TokenKind::RBrace))?;
            let close = self.expect(TokenKind::RBrace, "'}'")?;
            let span = open.span.to(close.span);
            (FunctionBody::Block { exprs, span }, close.span.end)
        } else if self.at_name("external") {
            let tok = self.expect_name("external")?;
            (FunctionBody::External, tok.span.end)
        } else {
            return Err(self.error_here("function declaration without a body or 'external'"));
        };
        self.expect_semicolon()?;

        Ok(FunctionDecl {
            name,
            annotations,
            params,
            params_span,
            return_type,
            return_span,
            body,
            span: Span::new(start, end),
            doc,
        })
    }

    fn import(&mut self, doc: Option<DocComment>) -> Result<Decl> {
        let start = self.expect_name("import")?.span.start;
        let schema = self.at_name("schema");
        self.pos += 1;

        let mut prefix = None;
        if self.at_name("namespace") {
            self.pos += 1;
            let tok = self.expect(TokenKind::Name, "namespace prefix")?;
            prefix = Some(self.text(tok).to_string());
            self.expect_symbol("=")?;
        } else if schema
            && self.at_name("default")
            && self.nth_is_name(1, "element")
            && self.nth_is_name(2, "namespace")
        {
            self.pos += 3;
        }

        let uri = self.expect_string("import URI")?;
        let mut locations = Vec::new();
        if self.at_name("at") {
            self.pos += 1;
            loop {
                locations.push(self.expect_string("location hint")?);
                if !self.at_kind(TokenKind::Comma) {
                    break;
                }
                self.pos += 1;
            }
        }
        let end = self.expect_semicolon()?.span.end;

        let decl = ImportDecl {
            prefix,
            uri,
            locations,
            doc,
            span: Span::new(start, end),
        };
        Ok(if schema {
            Decl::SchemaImport(decl)
        } else {
            Decl::ModuleImport(decl)
        })
    }

    /// Step over everything up to and including the next top-level `;`.
    fn skip_statement(&mut self) -> Result<usize> {
        let mut depth = 0usize;
        loop {
            let Some(tok) = self.bump() else {
                return Err(self.error_here("missing ';'"));
            };
            match tok.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1)
                }
                TokenKind::Semicolon if depth == 0 => return Ok(tok.span.end),
                _ => {}
            }
        }
    }

    // -- Types ----------------------------------------------------------------

    /// Optional `as SequenceType`.
    fn type_declaration(&mut self) -> Result<Option<SequenceType>> {
        if !self.at_name("as") {
            return Ok(None);
        }
        self.pos += 1;
        self.sequence_type().map(Some)
    }

    fn sequence_type(&mut self) -> Result<SequenceType> {
        let start = self.peek().map_or(self.src.len(), |t| t.span.start);

        if self.at_name("empty-sequence") {
            self.pos += 1;
            self.expect(TokenKind::LParen, "'('")?;
            let end = self.expect(TokenKind::RParen, "')'")?.span.end;
            return Ok(SequenceType {
                item_type: "empty-sequence()".to_string(),
                occurrence: None,
                span: Span::new(start, end),
            });
        }

        let end = match self.peek() {
            Some(t) if t.kind == TokenKind::LParen => self.skip_group()?,
            Some(t) if t.kind == TokenKind::Name => {
                self.pos += 1;
                let mut end = t.span.end;
                if self.at_kind(TokenKind::LParen) {
                    end = self.skip_group()?;
                    // function(…) as type
                    if self.text(t) == "function" && self.at_name("as") {
                        self.pos += 1;
                        end = self.sequence_type()?.span.end;
                    }
                }
                end
            }
            _ => return Err(self.error_here("expected a type")),
        };
        let item_type: String = self.src[start..end]
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        let occurrence = match self.peek() {
            Some(t) if t.kind == TokenKind::Symbol => match self.text(t) {
                "?" => Some(Occurrence::ZeroOrOne),
                "*" => Some(Occurrence::ZeroOrMore),
                "+" => Some(Occurrence::OneOrMore),
                _ => None,
            },
            _ => None,
        };
        let mut span = Span::new(start, end);
        if occurrence.is_some() {
            if let Some(t) = self.bump() {
                span.end = t.span.end;
            }
        }
        Ok(SequenceType {
            item_type,
            occurrence,
            span,
        })
    }

    /// Skip a balanced delimiter group starting at the cursor; returns its end.
    fn skip_group(&mut self) -> Result<usize> {
        let mut depth = 0usize;
        loop {
            let Some(tok) = self.bump() else {
                return Err(self.error_here("unbalanced delimiters"));
            };
            match tok.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(tok.span.end);
                    }
                }
                _ => {}
            }
        }
    }

    // -- Expressions ----------------------------------------------------------

    /// Parse expression items until `stop` (left unconsumed), or to the end
    /// of input when `stop` is `None`.
    fn exprs(&mut self, stop: Option<TokenKind>) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        loop {
            let Some(tok) = self.peek() else {
                return match stop {
                    None => Ok(items),
                    Some(kind) => Err(self.error_here(format!("expected {}", describe(kind)))),
                };
            };
            if Some(tok.kind) == stop {
                return Ok(items);
            }
            match tok.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                    items.push(self.group()?);
                }
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    return Err(self.error_here(format!("unbalanced '{}'", self.text(tok))));
                }
                TokenKind::Name if self.is_call(tok) => items.push(self.call()?),
                TokenKind::Dollar => items.push(self.variable_ref()?),
                _ => self.pos += 1,
            }
        }
    }

    fn group(&mut self) -> Result<Expr> {
        let open = self.bump().ok_or_else(|| self.error_here("expected '('"))?;
        let close_kind = match open.kind {
            TokenKind::LParen => TokenKind::RParen,
            TokenKind::LBracket => TokenKind::RBracket,
            _ => TokenKind::RBrace,
        };
        let items = self.exprs(Some(close_kind))?;
        let close = self.expect(close_kind, describe(close_kind))?;
        Ok(Expr::Group {
            items,
            span: open.span.to(close.span),
        })
    }

    fn is_call(&self, tok: Token) -> bool {
        if !self.nth(1).is_some_and(|t| t.kind == TokenKind::LParen) {
            return false;
        }
        let text = self.text(tok);
        if RESERVED_FUNCTION_NAMES.contains(&text) {
            return false;
        }
        let unprefixed = !text.contains(':') && !text.starts_with("Q{");
        !(unprefixed && EXPR_KEYWORDS.contains(&text))
    }

    fn call(&mut self) -> Result<Expr> {
        let name = self.expect_qname("function name")?;
        let args = self.group()?;
        let span = name.span.to(args.span());
        let args = match args {
            Expr::Group { items, .. } => items,
            other => vec![other],
        };
        Ok(Expr::Call { name, args, span })
    }

    fn variable_ref(&mut self) -> Result<Expr> {
        let previous = self.tokens[..self.pos]
            .iter()
            .rev()
            .find(|t| t.kind != TokenKind::DocComment)
            .copied();
        let dollar = self.expect(TokenKind::Dollar, "'$'")?;
        let name = self.expect_qname("variable name")?;
        let span = dollar.span.to(name.span);

        let after_keyword = previous.is_some_and(|t| {
            t.kind == TokenKind::Name && BINDING_KEYWORDS.contains(&self.text(t))
        });
        let before_binding = match self.peek() {
            Some(t) if t.kind == TokenKind::Assign => true,
            Some(t) if t.kind == TokenKind::Name => matches!(self.text(t), "in" | "as" | "at"),
            _ => false,
        };
        Ok(if after_keyword || before_binding {
            Expr::Binding { name, span }
        } else {
            Expr::VarRef { name, span }
        })
    }
}

fn describe(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::RParen => "')'",
        TokenKind::RBracket => "']'",
        TokenKind::RBrace => "'}'",
        TokenKind::Semicolon => "';'",
        _ => "token",
    }
}

/// Value of a string literal: quotes stripped, doubled quotes and the
/// predefined entity references decoded.
fn string_value(raw: &str) -> String {
    let Some(quote) = raw.chars().next() else {
        return String::new();
    };
    let inner = raw.get(1..raw.len().saturating_sub(1)).unwrap_or_default();
    let doubled = format!("{quote}{quote}");
    inner
        .replace(&doubled, &quote.to_string())
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
