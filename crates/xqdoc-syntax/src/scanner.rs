//! Hand-written XQuery scanner.
//!
//! Produces a flat token stream for the whole module. Ordinary comments
//! are dropped, doc comments are kept as tokens. Direct constructors,
//! string constructors and pragmas are consumed here so their literal
//! content never reaches the parser: literal parts become [`TokenKind::Markup`]
//! and enclosed expressions are emitted as ordinary tokens wrapped in braces.

use crate::ast::Span;
use crate::error::{Result, SyntaxError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// NCName, `prefix:local` or `Q{uri}local`.
    Name,
    StringLit,
    NumberLit,
    /// `(:~ … :)`
    DocComment,
    /// Literal text of a direct or string constructor.
    Markup,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Semicolon,
    Comma,
    /// `:=`
    Assign,
    Dollar,
    Percent,
    /// Any other operator or punctuation.
    Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.start..self.span.end]
    }
}

/// Unprefixed names after which an operand (and so a direct constructor)
/// is expected.
const OPERAND_KEYWORDS: &[&str] = &[
    "return", "then", "else", "satisfies", "in", "and", "or", "div", "idiv", "mod", "to", "eq",
    "ne", "lt", "le", "gt", "ge", "is", "union", "intersect", "except", "where", "collation",
    "when", "modify", "into", "with", "before", "after",
];

const MULTI_CHAR_SYMBOLS: &[&str] = &["!=", "<=", ">=", "<<", ">>", "=>", "||", "::", ".."];

/// Tokenize a complete module.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut scanner = Scanner {
        src: source,
        pos: 0,
        tokens: Vec::new(),
    };
    scanner.scan_expr(false)?;
    Ok(scanner.tokens)
}

pub(crate) fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub(crate) fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '\u{B7}')
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.src.get(self.pos + offset..)?.chars().next()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    fn error(&self, offset: usize, message: &str) -> SyntaxError {
        SyntaxError::at(self.src, offset, message)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, self.pos),
        });
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    /// Move past `needle`, or fail with `message` at `start`.
    fn skip_past(&mut self, needle: &str, start: usize, message: &str) -> Result<()> {
        match self.src[self.pos..].find(needle) {
            Some(i) => {
                self.pos += i + needle.len();
                Ok(())
            }
            None => Err(self.error(start, message)),
        }
    }

    /// Scan expression tokens until end of input, or until an unmatched
    /// `}` when `until_brace` is set (the brace is left unconsumed).
    fn scan_expr(&mut self, until_brace: bool) -> Result<()> {
        let mut depth = 0usize;
        loop {
            self.skip_trivia()?;
            let Some(c) = self.peek() else {
                if until_brace {
                    return Err(self.error(self.pos, "unterminated enclosed expression"));
                }
                return Ok(());
            };
            let start = self.pos;
            match c {
                '(' if self.starts_with("(:~") => {
                    self.skip_comment(start)?;
                    self.push(TokenKind::DocComment, start);
                }
                '(' if self.starts_with("(#") => {
                    self.skip_past("#)", start, "unterminated pragma")?;
                }
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                '{' => {
                    depth += 1;
                    self.single(TokenKind::LBrace);
                }
                '}' => {
                    if until_brace && depth == 0 {
                        return Ok(());
                    }
                    depth = depth.saturating_sub(1);
                    self.single(TokenKind::RBrace);
                }
                ';' => self.single(TokenKind::Semicolon),
                ',' => self.single(TokenKind::Comma),
                '$' => self.single(TokenKind::Dollar),
                '%' => self.single(TokenKind::Percent),
                '"' | '\'' => self.scan_string(c)?,
                '`' if self.starts_with("``[") => self.scan_string_constructor()?,
                ':' if self.starts_with(":=") => {
                    self.pos += 2;
                    self.push(TokenKind::Assign, start);
                }
                '<' if self.operand_expected() => self.scan_direct_constructor()?,
                '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.scan_number(),
                c if c.is_ascii_digit() => self.scan_number(),
                'Q' if self.starts_with("Q{") => self.scan_eqname()?,
                c if is_name_start(c) => {
                    self.scan_qname();
                    self.push(TokenKind::Name, start);
                }
                _ => self.scan_symbol(),
            }
        }
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.pos;
        self.advance_char();
        self.push(kind, start);
    }

    /// Skip whitespace and ordinary comments.
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => self.advance_char(),
                Some('(') if self.starts_with("(:") && !self.starts_with("(:~") => {
                    let start = self.pos;
                    self.skip_comment(start)?;
                }
                _ => return Ok(()),
            }
        }
    }

    /// Skip a possibly nested `(: … :)` comment starting at the cursor.
    fn skip_comment(&mut self, start: usize) -> Result<()> {
        let mut depth = 0usize;
        while self.pos < self.src.len() {
            if self.starts_with("(:") {
                depth += 1;
                self.pos += 2;
            } else if self.starts_with(":)") {
                depth -= 1;
                self.pos += 2;
                if depth == 0 {
                    return Ok(());
                }
            } else {
                self.advance_char();
            }
        }
        Err(self.error(start, "unterminated comment"))
    }

    fn scan_string(&mut self, quote: char) -> Result<()> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None => return Err(self.error(start, "unterminated string literal")),
                Some(c) if c == quote => {
                    self.pos += 1;
                    if self.peek() == Some(quote) {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                Some(_) => self.advance_char(),
            }
        }
        self.push(TokenKind::StringLit, start);
        Ok(())
    }

    fn scan_number(&mut self) {
        let start = self.pos;
        self.skip_digits();
        if self.peek() == Some('.') && self.peek_at(1) != Some('.') {
            self.pos += 1;
            self.skip_digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some('+' | '-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1 + sign;
                self.skip_digits();
            }
        }
        self.push(TokenKind::NumberLit, start);
    }

    fn skip_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    /// NCName, optionally followed by `:NCName`.
    fn scan_qname(&mut self) {
        self.scan_ncname();
        if self.peek() == Some(':') && self.peek_at(1).is_some_and(is_name_start) {
            self.pos += 1;
            self.scan_ncname();
        }
    }

    fn scan_ncname(&mut self) {
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn scan_eqname(&mut self) -> Result<()> {
        let start = self.pos;
        self.skip_past("}", start, "unterminated URI-qualified name")?;
        self.scan_ncname();
        self.push(TokenKind::Name, start);
        Ok(())
    }

    fn scan_symbol(&mut self) {
        let start = self.pos;
        match MULTI_CHAR_SYMBOLS.iter().find(|s| self.starts_with(s)) {
            Some(sym) => self.pos += sym.len(),
            None => self.advance_char(),
        }
        self.push(TokenKind::Symbol, start);
    }

    /// Whether the previous token ends an operand. A `<` seen where an
    /// operand is expected opens a direct constructor.
    fn operand_expected(&self) -> bool {
        let mut significant = self
            .tokens
            .iter()
            .rev()
            .filter(|t| t.kind != TokenKind::DocComment);
        let Some(last) = significant.next() else {
            return true;
        };
        match last.kind {
            TokenKind::Name => {
                let after_dollar = significant
                    .next()
                    .is_some_and(|t| t.kind == TokenKind::Dollar);
                !after_dollar && OPERAND_KEYWORDS.contains(&last.text(self.src))
            }
            TokenKind::StringLit
            | TokenKind::NumberLit
            | TokenKind::Markup
            | TokenKind::RParen
            | TokenKind::RBracket
            | TokenKind::RBrace
            | TokenKind::Dollar => false,
            TokenKind::DocComment
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::Semicolon
            | TokenKind::Comma
            | TokenKind::Assign
            | TokenKind::Percent
            | TokenKind::Symbol => true,
        }
    }

    // -- Constructors ---------------------------------------------------------

    fn flush_markup(&mut self, from: usize) {
        if self.pos > from {
            self.push(TokenKind::Markup, from);
        }
    }

    /// `{ expr }` inside a constructor.
    fn scan_enclosed(&mut self) -> Result<()> {
        self.single(TokenKind::LBrace);
        self.scan_expr(true)?;
        self.single(TokenKind::RBrace);
        Ok(())
    }

    fn scan_direct_constructor(&mut self) -> Result<()> {
        let start = self.pos;
        if self.starts_with("<!--") {
            self.skip_past("-->", start, "unterminated direct comment")?;
            self.push(TokenKind::Markup, start);
        } else if self.starts_with("<?") {
            self.skip_past("?>", start, "unterminated processing instruction")?;
            self.push(TokenKind::Markup, start);
        } else if self.peek_at(1).is_some_and(is_name_start) {
            let mut markup_start = start;
            self.scan_element(&mut markup_start)?;
            self.flush_markup(markup_start);
        } else {
            self.scan_symbol();
        }
        Ok(())
    }

    fn scan_element(&mut self, markup_start: &mut usize) -> Result<()> {
        let start = self.pos;
        self.pos += 1;
        self.scan_qname();

        // Attributes
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(self.error(start, "unterminated element constructor")),
                Some('/') if self.starts_with("/>") => {
                    self.pos += 2;
                    return Ok(());
                }
                Some('>') => {
                    self.pos += 1;
                    break;
                }
                Some(c) if is_name_start(c) => {
                    self.scan_qname();
                    self.skip_whitespace();
                    if self.peek() != Some('=') {
                        return Err(self.error(self.pos, "expected '=' in attribute"));
                    }
                    self.pos += 1;
                    self.skip_whitespace();
                    match self.peek() {
                        Some(q @ ('"' | '\'')) => self.scan_attribute_value(q, markup_start)?,
                        _ => return Err(self.error(self.pos, "expected quoted attribute value")),
                    }
                }
                Some(_) => return Err(self.error(self.pos, "malformed element constructor")),
            }
        }

        // Content
        loop {
            match self.peek() {
                None => return Err(self.error(start, "unterminated element constructor")),
                Some('<') if self.starts_with("</") => {
                    self.pos += 2;
                    self.scan_qname();
                    self.skip_whitespace();
                    if self.peek() != Some('>') {
                        return Err(self.error(self.pos, "malformed end tag"));
                    }
                    self.pos += 1;
                    return Ok(());
                }
                Some('<') if self.starts_with("<!--") => {
                    self.skip_past("-->", self.pos, "unterminated direct comment")?;
                }
                Some('<') if self.starts_with("<![CDATA[") => {
                    self.skip_past("]]>", self.pos, "unterminated CDATA section")?;
                }
                Some('<') if self.starts_with("<?") => {
                    self.skip_past("?>", self.pos, "unterminated processing instruction")?;
                }
                Some('<') => self.scan_element(markup_start)?,
                Some('{') if self.starts_with("{{") => self.pos += 2,
                Some('}') if self.starts_with("}}") => self.pos += 2,
                Some('{') => {
                    self.flush_markup(*markup_start);
                    self.scan_enclosed()?;
                    *markup_start = self.pos;
                }
                Some(_) => self.advance_char(),
            }
        }
    }

    fn scan_attribute_value(&mut self, quote: char, markup_start: &mut usize) -> Result<()> {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek() {
                None => return Err(self.error(start, "unterminated attribute value")),
                Some(c) if c == quote => {
                    self.pos += 1;
                    if self.peek() == Some(quote) {
                        self.pos += 1;
                    } else {
                        return Ok(());
                    }
                }
                Some('{') if self.starts_with("{{") => self.pos += 2,
                Some('}') if self.starts_with("}}") => self.pos += 2,
                Some('{') => {
                    self.flush_markup(*markup_start);
                    self.scan_enclosed()?;
                    *markup_start = self.pos;
                }
                Some(_) => self.advance_char(),
            }
        }
    }

    /// ``` ``[ text `{ expr }` text ]`` ```
    fn scan_string_constructor(&mut self) -> Result<()> {
        let start = self.pos;
        self.pos += 3;
        let mut markup_start = start;
        loop {
            if self.pos >= self.src.len() {
                return Err(self.error(start, "unterminated string constructor"));
            }
            if self.starts_with("]``") {
                self.pos += 3;
                self.flush_markup(markup_start);
                return Ok(());
            }
            if self.starts_with("`{") {
                self.pos += 1;
                self.flush_markup(markup_start);
                self.scan_enclosed()?;
                if self.peek() != Some('`') {
                    return Err(self.error(self.pos, "expected '`' after interpolation"));
                }
                markup_start = self.pos;
                self.pos += 1;
                continue;
            }
            self.advance_char();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance_char();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().iter().map(|t| t.kind).collect()
    }

    fn texts(src: &str) -> Vec<String> {
        tokenize(src)
            .unwrap()
            .iter()
            .map(|t| t.text(src).to_string())
            .collect()
    }

    #[test]
    fn names_and_punctuation() {
        assert_eq!(
            texts("fn:concat($a, 'x')"),
            vec!["fn:concat", "(", "$", "a", ",", "'x'", ")"]
        );
    }

    #[test]
    fn assign_is_not_a_qname_separator() {
        use TokenKind::*;
        assert_eq!(kinds("$x:=1"), vec![Dollar, Name, Assign, NumberLit]);
    }

    #[test]
    fn nested_comments_are_skipped() {
        assert_eq!(texts("a (: outer (: inner :) still :) b"), vec!["a", "b"]);
    }

    #[test]
    fn doc_comment_is_kept() {
        let toks = tokenize("(:~ hello (: nested :) :) x").unwrap();
        assert_eq!(toks[0].kind, TokenKind::DocComment);
        assert_eq!(toks[0].text("(:~ hello (: nested :) :) x"), "(:~ hello (: nested :) :)");
        assert_eq!(toks.len(), 2);
    }

    #[test]
    fn unterminated_comment_fails() {
        let err = tokenize("1 (: open").unwrap_err();
        assert!(err.message.contains("unterminated comment"));
    }

    #[test]
    fn string_with_doubled_quotes() {
        assert_eq!(texts(r#""say ""hi""" x"#), vec![r#""say ""hi""""#, "x"]);
    }

    #[test]
    fn numbers() {
        use TokenKind::*;
        assert_eq!(kinds("1 2.5 .5 1e3 1.5E-2"), vec![NumberLit; 5]);
        assert_eq!(texts("1 to 5"), vec!["1", "to", "5"]);
    }

    #[test]
    fn direct_element_content_is_markup() {
        let src = "<p class=\"x\">it's {fn:f($v)} done</p>";
        use TokenKind::*;
        assert_eq!(
            kinds(src),
            vec![Markup, LBrace, Name, LParen, Dollar, Name, RParen, RBrace, Markup]
        );
        assert_eq!(texts(src)[0], "<p class=\"x\">it's ");
    }

    #[test]
    fn attribute_enclosed_expression() {
        use TokenKind::*;
        assert_eq!(
            kinds("<a href=\"{$u}\"/>"),
            vec![Markup, LBrace, Dollar, Name, RBrace, Markup]
        );
    }

    #[test]
    fn update_targets_open_constructors() {
        use TokenKind::*;
        assert_eq!(
            kinds("replace node $c with <b>{f()}</b>"),
            vec![Name, Name, Dollar, Name, Name, Markup, LBrace, Name, LParen, RParen, RBrace, Markup]
        );
        assert_eq!(kinds("$c into <a/>")[3], Markup);
    }

    #[test]
    fn escaped_braces_stay_markup() {
        assert_eq!(kinds("<a>{{x}}</a>"), vec![TokenKind::Markup]);
    }

    #[test]
    fn nested_elements() {
        use TokenKind::*;
        assert_eq!(
            kinds("<ul><li>{$i}</li><br/></ul>"),
            vec![Markup, LBrace, Dollar, Name, RBrace, Markup]
        );
    }

    #[test]
    fn less_than_after_operand_is_comparison() {
        assert_eq!(texts("$a < $b"), vec!["$", "a", "<", "$", "b"]);
        assert_eq!(texts("count($x) <= 3"), vec!["count", "(", "$", "x", ")", "<=", "3"]);
    }

    #[test]
    fn less_than_after_return_is_constructor() {
        let toks = texts("return <x/>");
        assert_eq!(toks, vec!["return", "<x/>"]);
    }

    #[test]
    fn variable_named_like_keyword_is_operand() {
        assert_eq!(texts("$return < 1"), vec!["$", "return", "<", "1"]);
    }

    #[test]
    fn pragma_is_skipped() {
        assert_eq!(texts("(# ext:opt x #) { 1 }"), vec!["{", "1", "}"]);
    }

    #[test]
    fn string_constructor_interpolation() {
        use TokenKind::*;
        assert_eq!(
            kinds("``[Hello `{$name}`!]``"),
            vec![Markup, LBrace, Dollar, Name, RBrace, Markup]
        );
    }

    #[test]
    fn uri_qualified_name() {
        assert_eq!(texts("Q{http://x}f(1)"), vec!["Q{http://x}f", "(", "1", ")"]);
    }

    #[test]
    fn direct_comment_and_cdata_in_content() {
        assert_eq!(
            kinds("<a><!-- { --><![CDATA[ { ]]></a>"),
            vec![TokenKind::Markup]
        );
    }

    #[test]
    fn unterminated_element_fails() {
        assert!(tokenize("<a>text").is_err());
    }
}
