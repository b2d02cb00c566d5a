//! Document assembler: one pass over a parsed module producing a [`ModuleDoc`].
//!
//! Declarations are handled in source order. Calls and variable references
//! are collected into a [`Scope`] that is created fresh for every function
//! body and for the main module's query body, and passed down explicitly.

use crate::comment::TaggedComment;
use crate::config::NamespaceConfig;
use crate::error::{Error, Result};
use crate::model::{
    AnnotationDoc, FunctionDoc, ImportDoc, ImportKind, ModuleDoc, ModuleKind, NamespaceBinding,
    ParameterDoc, References, TypeDoc, VariableDoc,
};
use crate::namespace::NamespaceResolver;
use std::collections::HashSet;
use tracing::debug;
use xqdoc_syntax::{
    Annotation, Decl, DocComment, Expr, FunctionBody, FunctionDecl, ImportDecl, Module,
    SequenceType, Span, VarDecl,
};

/// Invocation and variable-reference accumulator for one body.
#[derive(Debug, Default)]
struct Scope {
    invoked: References,
    ref_variables: References,
}

pub struct Assembler<'a> {
    module: &'a Module,
    resolver: NamespaceResolver<'a>,
    imports: Vec<ImportDoc>,
    import_keys: HashSet<String>,
    namespaces: Vec<NamespaceBinding>,
    variables: Vec<VariableDoc>,
    functions: Vec<FunctionDoc>,
}

impl<'a> Assembler<'a> {
    pub fn new(module: &'a Module, config: &'a NamespaceConfig) -> Self {
        Assembler {
            module,
            resolver: NamespaceResolver::new(config),
            imports: Vec::new(),
            import_keys: HashSet::new(),
            namespaces: Vec::new(),
            variables: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn run(mut self) -> Result<ModuleDoc> {
        let module = self.module;

        let kind = match &module.kind {
            xqdoc_syntax::ModuleKind::Library(decl) => {
                self.resolver.bind(&decl.prefix, &decl.uri);
                ModuleKind::Library {
                    uri: decl.uri.clone(),
                    prefix: decl.prefix.clone(),
                }
            }
            xqdoc_syntax::ModuleKind::Main => ModuleKind::Main,
        };

        for decl in &module.decls {
            self.declaration(decl)?;
        }

        let mut scope = Scope::default();
        if let Some(body) = &module.body {
            self.walk(&body.exprs, &mut scope);
        }

        Ok(ModuleDoc {
            kind,
            comment: parse_comment(module.doc.as_ref()),
            body: self.slice(module.span)?.to_string(),
            imports: self.imports,
            namespaces: self.namespaces,
            variables: self.variables,
            functions: self.functions,
            invoked: scope.invoked,
            ref_variables: scope.ref_variables,
        })
    }

    fn declaration(&mut self, decl: &Decl) -> Result<()> {
        match decl {
            Decl::DefaultFunctionNamespace(d) => {
                self.resolver.set_default_function_namespace(&d.uri);
            }
            Decl::Namespace(d) => {
                if self.resolver.bind(&d.prefix, &d.uri) {
                    self.namespaces.push(NamespaceBinding {
                        prefix: d.prefix.clone(),
                        uri: d.uri.clone(),
                    });
                } else {
                    // Already bound by the module declaration, an import or an
                    // earlier declaration. Redeclaring is an XQuery static error;
                    // the first binding stays in force and nothing is listed.
                    debug!(prefix = %d.prefix, "ignoring redeclared namespace prefix");
                }
            }
            Decl::SchemaImport(d) => self.import(d, ImportKind::Schema),
            Decl::ModuleImport(d) => {
                if let Some(prefix) = &d.prefix {
                    self.resolver.bind(prefix, &d.uri);
                }
                self.import(d, ImportKind::Library);
            }
            Decl::Variable(v) => self.variable(v)?,
            Decl::Function(f) => self.function(f)?,
            Decl::Option(o) => debug!(name = %o.name, "skipping option declaration"),
            Decl::Setter(s) => debug!(keyword = %s.keyword, "skipping prolog setter"),
        }
        Ok(())
    }

    fn import(&mut self, decl: &ImportDecl, kind: ImportKind) {
        // Imports without a prefix are keyed by URI; braces keep the two
        // key spaces apart.
        let key = match &decl.prefix {
            Some(prefix) => prefix.clone(),
            None => format!("{{{}}}", decl.uri),
        };
        if !self.import_keys.insert(key) {
            debug!(uri = %decl.uri, "ignoring import of an already imported prefix");
            return;
        }
        self.imports.push(ImportDoc {
            uri: decl.uri.clone(),
            kind,
            location: decl.locations.first().cloned(),
            comment: parse_comment(decl.doc.as_ref()),
        });
    }

    fn variable(&mut self, var: &VarDecl) -> Result<()> {
        // Only prefixed globals are documented, even when a braced URI
        // would resolve on its own.
        if var.name.prefix.is_none() {
            debug!(name = %var.name, "dropping unprefixed variable declaration");
            return Ok(());
        }
        let Some(uri) = self.resolver.resolve_variable(&var.name) else {
            debug!(name = %var.name, "dropping variable without a resolvable namespace");
            return Ok(());
        };
        let annotations = self.annotations(&var.annotations)?;
        self.variables.push(VariableDoc {
            uri,
            name: var.name.local.clone(),
            comment: parse_comment(var.doc.as_ref()),
            annotations,
            type_doc: var.type_decl.as_ref().map(type_doc),
        });
        Ok(())
    }

    fn function(&mut self, func: &FunctionDecl) -> Result<()> {
        if self.resolver.resolve_function(&func.name).is_none() {
            debug!(name = %func.name, "dropping function without a resolvable namespace");
            return Ok(());
        }

        let mut scope = Scope::default();
        if let FunctionBody::Block { exprs, .. } = &func.body {
            self.walk(exprs, &mut scope);
        }

        let params_text = match func.params_span {
            Some(span) => self.slice(span)?,
            None => "",
        };
        let mut signature = format!("declare function {}({})", func.name.local, params_text);
        if let Some(span) = func.return_span {
            signature.push(' ');
            signature.push_str(self.slice(span)?);
        }

        let parameters = func
            .params
            .iter()
            .map(|p| ParameterDoc {
                name: p.name.to_string(),
                type_doc: p.type_decl.as_ref().map(type_doc),
            })
            .collect();

        let doc = FunctionDoc {
            name: func.name.local.clone(),
            comment: parse_comment(func.doc.as_ref()),
            annotations: self.annotations(&func.annotations)?,
            signature,
            parameters,
            return_type: func.return_type.as_ref().map(type_doc),
            invoked: scope.invoked,
            ref_variables: scope.ref_variables,
            body: self.slice(func.span)?.to_string(),
        };
        self.functions.push(doc);
        Ok(())
    }

    fn annotations(&self, annotations: &[Annotation]) -> Result<Vec<AnnotationDoc>> {
        annotations
            .iter()
            .map(|a| {
                let literals = a
                    .literals
                    .iter()
                    .map(|span| self.slice(*span).map(str::to_string))
                    .collect::<Result<Vec<_>>>()?;
                Ok(AnnotationDoc {
                    name: a.name.to_string(),
                    literals,
                })
            })
            .collect()
    }

    /// Record calls and variable references found in `exprs`.
    fn walk(&self, exprs: &[Expr], scope: &mut Scope) {
        for expr in exprs {
            match expr {
                Expr::Call { name, args, .. } => {
                    match self.resolver.resolve_function(name) {
                        Some(uri) => {
                            scope.invoked.insert(uri, name.local.clone());
                        }
                        None => debug!(name = %name, "dropping call to unresolved function"),
                    }
                    self.walk(args, scope);
                }
                Expr::VarRef { name, .. } => match self.resolver.resolve_variable(name) {
                    Some(uri) => {
                        scope.ref_variables.insert(uri, name.local.clone());
                    }
                    None if name.prefix.is_some() => {
                        debug!(name = %name, "dropping reference to unresolved variable")
                    }
                    None => {}
                },
                Expr::Binding { .. } => {}
                Expr::Group { items, .. } => self.walk(items, scope),
            }
        }
    }

    fn slice(&self, span: Span) -> Result<&'a str> {
        self.module.slice(span).ok_or_else(|| {
            Error::structure(format!(
                "span {}..{} is outside the module source",
                span.start, span.end
            ))
        })
    }
}

fn parse_comment(doc: Option<&DocComment>) -> Option<TaggedComment> {
    doc.map(|d| TaggedComment::parse(&d.text))
}

fn type_doc(ty: &SequenceType) -> TypeDoc {
    TypeDoc {
        item_type: ty.item_type.clone(),
        occurrence: ty.occurrence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::Section;
    use pretty_assertions::assert_eq;
    use xqdoc_syntax::{parse, Occurrence};

    fn assemble(src: &str) -> ModuleDoc {
        assemble_with(src, &NamespaceConfig::default())
    }

    fn assemble_with(src: &str, config: &NamespaceConfig) -> ModuleDoc {
        let module = parse(src).unwrap();
        Assembler::new(&module, config).run().unwrap()
    }

    fn refs(references: &References) -> Vec<String> {
        references
            .iter()
            .map(|r| format!("{} {}", r.uri, r.name))
            .collect()
    }

    const FUNCTX: &str = r#"(:~ FunctX XQuery Function Library :)
module namespace functx = "http://www.functx.com";

(:~
 : Whether a value is all whitespace or a zero-length string
 :
 : @author  Priscilla Walmsley, Datypic
 : @version 1.0
 : @param   $arg the string (or node) to test
 :)
declare function functx:all-whitespace
  ( $arg as xs:string? )  as xs:boolean {

   fn:normalize-space($arg) = ''
 } ;
"#;

    #[test]
    fn functx_library_module() {
        let doc = assemble(FUNCTX);
        assert_eq!(
            doc.kind,
            ModuleKind::Library {
                uri: "http://www.functx.com".into(),
                prefix: "functx".into()
            }
        );
        assert_eq!(
            doc.comment.as_ref().and_then(|c| c.description()),
            Some("FunctX XQuery Function Library")
        );
        assert_eq!(doc.functions.len(), 1);

        let f = &doc.functions[0];
        assert_eq!(f.name, "all-whitespace");
        assert_eq!(
            f.parameters,
            vec![ParameterDoc {
                name: "arg".into(),
                type_doc: Some(TypeDoc {
                    item_type: "xs:string".into(),
                    occurrence: Some(Occurrence::ZeroOrOne),
                }),
            }]
        );
        assert_eq!(
            f.return_type,
            Some(TypeDoc {
                item_type: "xs:boolean".into(),
                occurrence: None
            })
        );
        assert_eq!(
            refs(&f.invoked),
            ["http://www.w3.org/2003/05/xpath-functions normalize-space"]
        );
        assert!(f.ref_variables.is_empty());
        assert_eq!(
            f.signature,
            "declare function all-whitespace($arg as xs:string?) as xs:boolean"
        );
        assert!(f.body.starts_with("function functx:all-whitespace"));
        assert!(f.body.ends_with('}'));

        let comment = f.comment.as_ref().unwrap();
        assert_eq!(comment.entries(Section::Param), ["$arg the string (or node) to test"]);
        assert_eq!(comment.entries(Section::Author), ["Priscilla Walmsley, Datypic"]);
    }

    #[test]
    fn module_body_is_trimmed_source() {
        let doc = assemble(FUNCTX);
        assert!(doc.body.starts_with("(:~ FunctX"));
        assert!(doc.body.ends_with("} ;"));
    }

    #[test]
    fn references_reset_per_function() {
        let src = r#"module namespace m = "urn:m";
declare variable $m:v := m:init();
declare function m:a() { m:b(), $m:v, m:b() };
declare function m:b() { fn:true() };
"#;
        let doc = assemble(src);
        assert_eq!(refs(&doc.functions[0].invoked), ["urn:m b"]);
        assert_eq!(refs(&doc.functions[0].ref_variables), ["urn:m v"]);
        assert_eq!(
            refs(&doc.functions[1].invoked),
            ["http://www.w3.org/2003/05/xpath-functions true"]
        );
        assert!(doc.functions[1].ref_variables.is_empty());
        // The variable initializer belongs to no accumulator.
        assert!(doc.invoked.is_empty());
    }

    #[test]
    fn unresolved_references_are_dropped() {
        let src = r#"declare function local:f($x) { nope:g($x), $nope:y, $x, local:h() };
local:f(1)
"#;
        let doc = assemble(src);
        let f = &doc.functions[0];
        assert_eq!(
            refs(&f.invoked),
            ["http://www.w3.org/2005/xquery-local-functions h"]
        );
        assert!(f.ref_variables.is_empty());
    }

    #[test]
    fn unresolved_function_declaration_is_dropped() {
        let src = "declare function nope:f() { local:g() };\n1";
        let doc = assemble(src);
        assert!(doc.functions.is_empty());
        assert!(doc.invoked.is_empty());
    }

    #[test]
    fn main_module_body_references() {
        let src = r#"declare namespace app = "urn:app";
declare variable $app:limit := 10;
for $i in 1 to $app:limit
return (local:show($i), count($i), local:show($i))
"#;
        let doc = assemble(src);
        assert_eq!(doc.kind, ModuleKind::Main);
        assert_eq!(
            refs(&doc.invoked),
            [
                "http://www.w3.org/2005/xquery-local-functions show",
                "http://www.w3.org/2003/05/xpath-functions count"
            ]
        );
        assert_eq!(refs(&doc.ref_variables), ["urn:app limit"]);
    }

    #[test]
    fn unprefixed_variable_is_dropped() {
        let doc = assemble("declare variable $x := 1;\n$x");
        assert!(doc.variables.is_empty());
        assert!(doc.ref_variables.is_empty());
    }

    #[test]
    fn uri_qualified_variable_declaration_is_dropped() {
        let doc = assemble("declare variable $Q{urn:x}v := 1;\n1");
        assert!(doc.variables.is_empty());
    }

    #[test]
    fn first_import_per_prefix_wins() {
        let src = r#"import module namespace a = "urn:a1" at "a1.xqm", "a1b.xqm";
import module namespace a = "urn:a2" at "a2.xqm";
import schema namespace s = "urn:s";
import schema default element namespace "urn:d";
a:f()
"#;
        let doc = assemble(src);
        let summary: Vec<_> = doc
            .imports
            .iter()
            .map(|i| (i.kind, i.uri.as_str(), i.location.as_deref()))
            .collect();
        assert_eq!(
            summary,
            [
                (ImportKind::Library, "urn:a1", Some("a1.xqm")),
                (ImportKind::Schema, "urn:s", None),
                (ImportKind::Schema, "urn:d", None),
            ]
        );
        // The surviving import binds the prefix for resolution.
        assert_eq!(refs(&doc.invoked), ["urn:a1 f"]);
    }

    #[test]
    fn first_namespace_declaration_wins() {
        let src = r#"declare namespace x = "urn:one";
declare namespace x = "urn:two";
declare namespace y = "urn:y";
x:f()
"#;
        let doc = assemble(src);
        assert_eq!(
            doc.namespaces,
            [
                NamespaceBinding { prefix: "x".into(), uri: "urn:one".into() },
                NamespaceBinding { prefix: "y".into(), uri: "urn:y".into() },
            ]
        );
        assert_eq!(refs(&doc.invoked), ["urn:one f"]);
    }

    #[test]
    fn namespace_declaration_cannot_rebind_module_prefix() {
        let src = r#"module namespace m = "urn:m";
declare namespace m = "urn:other";
declare function m:f() { m:g() };
"#;
        let doc = assemble(src);
        assert!(doc.namespaces.is_empty());
        assert_eq!(refs(&doc.functions[0].invoked), ["urn:m g"]);
    }

    #[test]
    fn namespace_declaration_cannot_rebind_imported_prefix() {
        let src = r#"import module namespace a = "urn:a";
declare namespace a = "urn:other";
a:f()
"#;
        let doc = assemble(src);
        assert!(doc.namespaces.is_empty());
        assert_eq!(refs(&doc.invoked), ["urn:a f"]);
    }

    #[test]
    fn clause_keywords_are_not_invocations() {
        let fn_true = "http://www.w3.org/2003/05/xpath-functions true";
        let doc = assemble(
            "for tumbling window $w in (1, 2, 3) start $s when fn:true() \
             end $e when ($e - $s) eq 1 return $w",
        );
        assert_eq!(refs(&doc.invoked), [fn_true]);

        let doc = assemble("try { fn:error() } catch ($e) { $e }");
        assert_eq!(
            refs(&doc.invoked),
            ["http://www.w3.org/2003/05/xpath-functions error"]
        );

        let doc = assemble(
            "copy $c := $d modify (insert node <a/> into ($c), \
             replace value of node $c with (\"x\")) return $c",
        );
        assert!(doc.invoked.is_empty());
    }

    #[test]
    fn default_function_namespace_applies_to_unprefixed_calls() {
        let src = "declare default function namespace \"urn:fns\";\nhelper()";
        let doc = assemble(src);
        assert_eq!(refs(&doc.invoked), ["urn:fns helper"]);
    }

    #[test]
    fn variables_carry_annotations_and_types() {
        let src = r#"module namespace m = "urn:m";
(:~ The limit :)
declare %private %app:setting("max", 3) variable $m:limit as xs:integer+ external;
"#;
        let doc = assemble(src);
        let v = &doc.variables[0];
        assert_eq!((v.uri.as_str(), v.name.as_str()), ("urn:m", "limit"));
        assert_eq!(v.comment.as_ref().and_then(|c| c.description()), Some("The limit"));
        assert_eq!(
            v.annotations,
            [
                AnnotationDoc { name: "private".into(), literals: vec![] },
                AnnotationDoc {
                    name: "app:setting".into(),
                    literals: vec!["\"max\"".into(), "3".into()]
                },
            ]
        );
        assert_eq!(
            v.type_doc,
            Some(TypeDoc {
                item_type: "xs:integer".into(),
                occurrence: Some(Occurrence::OneOrMore)
            })
        );
    }

    #[test]
    fn external_function_has_no_references() {
        let src = "module namespace m = \"urn:m\";\ndeclare function m:f($a as item()*) as empty-sequence() external;";
        let doc = assemble(src);
        let f = &doc.functions[0];
        assert_eq!(f.signature, "declare function f($a as item()*) as empty-sequence()");
        assert!(f.invoked.is_empty());
        assert!(f.body.ends_with("external"));
    }

    #[test]
    fn encoded_uris() {
        let config = NamespaceConfig {
            encode_uris: true,
            ..NamespaceConfig::default()
        };
        let doc = assemble_with("declare variable $local:x := 1;\nfn:true()", &config);
        assert_eq!(doc.variables[0].uri, "http:~2F~2Fwww.w3.org~2F2005~2Fxquery-local-functions");
        assert_eq!(refs(&doc.invoked), ["http:~2F~2Fwww.w3.org~2F2003~2F05~2Fxpath-functions true"]);
    }

    #[test]
    fn empty_module_is_valid() {
        let doc = assemble("");
        assert_eq!(doc.kind, ModuleKind::Main);
        assert!(doc.comment.is_none());
        assert_eq!(doc.body, "");
        assert!(doc.functions.is_empty() && doc.variables.is_empty());
    }
}
