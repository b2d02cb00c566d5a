//! XQuery front end for documentation tooling.
//!
//! [`parse`] turns module source into a [`Module`]: the full prolog plus
//! the function calls and variable references found in expressions. Every
//! node keeps a [`Span`] so callers can recover the exact source text.

pub mod ast;
pub mod error;
pub mod parser;
mod scanner;

pub use ast::{
    Annotation, Decl, DefaultNamespaceDecl, DocComment, Expr, FunctionBody, FunctionDecl,
    ImportDecl, Module, ModuleDecl, ModuleKind, NamespaceDecl, Occurrence, OptionDecl, Param,
    QName, QueryBody, SequenceType, SetterDecl, Span, VarDecl,
};
pub use error::{Result, SyntaxError};
pub use parser::parse;
