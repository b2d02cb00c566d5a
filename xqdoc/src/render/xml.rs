//! xqDoc 1.1 XML renderer.

use crate::comment::TaggedComment;
use crate::model::*;
use crate::render::Renderer;
use crate::xml::XmlWriter;
use chrono::{DateTime, FixedOffset, Local, SecondsFormat};

/// xqDoc schema version written to `<xqdoc:control>`.
pub const XQDOC_VERSION: &str = "1.1";

pub struct XmlRenderer {
    generated: DateTime<FixedOffset>,
}

impl Default for XmlRenderer {
    fn default() -> Self {
        Self::at(Local::now().fixed_offset())
    }
}

impl XmlRenderer {
    /// Renderer that stamps `date` as the generation time.
    pub fn at(date: DateTime<FixedOffset>) -> Self {
        XmlRenderer { generated: date }
    }
}

impl Renderer for XmlRenderer {
    fn render(&self, doc: &ModuleDoc) -> String {
        let mut w = XmlWriter::new();
        w.declaration();
        w.open_root("xqdoc");

        w.open("control", &[]);
        w.text_element(
            "date",
            &[],
            &self.generated.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        w.text_element("version", &[], XQDOC_VERSION);
        w.close("control");

        write_module(&mut w, doc);

        if !doc.imports.is_empty() {
            w.open("imports", &[]);
            for import in &doc.imports {
                write_import(&mut w, import);
            }
            w.close("imports");
        }

        if !doc.namespaces.is_empty() {
            w.open("namespaces", &[]);
            for ns in &doc.namespaces {
                w.empty_element(
                    "namespace",
                    &[("prefix", ns.prefix.as_str()), ("uri", ns.uri.as_str())],
                );
            }
            w.close("namespaces");
        }

        if !doc.variables.is_empty() {
            w.open("variables", &[]);
            for var in &doc.variables {
                write_variable(&mut w, var);
            }
            w.close("variables");
        }

        if !doc.functions.is_empty() {
            w.open("functions", &[]);
            for func in &doc.functions {
                write_function(&mut w, func);
            }
            w.close("functions");
        }

        w.close("xqdoc");
        w.finish()
    }

    fn file_extension(&self) -> &str {
        "xml"
    }
}

fn write_module(w: &mut XmlWriter, doc: &ModuleDoc) {
    w.open("module", &[("type", doc.kind.as_str())]);
    if let ModuleKind::Library { uri, prefix } = &doc.kind {
        w.text_element("uri", &[], uri);
        w.text_element("name", &[], prefix);
    }
    write_comment(w, doc.comment.as_ref());
    if doc.kind == ModuleKind::Main {
        write_references(w, "invoked", &doc.invoked);
        write_references(w, "ref-variable", &doc.ref_variables);
    }
    write_body(w, &doc.body);
    w.close("module");
}

fn write_import(w: &mut XmlWriter, import: &ImportDoc) {
    let mut attrs = vec![("type", import.kind.as_str())];
    if let Some(location) = &import.location {
        attrs.push(("location", location.as_str()));
    }
    w.open("import", &attrs);
    w.text_element("uri", &[], &import.uri);
    write_comment(w, import.comment.as_ref());
    w.close("import");
}

fn write_variable(w: &mut XmlWriter, var: &VariableDoc) {
    w.open("variable", &[]);
    w.text_element("uri", &[], &var.uri);
    w.text_element("name", &[], &var.name);
    write_comment(w, var.comment.as_ref());
    write_annotations(w, &var.annotations);
    if let Some(ty) = &var.type_doc {
        write_type(w, ty);
    }
    w.close("variable");
}

fn write_function(w: &mut XmlWriter, func: &FunctionDoc) {
    w.open("function", &[]);
    write_comment(w, func.comment.as_ref());
    w.text_element("name", &[], &func.name);
    write_annotations(w, &func.annotations);
    w.text_element("signature", &[], &func.signature);

    if !func.parameters.is_empty() {
        w.open("parameters", &[]);
        for param in &func.parameters {
            w.open("parameter", &[]);
            w.text_element("name", &[], &param.name);
            if let Some(ty) = &param.type_doc {
                write_type(w, ty);
            }
            w.close("parameter");
        }
        w.close("parameters");
    }

    if let Some(ty) = &func.return_type {
        w.open("return", &[]);
        write_type(w, ty);
        w.close("return");
    }

    write_references(w, "invoked", &func.invoked);
    write_references(w, "ref-variable", &func.ref_variables);
    write_body(w, &func.body);
    w.close("function");
}

fn write_comment(w: &mut XmlWriter, comment: Option<&TaggedComment>) {
    let Some(comment) = comment else {
        return;
    };
    if comment.is_empty() {
        w.empty_element("comment", &[]);
        return;
    }
    w.open("comment", &[]);
    for (section, text) in comment.iter() {
        w.text_element(section.tag(), &[], text);
    }
    w.close("comment");
}

fn write_annotations(w: &mut XmlWriter, annotations: &[AnnotationDoc]) {
    if annotations.is_empty() {
        return;
    }
    w.open("annotations", &[]);
    for annotation in annotations {
        let attrs = [("name", annotation.name.as_str())];
        if annotation.literals.is_empty() {
            w.empty_element("annotation", &attrs);
            continue;
        }
        w.open("annotation", &attrs);
        for literal in &annotation.literals {
            w.cdata_element("literal", &[], literal);
        }
        w.close("annotation");
    }
    w.close("annotations");
}

fn write_type(w: &mut XmlWriter, ty: &TypeDoc) {
    match ty.occurrence {
        Some(occurrence) => {
            w.text_element("type", &[("occurrence", occurrence.as_str())], &ty.item_type)
        }
        None => w.text_element("type", &[], &ty.item_type),
    }
}

fn write_references(w: &mut XmlWriter, tag: &str, references: &References) {
    for reference in references.iter() {
        w.open(tag, &[]);
        w.text_element("uri", &[], &reference.uri);
        w.text_element("name", &[], &reference.name);
        w.close(tag);
    }
}

fn write_body(w: &mut XmlWriter, body: &str) {
    w.cdata_element("body", &[("xml:space", "preserve")], body);
}
