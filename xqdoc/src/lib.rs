//! xqDoc generation for XQuery modules.
//!
//! [`generate`] parses one module, assembles its documentation model and
//! renders it as an xqDoc 1.1 XML document.

pub mod assembler;
pub mod comment;
pub mod config;
pub mod error;
pub mod model;
pub mod namespace;
pub mod render;
pub mod xml;

pub use assembler::Assembler;
pub use config::{NamespaceConfig, Preset};
pub use error::{Error, Result};
pub use model::ModuleDoc;
pub use render::{Renderer, XmlRenderer};

/// Parse and assemble `source` without rendering it.
pub fn document(source: &str, config: &NamespaceConfig) -> Result<ModuleDoc> {
    let module = xqdoc_syntax::parse(source)?;
    Assembler::new(&module, config).run()
}

/// Generate the xqDoc XML for one module, stamped with the current time.
pub fn generate(source: &str, config: &NamespaceConfig) -> Result<String> {
    generate_with(source, config, &XmlRenderer::default())
}

pub fn generate_with(
    source: &str,
    config: &NamespaceConfig,
    renderer: &dyn Renderer,
) -> Result<String> {
    let doc = document(source, config)?;
    Ok(renderer.render(&doc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_errors_surface_as_error_variant() {
        let err = generate("declare function local:f(", &NamespaceConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Syntax(_)));
        assert!(err.to_string().starts_with("Syntax error: "));
    }

    #[test]
    fn generate_produces_a_document() {
        let out = generate("1 + 1", &NamespaceConfig::default()).unwrap();
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<xqdoc:xqdoc"));
        assert!(out.contains("<xqdoc:version>1.1</xqdoc:version>"));
    }
}
