//! Output formats for an assembled [`ModuleDoc`].

pub mod xml;

use crate::model::ModuleDoc;

pub use xml::XmlRenderer;

/// Trait for rendering a ModuleDoc into a specific output format.
pub trait Renderer {
    fn render(&self, doc: &ModuleDoc) -> String;
    fn file_extension(&self) -> &str;
}
