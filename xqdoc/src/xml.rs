//! XML emission helpers for the `xqdoc` namespace.
//!
//! Text content escapes only `&`, `<` and `>`. Attribute values also
//! escape `"`. Source slices go into CDATA sections so whitespace and
//! markup survive untouched.

use std::fmt::Write;

/// Namespace URI bound to the `xqdoc` prefix.
pub const XQDOC_NS: &str = "http://www.xqdoc.org/1.0";

const PREFIX: &str = "xqdoc";
const INDENT: &str = "  ";

/// Streaming writer that prefixes every element name with `xqdoc:` and
/// indents by nesting depth.
#[derive(Debug, Default)]
pub struct XmlWriter {
    out: String,
    depth: usize,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declaration(&mut self) {
        self.out
            .push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    }

    pub fn open(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.start_tag(tag, attrs);
        self.out.push_str(">\n");
        self.depth += 1;
    }

    pub fn close(&mut self, tag: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        let _ = writeln!(self.out, "</{}:{}>", PREFIX, tag);
    }

    pub fn empty_element(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.start_tag(tag, attrs);
        self.out.push_str("/>\n");
    }

    /// Element with escaped text content.
    pub fn text_element(&mut self, tag: &str, attrs: &[(&str, &str)], text: &str) {
        self.start_tag(tag, attrs);
        let _ = writeln!(self.out, ">{}</{}:{}>", escape_text(text), PREFIX, tag);
    }

    /// Element whose content is a single CDATA section.
    pub fn cdata_element(&mut self, tag: &str, attrs: &[(&str, &str)], text: &str) {
        self.start_tag(tag, attrs);
        let _ = writeln!(self.out, ">{}</{}:{}>", cdata(text), PREFIX, tag);
    }

    /// Open the root element with the `xqdoc` namespace declaration.
    pub fn open_root(&mut self, tag: &str) {
        self.open(tag, &[("xmlns:xqdoc", XQDOC_NS)]);
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn start_tag(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        self.indent();
        let _ = write!(self.out, "<{}:{}", PREFIX, tag);
        for (name, value) in attrs {
            let _ = write!(self.out, " {}=\"{}\"", name, escape_attr(value));
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }
}

pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

/// Wrap `s` in a CDATA section, splitting any `]]>` it contains.
pub fn cdata(s: &str) -> String {
    format!("<![CDATA[{}]]>", s.replace("]]>", "]]]]><![CDATA[>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn text_escaping_is_minimal() {
        assert_eq!(escape_text(r#"a < b && c > "d" 'e'"#), r#"a &lt; b &amp;&amp; c &gt; "d" 'e'"#);
    }

    #[test]
    fn attribute_escaping_adds_quotes() {
        assert_eq!(escape_attr(r#"say "hi" & <go>"#), "say &quot;hi&quot; &amp; &lt;go&gt;");
    }

    #[test]
    fn cdata_splits_terminator() {
        assert_eq!(cdata("x]]>y"), "<![CDATA[x]]]]><![CDATA[>y]]>");
        assert_eq!(cdata("plain"), "<![CDATA[plain]]>");
    }

    #[test]
    fn writer_nests_and_indents() {
        let mut w = XmlWriter::new();
        w.open_root("xqdoc");
        w.open("module", &[("type", "main")]);
        w.text_element("name", &[], "a&b");
        w.empty_element("namespace", &[("prefix", "p"), ("uri", "urn:\"q\"")]);
        w.cdata_element("body", &[("xml:space", "preserve")], "<x/>");
        w.close("module");
        w.close("xqdoc");
        let expected = "\
<xqdoc:xqdoc xmlns:xqdoc=\"http://www.xqdoc.org/1.0\">
  <xqdoc:module type=\"main\">
    <xqdoc:name>a&amp;b</xqdoc:name>
    <xqdoc:namespace prefix=\"p\" uri=\"urn:&quot;q&quot;\"/>
    <xqdoc:body xml:space=\"preserve\"><![CDATA[<x/>]]></xqdoc:body>
  </xqdoc:module>
</xqdoc:xqdoc>
";
        assert_eq!(w.finish(), expected);
    }
}
