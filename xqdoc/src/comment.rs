//! xqDoc comment parser: line-by-line state machine over a `(:~ … :)` block.
//!
//! Each line either switches to a tagged section (`@param`, `@return`, …)
//! or continues the current one. Tags are found by plain substring search
//! in a fixed priority order, so a marker mentioned inside prose still
//! switches sections. Output relies on that behaviour, keep it.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

const OPEN: &str = "(:~";
const CLOSE: &str = ":)";

// A `:` decoration at the start of a continuation line.
static RE_CONTINUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*:").unwrap());

/// A comment section. Declaration order is the canonical output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Description,
    Author,
    Version,
    Param,
    Return,
    Error,
    Deprecated,
    See,
    Since,
}

impl Section {
    /// Order in which tag markers are searched for on each line.
    const SCAN_ORDER: [Section; 8] = [
        Section::Param,
        Section::Return,
        Section::Error,
        Section::Deprecated,
        Section::See,
        Section::Since,
        Section::Author,
        Section::Version,
    ];

    /// Element name used in the generated document.
    pub fn tag(self) -> &'static str {
        match self {
            Section::Description => "description",
            Section::Author => "author",
            Section::Version => "version",
            Section::Param => "param",
            Section::Return => "return",
            Section::Error => "error",
            Section::Deprecated => "deprecated",
            Section::See => "see",
            Section::Since => "since",
        }
    }

    fn marker(self) -> Option<&'static str> {
        match self {
            Section::Description => None,
            Section::Author => Some("@author"),
            Section::Version => Some("@version"),
            Section::Param => Some("@param"),
            Section::Return => Some("@return"),
            Section::Error => Some("@error"),
            Section::Deprecated => Some("@deprecated"),
            Section::See => Some("@see"),
            Section::Since => Some("@since"),
        }
    }
}

/// Parsed comment. Every section holds one entry per tag occurrence;
/// the description has at most one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaggedComment {
    sections: BTreeMap<Section, Vec<String>>,
}

impl TaggedComment {
    /// Parse the raw text of a comment block, delimiters included.
    pub fn parse(raw: &str) -> TaggedComment {
        let mut state = CommentState::default();
        for line in raw.lines() {
            state.process_line(line);
        }
        state.finish()
    }

    pub fn description(&self) -> Option<&str> {
        self.entries(Section::Description)
            .first()
            .map(String::as_str)
    }

    pub fn entries(&self, section: Section) -> &[String] {
        self.sections.get(&section).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All entries in canonical section order, encounter order within a section.
    pub fn iter(&self) -> impl Iterator<Item = (Section, &str)> {
        self.sections
            .iter()
            .flat_map(|(section, entries)| entries.iter().map(move |e| (*section, e.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[derive(Default)]
struct CommentState {
    sections: BTreeMap<Section, Vec<String>>,
    cursor: Option<Section>,
}

impl CommentState {
    fn process_line(&mut self, line: &str) {
        let end = line.find(CLOSE).unwrap_or(line.len());

        let tagged = Section::SCAN_ORDER.iter().find_map(|section| {
            let marker = section.marker()?;
            line.find(marker).map(|i| (*section, i + marker.len()))
        });

        match tagged {
            Some((section, content_start)) => {
                self.open(section);
                self.append(line.get(content_start..end).unwrap_or_default());
            }
            None => {
                if self.cursor.is_none() {
                    self.open(Section::Description);
                }
                self.continue_section(line, end);
            }
        }
    }

    fn continue_section(&mut self, line: &str, end: usize) {
        if let Some(i) = line.find(OPEN) {
            self.append(line.get(i + OPEN.len()..end).unwrap_or_default());
        } else if RE_CONTINUATION.is_match(line) {
            let colon = line.find(':').unwrap_or_default();
            if colon < end {
                let text = self.clean(&line[colon + 1..end]);
                if text.is_empty() {
                    return;
                }
                let in_description = self.cursor == Some(Section::Description);
                if let Some(entry) = self.current() {
                    if in_description && !entry.is_empty() {
                        entry.push('\n');
                    }
                    entry.push_str(text);
                }
            } else if end != line.len() {
                self.append(&line[..end]);
            }
        } else {
            self.append(&line[..end]);
        }
    }

    fn open(&mut self, section: Section) {
        self.cursor = Some(section);
        self.sections.entry(section).or_default().push(String::new());
    }

    fn current(&mut self) -> Option<&mut String> {
        let section = self.cursor?;
        self.sections.get_mut(&section)?.last_mut()
    }

    /// Description text keeps its spacing, everything else is trimmed.
    fn clean<'l>(&self, text: &'l str) -> &'l str {
        if self.cursor == Some(Section::Description) {
            text
        } else {
            text.trim()
        }
    }

    fn append(&mut self, text: &str) {
        let text = self.clean(text);
        if let Some(entry) = self.current() {
            entry.push_str(text);
        }
    }

    fn finish(mut self) -> TaggedComment {
        for entry in self.sections.values_mut().flatten() {
            *entry = entry.trim().to_string();
        }
        TaggedComment {
            sections: self.sections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn summary_author_and_param() {
        let c = TaggedComment::parse(
            "(:~ \n : Summary text \n : @author Jane Doe \n : @param $x the input \n :)",
        );
        assert_eq!(c.description(), Some("Summary text"));
        assert_eq!(c.entries(Section::Author), ["Jane Doe"]);
        assert_eq!(c.entries(Section::Param), ["$x the input"]);
        for section in [
            Section::Version,
            Section::Return,
            Section::Error,
            Section::Deprecated,
            Section::See,
            Section::Since,
        ] {
            assert!(c.entries(section).is_empty(), "{:?} should be empty", section);
        }
    }

    #[test]
    fn single_line_comment() {
        let c = TaggedComment::parse("(:~ Just one line :)");
        assert_eq!(c.description(), Some("Just one line"));
        assert_eq!(c.iter().count(), 1);
    }

    #[test]
    fn description_lines_are_joined_with_newlines() {
        let c = TaggedComment::parse("(:~\n : First line.\n :   indented second\n :\n : third\n :)");
        assert_eq!(c.description(), Some("First line.\n   indented second\n third"));
    }

    #[test]
    fn tag_only_comment_still_opens_description() {
        let c = TaggedComment::parse("(:~\n : @return nothing at all\n :)");
        assert_eq!(c.description(), Some(""));
        assert_eq!(c.entries(Section::Return), ["nothing at all"]);
    }

    #[test]
    fn repeated_tags_make_separate_entries() {
        let c = TaggedComment::parse("(:~\n : @param $a first\n : @param $b second\n :)");
        assert_eq!(c.entries(Section::Param), ["$a first", "$b second"]);
    }

    #[test]
    fn iteration_uses_canonical_order() {
        let c = TaggedComment::parse(
            "(:~ Text\n : @since 1.0\n : @version 2\n : @author A\n : @see b\n :)",
        );
        let tags: Vec<_> = c.iter().map(|(s, _)| s.tag()).collect();
        assert_eq!(tags, ["description", "author", "version", "see", "since"]);
    }

    #[test]
    fn continuation_in_tagged_section_has_no_separator() {
        let c = TaggedComment::parse("(:~\n : @param $x the\n :   input value\n :)");
        assert_eq!(c.entries(Section::Param), ["$x theinput value"]);
    }

    #[test]
    fn marker_in_prose_switches_section() {
        // @param is searched before @see, so the whole line becomes a param.
        let c = TaggedComment::parse("(:~\n : @see the @param docs\n :)");
        assert_eq!(c.entries(Section::Param), ["docs"]);
        assert!(c.entries(Section::See).is_empty());
    }

    #[test]
    fn tag_on_opening_line() {
        let c = TaggedComment::parse("(:~ @deprecated use other() :)");
        assert_eq!(c.entries(Section::Deprecated), ["use other()"]);
        assert!(c.description().is_none());
    }

    #[test]
    fn text_before_close_on_last_line() {
        let c = TaggedComment::parse("(:~\n : Start\n   and finish :)");
        assert_eq!(c.description(), Some("Start   and finish"));
    }

    #[test]
    fn empty_block() {
        let c = TaggedComment::parse("(:~:)");
        assert!(!c.is_empty());
        assert_eq!(c.description(), Some(""));
    }
}
