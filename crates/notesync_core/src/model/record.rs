//! Record domain model.
//!
//! # Responsibility
//! - Define the value shared by storage, composition and merge code.
//! - Own the on-disk text format (body, blank line, tag lines).
//!
//! # Invariants
//! - Equality is structural over `path`, `text` and `tags` only.
//! - `Record::parse(&r.serialize(m), ..) == r` whenever `r.text` is trimmed
//!   and neither body nor tags contain the marker `m`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Strongly-typed identifier of one record file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotePath(PathBuf);

impl NotePath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Bare filename as embedded in aggregate-document headers.
    ///
    /// Falls back to the full lossy path when there is no final component.
    pub fn file_name(&self) -> String {
        self.0
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.0.to_string_lossy().into_owned())
    }
}

impl Display for NotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for NotePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl From<PathBuf> for NotePath {
    fn from(value: PathBuf) -> Self {
        Self(value)
    }
}

impl From<&Path> for NotePath {
    fn from(value: &Path) -> Self {
        Self(value.to_path_buf())
    }
}

impl From<&str> for NotePath {
    fn from(value: &str) -> Self {
        Self(PathBuf::from(value))
    }
}

impl From<String> for NotePath {
    fn from(value: String) -> Self {
        Self(PathBuf::from(value))
    }
}

/// One stored text record with its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub path: NotePath,
    /// Body text without the tag block.
    pub text: String,
    /// Tags in file order; duplicates are kept.
    pub tags: Vec<String>,
}

impl Record {
    pub fn new(path: impl Into<NotePath>, text: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
            tags,
        }
    }

    /// Record with no body and no tags, used when a file has vanished.
    pub fn empty(path: NotePath) -> Self {
        Self {
            path,
            text: String::new(),
            tags: Vec::new(),
        }
    }

    /// Parses file contents: body up to the first `tag_marker`, then one tag
    /// per marker occurrence.
    pub fn parse(path: impl Into<NotePath>, contents: &str, tag_marker: &str) -> Self {
        let (body, tag_block) = match contents.find(tag_marker) {
            Some(index) => (&contents[..index], Some(&contents[index..])),
            None => (contents, None),
        };

        let tags = tag_block
            .map(|block| {
                block
                    .split(tag_marker)
                    .map(str::trim)
                    .filter(|tag| !tag.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            path: path.into(),
            text: body.trim().to_string(),
            tags,
        }
    }

    /// Renders the on-disk form: trimmed body, blank line, tag lines.
    pub fn serialize(&self, tag_marker: &str) -> String {
        let mut out = String::with_capacity(self.text.len() + 2 + self.tags.len() * 16);
        out.push_str(self.text.trim());
        out.push_str("\n\n");
        for tag in &self.tags {
            out.push_str(tag_marker);
            out.push_str(tag);
            out.push('\n');
        }
        out
    }

    /// Renders the tag block alone, as appended below a body.
    pub fn tag_block(&self, tag_marker: &str) -> String {
        self.tags
            .iter()
            .map(|tag| format!("{tag_marker}{tag}\n"))
            .collect()
    }
}

/// A record together with its modification time at load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    pub record: Record,
    pub modified: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::{NotePath, Record};

    const MARKER: &str = "::";

    #[test]
    fn parse_splits_body_and_tags() {
        let record = Record::parse("a.md", "  some body\nline two \n\n::work\n::home\n", MARKER);
        assert_eq!(record.text, "some body\nline two");
        assert_eq!(record.tags, vec!["work".to_string(), "home".to_string()]);
    }

    #[test]
    fn parse_without_tags_keeps_whole_body() {
        let record = Record::parse("a.md", "hello\n", MARKER);
        assert_eq!(record.text, "hello");
        assert!(record.tags.is_empty());
    }

    #[test]
    fn parse_keeps_duplicate_tags_in_order() {
        let record = Record::parse("a.md", "x\n\n::b\n::a\n::b\n", MARKER);
        assert_eq!(record.tags, vec!["b", "a", "b"]);
    }

    #[test]
    fn serialize_writes_blank_line_before_tags() {
        let record = Record::new("a.md", "body", vec!["t1".to_string(), "t2".to_string()]);
        assert_eq!(record.serialize(MARKER), "body\n\n::t1\n::t2\n");
    }

    #[test]
    fn parse_inverts_serialize() {
        let cases = [
            Record::new("a.md", "plain", vec![]),
            Record::new("b.md", "multi\n\nparagraph", vec!["x".to_string()]),
            Record::new("c.md", "", vec!["only".to_string(), "tags".to_string()]),
        ];
        for record in cases {
            let parsed = Record::parse(record.path.clone(), &record.serialize(MARKER), MARKER);
            assert_eq!(parsed, record);
        }
    }

    #[test]
    fn file_name_strips_directories() {
        let path = NotePath::new("/tmp/notes/idea_2024.md");
        assert_eq!(path.file_name(), "idea_2024.md");
    }

    #[test]
    fn record_serializes_path_transparently() {
        let record = Record::new("notes/a.md", "body", vec!["t".to_string()]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["path"], "notes/a.md");
        assert_eq!(json["tags"][0], "t");
    }
}
