use super::{ComposeOptions, SummaryError, SummaryResult};
use crate::config::SyncConfig;
use crate::model::record::Record;
use regex::Regex;

/// Splits edited aggregate documents back into records.
///
/// Built once per session from the configured prefixes; both patterns are
/// anchored at line start so prefix text inside a body line never counts.
#[derive(Debug, Clone)]
pub struct SummaryParser {
    options: ComposeOptions,
    tag_marker: String,
    /// A composed date line (prefix, `YYYY-MM-DD`, optional trailing blanks)
    /// directly followed by a record header, which is captured.
    date_line: Regex,
    record_header: Regex,
}

impl SummaryParser {
    pub fn new(config: &SyncConfig, options: ComposeOptions) -> Self {
        let date_line = Regex::new(&format!(
            r"(?m)^{}\d{{4}}-\d{{2}}-\d{{2}}[ \t]*\r?\n({})",
            regex::escape(&config.date_header),
            regex::escape(&config.record_header)
        ))
        .expect("valid date line regex");
        let record_header = Regex::new(&format!(
            r"(?m)^{}",
            regex::escape(&config.record_header)
        ))
        .expect("valid record header regex");

        Self {
            options,
            tag_marker: config.tag_marker.clone(),
            date_line,
            record_header,
        }
    }

    /// Parses `document` against `expected`, the order it was composed from.
    ///
    /// The result has the same length and order. Tags are re-parsed from the
    /// segment when `show_tags` is set, otherwise carried over from
    /// `expected`. Date lines are only stripped when dates were composed, and
    /// only where the composer puts them: right above a record header.
    ///
    /// # Errors
    /// - `SegmentCount` when record headers were added or removed.
    /// - `UnattributedText` when text precedes the first record header.
    /// - `HeaderMismatch` when a header names a different file than expected.
    pub fn parse(&self, document: &str, expected: &[Record]) -> SummaryResult<Vec<Record>> {
        let stripped = if self.options.show_date {
            self.date_line.replace_all(document, "${1}")
        } else {
            document.into()
        };

        let mut pieces = self.record_header.split(&stripped);
        let preamble = pieces.next().unwrap_or_default();
        let segments: Vec<&str> = pieces.collect();

        if segments.len() != expected.len() {
            return Err(SummaryError::SegmentCount {
                expected: expected.len(),
                found: segments.len(),
            });
        }
        if !preamble.trim().is_empty() {
            return Err(SummaryError::UnattributedText);
        }

        segments
            .into_iter()
            .zip(expected)
            .enumerate()
            .map(|(position, (segment, known))| {
                let (header, body) = segment.split_once('\n').unwrap_or((segment, ""));
                let expected_name = known.path.file_name();
                if header.trim() != expected_name {
                    return Err(SummaryError::HeaderMismatch {
                        position,
                        expected: expected_name,
                        found: header.trim().to_string(),
                    });
                }

                let body = body.trim();
                Ok(if self.options.show_tags {
                    Record::parse(known.path.clone(), body, &self.tag_marker)
                } else {
                    Record::new(known.path.clone(), body, known.tags.clone())
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::SummaryParser;
    use crate::config::SyncConfig;
    use crate::model::record::{Record, RecordEntry};
    use crate::summary::{compose, ComposeOptions, SummaryError};
    use chrono::{TimeZone, Utc};

    const ALL_OPTIONS: [ComposeOptions; 4] = [
        ComposeOptions {
            show_date: false,
            show_tags: false,
        },
        ComposeOptions {
            show_date: false,
            show_tags: true,
        },
        ComposeOptions {
            show_date: true,
            show_tags: false,
        },
        ComposeOptions {
            show_date: true,
            show_tags: true,
        },
    ];

    fn entries_of(bodies: &[(&str, &str, &[&str])]) -> Vec<RecordEntry> {
        bodies
            .iter()
            .enumerate()
            .map(|(idx, (name, text, tags))| RecordEntry {
                record: Record::new(
                    format!("/notes/{name}"),
                    *text,
                    tags.iter().map(|tag| tag.to_string()).collect(),
                ),
                modified: Utc
                    .with_ymd_and_hms(2024, 2, 1 + idx as u32, 12, 0, 0)
                    .unwrap(),
            })
            .collect()
    }

    fn entries() -> Vec<RecordEntry> {
        entries_of(&[
            ("a.md", "alpha", &["x"]),
            ("b.md", "beta\n\nmore", &[]),
            ("c.md", "gamma", &["y", "z"]),
        ])
    }

    fn parse(
        document: &str,
        expected: &[Record],
        options: ComposeOptions,
        config: &SyncConfig,
    ) -> Result<Vec<Record>, SummaryError> {
        SummaryParser::new(config, options).parse(document, expected)
    }

    fn assert_round_trip(entries: &[RecordEntry]) {
        let config = SyncConfig::default();
        for options in ALL_OPTIONS {
            let summary = compose(entries, options, &config);
            let parsed = parse(&summary.text, &summary.records, options, &config)
                .unwrap_or_else(|err| panic!("{options:?}: {err}"));
            assert_eq!(parsed, summary.records, "{options:?}");
        }
    }

    #[test]
    fn unedited_document_parses_back_to_the_same_records() {
        assert_round_trip(&entries());
    }

    #[test]
    fn body_lines_starting_with_the_date_prefix_survive() {
        assert_round_trip(&entries_of(&[
            ("a.md", "## Journal: trip ideas\nbring tent", &[]),
            ("b.md", "notes\n## Journal: \n## Journal: 2024 plans", &["t"]),
            ("c.md", "## Journal: 2024-13-01 is not a date line? it is kept", &[]),
        ]));
    }

    #[test]
    fn record_header_text_inside_a_line_is_body_text() {
        assert_round_trip(&entries_of(&[
            ("a.md", "format is: %% note: x", &[]),
            ("b.md", "quote `%% note: b.md` here\n  %% note: indented", &["q"]),
        ]));
    }

    #[test]
    fn blank_and_whitespace_only_bodies_round_trip() {
        assert_round_trip(&entries_of(&[
            ("a.md", "", &[]),
            ("b.md", "", &["only-tags"]),
            ("c.md", "after blanks", &[]),
        ]));

        let config = SyncConfig::default();
        let options = ComposeOptions::default();
        let whitespace = entries_of(&[("a.md", "   \n\t\n", &[])]);
        let summary = compose(&whitespace, options, &config);
        let parsed = parse(&summary.text, &summary.records, options, &config).unwrap();
        assert_eq!(parsed[0].text, "");
    }

    #[test]
    fn exact_date_lines_inside_bodies_survive() {
        assert_round_trip(&entries_of(&[
            ("a.md", "## Journal: 2024-02-01", &[]),
            ("b.md", "intro\n## Journal: 1999-12-31\noutro", &["t"]),
            ("c.md", "ends with\n## Journal: 2024-02-03", &[]),
        ]));
    }

    #[test]
    fn composed_date_lines_are_stripped_even_with_trailing_blanks() {
        let config = SyncConfig::default();
        let options = ComposeOptions::default();
        let summary = compose(&entries(), options, &config);
        let edited = summary
            .text
            .replacen("## Journal: 2024-02-01\n", "## Journal: 2024-02-01  \n", 1);

        let parsed = parse(&edited, &summary.records, options, &config).unwrap();
        assert_eq!(parsed, summary.records);
    }

    #[test]
    fn removed_header_is_a_segment_count_error() {
        let config = SyncConfig::default();
        let options = ComposeOptions::default();
        let summary = compose(&entries(), options, &config);
        let edited = summary.text.replacen("%% note: b.md\n", "", 1);

        let err = parse(&edited, &summary.records, options, &config).unwrap_err();
        assert_eq!(
            err,
            SummaryError::SegmentCount {
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn added_header_is_a_segment_count_error() {
        let config = SyncConfig::default();
        let options = ComposeOptions::default();
        let summary = compose(&entries(), options, &config);
        let edited = format!("{}%% note: extra.md\n\nnew\n", summary.text);

        let err = parse(&edited, &summary.records, options, &config).unwrap_err();
        assert!(matches!(err, SummaryError::SegmentCount { found: 4, .. }));
    }

    #[test]
    fn text_before_first_header_is_rejected() {
        let config = SyncConfig::default();
        let options = ComposeOptions::default();
        let summary = compose(&entries(), options, &config);
        let edited = format!("stray line\n{}", summary.text);

        let err = parse(&edited, &summary.records, options, &config).unwrap_err();
        assert_eq!(err, SummaryError::UnattributedText);
    }

    #[test]
    fn swapped_segments_are_rejected() {
        let config = SyncConfig::default();
        let options = ComposeOptions {
            show_date: false,
            show_tags: false,
        };
        let summary = compose(&entries(), options, &config);
        let edited = summary
            .text
            .replacen("a.md", "TMP", 1)
            .replacen("b.md", "a.md", 1)
            .replacen("TMP", "b.md", 1);

        let err = parse(&edited, &summary.records, options, &config).unwrap_err();
        assert!(matches!(err, SummaryError::HeaderMismatch { position: 0, .. }));
    }

    #[test]
    fn edited_tags_are_reparsed_when_shown() {
        let config = SyncConfig::default();
        let options = ComposeOptions {
            show_date: true,
            show_tags: true,
        };
        let summary = compose(&entries(), options, &config);
        let edited = summary.text.replacen("::x\n", "::x\n::added\n", 1);

        let parsed = parse(&edited, &summary.records, options, &config).unwrap();
        assert_eq!(parsed[0].tags, vec!["x", "added"]);
        assert_eq!(parsed[1], summary.records[1]);
    }

    #[test]
    fn hidden_tags_are_carried_over() {
        let config = SyncConfig::default();
        let options = ComposeOptions::default();
        let summary = compose(&entries(), options, &config);
        let edited = summary.text.replacen("gamma", "gamma ray", 1);

        let parsed = parse(&edited, &summary.records, options, &config).unwrap();
        assert_eq!(parsed[2].text, "gamma ray");
        assert_eq!(parsed[2].tags, vec!["y", "z"]);
    }
}
