use super::ComposeOptions;
use crate::config::SyncConfig;
use crate::model::record::{Record, RecordEntry};
use chrono::NaiveDate;

/// Composed aggregate document plus the record order it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedSummary {
    pub text: String,
    /// Records in document order (ascending modification time).
    pub records: Vec<Record>,
}

/// Renders `entries` oldest first into one aggregate document.
///
/// Ties on modification time are broken by path so the order is stable.
pub fn compose(
    entries: &[RecordEntry],
    options: ComposeOptions,
    config: &SyncConfig,
) -> ComposedSummary {
    let mut ordered: Vec<&RecordEntry> = entries.iter().collect();
    ordered.sort_by(|left, right| {
        left.modified
            .cmp(&right.modified)
            .then_with(|| left.record.path.cmp(&right.record.path))
    });

    let mut text = String::new();
    let mut last_date: Option<NaiveDate> = None;
    for entry in &ordered {
        if options.show_date {
            let date = entry.modified.date_naive();
            if last_date != Some(date) {
                text.push_str(&config.date_header);
                text.push_str(&date.format("%Y-%m-%d").to_string());
                text.push('\n');
                last_date = Some(date);
            }
        }

        text.push_str(&config.record_header);
        text.push_str(&entry.record.path.file_name());
        text.push_str("\n\n");

        if options.show_tags {
            text.push_str(&entry.record.serialize(&config.tag_marker));
        } else {
            text.push_str(entry.record.text.trim());
            text.push_str("\n\n");
        }
        text.push('\n');
    }

    ComposedSummary {
        text,
        records: ordered.into_iter().map(|entry| entry.record.clone()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::compose;
    use crate::config::SyncConfig;
    use crate::model::record::{Record, RecordEntry};
    use crate::summary::ComposeOptions;
    use chrono::{TimeZone, Utc};

    fn entry(name: &str, text: &str, tags: &[&str], day: u32, hour: u32) -> RecordEntry {
        RecordEntry {
            record: Record::new(
                format!("/notes/{name}"),
                text,
                tags.iter().map(|tag| tag.to_string()).collect(),
            ),
            modified: Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn sorts_oldest_first_and_groups_dates() {
        let config = SyncConfig::default();
        let entries = vec![
            entry("c.md", "third", &[], 2, 9),
            entry("a.md", "first", &[], 1, 8),
            entry("b.md", "second", &[], 1, 20),
        ];

        let summary = compose(&entries, ComposeOptions::default(), &config);
        assert_eq!(
            summary.text,
            "## Journal: 2024-01-01\n\
             %% note: a.md\n\nfirst\n\n\n\
             %% note: b.md\n\nsecond\n\n\n\
             ## Journal: 2024-01-02\n\
             %% note: c.md\n\nthird\n\n\n"
        );
        let order: Vec<String> = summary
            .records
            .iter()
            .map(|record| record.path.file_name())
            .collect();
        assert_eq!(order, vec!["a.md", "b.md", "c.md"]);
    }

    #[test]
    fn hides_dates_and_optionally_shows_tags() {
        let config = SyncConfig::default();
        let entries = vec![entry("a.md", "body", &["work"], 1, 8)];

        let hidden = compose(
            &entries,
            ComposeOptions {
                show_date: false,
                show_tags: false,
            },
            &config,
        );
        assert_eq!(hidden.text, "%% note: a.md\n\nbody\n\n\n");

        let shown = compose(
            &entries,
            ComposeOptions {
                show_date: false,
                show_tags: true,
            },
            &config,
        );
        assert_eq!(shown.text, "%% note: a.md\n\nbody\n\n::work\n\n");
    }

    #[test]
    fn every_record_gets_exactly_one_header() {
        let config = SyncConfig::default();
        let entries: Vec<RecordEntry> = (1..=5)
            .map(|idx| entry(&format!("n{idx}.md"), "same body", &[], 1, idx))
            .collect();

        let summary = compose(&entries, ComposeOptions::default(), &config);
        assert_eq!(summary.text.matches(&config.record_header).count(), 5);
        assert_eq!(summary.text.matches(&config.date_header).count(), 1);
    }
}
