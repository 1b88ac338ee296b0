//! Immutable runtime configuration.
//!
//! # Responsibility
//! - Hold every path, marker, interval and command used by the sync engine.
//! - Load settings from TOML with defaults and environment overrides.
//!
//! # Invariants
//! - A `SyncConfig` is validated once and never mutated afterwards.
//! - Header prefixes never contain the tag marker or each other, so segment
//!   splitting stays unambiguous.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "notesync.toml";

const ENV_NOTE_DIR: &str = "NOTESYNC_NOTE_DIR";
const ENV_EDITOR: &str = "NOTESYNC_EDITOR";

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "invalid config `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Complete configuration for one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory holding one file per record.
    pub note_dir: PathBuf,
    /// Scratch directory for aggregate documents.
    pub summary_dir: PathBuf,
    /// Scratch directory for single-record merge files.
    pub merge_dir: PathBuf,
    /// Rolling log directory.
    pub log_dir: PathBuf,
    /// `trace|debug|info|warn|error`; `None` uses the build-mode default.
    pub log_level: Option<String>,
    /// Prefix of every tag line in a record file.
    pub tag_marker: String,
    /// Prefix of the per-record header line in an aggregate document.
    pub record_header: String,
    /// Prefix of the date-group header line in an aggregate document.
    pub date_header: String,
    /// Prefix of insert/delete lines in a merge file.
    pub conflict_marker: String,
    /// Editor argv; the target path is appended as the last argument.
    pub editor: Vec<String>,
    /// Viewer argv for read-only mode; falls back to `editor`.
    pub viewer: Option<Vec<String>>,
    /// Grep-compatible program used for record selection.
    pub search_program: String,
    /// Bounded wait per poll tick while the editor is open.
    pub propagate_interval_ms: u64,
    /// Maximum number of aggregate documents kept in `summary_dir`.
    pub max_retained_summaries: usize,
    /// Maximum number of merge files kept in `merge_dir`.
    pub max_retained_merges: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            note_dir: PathBuf::from("notes"),
            summary_dir: PathBuf::from(".notesync/summaries"),
            merge_dir: PathBuf::from(".notesync/merges"),
            log_dir: PathBuf::from(".notesync/logs"),
            log_level: None,
            tag_marker: "::".to_string(),
            record_header: "%% note: ".to_string(),
            date_header: "## Journal: ".to_string(),
            conflict_marker: "!! ".to_string(),
            editor: vec!["vim".to_string()],
            viewer: None,
            search_program: "grep".to_string(),
            propagate_interval_ms: 1_000,
            max_retained_summaries: 20,
            max_retained_merges: 20,
        }
    }
}

impl SyncConfig {
    /// Loads configuration from `path`, then applies environment overrides.
    ///
    /// A missing file yields defaults. Malformed TOML is an error.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let mut config = match fs::read_to_string(path) {
            Ok(raw) => toml::from_str::<Self>(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides supplied by `lookup` (usually the process env).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_NOTE_DIR).filter(|value| !value.trim().is_empty()) {
            self.note_dir = PathBuf::from(dir.trim());
        }
        if let Some(editor) = lookup(ENV_EDITOR) {
            let argv: Vec<String> = editor.split_whitespace().map(str::to_string).collect();
            if !argv.is_empty() {
                self.editor = argv;
            }
        }
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, value) in [
            ("tag_marker", &self.tag_marker),
            ("record_header", &self.record_header),
            ("date_header", &self.date_header),
            ("conflict_marker", &self.conflict_marker),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("`{name}` cannot be empty")));
            }
            if value.contains('\n') {
                return Err(ConfigError::Invalid(format!(
                    "`{name}` must fit on one line"
                )));
            }
        }

        if self.record_header.contains(&self.tag_marker)
            || self.date_header.contains(&self.tag_marker)
        {
            return Err(ConfigError::Invalid(format!(
                "header prefixes must not contain the tag marker `{}`",
                self.tag_marker
            )));
        }
        if self.record_header.contains(&self.date_header)
            || self.date_header.contains(&self.record_header)
        {
            return Err(ConfigError::Invalid(
                "`record_header` and `date_header` must not contain each other".to_string(),
            ));
        }

        if self.editor.first().map_or(true, |program| program.trim().is_empty()) {
            return Err(ConfigError::Invalid("`editor` cannot be empty".to_string()));
        }
        if let Some(viewer) = &self.viewer {
            if viewer.first().map_or(true, |program| program.trim().is_empty()) {
                return Err(ConfigError::Invalid("`viewer` cannot be empty".to_string()));
            }
        }
        if self.propagate_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "`propagate_interval_ms` must be positive".to_string(),
            ));
        }
        for (name, cap) in [
            ("max_retained_summaries", self.max_retained_summaries),
            ("max_retained_merges", self.max_retained_merges),
        ] {
            if cap == 0 {
                return Err(ConfigError::Invalid(format!("`{name}` must be positive")));
            }
        }
        Ok(())
    }

    /// Poll interval as a `Duration`.
    pub fn propagate_interval(&self) -> Duration {
        Duration::from_millis(self.propagate_interval_ms)
    }

    /// Replaces the viewer argv with a whitespace-split command line.
    pub fn with_viewer(mut self, command: &str) -> ConfigResult<Self> {
        self.viewer = Some(command.split_whitespace().map(str::to_string).collect());
        self.validate()?;
        Ok(self)
    }

    /// Argv used by read-only view mode.
    pub fn viewer_command(&self) -> &[String] {
        self.viewer.as_deref().unwrap_or(&self.editor)
    }

    /// Rebases every relative directory onto `base`.
    pub fn resolved_against(mut self, base: &Path) -> Self {
        for dir in [
            &mut self.note_dir,
            &mut self.summary_dir,
            &mut self.merge_dir,
            &mut self.log_dir,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, SyncConfig};
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        SyncConfig::default()
            .validate()
            .expect("defaults should validate");
    }

    #[test]
    fn load_from_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::load_from(dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.tag_marker, "::");
        assert_eq!(config.max_retained_summaries, 20);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notesync.toml");
        fs::write(
            &path,
            "tag_marker = \"@@\"\neditor = [\"nano\", \"-w\"]\npropagate_interval_ms = 250\n",
        )
        .unwrap();

        let config = SyncConfig::load_from(&path).unwrap();
        assert_eq!(config.tag_marker, "@@");
        assert_eq!(config.propagate_interval_ms, 250);
        assert_eq!(config.record_header, "%% note: ");
    }

    #[test]
    fn invalid_toml_is_reported_with_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "tag_marker = [").unwrap();

        let err = SyncConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn header_containing_tag_marker_is_rejected() {
        let config = SyncConfig {
            record_header: ":: note ".to_string(),
            ..SyncConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tag marker"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = SyncConfig {
            propagate_interval_ms: 0,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn scratch_caps_are_validated_separately() {
        let config = SyncConfig {
            max_retained_merges: 0,
            ..SyncConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_retained_merges"));

        let raw = "max_retained_summaries = 5\nmax_retained_merges = 3\n";
        let parsed: SyncConfig = toml::from_str(raw).unwrap();
        assert_eq!(parsed.max_retained_summaries, 5);
        assert_eq!(parsed.max_retained_merges, 3);
    }

    #[test]
    fn viewer_override_is_split_and_validated() {
        let config = SyncConfig::default().with_viewer("less -R").unwrap();
        assert_eq!(config.viewer_command(), ["less".to_string(), "-R".to_string()]);
        assert_eq!(config.editor, vec!["vim".to_string()]);

        assert!(SyncConfig::default().with_viewer("   ").is_err());
    }

    #[test]
    fn env_overrides_replace_editor_and_note_dir() {
        let env: HashMap<&str, &str> = [
            ("NOTESYNC_EDITOR", "code --wait"),
            ("NOTESYNC_NOTE_DIR", "/tmp/notes"),
        ]
        .into_iter()
        .collect();
        let mut config = SyncConfig::default();
        config.apply_env_overrides(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.editor, vec!["code".to_string(), "--wait".to_string()]);
        assert_eq!(config.note_dir, PathBuf::from("/tmp/notes"));
    }

    #[test]
    fn resolved_against_keeps_absolute_dirs() {
        let config = SyncConfig {
            note_dir: PathBuf::from("/abs/notes"),
            ..SyncConfig::default()
        }
        .resolved_against(Path::new("/work"));

        assert_eq!(config.note_dir, PathBuf::from("/abs/notes"));
        assert_eq!(config.summary_dir, PathBuf::from("/work/.notesync/summaries"));
    }

    #[test]
    fn config_serializes_with_flat_field_names() {
        let json = serde_json::to_value(SyncConfig::default()).unwrap();
        assert_eq!(json["tag_marker"], "::");
        assert_eq!(json["propagate_interval_ms"], 1000);
    }
}
