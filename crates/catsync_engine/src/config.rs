//! Configuration for synchronization runs.

use crate::error::{SyncError, SyncResult};
use crate::target::IndexType;
use catsync_job::{DependencyTable, DomainType};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Describes a source or target system connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfiguration {
    /// Display name of the system.
    pub name: String,
    /// Connection URL.
    pub url: String,
    /// Login name, if the system requires one.
    #[serde(default)]
    pub login: Option<String>,
}

impl ConnectionConfiguration {
    /// Creates a connection description.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            login: None,
        }
    }

    /// Sets the login name.
    pub fn with_login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    /// Reads a connection description from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| {
            SyncError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_slice(&data).map_err(|e| {
            SyncError::Configuration(format!("invalid connection file {}: {e}", path.display()))
        })
    }
}

/// The kind of synchronization a controller performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerKind {
    /// Build the job from the source and apply it to the target.
    Full,
    /// Like `Full`, and persist the descriptor and job first.
    FullAndSave,
    /// Build the job from the source and persist it without applying.
    Export,
    /// Apply a previously persisted job to the target.
    Load,
}

impl ControllerKind {
    /// Returns the mode name.
    pub fn name(&self) -> &'static str {
        match self {
            ControllerKind::Full => "full",
            ControllerKind::FullAndSave => "fullandsave",
            ControllerKind::Export => "export",
            ControllerKind::Load => "load",
        }
    }

    /// Returns true if this kind reads from the source system.
    pub fn uses_source(&self) -> bool {
        !matches!(self, ControllerKind::Load)
    }

    /// Returns true if this kind writes to the target system.
    pub fn uses_target(&self) -> bool {
        !matches!(self, ControllerKind::Export)
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ControllerKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(ControllerKind::Full),
            "fullandsave" => Ok(ControllerKind::FullAndSave),
            "export" => Ok(ControllerKind::Export),
            "load" => Ok(ControllerKind::Load),
            other => Err(SyncError::Configuration(format!(
                "unknown synchronization mode: {other}"
            ))),
        }
    }
}

/// Per-run job configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncJobConfiguration {
    /// Change selector handed to the source adapter, e.g. comma-separated
    /// change set names.
    pub adapter_parameter: Option<String>,
    /// Root directory for persisted jobs.
    pub root_path: Option<PathBuf>,
    /// Job directory below `root_path` to load from.
    pub sub_dir: Option<String>,
    /// Source system.
    pub source: Option<ConnectionConfiguration>,
    /// Target system.
    pub target: Option<ConnectionConfiguration>,
}

impl SyncJobConfiguration {
    /// Creates a configuration for a change selector.
    pub fn new(adapter_parameter: impl Into<String>) -> Self {
        Self {
            adapter_parameter: Some(adapter_parameter.into()),
            ..Self::default()
        }
    }

    /// Sets the root directory for persisted jobs.
    pub fn with_root_path(mut self, root_path: impl Into<PathBuf>) -> Self {
        self.root_path = Some(root_path.into());
        self
    }

    /// Sets the job directory to load from.
    pub fn with_sub_dir(mut self, sub_dir: impl Into<String>) -> Self {
        self.sub_dir = Some(sub_dir.into());
        self
    }

    /// Sets the source system.
    pub fn with_source(mut self, source: ConnectionConfiguration) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the target system.
    pub fn with_target(mut self, target: ConnectionConfiguration) -> Self {
        self.target = Some(target);
        self
    }

    /// Checks that every value the controller kind needs is present.
    pub fn validate(&self, kind: ControllerKind) -> SyncResult<()> {
        let has_selector = self
            .adapter_parameter
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());

        let mut missing = Vec::new();
        if kind.uses_source() {
            if !has_selector {
                missing.push("adapter parameter");
            }
            if self.source.is_none() {
                missing.push("source configuration");
            }
        }
        if kind.uses_target() && self.target.is_none() {
            missing.push("target configuration");
        }
        if matches!(
            kind,
            ControllerKind::FullAndSave | ControllerKind::Export | ControllerKind::Load
        ) && self.root_path.is_none()
        {
            missing.push("root path");
        }
        if kind == ControllerKind::Load && self.sub_dir.is_none() {
            missing.push("sub dir");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Configuration(format!(
                "{kind} synchronization requires: {}",
                missing.join(", ")
            )))
        }
    }

    /// Returns the persisted-job root, or a configuration error.
    pub fn require_root_path(&self) -> SyncResult<&Path> {
        self.root_path
            .as_deref()
            .ok_or_else(|| SyncError::Configuration("root path is not set".into()))
    }

    /// Returns the job directory name, or a configuration error.
    pub fn require_sub_dir(&self) -> SyncResult<&str> {
        self.sub_dir
            .as_deref()
            .ok_or_else(|| SyncError::Configuration("sub dir is not set".into()))
    }
}

/// Engine-wide settings shared by all runs.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Materialize source objects while building the job.
    pub preload: bool,
    /// Types whose updates are applied with the target's change tracking suppressed.
    pub ignore_changes_types: HashSet<DomainType>,
    /// Search index fed by each type. Unmapped types are not indexed.
    pub index_types: HashMap<DomainType, IndexType>,
    /// Dependency precedence used to order entries.
    pub dependency_table: DependencyTable,
}

impl EngineSettings {
    /// Creates the standard settings.
    pub fn new() -> Self {
        Self {
            preload: false,
            ignore_changes_types: HashSet::from([DomainType::BaseAmount]),
            index_types: HashMap::from([
                (DomainType::Product, IndexType::Product),
                (DomainType::ProductSku, IndexType::Sku),
                (DomainType::Category, IndexType::Category),
                (DomainType::CouponConfig, IndexType::Promotion),
            ]),
            dependency_table: DependencyTable::standard(),
        }
    }

    /// Sets whether source objects are materialized at build time.
    pub fn with_preload(mut self, preload: bool) -> Self {
        self.preload = preload;
        self
    }

    /// Adds a type to the ignore-changes set.
    pub fn with_ignore_changes_type(mut self, domain_type: DomainType) -> Self {
        self.ignore_changes_types.insert(domain_type);
        self
    }

    /// Maps a type to a search index.
    pub fn with_index_type(mut self, domain_type: DomainType, index_type: IndexType) -> Self {
        self.index_types.insert(domain_type, index_type);
        self
    }

    /// Replaces the dependency table.
    pub fn with_dependency_table(mut self, table: DependencyTable) -> Self {
        self.dependency_table = table;
        self
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn source() -> ConnectionConfiguration {
        ConnectionConfiguration::new("author", "mem://author")
    }

    fn target() -> ConnectionConfiguration {
        ConnectionConfiguration::new("live", "mem://live").with_login("publisher")
    }

    #[test]
    fn full_requires_selector_and_both_systems() {
        let config = SyncJobConfiguration::new("cs-1")
            .with_source(source())
            .with_target(target());
        config.validate(ControllerKind::Full).unwrap();

        let err = SyncJobConfiguration::default()
            .with_source(source())
            .validate(ControllerKind::Full)
            .unwrap_err();
        assert!(err.is_fatal());
        let message = err.to_string();
        assert!(message.contains("adapter parameter"));
        assert!(message.contains("target configuration"));
        assert!(!message.contains("root path"));
    }

    #[test]
    fn blank_selector_rejected() {
        let config = SyncJobConfiguration::new("  ")
            .with_source(source())
            .with_target(target());
        assert!(config.validate(ControllerKind::Full).is_err());
    }

    #[test]
    fn per_mode_requirements() {
        let full = SyncJobConfiguration::new("cs-1")
            .with_source(source())
            .with_target(target());
        assert!(full.validate(ControllerKind::FullAndSave).is_err());
        full.clone()
            .with_root_path("/tmp/jobs")
            .validate(ControllerKind::FullAndSave)
            .unwrap();

        let export = SyncJobConfiguration::new("cs-1")
            .with_source(source())
            .with_root_path("/tmp/jobs");
        export.validate(ControllerKind::Export).unwrap();

        let load = SyncJobConfiguration::default()
            .with_target(target())
            .with_root_path("/tmp/jobs");
        assert!(load.validate(ControllerKind::Load).is_err());
        load.with_sub_dir("job-1")
            .validate(ControllerKind::Load)
            .unwrap();
    }

    #[test]
    fn controller_kind_names() {
        for kind in [
            ControllerKind::Full,
            ControllerKind::FullAndSave,
            ControllerKind::Export,
            ControllerKind::Load,
        ] {
            assert_eq!(kind.name().parse::<ControllerKind>().unwrap(), kind);
        }
        assert_eq!("FullAndSave".parse::<ControllerKind>().unwrap(), ControllerKind::FullAndSave);
        assert!("mirror".parse::<ControllerKind>().is_err());
    }

    #[test]
    fn connection_loaded_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("target.json");
        fs::write(&path, r#"{"name":"live","url":"mem://live","login":"publisher"}"#).unwrap();

        assert_eq!(ConnectionConfiguration::load(&path).unwrap(), target());

        fs::write(&path, "not json").unwrap();
        assert!(ConnectionConfiguration::load(&path).unwrap_err().is_fatal());
        assert!(ConnectionConfiguration::load(dir.path().join("missing.json"))
            .unwrap_err()
            .is_fatal());
    }

    #[test]
    fn default_settings() {
        let settings = EngineSettings::default();
        assert!(!settings.preload);
        assert!(settings.ignore_changes_types.contains(&DomainType::BaseAmount));
        assert_eq!(settings.index_types.get(&DomainType::Product), Some(&IndexType::Product));
        assert!(!settings.index_types.contains_key(&DomainType::BaseAmount));
        assert_eq!(settings.dependency_table.rank(DomainType::Catalog), Some(0));
    }
}
