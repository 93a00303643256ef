//! Job persistence.
//!
//! Descriptors and transaction jobs are persisted so that a job built in
//! one run can be audited or replayed by a later load-only run.

use crate::descriptor::JobDescriptor;
use crate::error::{JobError, JobResult};
use crate::job::TransactionJob;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const DESCRIPTOR_FILE: &str = "descriptor.json";
const TRANSACTION_JOB_FILE: &str = "transaction_job.json";
const TEMP_SUFFIX: &str = ".tmp";

/// Persists job descriptors.
pub trait JobDescriptorDao: Send + Sync {
    /// Saves a descriptor, replacing any previous one with the same id.
    fn save_descriptor(&self, descriptor: &JobDescriptor) -> JobResult<()>;

    /// Loads the descriptor with `id`.
    fn load_descriptor(&self, id: &str) -> JobResult<JobDescriptor>;
}

/// Persists transaction jobs.
pub trait TransactionJobDao: Send + Sync {
    /// Saves a job, replacing any previous one with the same id.
    fn save_job(&self, job: &TransactionJob) -> JobResult<()>;

    /// Loads the job with `id`.
    fn load_job(&self, id: &str) -> JobResult<TransactionJob>;
}

/// A job store that keeps one directory per job under a root directory.
///
/// Layout:
/// ```text
/// <root>/<job id>/descriptor.json
/// <root>/<job id>/transaction_job.json
/// ```
///
/// Files are written to a temporary name, synced and renamed into place.
#[derive(Debug, Clone)]
pub struct FileJobStore {
    root: PathBuf,
}

impl FileJobStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory for a job id.
    pub fn job_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn write<T: Serialize>(&self, id: &str, file_name: &str, value: &T) -> JobResult<()> {
        let dir = self.job_dir(id);
        fs::create_dir_all(&dir)?;

        let path = dir.join(file_name);
        let temp_path = dir.join(format!("{file_name}{TEMP_SUFFIX}"));
        let data = serde_json::to_vec_pretty(value)?;

        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &path)?;
        tracing::debug!(path = %path.display(), "persisted job file");
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, id: &str, file_name: &str) -> JobResult<T> {
        let path = self.job_dir(id).join(file_name);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(JobError::JobNotFound { id: id.to_string() })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&data)?)
    }
}

impl JobDescriptorDao for FileJobStore {
    fn save_descriptor(&self, descriptor: &JobDescriptor) -> JobResult<()> {
        self.write(&descriptor.id.to_string(), DESCRIPTOR_FILE, descriptor)
    }

    fn load_descriptor(&self, id: &str) -> JobResult<JobDescriptor> {
        self.read(id, DESCRIPTOR_FILE)
    }
}

impl TransactionJobDao for FileJobStore {
    fn save_job(&self, job: &TransactionJob) -> JobResult<()> {
        self.write(&job.id.to_string(), TRANSACTION_JOB_FILE, job)
    }

    fn load_job(&self, id: &str) -> JobResult<TransactionJob> {
        self.read(id, TRANSACTION_JOB_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TransactionJobDescriptorEntry;
    use crate::domain::{ChangeKind, DomainType};
    use crate::job::{JobEntry, TransactionJobUnit};
    use crate::object::{DomainSnapshot, ProductSnapshot, SerializableObject};
    use tempfile::tempdir;

    fn sample_descriptor() -> JobDescriptor {
        let mut descriptor = JobDescriptor::new("cs-1");
        descriptor.push(TransactionJobDescriptorEntry::new(
            DomainType::Product,
            "prod-1",
            ChangeKind::Update,
            "cs-1",
        ));
        descriptor
    }

    fn sample_job(descriptor: &JobDescriptor) -> TransactionJob {
        let mut unit = TransactionJobUnit::new("cs-1");
        unit.push(
            JobEntry::new(DomainType::Product, "prod-1", ChangeKind::Update).with_object(
                SerializableObject::new(
                    "prod-1",
                    DomainSnapshot::Product(ProductSnapshot {
                        code: "P1".into(),
                        category_guids: vec!["cat-1".into()],
                    }),
                ),
            ),
        );
        unit.push(JobEntry::new(DomainType::Category, "cat-9", ChangeKind::Delete));
        let mut job = TransactionJob::new(descriptor.id);
        job.push(unit);
        job.push(TransactionJobUnit::new("cs-2"));
        job
    }

    #[test]
    fn file_store_persists_descriptor_and_job() {
        let dir = tempdir().unwrap();
        let store = FileJobStore::new(dir.path().join("jobs"));
        let descriptor = sample_descriptor();
        let job = sample_job(&descriptor);
        let id = descriptor.id.to_string();

        store.save_descriptor(&descriptor).unwrap();
        store.save_job(&job).unwrap();

        assert!(store.job_dir(&id).join(DESCRIPTOR_FILE).exists());
        assert!(store.job_dir(&id).join(TRANSACTION_JOB_FILE).exists());
        assert!(!store
            .job_dir(&id)
            .join(format!("{TRANSACTION_JOB_FILE}{TEMP_SUFFIX}"))
            .exists());

        let reopened = FileJobStore::new(dir.path().join("jobs"));
        assert_eq!(reopened.load_descriptor(&id).unwrap(), descriptor);

        let loaded = reopened.load_job(&id).unwrap();
        assert_eq!(loaded, job);
        let names: Vec<_> = loaded.units().iter().map(|u| u.name()).collect();
        assert_eq!(names, vec!["cs-1", "cs-2"]);
    }

    #[test]
    fn file_store_missing_job() {
        let dir = tempdir().unwrap();
        let store = FileJobStore::new(dir.path());

        let err = store.load_job("nope").unwrap_err();
        assert!(matches!(err, JobError::JobNotFound { ref id } if id == "nope"));
    }

    #[test]
    fn file_store_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let store = FileJobStore::new(dir.path());
        fs::create_dir_all(store.job_dir("broken")).unwrap();
        fs::write(store.job_dir("broken").join(TRANSACTION_JOB_FILE), b"{not json").unwrap();

        let err = store.load_job("broken").unwrap_err();
        assert!(matches!(err, JobError::Serialization(_)));
    }
}
