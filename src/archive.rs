//! Offline capture: batches are written to local files instead of being
//! uploaded.
//!
//! Each transfer start creates a fresh timestamped file under the archive
//! directory; appends go to the most recent file for that target. Earlier
//! attempts are kept on disk.

use crate::error::TransportError;
use crate::transport::{CaptureTransport, TransferTarget};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub struct ArchiveTransport {
    root: PathBuf,
    open: RefCell<HashMap<TransferTarget, PathBuf>>,
}

impl ArchiveTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            open: RefCell::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File currently receiving batches for `target`
    pub fn current_file(&self, target: &TransferTarget) -> Option<PathBuf> {
        self.open.borrow().get(target).cloned()
    }

    fn file_name(target: &TransferTarget) -> String {
        let name: String = target
            .describe()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S%.3f");
        format!("{}_{}.bin", name, timestamp)
    }
}

impl CaptureTransport for ArchiveTransport {
    async fn start_transfer(&self, target: &TransferTarget) -> Result<(), TransportError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(TransportError::Archive)?;

        let path = self.root.join(Self::file_name(target));
        tokio::fs::File::create(&path)
            .await
            .map_err(TransportError::Archive)?;

        log::info!("Archiving {} to {}", target.describe(), path.display());
        self.open.borrow_mut().insert(target.clone(), path);
        Ok(())
    }

    async fn append_batch(&self, target: &TransferTarget, data: Vec<u8>) -> Result<(), TransportError> {
        let path = self.current_file(target).ok_or_else(|| {
            TransportError::Archive(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no transfer started for {}", target.describe()),
            ))
        })?;

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .map_err(TransportError::Archive)?;
        file.write_all(&data).await.map_err(TransportError::Archive)?;
        file.flush().await.map_err(TransportError::Archive)?;

        log::debug!("Archived {} bytes to {}", data.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PoseSequence, RecordSliceExt};
    use crate::testing::sample_sequence;
    use crate::trial::GestureLocator;
    use tempfile::TempDir;

    fn gesture(index: &str) -> TransferTarget {
        TransferTarget::Gesture(GestureLocator {
            project_name: "asl".to_string(),
            participant_id: "p/1".to_string(),
            trial_id: "t1".to_string(),
            gesture_index: index.to_string(),
        })
    }

    #[tokio::test]
    async fn test_batches_are_concatenated_in_order() {
        let dir = TempDir::new().unwrap();
        let archive = ArchiveTransport::new(dir.path().join("captures"));
        let target = gesture("0");
        let sequence = sample_sequence(6, 0.0, 0.1);
        let records = sequence.records().unwrap();
        let (first, second) = records.split_at(2);

        archive.start_transfer(&target).await.unwrap();
        archive.append_batch(&target, first.encode()).await.unwrap();
        archive.append_batch(&target, second.encode()).await.unwrap();

        let path = archive.current_file(&target).unwrap();
        assert!(path.starts_with(dir.path().join("captures")));
        let stored = PoseSequence::from_bytes(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(stored, sequence);
    }

    #[tokio::test]
    async fn test_file_name_is_sanitised() {
        let dir = TempDir::new().unwrap();
        let archive = ArchiveTransport::new(dir.path());
        let target = gesture("3");

        archive.start_transfer(&target).await.unwrap();

        let name = archive
            .current_file(&target)
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(name.starts_with("asl_p_1_t1_3_"), "{}", name);
        assert!(name.ends_with(".bin"));
    }

    #[tokio::test]
    async fn test_targets_are_archived_separately() {
        let dir = TempDir::new().unwrap();
        let archive = ArchiveTransport::new(dir.path());
        let demo = TransferTarget::Demonstration {
            short_code: "K3X9".to_string(),
        };

        archive.start_transfer(&gesture("0")).await.unwrap();
        archive.start_transfer(&demo).await.unwrap();
        archive.append_batch(&demo, vec![1, 2, 3, 4]).await.unwrap();

        assert_ne!(archive.current_file(&gesture("0")), archive.current_file(&demo));
        let gesture_file = archive.current_file(&gesture("0")).unwrap();
        assert!(std::fs::read(gesture_file).unwrap().is_empty());
        assert_eq!(std::fs::read(archive.current_file(&demo).unwrap()).unwrap(), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_append_without_start_fails() {
        let dir = TempDir::new().unwrap();
        let archive = ArchiveTransport::new(dir.path());

        let result = archive.append_batch(&gesture("0"), vec![0; 4]).await;

        assert!(matches!(result, Err(TransportError::Archive(e)) if e.kind() == io::ErrorKind::NotFound));
    }
}
