use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

/// Storage seam for uploaded profile pictures. `save` returns the public
/// path (`/uploads/...`) persisted on the user record.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn save(&self, original_name: &str, body: Bytes) -> anyhow::Result<String>;
    async fn delete(&self, public_path: &str) -> anyhow::Result<()>;
}

/// Extension of the final path component, lowercased. Any directory parts
/// the client smuggled into the filename are discarded first.
pub fn file_extension(filename: &str) -> Option<String> {
    let base = Path::new(filename).file_name()?.to_str()?;
    let (_, ext) = base.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

pub fn allowed_file(filename: &str, allowed: &[String]) -> bool {
    match file_extension(filename) {
        Some(ext) => allowed.iter().any(|a| a == &ext),
        None => false,
    }
}

/// Local-disk storage under a server-controlled directory. Stored names are
/// derived (`{uuid}.{ext}`), never the client-supplied path.
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("create upload dir {}", root.display()))?;
        Ok(Self { root })
    }
}

#[async_trait]
impl StorageClient for DiskStorage {
    async fn save(&self, original_name: &str, body: Bytes) -> anyhow::Result<String> {
        let ext = file_extension(original_name)
            .ok_or_else(|| anyhow::anyhow!("filename has no extension: {original_name}"))?;
        let stored = format!("{}.{}", Uuid::new_v4(), ext);
        let path = self.root.join(&stored);
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write upload {}", path.display()))?;
        debug!(original = %original_name, stored = %stored, "upload saved");
        Ok(format!("/uploads/{stored}"))
    }

    async fn delete(&self, public_path: &str) -> anyhow::Result<()> {
        // Only paths we handed out ourselves are deletable.
        let name = public_path
            .strip_prefix("/uploads/")
            .ok_or_else(|| anyhow::anyhow!("not an upload path: {public_path}"))?;
        anyhow::ensure!(
            Path::new(name).file_name().map(|f| f == name).unwrap_or(false),
            "invalid upload name: {name}"
        );
        tokio::fs::remove_file(self.root.join(name))
            .await
            .with_context(|| format!("remove upload {name}"))?;
        Ok(())
    }
}

/// Validate an uploaded picture against the configured allow-list and hand
/// it to the storage backend, returning the public path.
pub async fn store_profile_pic(
    state: &crate::state::AppState,
    file: &crate::users::forms::UploadedFile,
) -> Result<String, crate::error::ApiError> {
    if !allowed_file(&file.filename, &state.config.upload.allowed_extensions) {
        return Err(crate::error::ApiError::Validation(
            "unsupported file type".into(),
        ));
    }
    state
        .storage
        .save(&file.filename, file.body.clone())
        .await
        .map_err(crate::error::ApiError::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec!["png".into(), "jpg".into(), "jpeg".into(), "gif".into()]
    }

    #[test]
    fn extension_is_lowercased_and_path_stripped() {
        assert_eq!(file_extension("photo.PNG").as_deref(), Some("png"));
        assert_eq!(file_extension("../../etc/passwd.jpg").as_deref(), Some("jpg"));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension("trailingdot."), None);
    }

    #[test]
    fn allow_list_is_enforced() {
        assert!(allowed_file("me.png", &allowed()));
        assert!(allowed_file("me.JPEG", &allowed()));
        assert!(!allowed_file("payload.exe", &allowed()));
        assert!(!allowed_file("noext", &allowed()));
    }

    #[tokio::test]
    async fn save_derives_name_and_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path()).unwrap();

        let public = storage
            .save("../sneaky/avatar.GIF", Bytes::from_static(b"gifdata"))
            .await
            .unwrap();

        assert!(public.starts_with("/uploads/"));
        assert!(public.ends_with(".gif"));
        assert!(!public.contains("sneaky"));
        assert!(!public.contains("avatar"));

        let stored = public.strip_prefix("/uploads/").unwrap();
        let on_disk = std::fs::read(dir.path().join(stored)).unwrap();
        assert_eq!(on_disk, b"gifdata");
    }

    #[tokio::test]
    async fn store_profile_pic_enforces_the_allow_list() {
        use crate::users::forms::UploadedFile;

        let state = crate::state::AppState::fake();

        let bad = UploadedFile {
            filename: "payload.exe".into(),
            body: Bytes::from_static(b"mz"),
        };
        let err = store_profile_pic(&state, &bad).await.unwrap_err();
        assert_eq!(err.code(), "validation");

        let ok = UploadedFile {
            filename: "me.png".into(),
            body: Bytes::from_static(b"png"),
        };
        let path = store_profile_pic(&state, &ok).await.unwrap();
        assert!(path.starts_with("/uploads/"));
    }

    #[tokio::test]
    async fn delete_removes_saved_file_and_rejects_foreign_paths() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path()).unwrap();

        let public = storage
            .save("pic.png", Bytes::from_static(b"png"))
            .await
            .unwrap();
        storage.delete(&public).await.unwrap();
        let stored = public.strip_prefix("/uploads/").unwrap();
        assert!(!dir.path().join(stored).exists());

        assert!(storage.delete("/etc/passwd").await.is_err());
        assert!(storage.delete("/uploads/../escape.png").await.is_err());
    }
}
