use crate::common::{DesignRecord, SavedDesign, StorageStats};
use anyhow::{Result, anyhow};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::{fs, sync::Mutex};

const UPLOADS_DIR: &str = "uploads";
const DESIGNS_DIR: &str = "designs";
const MOCKUPS_DIR: &str = "mockups";
const METADATA_FILE: &str = "design_metadata.json";
const DESIGN_MANIFEST: &str = "design.json";

type Metadata = BTreeMap<String, SavedDesign>;

/// Saved-design metadata kept as a single JSON document.
///
/// Every access goes through one async mutex, so read-modify-write cycles are
/// serialised. Writes land in a temp file that is renamed over the original.
pub struct MetadataStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl MetadataStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<Metadata> {
        if fs::metadata(&self.path).await.is_err() {
            return Ok(Metadata::new());
        }
        let data = fs::read_to_string(&self.path).await?;
        if data.trim().is_empty() {
            return Ok(Metadata::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    async fn write(&self, metadata: &Metadata) -> Result<()> {
        let data = serde_json::to_string_pretty(metadata)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Runs `f` against the whole document and persists the result.
    pub async fn with_store<R>(&self, f: impl FnOnce(&mut Metadata) -> Result<R>) -> Result<R> {
        let _guard = self.lock.lock().await;
        let mut metadata = self.read().await?;
        let result = f(&mut metadata)?;
        self.write(&metadata).await?;
        Ok(result)
    }

    pub async fn put(&self, record: SavedDesign) -> Result<()> {
        self.with_store(|metadata| {
            metadata.insert(record.saved_design_id.clone(), record);
            Ok(())
        })
        .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<SavedDesign>> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.remove(id))
    }

    pub async fn list_by(&self, predicate: impl Fn(&SavedDesign) -> bool) -> Result<Vec<SavedDesign>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read()
            .await?
            .into_values()
            .filter(|record| predicate(record))
            .collect())
    }
}

/// File layout for uploads, per-design artifacts and saved-design metadata.
#[derive(Clone)]
pub struct StorageService {
    root: PathBuf,
    metadata: Arc<MetadataStore>,
    /// Held while a mockup name is allocated or a design manifest rewritten.
    manifests: Arc<Mutex<()>>,
}

/// Design ids end up in file paths, keep them to a safe alphabet.
pub fn is_valid_design_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn upload_extension(file_name: Option<&str>, content_type: Option<&str>) -> String {
    let from_name = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase);
    if let Some(ext) = from_name {
        return ext;
    }
    match content_type {
        Some("image/jpeg") | None => "jpg".to_string(),
        Some("image/png") => "png".to_string(),
        Some("image/webp") => "webp".to_string(),
        Some(other) => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first())
            .map_or_else(|| "jpg".to_string(), ToString::to_string),
    }
}

impl StorageService {
    /// Opens (and creates if needed) the storage tree under `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [UPLOADS_DIR, DESIGNS_DIR, MOCKUPS_DIR] {
            fs::create_dir_all(root.join(dir)).await?;
        }
        let metadata_file = root.join(METADATA_FILE);
        if fs::metadata(&metadata_file).await.is_err() {
            fs::write(&metadata_file, "{}").await?;
        }
        Ok(Self {
            metadata: Arc::new(MetadataStore::new(metadata_file)),
            manifests: Arc::new(Mutex::new(())),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    fn designs_dir(&self) -> PathBuf {
        self.root.join(DESIGNS_DIR)
    }

    pub fn design_dir(&self, design_id: &str) -> PathBuf {
        self.designs_dir().join(design_id)
    }

    pub async fn check_health(&self) -> bool {
        let probe = self.uploads_dir().join("health_check.txt");
        if let Err(e) = fs::write(&probe, "health check").await {
            log::error!("Storage health probe failed: {e:?}");
            return false;
        }
        fs::remove_file(&probe).await.is_ok()
    }

    /// Stores the original upload as `uploads/{design_id}_original.{ext}`.
    pub async fn save_upload(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
        content_type: Option<&str>,
        design_id: &str,
    ) -> Result<PathBuf> {
        if !is_valid_design_id(design_id) {
            return Err(anyhow!("Invalid design id '{design_id}'"));
        }
        let ext = upload_extension(file_name, content_type);
        let path = self.uploads_dir().join(format!("{design_id}_original.{ext}"));
        fs::write(&path, bytes).await?;
        Ok(path)
    }

    pub async fn find_upload(&self, design_id: &str) -> Option<PathBuf> {
        if !is_valid_design_id(design_id) {
            return None;
        }
        let stem = format!("{design_id}_original");
        let mut entries = fs::read_dir(self.uploads_dir()).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.file_stem().and_then(|s| s.to_str()) == Some(stem.as_str()) {
                return Some(path);
            }
        }
        None
    }

    /// Maps a stored path to the URL the frontend can fetch it from.
    pub fn get_public_url(&self, path: &str) -> String {
        if path.starts_with("data:") || path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let path = Path::new(path);
        if let Ok(relative) = path.strip_prefix(&self.root) {
            let parts = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>();
            return format!("/storage/{}", parts.join("/"));
        }
        let file_name = path
            .file_name()
            .map_or_else(String::new, |name| name.to_string_lossy().into_owned());
        format!("/static/{file_name}")
    }

    pub async fn design_exists(&self, design_id: &str) -> bool {
        is_valid_design_id(design_id)
            && fs::metadata(self.design_dir(design_id))
                .await
                .is_ok_and(|m| m.is_dir())
    }

    pub async fn create_design_directory(&self, design_id: &str) -> Result<PathBuf> {
        if !is_valid_design_id(design_id) {
            return Err(anyhow!("Invalid design id '{design_id}'"));
        }
        let dir = self.design_dir(design_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Writes a mockup into the design directory. The first one is
    /// `mockup.{ext}`, later ones are numbered.
    pub async fn save_mockup(&self, design_id: &str, bytes: &[u8], ext: &str) -> Result<PathBuf> {
        let dir = self.create_design_directory(design_id).await?;
        let _guard = self.manifests.lock().await;
        let mut existing = 0;
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with("mockup") {
                existing += 1;
            }
        }
        let file_name = if existing == 0 {
            format!("mockup.{ext}")
        } else {
            format!("mockup_{}.{ext}", existing + 1)
        };
        let path = dir.join(file_name);
        fs::write(&path, bytes).await?;
        Ok(path)
    }

    pub async fn write_text(&self, design_id: &str, file_name: &str, text: &str) -> Result<PathBuf> {
        let path = self.create_design_directory(design_id).await?.join(file_name);
        fs::write(&path, text).await?;
        Ok(path)
    }

    pub async fn write_design_record(&self, record: &DesignRecord) -> Result<()> {
        let _guard = self.manifests.lock().await;
        self.write_manifest(record).await
    }

    /// Callers hold `manifests`.
    async fn write_manifest(&self, record: &DesignRecord) -> Result<()> {
        let path = self
            .create_design_directory(&record.design_id)
            .await?
            .join(DESIGN_MANIFEST);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(record)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    pub async fn read_design_record(&self, design_id: &str) -> Result<Option<DesignRecord>> {
        if !self.design_exists(design_id).await {
            return Ok(None);
        }
        let path = self.design_dir(design_id).join(DESIGN_MANIFEST);
        if fs::metadata(&path).await.is_err() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&fs::read_to_string(path).await?)?))
    }

    /// Applies `f` to an existing manifest and writes it back.
    pub async fn update_design_record(
        &self,
        design_id: &str,
        f: impl FnOnce(&mut DesignRecord),
    ) -> Result<Option<DesignRecord>> {
        let _guard = self.manifests.lock().await;
        let Some(mut record) = self.read_design_record(design_id).await? else {
            return Ok(None);
        };
        f(&mut record);
        self.write_manifest(&record).await?;
        Ok(Some(record))
    }

    /// Records a new mockup on the design, creating the manifest if missing.
    pub async fn append_mockup(
        &self,
        design_id: &str,
        mockup: String,
        generator: &str,
    ) -> Result<DesignRecord> {
        let _guard = self.manifests.lock().await;
        let mut record = self
            .read_design_record(design_id)
            .await?
            .unwrap_or_else(|| DesignRecord {
                design_id: design_id.to_string(),
                product_name: None,
                original_upload: None,
                mockups: Vec::new(),
                report: None,
                generator: String::new(),
                created_at: chrono::Utc::now(),
            });
        record.mockups.push(mockup);
        generator.clone_into(&mut record.generator);
        self.write_manifest(&record).await?;
        Ok(record)
    }

    /// Returns false (and logs) instead of failing, callers only need to
    /// know whether the record was kept.
    pub async fn save_design_metadata(&self, record: SavedDesign) -> bool {
        match self.metadata.put(record).await {
            Ok(()) => true,
            Err(e) => {
                log::error!("Metadata save error: {e:?}");
                false
            }
        }
    }

    pub async fn get_design_metadata(&self, saved_design_id: &str) -> Option<SavedDesign> {
        self.metadata
            .get(saved_design_id)
            .await
            .inspect_err(|e| log::error!("Metadata read error: {e:?}"))
            .ok()
            .flatten()
    }

    /// Saved designs for one email address, newest first.
    pub async fn list_user_designs(&self, user_email: &str) -> Vec<SavedDesign> {
        let mut designs = self
            .metadata
            .list_by(|record| record.user_email == user_email)
            .await
            .inspect_err(|e| log::error!("Metadata read error: {e:?}"))
            .unwrap_or_default();
        designs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        designs
    }

    /// Removes uploads, design directories and mockups older than `days`.
    pub async fn cleanup_older_than(&self, days: u64) -> Result<usize> {
        let Some(cutoff) = cleanup_cutoff(SystemTime::now(), days) else {
            log::warn!("Cleanup age of {days} days reaches before the epoch, nothing to remove");
            return Ok(0);
        };
        let mut removed = 0;
        for dir in [UPLOADS_DIR, DESIGNS_DIR, MOCKUPS_DIR] {
            let mut entries = fs::read_dir(self.root.join(dir)).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let Ok(meta) = entry.metadata().await else {
                    continue;
                };
                if meta.modified().map_or(true, |modified| modified >= cutoff) {
                    continue;
                }
                let result = if meta.is_dir() {
                    fs::remove_dir_all(&path).await
                } else {
                    fs::remove_file(&path).await
                };
                match result {
                    Ok(()) => removed += 1,
                    Err(e) => log::warn!("Cleanup error for {}: {e:?}", path.display()),
                }
            }
        }
        Ok(removed)
    }

    pub async fn stats(&self) -> StorageStats {
        let mut stats = StorageStats::default();
        if let Ok(count) = count_entries(&self.uploads_dir()).await {
            stats.total_uploads = count;
        }
        if let Ok(count) = count_entries(&self.designs_dir()).await {
            stats.total_designs = count;
        }

        let mut total_size = 0u64;
        let mut pending = vec![self.uploads_dir(), self.designs_dir(), self.root.join(MOCKUPS_DIR)];
        while let Some(dir) = pending.pop() {
            let Ok(mut entries) = fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                match entry.metadata().await {
                    Ok(meta) if meta.is_dir() => pending.push(entry.path()),
                    Ok(meta) => total_size += meta.len(),
                    Err(e) => log::warn!("Stats error for {}: {e:?}", entry.path().display()),
                }
            }
        }
        stats.storage_used_mb = (total_size as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;
        stats
    }
}

/// `None` when `days` overflows or lands before the epoch.
fn cleanup_cutoff(now: SystemTime, days: u64) -> Option<SystemTime> {
    let age = days.checked_mul(24 * 60 * 60).map(Duration::from_secs)?;
    now.checked_sub(age)
        .filter(|cutoff| *cutoff >= SystemTime::UNIX_EPOCH)
}

async fn count_entries(dir: &Path) -> Result<usize> {
    let mut count = 0;
    let mut entries = fs::read_dir(dir).await?;
    while entries.next_entry().await?.is_some() {
        count += 1;
    }
    Ok(count)
}
