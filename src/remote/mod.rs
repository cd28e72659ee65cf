use std::fs::File;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use reqwest::blocking::multipart::Form;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{LocError, Result};

const BASE_URL: &str = "https://paratranz.cn/api";
const RETRY_COUNT: usize = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);
/// Pause between batch uploads to stay under the rate limit.
const UPLOAD_PAUSE: Duration = Duration::from_millis(500);

/// The narrow remote contract the workflow depends on. Transport concerns
/// (retries, backoff, status interpretation) live behind it.
pub trait RemoteSync {
    fn test_connection(&self) -> Result<bool>;
    /// Upload a single catalog file, or every catalog under a directory.
    fn upload(&self, local: &Path) -> Result<()>;
    /// Download the translated catalog to `save_path`.
    fn download(&self, save_path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct UploadStats {
    pub uploaded: usize,
    pub failed: usize,
}

#[derive(Debug, Deserialize)]
struct RemoteFile {
    id: u64,
    name: String,
}

/// Paratranz API client (bearer-token auth, retrying transport).
pub struct ParatranzClient {
    project_id: u64,
    token: String,
    base_url: String,
    http: Client,
}

impl ParatranzClient {
    pub fn new(project_id: u64, token: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            project_id,
            token: token.into(),
            base_url: BASE_URL.to_string(),
            http,
        })
    }

    /// Point the client at a different endpoint (mock servers in tests).
    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = base_url.into();
    }

    fn request_with_retry<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> Result<RequestBuilder>,
    {
        let mut last_err: Option<LocError> = None;
        for attempt in 0..RETRY_COUNT {
            let request =
                build(&self.http)?.header(AUTHORIZATION, format!("Bearer {}", self.token));
            match request.send() {
                Ok(resp) => {
                    if resp.status() == StatusCode::TOO_MANY_REQUESTS {
                        let wait = resp
                            .headers()
                            .get(RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(RETRY_DELAY.as_secs() * 2);
                        warn!("rate limited, waiting {}s before retrying", wait);
                        thread::sleep(Duration::from_secs(wait));
                        continue;
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    warn!(
                        "request failed ({}/{}): {}",
                        attempt + 1,
                        RETRY_COUNT,
                        e
                    );
                    last_err = Some(e.into());
                    if attempt + 1 < RETRY_COUNT {
                        thread::sleep(RETRY_DELAY);
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| LocError::Generic("request failed".to_string())))
    }

    /// Check the token and project id against the projects endpoint.
    pub fn check_project(&self) -> Result<bool> {
        let url = format!("{}/projects/{}", self.base_url, self.project_id);
        let resp = self.request_with_retry(|c| Ok(c.get(&url)))?;
        match resp.status().as_u16() {
            200 => {
                let body: Value = resp.json()?;
                let name = body
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                info!("connected to project '{}'", name);
                Ok(true)
            }
            401 => {
                warn!("token invalid or expired");
                Ok(false)
            }
            404 => {
                warn!("project {} not found", self.project_id);
                Ok(false)
            }
            status => {
                warn!("connection failed ({}): {}", status, body_message(resp));
                Ok(false)
            }
        }
    }

    /// Resolve a remote file id, matching the full remote path first and
    /// falling back to the bare filename.
    fn get_file_id(&self, filename: &str, remote_path: &str) -> Result<Option<u64>> {
        let url = format!("{}/projects/{}/files", self.base_url, self.project_id);
        let resp = self.request_with_retry(|c| Ok(c.get(&url)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LocError::remote(status.as_u16(), body_message(resp)));
        }
        let files: Vec<RemoteFile> = resp.json()?;
        let expected = expected_remote_name(filename, remote_path);

        if let Some(file) = files.iter().find(|f| f.name == expected) {
            return Ok(Some(file.id));
        }
        let suffix = format!("/{}", filename);
        Ok(files
            .iter()
            .find(|f| f.name == filename || f.name.ends_with(&suffix))
            .map(|f| f.id))
    }

    /// Create or update one catalog file on the service.
    pub fn upload_file(&self, file_path: &Path, remote_path: &str) -> Result<()> {
        if !file_path.is_file() {
            return Err(LocError::Generic(format!(
                "local file not found: {}",
                file_path.display()
            )));
        }
        let filename = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let file_id = self.get_file_id(&filename, remote_path)?;

        let owned_path = file_path.to_path_buf();
        let resp = match file_id {
            Some(id) => {
                info!("updating {} (id {})", filename, id);
                let url = format!(
                    "{}/projects/{}/files/{}",
                    self.base_url, self.project_id, id
                );
                self.request_with_retry(move |c| {
                    Ok(c.post(&url).multipart(Form::new().file("file", &owned_path)?))
                })?
            }
            None => {
                info!("creating {} at {}", filename, remote_path);
                let url = format!("{}/projects/{}/files", self.base_url, self.project_id);
                let remote = remote_path.to_string();
                self.request_with_retry(move |c| {
                    Ok(c.post(&url).multipart(
                        Form::new()
                            .text("path", remote.clone())
                            .file("file", &owned_path)?,
                    ))
                })?
            }
        };

        let status = resp.status();
        if status.is_success() {
            info!("uploaded {}", filename);
            Ok(())
        } else {
            Err(LocError::remote(status.as_u16(), body_message(resp)))
        }
    }

    /// Batch-upload every catalog under `local_dir`, preserving the directory
    /// structure in the remote paths.
    pub fn upload_folder(&self, local_dir: &Path) -> Result<UploadStats> {
        let mut catalogs: Vec<PathBuf> = WalkDir::new(local_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();
        catalogs.sort();

        let mut stats = UploadStats::default();
        if catalogs.is_empty() {
            warn!("no catalog files under {}", local_dir.display());
            return Ok(stats);
        }

        info!("uploading {} catalogs", catalogs.len());
        for (i, path) in catalogs.iter().enumerate() {
            let rel = path
                .strip_prefix(local_dir)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            let remote = remote_path_for(&rel);
            info!("[{}/{}] {} -> {}", i + 1, catalogs.len(), rel, remote);

            match self.upload_file(path, &remote) {
                Ok(()) => stats.uploaded += 1,
                Err(e) => {
                    warn!("upload of {} failed: {}", rel, e);
                    stats.failed += 1;
                }
            }
            thread::sleep(UPLOAD_PAUSE);
        }
        info!(
            "batch upload done: {} uploaded, {} failed",
            stats.uploaded, stats.failed
        );
        Ok(stats)
    }

    /// Ask the service to build a fresh export. Lack of permission (403) and
    /// other refusals are tolerated; an existing artifact can still be
    /// downloaded afterwards.
    pub fn trigger_export(&self) {
        let url = format!("{}/projects/{}/artifacts", self.base_url, self.project_id);
        match self.request_with_retry(|c| Ok(c.post(&url))) {
            Ok(resp) => match resp.status().as_u16() {
                200 | 201 => info!("export triggered"),
                403 => warn!("no permission to trigger an export, downloading the existing one"),
                status => warn!("export trigger refused ({}): {}", status, body_message(resp)),
            },
            Err(e) => warn!("export trigger failed: {}", e),
        }
    }

    /// Download the project artifact and unpack the translated catalog.
    pub fn download_artifact(&self, save_path: &Path) -> Result<()> {
        self.trigger_export();
        // Give the service a moment to assemble the artifact.
        thread::sleep(Duration::from_secs(1));

        let url = format!(
            "{}/projects/{}/artifacts/download",
            self.base_url, self.project_id
        );
        let resp = self.request_with_retry(|c| Ok(c.get(&url)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LocError::remote(status.as_u16(), body_message(resp)));
        }
        let bytes = resp.bytes()?;
        extract_catalog_from_zip(bytes.as_ref(), save_path)?;
        info!("saved translations to {}", save_path.display());
        Ok(())
    }
}

impl RemoteSync for ParatranzClient {
    fn test_connection(&self) -> Result<bool> {
        self.check_project()
    }

    fn upload(&self, local: &Path) -> Result<()> {
        if local.is_dir() {
            let stats = self.upload_folder(local)?;
            if stats.failed > stats.uploaded {
                return Err(LocError::Generic(format!(
                    "batch upload mostly failed: {} of {} files",
                    stats.failed,
                    stats.failed + stats.uploaded
                )));
            }
            Ok(())
        } else {
            self.upload_file(local, "/")
        }
    }

    fn download(&self, save_path: &Path) -> Result<()> {
        self.download_artifact(save_path)
    }
}

/// Remote directory path for a catalog at `rel` (forward slashes), e.g.
/// `Entities/Clothing.json` -> `/Entities/Clothing/`.
fn remote_path_for(rel: &str) -> String {
    let stem = rel.strip_suffix(".json").unwrap_or(rel);
    let cleaned = stem.trim_matches('/');
    if cleaned.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", cleaned)
    }
}

/// Full remote name the service reports for a file at `remote_path`.
fn expected_remote_name(filename: &str, remote_path: &str) -> String {
    let dir = remote_path.trim_matches('/');
    if dir.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", dir, filename)
    }
}

fn body_message(resp: Response) -> String {
    let text = resp.text().unwrap_or_default();
    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(text)
}

fn extract_catalog_from_zip(bytes: &[u8], save_path: &Path) -> Result<()> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| LocError::Artifact(e.to_string()))?;
    let member = archive
        .file_names()
        .find(|name| name.ends_with(".json"))
        .map(str::to_string)
        .ok_or_else(|| LocError::Artifact("no catalog file in the archive".to_string()))?;

    let mut source = archive
        .by_name(&member)
        .map_err(|e| LocError::Artifact(e.to_string()))?;
    if let Some(parent) = save_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut target = File::create(save_path)?;
    io::copy(&mut source, &mut target)?;
    Ok(())
}
