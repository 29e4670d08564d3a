use crate::util::{format_bytes, format_date};
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

/// Thin wrapper around the conversion service's REST endpoints. No retries,
/// no caching; callers decide what to tell the user about a failure.
#[derive(Debug)]
pub struct ConverterClient {
    base_url: String,
    http: Client,
}

// API errors
#[derive(Debug)]
pub enum ApiError {
    Network(String), // transport failure
    Status(u16),     // non-success HTTP status
    Parse(String),   // response body did not match the contract
    Io(String),      // local file could not be read or written
}

impl ApiError {
    pub fn description(&self) -> &'static str {
        match self {
            ApiError::Network(_) => "Network error",
            ApiError::Status(_) => "Server returned an error",
            ApiError::Parse(_) => "Failed to parse server response",
            ApiError::Io(_) => "Local file error",
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Network(e) => write!(f, "{}: {}", self.description(), e),
            ApiError::Status(code) => write!(f, "{} (HTTP {})", self.description(), code),
            ApiError::Parse(e) => write!(f, "{}: {}", self.description(), e),
            ApiError::Io(e) => write!(f, "{}: {}", self.description(), e),
        }
    }
}

impl std::error::Error for ApiError {}
// API errors

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub results: Vec<UploadOutcome>,
}

#[derive(Debug, Deserialize)]
pub struct UploadOutcome {
    pub original_filename: String,
    pub status: OutcomeStatus,
    #[serde(default)]
    pub message: Option<String>,
}

// Per-file upload result tag. The service only documents "converted" and
// "error", but older deployments also answer "uploaded"; anything unknown
// counts as not-converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Converted,
    Error,
    #[serde(other)]
    Other,
}

impl UploadResponse {
    pub fn converted_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == OutcomeStatus::Converted)
            .count()
    }

    pub fn failed(&self) -> Vec<&UploadOutcome> {
        self.results
            .iter()
            .filter(|r| r.status != OutcomeStatus::Converted)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct ListResponse {
    pub files: Vec<ConvertedFile>,
}

/// One converted document as reported by the list endpoint. `filename` is
/// unique per session and doubles as the item identifier.
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertedFile {
    pub filename: String,
    pub original_filename: String,
    pub size: u64,
    pub thumbnail_url: String,
    pub pdf_url: String,
    pub metadata: FileMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileMetadata {
    pub page_count: u32,
    pub date: Option<String>,
    pub size: Option<String>,
    pub sender: Option<String>,
    pub subject: Option<String>,
    #[serde(default)]
    pub recipients: Recipients,
}

/// The service sends `recipients` either as one address or as an array of
/// addresses, depending on the message.
#[derive(Debug, Clone, Default)]
pub struct Recipients(pub Vec<String>);

impl Recipients {
    pub fn joined(&self) -> String {
        if self.0.is_empty() {
            "-".to_string()
        } else {
            self.0.join(", ")
        }
    }
}

impl<'de> Deserialize<'de> for Recipients {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RecipientsVisitor;

        impl<'de> serde::de::Visitor<'de> for RecipientsVisitor {
            type Value = Recipients;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "a string or a list of strings")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Recipients(vec![v.to_string()]))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let mut addrs = Vec::new();
                while let Some(addr) = seq.next_element::<String>()? {
                    addrs.push(addr);
                }
                Ok(Recipients(addrs))
            }

            fn visit_none<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Recipients::default())
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Recipients::default())
            }
        }

        deserializer.deserialize_any(RecipientsVisitor)
    }
}

impl ConvertedFile {
    // Create a Vec from the file info so the gallery table can handle it later
    pub fn to_row_cells(&self, selected: bool) -> Vec<String> {
        vec![
            if selected { "●".to_string() } else { " ".to_string() },
            self.filename.clone(),
            self.original_filename.clone(),
            self.metadata.page_count.to_string(),
            format_bytes(self.size),
            self.metadata
                .date
                .as_deref()
                .map(format_date)
                .unwrap_or_else(|| "-".to_string()),
            self.metadata.sender.clone().unwrap_or_else(|| "-".to_string()),
        ]
    }

    pub fn page_label(&self) -> String {
        let n = self.metadata.page_count;
        format!("{} {}", n, if n == 1 { "page" } else { "pages" })
    }
}

impl ConverterClient {
    pub fn new(base_url: &str) -> Self {
        let http = ClientBuilder::new()
            .build()
            .expect("Failed to build HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn check_status(resp: &reqwest::Response) -> Result<(), ApiError> {
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ApiError::Status(resp.status().as_u16()))
        }
    }

    /// GET /health, used once at startup to fail fast with a readable error
    /// instead of an empty gallery.
    pub async fn health(&self) -> Result<(), ApiError> {
        let resp = self
            .http
            .get(self.url("health"))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::check_status(&resp)
    }

    /// GET /files, the canonical list of converted documents.
    pub async fn list_files(&self) -> Result<Vec<ConvertedFile>, ApiError> {
        let resp = self
            .http
            .get(self.url("files"))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::check_status(&resp)?;

        let body = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let parsed: ListResponse =
            serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))?;

        Ok(parsed.files)
    }

    /// POST /upload, one multipart request carrying every pending file in the
    /// repeated `files` field.
    pub async fn upload_files(&self, paths: &[PathBuf]) -> Result<UploadResponse, ApiError> {
        let mut form = reqwest::multipart::Form::new();
        for path in paths {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| ApiError::Io(format!("{}: {}", path.display(), e)))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.msg".to_string());
            let part = reqwest::multipart::Part::bytes(bytes).file_name(name);
            form = form.part("files", part);
        }

        let resp = self
            .http
            .post(self.url("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::check_status(&resp)?;

        let body = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// GET /download/{filename}, saved under `dest_dir` with the server-side
    /// name. Returns the path it was written to.
    pub async fn download_file(&self, filename: &str, dest_dir: &Path) -> Result<PathBuf, ApiError> {
        let resp = self
            .http
            .get(self.url(&format!("download/{filename}")))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::check_status(&resp)?;

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let dest = dest_dir.join(local_name(filename)?);
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| ApiError::Io(e.to_string()))?;
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|e| ApiError::Io(e.to_string()))?;

        Ok(dest)
    }

    /// POST /download-selected with the chosen filenames; the zip payload is
    /// saved as `selected_pdfs.zip` under `dest_dir`.
    pub async fn download_selected(
        &self,
        filenames: &[String],
        dest_dir: &Path,
    ) -> Result<PathBuf, ApiError> {
        let resp = self
            .http
            .post(self.url("download-selected"))
            .json(&serde_json::json!({ "filenames": filenames }))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::check_status(&resp)?;

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let dest = dest_dir.join("selected_pdfs.zip");
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| ApiError::Io(e.to_string()))?;
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|e| ApiError::Io(e.to_string()))?;

        Ok(dest)
    }

    /// GET /download-all is handed to the browser instead of being fetched;
    /// the server streams the archive directly.
    pub fn download_all_url(&self) -> String {
        self.url("download-all")
    }
}

/// The server names the file; only its final path component may touch the
/// local filesystem. Names with no usable component (`..`, `/`) are refused.
fn local_name(filename: &str) -> Result<&std::ffi::OsStr, ApiError> {
    Path::new(filename)
        .file_name()
        .ok_or_else(|| ApiError::Io(format!("unusable filename from server: {filename}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_local_name_keeps_plain_filenames() {
        assert_eq!(local_name("report.pdf").unwrap(), OsStr::new("report.pdf"));
    }

    #[test]
    fn test_local_name_strips_traversal_components() {
        assert_eq!(
            local_name("../../etc/passwd").unwrap(),
            OsStr::new("passwd")
        );
        assert_eq!(local_name("nested/dir/a.pdf").unwrap(), OsStr::new("a.pdf"));
    }

    #[test]
    fn test_local_name_refuses_empty_components() {
        assert!(local_name("..").is_err());
        assert!(local_name("/").is_err());
        assert!(local_name("").is_err());
    }

    #[test]
    fn test_list_response_recipients_array() {
        let body = r#"{
            "files": [{
                "filename": "report.pdf",
                "original_filename": "report.msg",
                "size": 2048,
                "thumbnail_url": "/api/thumbnail/report.pdf",
                "pdf_url": "/api/preview/report.pdf",
                "metadata": {
                    "page_count": 3,
                    "date": "2024-05-01T09:30:00+00:00",
                    "sender": "alice@example.com",
                    "subject": "Quarterly report",
                    "recipients": ["bob@example.com", "carol@example.com"]
                }
            }]
        }"#;

        let parsed: ListResponse = serde_json::from_str(body).unwrap();
        let file = &parsed.files[0];
        assert_eq!(file.filename, "report.pdf");
        assert_eq!(file.metadata.page_count, 3);
        assert_eq!(
            file.metadata.recipients.joined(),
            "bob@example.com, carol@example.com"
        );
    }

    #[test]
    fn test_list_response_recipients_single_string() {
        let body = r#"{
            "files": [{
                "filename": "a.pdf",
                "original_filename": "a.msg",
                "size": 10,
                "thumbnail_url": "t",
                "pdf_url": "p",
                "metadata": { "page_count": 1, "recipients": "bob@example.com" }
            }]
        }"#;

        let parsed: ListResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.files[0].metadata.recipients.joined(), "bob@example.com");
    }

    #[test]
    fn test_list_response_recipients_missing() {
        let body = r#"{
            "files": [{
                "filename": "a.pdf",
                "original_filename": "a.msg",
                "size": 10,
                "thumbnail_url": "t",
                "pdf_url": "p",
                "metadata": { "page_count": 1 }
            }]
        }"#;

        let parsed: ListResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.files[0].metadata.recipients.joined(), "-");
    }

    #[test]
    fn test_upload_response_mixed_outcomes() {
        let body = r#"{ "results": [
            { "original_filename": "a.msg", "status": "converted" },
            { "original_filename": "b.msg", "status": "converted" },
            { "original_filename": "c.msg", "status": "error", "message": "corrupt file" }
        ]}"#;

        let parsed: UploadResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.converted_count(), 2);
        assert_eq!(parsed.failed().len(), 1);
        assert_eq!(parsed.failed()[0].original_filename, "c.msg");
    }

    #[test]
    fn test_upload_response_unknown_status_is_not_converted() {
        let body = r#"{ "results": [
            { "original_filename": "a.msg", "status": "uploaded" }
        ]}"#;

        let parsed: UploadResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.converted_count(), 0);
        assert_eq!(parsed.results[0].status, OutcomeStatus::Other);
    }

    #[test]
    fn test_page_label() {
        let body = r#"{
            "filename": "a.pdf",
            "original_filename": "a.msg",
            "size": 10,
            "thumbnail_url": "t",
            "pdf_url": "p",
            "metadata": { "page_count": 1 }
        }"#;
        let file: ConvertedFile = serde_json::from_str(body).unwrap();
        assert_eq!(file.page_label(), "1 page");
    }
}
