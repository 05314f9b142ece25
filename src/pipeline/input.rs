//! Input resolution: turn a user-supplied path or URL into PDF bytes.
//!
//! Every source is validated the same way before extraction: empty input is
//! an [`AnalysisError::EmptyDocument`], anything not starting with the
//! `%PDF` magic is an [`AnalysisError::NotAPdf`].

use crate::error::AnalysisError;
use std::path::PathBuf;
use tracing::{debug, info};

/// PDF bytes plus a display name for logs and errors.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub source_name: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the document behind a path or an HTTP(S) URL.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<LoadedDocument, AnalysisError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AnalysisError::InvalidInput {
            input: input.to_string(),
        });
    }

    let doc = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };

    check_pdf_bytes(&doc.bytes, &doc.source_name)?;
    Ok(doc)
}

/// Validate raw bytes: non-empty and starting with `%PDF`.
pub fn check_pdf_bytes(bytes: &[u8], source_name: &str) -> Result<(), AnalysisError> {
    if bytes.is_empty() {
        return Err(AnalysisError::EmptyDocument);
    }
    if bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(AnalysisError::NotAPdf {
            source_name: source_name.to_string(),
            magic,
        });
    }
    Ok(())
}

async fn read_local(path_str: &str) -> Result<LoadedDocument, AnalysisError> {
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => AnalysisError::PermissionDenied { path: path.clone() },
        _ => AnalysisError::FileNotFound { path: path.clone() },
    })?;

    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(LoadedDocument {
        source_name: path.display().to_string(),
        bytes,
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<LoadedDocument, AnalysisError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            AnalysisError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            AnalysisError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(LoadedDocument {
        source_name: url.to_string(),
        bytes: bytes.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn empty_bytes_are_an_input_error() {
        let err = check_pdf_bytes(&[], "upload").unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyDocument));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let err = check_pdf_bytes(b"PK\x03\x04zip", "archive.zip").unwrap_err();
        match err {
            AnalysisError::NotAPdf { source_name, magic } => {
                assert_eq!(source_name, "archive.zip");
                assert_eq!(&magic, b"PK\x03\x04");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn pdf_magic_is_accepted() {
        assert!(check_pdf_bytes(b"%PDF-1.7\n", "doc.pdf").is_ok());
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, AnalysisError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_file_is_read() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"%PDF-1.4\n%%EOF").unwrap();
        let doc = resolve_input(tmp.path().to_str().unwrap(), 5).await.unwrap();
        assert!(doc.bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn empty_local_file_is_an_input_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let err = resolve_input(tmp.path().to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyDocument));
    }
}
