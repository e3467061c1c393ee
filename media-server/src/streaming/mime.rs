use axum::http::HeaderValue;
use common::FileType;
use std::collections::HashMap;
use thiserror::Error;

/// 未知类型的回退MIME类型
pub const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum MimeError {
    #[error("unknown file type in MIME overrides: {0}")]
    UnknownFileType(String),

    #[error("invalid MIME type for {file_type}: {value}")]
    InvalidMime { file_type: FileType, value: String },
}

/// 文件类型到MIME类型的映射
///
/// 默认值来自 `FileType::mime_type`，可以通过配置覆盖。
#[derive(Debug, Clone, Default)]
pub struct MimeRegistry {
    overrides: HashMap<FileType, String>,
}

impl MimeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用配置中的覆盖项创建（键为文件扩展名，值为MIME类型）
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Result<Self, MimeError> {
        let mut registry = Self::new();
        for (key, value) in overrides {
            let file_type = FileType::from_extension(key)
                .ok_or_else(|| MimeError::UnknownFileType(key.clone()))?;

            if !is_valid_mime(value) {
                return Err(MimeError::InvalidMime {
                    file_type,
                    value: value.clone(),
                });
            }

            registry.overrides.insert(file_type, value.trim().to_string());
        }
        Ok(registry)
    }

    /// 查询MIME类型，未知类型返回 `application/octet-stream`
    pub fn mime_for(&self, file_type: Option<FileType>) -> &str {
        match file_type {
            Some(file_type) => self
                .overrides
                .get(&file_type)
                .map(String::as_str)
                .unwrap_or_else(|| file_type.mime_type()),
            None => OCTET_STREAM,
        }
    }
}

/// `type/subtype` 形式且可以作为响应头的值
fn is_valid_mime(value: &str) -> bool {
    let value = value.trim();
    let essence = value.split(';').next().unwrap_or_default();
    match essence.split_once('/') {
        Some((kind, subtype)) => {
            !kind.is_empty()
                && !subtype.is_empty()
                && !essence.contains(char::is_whitespace)
                && HeaderValue::from_str(value).is_ok()
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lookup() {
        let registry = MimeRegistry::new();
        assert_eq!(registry.mime_for(Some(FileType::Mp3)), "audio/mpeg");
        assert_eq!(registry.mime_for(Some(FileType::Flac)), "audio/flac");
        assert_eq!(registry.mime_for(None), OCTET_STREAM);
    }

    #[test]
    fn test_overrides() {
        let overrides = HashMap::from([
            ("m4a".to_string(), "audio/aac".to_string()),
            ("wma".to_string(), "audio/x-ms-wma; codecs=wmav2".to_string()),
        ]);
        let registry = MimeRegistry::with_overrides(&overrides).unwrap();

        assert_eq!(registry.mime_for(Some(FileType::M4a)), "audio/aac");
        assert_eq!(
            registry.mime_for(Some(FileType::Wma)),
            "audio/x-ms-wma; codecs=wmav2"
        );
        assert_eq!(registry.mime_for(Some(FileType::Ogg)), "audio/ogg");
    }

    #[test]
    fn test_invalid_overrides() {
        let unknown = HashMap::from([("mod".to_string(), "audio/mod".to_string())]);
        assert!(matches!(
            MimeRegistry::with_overrides(&unknown),
            Err(MimeError::UnknownFileType(_))
        ));

        for value in ["audio", "audio/", "/flac", "audio flac/x", "audio/fl\nac"] {
            let invalid = HashMap::from([("flac".to_string(), value.to_string())]);
            assert!(
                matches!(
                    MimeRegistry::with_overrides(&invalid),
                    Err(MimeError::InvalidMime { .. })
                ),
                "{:?} should be rejected",
                value
            );
        }
    }
}
