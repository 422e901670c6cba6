//! Media references carried as data URIs.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Why a data URI was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    /// Missing `data:` scheme.
    #[error("media reference must start with 'data:'")]
    NotADataUri,

    /// Missing `;base64,` marker.
    #[error("media reference must be base64 encoded ('data:<mimetype>;base64,<data>')")]
    NotBase64,

    /// No usable MIME type.
    #[error("media reference has an invalid MIME type '{0}'")]
    InvalidMimeType(String),

    /// The payload is empty.
    #[error("media reference has no data")]
    EmptyPayload,

    /// The payload does not decode.
    #[error("media payload is not valid base64: {0}")]
    InvalidPayload(String),
}

/// An inline binary blob with an explicit MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    mime_type: String,
    data: String,
}

impl MediaRef {
    /// Parses `data:<mimetype>[;params];base64,<payload>`.
    ///
    /// The payload must decode as standard base64; the decoded bytes are not kept.
    pub fn parse_data_uri(uri: &str) -> Result<Self, MediaError> {
        let rest = uri.trim().strip_prefix("data:").ok_or(MediaError::NotADataUri)?;
        let (media_type, data) = rest.split_once(";base64,").ok_or(MediaError::NotBase64)?;

        // Parameters such as `;name=photo.png` are dropped.
        let mime_type = media_type.split(';').next().unwrap_or_default().trim();
        match mime_type.split_once('/') {
            Some((kind, sub)) if !kind.is_empty() && !sub.is_empty() => {}
            _ => return Err(MediaError::InvalidMimeType(mime_type.to_string())),
        }

        if data.is_empty() {
            return Err(MediaError::EmptyPayload);
        }
        STANDARD.decode(data).map_err(|e| MediaError::InvalidPayload(e.to_string()))?;

        Ok(Self { mime_type: mime_type.to_ascii_lowercase(), data: data.to_string() })
    }

    /// MIME type, lowercased (e.g. `image/png`).
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64 payload without the `data:` prefix.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Builds the data URI back from its parts.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}
