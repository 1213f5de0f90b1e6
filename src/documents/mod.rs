// ABOUTME: Generated artifacts for a case: termination letter, signed PDF, and ZIP export
// ABOUTME: Also decodes the signature images captured by the portal as data URLs
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 eSign Portal Contributors

//! # Case Documents
//!
//! - [`termination`]: the pre-filled termination letter and its HTML preview
//! - [`pdf`]: the minimal signed-document PDF
//! - [`archive`]: the agent ZIP export of a whole case

pub mod archive;
pub mod pdf;
pub mod termination;

pub use archive::{ArchivedFile, CaseArchive};
pub use pdf::SignedDocumentPdf;
pub use termination::{ClientData, FormType, PersonInfo};

use crate::errors::{AppError, AppResult, ErrorCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Largest accepted signature image once decoded
pub const MAX_SIGNATURE_BYTES: usize = 2 * 1024 * 1024;

/// Image format of a captured signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFormat {
    /// `image/png`
    Png,
    /// `image/jpeg`
    Jpeg,
}

impl SignatureFormat {
    /// File extension used in exports
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// MIME type
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

/// Decoded `data:image/...;base64,` signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureImage {
    /// Image format
    pub format: SignatureFormat,
    /// Decoded image bytes
    pub bytes: Vec<u8>,
}

impl SignatureImage {
    /// Decode a PNG or JPEG data URL
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` when the value is not a base64 PNG/JPEG data
    /// URL, is empty, or exceeds [`MAX_SIGNATURE_BYTES`]
    pub fn from_data_url(data_url: &str) -> AppResult<Self> {
        let (header, payload) = data_url
            .trim()
            .split_once(',')
            .ok_or_else(|| AppError::new(ErrorCode::InvalidFormat, "Signature must be a data URL"))?;

        let format = match header.to_ascii_lowercase().as_str() {
            "data:image/png;base64" => SignatureFormat::Png,
            "data:image/jpeg;base64" | "data:image/jpg;base64" => SignatureFormat::Jpeg,
            other => {
                return Err(AppError::new(
                    ErrorCode::InvalidFormat,
                    format!("Unsupported signature encoding: {other}"),
                ))
            }
        };

        let bytes = STANDARD.decode(payload.trim()).map_err(|e| {
            AppError::new(
                ErrorCode::InvalidFormat,
                format!("Signature is not valid base64: {e}"),
            )
        })?;

        if bytes.is_empty() {
            return Err(AppError::new(
                ErrorCode::InvalidFormat,
                "Signature image is empty",
            ));
        }
        if bytes.len() > MAX_SIGNATURE_BYTES {
            return Err(AppError::new(
                ErrorCode::PayloadTooLarge,
                "Signature image is too large",
            ));
        }

        Ok(Self { format, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_png_data_url() {
        let url = format!("data:image/png;base64,{}", STANDARD.encode(b"\x89PNG\r\n"));
        let image = SignatureImage::from_data_url(&url).unwrap();
        assert_eq!(image.format, SignatureFormat::Png);
        assert_eq!(image.bytes, b"\x89PNG\r\n");
        assert_eq!(image.format.extension(), "png");
    }

    #[test]
    fn test_accepts_jpeg_alias() {
        let url = format!("data:image/jpg;base64,{}", STANDARD.encode(b"\xFF\xD8\xFF"));
        assert_eq!(
            SignatureImage::from_data_url(&url).unwrap().format,
            SignatureFormat::Jpeg
        );
    }

    #[test]
    fn test_rejects_other_payloads() {
        for value in [
            "",
            "not a data url",
            "data:image/svg+xml;base64,PHN2Zz4=",
            "data:image/png,rawbytes",
            "data:image/png;base64,!!!",
            "data:image/png;base64,",
        ] {
            let err = SignatureImage::from_data_url(value).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidFormat, "{value:?}");
        }
    }
}
