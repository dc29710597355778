//! Generated artifacts and where they live in the bucket.

use crate::payment::models::PaymentChoice;
use crate::token::DocumentToken;

/// Every blob produced for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    FullPdf,
    Preview,
    Docx,
    Archive,
}

impl Artifact {
    pub fn filename(&self) -> &'static str {
        match self {
            Self::FullPdf => "documento.pdf",
            Self::Preview => "preview.pdf",
            Self::Docx => "documento.docx",
            Self::Archive => "LexaGen_Documentos.zip",
        }
    }

    /// MIME type used when uploading.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::FullPdf | Self::Preview => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Archive => "application/zip",
        }
    }

    pub fn path(&self, token: &DocumentToken) -> String {
        format!("documents/{}/{}", token.as_str(), self.filename())
    }

    /// The artifact delivered for a purchased bundle.
    pub fn for_choice(choice: PaymentChoice) -> Self {
        match choice {
            PaymentChoice::Pdf => Self::FullPdf,
            PaymentChoice::PdfWord => Self::Archive,
        }
    }
}

/// Check that a blob starts with the magic bytes of its artifact type.
pub fn has_expected_magic(artifact: Artifact, data: &[u8]) -> bool {
    match artifact {
        Artifact::FullPdf | Artifact::Preview => data.starts_with(b"%PDF"),
        // DOCX is itself a zip container.
        Artifact::Docx | Artifact::Archive => data.starts_with(b"PK\x03\x04"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_scoped_by_token() {
        let token = DocumentToken::parse("abc-123").unwrap();
        assert_eq!(Artifact::FullPdf.path(&token), "documents/abc-123/documento.pdf");
        assert_eq!(Artifact::Preview.path(&token), "documents/abc-123/preview.pdf");
        assert_eq!(Artifact::Docx.path(&token), "documents/abc-123/documento.docx");
        assert_eq!(
            Artifact::Archive.path(&token),
            "documents/abc-123/LexaGen_Documentos.zip"
        );
    }

    #[test]
    fn test_choice_mapping() {
        assert_eq!(Artifact::for_choice(PaymentChoice::Pdf), Artifact::FullPdf);
        assert_eq!(Artifact::for_choice(PaymentChoice::PdfWord), Artifact::Archive);
    }

    #[test]
    fn test_magic_bytes() {
        assert!(has_expected_magic(Artifact::FullPdf, b"%PDF-1.7"));
        assert!(!has_expected_magic(Artifact::Preview, b"PK\x03\x04"));
        assert!(has_expected_magic(Artifact::Archive, b"PK\x03\x04rest"));
        assert!(Artifact::Docx.content_type().starts_with("application/vnd"));
    }
}
