//! Zip bundle for the PDF + Word purchase option.

use std::io::{Cursor, Write};
use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::artifact::Artifact;

pub const NOTICE_FILENAME: &str = "README.txt";
pub const ARCHIVE_NOTICE: &str =
    "Guarda estos documentos en un lugar seguro. No se almacenan en el servidor.";

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to write archive entry: {0}")]
    Io(#[from] std::io::Error),
}

pub fn package_documents(pdf: &[u8], docx: &[u8]) -> Result<Vec<u8>, PackageError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let entries: [(&str, &[u8]); 3] = [
        (Artifact::FullPdf.filename(), pdf),
        (Artifact::Docx.filename(), docx),
        (NOTICE_FILENAME, ARCHIVE_NOTICE.as_bytes()),
    ];
    for (name, data) in entries {
        writer.start_file(name, options)?;
        writer.write_all(data)?;
    }

    Ok(writer.finish()?.into_inner())
}
