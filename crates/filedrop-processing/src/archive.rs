//! Member listings for uploaded archives.
//!
//! Runs after the content has been written somewhere seekable. Any parse
//! failure yields an empty listing; a broken archive is still a valid upload.

use std::io::{Read, Seek};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;

/// Archive layouts we know how to walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    TarBz2,
    Zip,
}

impl ArchiveFormat {
    pub fn from_mimetype(mimetype: &str) -> Option<Self> {
        match mimetype {
            "application/x-tar" => Some(ArchiveFormat::Tar),
            "application/gzip" | "application/x-gzip" => Some(ArchiveFormat::TarGz),
            "application/x-bzip2" => Some(ArchiveFormat::TarBz2),
            "application/zip" => Some(ArchiveFormat::Zip),
            _ => None,
        }
    }
}

pub fn is_archive_mimetype(mimetype: &str) -> bool {
    ArchiveFormat::from_mimetype(mimetype).is_some()
}

fn tar_members<R: Read>(reader: R) -> std::io::Result<Vec<String>> {
    let mut archive = tar::Archive::new(reader);
    let mut names = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        let kind = entry.header().entry_type();
        if kind.is_dir() || kind.is_file() {
            names.push(String::from_utf8_lossy(&entry.path_bytes()).into_owned());
        }
    }
    Ok(names)
}

fn zip_members<R: Read + Seek>(reader: R) -> zip::result::ZipResult<Vec<String>> {
    let archive = zip::ZipArchive::new(reader)?;
    Ok(archive.file_names().map(str::to_string).collect())
}

/// Sorted member names, or an empty list when `mimetype` is not an archive
/// or the content does not parse.
pub fn list_archive_members<R: Read + Seek>(mimetype: &str, reader: R) -> Vec<String> {
    let Some(format) = ArchiveFormat::from_mimetype(mimetype) else {
        return Vec::new();
    };

    let listed = match format {
        ArchiveFormat::Tar => tar_members(reader).map_err(|e| e.to_string()),
        ArchiveFormat::TarGz => tar_members(GzDecoder::new(reader)).map_err(|e| e.to_string()),
        ArchiveFormat::TarBz2 => tar_members(BzDecoder::new(reader)).map_err(|e| e.to_string()),
        ArchiveFormat::Zip => zip_members(reader).map_err(|e| e.to_string()),
    };

    match listed {
        Ok(mut names) => {
            names.sort();
            names
        }
        Err(error) => {
            tracing::debug!(error = %error, mimetype = %mimetype, "Archive listing skipped");
            Vec::new()
        }
    }
}
