//! Signature-based content type detection.
//!
//! Only the leading bytes of a stream are examined (see [`crate::SNIFF_LEN`]).
//! Binary signatures are checked first; anything that matches none of them is
//! classified as text when it decodes cleanly, and as generic binary otherwise.

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const TEXT_PLAIN: &str = "text/plain";

/// Result of sniffing a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detected {
    pub mimetype: &'static str,
    /// Extension without the leading dot; empty when nothing sensible applies
    pub extension: &'static str,
}

impl Detected {
    const fn new(mimetype: &'static str, extension: &'static str) -> Self {
        Self {
            mimetype,
            extension,
        }
    }

    pub fn is_binary_fallback(&self) -> bool {
        self.mimetype == OCTET_STREAM
    }
}

/// (offset, signature, mimetype, extension)
const SIGNATURES: &[(usize, &[u8], &str, &str)] = &[
    // Images
    (0, b"\x89PNG\r\n\x1a\n", "image/png", "png"),
    (0, b"\xff\xd8\xff", "image/jpeg", "jpg"),
    (0, b"GIF87a", "image/gif", "gif"),
    (0, b"GIF89a", "image/gif", "gif"),
    (0, b"\x00\x00\x01\x00", "image/x-icon", "ico"),
    (0, b"II*\x00", "image/tiff", "tiff"),
    (0, b"MM\x00*", "image/tiff", "tiff"),
    // Audio / video
    (0, b"ID3", "audio/mpeg", "mp3"),
    (0, b"OggS", "audio/ogg", "ogg"),
    (0, b"fLaC", "audio/flac", "flac"),
    // Archives and compression
    (0, b"PK\x03\x04", "application/zip", "zip"),
    (0, b"PK\x05\x06", "application/zip", "zip"),
    (0, b"\x1f\x8b", "application/gzip", "gz"),
    (0, b"BZh", "application/x-bzip2", "bz2"),
    (0, b"\xfd7zXZ\x00", "application/x-xz", "xz"),
    (0, b"7z\xbc\xaf\x27\x1c", "application/x-7z-compressed", "7z"),
    (0, b"Rar!\x1a\x07", "application/vnd.rar", "rar"),
    (257, b"ustar", "application/x-tar", "tar"),
    // Documents and executables
    (0, b"%PDF-", "application/pdf", "pdf"),
    (0, b"\x7fELF", "application/x-elf", "elf"),
    (0, b"\x00asm", "application/wasm", "wasm"),
    (0, b"SQLite format 3\x00", "application/vnd.sqlite3", "sqlite"),
];

fn has_at(data: &[u8], offset: usize, sig: &[u8]) -> bool {
    data.len() >= offset + sig.len() && &data[offset..offset + sig.len()] == sig
}

/// RIFF containers carry their real type at offset 8.
fn detect_riff(data: &[u8]) -> Option<Detected> {
    if !has_at(data, 0, b"RIFF") {
        return None;
    }
    if has_at(data, 8, b"WEBP") {
        Some(Detected::new("image/webp", "webp"))
    } else if has_at(data, 8, b"WAVE") {
        Some(Detected::new("audio/wav", "wav"))
    } else if has_at(data, 8, b"AVI ") {
        Some(Detected::new("video/x-msvideo", "avi"))
    } else {
        None
    }
}

/// ISO base media files: `....ftyp<brand>`
fn detect_ftyp(data: &[u8]) -> Option<Detected> {
    if !has_at(data, 4, b"ftyp") || data.len() < 12 {
        return None;
    }
    let detected = match &data[8..12] {
        b"qt  " => Detected::new("video/quicktime", "mov"),
        b"M4A " | b"M4B " => Detected::new("audio/mp4", "m4a"),
        b"avif" | b"avis" => Detected::new("image/avif", "avif"),
        b"heic" | b"heix" | b"mif1" => Detected::new("image/heic", "heic"),
        _ => Detected::new("video/mp4", "mp4"),
    };
    Some(detected)
}

/// Matroska and WebM share the EBML magic; the doctype tells them apart.
fn detect_ebml(data: &[u8]) -> Option<Detected> {
    if !has_at(data, 0, b"\x1a\x45\xdf\xa3") {
        return None;
    }
    if data.windows(4).any(|w| w == b"webm") {
        Some(Detected::new("video/webm", "webm"))
    } else {
        Some(Detected::new("video/x-matroska", "mkv"))
    }
}

/// Bare MPEG audio frame sync without an ID3 tag.
fn detect_mpeg_frame(data: &[u8]) -> Option<Detected> {
    if data.len() >= 2 && data[0] == 0xff && matches!(data[1], 0xfb | 0xf3 | 0xf2) {
        Some(Detected::new("audio/mpeg", "mp3"))
    } else {
        None
    }
}

fn looks_like_text(data: &[u8]) -> Option<Detected> {
    if has_at(data, 0, b"\xfe\xff") {
        return Some(Detected::new("text/plain; charset=utf-16be", "txt"));
    }
    if has_at(data, 0, b"\xff\xfe") {
        return Some(Detected::new("text/plain; charset=utf-16le", "txt"));
    }

    let body = data.strip_prefix(b"\xef\xbb\xbf").unwrap_or(data);
    let control = body
        .iter()
        .any(|&b| (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c | 0x1b)) || b == 0x7f);
    if control {
        return None;
    }

    match std::str::from_utf8(body) {
        Ok(_) => Some(Detected::new(TEXT_PLAIN, "txt")),
        // A multi-byte sequence cut off by the end of the sniff window
        Err(e) if e.error_len().is_none() => Some(Detected::new(TEXT_PLAIN, "txt")),
        Err(_) => None,
    }
}

/// Classify `header`, the first bytes of a stream.
pub fn detect(header: &[u8]) -> Detected {
    if header.is_empty() {
        return Detected::new(OCTET_STREAM, "");
    }

    for &(offset, sig, mimetype, extension) in SIGNATURES {
        if has_at(header, offset, sig) {
            return Detected::new(mimetype, extension);
        }
    }

    detect_riff(header)
        .or_else(|| detect_ftyp(header))
        .or_else(|| detect_ebml(header))
        .or_else(|| detect_mpeg_frame(header))
        .or_else(|| looks_like_text(header))
        .unwrap_or(Detected::new(OCTET_STREAM, ""))
}

/// Extension for a previously sniffed mimetype.
pub fn extension_for_mimetype(mimetype: &str) -> Option<&'static str> {
    if mimetype.starts_with("text/plain") {
        return Some("txt");
    }
    SIGNATURES
        .iter()
        .find(|(_, _, mime, _)| *mime == mimetype)
        .map(|(_, _, _, ext)| *ext)
}
