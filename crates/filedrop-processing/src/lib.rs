//! Filedrop content inspection
//!
//! Everything here looks at uploaded bytes without knowing where they are
//! stored: MIME sniffing from the leading bytes, a single-pass SHA-256 and
//! byte count, and member listings for the archive formats we recognise.

pub mod archive;
pub mod inspect;
pub mod magic;

pub use archive::{is_archive_mimetype, list_archive_members};
pub use inspect::{inspect_to, read_header, InspectError, Inspection, SNIFF_LEN};
pub use magic::{detect, extension_for_mimetype, Detected};
