//! Filename normalisation for uploads.

/// Used when neither the client nor content sniffing supplies an extension
pub const FALLBACK_EXTENSION: &str = "file";

/// Names that would shadow site resources
const PROHIBITED_FILENAMES: &[&str] = &[
    "favicon.ico",
    "index.htm",
    "index.html",
    "index.php",
    "robots.txt",
    "crossdomain.xml",
];

const COMPOUND_EXTENSIONS: &[&str] = &["tar.gz", "tar.bz2", "tar.xz", "tar.zst"];

/// A suggested filename split into its two sanitised halves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitName {
    pub barename: String,
    /// Without the leading dot; may be empty
    pub extension: String,
}

fn clean_barename(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_whitespace() || c == '_' { '-' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

fn clean_extension(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '.')
        .collect();
    kept.split('.')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Lowercase `suggested`, drop any directory part and split off the extension.
pub fn split_filename(suggested: &str) -> SplitName {
    let base = suggested
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    let compound = COMPOUND_EXTENSIONS.iter().find(|ext| {
        base.len() > ext.len() + 1
            && base.ends_with(*ext)
            && base.as_bytes()[base.len() - ext.len() - 1] == b'.'
    });

    let (bare, ext) = match compound {
        Some(ext) => (&base[..base.len() - ext.len() - 1], *ext),
        None => base.rsplit_once('.').unwrap_or((base.as_str(), "")),
    };

    SplitName {
        barename: clean_barename(bare),
        extension: clean_extension(ext),
    }
}

pub fn join_filename(barename: &str, extension: &str) -> String {
    if extension.is_empty() {
        barename.to_string()
    } else {
        format!("{}.{}", barename, extension)
    }
}

pub fn is_prohibited(filename: &str) -> bool {
    PROHIBITED_FILENAMES.contains(&filename)
}

/// `report` -> `report1`, `report1` -> `report2`, `v9` -> `v10`
pub fn next_barename(barename: &str) -> String {
    let stem = barename.trim_end_matches(|c: char| c.is_ascii_digit());
    let digits = &barename[stem.len()..];
    match digits.parse::<u64>() {
        Ok(n) => match n.checked_add(1) {
            Some(next) => format!("{}{}", stem, next),
            None => format!("{}1", barename),
        },
        Err(_) => format!("{}1", barename),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(name: &str) -> (String, String) {
        let s = split_filename(name);
        (s.barename, s.extension)
    }

    #[test]
    fn test_simple_split() {
        assert_eq!(split("Report.TXT"), ("report".into(), "txt".into()));
        assert_eq!(split("noext"), ("noext".into(), "".into()));
    }

    #[test]
    fn test_compound_extension() {
        assert_eq!(split("backup.tar.gz"), ("backup".into(), "tar.gz".into()));
        assert_eq!(split("a.b.tar.bz2"), ("ab".into(), "tar.bz2".into()));
        assert_eq!(split("notes.gz"), ("notes".into(), "gz".into()));
    }

    #[test]
    fn test_sanitises_characters() {
        assert_eq!(split("My File (2).png"), ("my-file-2".into(), "png".into()));
        assert_eq!(split("../../etc/passwd"), ("passwd".into(), "".into()));
        assert_eq!(split("C:\\Users\\x\\a_b.JPG"), ("a-b".into(), "jpg".into()));
        assert_eq!(split("weird.t@r"), ("weird".into(), "tr".into()));
    }

    #[test]
    fn test_empty_barename() {
        assert_eq!(split(".bashrc"), ("".into(), "bashrc".into()));
        assert_eq!(split("???.txt"), ("".into(), "txt".into()));
    }

    #[test]
    fn test_prohibited() {
        assert!(is_prohibited("robots.txt"));
        assert!(is_prohibited("index.html"));
        assert!(!is_prohibited("robots1.txt"));
    }

    #[test]
    fn test_next_barename() {
        assert_eq!(next_barename("report"), "report1");
        assert_eq!(next_barename("report1"), "report2");
        assert_eq!(next_barename("v9"), "v10");
        assert_eq!(next_barename("2024"), "2025");
    }

    #[test]
    fn test_join() {
        assert_eq!(join_filename("a", "txt"), "a.txt");
        assert_eq!(join_filename("a", ""), "a");
    }
}
