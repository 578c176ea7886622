//! Local-identifier mapping: translate a storage location into a
//! filesystem-safe token for naming lock files. Scheme prefix is kept;
//! `scheme://` collapses to `scheme/`; Windows drive letters are
//! lower-cased with the trailing colon stripped; backslashes normalize to
//! forward slashes; repeated leading slashes collapse to one.

use crate::errors::{Result, StoreError};

pub fn local_identifier(location: &str) -> Result<String> {
    if location.trim().is_empty() {
        return Err(StoreError::Storage("Storage location cannot be empty".to_string()));
    }

    let mut s = location.replace('\\', "/");

    let (scheme, rest) = match s.find("://") {
        Some(idx) => {
            let scheme = s[..idx].to_string();
            let rest = s[idx + 3..].to_string();
            (scheme, rest)
        }
        None => ("file".to_string(), std::mem::take(&mut s)),
    };

    let rest = lower_case_drive_letter(&rest);
    let rest = collapse_leading_slashes(&rest);

    Ok(format!("{scheme}/{rest}"))
}

fn lower_case_drive_letter(path: &str) -> String {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        let mut out = String::with_capacity(path.len());
        out.push(bytes[0].to_ascii_lowercase() as char);
        out.push_str(&path[2..]);
        out
    } else {
        path.to_string()
    }
}

fn collapse_leading_slashes(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    if trimmed.len() == path.len() { trimmed.to_string() } else { format!("/{trimmed}") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_scheme_and_collapses_separator() {
        assert_eq!(local_identifier("s3://bucket/key").unwrap(), "s3/bucket/key");
    }

    #[test]
    fn defaults_unscheme_paths_to_file() {
        assert_eq!(local_identifier("/var/data/db").unwrap(), "file//var/data/db");
    }

    #[test]
    fn lowercases_drive_letter_and_strips_colon() {
        assert_eq!(local_identifier("file://C:/data").unwrap(), "file/c/data");
    }

    #[test]
    fn normalizes_backslashes() {
        assert_eq!(local_identifier("file://C:\\data\\db").unwrap(), "file/c/data/db");
    }

    #[test]
    fn rejects_empty_location() {
        assert!(local_identifier("").is_err());
        assert!(local_identifier("   ").is_err());
    }
}
