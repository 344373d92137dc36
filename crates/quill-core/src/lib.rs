//! Foundational low-level utilities shared across Quill crates.
//!
//! Provides atomic file-write helpers and time utilities used by record
//! persistence, handoff files, and webhook timestamp parsing.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms, parse_rfc3339_to_unix};

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use super::*;

    #[test]
    fn unit_time_utils_ms_and_seconds_agree() {
        let now_s = current_unix_timestamp();
        let now_ms = current_unix_timestamp_ms();
        let now_ms_s = now_ms / 1_000;
        assert!(now_ms_s >= now_s);
        assert!(now_ms_s <= now_s.saturating_add(1));
    }

    #[test]
    fn unit_parse_rfc3339_accepts_github_timestamps() {
        assert_eq!(
            parse_rfc3339_to_unix("1970-01-01T00:01:00Z"),
            Some(60)
        );
        assert_eq!(
            parse_rfc3339_to_unix("2026-01-01T00:00:00+00:00"),
            Some(1_767_225_600)
        );
        assert_eq!(parse_rfc3339_to_unix("not a date"), None);
        assert_eq!(parse_rfc3339_to_unix(""), None);
    }

    #[test]
    fn unit_write_text_atomic_writes_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("nested").join("sample.txt");
        write_text_atomic(&path, "hello world").expect("write");
        assert_eq!(read_to_string(&path).expect("read"), "hello world");
    }

    #[test]
    fn unit_write_text_atomic_replaces_existing_file() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("sample.txt");
        write_text_atomic(&path, "first").expect("write first");
        write_text_atomic(&path, "second").expect("write second");
        assert_eq!(read_to_string(&path).expect("read"), "second");
    }

    #[test]
    fn unit_write_text_atomic_rejects_directory_target() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let error = write_text_atomic(tempdir.path(), "nope").expect_err("dir target");
        assert!(error.to_string().contains("directory"));
    }
}
