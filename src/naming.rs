//! Naming module - Quy tắc đặt tên file export và filter candidates.
//!
//! Tên file canonical: `<name>_<tag>_<os>_<arch>.tar`, với mọi ký tự `/`
//! trong image name được thay bằng `·` (U+00B7) để tên file hợp lệ trên
//! mọi filesystem. Hàm pure và deterministic - cần thiết để round-trip
//! export/import hoạt động với grep filter.

/// Ký tự thay thế cho `/` trong image name
const SLASH_REPLACEMENT: char = '\u{00B7}';

/// Các đuôi file archive được chấp nhận khi import
const ARCHIVE_SUFFIXES: [&str; 3] = [".tar", ".tar.gz", ".tgz"];

/// Tính tên file canonical cho một image.
///
/// Tag rỗng thành `latest`, os/arch rỗng thành `unknown`.
pub fn canonical_filename(name: &str, tag: &str, os: &str, arch: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c == '/' { SLASH_REPLACEMENT } else { c })
        .collect();

    let tag = if tag.is_empty() { "latest" } else { tag };
    let os = if os.is_empty() { "unknown" } else { os };
    let arch = if arch.is_empty() { "unknown" } else { arch };

    format!("{}_{}_{}_{}.tar", sanitized, tag, os, arch)
}

/// Substring filter - pattern rỗng match tất cả.
///
/// Không glob, không regex, case-sensitive. Áp dụng giống nhau cho image
/// tags, file local và file trên cloud.
pub fn matches(candidate: &str, pattern: &str) -> bool {
    pattern.is_empty() || candidate.contains(pattern)
}

/// Kiểm tra tên file có phải image archive không (case-insensitive).
pub fn is_image_archive(name: &str) -> bool {
    let lower = name.to_lowercase();
    ARCHIVE_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Bỏ đuôi archive khỏi tên file để lấy base name cho việc filter.
pub fn strip_archive_suffix(name: &str) -> &str {
    let lower = name.to_lowercase();
    for suffix in ARCHIVE_SUFFIXES {
        if lower.ends_with(suffix) {
            return &name[..name.len() - suffix.len()];
        }
    }
    name
}

/// Kiểm tra một tên file có phải candidate cho import không: là archive
/// và base name (bỏ đuôi) match pattern.
///
/// Dùng chung cho directory scan local và file listing trên cloud -
/// logic filter không phụ thuộc nguồn dữ liệu.
pub fn is_tar_candidate(file_name: &str, pattern: &str) -> bool {
    is_image_archive(file_name) && matches(strip_archive_suffix(file_name), pattern)
}

/// Lấy phần tên file sau dấu `/` cuối cùng (path local hoặc cloud).
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Tách image reference thành (name, tag).
///
/// `:segment` cuối chỉ là tag khi không chứa `/` - ngược lại đó là
/// registry port (vd `registry:5000/app`).
pub fn split_repo_tag(image: &str) -> (&str, &str) {
    match image.rsplit_once(':') {
        Some((name, tag)) if !tag.contains('/') => (name, tag),
        _ => (image, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_filename_simple() {
        assert_eq!(
            canonical_filename("nginx", "latest", "linux", "amd64"),
            "nginx_latest_linux_amd64.tar"
        );
    }

    #[test]
    fn test_canonical_filename_defaults() {
        assert_eq!(
            canonical_filename("my/app", "", "", ""),
            "my·app_latest_unknown_unknown.tar"
        );
    }

    #[test]
    fn test_canonical_filename_never_contains_slash() {
        let names = ["library/nginx", "ghcr.io/owner/repo", "a/b/c/d"];
        for name in names {
            let filename = canonical_filename(name, "v1", "linux", "arm64");
            assert!(!filename.contains('/'), "slash leaked in {}", filename);
        }
    }

    #[test]
    fn test_matches_empty_pattern() {
        assert!(matches("anything", ""));
        assert!(matches("", ""));
    }

    #[test]
    fn test_matches_substring() {
        assert!(matches("nginx_latest_linux_amd64", "nginx"));
        assert!(matches("nginx_latest_linux_amd64", "latest_linux"));
        assert!(!matches("nginx_latest_linux_amd64", "alpine"));
        // Case-sensitive
        assert!(!matches("nginx", "NGINX"));
    }

    #[test]
    fn test_is_image_archive_case_insensitive() {
        assert!(is_image_archive("image.tar"));
        assert!(is_image_archive("IMAGE.TAR"));
        assert!(is_image_archive("image.tar.gz"));
        assert!(is_image_archive("image.TGZ"));
        assert!(!is_image_archive("image.zip"));
        assert!(!is_image_archive("image.tar.bak"));
    }

    #[test]
    fn test_strip_archive_suffix() {
        assert_eq!(strip_archive_suffix("nginx_latest.tar"), "nginx_latest");
        assert_eq!(strip_archive_suffix("nginx_latest.tar.gz"), "nginx_latest");
        assert_eq!(strip_archive_suffix("nginx_latest.TGZ"), "nginx_latest");
        assert_eq!(strip_archive_suffix("plain"), "plain");
    }

    #[test]
    fn test_is_tar_candidate() {
        // Pattern rỗng giữ mọi archive, loại file khác
        assert!(is_tar_candidate("nginx_latest_linux_amd64.tar", ""));
        assert!(is_tar_candidate("ALPINE_3.20.TAR", ""));
        assert!(!is_tar_candidate("notes.txt", ""));

        // Pattern match trên base name đã bỏ đuôi
        assert!(is_tar_candidate("nginx_latest_linux_amd64.tar.gz", "nginx"));
        assert!(!is_tar_candidate("redis_7_linux_amd64.tar", "nginx"));
    }

    #[test]
    fn test_split_repo_tag() {
        assert_eq!(split_repo_tag("nginx:latest"), ("nginx", "latest"));
        assert_eq!(split_repo_tag("nginx"), ("nginx", ""));
        assert_eq!(
            split_repo_tag("registry:5000/app"),
            ("registry:5000/app", "")
        );
        assert_eq!(
            split_repo_tag("registry:5000/app:v2"),
            ("registry:5000/app", "v2")
        );
    }
}
