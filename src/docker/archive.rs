//! Archive module - Đọc manifest.json bên trong image archive.
//!
//! Sau khi load thành công, tool đọc lại archive để báo cáo image nào
//! vừa được import. Đọc manifest thất bại chỉ làm message bớt chi tiết,
//! không ảnh hưởng kết quả load.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Một entry trong manifest.json của docker archive
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    #[serde(rename = "RepoTags", default)]
    repo_tags: Option<Vec<String>>,
}

/// Kiểm tra archive có nén gzip không, dựa vào đuôi file.
fn is_gzipped(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// Lấy danh sách repo tags từ manifest.json trong archive.
///
/// Trả về vec rỗng nếu archive không có manifest (vd output của
/// `docker export` thay vì `docker save`).
pub fn peek_repo_tags(path: &Path) -> Result<Vec<String>> {
    let file =
        File::open(path).with_context(|| format!("Cannot open archive {}", path.display()))?;

    if is_gzipped(path) {
        read_manifest_tags(GzDecoder::new(file))
    } else {
        read_manifest_tags(file)
    }
}

fn read_manifest_tags<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut archive = tar::Archive::new(reader);

    for entry in archive.entries().context("Cannot read tar entries")? {
        let mut entry = entry.context("Corrupt tar entry")?;
        if entry.path()?.as_ref() != Path::new("manifest.json") {
            continue;
        }

        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .context("Cannot read manifest.json")?;

        let manifest: Vec<ManifestEntry> =
            serde_json::from_str(&content).context("Cannot parse manifest.json")?;

        return Ok(manifest
            .into_iter()
            .flat_map(|m| m.repo_tags.unwrap_or_default())
            .collect());
    }

    Ok(Vec::new())
}
