//! BDFS client - Thao tác file trên Baidu netdisk qua xpan REST API.
//!
//! Upload dùng protocol 3 bước của xpan: `precreate` (gửi danh sách MD5
//! của các block 4 MiB) → `superfile2` (upload từng block) → `create`
//! (ghép block thành file). Download đi qua dlink lấy từ `filemetas`.

use super::auth::BdfsToken;
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use md5::{Digest, Md5};
use reqwest::blocking::multipart;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const XPAN_FILE_URL: &str = "https://pan.baidu.com/rest/2.0/xpan/file";
const XPAN_MULTIMEDIA_URL: &str = "https://pan.baidu.com/rest/2.0/xpan/multimedia";
const SUPERFILE_URL: &str = "https://d.pcs.baidu.com/rest/2.0/pcs/superfile2";

/// Kích thước block upload theo yêu cầu của xpan (4 MiB)
const UPLOAD_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// errno của xpan khi path không tồn tại
const ERRNO_NOT_FOUND: i64 = -9;

/// Metadata một file/folder trên netdisk.
#[derive(Debug, Clone)]
pub struct CloudFile {
    pub fs_id: u64,
    /// Đường dẫn đầy đủ trên cloud
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    fs_id: u64,
    path: String,
    isdir: u8,
    #[serde(default)]
    size: u64,
}

impl From<RawFile> for CloudFile {
    fn from(raw: RawFile) -> Self {
        CloudFile {
            fs_id: raw.fs_id,
            path: raw.path,
            is_dir: raw.isdir == 1,
            size: raw.size,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    errno: i64,
    #[serde(default)]
    list: Vec<RawFile>,
}

#[derive(Debug, Deserialize)]
struct FileMetasResponse {
    errno: i64,
    #[serde(default)]
    list: Vec<FileMeta>,
}

#[derive(Debug, Deserialize)]
struct FileMeta {
    #[serde(default)]
    dlink: String,
}

#[derive(Debug, Deserialize)]
struct PrecreateResponse {
    errno: i64,
    #[serde(default)]
    uploadid: String,
}

#[derive(Debug, Deserialize)]
struct SuperfileResponse {
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    error_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    errno: i64,
}

/// Client cho xpan API, giữ access token đã authorize.
pub struct BdfsClient {
    client: reqwest::blocking::Client,
    access_token: String,
}

impl BdfsClient {
    pub fn new(token: &BdfsToken) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            access_token: token.access_token.clone(),
        }
    }

    /// List nội dung một thư mục trên cloud.
    ///
    /// Trả về Err khi path không tồn tại hoặc không phải thư mục -
    /// caller có thể thử `get_file_info` để xử lý trường hợp file đơn.
    pub fn list_files(&self, dir: &str) -> Result<Vec<CloudFile>> {
        let response = self
            .client
            .get(XPAN_FILE_URL)
            .query(&[
                ("method", "list"),
                ("access_token", self.access_token.as_str()),
                ("dir", dir),
            ])
            .send()
            .context("Cannot list cloud directory")?;

        let list: ListResponse = response.json().context("Cannot parse list response")?;
        if list.errno == ERRNO_NOT_FOUND {
            bail!("Cloud path not found: {}", dir);
        }
        if list.errno != 0 {
            bail!("BDFS list error (errno {}) for {}", list.errno, dir);
        }

        Ok(list.list.into_iter().map(CloudFile::from).collect())
    }

    /// Resolve một đường dẫn file đơn về metadata qua listing thư mục cha.
    ///
    /// xpan không có stat-by-path nên phải list parent rồi so path.
    pub fn get_file_info(&self, path: &str) -> Result<Option<CloudFile>> {
        let parent = parent_dir(path);
        let entries = self.list_files(parent)?;
        Ok(entries.into_iter().find(|f| f.path == path))
    }

    /// Lấy dlink download cho một fs_id.
    fn dlink(&self, fs_id: u64) -> Result<String> {
        let fsids = format!("[{}]", fs_id);
        let response = self
            .client
            .get(XPAN_MULTIMEDIA_URL)
            .query(&[
                ("method", "filemetas"),
                ("access_token", self.access_token.as_str()),
                ("fsids", fsids.as_str()),
                ("dlink", "1"),
            ])
            .send()
            .context("Cannot fetch file metadata")?;

        let metas: FileMetasResponse = response.json().context("Cannot parse filemetas")?;
        if metas.errno != 0 {
            bail!("BDFS filemetas error (errno {})", metas.errno);
        }

        let dlink = metas
            .list
            .into_iter()
            .next()
            .map(|m| m.dlink)
            .filter(|d| !d.is_empty())
            .with_context(|| format!("No download link for fs_id {}", fs_id))?;
        Ok(dlink)
    }

    /// Download một file về đường dẫn local.
    pub fn download_file(&self, file: &CloudFile, dest: &Path) -> Result<()> {
        let dlink = self.dlink(file.fs_id)?;

        // dlink yêu cầu đúng User-Agent này, khác đi sẽ trả 403
        let response = self
            .client
            .get(&dlink)
            .query(&[("access_token", self.access_token.as_str())])
            .header(reqwest::header::USER_AGENT, "pan.baidu.com")
            .send()
            .context("Cannot download from cloud")?;

        if !response.status().is_success() {
            bail!("Download failed with status {}", response.status());
        }

        let total = response.content_length().unwrap_or(file.size);
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{bar:30.cyan/blue} {bytes}/{total_bytes} {msg}")
                .unwrap(),
        );

        let mut out = File::create(dest)
            .with_context(|| format!("Cannot create local file {}", dest.display()))?;
        std::io::copy(&mut pb.wrap_read(response), &mut out)
            .context("Cannot write downloaded content")?;
        pb.finish_and_clear();

        Ok(())
    }

    /// Upload một file local lên đường dẫn cloud (overwrite nếu đã có).
    pub fn upload_file(&self, local: &Path, remote_path: &str) -> Result<()> {
        let size = std::fs::metadata(local)
            .with_context(|| format!("Cannot stat {}", local.display()))?
            .len();

        let source =
            File::open(local).with_context(|| format!("Cannot open {}", local.display()))?;
        let block_md5s = compute_block_md5s(source, UPLOAD_BLOCK_SIZE)?;
        let block_list = serde_json::to_string(&block_md5s)?;

        // Bước 1: precreate với danh sách MD5 các block
        let size_str = size.to_string();
        let response = self
            .client
            .post(XPAN_FILE_URL)
            .query(&[
                ("method", "precreate"),
                ("access_token", self.access_token.as_str()),
            ])
            .form(&[
                ("path", remote_path),
                ("size", size_str.as_str()),
                ("isdir", "0"),
                ("autoinit", "1"),
                ("rtype", "3"),
                ("block_list", block_list.as_str()),
            ])
            .send()
            .context("Cannot precreate upload")?;

        let precreate: PrecreateResponse =
            response.json().context("Cannot parse precreate response")?;
        if precreate.errno != 0 {
            bail!("BDFS precreate error (errno {})", precreate.errno);
        }

        // Bước 2: upload từng block qua superfile2
        let pb = ProgressBar::new(block_md5s.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{bar:30.cyan/blue} block {pos}/{len}")
                .unwrap(),
        );

        let mut source = File::open(local)?;
        let mut buffer = vec![0u8; UPLOAD_BLOCK_SIZE];
        for partseq in 0..block_md5s.len() {
            let read = read_block(&mut source, &mut buffer)?;
            self.upload_block(remote_path, &precreate.uploadid, partseq, &buffer[..read])?;
            pb.inc(1);
        }
        pb.finish_and_clear();

        // Bước 3: create để ghép các block thành file
        let response = self
            .client
            .post(XPAN_FILE_URL)
            .query(&[
                ("method", "create"),
                ("access_token", self.access_token.as_str()),
            ])
            .form(&[
                ("path", remote_path),
                ("size", size_str.as_str()),
                ("isdir", "0"),
                ("rtype", "3"),
                ("uploadid", precreate.uploadid.as_str()),
                ("block_list", block_list.as_str()),
            ])
            .send()
            .context("Cannot finalize upload")?;

        let create: CreateResponse = response.json().context("Cannot parse create response")?;
        if create.errno != 0 {
            bail!("BDFS create error (errno {})", create.errno);
        }

        Ok(())
    }

    fn upload_block(
        &self,
        remote_path: &str,
        uploadid: &str,
        partseq: usize,
        block: &[u8],
    ) -> Result<()> {
        let part = multipart::Part::bytes(block.to_vec()).file_name("block");
        let form = multipart::Form::new().part("file", part);
        let partseq_str = partseq.to_string();

        let response = self
            .client
            .post(SUPERFILE_URL)
            .query(&[
                ("method", "upload"),
                ("access_token", self.access_token.as_str()),
                ("type", "tmpfile"),
                ("path", remote_path),
                ("uploadid", uploadid),
                ("partseq", partseq_str.as_str()),
            ])
            .multipart(form)
            .send()
            .with_context(|| format!("Cannot upload block {}", partseq))?;

        if !response.status().is_success() {
            bail!("Block {} upload failed with status {}", partseq, response.status());
        }

        let result: SuperfileResponse = response
            .json()
            .with_context(|| format!("Cannot parse block {} response", partseq))?;
        if let Some(code) = result.error_code {
            bail!(
                "Block {} upload error {}: {}",
                partseq,
                code,
                result.error_msg.unwrap_or_default()
            );
        }

        Ok(())
    }
}

/// Thư mục cha của một đường dẫn cloud ("/a/b/c.tar" -> "/a/b").
fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Ghép thư mục cloud với tên file, tránh lặp dấu `/`.
pub fn remote_join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Tính MD5 hex cho từng block của reader.
fn compute_block_md5s<R: Read>(mut reader: R, block_size: usize) -> Result<Vec<String>> {
    let mut md5s = Vec::new();
    let mut buffer = vec![0u8; block_size];

    loop {
        let read = read_block(&mut reader, &mut buffer)?;
        if read == 0 {
            break;
        }
        let mut hasher = Md5::new();
        hasher.update(&buffer[..read]);
        md5s.push(format!("{:x}", hasher.finalize()));
        if read < block_size {
            break;
        }
    }

    // File rỗng vẫn cần một block entry để precreate chấp nhận
    if md5s.is_empty() {
        md5s.push(format!("{:x}", Md5::new().finalize()));
    }

    Ok(md5s)
}

/// Đọc đầy buffer hoặc tới EOF, trả về số byte đọc được.
fn read_block<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = reader
            .read(&mut buffer[filled..])
            .context("Cannot read source file")?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_response() {
        let json = r#"{
            "errno": 0,
            "list": [
                {"fs_id": 123, "path": "/imgs/nginx.tar", "isdir": 0, "size": 42},
                {"fs_id": 456, "path": "/imgs/sub", "isdir": 1}
            ]
        }"#;
        let parsed: ListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.errno, 0);

        let files: Vec<CloudFile> = parsed.list.into_iter().map(CloudFile::from).collect();
        assert_eq!(files[0].path, "/imgs/nginx.tar");
        assert!(!files[0].is_dir);
        assert_eq!(files[0].size, 42);
        assert!(files[1].is_dir);
        assert_eq!(files[1].size, 0);
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("/a/b/c.tar"), "/a/b");
        assert_eq!(parent_dir("/c.tar"), "/");
        assert_eq!(parent_dir("c.tar"), "/");
    }

    #[test]
    fn test_remote_join() {
        assert_eq!(remote_join("/", "a.tar"), "/a.tar");
        assert_eq!(remote_join("/imgs", "a.tar"), "/imgs/a.tar");
        assert_eq!(remote_join("/imgs/", "a.tar"), "/imgs/a.tar");
    }

    #[test]
    fn test_compute_block_md5s_single_block() {
        let md5s = compute_block_md5s("hello".as_bytes(), 16).unwrap();
        assert_eq!(md5s, vec!["5d41402abc4b2a76b9719d911017c592"]);
    }

    #[test]
    fn test_compute_block_md5s_splits_blocks() {
        let data = vec![0u8; 10];
        let md5s = compute_block_md5s(&data[..], 4).unwrap();
        // 10 bytes với block 4 -> 3 blocks (4 + 4 + 2)
        assert_eq!(md5s.len(), 3);
        assert_eq!(md5s[0], md5s[1]);
        assert_ne!(md5s[1], md5s[2]);
    }

    #[test]
    fn test_compute_block_md5s_empty_input() {
        let md5s = compute_block_md5s(&[][..], 4).unwrap();
        // MD5 của input rỗng
        assert_eq!(md5s, vec!["d41d8cd98f00b204e9800998ecf8427e"]);
    }
}
