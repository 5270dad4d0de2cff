//! Command implementations cho DockVault CLI.
//!
//! Các commands chính:
//! - export: Save images thành .tar local hoặc upload lên BDFS
//! - import: Load images từ .tar local hoặc download từ BDFS
//! - delete: Xóa images khỏi local daemon
//! - clean: Dọn thư mục cache tạm
//!
//! Lỗi trên từng item trong loop export/import/delete được báo riêng và
//! loop tiếp tục; mọi lỗi khác dừng cả invocation.

use crate::cli::select::prompt_multi_select;
use crate::cloud::auth;
use crate::cloud::bdfs::remote_join;
use crate::cloud::{BdfsClient, CloudFile};
use crate::config::{self, BdfsConfig};
use crate::docker::{archive, DockerCli};
use crate::naming;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use inquire::Confirm;
use std::path::{Path, PathBuf};

/// Thư mục cache tạm dùng cho round-trip export/upload và download/import
pub fn cache_dir() -> PathBuf {
    std::env::temp_dir().join("dockvault")
}

fn success(msg: &str) {
    println!("{} {}", "[√]".green(), msg);
}

fn failure(msg: &str) {
    println!("{} {}", "[x]".red(), msg);
}

/// List images từ daemon, filter theo pattern, rồi hiện menu chọn.
fn select_images(docker: &DockerCli, pattern: &str, prompt: &str) -> Result<Vec<String>> {
    let images = docker.list_images()?;
    if images.is_empty() {
        bail!("No Docker images found");
    }

    let candidates: Vec<String> = images
        .into_iter()
        .filter(|tag| naming::matches(tag, pattern))
        .collect();
    if candidates.is_empty() {
        bail!("No tagged Docker images found");
    }

    println!("Found {} tagged Docker image(s)", candidates.len());
    prompt_multi_select(prompt, &candidates)
}

/// Save một image ra thư mục đích với tên file canonical.
fn export_one(docker: &DockerCli, image: &str, dest_dir: &Path) -> Result<PathBuf> {
    // Inspect thất bại không chặn export - dùng placeholder trong tên file
    let (os, arch) = match docker.inspect_platform(image) {
        Ok(platform) => platform,
        Err(e) => {
            println!("Warning: Could not inspect image {}: {:#}", image, e);
            (String::new(), String::new())
        }
    };

    let (name, tag) = naming::split_repo_tag(image);
    let filename = naming::canonical_filename(name, tag, &os, &arch);
    let path = dest_dir.join(&filename);

    println!("Exporting image {} to {}...", image, path.display());
    docker.save(image, &path)?;
    Ok(path)
}

/// Export images được chọn ra thư mục local hoặc BDFS cloud.
pub fn export(destination: Option<String>, cloud: Option<String>, pattern: &str) -> Result<()> {
    match cloud {
        Some(dir) if !dir.is_empty() => export_to_cloud(&dir, pattern),
        Some(_) => {
            // Bare -c: dùng default_cloud_dir trong config
            let cfg = BdfsConfig::resolve().context("Error getting BDFS configuration")?;
            export_to_cloud(&cfg.default_cloud_dir, pattern)
        }
        None => {
            if destination.is_none() && config::is_env_configured() {
                // Không flag nào nhưng BDFS đã cấu hình qua env - mặc định đi cloud
                let cfg = BdfsConfig::resolve().context("Error getting BDFS configuration")?;
                export_to_cloud(&cfg.default_cloud_dir, pattern)
            } else {
                let dest = destination.map(PathBuf::from).unwrap_or_else(cache_dir);
                export_to_local(&dest, pattern)
            }
        }
    }
}

fn export_to_local(dest: &Path, pattern: &str) -> Result<()> {
    let docker = DockerCli::new();
    let selected = select_images(&docker, pattern, "Select Docker images to export:")?;

    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create destination directory {}", dest.display()))?;

    for image in &selected {
        match export_one(&docker, image, dest) {
            Ok(path) => success(&format!(
                "Successfully exported image {} to {}",
                image,
                path.display()
            )),
            Err(e) => failure(&format!("Failed to export image {}: {:#}", image, e)),
        }
    }

    Ok(())
}

fn export_to_cloud(cloud_dir: &str, pattern: &str) -> Result<()> {
    let cfg = BdfsConfig::resolve().context("Error getting BDFS configuration")?;
    let token = auth::authorize(&cfg).context("Failed to login to Baidu cloud")?;
    let client = BdfsClient::new(&token);
    success("Successfully logged in to Baidu cloud");

    let docker = DockerCli::new();
    let selected = select_images(&docker, pattern, "Select Docker images to export to cloud:")?;

    let temp = cache_dir();
    std::fs::create_dir_all(&temp)
        .with_context(|| format!("Failed to create temp directory {}", temp.display()))?;

    for image in &selected {
        let local_path = match export_one(&docker, image, &temp) {
            Ok(path) => path,
            Err(e) => {
                failure(&format!("Failed to export image {}: {:#}", image, e));
                continue;
            }
        };

        let filename = local_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let remote_path = remote_join(cloud_dir, &filename);

        println!("Uploading {} to cloud path {}...", local_path.display(), remote_path);
        if let Err(e) = client.upload_file(&local_path, &remote_path) {
            failure(&format!("Failed to upload {}: {:#}", local_path.display(), e));
            let _ = std::fs::remove_file(&local_path);
            continue;
        }

        // Xóa file tạm sau khi upload thành công
        if let Err(e) = std::fs::remove_file(&local_path) {
            println!(
                "Warning: Failed to remove temporary file {}: {}",
                local_path.display(),
                e
            );
        }

        success(&format!(
            "Successfully exported and uploaded image {} to {}",
            image, remote_path
        ));
    }

    Ok(())
}

/// Import images từ nguồn local hoặc BDFS cloud.
pub fn import(source: Option<String>, cloud: Option<String>, pattern: &str) -> Result<()> {
    match (source, cloud) {
        (Some(src), _) => import_from_source(Path::new(&src), pattern),
        (None, Some(path)) if !path.is_empty() => import_from_cloud(&path, pattern),
        (None, Some(_)) => {
            let cfg = BdfsConfig::resolve().context("Error getting BDFS configuration")?;
            import_from_cloud(&cfg.default_cloud_dir, pattern)
        }
        (None, None) => {
            bail!("either -s/--source or -c/--cloud flag is required for import command")
        }
    }
}

fn import_from_source(source: &Path, pattern: &str) -> Result<()> {
    let metadata = std::fs::metadata(source)
        .with_context(|| format!("Error accessing source {}", source.display()))?;

    if metadata.is_dir() {
        import_from_directory(source, pattern)
    } else {
        let docker = DockerCli::new();
        import_file(&docker, source)
    }
}

/// Thu thập file đệ quy trong một thư mục.
fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) {
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_dir() {
                collect_files(&path, files);
            } else if path.is_file() {
                files.push(path);
            }
        }
    }
}

fn is_archive_candidate(path: &Path, pattern: &str) -> bool {
    path.file_name()
        .map(|n| naming::is_tar_candidate(&n.to_string_lossy(), pattern))
        .unwrap_or(false)
}

fn import_from_directory(dir: &Path, pattern: &str) -> Result<()> {
    let mut all_files = Vec::new();
    collect_files(dir, &mut all_files);

    let tar_files: Vec<PathBuf> = all_files
        .into_iter()
        .filter(|p| is_archive_candidate(p, pattern))
        .collect();
    if tar_files.is_empty() {
        bail!("No .tar files found in the specified directory");
    }

    let base_names: Vec<String> = tar_files
        .iter()
        .map(|p| p.file_name().unwrap_or_default().to_string_lossy().to_string())
        .collect();

    let selected =
        prompt_multi_select("Select .tar files to import as Docker images:", &base_names)?;

    // Map base names đã chọn ngược về full paths
    let selected_paths: Vec<&PathBuf> = selected
        .iter()
        .filter_map(|name| {
            tar_files
                .iter()
                .find(|p| p.file_name().is_some_and(|n| n.to_string_lossy() == *name))
        })
        .collect();

    let docker = DockerCli::new();
    for path in selected_paths {
        if let Err(e) = import_file(&docker, path) {
            failure(&format!("Failed to import {}: {:#}", path.display(), e));
        }
    }

    Ok(())
}

/// Load một archive vào daemon và báo cáo image vừa import.
fn import_file(docker: &DockerCli, path: &Path) -> Result<()> {
    println!("Importing image from file: {}", path.display());

    docker
        .load(path)
        .with_context(|| format!("Failed to load image from {}", path.display()))?;

    // Đọc manifest chỉ để message chi tiết hơn, thất bại vẫn là thành công
    match archive::peek_repo_tags(path) {
        Ok(tags) if !tags.is_empty() => success(&format!(
            "Successfully imported image from {}: {}",
            path.display(),
            tags.join(", ")
        )),
        _ => success(&format!("Successfully imported image from {}", path.display())),
    }

    Ok(())
}

fn import_from_cloud(cloud_path: &str, pattern: &str) -> Result<()> {
    let cfg = BdfsConfig::resolve().context("Error getting BDFS configuration")?;
    let token = auth::authorize(&cfg).context("Failed to login to Baidu cloud")?;
    let client = BdfsClient::new(&token);
    success("Successfully logged in to Baidu cloud");

    let docker = DockerCli::new();

    // List thất bại thì coi path là file đơn
    match client.list_files(cloud_path) {
        Ok(files) => {
            let tar_files: Vec<CloudFile> = files
                .into_iter()
                .filter(|f| !f.is_dir && naming::is_tar_candidate(naming::base_name(&f.path), pattern))
                .collect();
            if tar_files.is_empty() {
                bail!("No .tar files found in the specified cloud directory");
            }

            let base_names: Vec<String> = tar_files
                .iter()
                .map(|f| naming::base_name(&f.path).to_string())
                .collect();

            let selected = prompt_multi_select(
                "Select .tar files to download and import as Docker images:",
                &base_names,
            )?;

            let selected_files: Vec<&CloudFile> = selected
                .iter()
                .filter_map(|name| {
                    tar_files.iter().find(|f| naming::base_name(&f.path) == name)
                })
                .collect();

            for file in selected_files {
                if let Err(e) = download_and_import(&client, &docker, file) {
                    failure(&format!("Failed to import {}: {:#}", file.path, e));
                }
            }
            Ok(())
        }
        Err(_) => {
            let info = client
                .get_file_info(cloud_path)?
                .with_context(|| format!("Error accessing cloud file {}", cloud_path))?;

            if !naming::is_image_archive(&info.path) {
                bail!("The specified file {} is not a .tar file", cloud_path);
            }
            download_and_import(&client, &docker, &info)
        }
    }
}

/// Download một file từ cloud về cache rồi load vào daemon.
fn download_and_import(client: &BdfsClient, docker: &DockerCli, file: &CloudFile) -> Result<()> {
    let temp = cache_dir();
    std::fs::create_dir_all(&temp)
        .with_context(|| format!("Failed to create temp directory {}", temp.display()))?;

    let local_path = temp.join(naming::base_name(&file.path));

    println!(
        "Downloading {} from Baidu cloud to temporary file {}...",
        file.path,
        local_path.display()
    );
    client.download_file(file, &local_path)?;

    import_file(docker, &local_path)?;

    // Xóa file tạm sau khi import thành công
    if let Err(e) = std::fs::remove_file(&local_path) {
        println!(
            "Warning: Failed to remove temporary file {}: {}",
            local_path.display(),
            e
        );
    }

    Ok(())
}

/// Xóa images được chọn khỏi local daemon.
pub fn delete(pattern: &str) -> Result<()> {
    let docker = DockerCli::new();
    let selected = select_images(&docker, pattern, "Select Docker images to delete:")?;

    for image in &selected {
        println!("Deleting image {}...", image);
        match docker.remove(image) {
            Ok(()) => success(&format!("Successfully deleted image {}", image)),
            Err(e) => failure(&format!("Failed to delete image {}: {:#}", image, e)),
        }
    }

    Ok(())
}

/// Dọn sạch thư mục cache tạm sau khi user xác nhận.
pub fn clean() -> Result<()> {
    let dir = cache_dir();
    if !dir.exists() {
        bail!("Cache directory does not exist: {}", dir.display());
    }

    let entries: Vec<PathBuf> = std::fs::read_dir(&dir)
        .with_context(|| format!("Failed to read cache directory {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();

    if entries.is_empty() {
        println!("No files found in cache directory: {}", dir.display());
        return Ok(());
    }

    for path in &entries {
        println!("- {}", path.display());
    }

    let confirmed = Confirm::new(&format!(
        "Found {} file(s) in cache directory. Delete all?",
        entries.len()
    ))
    .with_default(false)
    .prompt()
    .context("Failed to read confirmation")?;

    if !confirmed {
        failure("Cache cleanup cancelled by user");
        return Ok(());
    }

    let mut deleted = 0;
    for path in &entries {
        let result = if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        match result {
            Ok(()) => deleted += 1,
            Err(e) => failure(&format!("Failed to delete {}: {}", path.display(), e)),
        }
    }

    success(&format!(
        "Successfully cleaned cache directory. Deleted {} file(s)",
        deleted
    ));
    Ok(())
}

/// In phiên bản chương trình.
pub fn version() {
    println!("dockvault version v{}", env!("CARGO_PKG_VERSION"));
}
