//! Docker client - Gọi `docker` binary qua std::process::Command.
//!
//! Mọi thao tác image (list, inspect, save, load, rmi) đi qua CLI của
//! Docker thay vì nói chuyện trực tiếp với daemon socket - cách này
//! luôn dùng đúng context/credentials mà user đã cấu hình cho `docker`.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Wrapper quanh docker binary.
pub struct DockerCli {
    docker_path: PathBuf,
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            docker_path: Self::find_docker(),
        }
    }

    /// Locate docker binary trên system PATH.
    fn find_docker() -> PathBuf {
        if cfg!(windows) {
            PathBuf::from("docker.exe")
        } else {
            PathBuf::from("docker")
        }
    }

    /// Chạy docker command và trả về stdout.
    fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.docker_path)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .context("Cannot execute docker (is it installed and on PATH?)")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("docker {} failed: {}", args.first().unwrap_or(&""), stderr.trim());
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// List các image reference đã tag, bỏ qua dangling images.
    pub fn list_images(&self) -> Result<Vec<String>> {
        let output = self.run(&["images", "--format", "{{.Repository}}:{{.Tag}}"])?;
        Ok(parse_image_list(&output))
    }

    /// Lấy (os, architecture) của image. Inspect thất bại không chặn
    /// export - caller dùng placeholder thay thế.
    pub fn inspect_platform(&self, image: &str) -> Result<(String, String)> {
        let output = self.run(&[
            "image",
            "inspect",
            "--format",
            "{{.Os}}|{{.Architecture}}",
            image,
        ])?;
        parse_platform(&output)
            .with_context(|| format!("Unexpected inspect output for {}", image))
    }

    /// Save image ra file .tar.
    pub fn save(&self, image: &str, dest: &Path) -> Result<()> {
        let dest_str = dest
            .to_str()
            .with_context(|| format!("Non-UTF8 destination path: {}", dest.display()))?;
        self.run(&["save", "-o", dest_str, image])?;
        Ok(())
    }

    /// Load image từ file archive (.tar hoặc gzip - daemon tự nhận dạng).
    pub fn load(&self, source: &Path) -> Result<String> {
        let source_str = source
            .to_str()
            .with_context(|| format!("Non-UTF8 source path: {}", source.display()))?;
        let output = self.run(&["load", "-i", source_str])?;
        Ok(output.trim().to_string())
    }

    /// Xóa image khỏi local daemon (không force).
    pub fn remove(&self, image: &str) -> Result<()> {
        self.run(&["rmi", image])?;
        Ok(())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse output của `docker images --format "{{.Repository}}:{{.Tag}}"`.
fn parse_image_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains("<none>"))
        .map(str::to_string)
        .collect()
}

/// Parse output của inspect format `{{.Os}}|{{.Architecture}}`.
fn parse_platform(output: &str) -> Option<(String, String)> {
    let (os, arch) = output.trim().split_once('|')?;
    Some((os.to_string(), arch.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_image_list() {
        let output = "nginx:latest\n<none>:<none>\nredis:7\n\nghcr.io/owner/app:v1\n";
        let images = parse_image_list(output);
        assert_eq!(images, vec!["nginx:latest", "redis:7", "ghcr.io/owner/app:v1"]);
    }

    #[test]
    fn test_parse_image_list_empty() {
        assert!(parse_image_list("").is_empty());
        assert!(parse_image_list("<none>:<none>\n").is_empty());
    }

    #[test]
    fn test_parse_platform() {
        assert_eq!(
            parse_platform("linux|amd64\n"),
            Some(("linux".to_string(), "amd64".to_string()))
        );
        assert_eq!(parse_platform("garbage"), None);
    }
}
