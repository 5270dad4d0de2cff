//! CLI definitions và command implementations cho DockVault.

pub mod commands;
pub mod select;

use clap::{Parser, Subcommand};

/// DockVault - Vault for your Docker images
#[derive(Parser)]
#[command(name = "dkv")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export Docker images ra thư mục local hoặc BDFS cloud
    Export {
        /// Thư mục đích cho file .tar (mutually exclusive với --cloud)
        #[arg(short, long, conflicts_with = "cloud")]
        destination: Option<String>,

        /// Thư mục BDFS để upload; để trống giá trị thì dùng
        /// default_cloud_dir trong config
        #[arg(short, long, num_args = 0..=1, default_missing_value = "")]
        cloud: Option<String>,

        /// Chỉ giữ images có tag chứa pattern
        #[arg(short, long, default_value = "")]
        grep: String,
    },

    /// Import Docker images từ file .tar local hoặc BDFS cloud
    Import {
        /// File .tar hoặc thư mục chứa file .tar (mutually exclusive với --cloud)
        #[arg(short, long, conflicts_with = "cloud")]
        source: Option<String>,

        /// File hoặc thư mục BDFS để download; để trống giá trị thì dùng
        /// default_cloud_dir trong config
        #[arg(short, long, num_args = 0..=1, default_missing_value = "")]
        cloud: Option<String>,

        /// Chỉ giữ files có base name chứa pattern
        #[arg(short, long, default_value = "")]
        grep: String,
    },

    /// Xóa Docker images khỏi local daemon
    Delete {
        /// Chỉ giữ images có tag chứa pattern
        #[arg(short, long, default_value = "")]
        grep: String,
    },

    /// Dọn sạch thư mục cache tạm
    Clean,

    /// In phiên bản chương trình
    Version,
}
