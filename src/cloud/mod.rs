//! Cloud collaborator - BDFS (Baidu netdisk) qua OAuth device flow và
//! xpan REST API.

pub mod auth;
pub mod bdfs;

pub use bdfs::{BdfsClient, CloudFile};
