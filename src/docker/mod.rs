//! Docker collaborator - Wrapper quanh `docker` binary và image archives.

pub mod archive;
pub mod client;

pub use client::DockerCli;
