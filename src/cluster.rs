//! Cluster definitions and the ssh connection to a cluster's login node

use std::fmt;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tinytemplate::TinyTemplate;

use crate::error::{Error, Result};
use crate::scheduler::SchedulerKind;
use crate::transport::{CommandOutput, Transport};

/// Named clusters loaded from JSON and checked against a JSON schema
pub mod registry;

/// Optional sshfs mount of the remote filesystem
pub mod mount;

/// Static description of an HPC cluster
///
/// `remote_filesystem_path` may contain `{username}`, which is replaced by the remote username
/// discovered when connecting.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClusterConfig {
    pub name: String,
    pub host: String,
    pub container_image: String,
    pub bind: String,
    pub ram_per_node_gb: f64,
    pub cores_per_node: u32,
    pub queue: String,
    pub shared_queue: String,
    pub remote_filesystem_path: String,
    #[serde(default)]
    pub scheduler: SchedulerKind,
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.chars().any(char::is_whitespace) {
            return Err(Error::configuration(format!(
                "cluster name {:?} must be non-empty and contain no whitespace",
                self.name
            )));
        }
        if self.host.is_empty() {
            return Err(Error::configuration(format!("cluster {} has no host", self.name)));
        }
        if self.cores_per_node == 0 {
            return Err(Error::configuration(format!("cluster {} has zero cores per node", self.name)));
        }
        Ok(())
    }

    /// Jobs that don't fill a node go to the shared queue
    pub fn queue_for(&self, cores: u32) -> &str {
        if cores < self.cores_per_node {
            &self.shared_queue
        } else {
            &self.queue
        }
    }

    /// RAM available to a job for every possible core count on one node
    pub fn available_resources(&self) -> Vec<CoreAllocation> {
        let per_core = self.ram_per_node_gb / f64::from(self.cores_per_node);
        (1..=self.cores_per_node)
            .map(|cores| CoreAllocation { cores, ram_gb: per_core * f64::from(cores) })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreAllocation {
    pub cores: u32,
    pub ram_gb: f64,
}

impl fmt::Display for CoreAllocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let plural = if self.cores > 1 { "s" } else { "" };
        write!(f, "{} core{}: {:.1} GB RAM", self.cores, plural, self.ram_gb)
    }
}

/// What is known about the connection right now
///
/// `mounted` comes from the live mount table, it is never remembered between calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    pub remote_username: String,
    pub mounted: bool,
}

/// A cluster whose login node answered the connection probe
pub struct Cluster<T: Transport> {
    config: ClusterConfig,
    transport: T,
    remote_username: String,
    remote_filesystem_path: String,
    local_mount_point: PathBuf,
}

#[derive(Serialize)]
struct RemotePathContext {
    username: String,
}

impl<T: Transport> Cluster<T> {
    /// Validate the config and probe the login node with `whoami`
    ///
    /// The local mount point is `$HOME/<cluster name>`.
    pub fn connect(config: ClusterConfig, transport: T) -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::configuration("can't determine home directory"))?;
        let mount_point = home.join(&config.name);
        Self::connect_with_mount_point(config, transport, mount_point)
    }

    pub fn connect_with_mount_point(config: ClusterConfig, transport: T, local_mount_point: PathBuf) -> Result<Self> {
        config.validate()?;

        info!("Testing connection to {}", config.host);
        let probe = transport.run_remote(&config.host, &["whoami".to_string()]);
        let remote_username = match probe {
            Ok(output) => output.stdout.trim().to_string(),
            Err(source) => {
                warn!(
                    "SSH connection to {} failed, set up either passwordless SSH or ControlMaster and log in from a terminal",
                    config.host
                );
                return Err(Error::Connectivity { host: config.host.clone(), source });
            }
        };
        info!("Connected to {} as {}", config.host, remote_username);

        let remote_filesystem_path = render_remote_path(&config.remote_filesystem_path, &remote_username)?;

        Ok(Cluster { config, transport, remote_username, remote_filesystem_path, local_mount_point })
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn remote_username(&self) -> &str {
        &self.remote_username
    }

    /// Remote filesystem path with the username filled in
    pub fn remote_filesystem_path(&self) -> &str {
        &self.remote_filesystem_path
    }

    pub fn local_mount_point(&self) -> &Path {
        &self.local_mount_point
    }

    pub fn connection_state(&self) -> Result<ConnectionState> {
        Ok(ConnectionState {
            remote_username: self.remote_username.clone(),
            mounted: self.is_mounted()?,
        })
    }

    /// Remote staging directory of a job, the same name as the local one
    pub fn remote_job_folder(&self, job_name: &str) -> String {
        format!("{}/nbsubmit/{}", self.remote_filesystem_path.trim_end_matches('/'), job_name)
    }

    /// Run a command on the login node
    pub fn ssh_command(&self, argv: &[String]) -> Result<CommandOutput> {
        Ok(self.transport.run_remote(&self.config.host, argv)?)
    }

    /// Copy local files into the remote job folder, creating it first
    pub fn put(&self, files: &[String], job_name: &str) -> Result<()> {
        let remote_job_folder = self.remote_job_folder(job_name);
        self.ssh_command(&["mkdir".to_string(), "-p".to_string(), remote_job_folder.clone()])?;
        // scp addresses are not quoted, remote paths with spaces only work for mkdir
        let destination = format!("{}:{}", self.config.host, remote_job_folder);
        info!("Copying {} file(s) to {}", files.len(), destination);
        self.transport.copy(files, &destination)?;
        Ok(())
    }

    /// Copy files matching `pattern` from the remote job folder into `local_folder`
    pub fn get(&self, pattern: &str, job_name: &str, local_folder: &Path) -> Result<()> {
        let source = format!("{}:{}/{}", self.config.host, self.remote_job_folder(job_name), pattern);
        let destination = path_arg(local_folder)?;
        info!("Copying {} to {}", source, destination);
        self.transport.copy(&[source], &destination)?;
        Ok(())
    }
}

fn render_remote_path(template: &str, username: &str) -> Result<String> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("remote_path", template)?;
    let context = RemotePathContext { username: username.to_string() };
    Ok(tt.render("remote_path", &context)?)
}

/// Paths are handed to scp as UTF-8 arguments
pub(crate) fn path_arg(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| Error::configuration(format!("path {} is not valid UTF-8", path.display())))
}
