//! Run Jupyter notebooks on HPC clusters
//!
//! A notebook is staged into a per-job folder, copied to the cluster with scp, wrapped in a
//! batch script that runs `jupyter nbconvert --execute` inside a container, and submitted to the
//! scheduler over ssh. The id of the last submission of every job name is kept in a
//! `LAST_JOB_ID` file so the job can be checked, cancelled and its results copied back later.

/// Cluster configuration, connection probe, registry and sshfs mounts
pub mod cluster;
pub mod error;
/// Job definition, environment rendering and the LAST_JOB_ID marker
pub mod job;
/// Stage, submit, check, cancel and retrieve jobs
pub mod manager;
/// Scheduler trait and the Slurm implementation
pub mod scheduler;
/// Process execution with timeouts over ssh and scp
pub mod transport;

pub use cluster::registry::ClusterRegistry;
pub use cluster::{Cluster, ClusterConfig, ConnectionState};
pub use error::{Error, Result};
pub use job::Job;
pub use manager::{RemoteJobManager, Retrieval};
pub use scheduler::{Scheduler, SchedulerKind, Slurm};
pub use transport::{CommandOutput, ProcessTransport, Transport, TransportError};
