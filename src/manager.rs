//! Job lifecycle on one cluster: stage, submit, check, cancel, retrieve

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::cluster::{path_arg, Cluster};
use crate::error::{Error, Result};
use crate::job::{self, marker, Job};
use crate::scheduler::{ScriptContext, Scheduler};
use crate::transport::Transport;

/// Default local directory holding one staging folder per job
pub const DEFAULT_LOCAL_BASE: &str = "nbsubmit";

/// Where the results of a job can be found after [`RemoteJobManager::retrieve_results`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieval {
    /// Remote filesystem is mounted, results are already visible at this path
    Mounted(PathBuf),
    /// Results were copied into this local job folder
    Copied(PathBuf),
}

impl Retrieval {
    pub fn path(&self) -> &Path {
        match self {
            Retrieval::Mounted(path) | Retrieval::Copied(path) => path,
        }
    }
}

/// Submits notebook jobs to a cluster and keeps track of the last submission of each job name
///
/// All calls block until the underlying commands finish. Nothing protects two processes
/// launching the same job name at once.
pub struct RemoteJobManager<T: Transport> {
    cluster: Cluster<T>,
    scheduler: Box<dyn Scheduler>,
    local_base: PathBuf,
}

impl<T: Transport> RemoteJobManager<T> {
    pub fn new(cluster: Cluster<T>, scheduler: Box<dyn Scheduler>, local_base: impl Into<PathBuf>) -> Self {
        RemoteJobManager { cluster, scheduler, local_base: local_base.into() }
    }

    /// Use the scheduler named in the cluster's configuration
    pub fn for_cluster(cluster: Cluster<T>, local_base: impl Into<PathBuf>) -> Self {
        let scheduler = cluster.config().scheduler.scheduler();
        Self::new(cluster, scheduler, local_base)
    }

    pub fn cluster(&self) -> &Cluster<T> {
        &self.cluster
    }

    pub fn local_job_folder(&self, job_name: &str) -> PathBuf {
        job::local_job_folder(&self.local_base, job_name)
    }

    /// Render, stage and submit a job, returning the scheduler's job id
    ///
    /// The id replaces whatever was recorded for this job name before.
    pub fn launch_job(&self, job: &Job) -> Result<String> {
        job.validate()?;

        let local_job_folder = self.local_job_folder(&job.name);
        fs::create_dir_all(&local_job_folder).map_err(|err| {
            Error::io(format!("can't create job folder {}", local_job_folder.display()), err)
        })?;

        let context = ScriptContext::new(self.cluster.config(), job)?;
        info!(
            "Rendering {} script for {} ({} cores, {} minutes, queue {})",
            self.scheduler.name(),
            job.name,
            context.cores,
            context.minutes,
            context.queue
        );
        let script = self.scheduler.render_script(&context)?;
        let script_path = local_job_folder.join(self.scheduler.script_name());
        fs::write(&script_path, script)
            .map_err(|err| Error::io(format!("can't write {}", script_path.display()), err))?;

        let mut files = vec![path_arg(&job.notebook)?, path_arg(&script_path)?];
        for file in &job.additional_files {
            files.push(path_arg(file)?);
        }
        self.cluster.put(&files, &job.name)?;

        let remote_job_folder = self.cluster.remote_job_folder(&job.name);
        let submit = self.scheduler.submit_command(&remote_job_folder, self.scheduler.script_name());
        let output = self.cluster.ssh_command(&submit)?;
        let job_id = self.scheduler.parse_job_id(&output.stdout)?;
        info!("Submitted job {} to {} with id {}", job.name, self.cluster.name(), job_id);

        marker::write_job_id(&local_job_folder, &job_id)?;
        Ok(job_id)
    }

    /// Id of the last submission of `job_name`
    pub fn job_id(&self, job_name: &str) -> Result<String> {
        job::validate_name(job_name)?;
        marker::read_job_id(&self.local_job_folder(job_name), job_name)
    }

    /// Scheduler status of the last submission, e.g. `PENDING` or `COMPLETED`
    pub fn check_job(&self, job_name: &str) -> Result<String> {
        let job_id = self.job_id(job_name)?;
        let output = self.cluster.ssh_command(&self.scheduler.monitor_command(&job_id))?;
        let status = self.scheduler.parse_status(&output.stdout);
        info!("Job {} ({}) is {:?}", job_name, job_id, status);
        Ok(status)
    }

    /// Cancel the last submission and return the status reported right after
    ///
    /// The scheduler may not have processed the cancellation yet, so the status can be stale.
    pub fn cancel_job(&self, job_name: &str) -> Result<String> {
        let job_id = self.job_id(job_name)?;
        self.cluster.ssh_command(&self.scheduler.cancel_command(&job_id))?;
        info!("Requested cancellation of job {} ({})", job_name, job_id);
        self.check_job(job_name)
    }

    /// Bring back everything in the remote job folder, unless it's already visible through a mount
    pub fn retrieve_results(&self, job_name: &str) -> Result<Retrieval> {
        job::validate_name(job_name)?;

        if self.cluster.is_mounted()? {
            let path = self.cluster.local_mount_point().join("nbsubmit").join(job_name);
            info!("No need to retrieve results, files are available in {}", path.display());
            return Ok(Retrieval::Mounted(path));
        }

        let local_job_folder = self.local_job_folder(job_name);
        if !local_job_folder.exists() {
            warn!("{} doesn't exist locally, creating it", local_job_folder.display());
        }
        fs::create_dir_all(&local_job_folder).map_err(|err| {
            Error::io(format!("can't create job folder {}", local_job_folder.display()), err)
        })?;
        self.cluster.get("*", job_name, &local_job_folder)?;
        Ok(Retrieval::Copied(local_job_folder))
    }
}
