//! Batch scheduler vocabulary: submission scripts and submit/monitor/cancel commands

use serde::{Deserialize, Serialize};

use crate::cluster::ClusterConfig;
use crate::error::{Error, Result};
use crate::job::{environment, Job};

/// Render Slurm job scripts and build sbatch/sacct/scancel commands
pub mod slurm;

pub use slurm::Slurm;

/// Schedulers a cluster can be configured with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    #[default]
    Slurm,
}

impl SchedulerKind {
    pub fn scheduler(self) -> Box<dyn Scheduler> {
        match self {
            SchedulerKind::Slurm => Box::new(Slurm::new()),
        }
    }
}

/// Everything a submission script template can refer to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptContext {
    pub job_name: String,
    pub notebook_filename: String,
    pub cores: u32,
    pub minutes: u64,
    pub queue: String,
    /// Rendered `export` lines
    pub environment: String,
    pub container_image: String,
    pub bind: String,
}

impl ScriptContext {
    pub fn new(cluster: &ClusterConfig, job: &Job) -> Result<Self> {
        Ok(ScriptContext {
            job_name: job.name.clone(),
            notebook_filename: job.notebook_filename()?,
            cores: job.cores,
            minutes: job.minutes(),
            queue: cluster.queue_for(job.cores).to_string(),
            environment: environment::render(&job.environment)?,
            container_image: job
                .container_image
                .clone()
                .unwrap_or_else(|| cluster.container_image.clone()),
            bind: cluster.bind.clone(),
        })
    }
}

/// Command vocabulary and script format of one batch scheduler
///
/// Commands are argument vectors that run on the cluster's login node.
pub trait Scheduler {
    fn name(&self) -> &str;

    /// File name of the rendered script inside the job folder
    fn script_name(&self) -> &str {
        "job.cmd"
    }

    fn render_script(&self, context: &ScriptContext) -> Result<String>;

    /// Submit `script` with `job_folder` as the working directory
    fn submit_command(&self, job_folder: &str, script: &str) -> Vec<String>;

    fn monitor_command(&self, job_id: &str) -> Vec<String>;

    fn cancel_command(&self, job_id: &str) -> Vec<String>;

    /// The job id is the last whitespace separated word of the submit output
    fn parse_job_id(&self, stdout: &str) -> Result<String> {
        stdout
            .split_whitespace()
            .last()
            .map(str::to_string)
            .ok_or_else(|| Error::UnexpectedOutput(stdout.to_string()))
    }

    /// Status is the first line of the monitor output, not interpreted any further
    fn parse_status(&self, stdout: &str) -> String {
        stdout
            .trim()
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::tests::comet;

    #[test]
    fn context_uses_cluster_defaults() {
        let job = Job::new("demo", "work/nb.ipynb").cores(4).env("A", "1");
        let context = ScriptContext::new(&comet(), &job).unwrap();
        assert_eq!(context.notebook_filename, "nb.ipynb");
        assert_eq!(context.queue, "shared");
        assert_eq!(context.minutes, 61);
        assert_eq!(context.environment, "export A=1");
        assert_eq!(context.container_image, "/oasis/images/anaconda.img");
        assert_eq!(context.bind, "/oasis");
    }

    #[test]
    fn job_image_overrides_cluster_image() {
        let job = Job::new("demo", "nb.ipynb").cores(24).container_image("/custom.img");
        let context = ScriptContext::new(&comet(), &job).unwrap();
        assert_eq!(context.container_image, "/custom.img");
        assert_eq!(context.queue, "compute");
    }

    #[test]
    fn job_id_is_last_word() {
        let slurm = Slurm::new();
        assert_eq!(slurm.parse_job_id("Submitted batch job 12345\n").unwrap(), "12345");
        assert!(matches!(slurm.parse_job_id("  \n"), Err(Error::UnexpectedOutput(_))));
    }

    #[test]
    fn status_is_first_line() {
        let slurm = Slurm::new();
        assert_eq!(slurm.parse_status("   PENDING \n PENDING\n"), "PENDING");
        assert_eq!(slurm.parse_status(""), "");
    }
}
