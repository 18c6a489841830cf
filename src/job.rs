//! Notebook jobs and their local bookkeeping

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Render environment variables as shell export statements
pub mod environment;

/// LAST_JOB_ID marker files
pub mod marker;

/// Longest wall time a job may request, in minutes
pub const MAX_MINUTES: u64 = u32::MAX as u64;

/// A notebook to execute on a cluster
///
/// The job name is also the name of the staging folder, locally and on the cluster, so it has to
/// be usable as a single path component.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub name: String,
    pub notebook: PathBuf,
    pub environment: BTreeMap<String, String>,
    pub cores: u32,
    pub hours: f64,
    /// Overrides the cluster's container image
    pub container_image: Option<String>,
    pub additional_files: Vec<PathBuf>,
}

impl Job {
    /// One core for one hour
    pub fn new(name: impl Into<String>, notebook: impl Into<PathBuf>) -> Self {
        Job {
            name: name.into(),
            notebook: notebook.into(),
            environment: BTreeMap::new(),
            cores: 1,
            hours: 1.0,
            container_image: None,
            additional_files: Vec::new(),
        }
    }

    pub fn cores(mut self, cores: u32) -> Self {
        self.cores = cores;
        self
    }

    pub fn hours(mut self, hours: f64) -> Self {
        self.hours = hours;
        self
    }

    /// Values containing anything but shell-safe characters are single-quoted in the script,
    /// so `$PATH:/x` is exported literally and not expanded on the cluster.
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(name.into(), value.into());
        self
    }

    pub fn container_image(mut self, image: impl Into<String>) -> Self {
        self.container_image = Some(image.into());
        self
    }

    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.additional_files.push(path.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if self.cores == 0 {
            return Err(Error::configuration(format!("job {} requests zero cores", self.name)));
        }
        if !self.hours.is_finite() || self.hours < 0.0 || self.hours * 60.0 >= MAX_MINUTES as f64 {
            return Err(Error::configuration(format!(
                "job {} requests an invalid wall time of {} hours",
                self.name, self.hours
            )));
        }
        self.notebook_filename()?;
        Ok(())
    }

    /// Wall-clock limit in whole minutes, always at least one minute more than requested
    pub fn minutes(&self) -> u64 {
        ((self.hours * 60.0).floor() as u64).saturating_add(1)
    }

    /// File name of the notebook, which is all the cluster sees of its path
    pub fn notebook_filename(&self) -> Result<String> {
        self.notebook
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::configuration(format!("notebook path {} has no file name", self.notebook.display()))
            })
    }
}

/// Job names become folder names: no whitespace, no separators, not `.` or `..`
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.chars().any(|c| c.is_whitespace() || c == '/' || c == '\\');
    if valid {
        Ok(())
    } else {
        Err(Error::configuration(format!("{name:?} is not a valid job name")))
    }
}

/// Local staging folder of a job under the base directory
pub fn local_job_folder(base: &Path, name: &str) -> PathBuf {
    base.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_one_core_one_hour() {
        let job = Job::new("demo", "nb.ipynb");
        assert_eq!(job.cores, 1);
        assert_eq!(job.hours, 1.0);
        assert!(job.environment.is_empty());
    }

    #[test]
    fn minutes_round_up_past_requested_hours() {
        assert_eq!(Job::new("a", "nb.ipynb").hours(1.0).minutes(), 61);
        assert_eq!(Job::new("a", "nb.ipynb").hours(0.5).minutes(), 31);
        assert_eq!(Job::new("a", "nb.ipynb").hours(0.0).minutes(), 1);
        assert_eq!(Job::new("a", "nb.ipynb").hours(2.01).minutes(), 121);
    }

    #[test]
    fn notebook_filename_drops_directories() {
        let job = Job::new("demo", "analysis/notebooks/nb.ipynb");
        assert_eq!(job.notebook_filename().unwrap(), "nb.ipynb");
    }

    #[test]
    fn invalid_jobs_are_rejected() {
        assert!(Job::new("two words", "nb.ipynb").validate().is_err());
        assert!(Job::new("a/b", "nb.ipynb").validate().is_err());
        assert!(Job::new("..", "nb.ipynb").validate().is_err());
        assert!(Job::new("demo", "nb.ipynb").cores(0).validate().is_err());
        assert!(Job::new("demo", "nb.ipynb").hours(-1.0).validate().is_err());
        assert!(Job::new("demo", "/").validate().is_err());
        assert!(Job::new("demo", "nb.ipynb").validate().is_ok());
    }

    #[test]
    fn huge_wall_times_are_rejected() {
        let job = Job::new("demo", "nb.ipynb").hours(1e300);
        assert!(matches!(job.validate(), Err(Error::Configuration(_))));
        assert_eq!(job.minutes(), u64::MAX);

        let longest = Job::new("demo", "nb.ipynb").hours((MAX_MINUTES - 1) as f64 / 60.0);
        assert!(longest.validate().is_ok());
        assert!(Job::new("demo", "nb.ipynb").hours(MAX_MINUTES as f64 / 60.0).validate().is_err());
    }
}
