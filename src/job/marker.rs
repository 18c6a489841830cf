use std::fs;
use std::io;
use std::path::Path;

use log::info;

use crate::error::{Error, Result};

/// Name of the file holding the id of the last submission of a job
pub const MARKER_FILE: &str = "LAST_JOB_ID";

/// Overwrite the marker in `job_folder`, older ids are not kept
pub fn write_job_id(job_folder: &Path, job_id: &str) -> Result<()> {
    let path = job_folder.join(MARKER_FILE);
    info!("Recording job id {} in {}", job_id, path.display());
    fs::write(&path, job_id).map_err(|err| Error::io(format!("can't write {}", path.display()), err))
}

pub fn read_job_id(job_folder: &Path, job_name: &str) -> Result<String> {
    let path = job_folder.join(MARKER_FILE);
    match fs::read_to_string(&path) {
        Ok(contents) => Ok(contents.trim().to_string()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(Error::JobNotFound { job: job_name.to_string(), path })
        }
        Err(err) => Err(Error::io(format!("can't read {}", path.display()), err)),
    }
}
