use tinytemplate::TinyTemplate;

use crate::error::Result;
use crate::scheduler::{ScriptContext, Scheduler};

/// Slurm job script: SBATCH header, then nbconvert inside a singularity container
///
/// Output files land in the job folder as `executed_<slurm job id>_<notebook>`.
static TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/slurm.txt"));

#[derive(Debug, Clone, Copy, Default)]
pub struct Slurm;

impl Slurm {
    pub fn new() -> Self {
        Slurm
    }
}

impl Scheduler for Slurm {
    fn name(&self) -> &str {
        "slurm"
    }

    fn render_script(&self, context: &ScriptContext) -> Result<String> {
        let mut tt = TinyTemplate::new();
        // scripts are shell, not HTML
        tt.set_default_formatter(&tinytemplate::format_unescaped);
        tt.add_template("slurm", TEMPLATE)?;
        Ok(tt.render("slurm", context)?)
    }

    fn submit_command(&self, job_folder: &str, script: &str) -> Vec<String> {
        vec![
            "sbatch".to_string(),
            format!("--chdir={job_folder}"),
            format!("{job_folder}/{script}"),
        ]
    }

    fn monitor_command(&self, job_id: &str) -> Vec<String> {
        ["sacct", "--noheader", "--format", "State", "--jobs", job_id]
            .map(String::from)
            .to_vec()
    }

    fn cancel_command(&self, job_id: &str) -> Vec<String> {
        vec!["scancel".to_string(), job_id.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(cores: u32, queue: &str, environment: &str) -> ScriptContext {
        ScriptContext {
            job_name: "demo".to_string(),
            notebook_filename: "nb.ipynb".to_string(),
            cores,
            minutes: 61,
            queue: queue.to_string(),
            environment: environment.to_string(),
            container_image: "/oasis/images/anaconda.img".to_string(),
            bind: "/oasis".to_string(),
        }
    }

    #[test]
    fn renders_complete_script() {
        let script = Slurm::new().render_script(&context(2, "shared", "export A=1\nexport B=2")).unwrap();
        let expected = r##"#!/bin/bash
#SBATCH --job-name="nbsubmit-demo"
#SBATCH --output="demo.%j.out"
#SBATCH --partition=shared
#SBATCH --nodes=1
#SBATCH --ntasks-per-node=2
#SBATCH --export=ALL
#SBATCH --time=00:61:00

module load singularity

NOTEBOOK_FILENAME="nb.ipynb"
OUTPUT_FILENAME=executed_$SLURM_JOB_ID
OUTPUT_FILENAME+=_$NOTEBOOK_FILENAME

export A=1
export B=2

SINGULARITY_IMAGE="/oasis/images/anaconda.img"
COMMAND="/opt/conda/bin/jupyter nbconvert --execute --to notebook --output $OUTPUT_FILENAME $NOTEBOOK_FILENAME"
export SINGULARITY_BINDPATH="/oasis"

singularity exec $SINGULARITY_IMAGE $COMMAND
"##;
        assert_eq!(script, expected);
    }

    #[test]
    fn quoted_values_are_not_html_escaped() {
        let script = Slurm::new().render_script(&context(24, "compute", "export MSG='a & b'")).unwrap();
        assert!(script.contains("export MSG='a & b'\n"));
        assert!(script.contains("#SBATCH --partition=compute\n"));
    }

    #[test]
    fn commands_use_argument_vectors() {
        let slurm = Slurm::new();
        assert_eq!(
            slurm.submit_command("/scratch/nbsubmit/demo", "job.cmd"),
            vec!["sbatch", "--chdir=/scratch/nbsubmit/demo", "/scratch/nbsubmit/demo/job.cmd"]
        );
        assert_eq!(
            slurm.monitor_command("12345"),
            vec!["sacct", "--noheader", "--format", "State", "--jobs", "12345"]
        );
        assert_eq!(slurm.cancel_command("12345"), vec!["scancel", "12345"]);
    }
}
