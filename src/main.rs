use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use nbsubmit::cluster::mount::{MountOutcome, UnmountOutcome};
use nbsubmit::manager::DEFAULT_LOCAL_BASE;
use nbsubmit::{Cluster, ClusterConfig, ClusterRegistry, Job, ProcessTransport, RemoteJobManager, Retrieval};

/// Run Jupyter notebooks on HPC clusters
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Name of the cluster in the registry
    #[arg(short, long, default_value = "comet")]
    cluster: String,

    /// JSON cluster registry to use instead of the built-in one
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Local directory holding one folder per job
    #[arg(short, long, default_value = DEFAULT_LOCAL_BASE)]
    workdir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stage a notebook and submit it
    Launch {
        /// Job name, also the name of the local and remote job folders
        #[arg(short, long)]
        name: String,
        notebook: PathBuf,
        #[arg(long, default_value_t = 1)]
        cores: u32,
        /// Wall-clock hours, fractions allowed
        #[arg(long, default_value_t = 1.0)]
        hours: f64,
        /// Container image overriding the cluster default
        #[arg(long)]
        image: Option<String>,
        /// Environment variable exported in the job script, as KEY=VALUE
        #[arg(short, long = "env", value_parser = parse_env)]
        env: Vec<(String, String)>,
        /// Extra file copied next to the notebook
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,
    },
    /// Print the scheduler status of the last submission of a job
    Check { name: String },
    /// Cancel the last submission of a job
    Cancel { name: String },
    /// Copy results of a job back, unless the remote filesystem is mounted
    Retrieve { name: String },
    /// Mount the remote filesystem with sshfs
    Mount,
    /// Unmount the remote filesystem
    Unmount,
    /// Print the RAM available for every core count
    Resources,
}

fn parse_env(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))
}

fn main() -> Result<()> {
    env_logger::init();
    info!("nbsubmit {}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let registry = match &args.registry {
        Some(path) => ClusterRegistry::from_path(path),
        None => ClusterRegistry::builtin(),
    }
    .context("loading cluster registry")?;
    let config = registry.get(&args.cluster)?.clone();

    match args.command {
        Command::Resources => print_resources(&config),
        command => {
            let transport = ProcessTransport::new().context("starting process runtime")?;
            let cluster = Cluster::connect(config, transport)
                .with_context(|| format!("connecting to cluster {}", args.cluster))?;
            let manager = RemoteJobManager::for_cluster(cluster, &args.workdir);
            run(&manager, command)?;
        }
    }

    Ok(())
}

fn run(manager: &RemoteJobManager<ProcessTransport>, command: Command) -> Result<()> {
    let cluster = manager.cluster();
    match command {
        Command::Launch { name, notebook, cores, hours, image, env, files } => {
            let mut job = Job::new(name, notebook).cores(cores).hours(hours);
            job.container_image = image;
            job.environment.extend(env);
            job.additional_files = files;
            let job_id = manager
                .launch_job(&job)
                .with_context(|| format!("launching job {}", job.name))?;
            println!("Submitted job {} to {} as {}", job.name, cluster.name(), job_id);
        }
        Command::Check { name } => {
            let status = manager.check_job(&name).with_context(|| format!("checking job {name}"))?;
            println!("{status}");
        }
        Command::Cancel { name } => {
            let status = manager.cancel_job(&name).with_context(|| format!("cancelling job {name}"))?;
            println!("{status}");
        }
        Command::Retrieve { name } => {
            let retrieval = manager.retrieve_results(&name).with_context(|| format!("retrieving job {name}"))?;
            match retrieval {
                Retrieval::Mounted(_) => {
                    println!("No need to retrieve results, files are in {}", retrieval.path().display())
                }
                Retrieval::Copied(_) => println!("Results copied to {}", retrieval.path().display()),
            }
        }
        Command::Mount => match cluster.mount().context("mounting remote filesystem")? {
            MountOutcome::Mounted => println!("Mounted to {}", cluster.local_mount_point().display()),
            MountOutcome::AlreadyMounted => println!(
                "Remote filesystem already mounted to {}",
                cluster.local_mount_point().display()
            ),
        },
        Command::Unmount => match cluster.unmount().context("unmounting remote filesystem")? {
            UnmountOutcome::Unmounted => println!("Unmounted {}", cluster.local_mount_point().display()),
            UnmountOutcome::NotMounted => println!("Remote filesystem is not mounted"),
        },
        Command::Resources => print_resources(cluster.config()),
    }
    Ok(())
}

fn print_resources(config: &ClusterConfig) {
    for allocation in config.available_resources() {
        println!("{allocation}");
    }
}
