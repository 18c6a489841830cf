use std::fs;

use log::info;

use crate::cluster::{path_arg, Cluster};
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Filesystem type sshfs mounts show up as in the mount table
const SSHFS_TYPE: &str = "fuse.sshfs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted,
    AlreadyMounted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmountOutcome {
    Unmounted,
    NotMounted,
}

/// Mounting the remote filesystem lets results be read in place instead of copied back.
/// Nothing here unmounts automatically.
impl<T: Transport> Cluster<T> {
    /// Ask the live mount table whether the local mount point is an sshfs mount
    pub fn is_mounted(&self) -> Result<bool> {
        let argv = ["mount", "-l", "-t", SSHFS_TYPE].map(String::from);
        let table = self.transport.run(&argv)?;
        let mount_point = path_arg(&self.local_mount_point)?;
        Ok(table.stdout.contains(&mount_point))
    }

    pub fn mount(&self) -> Result<MountOutcome> {
        if self.is_mounted()? {
            info!("Remote filesystem already mounted to {}", self.local_mount_point.display());
            return Ok(MountOutcome::AlreadyMounted);
        }

        fs::create_dir_all(&self.local_mount_point).map_err(|err| {
            Error::io(format!("can't create mount point {}", self.local_mount_point.display()), err)
        })?;

        let remote = format!("{}:{}", self.config.host, self.remote_filesystem_path);
        let argv = vec![
            "sshfs".to_string(),
            "-o".to_string(),
            "reconnect".to_string(),
            remote.clone(),
            path_arg(&self.local_mount_point)?,
        ];
        self.transport.run(&argv)?;
        info!("Mounted {} to {}", remote, self.local_mount_point.display());
        Ok(MountOutcome::Mounted)
    }

    pub fn unmount(&self) -> Result<UnmountOutcome> {
        if !self.is_mounted()? {
            return Ok(UnmountOutcome::NotMounted);
        }
        let argv = vec!["fusermount".to_string(), "-u".to_string(), path_arg(&self.local_mount_point)?];
        self.transport.run(&argv)?;
        info!("Unmounted {}", self.local_mount_point.display());
        Ok(UnmountOutcome::Unmounted)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::cluster::tests::comet;
    use crate::transport::RecordingTransport;

    fn connected(transport: &RecordingTransport, mount_point: PathBuf) -> Cluster<&RecordingTransport> {
        transport.push_stdout("alice");
        let cluster = Cluster::connect_with_mount_point(comet(), transport, mount_point).unwrap();
        transport.clear();
        cluster
    }

    #[test]
    fn is_mounted_looks_for_mount_point_in_table() {
        let transport = RecordingTransport::new();
        let cluster = connected(&transport, PathBuf::from("/home/alice/comet"));

        transport.push_stdout(
            "comet.sdsc.edu:/oasis/scratch/comet/alice/temp_project on /home/alice/comet type fuse.sshfs (rw)\n",
        );
        assert!(cluster.is_mounted().unwrap());

        transport.push_stdout("");
        assert!(!cluster.is_mounted().unwrap());

        assert_eq!(transport.commands()[0], vec!["mount", "-l", "-t", "fuse.sshfs"]);
    }

    #[test]
    fn mount_is_a_no_op_when_already_mounted() {
        let transport = RecordingTransport::new();
        let cluster = connected(&transport, PathBuf::from("/home/alice/comet"));
        transport.push_stdout("x on /home/alice/comet type fuse.sshfs");

        assert_eq!(cluster.mount().unwrap(), MountOutcome::AlreadyMounted);
        assert!(transport.commands_of("sshfs").is_empty());
    }

    #[test]
    fn mount_creates_directory_and_runs_sshfs() {
        let dir = tempfile::tempdir().unwrap();
        let mount_point = dir.path().join("comet");
        let transport = RecordingTransport::new();
        let cluster = connected(&transport, mount_point.clone());

        assert_eq!(cluster.mount().unwrap(), MountOutcome::Mounted);
        assert!(mount_point.is_dir());
        assert_eq!(
            transport.commands_of("sshfs"),
            vec![vec![
                "sshfs".to_string(),
                "-o".to_string(),
                "reconnect".to_string(),
                "comet.sdsc.edu:/oasis/scratch/comet/alice/temp_project".to_string(),
                mount_point.to_str().unwrap().to_string(),
            ]]
        );
    }

    #[test]
    fn unmount_skips_fusermount_when_not_mounted() {
        let transport = RecordingTransport::new();
        let cluster = connected(&transport, PathBuf::from("/home/alice/comet"));
        assert_eq!(cluster.unmount().unwrap(), UnmountOutcome::NotMounted);
        assert!(transport.commands_of("fusermount").is_empty());
    }

    #[test]
    fn unmount_runs_fusermount_when_mounted() {
        let transport = RecordingTransport::new();
        let cluster = connected(&transport, PathBuf::from("/home/alice/comet"));
        transport.push_stdout("x on /home/alice/comet type fuse.sshfs");
        assert_eq!(cluster.unmount().unwrap(), UnmountOutcome::Unmounted);
        assert_eq!(
            transport.commands_of("fusermount"),
            vec![vec!["fusermount", "-u", "/home/alice/comet"]]
        );
    }
}
