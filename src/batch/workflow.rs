//! # Slurm 作业工作流
//!
//! 作业描述 + 两步操作：
//! - `create()`: 创建作业目录、复制输入文件、写出 `submit.sbatch`
//! - `submit()`: 在作业目录中调用 `sbatch`
//!
//! 必须先 `create()` 再 `submit()`；两者之间由调用方修补输入文件。
//!
//! ## 依赖关系
//! - 被 `commands/submit.rs` 调用
//! - 使用 `utils/slurm.rs`, `utils/environment.rs`, `utils/progress.rs`

use crate::batch::InputFile;
use crate::cli::PartitionOptions;
use crate::error::{XcsubError, Result};
use crate::models::{ResourceLayout, Runner};
use crate::utils::environment::{find_in_search_path, EnvironmentOverrides, HostEnv};
use crate::utils::progress;
use crate::utils::slurm::{generate_sbatch_script, SlurmConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

pub const SCRIPT_NAME: &str = "submit.sbatch";
const LOG_DIR: &str = "slurm_logs";

/// 作业描述
#[derive(Debug, Clone)]
pub struct JobDescription {
    pub runner: Runner,
    pub directory: PathBuf,
    pub name: String,
    /// 模拟程序的绝对路径
    pub app: PathBuf,
    pub layout: ResourceLayout,
    pub charge: String,
    pub walltime: String,
    pub partition: Option<PartitionOptions>,
    pub environment: EnvironmentOverrides,
    pub inputs: Vec<InputFile>,
}

/// Slurm 工作流
#[derive(Debug)]
pub struct SlurmWorkflow {
    job: JobDescription,
    created: bool,
}

impl SlurmWorkflow {
    pub fn new(job: JobDescription) -> Self {
        Self {
            job,
            created: false,
        }
    }

    pub fn job(&self) -> &JobDescription {
        &self.job
    }

    pub fn directory(&self) -> &Path {
        &self.job.directory
    }

    pub fn script_path(&self) -> PathBuf {
        self.job.directory.join(SCRIPT_NAME)
    }

    /// 创建作业目录
    ///
    /// 已存在且非空的目录会被拒绝，不覆盖之前的运行。
    pub fn create(&mut self) -> Result<()> {
        let dir = self.job.directory.clone();
        let dir_str = dir.display().to_string();

        if dir.is_dir() {
            let mut entries = fs::read_dir(&dir).map_err(|e| XcsubError::FileReadError {
                path: dir_str.clone(),
                source: e,
            })?;
            if entries.next().is_some() {
                return Err(XcsubError::DirectoryNotEmpty { path: dir_str });
            }
        }

        fs::create_dir_all(dir.join(LOG_DIR)).map_err(|e| XcsubError::FileWriteError {
            path: dir_str.clone(),
            source: e,
        })?;

        let pb = progress::create_progress_bar(self.job.inputs.len() as u64, "Copying inputs");
        for input in &self.job.inputs {
            copy_input(&input.source, &dir.join(&input.target))?;
            pb.inc(1);
        }
        pb.finish_and_clear();

        let partition = self.job.partition.as_ref();
        let config = SlurmConfig {
            job_name: &self.job.name,
            account: &self.job.charge,
            time_limit: &self.job.walltime,
            layout: self.job.layout,
            qos: partition.map(|p| p.qos.as_str()),
            constraint: partition.map(|p| p.constraint.as_str()),
            environment: &self.job.environment,
        };
        let script = generate_sbatch_script(&config, &dir, &self.job.app);
        let script_path = self.script_path();
        fs::write(&script_path, script).map_err(|e| XcsubError::FileWriteError {
            path: script_path.display().to_string(),
            source: e,
        })?;

        self.created = true;
        Ok(())
    }

    /// 提交作业，返回 sbatch 的输出（如 "Submitted batch job 123"）
    pub fn submit(&self, host: &HostEnv) -> Result<String> {
        if !self.created {
            return Err(XcsubError::NotCreated {
                path: self.job.directory.display().to_string(),
            });
        }

        let sbatch = self
            .job
            .environment
            .effective_search_path(host)
            .and_then(|path| find_in_search_path("sbatch", path))
            .ok_or_else(|| XcsubError::CommandNotFound {
                command: "sbatch".to_string(),
            })?;

        let mut command = Command::new(&sbatch);
        command.arg(SCRIPT_NAME).current_dir(&self.job.directory);
        self.job.environment.apply(&mut command);

        let out = command.output().map_err(|e| XcsubError::CommandFailed {
            command: sbatch.display().to_string(),
            stderr: e.to_string(),
        })?;

        if !out.status.success() {
            return Err(XcsubError::CommandFailed {
                command: format!("sbatch {}", SCRIPT_NAME),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
    }
}

/// 复制单个输入；目录整体递归复制
fn copy_input(source: &Path, dest: &Path) -> Result<()> {
    let write_err = |path: &Path, e: std::io::Error| XcsubError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    };

    if !source.is_dir() {
        fs::copy(source, dest).map_err(|e| write_err(dest, e))?;
        return Ok(());
    }

    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry.map_err(|e| XcsubError::FileReadError {
            path: source.display().to_string(),
            source: e.into(),
        })?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| write_err(target.as_path(), e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| write_err(target.as_path(), e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(dir: &Path, inputs: Vec<InputFile>) -> JobDescription {
        JobDescription {
            runner: Runner::Slurm,
            directory: dir.to_path_buf(),
            name: "Simulation".to_string(),
            app: PathBuf::from("/opt/bin/xcompact3d"),
            layout: ResourceLayout::new(4, 1),
            charge: "ABC123".to_string(),
            walltime: "00:15:00".to_string(),
            partition: None,
            environment: EnvironmentOverrides::default(),
            inputs,
        }
    }

    #[test]
    fn test_create_materializes_directory() {
        let src = tempfile::tempdir().unwrap();
        let example = src.path().join("case.i3d");
        fs::write(&example, "&InOutParam\n/End\n").unwrap();

        let out = tempfile::tempdir().unwrap();
        let run_dir = out.path().join("run1");
        let mut workflow = SlurmWorkflow::new(job(
            &run_dir,
            vec![
                InputFile::new(example.clone()),
                InputFile::renamed(example, "input.i3d"),
            ],
        ));
        workflow.create().unwrap();

        assert!(run_dir.join("case.i3d").is_file());
        assert!(run_dir.join("input.i3d").is_file());
        assert!(run_dir.join(LOG_DIR).is_dir());
        let script = fs::read_to_string(workflow.script_path()).unwrap();
        assert!(script.contains("#SBATCH --account=ABC123"));
        assert!(script.contains("srun -N 1 -n 4 --ntasks-per-node=4 /opt/bin/xcompact3d"));
    }

    #[test]
    fn test_create_copies_input_directories() {
        let src = tempfile::tempdir().unwrap();
        let example = src.path().join("case.i3d");
        fs::write(&example, "&InOutParam\n/End\n").unwrap();
        let data = src.path().join("data");
        fs::create_dir_all(data.join("mesh")).unwrap();
        fs::write(data.join("inflow.dat"), "1 2 3\n").unwrap();
        fs::write(data.join("mesh").join("yp.dat"), "0.0\n").unwrap();

        let out = tempfile::tempdir().unwrap();
        let run_dir = out.path().join("run1");
        let mut workflow = SlurmWorkflow::new(job(
            &run_dir,
            vec![InputFile::new(data), InputFile::renamed(example, "input.i3d")],
        ));
        workflow.create().unwrap();

        assert_eq!(
            fs::read_to_string(run_dir.join("data").join("inflow.dat")).unwrap(),
            "1 2 3\n"
        );
        assert!(run_dir.join("data").join("mesh").join("yp.dat").is_file());
        assert!(run_dir.join("input.i3d").is_file());
    }

    #[test]
    fn test_create_refuses_non_empty_directory() {
        let out = tempfile::tempdir().unwrap();
        fs::write(out.path().join("old.txt"), "previous run").unwrap();

        let mut workflow = SlurmWorkflow::new(job(out.path(), vec![]));
        let err = workflow.create().unwrap_err();
        assert!(matches!(err, XcsubError::DirectoryNotEmpty { .. }));
    }

    #[test]
    fn test_submit_before_create() {
        let out = tempfile::tempdir().unwrap();
        let workflow = SlurmWorkflow::new(job(&out.path().join("run"), vec![]));
        let err = workflow.submit(&HostEnv::default()).unwrap_err();
        assert!(matches!(err, XcsubError::NotCreated { .. }));
    }

    #[test]
    fn test_submit_without_sbatch() {
        let out = tempfile::tempdir().unwrap();
        let empty_bin = tempfile::tempdir().unwrap();
        let mut workflow = SlurmWorkflow::new(job(&out.path().join("run"), vec![]));
        workflow.create().unwrap();

        let host = HostEnv::from_pairs([("PATH", empty_bin.path().to_str().unwrap())]);
        let err = workflow.submit(&host).unwrap_err();
        assert!(matches!(err, XcsubError::CommandNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_submit_runs_sbatch() {
        use std::os::unix::fs::PermissionsExt;

        let bin = tempfile::tempdir().unwrap();
        let sbatch = bin.path().join("sbatch");
        fs::write(&sbatch, "#!/bin/sh\necho \"Submitted batch job 42 ($1)\"\n").unwrap();
        fs::set_permissions(&sbatch, fs::Permissions::from_mode(0o755)).unwrap();

        let out = tempfile::tempdir().unwrap();
        let mut workflow = SlurmWorkflow::new(job(&out.path().join("run"), vec![]));
        workflow.create().unwrap();

        let host = HostEnv::from_pairs([("PATH", bin.path().to_str().unwrap())]);
        let reply = workflow.submit(&host).unwrap();
        assert_eq!(reply, "Submitted batch job 42 (submit.sbatch)");
    }
}
