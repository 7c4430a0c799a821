//! # 运行环境检测
//!
//! 识别当前所在的调度器 + 站点组合，并提供已知站点的软件安装信息。
//!
//! ## 检测顺序
//! 1. `XCSUB_RUNNER` 显式指定
//! 2. `NERSC_HOST=perlmutter` -> Perlmutter
//! 3. `LMOD_SYSTEM_NAME=andes` -> Andes
//! 4. `PATH` 中的调度器前端: `sbatch` -> Slurm, `bsub` -> LSF, `qsub` -> PBS
//! 5. 均未命中时回退到通用 Slurm
//!
//! ## 依赖关系
//! - 被 `cli/`, `utils/environment.rs`, `commands/submit.rs` 使用
//! - 使用 `which` 查找调度器命令

use crate::error::{XcsubError, Result};
use crate::utils::environment::HostEnv;

use std::fmt;
use std::path::PathBuf;

/// 显式指定运行环境的环境变量
pub const RUNNER_OVERRIDE_VAR: &str = "XCSUB_RUNNER";

/// 调度器家族
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduler {
    Slurm,
    Lsf,
    Pbs,
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheduler::Slurm => write!(f, "Slurm"),
            Scheduler::Lsf => write!(f, "LSF"),
            Scheduler::Pbs => write!(f, "PBS"),
        }
    }
}

/// 检测到的运行环境
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runner {
    /// Any Slurm machine without a site profile
    Slurm,
    /// OLCF Andes
    Andes,
    /// NERSC Perlmutter
    Perlmutter,
    Lsf,
    Pbs,
}

impl Runner {
    /// 所属调度器家族
    pub fn scheduler(&self) -> Scheduler {
        match self {
            Runner::Slurm | Runner::Andes | Runner::Perlmutter => Scheduler::Slurm,
            Runner::Lsf => Scheduler::Lsf,
            Runner::Pbs => Scheduler::Pbs,
        }
    }

    /// 已知站点的软件配置
    pub fn site_profile(&self) -> Option<&'static SiteProfile> {
        match self {
            Runner::Andes => Some(&ANDES),
            Runner::Perlmutter => Some(&PERLMUTTER),
            _ => None,
        }
    }

    /// 是否支持 QOS / constraint 选项
    pub fn has_partition_options(&self) -> bool {
        matches!(self, Runner::Perlmutter)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Runner::Slurm => "slurm",
            Runner::Andes => "andes",
            Runner::Perlmutter => "perlmutter",
            Runner::Lsf => "lsf",
            Runner::Pbs => "pbs",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "slurm" => Some(Runner::Slurm),
            "andes" => Some(Runner::Andes),
            "perlmutter" => Some(Runner::Perlmutter),
            "lsf" => Some(Runner::Lsf),
            "pbs" => Some(Runner::Pbs),
            _ => None,
        }
    }
}

impl fmt::Display for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 站点软件安装信息
#[derive(Debug, PartialEq, Eq)]
pub struct SiteProfile {
    /// Incompact3d install prefix
    pub simulation_install: &'static str,
    /// ADIOS2 install prefix
    pub io_library_install: &'static str,
    pub cores_per_node: u32,
}

impl SiteProfile {
    /// 可执行文件目录
    pub fn bin_dir(&self) -> PathBuf {
        PathBuf::from(self.simulation_install).join("bin")
    }

    /// I/O 库目录
    pub fn lib_dir(&self) -> PathBuf {
        PathBuf::from(self.io_library_install).join("lib64")
    }

    /// 默认算例: Taylor-Green 涡 DNS
    pub fn default_example(&self) -> PathBuf {
        PathBuf::from(self.simulation_install)
            .join("examples")
            .join("TGV-Taylor-Green-Vortex")
            .join("input_DNS_Re1600.i3d")
    }
}

static ANDES: SiteProfile = SiteProfile {
    simulation_install: "/ccs/home/esuchyta/software/install/andes/Incompact3d-gcc-9.3.0",
    io_library_install: "/ccs/home/esuchyta/software/install/andes/adios2-gcc-9.3.0",
    cores_per_node: 32,
};

static PERLMUTTER: SiteProfile = SiteProfile {
    simulation_install: "/global/homes/e/esuchyta/software/install/perlmutter/Incompact3d-gcc",
    io_library_install: "/global/homes/e/esuchyta/software/install/perlmutter/adios2-gcc",
    cores_per_node: 128,
};

/// 检测当前运行环境
pub fn detect(env: &HostEnv) -> Result<Runner> {
    if let Some(name) = env.get(RUNNER_OVERRIDE_VAR).filter(|v| !v.trim().is_empty()) {
        return Runner::from_name(name).ok_or_else(|| XcsubError::UnknownRunner(name.to_string()));
    }

    if env.get("NERSC_HOST").is_some_and(|v| v == "perlmutter") {
        return Ok(Runner::Perlmutter);
    }
    if env
        .get("LMOD_SYSTEM_NAME")
        .is_some_and(|v| v.eq_ignore_ascii_case("andes"))
    {
        return Ok(Runner::Andes);
    }

    let front_ends = [
        ("sbatch", Runner::Slurm),
        ("bsub", Runner::Lsf),
        ("qsub", Runner::Pbs),
    ];
    for (command, runner) in front_ends {
        if env.find_executable(command).is_some() {
            return Ok(runner);
        }
    }

    Ok(Runner::Slurm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_site_variables() {
        let env = HostEnv::from_pairs([("NERSC_HOST", "perlmutter"), ("PATH", "")]);
        assert_eq!(detect(&env).unwrap(), Runner::Perlmutter);

        let env = HostEnv::from_pairs([("LMOD_SYSTEM_NAME", "andes"), ("PATH", "")]);
        assert_eq!(detect(&env).unwrap(), Runner::Andes);

        // Other NERSC machines are plain Slurm
        let env = HostEnv::from_pairs([("NERSC_HOST", "cori"), ("PATH", "")]);
        assert_eq!(detect(&env).unwrap(), Runner::Slurm);
    }

    #[test]
    fn test_detect_override_wins() {
        let env = HostEnv::from_pairs([("XCSUB_RUNNER", "LSF"), ("NERSC_HOST", "perlmutter")]);
        assert_eq!(detect(&env).unwrap(), Runner::Lsf);

        let env = HostEnv::from_pairs([("XCSUB_RUNNER", "frontera")]);
        assert!(matches!(detect(&env), Err(XcsubError::UnknownRunner(_))));
    }

    #[test]
    fn test_detect_falls_back_to_slurm() {
        let empty = tempfile::tempdir().unwrap();
        let env = HostEnv::from_pairs([("PATH", empty.path().to_str().unwrap())]);
        assert_eq!(detect(&env).unwrap(), Runner::Slurm);
    }

    #[cfg(unix)]
    #[test]
    fn test_detect_by_scheduler_front_end() {
        use std::os::unix::fs::PermissionsExt;

        let bin = tempfile::tempdir().unwrap();
        let bsub = bin.path().join("bsub");
        std::fs::write(&bsub, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&bsub, std::fs::Permissions::from_mode(0o755)).unwrap();

        let env = HostEnv::from_pairs([("PATH", bin.path().to_str().unwrap())]);
        let runner = detect(&env).unwrap();
        assert_eq!(runner, Runner::Lsf);
        assert_eq!(runner.scheduler(), Scheduler::Lsf);
    }

    #[test]
    fn test_site_profiles() {
        assert!(Runner::Slurm.site_profile().is_none());
        assert!(Runner::Pbs.site_profile().is_none());

        let andes = Runner::Andes.site_profile().unwrap();
        assert_eq!(andes.cores_per_node, 32);
        assert_eq!(
            andes.bin_dir(),
            PathBuf::from("/ccs/home/esuchyta/software/install/andes/Incompact3d-gcc-9.3.0/bin")
        );

        let perlmutter = Runner::Perlmutter.site_profile().unwrap();
        assert_eq!(perlmutter.cores_per_node, 128);
        assert!(perlmutter
            .default_example()
            .ends_with("examples/TGV-Taylor-Green-Vortex/input_DNS_Re1600.i3d"));
    }
}
