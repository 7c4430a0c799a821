//! # Slurm 脚本生成工具
//!
//! 生成 sbatch 提交脚本。
//!
//! ## 依赖关系
//! - 被 `batch/workflow.rs` 使用
//! - 使用 `models/resources.rs`, `utils/environment.rs`

use crate::models::ResourceLayout;
use crate::utils::environment::EnvironmentOverrides;

use std::fmt::Write as _;
use std::path::Path;

/// Slurm 作业配置
pub struct SlurmConfig<'a> {
    pub job_name: &'a str,
    pub account: &'a str,
    pub time_limit: &'a str,
    pub layout: ResourceLayout,
    pub qos: Option<&'a str>,
    pub constraint: Option<&'a str>,
    pub environment: &'a EnvironmentOverrides,
}

/// 生成 sbatch 脚本内容
pub fn generate_sbatch_script(config: &SlurmConfig<'_>, workdir: &Path, app: &Path) -> String {
    let mut directives = String::new();
    let _ = writeln!(directives, "#SBATCH --job-name={}", config.job_name);
    let _ = writeln!(directives, "#SBATCH --account={}", config.account);
    let _ = writeln!(directives, "#SBATCH --nodes={}", config.layout.nodes());
    let _ = writeln!(
        directives,
        "#SBATCH --ntasks-per-node={}",
        config.layout.ranks_per_node()
    );
    let _ = writeln!(directives, "#SBATCH --time={}", config.time_limit);
    if let Some(qos) = config.qos {
        let _ = writeln!(directives, "#SBATCH --qos={}", qos);
    }
    if let Some(constraint) = config.constraint {
        let _ = writeln!(directives, "#SBATCH --constraint={}", constraint);
    }
    let _ = writeln!(directives, "#SBATCH --output=slurm_logs/%x-%j.out");
    let _ = write!(directives, "#SBATCH --error=slurm_logs/%x-%j.err");

    let exports = config
        .environment
        .iter()
        .map(|(name, value)| format!("export {}=\"{}\"", name, value))
        .collect::<Vec<_>>()
        .join("\n");

    let exec_cmd = format!(
        "srun -N {} -n {} --ntasks-per-node={} {}",
        config.layout.nodes(),
        config.layout.total_ranks(),
        config.layout.ranks_per_node(),
        app.display()
    );

    format!(
        r#"#!/bin/bash
{}

set -euo pipefail

{}

cd "{}"
echo "PWD=$(pwd)"
echo "Running: {}"
{}

echo "Timings:"
sacct -o JobID,Submit,Start,End,CPUTime,State -j $SLURM_JOBID
"#,
        directives,
        exports,
        workdir.display(),
        exec_cmd,
        exec_cmd,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Runner;
    use crate::utils::environment::{compose, HostEnv};

    #[test]
    fn test_generic_script() {
        let env = EnvironmentOverrides::default();
        let config = SlurmConfig {
            job_name: "Simulation",
            account: "ABC123",
            time_limit: "00:15:00",
            layout: ResourceLayout::new(32, 2),
            qos: None,
            constraint: None,
            environment: &env,
        };
        let script = generate_sbatch_script(&config, Path::new("/tmp/run1"), Path::new("/opt/bin/xcompact3d"));

        assert!(script.starts_with("#!/bin/bash\n#SBATCH --job-name=Simulation\n"));
        assert!(script.contains("#SBATCH --account=ABC123\n"));
        assert!(script.contains("#SBATCH --nodes=2\n"));
        assert!(script.contains("#SBATCH --ntasks-per-node=32\n"));
        assert!(script.contains("#SBATCH --time=00:15:00\n"));
        assert!(!script.contains("--qos"));
        assert!(!script.contains("export "));
        assert!(script.contains("cd \"/tmp/run1\""));
        assert!(script.contains("\nsrun -N 2 -n 64 --ntasks-per-node=32 /opt/bin/xcompact3d\n"));
    }

    #[test]
    fn test_site_script() {
        let host = HostEnv::from_pairs([("PATH", "/usr/bin"), ("LD_LIBRARY_PATH", "/lib")]);
        let env = compose(true, Runner::Perlmutter, &host).unwrap();
        let config = SlurmConfig {
            job_name: "Simulation",
            account: "m1234",
            time_limit: "01:00:00",
            layout: ResourceLayout::new(128, 1),
            qos: Some("regular"),
            constraint: Some("cpu"),
            environment: &env,
        };
        let script = generate_sbatch_script(&config, Path::new("/scratch/run"), Path::new("xcompact3d"));

        assert!(script.contains("#SBATCH --qos=regular\n"));
        assert!(script.contains("#SBATCH --constraint=cpu\n"));
        assert!(script.contains(
            "export LD_LIBRARY_PATH=\"/global/homes/e/esuchyta/software/install/perlmutter/adios2-gcc/lib64:/lib\""
        ));
        assert!(script.contains(
            "export PATH=\"/global/homes/e/esuchyta/software/install/perlmutter/Incompact3d-gcc/bin:/usr/bin\""
        ));
    }
}
