//! # submit 命令实现
//!
//! 组装并提交 Xcompact3d 作业。
//!
//! ## 流程
//! 1. 推导 MPI 资源布局和环境变量覆盖
//! 2. 在作业实际使用的 `PATH` 中查找 `xcompact3d`
//! 3. 收集算例输入，创建作业目录
//! 4. 关闭 `input.i3d` 中的 `validation_restart`
//! 5. 提交（`--dry-run` 时跳过）
//!
//! ## 依赖关系
//! - 使用 `cli/mod.rs` 解析的参数
//! - 使用 `batch/`, `parsers/namelist.rs`, `utils/`

use crate::batch::{collect_example_inputs, JobDescription, SlurmWorkflow};
use crate::cli::CliOptions;
use crate::error::{XcsubError, Result};
use crate::models::{ResourceLayout, Runner};
use crate::parsers::namelist;
use crate::utils::environment::{self, find_in_search_path, HostEnv};
use crate::utils::output;

use std::path::PathBuf;
use tabled::{Table, Tabled};

/// 模拟程序名
pub const APP_NAME: &str = "xcompact3d";
const JOB_NAME: &str = "Simulation";

/// 作业概要表行
#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Setting")]
    setting: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// 执行 submit 命令
pub fn execute(runner: Runner, opts: CliOptions, host: &HostEnv) -> Result<()> {
    output::print_header("Xcompact3d Batch Submission");

    let workflow = prepare(runner, &opts, host)?;

    output::print_separator();
    if opts.dry_run {
        output::print_dry(&format!(
            "Job prepared in {} ({} ranks), not submitted",
            workflow.directory().display(),
            workflow.job().layout.total_ranks()
        ));
        return Ok(());
    }

    let reply = workflow.submit(host)?;
    output::print_success(&reply);
    output::print_done(&format!("Submitted {}", workflow.script_path().display()));
    Ok(())
}

/// 创建作业目录并修补输入文件，返回可提交的工作流
pub fn prepare(runner: Runner, opts: &CliOptions, host: &HostEnv) -> Result<SlurmWorkflow> {
    let layout = ResourceLayout::new(opts.ranks_per_node, opts.nodes);
    let env = environment::compose(opts.use_site_stack, runner, host)?;
    if !env.is_empty() {
        output::print_info(&format!(
            "Using site software stack for {} ({} environment overrides)",
            runner,
            env.len()
        ));
    }

    let app = locate_app(env.effective_search_path(host))?;
    output::print_info(&format!("Found {}: {}", APP_NAME, app.display()));

    let inputs = collect_example_inputs(&opts.example)?;
    if inputs
        .iter()
        .any(|i| i.target == namelist::INPUT_FILE_NAME && i.source != opts.example)
    {
        output::print_warning(&format!(
            "Example directory already contains {}; it is replaced by {}",
            namelist::INPUT_FILE_NAME,
            opts.example.display()
        ));
    }

    let job = JobDescription {
        runner,
        directory: opts.outdir.clone(),
        name: JOB_NAME.to_string(),
        app,
        layout,
        charge: opts.charge.clone(),
        walltime: opts.walltime.clone(),
        partition: opts.partition.clone(),
        environment: env,
        inputs,
    };
    print_summary(&job);

    let mut workflow = SlurmWorkflow::new(job);
    workflow.create()?;
    output::print_success(&format!(
        "Created run directory {}",
        workflow.directory().display()
    ));

    namelist::disable_validation_restart(workflow.directory())?;
    output::print_success(&format!(
        "Disabled validation_restart in {}",
        namelist::INPUT_FILE_NAME
    ));

    Ok(workflow)
}

fn locate_app(search_path: Option<&str>) -> Result<PathBuf> {
    search_path
        .and_then(|path| find_in_search_path(APP_NAME, path))
        .ok_or_else(|| XcsubError::CommandNotFound {
            command: APP_NAME.to_string(),
        })
}

fn print_summary(job: &JobDescription) {
    let mut rows = vec![
        SummaryRow {
            setting: "Runner",
            value: job.runner.to_string(),
        },
        SummaryRow {
            setting: "Directory",
            value: job.directory.display().to_string(),
        },
        SummaryRow {
            setting: "Account",
            value: job.charge.clone(),
        },
        SummaryRow {
            setting: "Wall time",
            value: job.walltime.clone(),
        },
        SummaryRow {
            setting: "Nodes",
            value: job.layout.nodes().to_string(),
        },
        SummaryRow {
            setting: "Ranks per node",
            value: job.layout.ranks_per_node().to_string(),
        },
        SummaryRow {
            setting: "Total ranks",
            value: job.layout.total_ranks().to_string(),
        },
        SummaryRow {
            setting: "Input files",
            value: job.inputs.len().to_string(),
        },
    ];
    if let Some(partition) = &job.partition {
        rows.push(SummaryRow {
            setting: "QOS",
            value: partition.qos.clone(),
        });
        rows.push(SummaryRow {
            setting: "Constraint",
            value: partition.constraint.clone(),
        });
    }

    println!("{}", Table::new(rows));
}
