//! # xcsub - Xcompact3d 批量作业提交工具
//!
//! 根据检测到的机器（通用 Slurm、Andes、Perlmutter）调整命令行选项和默认资源，
//! 创建作业目录，关闭输入文件中的 `validation_restart`，然后提交到 Slurm。
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (按运行环境构建命令行参数)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── batch/     (输入收集、作业目录、sbatch 提交)
//!   │     ├── parsers/   (namelist 修补)
//!   │     └── models/    (运行环境、资源布局)
//!   ├── utils/      (环境变量、输出、进度条、Slurm 脚本)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod error;
mod models;
mod parsers;
mod utils;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    if let Err(e) = commands::run() {
        utils::output::print_error(&e);
        std::process::exit(1);
    }
}
