//! # 工具函数模块
//!
//! 提供美化输出、进度条、环境变量组合、Slurm 脚本生成等工具。
//!
//! ## 依赖关系
//! - 被 `commands/`, `batch/` 模块使用
//! - 子模块: environment, output, progress, slurm

pub mod environment;
pub mod output;
pub mod progress;
pub mod slurm;
