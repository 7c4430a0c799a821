//! # 作业批处理模块
//!
//! 组装作业输入并通过 Slurm 创建、提交作业。
//!
//! ## 功能
//! - 收集算例输入文件
//! - 创建作业目录和 sbatch 脚本
//! - 调用 sbatch 提交
//!
//! ## 依赖关系
//! - 被 `commands/submit.rs` 使用
//! - 使用 `walkdir` 遍历算例目录
//! - 使用 `indicatif` 显示复制进度

pub mod collector;
pub mod workflow;

pub use collector::{collect_example_inputs, InputFile};
pub use workflow::{JobDescription, SlurmWorkflow};
