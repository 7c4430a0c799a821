//! # 数据模型模块
//!
//! 定义运行环境、站点配置和 MPI 资源布局。
//!
//! ## 依赖关系
//! - 被 `cli/`, `batch/` 和 `commands/` 使用
//! - 子模块: runner, resources

pub mod resources;
pub mod runner;

pub use resources::ResourceLayout;
pub use runner::{Runner, Scheduler};
