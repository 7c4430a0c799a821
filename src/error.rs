//! # 统一错误处理模块
//!
//! 定义 xcsub 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// xcsub 统一错误类型
#[derive(Error, Debug)]
pub enum XcsubError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Run directory already exists and is not empty: {path}")]
    DirectoryNotEmpty { path: String },

    // ─────────────────────────────────────────────────────────────
    // 配置错误
    // ─────────────────────────────────────────────────────────────
    #[error("Current batch setup is for Slurm, but a {scheduler} machine was detected ({runner})")]
    UnsupportedScheduler { runner: String, scheduler: String },

    #[error("Unknown runner '{0}' (expected one of: slurm, andes, perlmutter, lsf, pbs)")]
    UnknownRunner(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // 外部命令错误
    // ─────────────────────────────────────────────────────────────
    #[error("{command} not in $PATH")]
    CommandNotFound { command: String },

    #[error("External command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    // ─────────────────────────────────────────────────────────────
    // 内部不变量
    // ─────────────────────────────────────────────────────────────
    #[error("No site software profile for runner '{runner}'")]
    MissingProfile { runner: String },

    #[error("Job in {path} has not been created yet")]
    NotCreated { path: String },

    // ─────────────────────────────────────────────────────────────
    // Namelist 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse namelist file: {path}\nReason: {reason}")]
    ParseError { path: String, reason: String },

    #[error("Namelist group '&{group}' not found in {path}")]
    MissingGroup { group: String, path: String },

    #[error("{group}.{key} is still enabled in {path} after patching")]
    PatchNotApplied {
        group: String,
        key: String,
        path: String,
    },
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, XcsubError>;
