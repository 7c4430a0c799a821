//! # 环境变量处理
//!
//! - `HostEnv`: 启动时捕获的进程环境快照（只读）
//! - `EnvironmentOverrides`: 作用于作业子进程的环境变量覆盖
//! - `compose`: 在使用站点软件栈时，把站点目录前置到 `PATH` / `LD_LIBRARY_PATH`
//!
//! 父进程自身的环境变量从不被修改。
//!
//! ## 依赖关系
//! - 被 `models/runner.rs`, `commands/submit.rs`, `batch/workflow.rs` 使用
//! - 使用 `which` 在指定搜索路径中查找可执行文件

use crate::error::{XcsubError, Result};
use crate::models::Runner;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::Command;

pub const SEARCH_PATH_VAR: &str = "PATH";
pub const LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

/// 进程环境快照
#[derive(Debug, Clone, Default)]
pub struct HostEnv {
    vars: HashMap<String, String>,
}

impl HostEnv {
    /// 捕获当前进程环境（忽略非 UTF-8 变量）
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// 在快照的 `PATH` 中查找可执行文件
    pub fn find_executable(&self, command: &str) -> Option<PathBuf> {
        find_in_search_path(command, self.get(SEARCH_PATH_VAR)?)
    }
}

/// 在给定的搜索路径字符串中查找可执行文件
pub fn find_in_search_path(command: &str, search_path: &str) -> Option<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    which::which_in(command, Some(search_path), cwd).ok()
}

/// 作业子进程的环境变量覆盖
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentOverrides {
    vars: BTreeMap<String, String>,
}

impl EnvironmentOverrides {
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// 作业实际使用的 `PATH`：优先覆盖值，否则沿用宿主环境
    pub fn effective_search_path<'a>(&'a self, host: &'a HostEnv) -> Option<&'a str> {
        self.get(SEARCH_PATH_VAR).or_else(|| host.get(SEARCH_PATH_VAR))
    }

    /// 应用到子进程
    pub fn apply(&self, command: &mut Command) {
        command.envs(self.vars.iter());
    }

    fn prepend(&mut self, name: &str, dir: &Path, host: &HostEnv) {
        let value = match host.get(name).filter(|v| !v.is_empty()) {
            Some(existing) => format!("{}:{}", dir.display(), existing),
            None => dir.display().to_string(),
        };
        self.vars.insert(name.to_string(), value);
    }
}

/// 组合环境变量覆盖
///
/// 不使用站点软件栈时返回空映射，与运行环境无关。
pub fn compose(use_site_stack: bool, runner: Runner, host: &HostEnv) -> Result<EnvironmentOverrides> {
    let mut overrides = EnvironmentOverrides::default();
    if !use_site_stack {
        return Ok(overrides);
    }

    let profile = runner.site_profile().ok_or_else(|| XcsubError::MissingProfile {
        runner: runner.to_string(),
    })?;

    overrides.prepend(SEARCH_PATH_VAR, &profile.bin_dir(), host);
    overrides.prepend(LIBRARY_PATH_VAR, &profile.lib_dir(), host);
    Ok(overrides)
}
