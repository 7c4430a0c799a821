//! # 输入文件收集器
//!
//! 收集算例目录中的文件作为作业输入。
//!
//! ## 功能
//! - 收集算例文件所在目录下的文件和子目录（子目录由工作流整体复制）
//! - 算例文件本身另以 `input.i3d` 的名字加入
//!
//! ## 依赖关系
//! - 被 `commands/submit.rs` 调用
//! - 使用 `walkdir` 遍历目录

use crate::error::{XcsubError, Result};
use crate::parsers::namelist::INPUT_FILE_NAME;

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 作业输入文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// 源路径
    pub source: PathBuf,
    /// 在作业目录中的文件名
    pub target: String,
}

impl InputFile {
    /// 保持原文件名
    pub fn new(source: PathBuf) -> Self {
        let target = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self { source, target }
    }

    /// 重命名
    pub fn renamed(source: PathBuf, target: &str) -> Self {
        Self {
            source,
            target: target.to_string(),
        }
    }
}

/// 收集算例输入文件
///
/// 返回顺序：目录中的条目按名称排序，最后是重命名的算例文件，
/// 因此同名时算例文件覆盖目录中的文件。
pub fn collect_example_inputs(example: &Path) -> Result<Vec<InputFile>> {
    if !example.is_file() {
        return Err(XcsubError::FileNotFound {
            path: example.display().to_string(),
        });
    }

    let example_dir = match example.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut inputs: Vec<InputFile> = WalkDir::new(example_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() || e.file_type().is_dir())
        .map(|e| InputFile::new(e.into_path()))
        .collect();

    inputs.push(InputFile::renamed(example.to_path_buf(), INPUT_FILE_NAME));
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collect_example_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let example = dir.path().join("input_DNS_Re1600.i3d");
        fs::write(&example, "&InOutParam\n/End\n").unwrap();
        fs::write(dir.path().join("visu.prm"), "0 0 0\n").unwrap();
        fs::create_dir(dir.path().join("data")).unwrap();
        fs::write(dir.path().join("data").join("nested.bin"), "x").unwrap();

        let inputs = collect_example_inputs(&example).unwrap();
        let targets: Vec<&str> = inputs.iter().map(|i| i.target.as_str()).collect();
        assert_eq!(
            targets,
            vec!["data", "input_DNS_Re1600.i3d", "visu.prm", "input.i3d"]
        );
        assert!(inputs[0].source.is_dir());
        assert_eq!(inputs.last().unwrap().source, example);
    }

    #[test]
    fn test_collect_missing_example() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_example_inputs(&dir.path().join("nope.i3d")).unwrap_err();
        assert!(matches!(err, XcsubError::FileNotFound { .. }));
    }
}
