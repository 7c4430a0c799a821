//! # Fortran namelist 补丁工具
//!
//! 按行处理 Xcompact3d 的 `.i3d` 输入文件，定位并改写单个字段，
//! 其余内容原样保留。不是通用的 namelist 解析器。
//!
//! ## 格式说明
//! ```text
//! ! comment
//! &InOutParam
//! irestart = 0               ! Read initial flow field ?
//! validation_restart = .true.
//! /End
//! ```
//!
//! - 组以 `&Name` 开始，以 `/`（常见写法 `/End`）或 `&end` 结束
//! - 结束符可以写在赋值的同一行（`ilist = 10 /`），组头行也可以带赋值
//! - 一行可以有多个赋值（`a = 1, b = .true.`），数组值内部的逗号属于值本身
//! - 组名和键名不区分大小写
//! - `!` 之后（引号外）为注释
//!
//! ## 依赖关系
//! - 被 `commands/submit.rs` 使用
//! - 使用 `regex` 识别键名，`tempfile` 原子替换文件

use crate::error::{XcsubError, Result};

use regex::Regex;
use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;
use tempfile::NamedTempFile;

/// 作业目录中的输入文件名
pub const INPUT_FILE_NAME: &str = "input.i3d";

const RESTART_GROUP: &str = "InOutParam";
const RESTART_KEY: &str = "validation_restart";

/// `=` 之前的键名（可带下标，如 `a(1)`）
fn key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([A-Za-z][A-Za-z0-9_%]*)\s*(?:\([^()]*\))?\s*$").expect("valid regex")
    })
}

/// namelist 组在文档中的位置
#[derive(Debug, Clone)]
struct Group {
    name: String,
    /// `&Name` 所在行
    start: usize,
    /// 结束符所在行
    end: usize,
    /// 结束符在该行中的字节偏移
    end_col: usize,
}

/// 一个 `key = value` 赋值
#[derive(Debug, Clone)]
struct Assignment {
    /// 所属组在 `groups` 中的下标
    group: usize,
    line: usize,
    key: String,
    /// 值在该行中的字节范围（不含分隔逗号和空白）
    value: Range<usize>,
}

/// 单行扫描结果
#[derive(Debug, Default)]
struct LineScan {
    group_start: Option<String>,
    end: Option<usize>,
    assignments: Vec<(String, Range<usize>)>,
}

/// 按行保存的 namelist 文档
#[derive(Debug, Clone)]
pub struct NamelistDocument {
    source: String,
    lines: Vec<String>,
    groups: Vec<Group>,
    assignments: Vec<Assignment>,
}

impl NamelistDocument {
    /// 解析 namelist 文件
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(XcsubError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| XcsubError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// 从字符串内容解析
    pub fn parse(content: &str, source: &str) -> Result<Self> {
        let lines: Vec<String> = content.lines().map(str::to_string).collect();
        let mut groups = Vec::new();
        let mut assignments = Vec::new();
        let mut open: Option<(String, usize)> = None;

        let parse_error = |line_no: usize, reason: &str| XcsubError::ParseError {
            path: source.to_string(),
            reason: format!("line {}: {}", line_no + 1, reason),
        };

        for (i, line) in lines.iter().enumerate() {
            let scan = scan_line(line);

            if let Some(name) = scan.group_start {
                if name.is_empty() {
                    return Err(parse_error(i, "missing group name"));
                }
                if let Some((outer, _)) = &open {
                    return Err(parse_error(
                        i,
                        &format!("group '&{}' opened inside '&{}'", name, outer),
                    ));
                }
                open = Some((name, i));
            }

            // 组外的文本按注释处理
            if open.is_some() {
                assignments.extend(scan.assignments.into_iter().map(|(key, value)| {
                    Assignment {
                        group: groups.len(),
                        line: i,
                        key,
                        value,
                    }
                }));
            }

            if let Some(end_col) = scan.end {
                let (name, start) = open
                    .take()
                    .ok_or_else(|| parse_error(i, "group terminator outside of a group"))?;
                groups.push(Group {
                    name,
                    start,
                    end: i,
                    end_col,
                });
            }
        }

        if let Some((name, start)) = open {
            return Err(parse_error(start, &format!("group '&{}' is never closed", name)));
        }

        Ok(Self {
            source: source.to_string(),
            lines,
            groups,
            assignments,
        })
    }

    /// 读取字段的原始值（多次赋值时取最后一次）
    pub fn get(&self, group: &str, key: &str) -> Option<String> {
        let idx = self.group_index(group)?;
        let a = self.matching(idx, key).last()?;
        Some(self.lines[a.line][a.value.clone()].to_string())
    }

    /// 读取逻辑型字段
    pub fn get_logical(&self, group: &str, key: &str) -> Option<bool> {
        self.get(group, key).as_deref().and_then(parse_logical)
    }

    /// 设置字段值
    ///
    /// 已有赋值只替换值本身，同一行的其他赋值、缩进和行尾注释不变；
    /// 缺失时插入到组结束符之前。
    pub fn set(&mut self, group: &str, key: &str, value: &str) -> Result<()> {
        let idx = self
            .group_index(group)
            .ok_or_else(|| XcsubError::MissingGroup {
                group: group.to_string(),
                path: self.source.clone(),
            })?;

        let mut hits: Vec<(usize, Range<usize>)> = self
            .matching(idx, key)
            .map(|a| (a.line, a.value.clone()))
            .collect();

        if hits.is_empty() {
            let (end, end_col) = (self.groups[idx].end, self.groups[idx].end_col);
            let (before, after) = self.lines[end].split_at(end_col);
            if before.trim().is_empty() {
                self.lines.insert(end, format!("{} = {}", key, value));
            } else {
                // 结束符与赋值同行，新赋值放在结束符前
                let merged = format!("{} {} = {} {}", before.trim_end(), key, value, after);
                self.lines[end] = merged;
            }
        } else {
            // 从后往前替换，同一行中靠前的范围不受影响
            hits.sort_by_key(|(line, range)| (*line, range.start));
            for (line, range) in hits.into_iter().rev() {
                self.lines[line].replace_range(range, value);
            }
        }

        *self = Self::parse(&self.render(), &self.source)?;
        Ok(())
    }

    /// 设置逻辑型字段
    pub fn set_logical(&mut self, group: &str, key: &str, value: bool) -> Result<()> {
        self.set(group, key, logical_literal(value))
    }

    /// 输出为文本
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    fn group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name.eq_ignore_ascii_case(name))
    }

    fn matching<'a>(&'a self, group: usize, key: &'a str) -> impl Iterator<Item = &'a Assignment> {
        self.assignments
            .iter()
            .filter(move |a| a.group == group && a.key.eq_ignore_ascii_case(key))
    }
}

/// 扫描一行：组开始、赋值和结束符
///
/// 只看引号外、括号外的字符。结束符之后的内容忽略。
fn scan_line(line: &str) -> LineScan {
    let (code, _) = split_comment(line);
    let mut scan = LineScan::default();
    let mut body_start = 0;
    let mut body_end = code.len();
    let mut equals = Vec::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;

    for (i, c) in code.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, '=') if depth == 0 => equals.push(i),
            (None, '/') if depth == 0 => {
                body_end = i;
                scan.end = Some(i);
                break;
            }
            (None, '&' | '$') if depth == 0 => {
                let name: String = code[i + 1..]
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                    .collect();
                if name.eq_ignore_ascii_case("end") {
                    body_end = i;
                    scan.end = Some(i);
                    break;
                }
                if scan.group_start.is_none() && code[..i].trim().is_empty() {
                    body_start = i + 1 + name.len();
                    scan.group_start = Some(name);
                }
            }
            _ => {}
        }
    }

    // 每个 `=` 前面是键名；值一直延伸到下一个键名之前
    let mut keys: Vec<(usize, String, usize)> = Vec::new();
    let mut lo = body_start;
    for eq in equals.into_iter().filter(|&eq| eq >= body_start) {
        if let Some(m) = key_pattern().captures(&code[lo..eq]).and_then(|c| c.get(1)) {
            keys.push((lo + m.start(), m.as_str().to_string(), eq));
        }
        lo = eq + 1;
    }

    for (k, (_, key, eq)) in keys.iter().enumerate() {
        let stop = keys.get(k + 1).map_or(body_end, |next| next.0);
        let raw = &code[eq + 1..stop];
        let lead = raw.len() - raw.trim_start().len();
        let value = raw
            .trim_start()
            .trim_end_matches(|c: char| c.is_whitespace() || c == ',');
        let from = eq + 1 + lead;
        scan.assignments.push((key.clone(), from..from + value.len()));
    }

    scan
}

/// 拆分代码和注释（引号内的 `!` 不算注释）
fn split_comment(line: &str) -> (&str, &str) {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), _) if c == q => quote = None,
            (None, '!') => return (&line[..i], &line[i..]),
            _ => {}
        }
    }
    (line, "")
}

/// Fortran 逻辑值字面量
pub fn logical_literal(value: bool) -> &'static str {
    if value {
        ".true."
    } else {
        ".false."
    }
}

/// 解析 Fortran 逻辑值 (`.true.`, `.F.`, `T`, `false` ...)
pub fn parse_logical(text: &str) -> Option<bool> {
    let text = text.trim().trim_end_matches(',').trim_start_matches('.');
    match text.chars().next()?.to_ascii_lowercase() {
        't' => Some(true),
        'f' => Some(false),
        _ => None,
    }
}

/// 规范化行结构：去掉每行首尾空白，删除空行，文件末尾恰好一个换行
pub fn normalize_lines(text: &str) -> String {
    let mut out = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    out.push('\n');
    out
}

/// 通过同目录临时文件原子替换目标文件
///
/// 任一步骤失败时临时文件随句柄释放被删除，原文件保持不变。
fn write_atomically(path: &Path, text: &str) -> Result<()> {
    let write_err = |e: std::io::Error| XcsubError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(text.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions()).map_err(write_err)?;
    }

    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// 将文件中某个逻辑型字段强制设为给定值
pub fn patch_logical(path: &Path, group: &str, key: &str, value: bool) -> Result<()> {
    let mut doc = NamelistDocument::from_file(path)?;
    doc.set_logical(group, key, value)?;
    write_atomically(path, &normalize_lines(&doc.render()))?;

    let written = NamelistDocument::from_file(path)?;
    if written.get_logical(group, key) != Some(value) {
        return Err(XcsubError::PatchNotApplied {
            group: group.to_string(),
            key: key.to_string(),
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// 关闭作业目录中 `input.i3d` 的 `validation_restart`
///
/// Xcompact3d 用目录大小粗略校验重启检查点，这在 scratch/ADIOS 存储上不成立，
/// 因此每次提交都无条件关闭。
pub fn disable_validation_restart(run_dir: &Path) -> Result<()> {
    let path = run_dir.join(INPUT_FILE_NAME);
    patch_logical(&path, RESTART_GROUP, RESTART_KEY, false)
}
