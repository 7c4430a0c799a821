//! # 解析器模块
//!
//! 提供 Xcompact3d 输入文件 (Fortran namelist) 的修补工具。
//!
//! ## 依赖关系
//! - 被 `commands/` 模块使用
//! - 子模块: namelist

pub mod namelist;
