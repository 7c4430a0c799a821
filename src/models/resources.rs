//! # MPI 资源布局
//!
//! 由每节点进程数和节点数推导总进程数。
//!
//! ## 依赖关系
//! - 被 `commands/submit.rs`, `batch/workflow.rs` 使用
//! - 无外部模块依赖

/// MPI 资源布局
///
/// 总进程数始终由 `ranks_per_node * nodes` 计算，不单独存储。
/// 两个输入都应为正整数，命令行层负责拒绝 0。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLayout {
    ranks_per_node: u32,
    nodes: u32,
}

impl ResourceLayout {
    pub fn new(ranks_per_node: u32, nodes: u32) -> Self {
        debug_assert!(ranks_per_node > 0 && nodes > 0);
        Self {
            ranks_per_node,
            nodes,
        }
    }

    pub fn ranks_per_node(&self) -> u32 {
        self.ranks_per_node
    }

    pub fn nodes(&self) -> u32 {
        self.nodes
    }

    /// 总 MPI 进程数
    pub fn total_ranks(&self) -> u64 {
        u64::from(self.ranks_per_node) * u64::from(self.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_ranks() {
        assert_eq!(ResourceLayout::new(1, 1).total_ranks(), 1);
        assert_eq!(ResourceLayout::new(32, 1).total_ranks(), 32);
        assert_eq!(ResourceLayout::new(128, 64).total_ranks(), 8192);
    }

    #[test]
    fn test_total_ranks_does_not_overflow() {
        let layout = ResourceLayout::new(u32::MAX, 2);
        assert_eq!(layout.total_ranks(), u64::from(u32::MAX) * 2);
        assert_eq!(layout.nodes(), 2);
        assert_eq!(layout.ranks_per_node(), u32::MAX);
    }
}
