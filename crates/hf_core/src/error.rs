// crates/hf_core/src/error.rs

//! 错误处理模块，定义数据布局层的统一错误类型
//!
//! 提供 `CoreError` 枚举和 `CoreResult` 类型别名。本层的所有失败都是
//! 构造期的结构性契约违规（范围错误、类型错误、组合错误），
//! 立即上报，绝不延迟到内核执行期。
//!
//! # 设计原则
//!
//! 1. **逐类区分**: 每种误用对应独立的变体，调用方可以区分误用与后端容量失败
//! 2. **易用性**: 提供便捷的构造方法和 `check_*` 校验辅助
//! 3. **透传**: 后端的资源耗尽错误（[`CoreError::Allocation`]）原样穿过本层
//!
//! # 示例
//!
//! ```
//! use hf_core::error::{CoreError, CoreResult};
//!
//! fn take_rows(p: usize, q: usize, nrow: usize) -> CoreResult<()> {
//!     if q > nrow || q < p {
//!         return Err(CoreError::invalid_row_slice(p, q, nrow));
//!     }
//!     Ok(())
//! }
//! ```

use crate::dtype::DType;
use thiserror::Error;

/// 统一结果类型
pub type CoreResult<T> = Result<T, CoreError>;

/// 数据布局层错误类型
///
/// 除 [`CoreError::Allocation`] 外，所有变体都是调用方编程错误，
/// 在对象构造时立即检出。
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================================================
    // 范围错误
    // ========================================================================

    /// 无效的行切片范围
    #[error("无效的行切片: [{p}, {q}) 超出矩阵行数 {nrow}")]
    InvalidRowSlice {
        /// 起始行（含）
        p: usize,
        /// 结束行（不含）
        q: usize,
        /// 父矩阵行数
        nrow: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    /// 访问越过基础分配区边界
    #[error("越过分配区边界: 偏移 {offset} + 长度 {len} > 分配区 {extent_len} 字节")]
    ExtentOutOfBounds {
        /// 字节偏移
        offset: usize,
        /// 访问字节数
        len: usize,
        /// 分配区总字节数
        extent_len: usize,
    },

    // ========================================================================
    // 类型错误
    // ========================================================================

    /// 元素类型不匹配
    #[error("元素类型不匹配: 期望 {expected}, 实际 {actual}")]
    DtypeMismatch {
        /// 期望的元素类型
        expected: DType,
        /// 实际的元素类型
        actual: DType,
    },

    /// 视图引用的矩阵不属于同一基础分配区
    #[error("视图引用的矩阵必须属于同一基础分配区")]
    ExtentMismatch,

    /// 矩阵不是当前后端实例的产物
    #[error("矩阵不属于当前后端实例")]
    BackendMismatch,

    // ========================================================================
    // 组合错误
    // ========================================================================

    /// 矩阵组成员不同构
    #[error("矩阵组不同构: 成员的{what}不一致")]
    HeterogeneousBank {
        /// 不一致的属性（布局/标签）
        what: &'static str,
    },

    /// 不支持的组合操作
    #[error("不支持的操作 '{operation}': {reason}")]
    Unsupported {
        /// 被拒绝的操作名
        operation: &'static str,
        /// 拒绝原因
        reason: &'static str,
    },

    // ========================================================================
    // 形状与大小
    // ========================================================================

    /// 大小不匹配
    #[error("大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 无效的逻辑形状
    #[error("无效的形状: {reason}")]
    InvalidShape {
        /// 无效原因
        reason: String,
    },

    // ========================================================================
    // 后端侧错误
    // ========================================================================

    /// 分配失败（后端容量不足，原样透传）
    #[error("分配失败: 请求 {requested} 字节, 原因: {reason}")]
    Allocation {
        /// 请求的字节数
        requested: usize,
        /// 失败原因
        reason: String,
    },

    /// 后端配置无效
    #[error("后端配置无效: {reason}")]
    BackendConfig {
        /// 无效原因
        reason: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl CoreError {
    /// 无效行切片
    pub fn invalid_row_slice(p: usize, q: usize, nrow: usize) -> Self {
        Self::InvalidRowSlice { p, q, nrow }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 元素类型不匹配
    pub fn dtype_mismatch(expected: DType, actual: DType) -> Self {
        Self::DtypeMismatch { expected, actual }
    }

    /// 矩阵组不同构
    pub fn heterogeneous(what: &'static str) -> Self {
        Self::HeterogeneousBank { what }
    }

    /// 不支持的操作
    pub fn unsupported(operation: &'static str, reason: &'static str) -> Self {
        Self::Unsupported { operation, reason }
    }

    /// 大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 无效形状
    pub fn invalid_shape(reason: impl Into<String>) -> Self {
        Self::InvalidShape {
            reason: reason.into(),
        }
    }

    /// 分配失败
    pub fn allocation(requested: usize, reason: impl Into<String>) -> Self {
        Self::Allocation {
            requested,
            reason: reason.into(),
        }
    }

    /// 后端配置无效
    pub fn backend_config(reason: impl Into<String>) -> Self {
        Self::BackendConfig {
            reason: reason.into(),
        }
    }
}

// ========================================================================
// 校验辅助方法
// ========================================================================

impl CoreError {
    /// 检查大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> CoreResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查索引是否在范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> CoreResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }

    /// 检查元素类型是否一致
    #[inline]
    pub fn check_dtype(expected: DType, actual: DType) -> CoreResult<()> {
        if expected != actual {
            Err(Self::dtype_mismatch(expected, actual))
        } else {
            Ok(())
        }
    }
}
