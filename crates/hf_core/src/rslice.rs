// crates/hf_core/src/rslice.rs

//! 矩阵行切片
//!
//! [`MatrixRSlice`] 是父矩阵连续行区间 `[p, q)` 的非占有引用：
//! 复制父矩阵的物理参数（行跨度、列数、元素类型），只收窄行数。
//! 借用使"父矩阵必须比切片活得久"成为编译期事实。
//!
//! 切片不提供独立的 `get`/`set`；消费方经由父矩阵或支持切片寻址的
//! 后端内核访问内容。切片的切片被即时拒绝：二次收窄会破坏
//! 其余组件依赖的布局同构契约。

use crate::backend::Backend;
use crate::dtype::DType;
use crate::error::{CoreError, CoreResult};
use crate::layout::IoShape;
use crate::matrix::{Matrix, MatrixLike};
use crate::tags::{Tag, TagSet};

/// 矩阵行切片 `[p, q)`
#[derive(Debug, Clone)]
pub struct MatrixRSlice<'a, B: Backend> {
    parent: &'a Matrix<B>,
    p: usize,
    q: usize,
    ioshape: IoShape,
    tags: TagSet,
}

impl<'a, B: Backend> MatrixRSlice<'a, B> {
    /// 创建行切片
    ///
    /// 要求 `p <= q <= parent.nrow()`，否则立即返回范围错误。
    pub fn new(parent: &'a Matrix<B>, p: usize, q: usize) -> CoreResult<Self> {
        if q > parent.nrow() || q < p {
            return Err(CoreError::invalid_row_slice(p, q, parent.nrow()));
        }
        let ioshape = IoShape::from_dims(vec![q - p, parent.ncol()]);
        Ok(Self {
            parent,
            p,
            q,
            ioshape,
            tags: parent.tags().with(Tag::Slice),
        })
    }

    /// 父矩阵
    #[inline]
    pub fn parent(&self) -> &'a Matrix<B> {
        self.parent
    }

    /// 起始行（含）
    #[inline]
    pub fn start(&self) -> usize {
        self.p
    }

    /// 结束行（不含）
    #[inline]
    pub fn end(&self) -> usize {
        self.q
    }

    /// 分配区内的元素偏移（父偏移加上行偏移）
    #[inline]
    pub fn offset(&self) -> usize {
        self.parent.offset() + self.p * self.parent.leaddim()
    }

    /// 切片的切片不被支持
    pub fn rslice(&self, _p: usize, _q: usize) -> CoreResult<MatrixRSlice<'a, B>> {
        Err(CoreError::unsupported("rslice", "行切片不能再切片"))
    }
}

impl<B: Backend> MatrixLike for MatrixRSlice<'_, B> {
    fn dtype(&self) -> DType {
        self.parent.dtype()
    }

    fn nrow(&self) -> usize {
        self.q - self.p
    }

    fn ncol(&self) -> usize {
        self.parent.ncol()
    }

    fn leaddim(&self) -> usize {
        self.parent.leaddim()
    }

    fn leadsubdim(&self) -> usize {
        self.parent.leadsubdim()
    }

    fn ioshape(&self) -> &IoShape {
        &self.ioshape
    }

    fn tags(&self) -> TagSet {
        self.tags
    }
}
