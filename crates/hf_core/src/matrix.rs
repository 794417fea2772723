// crates/hf_core/src/matrix.rs

//! 矩阵抽象
//!
//! [`Matrix`] 是本层的基础单元：一块二维稠密数值分配，
//! 带逻辑 I/O 形状、物理布局（含对齐填充）和语义标签。
//! 矩阵不直接持有内存，而是指向基础分配区内的一个偏移，
//! 多个矩阵可通过 [`Matrix::alloc_group`] 共存于同一分配区，
//! 这是跨矩阵视图得以构造的前提。
//!
//! [`MatrixLike`] 是矩阵、行切片与矩阵组共同实现的能力面：
//! `pitch` 与 `layout` 永远按需派生，不冗余存储，
//! 因此不存在与实际布局脱节的可能。
//!
//! # 并发约定
//!
//! `get`/`set` 相对在途内核执行必须由调用方串行化；
//! 分配区句柄的共享读是安全的。

use crate::backend::Backend;
use crate::dtype::{CoreScalar, DType};
use crate::error::{CoreError, CoreResult};
use crate::extent::{DeviceExtent, ExtentId};
use crate::layout::{align_up, IoShape, LayoutTraits};
use crate::rslice::MatrixRSlice;
use crate::tags::{Tag, TagSet};

/// 矩阵能力面
///
/// 数值代码对"像矩阵的东西"的统一视角。`pitch` 和 `layout`
/// 由其余属性派生，实现方不得另行存储。
pub trait MatrixLike {
    /// 元素类型
    fn dtype(&self) -> DType;
    /// 物理行数
    fn nrow(&self) -> usize;
    /// 逻辑列数
    fn ncol(&self) -> usize;
    /// 行跨度（含填充的元素数）
    fn leaddim(&self) -> usize;
    /// 未填充的逻辑列数
    fn leadsubdim(&self) -> usize;
    /// 逻辑 I/O 形状
    fn ioshape(&self) -> &IoShape;
    /// 语义标签
    fn tags(&self) -> TagSet;

    /// 相邻物理行起点间的字节距离
    #[inline]
    fn pitch(&self) -> usize {
        self.leaddim() * self.dtype().itemsize()
    }

    /// 物理布局键（同构性判据）
    #[inline]
    fn layout(&self) -> LayoutTraits {
        LayoutTraits {
            nrow: self.nrow(),
            leaddim: self.leaddim(),
            leadsubdim: self.leadsubdim(),
            dtype: self.dtype(),
        }
    }
}

/// 稠密矩阵
///
/// 由后端工厂在装配期创建，进程运行期间不再重分配。
/// 克隆共享底层分配区（句柄语义）。
#[derive(Debug, Clone)]
pub struct Matrix<B: Backend> {
    backend: B,
    dtype: DType,
    ioshape: IoShape,
    nrow: usize,
    ncol: usize,
    leaddim: usize,
    tags: TagSet,
    extent: B::Extent,
    /// 分配区内的元素偏移（以本矩阵的元素大小计）
    offset: usize,
}

impl<B: Backend> Matrix<B> {
    /// 分配单个矩阵（独占一个分配区）
    pub fn alloc(backend: &B, dtype: DType, ioshape: IoShape, tags: TagSet) -> CoreResult<Self> {
        let mut mats = Self::alloc_group(backend, &[(dtype, ioshape)], tags)?;
        Ok(mats.pop().expect("alloc_group 对单元素输入必返回一个矩阵"))
    }

    /// 分配并用宿主数据初始化
    pub fn alloc_init<S: CoreScalar>(
        backend: &B,
        ioshape: IoShape,
        data: &[S],
        tags: TagSet,
    ) -> CoreResult<Self> {
        CoreError::check_size("初始化数据", ioshape.count(), data.len())?;
        let mat = Self::alloc(backend, S::DTYPE, ioshape, tags)?;
        mat.write_logical_bytes(bytemuck::cast_slice(data))?;
        Ok(mat)
    }

    /// 在同一基础分配区内分配一组矩阵
    ///
    /// 每个成员按后端对齐粒度取得自己的字节偏移；元素类型可以混合。
    /// 跨矩阵视图要求其引用的矩阵来自同一分配区，即经由本方法分配。
    pub fn alloc_group(
        backend: &B,
        specs: &[(DType, IoShape)],
        tags: TagSet,
    ) -> CoreResult<Vec<Self>> {
        if specs.is_empty() {
            return Err(CoreError::invalid_shape("矩阵组不能为空"));
        }
        let alignment = backend.alignment();
        if alignment < 8 || !alignment.is_power_of_two() {
            return Err(CoreError::backend_config(format!(
                "后端对齐 {} 无效: 必须是 2 的幂且不小于 8",
                alignment
            )));
        }

        // 先布局，后分配：一次算出每个成员的偏移和总字节数
        let mut placements = Vec::with_capacity(specs.len());
        let mut cursor = 0usize;
        for (dtype, ioshape) in specs {
            let itemsize = dtype.itemsize();
            let align_elems = alignment / itemsize;
            let leaddim = align_up(ioshape.ncol(), align_elems);

            cursor = align_up(cursor, alignment);
            placements.push((cursor / itemsize, leaddim));
            cursor += ioshape.nrow() * leaddim * itemsize;
        }

        let extent = backend.alloc_extent(cursor)?;
        tracing::debug!(
            members = specs.len(),
            nbytes = cursor,
            "矩阵组布局完成"
        );

        let mats = specs
            .iter()
            .zip(placements)
            .map(|((dtype, ioshape), (offset, leaddim))| Self {
                backend: backend.clone(),
                dtype: *dtype,
                ioshape: ioshape.clone(),
                nrow: ioshape.nrow(),
                ncol: ioshape.ncol(),
                leaddim,
                tags: tags.with(Tag::Dense),
                extent: extent.clone(),
                offset,
            })
            .collect();
        Ok(mats)
    }

    /// 读取逻辑内容的宿主端快照
    ///
    /// 返回 `nrow * ncol` 个元素（按行主序，已剥除填充）。
    pub fn get<S: CoreScalar>(&self) -> CoreResult<Vec<S>> {
        CoreError::check_dtype(self.dtype, S::DTYPE)?;
        let mut out = vec![S::ZERO; self.nrow * self.ncol];
        self.read_logical_into(bytemuck::cast_slice_mut(&mut out))?;
        Ok(out)
    }

    /// 用宿主缓冲覆盖逻辑内容
    ///
    /// `src` 必须恰好含 `nrow * ncol` 个元素；const 矩阵拒绝写入。
    pub fn set<S: CoreScalar>(&self, src: &[S]) -> CoreResult<()> {
        if self.tags.contains(Tag::Const) {
            return Err(CoreError::unsupported("set", "const 矩阵只读"));
        }
        CoreError::check_dtype(self.dtype, S::DTYPE)?;
        CoreError::check_size("矩阵内容", self.nrow * self.ncol, src.len())?;
        self.write_logical_bytes(bytemuck::cast_slice(src))
    }

    /// 取行切片 `[p, q)`
    pub fn rslice(&self, p: usize, q: usize) -> CoreResult<MatrixRSlice<'_, B>> {
        MatrixRSlice::new(self, p, q)
    }

    /// 所属后端句柄
    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 基础分配区
    #[inline]
    pub fn extent(&self) -> &B::Extent {
        &self.extent
    }

    /// 分配区标识
    #[inline]
    pub fn extent_id(&self) -> ExtentId {
        self.extent.id()
    }

    /// 分配区内的元素偏移
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    // ========================================================================
    // 字节级逻辑读写（内部：逐行剥除/回填 leaddim 填充）
    // ========================================================================

    pub(crate) fn read_logical_into(&self, dst: &mut [u8]) -> CoreResult<()> {
        let itemsize = self.dtype.itemsize();
        let row_bytes = self.ncol * itemsize;
        CoreError::check_size("逻辑字节缓冲", self.nrow * row_bytes, dst.len())?;

        let base = self.offset * itemsize;
        for (r, row) in dst.chunks_exact_mut(row_bytes).enumerate() {
            self.extent.download(base + r * self.pitch(), row)?;
        }
        Ok(())
    }

    pub(crate) fn read_logical_bytes(&self) -> CoreResult<Vec<u8>> {
        let mut out = vec![0u8; self.nrow * self.ncol * self.dtype.itemsize()];
        self.read_logical_into(&mut out)?;
        Ok(out)
    }

    pub(crate) fn write_logical_bytes(&self, src: &[u8]) -> CoreResult<()> {
        let itemsize = self.dtype.itemsize();
        let row_bytes = self.ncol * itemsize;
        CoreError::check_size("逻辑字节缓冲", self.nrow * row_bytes, src.len())?;

        let base = self.offset * itemsize;
        for (r, row) in src.chunks_exact(row_bytes).enumerate() {
            self.extent.upload(base + r * self.pitch(), row)?;
        }
        Ok(())
    }
}

impl<B: Backend> MatrixLike for Matrix<B> {
    fn dtype(&self) -> DType {
        self.dtype
    }

    fn nrow(&self) -> usize {
        self.nrow
    }

    fn ncol(&self) -> usize {
        self.ncol
    }

    fn leaddim(&self) -> usize {
        self.leaddim
    }

    fn leadsubdim(&self) -> usize {
        self.ncol
    }

    fn ioshape(&self) -> &IoShape {
        &self.ioshape
    }

    fn tags(&self) -> TagSet {
        self.tags
    }
}

// ============================================================================
// 只读矩阵
// ============================================================================

/// 只读矩阵
///
/// 标签为 `{const, dense}`，内容在构造时写入一次，此后只读；
/// 后端可据 const 标签放入只读/常量内存。
#[derive(Debug, Clone)]
pub struct ConstMatrix<B: Backend> {
    inner: Matrix<B>,
}

impl<B: Backend> ConstMatrix<B> {
    /// 从宿主数据创建只读矩阵
    pub fn alloc_init<S: CoreScalar>(
        backend: &B,
        ioshape: IoShape,
        data: &[S],
        tags: TagSet,
    ) -> CoreResult<Self> {
        CoreError::check_size("初始化数据", ioshape.count(), data.len())?;
        let inner = Matrix::alloc(backend, S::DTYPE, ioshape, tags.with(Tag::Const))?;
        inner.write_logical_bytes(bytemuck::cast_slice(data))?;
        Ok(Self { inner })
    }

    /// 读取逻辑内容的宿主端快照
    pub fn get<S: CoreScalar>(&self) -> CoreResult<Vec<S>> {
        self.inner.get()
    }

    /// 作为普通矩阵引用（用于视图构造）
    ///
    /// 经此引用的写入仍被 const 标签拒绝。
    #[inline]
    pub fn as_matrix(&self) -> &Matrix<B> {
        &self.inner
    }
}

impl<B: Backend> MatrixLike for ConstMatrix<B> {
    fn dtype(&self) -> DType {
        self.inner.dtype()
    }

    fn nrow(&self) -> usize {
        self.inner.nrow()
    }

    fn ncol(&self) -> usize {
        self.inner.ncol()
    }

    fn leaddim(&self) -> usize {
        self.inner.leaddim()
    }

    fn leadsubdim(&self) -> usize {
        self.inner.leadsubdim()
    }

    fn ioshape(&self) -> &IoShape {
        self.inner.ioshape()
    }

    fn tags(&self) -> TagSet {
        self.inner.tags()
    }
}
