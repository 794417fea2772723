// crates/hf_core/src/bank.rs

//! 矩阵组
//!
//! [`MatrixBank`] 是固定长度的同构矩阵序列，带一个运行时可切换的
//! 活动成员。时间推进的多级缓冲依赖它：切换活动下标是 O(1) 的
//! 纯簿记操作，不搬数据，也不需要重新生成内核绑定。
//!
//! 同构性在构造时一次校验：所有成员的物理布局键和标签集必须
//! 完全一致，否则内核按活动成员布局生成的寻址对其他成员不成立。
//!
//! 组不能被切片：切片会绕过"单一活动成员"的寻址契约。

use std::ops::Index;

use crate::backend::Backend;
use crate::dtype::{CoreScalar, DType};
use crate::error::{CoreError, CoreResult};
use crate::layout::IoShape;
use crate::matrix::{Matrix, MatrixLike};
use crate::rslice::MatrixRSlice;
use crate::tags::TagSet;

/// 同构矩阵的轮换组
///
/// 构造后成员不增不减；只有活动下标可变。
#[derive(Debug, Clone)]
pub struct MatrixBank<B: Backend> {
    mats: Vec<Matrix<B>>,
    active: usize,
    tags: TagSet,
}

impl<B: Backend> MatrixBank<B> {
    /// 创建矩阵组
    ///
    /// 校验：成员非空且全部属于 `backend` 实例；布局键两两一致；
    /// 标签集两两一致；初始活动下标在范围内。
    /// 组标签是 `extra_tags` 与成员标签的并集。
    pub fn new(
        backend: &B,
        mats: Vec<Matrix<B>>,
        init: usize,
        extra_tags: TagSet,
    ) -> CoreResult<Self> {
        if mats.is_empty() {
            return Err(CoreError::invalid_shape("矩阵组不能为空"));
        }
        if mats
            .iter()
            .any(|m| m.backend().instance_id() != backend.instance_id())
        {
            return Err(CoreError::BackendMismatch);
        }

        let first = mats[0].layout();
        if mats[1..].iter().any(|m| m.layout() != first) {
            return Err(CoreError::heterogeneous("布局"));
        }
        let first_tags = mats[0].tags();
        if mats[1..].iter().any(|m| m.tags() != first_tags) {
            return Err(CoreError::heterogeneous("标签"));
        }

        CoreError::check_index("活动成员", init, mats.len())?;

        Ok(Self {
            tags: extra_tags.union(first_tags),
            mats,
            active: init,
        })
    }

    /// 成员数量
    #[inline]
    pub fn len(&self) -> usize {
        self.mats.len()
    }

    /// 是否为空（构造保证非空，恒为 false）
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mats.is_empty()
    }

    /// 当前活动下标
    #[inline]
    pub fn active(&self) -> usize {
        self.active
    }

    /// 切换活动成员
    ///
    /// O(1)，无数据移动；相对在途内核执行须由调用方串行化。
    pub fn set_active(&mut self, idx: usize) -> CoreResult<()> {
        CoreError::check_index("活动成员", idx, self.mats.len())?;
        self.active = idx;
        Ok(())
    }

    /// 当前活动成员
    #[inline]
    pub fn active_matrix(&self) -> &Matrix<B> {
        &self.mats[self.active]
    }

    /// 遍历全部成员
    pub fn iter(&self) -> impl Iterator<Item = &Matrix<B>> {
        self.mats.iter()
    }

    /// 读取活动成员的宿主端快照
    pub fn get<S: CoreScalar>(&self) -> CoreResult<Vec<S>> {
        self.active_matrix().get()
    }

    /// 写入活动成员
    pub fn set<S: CoreScalar>(&self, src: &[S]) -> CoreResult<()> {
        self.active_matrix().set(src)
    }

    /// 矩阵组不能被切片
    pub fn rslice(&self, _p: usize, _q: usize) -> CoreResult<MatrixRSlice<'_, B>> {
        Err(CoreError::unsupported("rslice", "矩阵组不能被切片"))
    }
}

impl<B: Backend> Index<usize> for MatrixBank<B> {
    type Output = Matrix<B>;

    fn index(&self, idx: usize) -> &Matrix<B> {
        &self.mats[idx]
    }
}

// 未在组上定义的矩阵属性一律转发给活动成员；
// 组自身只覆盖合并后的标签集。
impl<B: Backend> MatrixLike for MatrixBank<B> {
    fn dtype(&self) -> DType {
        self.active_matrix().dtype()
    }

    fn nrow(&self) -> usize {
        self.active_matrix().nrow()
    }

    fn ncol(&self) -> usize {
        self.active_matrix().ncol()
    }

    fn leaddim(&self) -> usize {
        self.active_matrix().leaddim()
    }

    fn leadsubdim(&self) -> usize {
        self.active_matrix().leadsubdim()
    }

    fn ioshape(&self) -> &IoShape {
        self.active_matrix().ioshape()
    }

    fn tags(&self) -> TagSet {
        self.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::tags::Tag;

    fn shape(dims: &[usize]) -> IoShape {
        IoShape::new(dims).unwrap()
    }

    fn make_mats(backend: &CpuBackend, n: usize) -> Vec<Matrix<CpuBackend>> {
        (0..n)
            .map(|_| Matrix::alloc(backend, DType::F64, shape(&[3, 4]), TagSet::new()).unwrap())
            .collect()
    }

    #[test]
    fn test_bank_construction() {
        let backend = CpuBackend::new();
        let bank = MatrixBank::new(&backend, make_mats(&backend, 3), 0, TagSet::new()).unwrap();
        assert_eq!(bank.len(), 3);
        assert_eq!(bank.active(), 0);
        assert!(bank.tags().contains(Tag::Dense));
    }

    #[test]
    fn test_bank_heterogeneous_traits_rejected() {
        let backend = CpuBackend::new();
        let mut mats = make_mats(&backend, 2);
        mats.push(Matrix::alloc(&backend, DType::F64, shape(&[5, 4]), TagSet::new()).unwrap());
        assert!(matches!(
            MatrixBank::new(&backend, mats, 0, TagSet::new()),
            Err(CoreError::HeterogeneousBank { what: "布局" })
        ));
    }

    #[test]
    fn test_bank_heterogeneous_dtype_rejected() {
        let backend = CpuBackend::new();
        // f32 的 3x4 与 f64 的 3x4 布局键不同（dtype 与 leaddim 皆异）
        let mut mats = make_mats(&backend, 1);
        mats.push(Matrix::alloc(&backend, DType::F32, shape(&[3, 4]), TagSet::new()).unwrap());
        assert!(MatrixBank::new(&backend, mats, 0, TagSet::new()).is_err());
    }

    #[test]
    fn test_bank_heterogeneous_tags_rejected() {
        let backend = CpuBackend::new();
        let mut mats = make_mats(&backend, 2);
        mats.push(
            Matrix::alloc(&backend, DType::F64, shape(&[3, 4]), TagSet::from(Tag::Mpi)).unwrap(),
        );
        assert!(matches!(
            MatrixBank::new(&backend, mats, 0, TagSet::new()),
            Err(CoreError::HeterogeneousBank { what: "标签" })
        ));
    }

    #[test]
    fn test_bank_foreign_backend_rejected() {
        let backend = CpuBackend::new();
        let other = CpuBackend::new();
        let mats = make_mats(&other, 2);
        assert!(matches!(
            MatrixBank::new(&backend, mats, 0, TagSet::new()),
            Err(CoreError::BackendMismatch)
        ));
    }

    #[test]
    fn test_bank_init_index_checked() {
        let backend = CpuBackend::new();
        assert!(matches!(
            MatrixBank::new(&backend, make_mats(&backend, 2), 2, TagSet::new()),
            Err(CoreError::IndexOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_bank_rotation_forwards() {
        let backend = CpuBackend::new();
        let mats = make_mats(&backend, 3);
        for (i, m) in mats.iter().enumerate() {
            m.set(&vec![i as f64; 12]).unwrap();
        }

        let mut bank = MatrixBank::new(&backend, mats, 0, TagSet::new()).unwrap();
        for i in 0..3 {
            bank.set_active(i).unwrap();
            assert_eq!(bank.active(), i);
            assert_eq!(bank.get::<f64>().unwrap(), vec![i as f64; 12]);
            assert_eq!(bank.layout(), bank[i].layout());
        }
        assert!(bank.set_active(3).is_err());
    }

    #[test]
    fn test_bank_rslice_rejected() {
        let backend = CpuBackend::new();
        let bank = MatrixBank::new(&backend, make_mats(&backend, 2), 0, TagSet::new()).unwrap();
        assert!(matches!(
            bank.rslice(0, 1),
            Err(CoreError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_bank_write_through_active() {
        let backend = CpuBackend::new();
        let mut bank = MatrixBank::new(&backend, make_mats(&backend, 2), 0, TagSet::new()).unwrap();

        bank.set(&vec![7.0f64; 12]).unwrap();
        bank.set_active(1).unwrap();
        bank.set(&vec![8.0f64; 12]).unwrap();

        assert_eq!(bank[0].get::<f64>().unwrap(), vec![7.0; 12]);
        assert_eq!(bank[1].get::<f64>().unwrap(), vec![8.0; 12]);
    }
}
