// crates/hf_core/src/exchange.rs

//! 跨进程交换视图
//!
//! [`MpiView`] 把一个普通视图与一块专属暂存矩阵绑定：视图决定
//! *哪些* 字节参与交换，暂存矩阵是打包后的*连续*缓冲，供消息传递
//! 层直接收发。暂存矩阵形状为 `(nvrow, nvcol, n)`，在构造时分配
//! 一次，此后每个打包/交换/散布周期复用，绝不重分配。
//!
//! 网络传输本身不在本层：协作方通过暂存矩阵的 `get`/`set`
//! 读写宿主端缓冲，自行完成点对点收发。
//!
//! 默认的宿主端打包/散布路径在本模块实现；设备后端可以在
//! [`Backend`](crate::backend::Backend) 上用打包内核覆盖。

use rayon::prelude::*;

use crate::backend::Backend;
use crate::dtype::{CoreScalar, DType};
use crate::error::{CoreError, CoreResult};
use crate::extent::DeviceExtent;
use crate::layout::IoShape;
use crate::matrix::{Matrix, MatrixLike};
use crate::queue::KernelUnit;
use crate::tags::{Tag, TagSet};
use crate::view::{View, ViewLike, ViewShape};

/// 跨进程交换视图
///
/// 视图 + 专属暂存矩阵；暂存矩阵生命周期与视图绑定。
#[derive(Debug, Clone)]
pub struct MpiView<B: Backend> {
    view: View<B>,
    mpimat: Matrix<B>,
}

impl<B: Backend> MpiView<B> {
    /// 构造交换视图
    ///
    /// 参数与 [`View::new`] 相同；额外在同一后端上分配
    /// `(nvrow, nvcol, n)` 形状、带 `mpi` 标签的暂存矩阵。
    pub fn new(
        backend: &B,
        matmap: &[&Matrix<B>],
        rcmap: &[[i32; 2]],
        stridemap: &[[i32; 2]],
        vshape: ViewShape,
        tags: TagSet,
    ) -> CoreResult<Self> {
        let view = View::new(backend, matmap, rcmap, stridemap, vshape, tags)?;
        let mpimat = Matrix::alloc(
            backend,
            view.dtype(),
            IoShape::new(&[view.nvrow(), view.nvcol(), view.n()])?,
            tags.with(Tag::Mpi),
        )?;
        Ok(Self { view, mpimat })
    }

    /// 内嵌的普通视图
    #[inline]
    pub fn view(&self) -> &View<B> {
        &self.view
    }

    /// 暂存矩阵（消息传递层的收发缓冲）
    #[inline]
    pub fn staging(&self) -> &Matrix<B> {
        &self.mpimat
    }

    /// 聚集：把视图指向的零散数据打包进暂存矩阵
    pub fn pack(&self) -> CoreResult<()> {
        self.view.backend().pack_view(&self.view, &self.mpimat)
    }

    /// 散布：把暂存矩阵内容写回视图指向的位置
    pub fn unpack(&self) -> CoreResult<()> {
        self.view.backend().unpack_view(&self.view, &self.mpimat)
    }

    /// 打包操作的可入队表示
    pub fn pack_kernel(&self) -> KernelUnit {
        let backend = self.view.backend().clone();
        let view = self.view.clone();
        let mpimat = self.mpimat.clone();
        KernelUnit::new("pack_mpi_view", move || {
            backend.pack_view(&view, &mpimat)
        })
    }

    /// 散布操作的可入队表示
    pub fn unpack_kernel(&self) -> KernelUnit {
        let backend = self.view.backend().clone();
        let view = self.view.clone();
        let mpimat = self.mpimat.clone();
        KernelUnit::new("unpack_mpi_view", move || {
            backend.unpack_view(&view, &mpimat)
        })
    }

    /// 读取暂存矩阵的宿主端快照
    pub fn get<S: CoreScalar>(&self) -> CoreResult<Vec<S>> {
        self.mpimat.get()
    }

    /// 写入暂存矩阵（接收侧在散布前调用）
    pub fn set<S: CoreScalar>(&self, src: &[S]) -> CoreResult<()> {
        self.mpimat.set(src)
    }
}

impl<B: Backend> ViewLike for MpiView<B> {
    fn n(&self) -> usize {
        self.view.n()
    }

    fn nvrow(&self) -> usize {
        self.view.nvrow()
    }

    fn nvcol(&self) -> usize {
        self.view.nvcol()
    }

    fn dtype(&self) -> DType {
        self.view.dtype()
    }

    fn mapping(&self) -> &[i32] {
        self.view.mapping()
    }

    fn rstrides(&self) -> Option<&[i32]> {
        self.view.rstrides()
    }

    fn cstrides(&self) -> Option<&[i32]> {
        self.view.cstrides()
    }

    fn tags(&self) -> TagSet {
        self.view.tags()
    }
}

// ============================================================================
// 宿主端打包/散布路径
// ============================================================================

/// 暂存矩阵与视图的结构一致性校验
fn check_staging<B: Backend>(view: &View<B>, staging: &Matrix<B>) -> CoreResult<()> {
    CoreError::check_dtype(view.dtype(), staging.dtype())?;
    CoreError::check_size("暂存矩阵行数", view.nvrow(), staging.nrow())?;
    CoreError::check_size(
        "暂存矩阵列数",
        view.nvcol() * view.n(),
        staging.ncol(),
    )
}

/// 点 `i`、重数下标 `(r, c)` 对应的分配区元素位移
#[inline]
fn displacement<B: Backend>(view: &View<B>, r: usize, c: usize, i: usize) -> i64 {
    let rs = view.rstrides().map_or(0, |s| s[i] as i64);
    let cs = view.cstrides().map_or(0, |s| s[i] as i64);
    view.mapping()[i] as i64 + r as i64 * rs + c as i64 * cs
}

/// 宿主端聚集：分配区 → 暂存矩阵
///
/// 逻辑布局 `(nvrow, nvcol, n)`，点编号为最快变化的维度。
pub(crate) fn host_pack<B: Backend>(view: &View<B>, staging: &Matrix<B>) -> CoreResult<()> {
    check_staging(view, staging)?;

    let itemsize = view.dtype().itemsize();
    let (n, nvcol) = (view.n(), view.nvcol());
    let total = view.nvrow() * nvcol * n;
    tracing::debug!(n, total, "宿主端打包");

    let mut src = vec![0u8; view.extent().len_bytes()];
    view.extent().download(0, &mut src)?;

    let mut out = vec![0u8; total * itemsize];
    out.par_chunks_exact_mut(itemsize)
        .enumerate()
        .try_for_each(|(j, chunk)| {
            let r = j / (nvcol * n);
            let c = j % (nvcol * n) / n;
            let i = j % n;
            let byte = displacement(view, r, c, i) as usize * itemsize;
            let elem = src
                .get(byte..byte + itemsize)
                .ok_or(CoreError::ExtentOutOfBounds {
                    offset: byte,
                    len: itemsize,
                    extent_len: src.len(),
                })?;
            chunk.copy_from_slice(elem);
            Ok(())
        })?;

    staging.write_logical_bytes(&out)
}

/// 宿主端散布：暂存矩阵 → 分配区
///
/// 对分配区做读-改-写；映射目标可能重叠，散布按点编号升序
/// 串行执行以保证确定性。
pub(crate) fn host_unpack<B: Backend>(view: &View<B>, staging: &Matrix<B>) -> CoreResult<()> {
    check_staging(view, staging)?;

    let itemsize = view.dtype().itemsize();
    let (n, nvcol) = (view.n(), view.nvcol());
    let total = view.nvrow() * nvcol * n;
    tracing::debug!(n, total, "宿主端散布");

    let packed = staging.read_logical_bytes()?;
    let mut scratch = vec![0u8; view.extent().len_bytes()];
    view.extent().download(0, &mut scratch)?;

    for j in 0..total {
        let r = j / (nvcol * n);
        let c = j % (nvcol * n) / n;
        let i = j % n;
        let byte = displacement(view, r, c, i) as usize * itemsize;
        let dst = scratch
            .get_mut(byte..byte + itemsize)
            .ok_or(CoreError::ExtentOutOfBounds {
                offset: byte,
                len: itemsize,
                extent_len: view.extent().len_bytes(),
            })?;
        dst.copy_from_slice(&packed[j * itemsize..(j + 1) * itemsize]);
    }

    view.extent().upload(0, &scratch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;

    fn shape(dims: &[usize]) -> IoShape {
        IoShape::new(dims).unwrap()
    }

    /// 元素 (r, c) = r*10 + c 的测试矩阵
    fn pattern_matrix(backend: &CpuBackend, nrow: usize, ncol: usize) -> Matrix<CpuBackend> {
        let data: Vec<f64> = (0..nrow * ncol)
            .map(|k| (k / ncol * 10 + k % ncol) as f64)
            .collect();
        Matrix::alloc_init(backend, shape(&[nrow, ncol]), &data, TagSet::new()).unwrap()
    }

    fn make_mpi_view(
        backend: &CpuBackend,
        m: &Matrix<CpuBackend>,
    ) -> MpiView<CpuBackend> {
        // 两个点 (0,1), (2,3)，每点 2x2，行/列跨度均为 1
        MpiView::new(
            backend,
            &[m, m],
            &[[0, 1], [2, 3]],
            &[[1, 1], [1, 1]],
            ViewShape::new(2, 2).unwrap(),
            TagSet::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_staging_shape_and_tags() {
        let backend = CpuBackend::new();
        let m = pattern_matrix(&backend, 4, 6);
        let mv = make_mpi_view(&backend, &m);

        let staging = mv.staging();
        assert_eq!(staging.nrow(), 2);
        assert_eq!(staging.ncol(), 4);
        assert_eq!(staging.ioshape().dims(), &[2, 2, 2]);
        assert!(staging.tags().contains(Tag::Mpi));
        assert!(staging.tags().contains(Tag::Dense));
        // 交换视图与内嵌视图共享映射
        assert_eq!(mv.mapping(), mv.view().mapping());
    }

    #[test]
    fn test_pack_gathers_expected_pattern() {
        let backend = CpuBackend::new();
        let m = pattern_matrix(&backend, 4, 6);
        let mv = make_mpi_view(&backend, &m);

        mv.pack().unwrap();

        // (nvrow, nvcol, n) 布局，点编号最快: 值 = (row+r)*10 + (col+c)
        let expected = vec![
            1.0, 23.0, // r=0, c=0
            2.0, 24.0, // r=0, c=1
            11.0, 33.0, // r=1, c=0
            12.0, 34.0, // r=1, c=1
        ];
        assert_eq!(mv.get::<f64>().unwrap(), expected);
    }

    #[test]
    fn test_pack_unpack_roundtrip_is_identity() {
        let backend = CpuBackend::new();
        let m = pattern_matrix(&backend, 4, 6);
        let original = m.get::<f64>().unwrap();
        let mv = make_mpi_view(&backend, &m);

        // 纯本地打包+散布，不经过任何交换，必须逐位还原
        mv.pack().unwrap();
        mv.unpack().unwrap();
        assert_eq!(m.get::<f64>().unwrap(), original);
    }

    #[test]
    fn test_unpack_scatters_received_data() {
        let backend = CpuBackend::new();
        let m = pattern_matrix(&backend, 4, 6);
        let mv = make_mpi_view(&backend, &m);

        // 模拟接收侧: 往暂存矩阵写入新数据再散布
        let received: Vec<f64> = (0..8).map(|k| 100.0 + k as f64).collect();
        mv.set(&received).unwrap();
        mv.unpack().unwrap();

        let data = m.get::<f64>().unwrap();
        // 点 0 基位置 (0,1): staging j=0 → 100.0
        assert_eq!(data[1], 100.0);
        // 点 1 基位置 (2,3): staging j=1 → 101.0
        assert_eq!(data[2 * 6 + 3], 101.0);
        // 点 0 (r=1,c=1): j = 1*4 + 1*2 + 0 = 6 → 106.0 落在 (1,2)
        assert_eq!(data[6 + 2], 106.0);
        // 未被视图覆盖的位置保持原样
        assert_eq!(data[0], 0.0);
    }

    #[test]
    fn test_staging_reused_across_cycles() {
        let backend = CpuBackend::new();
        let m = pattern_matrix(&backend, 4, 6);
        let mv = make_mpi_view(&backend, &m);

        let extent_before = mv.staging().extent_id();
        for _ in 0..3 {
            mv.pack().unwrap();
            mv.unpack().unwrap();
        }
        assert_eq!(mv.staging().extent_id(), extent_before);
    }
}
