// crates/hf_core/src/view.rs

//! 间接寻址视图
//!
//! 非结构网格的单元在共享界面处耦合时，内核需要从多个矩阵的
//! 零散位置聚集数据。[`View`] 把平坦的点编号空间一次性映射为
//! 相对基础分配区基址的元素位移数组，之后每次内核发射都直接
//! 消费该数组，构造成本被全部后续发射摊销。
//!
//! 每个点可以携带 `nvrow x nvcol` 个元素（逻辑每点形状分解为
//! 行重数与列重数）；重数为 1 的方向不生成跨度数组。
//!
//! # 位移公式
//!
//! 对点 `i`（所在矩阵 `m`，行列下标 `(r, c)`）：
//!
//! ```text
//! mapping[i]  = m.offset + r * m.leaddim + c        （元素单位）
//! rstrides[i] = stridemap[i][0] * m.leaddim          （仅 nvrow > 1）
//! cstrides[i] = stridemap[i][1]                      （仅 nvcol > 1）
//! ```
//!
//! # 构造期校验
//!
//! 引用的矩阵必须同后端实例、同基础分配区、同元素类型；
//! 每个点经由跨度可达的全部位移必须落在分配区内。
//! 全部校验只在构造时进行一次，访问路径上不再重复。
//! 视图构造后不可变，重建即新建。

use std::sync::Arc;

use crate::backend::Backend;
use crate::dtype::DType;
use crate::error::{CoreError, CoreResult};
use crate::extent::DeviceExtent;
use crate::matrix::{Matrix, MatrixLike};
use crate::tags::TagSet;

/// 每点逻辑形状（行重数 x 列重数）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewShape {
    nvrow: usize,
    nvcol: usize,
}

impl ViewShape {
    /// 创建每点形状，两个重数都必须为正
    pub fn new(nvrow: usize, nvcol: usize) -> CoreResult<Self> {
        if nvrow == 0 || nvcol == 0 {
            return Err(CoreError::invalid_shape(format!(
                "每点形状 ({}, {}) 含零重数",
                nvrow, nvcol
            )));
        }
        Ok(Self { nvrow, nvcol })
    }

    /// 行重数
    #[inline]
    pub fn nvrow(self) -> usize {
        self.nvrow
    }

    /// 列重数
    #[inline]
    pub fn nvcol(self) -> usize {
        self.nvcol
    }
}

impl Default for ViewShape {
    /// 标量视图：每点一个元素
    fn default() -> Self {
        Self { nvrow: 1, nvcol: 1 }
    }
}

/// 视图能力面
///
/// 内核消费的只读视角：点数、每点重数与预计算的位移/跨度数组。
pub trait ViewLike {
    /// 点数
    fn n(&self) -> usize;
    /// 行重数
    fn nvrow(&self) -> usize;
    /// 列重数
    fn nvcol(&self) -> usize;
    /// 元素类型
    fn dtype(&self) -> DType;
    /// 每点基位移（元素单位，相对分配区基址）
    fn mapping(&self) -> &[i32];
    /// 每点行跨度；`None` 当且仅当 `nvrow == 1`（此时行下标恒为 0）
    fn rstrides(&self) -> Option<&[i32]>;
    /// 每点列跨度；`None` 当且仅当 `nvcol == 1`（此时列下标恒为 0）
    fn cstrides(&self) -> Option<&[i32]>;
    /// 语义标签
    fn tags(&self) -> TagSet;
}

/// 间接寻址视图
///
/// 映射数组放在 `Arc` 中，克隆视图即共享映射，
/// 内核闭包可以低成本地携带自己的副本。
#[derive(Debug, Clone)]
pub struct View<B: Backend> {
    backend: B,
    n: usize,
    nvrow: usize,
    nvcol: usize,
    dtype: DType,
    extent: B::Extent,
    mapping: Arc<[i32]>,
    rstrides: Option<Arc<[i32]>>,
    cstrides: Option<Arc<[i32]>>,
    tags: TagSet,
}

impl<B: Backend> View<B> {
    /// 构造视图
    ///
    /// - `matmap[i]`: 点 `i` 所在的矩阵
    /// - `rcmap[i]`: 点 `i` 在该矩阵内的 `(行, 列)` 下标
    /// - `stridemap[i]`: 点 `i` 的 `(行, 列)` 跨度描述
    ///   （行跨度以行为单位，乘 `leaddim` 后存入；列跨度以元素为单位）
    /// - `vshape`: 每点逻辑形状
    pub fn new(
        backend: &B,
        matmap: &[&Matrix<B>],
        rcmap: &[[i32; 2]],
        stridemap: &[[i32; 2]],
        vshape: ViewShape,
        tags: TagSet,
    ) -> CoreResult<Self> {
        let n = matmap.len();
        if n == 0 {
            return Err(CoreError::invalid_shape("视图的矩阵映射不能为空"));
        }
        CoreError::check_size("行列映射", n, rcmap.len())?;
        CoreError::check_size("跨度映射", n, stridemap.len())?;

        // 结构校验：后端归属 → 分配区 → 元素类型
        if matmap
            .iter()
            .any(|m| m.backend().instance_id() != backend.instance_id())
        {
            return Err(CoreError::BackendMismatch);
        }
        let extent = matmap[0].extent().clone();
        if matmap[1..].iter().any(|m| m.extent_id() != extent.id()) {
            return Err(CoreError::ExtentMismatch);
        }
        let dtype = matmap[0].dtype();
        for m in &matmap[1..] {
            CoreError::check_dtype(dtype, m.dtype())?;
        }

        let nvrow = vshape.nvrow();
        let nvcol = vshape.nvcol();
        let extent_elems = (extent.len_bytes() / dtype.itemsize()) as i64;

        let mut mapping = Vec::with_capacity(n);
        let mut rstrides = if nvrow > 1 {
            Vec::with_capacity(n)
        } else {
            Vec::new()
        };
        let mut cstrides = if nvcol > 1 {
            Vec::with_capacity(n)
        } else {
            Vec::new()
        };

        for i in 0..n {
            let m = matmap[i];
            let [r, c] = rcmap[i];
            let [sr, sc] = stridemap[i];
            if r < 0 || c < 0 || sr < 0 || sc < 0 {
                return Err(CoreError::invalid_shape(format!(
                    "点 {} 的行列/跨度映射含负值",
                    i
                )));
            }

            let leaddim = m.leaddim() as i64;
            let disp = m.offset() as i64 + r as i64 * leaddim + c as i64;
            let rstride = sr as i64 * leaddim;
            let cstride = sc as i64;

            // 可达性：跨度张成的最远位移必须在分配区内
            let reach = disp
                + if nvrow > 1 { (nvrow as i64 - 1) * rstride } else { 0 }
                + if nvcol > 1 { (nvcol as i64 - 1) * cstride } else { 0 };
            if reach >= extent_elems {
                return Err(CoreError::ExtentOutOfBounds {
                    offset: reach as usize * dtype.itemsize(),
                    len: dtype.itemsize(),
                    extent_len: extent.len_bytes(),
                });
            }

            mapping.push(checked_i32(disp, i)?);
            if nvrow > 1 {
                rstrides.push(checked_i32(rstride, i)?);
            }
            if nvcol > 1 {
                cstrides.push(checked_i32(cstride, i)?);
            }
        }

        Ok(Self {
            backend: backend.clone(),
            n,
            nvrow,
            nvcol,
            dtype,
            extent,
            mapping: mapping.into(),
            rstrides: (nvrow > 1).then(|| rstrides.into()),
            cstrides: (nvcol > 1).then(|| cstrides.into()),
            tags,
        })
    }

    /// 所属后端句柄
    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// 指向的基础分配区
    #[inline]
    pub fn extent(&self) -> &B::Extent {
        &self.extent
    }
}

fn checked_i32(value: i64, point: usize) -> CoreResult<i32> {
    i32::try_from(value).map_err(|_| {
        CoreError::invalid_shape(format!("点 {} 的位移 {} 超出 i32 范围", point, value))
    })
}

impl<B: Backend> ViewLike for View<B> {
    fn n(&self) -> usize {
        self.n
    }

    fn nvrow(&self) -> usize {
        self.nvrow
    }

    fn nvcol(&self) -> usize {
        self.nvcol
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn mapping(&self) -> &[i32] {
        &self.mapping
    }

    fn rstrides(&self) -> Option<&[i32]> {
        self.rstrides.as_deref()
    }

    fn cstrides(&self) -> Option<&[i32]> {
        self.cstrides.as_deref()
    }

    fn tags(&self) -> TagSet {
        self.tags
    }
}
