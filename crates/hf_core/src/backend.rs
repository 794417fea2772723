// crates/hf_core/src/backend.rs

//! 计算后端抽象
//!
//! [`Backend`] 是本层与具体设备实现之间的唯一接缝：后端负责分配
//! 基础分配区、规定对齐粒度，并可用设备内核覆盖默认的宿主端
//! 打包/散布路径。所有方法使用 `&self` 实例方法，以支持 GPU 后端
//! 持有设备句柄和流。
//!
//! # 设计原则
//!
//! 1. **实例身份**: 每个后端实例有唯一 id，对象归属校验据此进行
//! 2. **零开销 CPU**: [`CpuBackend`] 状态极小，克隆即共享句柄
//! 3. **显式句柄**: 矩阵/视图在构造时接收后端句柄并持有其克隆，
//!    后端的生命周期必须覆盖其产物
//!
//! # 示例
//!
//! ```
//! use hf_core::backend::{Backend, CpuBackend};
//!
//! let backend = CpuBackend::new();
//! let extent = backend.alloc_extent(256).unwrap();
//! backend.synchronize();
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::exchange::{host_pack, host_unpack};
use crate::extent::{DeviceExtent, ExtentId};
use crate::matrix::Matrix;
use crate::view::View;

/// 计算后端 trait
///
/// 本层消费的后端能力面：分配区工厂、对齐约定、同步点、
/// 以及可覆盖的视图打包/散布内核。
pub trait Backend: Clone + Send + Sync + fmt::Debug + 'static {
    /// 基础分配区类型
    type Extent: DeviceExtent;

    /// 后端名称
    fn name(&self) -> &'static str;

    /// 后端实例标识
    ///
    /// 同类型的两个后端实例 id 不同；矩阵归属校验以 id 为准。
    fn instance_id(&self) -> u64;

    /// 行对齐粒度（字节）
    ///
    /// 矩阵的 `leaddim` 被填充到该边界。必须是 2 的幂且不小于 8，
    /// 以整除所有受支持的元素大小。
    fn alignment(&self) -> usize;

    /// 分配基础分配区
    ///
    /// 容量不足时返回 [`CoreError::Allocation`]，本层原样透传。
    fn alloc_extent(&self, nbytes: usize) -> CoreResult<Self::Extent>;

    /// 同步操作（GPU 需要等待流完成，CPU 空实现）
    fn synchronize(&self) {}

    /// 将视图内容聚集到暂存矩阵
    ///
    /// 默认实现走宿主端路径；设备后端可用打包内核覆盖。
    fn pack_view(&self, view: &View<Self>, dst: &Matrix<Self>) -> CoreResult<()> {
        host_pack(view, dst)
    }

    /// 将暂存矩阵内容散布回视图指向的位置
    ///
    /// 默认实现走宿主端路径；设备后端可用散布内核覆盖。
    fn unpack_view(&self, view: &View<Self>, src: &Matrix<Self>) -> CoreResult<()> {
        host_unpack(view, src)
    }
}

// ============================================================================
// id 分配
// ============================================================================

static NEXT_BACKEND_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_EXTENT_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// CPU 后端
// ============================================================================

/// CPU 参考后端
///
/// 分配区是宿主内存，克隆共享实例身份与容量账本。
/// 默认 64 字节对齐（缓存行 / AVX-512）。
#[derive(Debug, Clone)]
pub struct CpuBackend {
    instance: u64,
    alignment: usize,
    max_bytes: Option<usize>,
    allocated: Arc<AtomicUsize>,
}

impl CpuBackend {
    /// 默认对齐（字节）
    pub const DEFAULT_ALIGNMENT: usize = 64;

    /// 创建 CPU 后端实例（64 字节对齐，无容量上限）
    pub fn new() -> Self {
        Self {
            instance: NEXT_BACKEND_ID.fetch_add(1, Ordering::Relaxed),
            alignment: Self::DEFAULT_ALIGNMENT,
            max_bytes: None,
            allocated: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// 创建指定对齐的 CPU 后端实例
    ///
    /// `alignment` 必须是 2 的幂且不小于 8。
    pub fn with_alignment(alignment: usize) -> CoreResult<Self> {
        if alignment < 8 || !alignment.is_power_of_two() {
            return Err(CoreError::backend_config(format!(
                "对齐 {} 无效: 必须是 2 的幂且不小于 8",
                alignment
            )));
        }
        let mut backend = Self::new();
        backend.alignment = alignment;
        Ok(backend)
    }

    /// 设置容量上限（字节）
    ///
    /// 超出上限的分配返回 [`CoreError::Allocation`]。
    #[must_use]
    pub fn with_capacity_limit(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// 已分配字节数
    pub fn allocated_bytes(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for CpuBackend {
    type Extent = HostExtent;

    fn name(&self) -> &'static str {
        "cpu"
    }

    fn instance_id(&self) -> u64 {
        self.instance
    }

    fn alignment(&self) -> usize {
        self.alignment
    }

    fn alloc_extent(&self, nbytes: usize) -> CoreResult<HostExtent> {
        if let Some(max) = self.max_bytes {
            let used = self.allocated.load(Ordering::Relaxed);
            if used + nbytes > max {
                return Err(CoreError::allocation(
                    nbytes,
                    format!("超出容量上限 {} 字节（已用 {}）", max, used),
                ));
            }
        }
        self.allocated.fetch_add(nbytes, Ordering::Relaxed);

        let id = NEXT_EXTENT_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(extent = id, nbytes, backend = self.instance, "分配基础分配区");
        Ok(HostExtent {
            id,
            bytes: Arc::new(RwLock::new(vec![0u8; nbytes])),
        })
    }
}

// ============================================================================
// 宿主分配区
// ============================================================================

/// 宿主内存分配区
///
/// 克隆共享同一底层缓冲；读写通过 `RwLock` 保护，
/// 但对重叠区间的并发写仍需调用方串行化。
#[derive(Clone)]
pub struct HostExtent {
    id: ExtentId,
    bytes: Arc<RwLock<Vec<u8>>>,
}

impl DeviceExtent for HostExtent {
    fn id(&self) -> ExtentId {
        self.id
    }

    fn len_bytes(&self) -> usize {
        self.bytes.read().len()
    }

    fn upload(&self, byte_offset: usize, src: &[u8]) -> CoreResult<()> {
        let mut bytes = self.bytes.write();
        let end = byte_offset
            .checked_add(src.len())
            .filter(|&e| e <= bytes.len())
            .ok_or(CoreError::ExtentOutOfBounds {
                offset: byte_offset,
                len: src.len(),
                extent_len: bytes.len(),
            })?;
        bytes[byte_offset..end].copy_from_slice(src);
        Ok(())
    }

    fn download(&self, byte_offset: usize, dst: &mut [u8]) -> CoreResult<()> {
        let bytes = self.bytes.read();
        let end = byte_offset
            .checked_add(dst.len())
            .filter(|&e| e <= bytes.len())
            .ok_or(CoreError::ExtentOutOfBounds {
                offset: byte_offset,
                len: dst.len(),
                extent_len: bytes.len(),
            })?;
        dst.copy_from_slice(&bytes[byte_offset..end]);
        Ok(())
    }
}

// Debug 输出只含 id 和长度，不倾倒内容
impl fmt::Debug for HostExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostExtent")
            .field("id", &self.id)
            .field("len_bytes", &self.bytes.read().len())
            .finish()
    }
}
