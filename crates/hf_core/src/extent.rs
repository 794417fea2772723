// crates/hf_core/src/extent.rs

//! 基础分配区抽象
//!
//! [`DeviceExtent`] 是后端分配的一段连续设备内存。多个矩阵可以按
//! 字节偏移共存于同一分配区；视图的间接寻址正是相对于分配区基址
//! 计算位移的，因此"同一分配区"是视图构造的前置条件之一。
//!
//! 本层只通过字节级 `upload`/`download` 与分配区交互，
//! 设备侧的实际搬运方式由后端决定。

use crate::error::CoreResult;

/// 分配区标识
///
/// 进程内唯一的不透明 id，用于"同一基础分配区"判定。
pub type ExtentId = u64;

/// 设备分配区 trait
///
/// 句柄语义：克隆共享同一底层内存。写入方的串行化由调用方负责
/// （见并发模型约定），本 trait 不提供排他保证。
pub trait DeviceExtent: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// 分配区标识
    fn id(&self) -> ExtentId;

    /// 分配区字节长度
    fn len_bytes(&self) -> usize;

    /// 从宿主缓冲写入分配区
    ///
    /// 越界访问返回 [`crate::error::CoreError::ExtentOutOfBounds`]。
    fn upload(&self, byte_offset: usize, src: &[u8]) -> CoreResult<()>;

    /// 从分配区读出到宿主缓冲
    ///
    /// 读出长度由 `dst.len()` 决定；越界访问返回
    /// [`crate::error::CoreError::ExtentOutOfBounds`]。
    fn download(&self, byte_offset: usize, dst: &mut [u8]) -> CoreResult<()>;
}
