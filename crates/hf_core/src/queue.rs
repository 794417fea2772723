// crates/hf_core/src/queue.rs

//! 内核执行队列
//!
//! 把内核的*构造*与*执行*解耦：[`KernelUnit`] 是一次延迟的内核
//! 调用，[`KernelQueue`] 按入队顺序累积并在同步排空点统一执行。
//! 排空是调用方视角的同步点：返回时所有已入队（含本次附带）的
//! 内核都已在后端上完成。
//!
//! 状态机：**空 → 有待执行 → 空**。入队只做簿记；排空先执行
//! 既有待执行单元（按入队顺序），再执行本次提供的单元。
//! 排空后队列可复用，不保留任何状态。

use std::collections::VecDeque;
use std::fmt;

use crate::error::CoreResult;

/// 延迟的内核调用单元
///
/// 带名字的一次性操作；执行失败的错误原样上抛。
pub struct KernelUnit {
    name: &'static str,
    op: Box<dyn FnMut() -> CoreResult<()> + Send>,
}

impl KernelUnit {
    /// 创建内核单元
    pub fn new(name: &'static str, op: impl FnMut() -> CoreResult<()> + Send + 'static) -> Self {
        Self {
            name,
            op: Box::new(op),
        }
    }

    /// 内核名称
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 执行内核
    pub fn run(&mut self) -> CoreResult<()> {
        (self.op)()
    }
}

impl fmt::Debug for KernelUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelUnit").field("name", &self.name).finish()
    }
}

/// 内核队列 trait
///
/// 每个后端提供一个实现；上层数值代码只面向本 trait。
pub trait KernelQueue {
    /// 追加内核，不执行
    fn enqueue(&mut self, kernels: impl IntoIterator<Item = KernelUnit>);

    /// 同步执行：先排空既有待执行单元，再执行 `kernels`
    ///
    /// 返回时全部内核已完成；首个失败立即上抛，
    /// 无论成败，返回后队列为空。
    fn run_sync(&mut self, kernels: impl IntoIterator<Item = KernelUnit>) -> CoreResult<()>;

    /// 待执行单元数
    fn pending(&self) -> usize;

    /// 队列是否为空
    fn is_empty(&self) -> bool {
        self.pending() == 0
    }
}

/// 宿主端同步队列
///
/// CPU 参考实现：排空即在当前线程逐个执行。
#[derive(Debug, Default)]
pub struct HostQueue {
    pending: VecDeque<KernelUnit>,
}

impl HostQueue {
    /// 创建空队列
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }
}

impl KernelQueue for HostQueue {
    fn enqueue(&mut self, kernels: impl IntoIterator<Item = KernelUnit>) {
        self.pending.extend(kernels);
    }

    fn run_sync(&mut self, kernels: impl IntoIterator<Item = KernelUnit>) -> CoreResult<()> {
        tracing::debug!(pending = self.pending.len(), "同步排空内核队列");
        // drain 在提前返回时也会清空剩余单元，队列恒回到空态
        for mut kernel in self.pending.drain(..) {
            kernel.run()?;
        }
        for kernel in kernels {
            let mut kernel = kernel;
            kernel.run()?;
        }
        Ok(())
    }

    fn pending(&self) -> usize {
        self.pending.len()
    }
}
