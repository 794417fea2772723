// crates/hf_core/src/lib.rs

//! HyperFlow 数据布局核心层 (Layer 2)
//!
//! 设备无关的数据布局抽象，高阶非结构网格求解器多后端执行层的
//! 地基：数值内核看到统一的逻辑形状与能力面，后端决定物理布局
//! （对齐填充、分配区摆放），二者经由本层解耦。
//!
//! # 模块概览
//!
//! - [`dtype`]: 元素类型键与密封的 CoreScalar trait
//! - [`tags`]: 封闭的语义标签集
//! - [`layout`]: 逻辑形状与物理布局键
//! - [`extent`]: 基础分配区抽象
//! - [`backend`]: Backend trait 和 CpuBackend 参考实现
//! - [`matrix`]: 矩阵、只读矩阵与共享能力面 MatrixLike
//! - [`rslice`]: 矩阵行切片
//! - [`bank`]: 同构矩阵的轮换组（多级缓冲）
//! - [`view`]: 间接寻址视图（非结构耦合的聚集/散布）
//! - [`exchange`]: 跨进程交换视图与打包暂存
//! - [`queue`]: 内核队列（构造与执行解耦）
//! - [`error`]: 统一错误类型
//!
//! # 层级架构
//!
//! ```text
//! Layer 4: 应用编排     ─> 配置、进程管理（不在本 crate）
//! Layer 3: 数值内核     ─> 通量求值、时间推进（不在本 crate）
//! Layer 2: hf_core      ─> Matrix, View, Bank, Queue（本层）
//! Layer 1: 设备后端     ─> 具体分配与内核执行（外部协作方）
//! ```
//!
//! # 设计原则
//!
//! 1. **构造期校验**: 本层所有失败都是结构性契约违规，构造时检出，
//!    绝不延迟到内核执行期
//! 2. **派生不存储**: `pitch`/`layout` 等纯派生属性按需计算，杜绝脱节
//! 3. **一次映射，反复消费**: 视图在构造时算好位移数组，
//!    摊销到每次内核发射
//! 4. **显式后端句柄**: 对象持有所属后端的克隆句柄，
//!    后端生命周期必须覆盖其全部产物
//!
//! # 示例
//!
//! ```
//! use hf_core::prelude::*;
//!
//! let backend = CpuBackend::new();
//! let shape = IoShape::new(&[4, 6]).unwrap();
//! let m = Matrix::alloc(&backend, DType::F64, shape, TagSet::new()).unwrap();
//! assert_eq!(m.pitch(), m.leaddim() * 8);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod bank;
pub mod dtype;
pub mod error;
pub mod exchange;
pub mod extent;
pub mod layout;
pub mod matrix;
pub mod queue;
pub mod rslice;
pub mod tags;
pub mod view;

// 重导出核心类型
pub use backend::{Backend, CpuBackend, HostExtent};
pub use bank::MatrixBank;
pub use dtype::{CoreScalar, DType};
pub use error::{CoreError, CoreResult};
pub use exchange::MpiView;
pub use extent::{DeviceExtent, ExtentId};
pub use layout::{IoShape, LayoutTraits};
pub use matrix::{ConstMatrix, Matrix, MatrixLike};
pub use queue::{HostQueue, KernelQueue, KernelUnit};
pub use rslice::MatrixRSlice;
pub use tags::{Tag, TagSet};
pub use view::{View, ViewLike, ViewShape};

/// Prelude 模块
pub mod prelude {
    //! 常用类型预导入
    pub use crate::backend::{Backend, CpuBackend};
    pub use crate::bank::MatrixBank;
    pub use crate::dtype::{CoreScalar, DType};
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::exchange::MpiView;
    pub use crate::extent::DeviceExtent;
    pub use crate::layout::IoShape;
    pub use crate::matrix::{ConstMatrix, Matrix, MatrixLike};
    pub use crate::queue::{HostQueue, KernelQueue, KernelUnit};
    pub use crate::tags::{Tag, TagSet};
    pub use crate::view::{View, ViewLike, ViewShape};
}
