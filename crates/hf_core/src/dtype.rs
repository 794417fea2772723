// crates/hf_core/src/dtype.rs

//! 元素类型模型
//!
//! 提供运行时元素类型键 [`DType`] 和密封的标量 trait [`CoreScalar`]。
//!
//! 矩阵的物理布局以字节寻址（不同元素类型可共存于同一分配区），
//! 因此需要一个运行时键用于同构性校验；而上层数值代码通过
//! `CoreScalar` 泛型获得编译期单态化的类型安全访问。
//!
//! # 设计原则
//!
//! 1. **密封 Trait**: 只有 f32 和 f64 可以实现（通过 private::Sealed）
//! 2. **双轨一致**: `S::DTYPE` 把编译期类型映射到运行时键，二者永不脱节
//! 3. **零成本抽象**: `#[inline]` + 编译期单态化

use std::fmt;

use bytemuck::Pod;
use num_traits::{Float, FromPrimitive, NumAssign};
use serde::{Deserialize, Serialize};

/// 运行时元素类型
///
/// 作为布局同构性检查的组成部分（见 [`crate::layout::LayoutTraits`]），
/// 也是视图构造时跨矩阵类型一致性校验的依据。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// 单精度浮点
    F32,
    /// 双精度浮点
    F64,
}

impl DType {
    /// 单个元素的字节数
    #[inline]
    pub const fn itemsize(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// 类型名称
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 密封模块，禁止外部实现
mod private {
    /// 密封 trait
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// 核心标量类型（密封，仅 f32/f64 可实现）
///
/// 上层数值代码对矩阵做宿主端读写时使用此 trait 作为泛型边界，
/// 运行时通过 `S::DTYPE` 与矩阵的 [`DType`] 做一致性校验。
pub trait CoreScalar:
    private::Sealed
    + Pod
    + Float
    + FromPrimitive
    + NumAssign
    + fmt::Debug
    + fmt::Display
    + Default
    + Send
    + Sync
    + 'static
{
    /// 对应的运行时元素类型
    const DTYPE: DType;

    /// 零值
    const ZERO: Self;
    /// 一
    const ONE: Self;
}

impl CoreScalar for f32 {
    const DTYPE: DType = DType::F32;
    const ZERO: f32 = 0.0;
    const ONE: f32 = 1.0;
}

impl CoreScalar for f64 {
    const DTYPE: DType = DType::F64;
    const ZERO: f64 = 0.0;
    const ONE: f64 = 1.0;
}
