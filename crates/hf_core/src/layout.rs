// crates/hf_core/src/layout.rs

//! 逻辑形状与物理布局
//!
//! [`IoShape`] 是数值代码眼中的任意秩逻辑形状；物理上矩阵始终是
//! 二维的：`nrow = dims[0]`，`ncol = dims[1..] 的乘积`。
//! 列方向可能被后端填充到对齐边界，由此区分
//! `leaddim`（含填充的行跨度）与 `leadsubdim`（未填充的逻辑列数）。
//!
//! [`LayoutTraits`] 是同构性检查的等价键：矩阵组、视图等对布局一致性
//! 有要求的组合结构都以它为判据。它永远按需派生，不冗余存储。

use std::fmt;

use crate::dtype::DType;
use crate::error::{CoreError, CoreResult};

/// 逻辑 I/O 形状
///
/// 非空且各维均为正。秩为 1 时退化为列向量（`ncol = 1`）。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IoShape(Vec<usize>);

impl IoShape {
    /// 创建逻辑形状
    ///
    /// 空形状或含零维的形状被拒绝。
    pub fn new(dims: &[usize]) -> CoreResult<Self> {
        if dims.is_empty() {
            return Err(CoreError::invalid_shape("逻辑形状不能为空"));
        }
        if dims.iter().any(|&d| d == 0) {
            return Err(CoreError::invalid_shape(format!(
                "逻辑形状 {:?} 含零维",
                dims
            )));
        }
        Ok(Self(dims.to_vec()))
    }

    /// 内部构造，跳过校验
    ///
    /// 仅用于派生形状（如空行切片的 `(0, ncol)`），公开入口一律走 `new`。
    pub(crate) fn from_dims(dims: Vec<usize>) -> Self {
        Self(dims)
    }

    /// 各维大小
    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    /// 秩
    #[inline]
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// 物理行数
    #[inline]
    pub fn nrow(&self) -> usize {
        self.0[0]
    }

    /// 物理列数（首维之后所有维的乘积）
    #[inline]
    pub fn ncol(&self) -> usize {
        self.0[1..].iter().product()
    }

    /// 逻辑元素总数
    #[inline]
    pub fn count(&self) -> usize {
        self.nrow() * self.ncol()
    }
}

impl fmt::Display for IoShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, ")")
    }
}

/// 物理布局键
///
/// `(nrow, leaddim, leadsubdim, dtype)` 四元组，矩阵同构性的唯一判据。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutTraits {
    /// 物理行数
    pub nrow: usize,
    /// 行跨度（含对齐填充的元素数）
    pub leaddim: usize,
    /// 未填充的逻辑列数
    pub leadsubdim: usize,
    /// 元素类型
    pub dtype: DType,
}

/// 向上取整到对齐边界
///
/// `align` 必须为正。
#[inline]
pub(crate) const fn align_up(x: usize, align: usize) -> usize {
    (x + align - 1) / align * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ioshape_2d() {
        let s = IoShape::new(&[4, 6]).unwrap();
        assert_eq!(s.nrow(), 4);
        assert_eq!(s.ncol(), 6);
        assert_eq!(s.count(), 24);
        assert_eq!(s.rank(), 2);
    }

    #[test]
    fn test_ioshape_rank1() {
        let s = IoShape::new(&[5]).unwrap();
        assert_eq!(s.nrow(), 5);
        assert_eq!(s.ncol(), 1);
    }

    #[test]
    fn test_ioshape_rank3() {
        // 交换暂存矩阵的 (nvrow, nvcol, n) 形状
        let s = IoShape::new(&[2, 3, 7]).unwrap();
        assert_eq!(s.nrow(), 2);
        assert_eq!(s.ncol(), 21);
    }

    #[test]
    fn test_ioshape_invalid() {
        assert!(IoShape::new(&[]).is_err());
        assert!(IoShape::new(&[3, 0]).is_err());
    }

    #[test]
    fn test_layout_traits_equality() {
        let a = LayoutTraits {
            nrow: 4,
            leaddim: 8,
            leadsubdim: 6,
            dtype: DType::F64,
        };
        let b = LayoutTraits { nrow: 4, ..a };
        assert_eq!(a, b);
        let c = LayoutTraits {
            dtype: DType::F32,
            ..a
        };
        assert_ne!(a, c);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 8), 8);
        assert_eq!(align_up(8, 8), 8);
        assert_eq!(align_up(9, 8), 16);
    }
}
