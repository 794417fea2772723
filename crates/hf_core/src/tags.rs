// crates/hf_core/src/tags.rs

//! 语义标签
//!
//! 提供封闭的 [`Tag`] 枚举和 [`TagSet`] 位集。标签描述矩阵的语义属性，
//! 后端据此决定物理放置（如 const 数据放入只读内存）和行为
//! （如 const 矩阵拒绝写入）。
//!
//! 标签集合是封闭枚举而非自由字符串，标签驱动的行为分支因此获得
//! 编译期穷尽性检查。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 语义标签（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    /// 稠密矩阵（所有矩阵的基础标签）
    Dense,
    /// 只读矩阵，后端可放入常量内存
    Const,
    /// 行切片，共享父矩阵的物理布局
    Slice,
    /// 跨进程交换的暂存数据
    Mpi,
}

impl Tag {
    /// 全部标签，按位序排列
    pub const ALL: [Tag; 4] = [Tag::Dense, Tag::Const, Tag::Slice, Tag::Mpi];

    /// 对应的位掩码
    #[inline]
    const fn bit(self) -> u8 {
        match self {
            Tag::Dense => 1 << 0,
            Tag::Const => 1 << 1,
            Tag::Slice => 1 << 2,
            Tag::Mpi => 1 << 3,
        }
    }

    /// 标签名称
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Tag::Dense => "dense",
            Tag::Const => "const",
            Tag::Slice => "slice",
            Tag::Mpi => "mpi",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 标签位集
///
/// 小型 `Copy` 位集，支持 const 上下文中的组合：
///
/// ```
/// use hf_core::tags::{Tag, TagSet};
///
/// const CONST_DENSE: TagSet = TagSet::new().with(Tag::Const).with(Tag::Dense);
/// assert!(CONST_DENSE.contains(Tag::Const));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TagSet(u8);

impl TagSet {
    /// 空标签集
    pub const EMPTY: TagSet = TagSet(0);

    /// 创建空标签集
    #[inline]
    pub const fn new() -> Self {
        Self(0)
    }

    /// 返回添加了指定标签的新集合
    #[inline]
    #[must_use]
    pub const fn with(self, tag: Tag) -> Self {
        Self(self.0 | tag.bit())
    }

    /// 原地插入标签
    #[inline]
    pub fn insert(&mut self, tag: Tag) {
        self.0 |= tag.bit();
    }

    /// 是否包含指定标签
    #[inline]
    pub const fn contains(self, tag: Tag) -> bool {
        self.0 & tag.bit() != 0
    }

    /// 并集
    #[inline]
    #[must_use]
    pub const fn union(self, other: TagSet) -> Self {
        Self(self.0 | other.0)
    }

    /// 是否为空
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// 标签数量
    #[inline]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// 遍历包含的标签
    pub fn iter(self) -> impl Iterator<Item = Tag> {
        Tag::ALL.into_iter().filter(move |t| self.contains(*t))
    }
}

impl From<Tag> for TagSet {
    fn from(tag: Tag) -> Self {
        TagSet::new().with(tag)
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

impl fmt::Debug for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        f.write_str("{")?;
        for tag in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            f.write_str(tag.name())?;
        }
        f.write_str("}")
    }
}
