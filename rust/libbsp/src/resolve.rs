//! Offset and index validation shared by both layouts.
//!
//! The console layout stores absolute byte offsets which are turned into
//! indices once at load time; the PC layout stores indices which are range
//! checked the same way. Nothing past this module sees a raw offset.

use crate::error::{BspError, BspResult, DanglingReason};
use crate::lump::{LumpEntry, LumpKind};
use crate::types::{ChildRef, LeafIndex, NodeIndex, NO_REFERENCE};

/// The address range of one record array inside a console image.
#[derive(Debug, Clone, Copy)]
pub struct LumpRange {
    pub lump: LumpKind,
    pub base: u32,
    pub element_size: u32,
    pub count: usize,
}

impl LumpRange {
    pub fn new(lump: LumpKind, entry: LumpEntry, element_size: usize, count: usize) -> LumpRange {
        LumpRange {
            lump,
            base: entry.offset,
            element_size: element_size as u32,
            count,
        }
    }

    /// A raw byte lump, addressed per byte.
    pub fn bytes(lump: LumpKind, entry: LumpEntry) -> LumpRange {
        LumpRange {
            lump,
            base: entry.offset,
            element_size: 1,
            count: entry.length as usize,
        }
    }

    fn element(&self, from: LumpKind, offset: u32) -> BspResult<usize> {
        if offset < self.base {
            return Err(BspError::dangling(
                from,
                self.lump,
                offset as i64,
                DanglingReason::BeforeBase,
            ));
        }
        let delta = offset - self.base;
        if delta % self.element_size != 0 {
            return Err(BspError::dangling(
                from,
                self.lump,
                offset as i64,
                DanglingReason::Misaligned {
                    element_size: self.element_size,
                },
            ));
        }
        Ok((delta / self.element_size) as usize)
    }

    pub fn resolve(&self, from: LumpKind, offset: u32) -> BspResult<usize> {
        let index = self.element(from, offset)?;
        if index >= self.count {
            return Err(BspError::dangling(
                from,
                self.lump,
                offset as i64,
                DanglingReason::PastEnd { count: self.count },
            ));
        }
        Ok(index)
    }

    pub fn resolve_optional(&self, from: LumpKind, offset: u32) -> BspResult<Option<usize>> {
        if offset == NO_REFERENCE {
            return Ok(None);
        }
        self.resolve(from, offset).map(Some)
    }

    /// Resolves the start of a `length`-element run. An empty run may point
    /// one past the last element.
    pub fn resolve_range_start(
        &self,
        from: LumpKind,
        offset: u32,
        length: usize,
    ) -> BspResult<usize> {
        let index = self.element(from, offset)?;
        if index + length > self.count {
            return Err(BspError::dangling(
                from,
                self.lump,
                offset as i64,
                DanglingReason::PastEnd { count: self.count },
            ));
        }
        Ok(index)
    }

    pub fn contains(&self, offset: u32) -> bool {
        let end = self.base as u64 + self.count as u64 * self.element_size as u64;
        offset >= self.base && (offset as u64) < end
    }

    pub fn offset_of(&self, index: usize) -> u32 {
        self.base + index as u32 * self.element_size
    }

    pub fn offset_of_optional(&self, index: Option<usize>) -> u32 {
        index.map_or(NO_REFERENCE, |index| self.offset_of(index))
    }
}

/// Node and leaf address ranges, used to tell console node children apart.
#[derive(Debug, Clone, Copy)]
pub struct ChildRanges {
    pub nodes: LumpRange,
    pub leafs: LumpRange,
}

impl ChildRanges {
    pub fn resolve(&self, from: LumpKind, value: i32) -> BspResult<ChildRef> {
        let offset = value as u32;
        if value >= 0 && self.leafs.contains(offset) {
            return Ok(ChildRef::Leaf(LeafIndex::new(self.leafs.resolve(from, offset)?)));
        }
        if value >= 0 && self.nodes.contains(offset) {
            return Ok(ChildRef::Node(NodeIndex::new(self.nodes.resolve(from, offset)?)));
        }
        Err(BspError::dangling(
            from,
            LumpKind::Nodes,
            value as i64,
            DanglingReason::OutsideChildRanges,
        ))
    }

    pub fn offset_of(&self, child: ChildRef) -> i32 {
        match child {
            ChildRef::Node(node) => self.nodes.offset_of(node.index()) as i32,
            ChildRef::Leaf(leaf) => self.leafs.offset_of(leaf.index()) as i32,
        }
    }
}

impl ChildRef {
    /// Decodes a PC child, where leaf `i` is stored as `-1 - i`.
    pub fn from_pc(value: i16, nodes: usize, leafs: usize) -> BspResult<ChildRef> {
        if value >= 0 {
            let index = check_index(LumpKind::Nodes, LumpKind::Nodes, value as i64, nodes)?;
            Ok(ChildRef::Node(NodeIndex::new(index)))
        } else {
            let leaf = -1 - value as i64;
            let index = check_index(LumpKind::Nodes, LumpKind::Leafs, leaf, leafs)?;
            Ok(ChildRef::Leaf(LeafIndex::new(index)))
        }
    }

    pub fn to_pc(self) -> BspResult<i16> {
        match self {
            ChildRef::Node(node) if node.index() <= i16::MAX as usize => Ok(node.index() as i16),
            ChildRef::Leaf(leaf) if leaf.index() <= i16::MAX as usize => {
                Ok((-1 - leaf.index() as i32) as i16)
            }
            ChildRef::Node(node) => Err(BspError::CapacityExceeded {
                what: "node children",
                needed: node.index() + 1,
                limit: i16::MAX as usize + 1,
            }),
            ChildRef::Leaf(leaf) => Err(BspError::CapacityExceeded {
                what: "leaf children",
                needed: leaf.index() + 1,
                limit: i16::MAX as usize + 1,
            }),
        }
    }
}

/// Checks an index field against the element count of its target.
pub fn check_index(from: LumpKind, to: LumpKind, index: i64, count: usize) -> BspResult<usize> {
    if index < 0 {
        return Err(BspError::dangling(from, to, index, DanglingReason::Negative));
    }
    if index as u64 >= count as u64 {
        return Err(BspError::dangling(
            from,
            to,
            index,
            DanglingReason::PastEnd { count },
        ));
    }
    Ok(index as usize)
}

/// Checks a `first..first + length` run. Empty runs may start at `count`.
pub fn check_range(
    from: LumpKind,
    to: LumpKind,
    first: i64,
    length: i64,
    count: usize,
) -> BspResult<usize> {
    if first < 0 || length < 0 {
        return Err(BspError::dangling(
            from,
            to,
            first.min(length),
            DanglingReason::Negative,
        ));
    }
    if first as u64 + length as u64 > count as u64 {
        return Err(BspError::dangling(
            from,
            to,
            first,
            DanglingReason::PastEnd { count },
        ));
    }
    Ok(first as usize)
}

/// A signed offset field where `-1` means none.
pub fn check_optional_offset(
    from: LumpKind,
    to: LumpKind,
    value: i32,
    count: usize,
) -> BspResult<Option<u32>> {
    if value == -1 {
        return Ok(None);
    }
    check_index(from, to, value as i64, count).map(|index| Some(index as u32))
}
