//! The address stack: nested groups and arrays that prefix every key.

use std::fmt;

use strata_core_store::key::{join, normalize, validate_name};
use strata_core_store::KeyError;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Group,
    Array,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Group => write!(f, "group"),
            FrameKind::Array => write!(f, "array"),
        }
    }
}

/// How many elements a write array has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArraySize {
    /// Size given up front.
    Known(usize),
    /// Size is the highest index touched before the array is left.
    AutoGrow,
}

/// One level of the address stack.
#[derive(Debug, Clone)]
pub struct GroupFrame {
    name: String,
    kind: FrameKind,
    /// 1-based element index, once set.
    index: Option<usize>,
    size: ArraySize,
    max_index: usize,
    writing: bool,
}

impl GroupFrame {
    fn group(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FrameKind::Group,
            index: None,
            size: ArraySize::Known(0),
            max_index: 0,
            writing: false,
        }
    }

    fn array(name: &str, size: ArraySize, writing: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: FrameKind::Array,
            index: None,
            size,
            max_index: 0,
            writing,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn is_write_array(&self) -> bool {
        self.kind == FrameKind::Array && self.writing
    }

    /// Size to record under `<name>/size` when a write array is left.
    pub fn final_size(&self) -> Option<usize> {
        match (self.is_write_array(), self.size) {
            (false, _) => None,
            (true, ArraySize::Known(n)) => Some(n),
            (true, ArraySize::AutoGrow) if self.max_index > 0 => Some(self.max_index),
            (true, ArraySize::AutoGrow) => None,
        }
    }

    fn path(&self) -> String {
        match self.index {
            Some(i) => format!("{}/{}", self.name, i),
            None => self.name.clone(),
        }
    }
}

/// The caller's current group/array nesting.
#[derive(Debug, Clone, Default)]
pub struct AddressStack {
    frames: Vec<GroupFrame>,
}

impl AddressStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn enter_group(&mut self, name: &str) -> Result<(), Error> {
        validate_name(name)?;
        self.frames.push(GroupFrame::group(name));
        Ok(())
    }

    pub fn leave_group(&mut self) -> Result<GroupFrame, Error> {
        self.pop(FrameKind::Group)
    }

    /// Push an array frame.
    ///
    /// Nesting an array directly inside an array that has no current index
    /// is rejected: the inner array would have nowhere to live.
    pub fn enter_array(&mut self, name: &str, size: ArraySize, writing: bool) -> Result<(), Error> {
        validate_name(name)?;
        if let Some(top) = self.frames.last() {
            if top.kind == FrameKind::Array && top.index.is_none() {
                return Err(Error::ArrayIndexUnset {
                    name: top.name.clone(),
                });
            }
        }
        self.frames.push(GroupFrame::array(name, size, writing));
        Ok(())
    }

    pub fn leave_array(&mut self) -> Result<GroupFrame, Error> {
        self.pop(FrameKind::Array)
    }

    /// Point the innermost array at element `i` (0-based).
    pub fn set_array_index(&mut self, i: usize) -> Result<(), Error> {
        let top = self
            .frames
            .last_mut()
            .filter(|f| f.kind == FrameKind::Array)
            .ok_or(Error::NotInArray)?;
        let index = i + 1;
        top.index = Some(index);
        if top.size == ArraySize::AutoGrow && index > top.max_index {
            top.max_index = index;
        }
        Ok(())
    }

    /// The '/'-joined path of every frame.
    pub fn current_prefix(&self) -> String {
        self.frames
            .iter()
            .map(GroupFrame::path)
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Turn a caller-relative key into a full normalized key path.
    ///
    /// An empty relative key addresses the current group itself, which is
    /// only valid when the stack is not empty.
    pub fn resolve(&self, relative: &str) -> Result<String, KeyError> {
        let full = join(&self.current_prefix(), &normalize(relative));
        if full.is_empty() {
            Err(KeyError::Empty)
        } else {
            Ok(full)
        }
    }

    fn pop(&mut self, expected: FrameKind) -> Result<GroupFrame, Error> {
        match self.frames.last() {
            None => Err(Error::EmptyStack { expected }),
            Some(top) if top.kind != expected => Err(Error::FrameMismatch {
                expected,
                found: top.kind,
                name: top.name.clone(),
            }),
            Some(_) => self.frames.pop().ok_or(Error::EmptyStack { expected }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_build_prefix() {
        let mut stack = AddressStack::new();
        stack.enter_group("a").unwrap();
        stack.enter_group("b").unwrap();
        assert_eq!(stack.current_prefix(), "a/b");
        assert_eq!(stack.resolve("c").unwrap(), "a/b/c");
        assert_eq!(stack.resolve("/c//d/").unwrap(), "a/b/c/d");
        stack.leave_group().unwrap();
        stack.leave_group().unwrap();
        assert_eq!(stack.current_prefix(), "");
        assert!(stack.is_empty());
    }

    #[test]
    fn array_index_is_one_based() {
        let mut stack = AddressStack::new();
        stack.enter_array("items", ArraySize::Known(3), true).unwrap();
        assert_eq!(stack.current_prefix(), "items");
        stack.set_array_index(0).unwrap();
        assert_eq!(stack.resolve("name").unwrap(), "items/1/name");
        stack.set_array_index(2).unwrap();
        assert_eq!(stack.current_prefix(), "items/3");
    }

    #[test]
    fn auto_grow_tracks_max_index() {
        let mut stack = AddressStack::new();
        stack.enter_array("items", ArraySize::AutoGrow, true).unwrap();
        stack.set_array_index(4).unwrap();
        stack.set_array_index(1).unwrap();
        let frame = stack.leave_array().unwrap();
        assert_eq!(frame.final_size(), Some(5));
    }

    #[test]
    fn untouched_auto_grow_records_nothing() {
        let mut stack = AddressStack::new();
        stack.enter_array("items", ArraySize::AutoGrow, true).unwrap();
        assert_eq!(stack.leave_array().unwrap().final_size(), None);
    }

    #[test]
    fn known_size_is_kept() {
        let mut stack = AddressStack::new();
        stack.enter_array("items", ArraySize::Known(2), true).unwrap();
        stack.set_array_index(7).unwrap();
        assert_eq!(stack.leave_array().unwrap().final_size(), Some(2));
    }

    #[test]
    fn read_arrays_record_no_size() {
        let mut stack = AddressStack::new();
        stack.enter_array("items", ArraySize::Known(2), false).unwrap();
        assert_eq!(stack.leave_array().unwrap().final_size(), None);
    }

    #[test]
    fn leave_is_checked() {
        let mut stack = AddressStack::new();
        assert!(matches!(
            stack.leave_group(),
            Err(Error::EmptyStack {
                expected: FrameKind::Group
            })
        ));

        stack.enter_group("g").unwrap();
        assert!(matches!(
            stack.leave_array(),
            Err(Error::FrameMismatch {
                expected: FrameKind::Array,
                found: FrameKind::Group,
                ..
            })
        ));
        assert_eq!(stack.current_prefix(), "g");
    }

    #[test]
    fn names_must_be_single_segments() {
        let mut stack = AddressStack::new();
        assert!(stack.enter_group("a/b").is_err());
        assert!(stack.enter_group("").is_err());
        assert!(stack.enter_array("x/y", ArraySize::AutoGrow, true).is_err());
        assert!(stack.is_empty());
    }

    #[test]
    fn nested_array_needs_outer_index() {
        let mut stack = AddressStack::new();
        stack.enter_array("outer", ArraySize::AutoGrow, true).unwrap();
        assert!(matches!(
            stack.enter_array("inner", ArraySize::AutoGrow, true),
            Err(Error::ArrayIndexUnset { .. })
        ));
        stack.set_array_index(0).unwrap();
        stack.enter_array("inner", ArraySize::AutoGrow, true).unwrap();
        stack.set_array_index(1).unwrap();
        assert_eq!(stack.current_prefix(), "outer/1/inner/2");
    }

    #[test]
    fn set_index_outside_array_fails() {
        let mut stack = AddressStack::new();
        assert!(matches!(stack.set_array_index(0), Err(Error::NotInArray)));
        stack.enter_group("g").unwrap();
        assert!(matches!(stack.set_array_index(0), Err(Error::NotInArray)));
    }

    #[test]
    fn empty_key_at_root_rejected() {
        let mut stack = AddressStack::new();
        assert_eq!(stack.resolve(""), Err(KeyError::Empty));
        stack.enter_group("g").unwrap();
        assert_eq!(stack.resolve("").unwrap(), "g");
    }
}
