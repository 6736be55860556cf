// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The shared dynamic cell used by polymorphic component slots.

use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// A shared, dynamically typed cell.
///
/// Polymorphic slots (fields whose value's runtime type is not fixed by the
/// declared type) hold a `SharedAny` instead of a plain value. The cell gives
/// the slot two properties a plain Rust value cannot have: observable object
/// identity (two slots can point at the *same* live object, including cycles)
/// and in-place replacement (every holder of the cell observes an update).
///
/// Cloning a `SharedAny` clones the handle, not the contents. The cell is
/// `Rc`-based and therefore single-threaded, which matches the quiescent
/// edit-time windows snapshots run in.
#[derive(Clone)]
pub struct SharedAny {
    inner: Rc<RefCell<Box<dyn Any>>>,
}

impl SharedAny {
    /// Creates a new cell owning `value`.
    pub fn new<T: 'static>(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Box::new(value))),
        }
    }

    /// Creates a new cell from an already-boxed value.
    pub fn from_box(value: Box<dyn Any>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
        }
    }

    /// A stable identity key for the live object behind this cell.
    ///
    /// Two handles return the same key iff they refer to the same cell. The
    /// key is only meaningful while at least one handle is alive.
    pub fn key(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    /// Returns `true` if both handles refer to the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// The `TypeId` of the value currently stored in the cell.
    pub fn type_id_of(&self) -> TypeId {
        let guard = self.inner.borrow();
        (**guard).type_id()
    }

    /// Immutably borrows the boxed contents.
    pub fn borrow(&self) -> Ref<'_, Box<dyn Any>> {
        self.inner.borrow()
    }

    /// Mutably borrows the boxed contents.
    pub fn borrow_mut(&self) -> RefMut<'_, Box<dyn Any>> {
        self.inner.borrow_mut()
    }

    /// Replaces the contents of the cell, returning the previous value.
    ///
    /// Every other handle to this cell observes the new value.
    pub fn replace(&self, value: Box<dyn Any>) -> Box<dyn Any> {
        self.inner.replace(value)
    }

    /// Clones the current contents out of the cell if they are a `T`.
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.inner.borrow().downcast_ref::<T>().cloned()
    }
}

impl Default for SharedAny {
    /// An empty cell (contains the unit value).
    fn default() -> Self {
        Self::new(())
    }
}

impl PartialEq for SharedAny {
    /// Identity comparison; contents are never inspected.
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for SharedAny {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedAny({:#x})", self.key())
    }
}
