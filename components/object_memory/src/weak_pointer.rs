//! Weak references with death callbacks.

use crate::object::HeapObject;
use crate::space::Reclaimed;
use crate::visitor::PointerVisitor;
use std::fmt;

/// Called with the object once it is found dead.
pub type WeakCallback = Box<dyn FnOnce(HeapObject) + Send>;

/// An object the heap watches without keeping it alive.
pub struct WeakPointer {
    object: HeapObject,
    callback: WeakCallback,
}

impl WeakPointer {
    pub fn object(&self) -> HeapObject {
        self.object
    }
}

impl fmt::Debug for WeakPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakPointer")
            .field("object", &self.object)
            .finish_non_exhaustive()
    }
}

/// The weak pointers registered with a heap.
#[derive(Debug, Default)]
pub struct WeakPointerList {
    entries: Vec<WeakPointer>,
}

impl WeakPointerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, object: HeapObject, callback: F)
    where
        F: FnOnce(HeapObject) + Send + 'static,
    {
        self.entries.push(WeakPointer {
            object,
            callback: Box::new(callback),
        });
    }

    /// Drops the registration for `object` without calling back.
    pub fn remove(&mut self, object: HeapObject) -> bool {
        match self.entries.iter().position(|weak| weak.object == object) {
            Some(index) => {
                self.entries.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Settles every registration for an object in the just collected
    /// `space`: survivors follow their object to its new location, the dead
    /// are called back and dropped.
    pub fn process<R: Reclaimed + ?Sized>(&mut self, space: &R) {
        let mut fired = 0;
        for mut weak in std::mem::take(&mut self.entries) {
            if !space.includes(weak.object.address()) {
                self.entries.push(weak);
            } else if space.is_alive(weak.object) {
                weak.object = space.new_location(weak.object);
                self.entries.push(weak);
            } else {
                fired += 1;
                (weak.callback)(weak.object);
            }
        }
        if fired > 0 {
            tracing::debug!(fired, remaining = self.entries.len(), "weak callbacks");
        }
    }

    /// Calls back and drops every registration.
    pub fn force_callbacks(&mut self) {
        for weak in self.entries.drain(..) {
            (weak.callback)(weak.object);
        }
    }

    /// Visits the registered objects as ordinary references.
    pub fn visit(&mut self, visitor: &mut dyn PointerVisitor) {
        for weak in &mut self.entries {
            let mut slot = [weak.object.as_object()];
            visitor.visit_slice(&mut slot);
            weak.object = HeapObject::cast(slot[0]);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeakPointer> {
        self.entries.iter()
    }
}
