use std::{cell::RefCell, fmt, rc::Rc};

use crate::Resource;

/// Owns the set of live savestate slots for a single [`Resource`] instance.
///
/// One `SlotManager` per `Resource`; not shared across threads (each worker in the
/// explorer owns its own `Resource` + `SlotManager` pair).
pub struct SlotManager<R: Resource> {
    resource: Rc<RefCell<R>>,
}

impl<R: Resource> SlotManager<R> {
    /// Wrap a resource in a slot manager.
    pub fn new(resource: Rc<RefCell<R>>) -> Self {
        Self { resource }
    }

    /// Access the underlying resource.
    pub fn resource(&self) -> &Rc<RefCell<R>> {
        &self.resource
    }

    /// Create a savestate at the resource's current frame and return an owning handle.
    ///
    /// Dropping the returned handle erases the slot.
    pub fn save(&self) -> Result<SlotHandle<R>, R::Error> {
        let id = self.resource.borrow_mut().save()?;
        Ok(SlotHandle {
            resource: Rc::clone(&self.resource),
            slot_id: Some(id),
        })
    }

    /// The distinguished "start" handle: refers to the pre-script state and is always
    /// valid. Does not own a slot and never erases anything on drop.
    pub fn start_handle(&self, start_id: R::SlotId) -> SlotHandle<R> {
        SlotHandle {
            resource: Rc::clone(&self.resource),
            slot_id: Some(start_id),
        }
    }

    /// Restore the resource to the state held by `handle`.
    pub fn load(&self, handle: &SlotHandle<R>) -> Result<(), R::Error> {
        let id = handle.slot_id.expect("slot handle has no backing slot");
        self.resource.borrow_mut().load(id)
    }
}

impl<R: Resource> fmt::Debug for SlotManager<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotManager").finish_non_exhaustive()
    }
}

/// Exclusive owner of one simulator savestate slot.
///
/// Dropping the handle erases the slot, unless it is the start handle (which is never
/// erased: it refers to the pre-script state and is always valid). Handles are moved,
/// never copied, when migrated between ad-hoc levels (§4.4.3).
pub struct SlotHandle<R: Resource> {
    resource: Rc<RefCell<R>>,
    slot_id: Option<R::SlotId>,
}

impl<R: Resource> SlotHandle<R> {
    /// The underlying slot id, if this handle owns a slot.
    pub fn slot_id(&self) -> Option<R::SlotId> {
        self.slot_id
    }
}

impl<R: Resource> Drop for SlotHandle<R> {
    fn drop(&mut self) {
        if let Some(id) = self.slot_id.take() {
            self.resource.borrow_mut().erase(id);
        }
    }
}

impl<R: Resource> fmt::Debug for SlotHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotHandle")
            .field("slot_id", &self.slot_id)
            .finish_non_exhaustive()
    }
}
