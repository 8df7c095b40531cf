use std::rc::Rc;

/// A reference-counted, immutable list of events for one block.
///
/// The driver owns one of these for its whole life.  Each callback it [SharedEvents::refill]s it (which only works once
/// every payload from the previous callback is gone), then clones it into the payload.  Cloning is a counter bump;
/// refilling reuses the capacity.  As long as a block never has more events than the capacity passed to
/// [SharedEvents::with_capacity], nothing here allocates on the audio thread.
pub struct SharedEvents<T> {
    events: Rc<Vec<T>>,
}

impl<T> SharedEvents<T> {
    /// Allocate room for `capacity` events.  Not realtime-safe.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Rc::new(Vec::with_capacity(capacity)),
        }
    }

    /// Clear the list and get it for writing, if nobody else holds it.
    ///
    /// Returns `None` while any clone is alive, which for a driver means a payload from the last block leaked.
    pub fn refill(&mut self) -> Option<&mut Vec<T>> {
        let events = Rc::get_mut(&mut self.events)?;
        events.clear();
        Some(events)
    }

    /// Is anything other than this value holding the list?
    pub fn is_shared(&self) -> bool {
        Rc::strong_count(&self.events) > 1
    }
}

impl<T> Clone for SharedEvents<T> {
    fn clone(&self) -> Self {
        Self {
            events: self.events.clone(),
        }
    }
}

impl<T> std::ops::Deref for SharedEvents<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.events
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SharedEvents<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.events.iter()).finish()
    }
}
