use std::any::{Any, TypeId};
use std::fmt;

/// An opaque, polymorphic event payload.
///
/// Discriminated at runtime by the [`TypeId`] of whatever was boxed into it. An
/// `Event` is owned by whichever side currently holds it: the producer until handed
/// to a loop, the loop until delivered, then dropped. Events are never shared.
pub struct Event(Box<dyn Any + Send>);

impl Event {
    /// Boxes `payload` as a fresh event.
    pub fn new<T: Any + Send>(payload: T) -> Self {
        Event(Box::new(payload))
    }

    /// The derived type tag of the boxed payload.
    pub fn type_id(&self) -> TypeId {
        (*self.0).type_id()
    }

    /// Recovers the original payload if it was boxed as `T`, handing the event back
    /// unchanged otherwise.
    pub fn downcast<T: Any + Send>(self) -> Result<T, Event> {
        match self.0.downcast::<T>() {
            Ok(payload) => Ok(*payload),
            Err(boxed) => Err(Event(boxed)),
        }
    }

    /// Borrows the payload if it was boxed as `T`.
    pub fn downcast_ref<T: Any + Send>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event").field("type_id", &self.type_id()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_downcast() {
        let event = Event::new(42u32);
        assert_eq!(event.downcast::<u32>().unwrap(), 42);
    }

    #[test]
    fn wrong_type_hands_event_back() {
        let event = Event::new(42u32);
        let event = event.downcast::<String>().unwrap_err();
        assert_eq!(event.downcast::<u32>().unwrap(), 42);
    }
}
