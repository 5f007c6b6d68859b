//! Event handling.
//!
//! The emulator reports its state changes as they happen. [EventListeners](EventListener) can be
//! registered on the [Emulator](crate::emulator::Emulator) with the
//! [add_listener](crate::emulator::Emulator::add_listener) method.
//!
//! A blanket implementation of [EventListener] for all `Fn(&Event)` is provided.

use crate::instruction::Register;

/// Represents an event that occurred while executing a program.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The program modified a register.
    RegisterChange {
        /// The register which was modified.
        register: Register,

        /// The new value of the register.
        data: i32,
    },

    /// The program stored a word into memory.
    MemoryChange {
        address: i32,
        data: i32,
    },

    /// A `div` instruction had a zero divisor and was skipped.
    DivideByZero {
        /// Address of the instruction.
        pc: i32,
    },

    /// The machine executed a `halt`.
    Halt {
        /// Address of the `halt` instruction.
        pc: i32,
    },
}

/// Trait for consuming events.
pub trait EventListener {
    /// Called whenever a new event has been created.
    fn event(&mut self, event: &Event);
}

impl<F> EventListener for F where F: Fn(&Event) {
    fn event(&mut self, event: &Event) {
        self(event)
    }
}

#[derive(Default)]
pub(crate) struct EventDispatcher {
    listeners: Vec<Box<dyn EventListener>>,
}

impl EventDispatcher {
    pub fn new() -> EventDispatcher {
        EventDispatcher {
            listeners: Vec::new(),
        }
    }

    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener) as Box<dyn EventListener>)
    }

    pub fn dispatch(&mut self, event: Event) {
        for listener in &mut self.listeners {
            listener.event(&event);
        }
    }
}

#[test]
fn test_dispatch_reaches_every_listener() {
    use std::cell::Cell;
    use std::rc::Rc;

    let count = Rc::new(Cell::new(0));
    let mut dispatcher = EventDispatcher::new();

    for _ in 0..3 {
        let count = count.clone();
        dispatcher.add_listener(move |_: &Event| count.set(count.get() + 1));
    }

    dispatcher.dispatch(Event::Halt { pc: 0 });
    dispatcher.dispatch(Event::DivideByZero { pc: 4 });

    assert_eq!(count.get(), 6);
}
