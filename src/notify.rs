//! Change notification shared by the roster, voice, message and button components.
//!
//! Subscribers are zero-argument closures registered at construction time. A component owns one
//! `Notifier` per kind of change it publishes and fires it after its own state is consistent, so
//! handlers are free to read (or mutate) the component that fired.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

pub struct Notifier<C> {
    handlers: RefCell<Vec<Rc<dyn Fn()>>>,
    _component: PhantomData<fn() -> C>,
}

impl<C> Notifier<C> {
    pub fn new() -> Self {
        Notifier {
            handlers: RefCell::new(Vec::new()),
            _component: PhantomData,
        }
    }

    pub fn subscribe(&self, handler: impl Fn() + 'static) {
        self.handlers.borrow_mut().push(Rc::new(handler));
    }

    /// Call every handler registered so far. Handlers added while firing run from the next fire on.
    pub fn fire(&self) {
        let handlers: Vec<Rc<dyn Fn()>> = self.handlers.borrow().clone();
        for handler in handlers {
            handler();
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }
}

impl<C> Default for Notifier<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for Notifier<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("subscribers", &self.len())
            .finish()
    }
}
