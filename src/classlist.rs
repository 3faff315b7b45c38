//! Consumer-facing view of a composite's classnames.
//!
//! A [`ClasslistComposite`] is what a row renderer holds on to: it reads the
//! current ordered classnames and subscribes to change notifications. The
//! backing buffer is reference counted; delegated composites point at the
//! very same buffer as the composite they delegate to, so identity of the
//! buffer (see [`ClasslistComposite::shares_classlist_with`]) tells whether
//! two nodes currently share state.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Backing storage of a classlist. Only the self-owned composite that
/// allocated it mutates it; everybody else only reads.
pub(crate) type SharedClasslist = Rc<RefCell<Vec<String>>>;

type Listener = Rc<dyn Fn(&ClasslistComposite)>;

/// Tokens are unique across all handles, so a token can only ever match the
/// listener it was issued for.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

/// Token returned by [`ClasslistComposite::subscribe`].
///
/// Not `Clone`: handing it back to `unsubscribe` consumes it.
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "dropping the token makes the listener impossible to unsubscribe"]
pub struct Subscription(u64);

struct Inner {
    buffer: RefCell<SharedClasslist>,
    listeners: RefCell<Vec<(u64, Listener)>>,
}

/// Live, ordered classnames of one composite plus its change listeners.
#[derive(Clone)]
pub struct ClasslistComposite {
    inner: Rc<Inner>,
}

impl ClasslistComposite {
    pub(crate) fn new(buffer: SharedClasslist) -> Self {
        Self {
            inner: Rc::new(Inner {
                buffer: RefCell::new(buffer),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn buffer(&self) -> SharedClasslist {
        self.inner.buffer.borrow().clone()
    }

    pub(crate) fn repoint(&self, buffer: SharedClasslist) {
        *self.inner.buffer.borrow_mut() = buffer;
    }

    /// Calls every listener once. The listener set is copied first so
    /// callbacks may subscribe or unsubscribe while being called.
    pub(crate) fn notify(&self) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(self);
        }
    }

    /// Snapshot of the current classnames.
    pub fn classlist(&self) -> Vec<String> {
        self.with_classlist(|list| list.to_vec())
    }

    pub fn with_classlist<R>(&self, f: impl FnOnce(&[String]) -> R) -> R {
        let buffer = self.buffer();
        let list = buffer.borrow();
        f(&list)
    }

    pub fn contains(&self, classname: &str) -> bool {
        self.with_classlist(|list| list.iter().any(|c| c == classname))
    }

    pub fn is_empty(&self) -> bool {
        self.with_classlist(|list| list.is_empty())
    }

    /// True when both handles currently read the same backing buffer.
    pub fn shares_classlist_with(&self, other: &ClasslistComposite) -> bool {
        Rc::ptr_eq(&self.buffer(), &other.buffer())
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ClasslistComposite) + 'static,
    {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.borrow_mut().push((token, Rc::new(listener)));
        Subscription(token)
    }

    /// Removes the listener registered under `subscription`. Returns false if
    /// the token belongs to another handle or was already removed.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        match listeners.iter().position(|(token, _)| *token == subscription.0) {
            Some(idx) => {
                listeners.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

impl fmt::Debug for ClasslistComposite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClasslistComposite")
            .field("classlist", &self.classlist())
            .field("listeners", &self.listener_count())
            .finish()
    }
}
