use std::cell::Cell;
use std::fmt;
use std::ops;


#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ListenerId(u64);

// A value that tells about its changes. Listeners are called synchronously, in subscription
// order, after each change. The dirty flag additionally lets polling consumers (a render
// loop) notice a change without subscribing.
pub struct Observable<T> {
    value: T,
    dirty: Cell<bool>,
    next_listener_id: u64,
    listeners: Vec<(ListenerId, Box<dyn FnMut(&T)>)>,
}

impl<T> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            dirty: Cell::new(false),
            next_listener_id: 0,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&T) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    // Returns false if there was no such listener.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let len_before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != len_before
    }

    // Unconditionally notifies, even if `f` left the value intact.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        let ret = f(&mut self.value);
        self.notify();
        ret
    }

    // Replaces the value and notifies regardless of equality. For values without `Eq`.
    pub fn replace(&mut self, value: T) -> T {
        let old = std::mem::replace(&mut self.value, value);
        self.notify();
        old
    }

    pub fn take_dirt(&self) -> bool { self.dirty.replace(false) }

    fn notify(&mut self) {
        self.dirty.set(true);
        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.value);
        }
    }
}

impl<T: PartialEq> Observable<T> {
    // Notifies only on actual change. Returns whether the value changed.
    pub fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        self.notify();
        true
    }
}

impl<T: Default> Default for Observable<T> {
    fn default() -> Self { Self::new(T::default()) }
}

impl<T> ops::Deref for Observable<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target { &self.value }
}
// Don't implement `DerefMut`: every mutation must go through a method that notifies.

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("value", &self.value)
            .field("dirty", &self.dirty.get())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
