//! Observer lists and the deferred-task queue.

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    rc::{Rc, Weak},
};

type Callback<A> = Rc<dyn Fn(&A)>;

struct Slots<A> {
    next_id: u64,
    callbacks: HashMap<u64, Callback<A>>,
}

/// A list of callbacks notified with a `&A` argument.
pub struct Observers<A> {
    slots: Rc<RefCell<Slots<A>>>,
}

impl<A: 'static> Default for Observers<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Observers<A> {
    pub fn new() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_id: 0,
                callbacks: HashMap::new(),
            })),
        }
    }

    /// Register `callback`; the returned handle removes it again.
    pub fn subscribe(&self, callback: impl Fn(&A) + 'static) -> Subscription {
        let id = {
            let mut slots = self.slots.borrow_mut();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.callbacks.insert(id, Rc::new(callback));
            id
        };
        let weak: Weak<RefCell<Slots<A>>> = Rc::downgrade(&self.slots);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(slots) = weak.upgrade() {
                    slots.borrow_mut().callbacks.remove(&id);
                }
            })),
        }
    }

    /// Call every registered callback once.
    ///
    /// Callbacks may subscribe or unsubscribe while being notified; the set
    /// notified is the one registered when `notify` was entered.
    pub fn notify(&self, arg: &A) {
        let callbacks: Vec<Callback<A>> = self.slots.borrow().callbacks.values().cloned().collect();
        for cb in callbacks {
            cb(arg);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Capability to remove a previously registered callback.
///
/// Dropping the handle keeps the callback registered.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Remove the callback. Safe to call after the observed object is gone.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

type Task = Box<dyn FnOnce()>;

/// FIFO of work postponed until the current top-level operation finishes.
#[derive(Default)]
pub struct DeferredQueue {
    tasks: RefCell<VecDeque<Task>>,
    draining: Cell<bool>,
}

impl DeferredQueue {
    pub fn push(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run queued tasks, including ones queued while draining.
    ///
    /// Re-entrant calls return immediately; the outer drain picks up their
    /// work.
    pub fn drain(&self) {
        if self.draining.replace(true) {
            return;
        }
        loop {
            let next = self.tasks.borrow_mut().pop_front();
            match next {
                Some(task) => task(),
                None => break,
            }
        }
        self.draining.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_and_unsubscribe() {
        let observers = Observers::<u32>::new();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let sub = observers.subscribe(move |n| h.set(h.get() + *n));
        observers.notify(&2);
        assert_eq!(hits.get(), 2);
        sub.unsubscribe();
        observers.notify(&2);
        assert_eq!(hits.get(), 2);
        assert!(observers.is_empty());
    }

    #[test]
    fn test_unsubscribe_during_notify() {
        let observers = Rc::new(Observers::<()>::new());
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let s = slot.clone();
        let sub = observers.subscribe(move |_| {
            if let Some(sub) = s.borrow_mut().take() {
                sub.unsubscribe();
            }
        });
        *slot.borrow_mut() = Some(sub);
        observers.notify(&());
        assert!(observers.is_empty());
    }

    #[test]
    fn test_deferred_tasks_run_in_order() {
        let queue = Rc::new(DeferredQueue::default());
        let log = Rc::new(RefCell::new(Vec::new()));
        let (q, l) = (queue.clone(), log.clone());
        queue.push(move || {
            l.borrow_mut().push(1);
            let l2 = l.clone();
            q.push(move || l2.borrow_mut().push(3));
            q.drain();
        });
        let l = log.clone();
        queue.push(move || l.borrow_mut().push(2));
        queue.drain();
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
        assert!(queue.is_empty());
    }
}
