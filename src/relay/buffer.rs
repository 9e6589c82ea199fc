//! FIFO of undelivered items with an optional trailing terminal marker.
//!
//! The buffer itself never rejects items on capacity grounds: bounding is
//! done by pausing the source, and items that arrive while the pause is in
//! flight are simply appended.

use std::collections::VecDeque;

use crate::subscriber::Terminal;

/// A buffered entry: an item or the terminal marker.
#[derive(Debug, PartialEq, Eq)]
pub enum Entry<T, E> {
    Item(T),
    Terminal(Terminal<E>),
}

/// Ordered relay buffer.
///
/// Invariant: at most one terminal marker is ever enqueued, and it always
/// sits behind every buffered item.
#[derive(Debug)]
pub struct RelayBuffer<T, E> {
    items: VecDeque<T>,
    terminal: Option<Terminal<E>>,
    terminated: bool,
}

impl<T, E> Default for RelayBuffer<T, E> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            terminal: None,
            terminated: false,
        }
    }
}

impl<T, E> RelayBuffer<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item. Returns the item back if a terminal marker has
    /// already been enqueued, since nothing may follow it.
    pub fn enqueue(&mut self, item: T) -> std::result::Result<(), T> {
        if self.terminated {
            return Err(item);
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Append the terminal marker. Returns `false` if one was already
    /// enqueued; the first one wins.
    pub fn enqueue_terminal(&mut self, terminal: Terminal<E>) -> bool {
        if self.terminated {
            return false;
        }
        self.terminated = true;
        self.terminal = Some(terminal);
        true
    }

    /// Remove the head entry.
    pub fn dequeue(&mut self) -> Option<Entry<T, E>> {
        match self.items.pop_front() {
            Some(item) => Some(Entry::Item(item)),
            None => self.terminal.take().map(Entry::Terminal),
        }
    }

    /// Whether the head entry is an item (as opposed to the terminal marker
    /// or nothing).
    pub fn head_is_item(&self) -> bool {
        !self.items.is_empty()
    }

    /// Whether the terminal marker is at the head.
    pub fn head_is_terminal(&self) -> bool {
        self.items.is_empty() && self.terminal.is_some()
    }

    /// Buffered items, terminal marker excluded.
    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// No items and no terminal marker pending.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.terminal.is_none()
    }

    /// Whether a terminal marker was ever enqueued (delivered or not).
    #[cfg(test)]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Whether a terminal marker is enqueued and not yet dequeued.
    pub fn has_pending_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    /// Discard everything and accept items again. Returns the number of
    /// items dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        self.terminal = None;
        self.terminated = false;
        dropped
    }
}
