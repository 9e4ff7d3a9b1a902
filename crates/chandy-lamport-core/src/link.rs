//! Unidirectional, order-preserving links between servers.
//!
//! A link holds events rather than raw packets: each queued
//! [`SendMessageEvent`] carries the tick at which it becomes deliverable.
//! The source server appends at the tail; the driver removes from the head.
//! Nothing else may reorder the queue.

use std::collections::VecDeque;

use crate::message::SendMessageEvent;
use crate::types::ServerId;

/// A one-directional FIFO channel from `src` to `dest`.
#[derive(Debug, Clone)]
pub struct Link {
    src: ServerId,
    dest: ServerId,
    events: VecDeque<SendMessageEvent>,
}

impl Link {
    /// Create an empty link.
    pub fn new(src: ServerId, dest: ServerId) -> Self {
        Self {
            src,
            dest,
            events: VecDeque::new(),
        }
    }

    /// Sending end.
    pub fn src(&self) -> &ServerId {
        &self.src
    }

    /// Receiving end.
    pub fn dest(&self) -> &ServerId {
        &self.dest
    }

    /// Append an event at the tail.
    pub fn push(&mut self, event: SendMessageEvent) {
        debug_assert_eq!(event.src, self.src);
        debug_assert_eq!(event.dest, self.dest);
        self.events.push_back(event);
    }

    /// The oldest undelivered event.
    pub fn peek(&self) -> Option<&SendMessageEvent> {
        self.events.front()
    }

    /// Remove the oldest undelivered event.
    pub fn pop(&mut self) -> Option<SendMessageEvent> {
        self.events.pop_front()
    }

    /// Remove the head only if it is deliverable at `now`.
    pub fn pop_ready(&mut self, now: u64) -> Option<SendMessageEvent> {
        match self.events.front() {
            Some(event) if event.receive_time <= now => self.events.pop_front(),
            _ => None,
        }
    }

    /// Undelivered events, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SendMessageEvent> {
        self.events.iter()
    }

    /// Number of undelivered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the link is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
