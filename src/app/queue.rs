//! Pending-request queue.
//!
//! Requests are appended in arrival order and stay queued until their
//! response frame has gone out on the BT device. Responses may arrive in
//! any order, so removal can happen anywhere; the head is always the
//! oldest request still waiting, and only the head's deadline is tracked.
//!
//! Entries are addressed by a stable [`EntryId`] rather than by position,
//! since positions shift whenever an interior entry leaves.

use core::time::Duration;
use std::collections::VecDeque;

use crate::bt::codec::{Request, Response};
use crate::error::QueueError;

/// Stable handle for one queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

/// One in-flight request and, once known, its response.
#[derive(Debug)]
pub struct QueueEntry<R> {
    id: EntryId,
    request: Request,
    response: Option<Response>,
    enqueued_at: Duration,
    expired: bool,
    reply: Option<R>,
}

impl<R> QueueEntry<R> {
    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The response to transmit, bound from IPC or synthesized on timeout.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub fn enqueued_at(&self) -> Duration {
        self.enqueued_at
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn has_reply(&self) -> bool {
        self.reply.is_some()
    }

    /// Ready entries have something to write back to the host.
    pub fn is_ready(&self) -> bool {
        self.reply.is_some() || self.expired
    }

    /// Attach a caller's response.
    pub(crate) fn bind(&mut self, response: Response, reply: R) {
        self.response = Some(response);
        self.reply = Some(reply);
    }

    /// Replace the response with the synthesized timeout.
    ///
    /// Returns the reply token of a caller that answered too late, so it
    /// can still be told about the timeout.
    pub(crate) fn expire(&mut self) -> Option<R> {
        self.expired = true;
        self.response = Some(Response::timeout_for(&self.request));
        self.reply.take()
    }

    /// Detach the reply token for completion.
    pub(crate) fn take_reply(&mut self) -> Option<R> {
        self.reply.take()
    }
}

/// FIFO of in-flight requests.
#[derive(Debug)]
pub struct PendingQueue<R> {
    entries: VecDeque<QueueEntry<R>>,
    next_id: u64,
}

impl<R> Default for PendingQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> PendingQueue<R> {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Append a request at the tail.
    pub fn enqueue(&mut self, request: Request, now: Duration) -> Result<EntryId, QueueError> {
        self.entries
            .try_reserve(1)
            .map_err(|_| QueueError::OutOfMemory)?;

        let id = EntryId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.push_back(QueueEntry {
            id,
            request,
            response: None,
            enqueued_at: now,
            expired: false,
            reply: None,
        });
        Ok(id)
    }

    /// First entry, head to tail, whose request carries `seq`.
    pub fn find_by_seq(&mut self, seq: u8) -> Option<&mut QueueEntry<R>> {
        self.entries.iter_mut().find(|e| e.request.seq == seq)
    }

    /// First entry, head to tail, that has something to write.
    ///
    /// Not necessarily the head: answered requests overtake older ones
    /// that are still waiting.
    pub fn find_ready(&mut self) -> Option<&mut QueueEntry<R>> {
        self.entries.iter_mut().find(|e| e.is_ready())
    }

    pub fn has_ready(&self) -> bool {
        self.entries.iter().any(QueueEntry::is_ready)
    }

    pub fn get(&self, id: EntryId) -> Option<&QueueEntry<R>> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Detach an entry from any position.
    pub fn remove(&mut self, id: EntryId) -> Option<QueueEntry<R>> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        self.entries.remove(pos)
    }

    pub fn head(&self) -> Option<&QueueEntry<R>> {
        self.entries.front()
    }

    pub fn head_mut(&mut self) -> Option<&mut QueueEntry<R>> {
        self.entries.front_mut()
    }

    pub fn is_head(&self, id: EntryId) -> bool {
        self.head().is_some_and(|e| e.id == id)
    }

    /// When the head request times out.
    pub fn head_deadline(&self, timeout: Duration) -> Option<Duration> {
        self.head().map(|e| e.enqueued_at + timeout)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry<R>> {
        self.entries.iter()
    }

    /// Remove every entry, head first.
    pub fn drain(&mut self) -> impl Iterator<Item = QueueEntry<R>> + '_ {
        self.entries.drain(..)
    }
}
