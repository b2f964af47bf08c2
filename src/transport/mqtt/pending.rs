//! Packet-id correlation for in-flight broker requests
//!
//! rumqttc assigns packet ids inside the event loop, so a request is first
//! queued without an id, receives its id when the loop reports the matching
//! outgoing packet (requests of one kind go out in the order they were
//! issued), and is removed when the broker acknowledges that id.
//!
//! A requester that stops waiting cannot take its request back out of the
//! client channel. It abandons the entry instead: the entry keeps its queue
//! position so the late write still lines up with it, and that write is
//! reported as [`Assignment::Abandoned`] rather than acknowledging anyone.

use std::collections::{HashMap, VecDeque};

/// Handle to one request, returned by [`PendingAcks::request`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Outcome of matching a written packet to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// The oldest live request now waits for its acknowledgment
    Tracked,
    /// The oldest request was abandoned; nothing waits for this packet
    Abandoned,
    /// Nothing was queued, the packet was not ours
    Untracked,
}

#[derive(Debug)]
struct Queued<T> {
    ticket: Ticket,
    item: T,
    abandoned: bool,
}

#[derive(Debug)]
pub struct PendingAcks<T> {
    next_ticket: u64,
    queued: VecDeque<Queued<T>>,
    in_flight: HashMap<u16, (Ticket, T)>,
}

impl<T> PendingAcks<T> {
    pub fn new() -> Self {
        Self {
            next_ticket: 0,
            queued: VecDeque::new(),
            in_flight: HashMap::new(),
        }
    }

    /// Record a request that has been handed to the client
    pub fn request(&mut self, item: T) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.queued.push_back(Queued {
            ticket,
            item,
            abandoned: false,
        });
        ticket
    }

    /// Drop a queued request the client refused; it never reached the loop
    pub fn withdraw(&mut self, ticket: Ticket) -> Option<T> {
        let index = self.queued.iter().position(|q| q.ticket == ticket)?;
        self.queued.remove(index).map(|q| q.item)
    }

    /// Stop waiting for a request that may still be written later
    ///
    /// A queued entry stays in place, marked abandoned. An entry already
    /// written is forgotten, so a late acknowledgment finds nothing.
    /// Returns `false` when the request was already acknowledged.
    pub fn abandon(&mut self, ticket: Ticket) -> bool {
        if let Some(queued) = self.queued.iter_mut().find(|q| q.ticket == ticket) {
            queued.abandoned = true;
            return true;
        }

        let written = self
            .in_flight
            .iter()
            .find(|(_, (t, _))| *t == ticket)
            .map(|(pkid, _)| *pkid);
        match written {
            Some(pkid) => self.in_flight.remove(&pkid).is_some(),
            None => false,
        }
    }

    /// The event loop wrote the oldest queued request with packet id `pkid`
    pub fn assign(&mut self, pkid: u16) -> Assignment {
        match self.queued.pop_front() {
            Some(queued) if queued.abandoned => Assignment::Abandoned,
            Some(queued) => {
                self.in_flight.insert(pkid, (queued.ticket, queued.item));
                Assignment::Tracked
            }
            None => Assignment::Untracked,
        }
    }

    /// The broker acknowledged `pkid`
    pub fn acknowledge(&mut self, pkid: u16) -> Option<T> {
        self.in_flight.remove(&pkid).map(|(_, item)| item)
    }

    /// Requests still awaited, abandoned ones excluded
    pub fn awaited(&self) -> usize {
        self.queued.iter().filter(|q| !q.abandoned).count() + self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty() && self.in_flight.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queued.len() + self.in_flight.len()
    }

    /// Forget everything, e.g. after the connection was replaced
    pub fn clear(&mut self) {
        self.queued.clear();
        self.in_flight.clear();
    }
}

impl<T> Default for PendingAcks<T> {
    fn default() -> Self {
        Self::new()
    }
}
