//! Keyboard and mouse side effects requested by actions.
//!
//! Requests are collected during a tick and handed to an [`Emitter`] once the
//! tick is complete. The mapping pass never waits on the emitter. Motion may
//! be dropped under backpressure; key and button edges are always delivered,
//! in order.

use egui::{Key, Modifiers};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// A discrete keyboard/mouse event for the virtual input device.
#[derive(Debug, Clone, PartialEq)]
pub enum EmitterRequest {
    Key {
        key: Key,
        modifiers: Modifiers,
        pressed: bool,
    },
    MouseButton {
        button: MouseButton,
        pressed: bool,
    },
    MouseMove {
        dx: i32,
        dy: i32,
    },
    Scroll {
        dx: i32,
        dy: i32,
    },
}

impl EmitterRequest {
    /// Key and button edges; losing one leaves an input stuck.
    pub fn is_edge(&self) -> bool {
        matches!(
            self,
            EmitterRequest::Key { .. } | EmitterRequest::MouseButton { .. }
        )
    }
}

/// Consumer of side-effect requests.
pub trait Emitter: Send {
    fn emit(&mut self, request: EmitterRequest);

    /// Retries anything held back from earlier ticks. Called once per tick.
    fn flush(&mut self) {}
}

/// Forwards requests into a tokio channel without blocking.
///
/// Half of the channel is kept free for edges: motion is only sent while
/// more than that headroom is available. Edges that still find the channel
/// full wait in a queue that is retried on every [`flush`](Emitter::flush)
/// and ahead of every later request.
#[derive(Debug)]
pub struct ChannelEmitter {
    sender: mpsc::Sender<EmitterRequest>,
    headroom: usize,
    pending: VecDeque<EmitterRequest>,
}

impl ChannelEmitter {
    pub fn new(sender: mpsc::Sender<EmitterRequest>) -> Self {
        let headroom = sender.max_capacity() / 2;
        Self {
            sender,
            headroom,
            pending: VecDeque::new(),
        }
    }

    /// Creates an emitter together with the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EmitterRequest>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }

    /// Number of edges still waiting for channel space.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn send_pending(&mut self) {
        while let Some(request) = self.pending.pop_front() {
            match self.sender.try_send(request) {
                Ok(()) => {}
                Err(TrySendError::Full(request)) => {
                    self.pending.push_front(request);
                    return;
                }
                Err(TrySendError::Closed(_)) => {
                    warn!("Emitter channel closed, discarding {} edges", self.pending.len() + 1);
                    self.pending.clear();
                    return;
                }
            }
        }
    }
}

impl Emitter for ChannelEmitter {
    fn emit(&mut self, request: EmitterRequest) {
        trace!("Emitting {:?}", request);
        self.send_pending();

        if !request.is_edge() {
            if !self.pending.is_empty() || self.sender.capacity() <= self.headroom {
                debug!("Dropping motion under backpressure: {:?}", request);
                return;
            }
            if let Err(e) = self.sender.try_send(request) {
                warn!("Dropping emitter request: {}", e);
            }
            return;
        }

        if !self.pending.is_empty() {
            self.pending.push_back(request);
            return;
        }
        match self.sender.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(request)) => {
                debug!("Channel full, holding back {:?}", request);
                self.pending.push_back(request);
            }
            Err(TrySendError::Closed(request)) => {
                warn!("Emitter channel closed, dropping {:?}", request);
            }
        }
    }

    fn flush(&mut self) {
        self.send_pending();
    }
}

/// Discards every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEmitter;

impl Emitter for NullEmitter {
    fn emit(&mut self, _request: EmitterRequest) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_emitter_delivers_in_order() {
        let (mut emitter, mut rx) = ChannelEmitter::channel(4);
        emitter.emit(EmitterRequest::MouseMove { dx: 1, dy: 2 });
        emitter.emit(EmitterRequest::Scroll { dx: 0, dy: -1 });

        assert_eq!(rx.try_recv().ok(), Some(EmitterRequest::MouseMove { dx: 1, dy: 2 }));
        assert_eq!(rx.try_recv().ok(), Some(EmitterRequest::Scroll { dx: 0, dy: -1 }));
    }

    #[test]
    fn test_full_channel_drops_motion() {
        let (mut emitter, mut rx) = ChannelEmitter::channel(1);
        emitter.emit(EmitterRequest::MouseMove { dx: 1, dy: 0 });
        emitter.emit(EmitterRequest::MouseMove { dx: 2, dy: 0 });

        assert_eq!(rx.try_recv().ok(), Some(EmitterRequest::MouseMove { dx: 1, dy: 0 }));
        assert!(rx.try_recv().is_err());
        assert_eq!(emitter.pending(), 0);
    }

    #[test]
    fn test_motion_leaves_headroom_for_edges() {
        let (mut emitter, mut rx) = ChannelEmitter::channel(2);
        emitter.emit(key(true));
        emitter.emit(EmitterRequest::MouseMove { dx: 20, dy: 0 });
        emitter.emit(key(false));

        assert_eq!(rx.try_recv().ok(), Some(key(true)));
        assert_eq!(rx.try_recv().ok(), Some(key(false)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_edges_wait_for_space_in_order() {
        let (mut emitter, mut rx) = ChannelEmitter::channel(1);
        emitter.emit(key(true));
        emitter.emit(key(false));
        emitter.emit(EmitterRequest::MouseButton {
            button: MouseButton::Left,
            pressed: true,
        });
        assert_eq!(emitter.pending(), 2);

        assert_eq!(rx.try_recv().ok(), Some(key(true)));
        emitter.flush();
        assert_eq!(emitter.pending(), 1);
        // motion never overtakes a waiting edge
        emitter.emit(EmitterRequest::Scroll { dx: 0, dy: 1 });
        assert_eq!(emitter.pending(), 1);

        assert_eq!(rx.try_recv().ok(), Some(key(false)));
        emitter.flush();
        assert_eq!(
            rx.try_recv().ok(),
            Some(EmitterRequest::MouseButton {
                button: MouseButton::Left,
                pressed: true,
            })
        );
        assert!(rx.try_recv().is_err());
        assert_eq!(emitter.pending(), 0);
    }

    #[test]
    fn test_closed_channel_discards_pending() {
        let (mut emitter, rx) = ChannelEmitter::channel(1);
        emitter.emit(key(true));
        emitter.emit(key(false));
        assert_eq!(emitter.pending(), 1);

        drop(rx);
        emitter.flush();
        assert_eq!(emitter.pending(), 0);
    }

    fn key(pressed: bool) -> EmitterRequest {
        EmitterRequest::Key {
            key: Key::Escape,
            modifiers: Modifiers::NONE,
            pressed,
        }
    }
}
