//! Single-consumer message inbox. Each of the jitter buffer, the
//! analyzer, and the scheduler owns one of these instead of being
//! reached into through a shared mutex: a producer pushes a typed
//! message, the owner drains it on its own turn of the cooperative
//! loop, and there is never a lock to hold across an `ICodec`/`IAudioIO`
//! call.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

pub struct InboxSender<T> {
    tx: Sender<T>,
}

impl<T> Clone for InboxSender<T> {
    fn clone(&self) -> Self {
        InboxSender { tx: self.tx.clone() }
    }
}

impl<T> InboxSender<T> {
    pub fn send(&self, message: T) -> bool {
        self.tx.send(message).is_ok()
    }
}

pub struct Inbox<T> {
    rx: Receiver<T>,
}

impl<T> Inbox<T> {
    pub fn new() -> (InboxSender<T>, Inbox<T>) {
        let (tx, rx) = mpsc::channel();
        (InboxSender { tx }, Inbox { rx })
    }

    /// Drains every message currently queued without blocking; this is
    /// what a node calls once per `process_data` turn.
    pub fn drain(&self) -> Vec<T> {
        let mut out = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(msg) => out.push(msg),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_messages_in_order() {
        let (tx, inbox) = Inbox::new();
        tx.send(1);
        tx.send(2);
        tx.send(3);
        assert_eq!(inbox.drain(), vec![1, 2, 3]);
        assert!(inbox.drain().is_empty());
    }
}
