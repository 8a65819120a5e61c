//! The append-only broadcast channel elections run over.
//!
//! The protocol only needs three things from a channel: the election's
//! identifier, its parameters, and an append-only message log everyone
//! observes in the same order. Network transports implement the trait;
//! [`MemoryChannel`] backs tests and single-process demos.

use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::util::hash;

use super::messages::Message;
use super::params::ElectionParams;
use super::ElectionId;

pub trait BroadcastChannel {
    /// Stable identifier of the election this channel carries.
    fn id(&self) -> ElectionId;

    /// The election parameters, fixed for the channel's lifetime.
    fn params(&self) -> Result<ElectionParams>;

    /// The full log, oldest first.
    fn get(&self) -> Result<Vec<Message>>;

    /// Appends a message to the log.
    fn post(&self, msg: &Message) -> Result<()>;
}

/// In-process channel; clones share one log.
#[derive(Clone)]
pub struct MemoryChannel {
    id: ElectionId,
    params: ElectionParams,
    log: Arc<Mutex<Vec<Message>>>,
}

impl MemoryChannel {
    /// The election id is the hash of the canonical parameter encoding.
    pub fn new(params: ElectionParams) -> Self {
        MemoryChannel {
            id: hash(&params.to_bytes()),
            params,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl BroadcastChannel for MemoryChannel {
    fn id(&self) -> ElectionId {
        self.id
    }

    fn params(&self) -> Result<ElectionParams> {
        Ok(self.params.clone())
    }

    fn get(&self) -> Result<Vec<Message>> {
        Ok(self.log.lock().unwrap().clone())
    }

    fn post(&self, msg: &Message) -> Result<()> {
        self.log.lock().unwrap().push(msg.clone());
        Ok(())
    }
}
