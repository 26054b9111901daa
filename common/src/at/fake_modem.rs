extern crate std;

use core::cell::RefCell;
use std::borrow::ToOwned;
use std::collections::VecDeque;
use std::string::String;
use std::vec::Vec;

use super::uart::{AtRxBroker, Tx};
use crate::error::Error;
use crate::state::SharedState;

struct Inner<'a> {
    broker: AtRxBroker<'a>,
    script: VecDeque<(String, String)>,
    written: Vec<String>,
}

/// A scripted modem, to be used in tests.
///
/// Every written command must match the next scripted one, the scripted reply bytes are then fed
/// to an [`AtRxBroker`] right away. An empty reply simulates a modem that never answers.
pub struct FakeModem<'a> {
    inner: RefCell<Inner<'a>>,
}

impl<'a> FakeModem<'a> {
    pub fn new(state: &'a SharedState, interactions: &[(&str, &str)]) -> Self {
        let script = interactions
            .iter()
            .map(|(command, reply)| ((*command).to_owned(), (*reply).to_owned()))
            .collect();
        Self {
            inner: RefCell::new(Inner {
                broker: AtRxBroker::new(state),
                script,
                written: Vec::new(),
            }),
        }
    }

    /// Feeds bytes as if the modem sent them on its own.
    pub fn unsolicited(&self, bytes: &str) {
        self.inner.borrow_mut().broker.process_bytes(bytes.as_bytes());
    }

    /// The TX half, to be handed over to the driver.
    pub fn tx(&self) -> FakeTx<'_, 'a> {
        FakeTx { modem: self }
    }

    pub fn all_done(&self) -> bool {
        self.inner.borrow().script.is_empty()
    }

    /// Everything written so far, one entry per write.
    pub fn written(&self) -> Vec<String> {
        self.inner.borrow().written.clone()
    }
}

pub struct FakeTx<'m, 'a> {
    modem: &'m FakeModem<'a>,
}

impl Tx for FakeTx<'_, '_> {
    async fn write(&mut self, buffer: &[u8]) -> crate::Result<()> {
        let text = core::str::from_utf8(buffer).map_err(|_| Error::StringEncodingError)?;
        let mut inner = self.modem.inner.borrow_mut();
        inner.written.push(text.to_owned());

        let command = text.trim_end();
        let (expected, reply) = inner
            .script
            .pop_front()
            .unwrap_or_else(|| panic!("Unexpected command {command}"));
        assert_eq!(expected, command, "Expected {expected}, got {command}");
        inner.broker.process_bytes(reply.as_bytes());
        Ok(())
    }

    async fn flush(&mut self) -> crate::Result<()> {
        Ok(())
    }
}
