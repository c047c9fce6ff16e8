// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use slog::debug;
use slog::o;
use slog::warn;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::types::LinkObserved;
use crate::types::OutboundMessage;

/// Our two outputs: messages for the switches and discovered links for the
/// topology consumer.  Neither send ever blocks.  A full or closed channel
/// costs us one message, which the next tick will replace.
#[derive(Clone)]
pub struct Outbox {
    log: slog::Logger,
    messages: mpsc::Sender<OutboundMessage>,
    links: mpsc::Sender<LinkObserved>,
}

impl Outbox {
    pub fn new(
        log: &slog::Logger,
        messages: mpsc::Sender<OutboundMessage>,
        links: mpsc::Sender<LinkObserved>,
    ) -> Self {
        Outbox {
            log: log.new(o!("unit" => "outbox")),
            messages,
            links,
        }
    }

    pub fn send_message(&self, msg: OutboundMessage) {
        let dest = msg.destination;
        match self.messages.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(m)) => {
                warn!(self.log, "outbound queue full, dropping {}", m.message;
                    "destination" => dest.to_string());
            }
            Err(TrySendError::Closed(_)) => {
                debug!(self.log, "outbound queue closed";
                    "destination" => dest.to_string());
            }
        }
    }

    pub fn send_link(&self, link: LinkObserved) {
        match self.links.try_send(link) {
            Ok(()) => {}
            Err(TrySendError::Full(l)) => {
                warn!(self.log, "link queue full, dropping {} <-> {}",
                    l.interface_a, l.interface_b);
            }
            Err(TrySendError::Closed(_)) => {
                debug!(self.log, "link queue closed");
            }
        }
    }
}
