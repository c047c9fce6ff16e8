// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2024 Oxide Computer Company

use std::convert;

use protocol::CodecError;
use protocol::DeviceId;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The switch negotiated an OpenFlow version we can't speak
    #[error("unsupported OpenFlow version: {0:#04x}")]
    UnsupportedVersion(u8),
    /// An inbound frame was truncated, or was built by some other LLDP
    /// speaker.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    /// A probe named a datapath the inventory doesn't know about.
    #[error("unknown peer: {0}")]
    UnknownPeer(DeviceId),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Some of the interfaces named in a request don't exist.
    #[error("interfaces not found: {0:?}")]
    UnknownInterfaces(Vec<String>),
    #[error("No such resource: {0}")]
    Missing(String),
    #[error("Invalid argument: {0}")]
    Invalid(String),
}

impl convert::From<CodecError> for DiscoveryError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnsupportedVersion(v) => {
                DiscoveryError::UnsupportedVersion(v)
            }
            CodecError::MalformedFrame { .. } => {
                DiscoveryError::MalformedFrame(err.to_string())
            }
            CodecError::Invalid(e) => DiscoveryError::Invalid(e),
        }
    }
}

impl convert::From<DiscoveryError> for dropshot::HttpError {
    fn from(o: DiscoveryError) -> dropshot::HttpError {
        match o {
            DiscoveryError::UnsupportedVersion(v) => {
                dropshot::HttpError::for_bad_request(
                    None,
                    format!("unsupported OpenFlow version: {v:#04x}"),
                )
            }
            DiscoveryError::MalformedFrame(e) => {
                dropshot::HttpError::for_bad_request(None, e)
            }
            DiscoveryError::UnknownPeer(id) => dropshot::HttpError::for_status(
                Some(format!("unknown datapath: {id}")),
                http::StatusCode::NOT_FOUND,
            ),
            DiscoveryError::InvalidConfiguration(e) => {
                dropshot::HttpError::for_bad_request(None, e)
            }
            DiscoveryError::UnknownInterfaces(ids) => {
                dropshot::HttpError::for_bad_request(
                    None,
                    format!(
                        "Some interfaces couldn't be found: {}",
                        ids.join(", ")
                    ),
                )
            }
            DiscoveryError::Missing(e) => dropshot::HttpError::for_status(
                Some(e),
                http::StatusCode::NOT_FOUND,
            ),
            DiscoveryError::Invalid(e) => {
                dropshot::HttpError::for_bad_request(None, e)
            }
        }
    }
}
