// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

use crate::{cfg::enums::ProtocolVariant, error::Result};

/// Serialises a request body for transmission. The protocol variant chosen at
/// dial time is threaded through every marshal call; the XML variant applies
/// the dialect escape pass, the native variant does not.
pub trait ToWire {
    fn to_wire(&self, variant: ProtocolVariant) -> Result<Bytes>;
}

/// Deserialises a reply body. The body slice is exactly `msgLen` bytes; the
/// codec has already verified the frame lengths.
pub trait FromWire: Sized {
    fn from_wire(body: &[u8], variant: ProtocolVariant) -> Result<Self>;
}

/// Empty sentinel body: no bytes on the wire, any reply body accepted.
impl ToWire for () {
    fn to_wire(&self, _variant: ProtocolVariant) -> Result<Bytes> {
        Ok(Bytes::new())
    }
}

impl FromWire for () {
    fn from_wire(_body: &[u8], _variant: ProtocolVariant) -> Result<Self> {
        Ok(())
    }
}

/// Raw-byte body shape: the bytes are the message.
impl ToWire for Bytes {
    fn to_wire(&self, _variant: ProtocolVariant) -> Result<Bytes> {
        Ok(self.clone())
    }
}

impl FromWire for Bytes {
    fn from_wire(body: &[u8], _variant: ProtocolVariant) -> Result<Self> {
        Ok(Bytes::copy_from_slice(body))
    }
}

/// Implements the JSON-in-XML body shape for a serde type: the value is
/// serialised to JSON, base64-wrapped into a `BinBytesBuf_PI`, and unwrapped
/// symmetrically on read.
macro_rules! json_wire {
    ($ty:ty) => {
        impl $crate::models::common::ToWire for $ty {
            fn to_wire(
                &self,
                variant: $crate::cfg::enums::ProtocolVariant,
            ) -> $crate::error::Result<bytes::Bytes> {
                use $crate::models::common::ToWire as _;
                $crate::models::bin_buf::BinBytesBuf::from_json(self)?.to_wire(variant)
            }
        }

        impl $crate::models::common::FromWire for $ty {
            fn from_wire(
                body: &[u8],
                variant: $crate::cfg::enums::ProtocolVariant,
            ) -> $crate::error::Result<Self> {
                use $crate::models::common::FromWire as _;
                $crate::models::bin_buf::BinBytesBuf::from_wire(body, variant)?
                    .into_json()
            }
        }
    };
}

pub(crate) use json_wire;
