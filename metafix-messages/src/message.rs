//! User-facing message object and factory.

use std::sync::Arc;

use metafix_dictionary::{MessageTemplate, Protocol, flat_members};

use crate::{
    decoder::{self, DecodeOptions, Decoded, find_template},
    encoder::{self, EncodeOptions},
    errors::{DecodeError, EncodeError, Error},
    types::{FieldMap, Int, UtcTimestamp},
};

/// A structured message bound to its protocol and template.
///
/// The payload stays mutable while the message is assembled; after
/// encoding, or when returned by [`FixMessage::decode`], it is treated as
/// logically immutable.
#[derive(Clone, Debug)]
pub struct FixMessage {
    protocol: Arc<Protocol>,
    message: FieldMap,
    template: Arc<MessageTemplate>,
    omitted_required: Vec<String>,
}

impl FixMessage {
    /// Wraps a structured message, discovering its template from the
    /// `MsgType` value.
    pub fn new(protocol: Arc<Protocol>, message: FieldMap) -> Result<FixMessage, DecodeError> {
        let template = find_template(&protocol, &message)?;
        Ok(FixMessage {
            protocol,
            message,
            template,
            omitted_required: Vec::new(),
        })
    }

    /// Decodes a framed byte buffer.
    pub fn decode(
        protocol: Arc<Protocol>,
        buf: &[u8],
        options: &DecodeOptions,
    ) -> Result<FixMessage, DecodeError> {
        let Decoded {
            message,
            template,
            omitted_required,
        } = decoder::decode(&protocol, buf, options)?;
        Ok(FixMessage {
            protocol,
            message,
            template,
            omitted_required,
        })
    }

    /// Encodes the message; with integrity regeneration (the default) the
    /// computed body length and checksum are written back into the
    /// payload.
    pub fn encode(&mut self, options: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
        encoder::encode(&self.protocol, &mut self.message, &self.template, options)
    }

    pub fn protocol(&self) -> &Arc<Protocol> {
        &self.protocol
    }

    pub fn template(&self) -> &Arc<MessageTemplate> {
        &self.template
    }

    pub fn message(&self) -> &FieldMap {
        &self.message
    }

    pub fn message_mut(&mut self) -> &mut FieldMap {
        &mut self.message
    }

    pub fn into_message(self) -> FieldMap {
        self.message
    }

    /// Required members a non-strict decode tolerated as missing.
    pub fn omitted_required(&self) -> &[String] {
        &self.omitted_required
    }
}

/// Binds a protocol, the session comp ids and default options, and stamps
/// out messages with the stock header filled in.
#[derive(Clone, Debug)]
pub struct FixMessageFactory {
    protocol: Arc<Protocol>,
    sender_comp_id: String,
    target_comp_id: String,
    decode_options: DecodeOptions,
    header_extras: FieldMap,
    trailer_extras: FieldMap,
}

impl FixMessageFactory {
    pub fn new(
        protocol: Arc<Protocol>,
        sender_comp_id: &str,
        target_comp_id: &str,
    ) -> FixMessageFactory {
        FixMessageFactory {
            protocol,
            sender_comp_id: sender_comp_id.to_owned(),
            target_comp_id: target_comp_id.to_owned(),
            decode_options: DecodeOptions::default(),
            header_extras: FieldMap::new(),
            trailer_extras: FieldMap::new(),
        }
    }

    pub fn with_decode_options(mut self, options: DecodeOptions) -> FixMessageFactory {
        self.decode_options = options;
        self
    }

    /// Header fields merged into every created message; per-call extras
    /// override them.
    pub fn with_header_extras(mut self, extras: FieldMap) -> FixMessageFactory {
        self.header_extras = extras;
        self
    }

    /// Trailer fields merged into every created message; per-call extras
    /// override them.
    pub fn with_trailer_extras(mut self, extras: FieldMap) -> FixMessageFactory {
        self.trailer_extras = extras;
        self
    }

    /// Assembles a message of the named type with the stock header
    /// (`BeginString`, `MsgType`, `MsgSeqNum`, `SenderCompID`,
    /// `TargetCompID`, `SendingTime`) filled in.
    pub fn create(
        &self,
        msg_type: &str,
        msg_seq_num: Int,
        sending_time: UtcTimestamp,
        body: FieldMap,
        header_extras: FieldMap,
        trailer_extras: FieldMap,
    ) -> Result<FixMessage, Error> {
        if !self.protocol.is_valid_message_name(msg_type) {
            return Err(EncodeError::UnknownMsgType(msg_type.to_owned()).into());
        }

        let mut header_args = FieldMap::new();
        header_args.set(
            "BeginString",
            String::from_utf8_lossy(self.protocol.begin_string()).into_owned(),
        );
        header_args.set("MsgType", msg_type);
        header_args.set("MsgSeqNum", msg_seq_num);
        header_args.set("SenderCompID", self.sender_comp_id.as_str());
        header_args.set("TargetCompID", self.target_comp_id.as_str());
        header_args.set("SendingTime", sending_time);
        for (name, value) in self.header_extras.iter() {
            header_args.set(name, value.clone());
        }
        for (name, value) in header_extras {
            header_args.set(name, value);
        }

        // Stock header fields land in header-template order; body fields
        // keep their own order; trailer extras are filtered to the trailer
        // template.
        let mut message = FieldMap::new();
        for member in flat_members(self.protocol.header()) {
            if let Some(value) = header_args.get(member.field().name()) {
                message.set(member.field().name(), value.clone());
            }
        }
        for (name, value) in body {
            message.set(name, value);
        }

        let mut trailer_args = self.trailer_extras.clone();
        for (name, value) in trailer_extras {
            trailer_args.set(name, value);
        }
        for member in flat_members(self.protocol.trailer()) {
            if let Some(value) = trailer_args.get(member.field().name()) {
                message.set(member.field().name(), value.clone());
            }
        }

        Ok(FixMessage::new(self.protocol.clone(), message)?)
    }

    /// Decodes a buffer with the factory's default options.
    pub fn decode(&self, buf: &[u8]) -> Result<FixMessage, DecodeError> {
        FixMessage::decode(self.protocol.clone(), buf, &self.decode_options)
    }
}
