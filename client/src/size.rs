//! Wire-size accounting for publish requests.
//!
//! Sizes are the protobuf encoded lengths of the publish request a transport would put on the
//! wire:
//!
//! ```text
//! PublishRequest { topic = 1: string, messages = 2: repeated PubsubMessage }
//! PubsubMessage  { data = 1: bytes, attributes = 2: map<string, string>, ordering_key = 5: string }
//! ```
//!
//! Empty scalar fields are omitted, while map entries always carry both key and value.

use crate::PubsubMessage;
use prost::encoding::{encoded_len_varint, key_len};

const TOPIC_FIELD: u32 = 1;
const MESSAGES_FIELD: u32 = 2;
const DATA_FIELD: u32 = 1;
const ATTRIBUTES_FIELD: u32 = 2;
const ORDERING_KEY_FIELD: u32 = 5;
const MAP_KEY_FIELD: u32 = 1;
const MAP_VALUE_FIELD: u32 = 2;

fn length_delimited_len(field: u32, payload_len: usize) -> usize {
    key_len(field) + encoded_len_varint(payload_len as u64) + payload_len
}

fn optional_field_len(field: u32, payload_len: usize) -> usize {
    if payload_len == 0 {
        0
    } else {
        length_delimited_len(field, payload_len)
    }
}

fn attribute_entry_len(key: &str, value: &str) -> usize {
    let entry = length_delimited_len(MAP_KEY_FIELD, key.len())
        + length_delimited_len(MAP_VALUE_FIELD, value.len());

    length_delimited_len(ATTRIBUTES_FIELD, entry)
}

/// Encoded length of a message body, excluding its own tag and length prefix.
pub fn message_encoded_len(message: &PubsubMessage) -> usize {
    let attributes: usize = message
        .attributes()
        .iter()
        .map(|(key, value)| attribute_entry_len(key, value))
        .sum();

    optional_field_len(DATA_FIELD, message.data().len())
        + attributes
        + optional_field_len(ORDERING_KEY_FIELD, message.ordering_key().len())
}

/// Bytes a message adds to a publish request, i.e. the size of a request carrying only this
/// message and no topic.
pub fn message_request_len(message: &PubsubMessage) -> usize {
    length_delimited_len(MESSAGES_FIELD, message_encoded_len(message))
}

/// Size of a publish request for `topic` carrying no messages.
pub fn empty_request_len(topic: &str) -> usize {
    optional_field_len(TOPIC_FIELD, topic.len())
}

/// Size of a publish request for `topic` carrying `messages`.
pub fn request_len<'a>(topic: &str, messages: impl IntoIterator<Item = &'a PubsubMessage>) -> usize {
    empty_request_len(topic) + messages.into_iter().map(message_request_len).sum::<usize>()
}
