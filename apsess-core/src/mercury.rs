use std::{
    collections::HashMap,
    io::{Cursor, Read, Write},
};

use byteorder::{ReadBytesExt, WriteBytesExt, BE};
use crossbeam_channel::Sender;

use crate::{connection::shannon_codec::ShannonMsg, error::Error, protocol::mercury::Header, util::{deserialize_protobuf, serialize_protobuf, Sequence}};

const FLAG_FINAL: u8 = 0x01;
const FLAG_PARTIAL: u8 = 0x02;

/// An outbound Mercury request, carried as the request's `Header` protobuf
/// plus any extra raw payload parts.
pub struct MercuryRequest {
    pub method: String,
    pub uri: String,
    pub payload: Vec<Vec<u8>>,
}

impl MercuryRequest {
    pub fn get(uri: String) -> Self {
        Self {
            method: "GET".to_string(),
            uri,
            payload: Vec::new(),
        }
    }

    pub fn send(uri: String, payload: Vec<u8>) -> Self {
        Self {
            method: "SEND".to_string(),
            uri,
            payload: vec![payload],
        }
    }
}

/// A fully reassembled Mercury response: the header plus every payload part
/// received across possibly multiple partial packets.
#[derive(Debug, Default)]
pub struct MercuryResponse {
    pub uri: Option<String>,
    pub status_code: Option<i32>,
    pub payload: Vec<Vec<u8>>,
}

/// A `spotify:...` URI subscription: every future event packet matching
/// `uri` is forwarded to `callback` instead of (or in addition to) being
/// treated as a request response.
pub struct MercurySubscription {
    pub uri: String,
    pub callback: Sender<MercuryResponse>,
}

/// One wire packet's worth of a sequence: its flags (final/partial) and the
/// raw parts it carried, kept around until the sequence's final packet
/// arrives so [`collect_parts`] can stitch a part split across packets back
/// together.
struct RawMessage {
    flags: u8,
    count: u16,
    parts: Vec<Vec<u8>>,
}

struct PendingRequest {
    messages: Vec<RawMessage>,
    callback: Sender<MercuryResponse>,
}

/// Request/response multiplexer riding inside the encrypted packet stream.
/// Lives on the dispatch thread; `enqueue_request` produces the outbound
/// packet, `handle_mercury_req` consumes inbound ones.
pub struct MercuryDispatcher {
    sequence: Sequence<u32>,
    pending: HashMap<u64, PendingRequest>,
    pending_events: HashMap<u64, Vec<RawMessage>>,
    subscriptions: Vec<MercurySubscription>,
}

impl MercuryDispatcher {
    pub fn new() -> Self {
        Self {
            sequence: Sequence::new(0),
            pending: HashMap::new(),
            pending_events: HashMap::new(),
            subscriptions: Vec::new(),
        }
    }

    pub fn enqueue_request(
        &mut self,
        request: MercuryRequest,
        callback: Sender<MercuryResponse>,
    ) -> ShannonMsg {
        let seq = self.sequence.advance() as u64;
        self.pending.insert(
            seq,
            PendingRequest {
                messages: Vec::new(),
                callback,
            },
        );
        Self::make_request_packet(seq, &request)
    }

    /// Register a subscription and return the `MERCURY_SUB` wire packet that
    /// asks the server to start delivering matching events.
    pub fn subscribe(&mut self, uri: String, callback: Sender<MercuryResponse>) -> ShannonMsg {
        let request = MercuryRequest {
            method: "SUB".to_string(),
            uri: uri.clone(),
            payload: Vec::new(),
        };
        let seq = self.sequence.advance() as u64;
        let msg = Self::make_request_packet(seq, &request);
        self.subscriptions.push(MercurySubscription { uri, callback });
        ShannonMsg::new(ShannonMsg::MERCURY_SUB, msg.payload)
    }

    fn make_request_packet(seq: u64, request: &MercuryRequest) -> ShannonMsg {
        let header = Header {
            uri: Some(request.uri.clone()),
            method: Some(request.method.clone()),
            content_type: None,
            status_code: None,
            user_fields: Vec::new(),
        };
        let header_bytes = serialize_protobuf(&header).unwrap_or_default();

        let mut parts = Vec::with_capacity(1 + request.payload.len());
        parts.push(header_bytes);
        parts.extend(request.payload.iter().cloned());

        let mut buf = Vec::new();
        let seq_bytes = seq.to_be_bytes();
        buf.write_u16::<BE>(seq_bytes.len() as u16).unwrap();
        buf.extend_from_slice(&seq_bytes);
        buf.write_u8(FLAG_FINAL).unwrap();
        buf.write_u16::<BE>(parts.len() as u16).unwrap();
        for part in &parts {
            buf.write_u16::<BE>(part.len() as u16).unwrap();
            buf.extend_from_slice(part);
        }

        ShannonMsg::new(ShannonMsg::MERCURY_REQ, buf)
    }

    /// Dispatch an inbound `MERCURY_REQ`/`MERCURY_SUB`/`MERCURY_EVENT`
    /// packet, reassembling multi-part responses and fanning completed ones
    /// out to either the originating request's callback or any matching
    /// subscription.
    pub fn handle_mercury_req(&mut self, msg: ShannonMsg) {
        if let Err(err) = self.try_handle(msg) {
            log::warn!("malformed mercury packet: {:?}", err);
        }
    }

    fn try_handle(&mut self, msg: ShannonMsg) -> Result<(), Error> {
        let mut cursor = Cursor::new(msg.payload);

        let seq_len = cursor.read_u16::<BE>()?;
        let mut seq_bytes = vec![0_u8; seq_len as usize];
        cursor.read_exact(&mut seq_bytes)?;
        let seq = seq_bytes
            .iter()
            .fold(0_u64, |acc, b| (acc << 8) | *b as u64);

        let flags = cursor.read_u8()?;
        let count = cursor.read_u16::<BE>()?;

        let mut parts = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let len = cursor.read_u16::<BE>()?;
            let mut part = vec![0_u8; len as usize];
            cursor.read_exact(&mut part)?;
            parts.push(part);
        }

        let is_final = flags == FLAG_FINAL;
        let message = RawMessage { flags, count, parts };

        if let Some(mut pending) = self.pending.remove(&seq) {
            pending.messages.push(message);
            if is_final {
                let response = Self::assemble(collect_parts(pending.messages))?;
                if pending.callback.send(response).is_err() {
                    log::warn!("missing receiver for mercury response, seq: {}", seq);
                }
            } else {
                self.pending.insert(seq, pending);
            }
            return Ok(());
        }

        // Not a response to a pending request: treat it as a subscription
        // event, accumulating parts across packets the same way as for a
        // tracked request until the final packet of the sequence arrives.
        let mut messages = self.pending_events.remove(&seq).unwrap_or_default();
        messages.push(message);
        if is_final {
            let response = Self::assemble(collect_parts(messages))?;
            if let Some(uri) = response.uri.as_ref() {
                for sub in &self.subscriptions {
                    if uri.starts_with(&sub.uri) {
                        let _ = sub.callback.send(MercuryResponse {
                            uri: response.uri.clone(),
                            status_code: response.status_code,
                            payload: response.payload.clone(),
                        });
                    }
                }
            }
        } else {
            self.pending_events.insert(seq, messages);
        }

        Ok(())
    }

    fn assemble(mut parts: Vec<Vec<u8>>) -> Result<MercuryResponse, Error> {
        if parts.is_empty() {
            return Ok(MercuryResponse::default());
        }
        let header_bytes = parts.remove(0);
        let header: Header = deserialize_protobuf(&header_bytes)?;
        Ok(MercuryResponse {
            uri: header.uri,
            status_code: header.status_code,
            payload: parts,
        })
    }
}

/// Stitch a sequence's packets back into logical parts. A packet flagged
/// `PARTIAL` has its last part continued by the first part of the next
/// packet in the same sequence; every other part is already complete.
fn collect_parts(messages: Vec<RawMessage>) -> Vec<Vec<u8>> {
    let mut results = Vec::new();
    let mut carry: Option<Vec<u8>> = None;

    for msg in messages {
        let last_index = msg.count.wrapping_sub(1);
        for (i, mut part) in msg.parts.into_iter().enumerate() {
            if let Some(mut prefix) = carry.take() {
                prefix.extend(part);
                part = prefix;
            }
            let is_last_part = i as u16 == last_index;
            if msg.flags == FLAG_PARTIAL && is_last_part {
                carry = Some(part);
            } else {
                results.push(part);
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn request_response_round_trip() {
        let mut dispatcher = MercuryDispatcher::new();
        let (tx, rx) = unbounded();
        let request_msg = dispatcher.enqueue_request(MercuryRequest::get("hm://test".into()), tx);

        // Build a matching response packet for sequence 0 with one extra part.
        let header = Header {
            uri: Some("hm://test".into()),
            status_code: Some(200),
            content_type: None,
            method: None,
            user_fields: Vec::new(),
        };
        let header_bytes = serialize_protobuf(&header).unwrap();
        let payload = b"body".to_vec();

        let mut buf = Vec::new();
        buf.write_u16::<BE>(8).unwrap();
        buf.extend_from_slice(&0_u64.to_be_bytes());
        buf.write_u8(FLAG_FINAL).unwrap();
        buf.write_u16::<BE>(2).unwrap();
        buf.write_u16::<BE>(header_bytes.len() as u16).unwrap();
        buf.extend_from_slice(&header_bytes);
        buf.write_u16::<BE>(payload.len() as u16).unwrap();
        buf.extend_from_slice(&payload);

        assert_eq!(request_msg.cmd, ShannonMsg::MERCURY_REQ);

        dispatcher.handle_mercury_req(ShannonMsg::new(ShannonMsg::MERCURY_REQ, buf));

        let response = rx.recv().unwrap();
        assert_eq!(response.status_code, Some(200));
        assert_eq!(response.payload, vec![b"body".to_vec()]);
    }

    fn packet(seq: u64, flags: u8, parts: &[&[u8]]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u16::<BE>(8).unwrap();
        buf.extend_from_slice(&seq.to_be_bytes());
        buf.write_u8(flags).unwrap();
        buf.write_u16::<BE>(parts.len() as u16).unwrap();
        for part in parts {
            buf.write_u16::<BE>(part.len() as u16).unwrap();
            buf.extend_from_slice(part);
        }
        buf
    }

    #[test]
    fn stitches_header_split_across_a_partial_packet() {
        let mut dispatcher = MercuryDispatcher::new();
        let (tx, rx) = unbounded();
        dispatcher.enqueue_request(MercuryRequest::get("hm://test".into()), tx);

        let header = Header {
            uri: Some("hm://test".into()),
            status_code: Some(200),
            content_type: None,
            method: None,
            user_fields: Vec::new(),
        };
        let header_bytes = serialize_protobuf(&header).unwrap();
        let (header_head, header_tail) = header_bytes.split_at(header_bytes.len() / 2);

        // First packet ends mid-header: its last part is marked PARTIAL and
        // continues in the next packet's first part.
        dispatcher.handle_mercury_req(ShannonMsg::new(
            ShannonMsg::MERCURY_REQ,
            packet(0, FLAG_PARTIAL, &[header_head]),
        ));
        dispatcher.handle_mercury_req(ShannonMsg::new(
            ShannonMsg::MERCURY_REQ,
            packet(0, FLAG_FINAL, &[header_tail, b"body"]),
        ));

        let response = rx.recv().unwrap();
        assert_eq!(response.status_code, Some(200));
        assert_eq!(response.payload, vec![b"body".to_vec()]);
    }

    #[test]
    fn subscription_event_split_across_packets_is_not_dropped() {
        let mut dispatcher = MercuryDispatcher::new();
        let (tx, rx) = unbounded();
        dispatcher.subscribe("hm://events".into(), tx);

        let header = Header {
            uri: Some("hm://events/1".into()),
            status_code: Some(200),
            content_type: None,
            method: None,
            user_fields: Vec::new(),
        };
        let header_bytes = serialize_protobuf(&header).unwrap();

        // An untracked sequence (not a response to any enqueued request):
        // its first packet isn't final, so it must not be dropped before
        // the second, final packet arrives.
        dispatcher.handle_mercury_req(ShannonMsg::new(
            ShannonMsg::MERCURY_REQ,
            packet(7, FLAG_PARTIAL, &[&header_bytes]),
        ));
        dispatcher.handle_mercury_req(ShannonMsg::new(
            ShannonMsg::MERCURY_REQ,
            packet(7, FLAG_FINAL, &[b""]),
        ));

        let response = rx.recv().unwrap();
        assert_eq!(response.uri, Some("hm://events/1".into()));
    }
}
