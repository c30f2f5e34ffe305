use std::{
    collections::HashMap,
    io::{Cursor, Read},
};

use byteorder::{ReadBytesExt, BE};
use crossbeam_channel::Sender;

use crate::{connection::shannon_codec::ShannonMsg, error::Error, item_id::{FileId, ItemId}, util::Sequence};

/// A 128-bit AES key covering one `(track, file)` pair, handed back by the
/// access point in response to a `REQUEST_KEY` packet.
#[derive(Clone, Copy)]
pub struct AudioKey(pub [u8; 16]);

pub struct AudioKeyDispatcher {
    sequence: Sequence<u32>,
    pending: HashMap<u32, Sender<Result<AudioKey, Error>>>,
}

impl AudioKeyDispatcher {
    pub fn new() -> Self {
        Self {
            sequence: Sequence::new(0),
            pending: HashMap::new(),
        }
    }

    pub fn enqueue_request(
        &mut self,
        track: ItemId,
        file: FileId,
        callback: Sender<Result<AudioKey, Error>>,
    ) -> ShannonMsg {
        let seq = self.sequence.advance();
        self.pending.insert(seq, callback);
        Self::make_key_request(seq, track, file)
    }

    fn make_key_request(seq: u32, track: ItemId, file: FileId) -> ShannonMsg {
        let mut buf = Vec::new();
        buf.extend(file.0);
        buf.extend(track.to_raw());
        buf.extend(seq.to_be_bytes());
        buf.extend(0_u16.to_be_bytes());
        ShannonMsg::new(ShannonMsg::REQUEST_KEY, buf)
    }

    pub fn handle_aes_key(&mut self, msg: ShannonMsg) {
        if let Err(err) = self.try_handle_aes_key(msg) {
            log::warn!("malformed audio key packet: {:?}", err);
        }
    }

    fn try_handle_aes_key(&mut self, msg: ShannonMsg) -> Result<(), Error> {
        let mut payload = Cursor::new(msg.payload);
        let seq = payload.read_u32::<BE>()?;

        let Some(tx) = self.pending.remove(&seq) else {
            log::warn!("received unexpected audio key msg, seq: {}", seq);
            return Ok(());
        };

        let mut key = [0_u8; 16];
        payload.read_exact(&mut key)?;

        if tx.send(Ok(AudioKey(key))).is_err() {
            log::warn!("missing receiver for audio key, seq: {}", seq);
        }
        Ok(())
    }

    pub fn handle_aes_key_error(&mut self, msg: ShannonMsg) {
        if let Err(err) = self.try_handle_aes_key_error(msg) {
            log::warn!("malformed audio key error packet: {:?}", err);
        }
    }

    fn try_handle_aes_key_error(&mut self, msg: ShannonMsg) -> Result<(), Error> {
        let mut payload = Cursor::new(msg.payload);
        let seq = payload.read_u32::<BE>()?;

        let Some(tx) = self.pending.remove(&seq) else {
            log::warn!("received unknown audio key error, seq: {}", seq);
            return Ok(());
        };

        log::error!("audio key error, seq: {}", seq);
        if tx.send(Err(Error::UnexpectedResponse)).is_err() {
            log::warn!("missing receiver for audio key error, seq: {}", seq);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn delivers_key_to_matching_request() {
        let mut dispatcher = AudioKeyDispatcher::new();
        let (tx, rx) = unbounded();
        let request = dispatcher.enqueue_request(
            ItemId::from_raw(&[1; 16], crate::item_id::ItemIdType::Track).unwrap(),
            FileId([2; 20]),
            tx,
        );
        assert_eq!(request.cmd, ShannonMsg::REQUEST_KEY);

        let mut payload = 0_u32.to_be_bytes().to_vec();
        payload.extend([9_u8; 16]);
        dispatcher.handle_aes_key(ShannonMsg::new(ShannonMsg::AES_KEY, payload));

        let key = rx.recv().unwrap().unwrap();
        assert_eq!(key.0, [9_u8; 16]);
    }
}
