use crate::error::Error;
use num_traits::{One, WrappingAdd};
use quick_protobuf::{BytesReader, MessageRead, MessageWrite, Writer};
use std::time::Duration;

pub const NET_CONNECT_TIMEOUT: Duration = Duration::from_millis(8 * 1000);

pub const NET_IO_TIMEOUT: Duration = Duration::from_millis(16 * 1000);

pub fn default_ureq_agent_builder(
    proxy_url: Option<&str>,
) -> ureq::config::ConfigBuilder<ureq::typestate::AgentScope> {
    let mut agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(5)))
        .timeout_connect(Some(NET_CONNECT_TIMEOUT))
        .timeout_recv_response(Some(NET_IO_TIMEOUT))
        .timeout_send_request(Some(NET_IO_TIMEOUT));

    if let Some(proxy_url) = proxy_url {
        let proxy = ureq::Proxy::new(proxy_url).ok();
        agent = agent.proxy(proxy);
    }

    agent
}

/// A monotonically wrapping counter, used for Mercury/audio-key sequence
/// numbers and Shannon packet nonces.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Sequence<T>(T);

impl<T: One + WrappingAdd + Copy> Sequence<T> {
    pub fn new(value: T) -> Self {
        Sequence(value)
    }

    pub fn advance(&mut self) -> T {
        let current = self.0;
        self.0 = self.0.wrapping_add(&T::one());
        current
    }
}

pub fn serialize_protobuf<T>(msg: &T) -> Result<Vec<u8>, Error>
where
    T: MessageWrite,
{
    let mut buf = Vec::with_capacity(msg.get_size());
    let mut writer = Writer::new(&mut buf);
    msg.write_message(&mut writer)?;
    Ok(buf)
}

pub fn deserialize_protobuf<T>(buf: &[u8]) -> Result<T, Error>
where
    T: MessageRead<'static>,
{
    let mut reader = BytesReader::from_bytes(buf);
    let msg = {
        let static_buf: &'static [u8] = unsafe {
            // `quick-protobuf`'s owned messages aren't compatible with the
            // `--dont_use_cow` codegen flag we rely on elsewhere; the message
            // never actually retains this slice past the call.
            std::mem::transmute(buf)
        };
        T::from_reader(&mut reader, static_buf)?
    };
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_advances_and_wraps() {
        let mut seq: Sequence<u32> = Sequence::new(u32::MAX - 1);
        assert_eq!(seq.advance(), u32::MAX - 1);
        assert_eq!(seq.advance(), u32::MAX);
        assert_eq!(seq.advance(), 0);
    }
}
