pub mod diffie_hellman;
pub mod rsa_verify;
pub mod shannon_codec;

use std::{
    io::{self, Read, Write},
    net::{Shutdown, TcpStream},
    time::Duration,
};

use byteorder::{ReadBytesExt, WriteBytesExt, BE};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::{
    connection::{
        diffie_hellman::DHLocalKeys,
        shannon_codec::{ShannonDecoder, ShannonEncoder, ShannonMsg},
    },
    credentials::Credentials,
    error::Error,
    protocol::{
        authentication::APWelcome,
        keyexchange::{APResponseMessage, ErrorCode},
    },
    resolver::Resolver,
    system_info,
    util::{deserialize_protobuf, serialize_protobuf, NET_CONNECT_TIMEOUT},
};

/// A framed TCP byte pipe. Writes accumulate in an internal buffer and only
/// hit the wire on `flush()`, so a single logical message is one `write`
/// syscall; this matters once packets are Shannon-encrypted, because nonce
/// ordering must track write ordering exactly.
pub struct Connection {
    stream: TcpStream,
    write_buf: Vec<u8>,
    closed: bool,
}

impl Connection {
    pub fn connect(addr: &str) -> Result<Self, Error> {
        log::trace!("connecting to {}", addr);
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(NET_CONNECT_TIMEOUT))?;
        log::trace!("connected");
        Ok(Self {
            stream,
            write_buf: Vec::new(),
            closed: false,
        })
    }

    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0_u8; n];
        self.stream.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_i32_be(&mut self) -> Result<i32, Error> {
        Ok(self.stream.read_i32::<BE>()?)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.write_buf.extend_from_slice(bytes);
    }

    pub fn write_i32_be(&mut self, value: i32) {
        let mut buf = [0_u8; 4];
        (&mut buf[..]).write_i32::<BE>(value).unwrap();
        self.write_buf.extend_from_slice(&buf);
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.stream.write_all(&self.write_buf)?;
        self.write_buf.clear();
        Ok(())
    }

    /// `seconds == 0` means an infinite (blocking, no timeout) read.
    pub fn set_timeout(&mut self, seconds: u64) -> Result<(), Error> {
        let timeout = if seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(seconds))
        };
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }

    pub fn close(&mut self) -> Result<(), Error> {
        if !self.closed {
            self.closed = true;
            // Idempotent: a socket already shut down on the other side still
            // returns `Ok` here, only simultaneous double-shutdown errors.
            let _ = self.stream.shutdown(Shutdown::Both);
        }
        Ok(())
    }

    fn try_clone(&self) -> Result<TcpStream, Error> {
        Ok(self.stream.try_clone()?)
    }
}

/// Result of a completed handshake: the raw stream split into independent
/// Shannon cipher halves, and the still-open control socket (used to split
/// for the 3-thread worker in `session`).
pub struct Transport {
    pub stream: TcpStream,
    pub encoder: ShannonEncoder<TcpStream>,
    pub decoder: ShannonDecoder<TcpStream>,
}

impl Transport {
    pub fn resolve_accesspoint_with_fallback(proxy_url: Option<&str>) -> String {
        Resolver::random_accesspoint_with_fallback(proxy_url)
    }

    /// Connect to `ap` and run the full key-agreement handshake.
    pub fn connect(ap: &str) -> Result<Self, Error> {
        let conn = Connection::connect(ap)?;
        Self::handshake(conn)
    }

    fn handshake(mut conn: Connection) -> Result<Self, Error> {
        let local_keys = DHLocalKeys::random();

        log::trace!("sending client hello");
        let client_nonce: [u8; 16] = rand::random();
        let hello = client_hello(local_keys.public_key(), client_nonce.into());
        let hello_packet = make_packet(&[0, 4], &hello);
        conn.write(&hello_packet);
        conn.flush()?;
        log::trace!("sent client hello");

        log::trace!("waiting for AP response");
        let apresp_packet = read_length_prefixed(&mut conn)?;
        let apresp: APResponseMessage = deserialize_protobuf(&apresp_packet[4..])?;
        log::trace!("received AP response");

        let challenge = apresp
            .challenge
            .as_ref()
            .ok_or(Error::ProtocolError("missing AP challenge".into()))?;
        let dh_challenge = challenge
            .login_crypto_challenge
            .diffie_hellman
            .as_ref()
            .ok_or(Error::ProtocolError("missing DH challenge".into()))?;

        rsa_verify::verify(&dh_challenge.gs, &dh_challenge.gs_signature)?;

        let shared_secret = local_keys.shared_secret(&dh_challenge.gs);
        let (response_hmac, send_key, recv_key) =
            compute_keys(&shared_secret, &hello_packet, &apresp_packet);

        log::trace!("sending client response");
        let response = client_response_plaintext(response_hmac);
        let response_packet = make_packet(&[], &response);
        conn.write(&response_packet);
        conn.flush()?;
        log::trace!("sent client response");

        // A late error frame (e.g. protocol mismatch) arrives instead of
        // silence. Give the server a short window to speak up, then assume
        // success.
        conn.set_timeout(1)?;
        match read_length_prefixed(&mut conn) {
            Ok(reject_packet) => {
                let rejection: APResponseMessage = deserialize_protobuf(&reject_packet[4..])?;
                log::error!("handshake rejected: {:?}", rejection.login_failed);
                return Err(Error::HandshakeRejected);
            }
            Err(Error::SocketError(ref err)) if is_timeout(err) => {
                // No error frame arrived in time: handshake succeeded.
            }
            Err(err) => return Err(err),
        }
        conn.set_timeout(0)?;

        let stream = conn.try_clone()?;
        let encoder = ShannonEncoder::new(conn.try_clone()?, &send_key);
        let decoder = ShannonDecoder::new(stream.try_clone()?, &recv_key);
        conn.close()?;

        Ok(Self {
            stream,
            encoder,
            decoder,
        })
    }

    /// Send encrypted login credentials and wait for the welcome/failure
    /// response. Returns credentials re-usable on a subsequent session.
    pub fn authenticate(
        &mut self,
        credentials: Credentials,
        device_id: &str,
    ) -> Result<(APWelcome, Credentials), Error> {
        use crate::protocol::authentication::APLoginFailed;

        let request = client_response_encrypted(credentials, device_id)?;
        self.encoder.encode(request)?;

        let response = self.decoder.decode()?;
        match response.cmd {
            ShannonMsg::AP_WELCOME => {
                let welcome: APWelcome = deserialize_protobuf(&response.payload)?;
                let reusable = Credentials::from_reusable_auth(
                    welcome.canonical_username.clone(),
                    welcome.reusable_auth_credentials.clone(),
                    welcome.reusable_auth_credentials_type,
                );
                Ok((welcome, reusable))
            }
            ShannonMsg::AUTH_FAILURE => {
                let failure: APLoginFailed = deserialize_protobuf(&response.payload)?;
                let code = failure.error_code as i32;
                Err(Error::AuthFailed {
                    code,
                    name: ErrorCode::from(code).name(),
                })
            }
            other => Err(Error::ProtocolError(format!(
                "unexpected response to login: {:#x}",
                other
            ))),
        }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn read_length_prefixed(conn: &mut Connection) -> Result<Vec<u8>, Error> {
    let size = conn.read_i32_be()? as u32;
    let rest = conn.read_exact(size as usize - 4)?;
    let mut buf = Vec::with_capacity(size as usize);
    buf.extend_from_slice(&size.to_be_bytes());
    buf.extend_from_slice(&rest);
    Ok(buf)
}

fn make_packet(prefix: &[u8], data: &[u8]) -> Vec<u8> {
    let size = prefix.len() + 4 + data.len();
    let mut buf = Vec::with_capacity(size);
    buf.extend_from_slice(prefix);
    buf.extend_from_slice(&(size as u32).to_be_bytes());
    buf.extend_from_slice(data);
    buf
}

fn client_hello(public_key: Vec<u8>, nonce: Vec<u8>) -> Vec<u8> {
    use crate::protocol::keyexchange::*;

    let hello = ClientHello {
        build_info: BuildInfo {
            platform: Platform::PLATFORM_LINUX_X86,
            product: Product::PRODUCT_PARTNER,
            product_flags: vec![],
            version: system_info::BUILD_VERSION,
        },
        cryptosuites_supported: vec![Cryptosuite::CRYPTO_SUITE_SHANNON],
        fingerprints_supported: vec![],
        powschemes_supported: vec![],
        login_crypto_hello: LoginCryptoHelloUnion {
            diffie_hellman: Some(LoginCryptoDiffieHellmanHello {
                gc: public_key,
                server_keys_known: 1,
            }),
        },
        client_nonce: nonce,
        padding: Some(vec![0x1e]),
        feature_set: None,
    };

    serialize_protobuf(&hello).expect("hand-built ClientHello always serialises")
}

fn client_response_plaintext(challenge: Vec<u8>) -> Vec<u8> {
    use crate::protocol::keyexchange::*;

    let response = ClientResponsePlaintext {
        login_crypto_response: LoginCryptoResponseUnion {
            diffie_hellman: Some(LoginCryptoDiffieHellmanResponse { hmac: challenge }),
        },
        pow_response: PoWResponseUnion::default(),
        crypto_response: CryptoResponseUnion::default(),
    };

    serialize_protobuf(&response).expect("hand-built ClientResponsePlaintext always serialises")
}

/// HMAC-SHA1 key derivation over the handshake accumulator. Returns
/// `(challenge_response, send_key, recv_key)`.
pub fn compute_keys(
    shared_secret: &[u8],
    hello_packet: &[u8],
    apresp_packet: &[u8],
) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let mut km = Vec::with_capacity(100);
    for i in 1_u8..=5 {
        let mut mac =
            Hmac::<Sha1>::new_from_slice(shared_secret).expect("HMAC accepts a key of any size");
        mac.update(hello_packet);
        mac.update(apresp_packet);
        mac.update(&[i]);
        km.extend_from_slice(&mac.finalize().into_bytes());
    }

    let mut mac = Hmac::<Sha1>::new_from_slice(&km[..20]).expect("HMAC accepts a key of any size");
    mac.update(hello_packet);
    mac.update(apresp_packet);
    let challenge = mac.finalize().into_bytes().to_vec();

    (challenge, km[20..52].to_vec(), km[52..84].to_vec())
}

fn client_response_encrypted(
    credentials: Credentials,
    device_id: &str,
) -> Result<ShannonMsg, Error> {
    use crate::protocol::authentication::{
        ClientResponseEncrypted, CpuFamily, LoginCredentials, Os, SystemInfo,
    };

    let (username, auth_data, auth_type) = credentials.into_parts();
    let response = ClientResponseEncrypted {
        login_credentials: LoginCredentials {
            username: Some(username),
            auth_data: Some(auth_data),
            typ: auth_type,
        },
        system_info: SystemInfo {
            os: Os::OS_UNKNOWN,
            cpu_family: CpuFamily::CPU_UNKNOWN,
            system_information_string: Some(format!("apsess_{}", system_info::CLIENT_VERSION)),
            device_id: Some(device_id.to_string()),
            ..SystemInfo::default()
        },
        version_string: Some(format!("apsess-{}", system_info::CLIENT_VERSION)),
        ..ClientResponseEncrypted::default()
    };

    let buf = serialize_protobuf(&response)?;
    Ok(ShannonMsg::new(ShannonMsg::LOGIN, buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_derivation_is_deterministic() {
        let shared = vec![1_u8; 20];
        let hello = b"hello-frame".to_vec();
        let apresp = b"apresp-frame".to_vec();

        let first = compute_keys(&shared, &hello, &apresp);
        let second = compute_keys(&shared, &hello, &apresp);
        assert_eq!(first, second);
        assert_eq!(first.1.len(), 32);
        assert_eq!(first.2.len(), 32);
    }
}
