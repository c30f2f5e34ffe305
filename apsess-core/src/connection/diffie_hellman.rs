use num_bigint::{BigUint, RandBigInt};

/// IETF "Oakley Group 1" prime: a fixed 768-bit MODP group used by the
/// server for key agreement. Hard-coded because it is a protocol constant,
/// not something negotiated.
const DH_PRIME: [u8; 96] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xC9, 0x0F, 0xDA, 0xA2, 0x21, 0x68, 0xC2, 0x34,
    0xC4, 0xC6, 0x62, 0x8B, 0x80, 0xDC, 0x1C, 0xD1, 0x29, 0x02, 0x4E, 0x08, 0x8A, 0x67, 0xCC, 0x74,
    0x02, 0x0B, 0xBE, 0xA6, 0x3B, 0x13, 0x9B, 0x22, 0x51, 0x4A, 0x08, 0x79, 0x8E, 0x34, 0x04, 0xDD,
    0xEF, 0x95, 0x19, 0xB3, 0xCD, 0x3A, 0x43, 0x1B, 0x30, 0x2B, 0x0A, 0x6D, 0xF2, 0x5F, 0x14, 0x37,
    0x4F, 0xE1, 0x35, 0x6D, 0x6D, 0x51, 0xC2, 0x45, 0xE4, 0x85, 0xB5, 0x76, 0x62, 0x5E, 0x7E, 0xC6,
    0xF4, 0x4C, 0x42, 0xE9, 0xA6, 0x3A, 0x36, 0x20, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
];

const DH_GENERATOR: u8 = 2;

/// Number of random bits used for the local private scalar.
const PRIVATE_KEY_BITS: u64 = 95;

pub struct DHLocalKeys {
    private_key: BigUint,
    public_key: BigUint,
}

impl DHLocalKeys {
    pub fn random() -> Self {
        let mut rng = rand::rng();
        let private_key = rng.gen_biguint(PRIVATE_KEY_BITS);
        let public_key = DHLocalKeys::powm(&private_key);
        Self {
            private_key,
            public_key,
        }
    }

    /// Minimal unsigned big-endian encoding of the public key.
    pub fn public_key(&self) -> Vec<u8> {
        self.public_key.to_bytes_be()
    }

    /// Compute the shared secret `gs^x mod p`, leading-zero-stripped to the
    /// minimal big-endian encoding, matching the peer's representation.
    pub fn shared_secret(&self, gs: &[u8]) -> Vec<u8> {
        let gs = BigUint::from_bytes_be(gs);
        let shared = gs.modpow(&self.private_key, &prime());
        shared.to_bytes_be()
    }

    fn powm(exponent: &BigUint) -> BigUint {
        BigUint::from(DH_GENERATOR).modpow(exponent, &prime())
    }
}

fn prime() -> BigUint {
    BigUint::from_bytes_be(&DH_PRIME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_is_nonzero_and_within_modulus() {
        let keys = DHLocalKeys::random();
        let public = keys.public_key();
        assert!(!public.is_empty());
        assert!(BigUint::from_bytes_be(&public) < prime());
    }

    #[test]
    fn shared_secret_is_symmetric() {
        let alice = DHLocalKeys::random();
        let bob = DHLocalKeys::random();
        let alice_shared = alice.shared_secret(&bob.public_key());
        let bob_shared = bob.shared_secret(&alice.public_key());
        assert_eq!(alice_shared, bob_shared);
    }
}
