use crate::error::Error;

/// Client ID for the desktop keymaster client, used by the token provider.
pub const CLIENT_ID: &str = "65b708073fc0480ea92a077233ca87bd";

/// Semantic version of the desktop client we present ourselves as.
pub const CLIENT_VERSION: &str = "1.2.52.442";

/// Numeric build version sent in `ClientHello.build_info`.
pub const BUILD_VERSION: u64 = 109_800_078;

const HEX_DIGITS: &[u8] = b"0123456789abcdef";

/// Validate a caller-supplied device ID (must be exactly 40 hex characters),
/// or generate a fresh random one if none was given.
///
/// Validation is unconditional whenever a device ID is explicitly supplied.
pub fn device_id(explicit: Option<&str>) -> Result<String, Error> {
    match explicit {
        Some(id) => {
            let valid = id.len() == 40 && id.bytes().all(|b| HEX_DIGITS.contains(&b));
            if valid {
                Ok(id.to_string())
            } else {
                Err(Error::ConfigError(
                    "device_id must be exactly 40 hex characters".into(),
                ))
            }
        }
        None => Ok(random_device_id()),
    }
}

fn random_device_id() -> String {
    let bytes: [u8; 20] = rand::random();
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_device_id() {
        assert!(device_id(Some("deadbeef")).is_err());
    }

    #[test]
    fn accepts_valid_device_id() {
        let id = "a".repeat(40);
        assert_eq!(device_id(Some(&id)).unwrap(), id);
    }

    #[test]
    fn rejects_non_hex_device_id() {
        let id = "z".repeat(40);
        assert!(device_id(Some(&id)).is_err());
    }

    #[test]
    fn generates_random_device_id_when_absent() {
        let a = device_id(None).unwrap();
        let b = device_id(None).unwrap();
        assert_eq!(a.len(), 40);
        assert_ne!(a, b);
    }
}
