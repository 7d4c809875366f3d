//! Extended inquiry response and class-of-device derivation.
//!
//! EIR layout:
//! ```text
//! ┌──────┬──────────────┬────────────┬──────┬─────────────────┬────────────────┐
//! │ len  │ 0x08 | 0x09  │ name bytes │ len  │ 0x02 | 0x03     │ uuid16 (LE)... │
//! └──────┴──────────────┴────────────┴──────┴─────────────────┴────────────────┘
//! ```
//! followed by zero padding up to [`EIR_LEN`] bytes.

use crate::protocol::event::EIR_LEN;
use crate::protocol::params::trim_name;
use crate::types::ServiceUuid;

/// 16-bit service UUIDs, more available.
pub const EIR_UUID16_SOME: u8 = 0x02;

/// 16-bit service UUIDs, complete list.
pub const EIR_UUID16_ALL: u8 = 0x03;

/// Shortened local name.
pub const EIR_NAME_SHORT: u8 = 0x08;

/// Complete local name.
pub const EIR_NAME_COMPLETE: u8 = 0x09;

/// Default longest name carried in full.
pub const DEFAULT_MAX_NAME_LEN: usize = 48;

/// PnP information service, carried in its own EIR field.
const PNP_INFO_SVCLASS_ID: u16 = 0x1200;

/// Lowest short UUID that names a service class.
const MIN_SERVICE_CLASS: u16 = 0x1100;

/// Builds the EIR blob for a name and a set of service UUIDs.
///
/// Returns `None` if any UUID is not derived from the base UUID; no partial
/// blob is ever produced.
#[must_use]
pub fn build_eir(name: &[u8], uuids: &[ServiceUuid], max_name_len: usize) -> Option<[u8; EIR_LEN]> {
    let mut eir = [0u8; EIR_LEN];
    let mut pos = 0;

    let name = trim_name(name);
    if !name.is_empty() {
        let max_name_len = max_name_len.min(EIR_LEN - 2);
        let (len, kind) = if name.len() > max_name_len {
            (max_name_len, EIR_NAME_SHORT)
        } else {
            (name.len(), EIR_NAME_COMPLETE)
        };
        eir[0] = (len + 1) as u8;
        eir[1] = kind;
        eir[2..2 + len].copy_from_slice(&name[..len]);
        pos = len + 2;
    }

    let mut list: Vec<u16> = Vec::new();
    let mut used = pos;
    let mut truncated = false;

    for service in uuids {
        let short = match service.uuid.to_u16() {
            Some(0) | None => {
                tracing::warn!("eir: {:?} has no 16-bit form, not rebuilding", service.uuid);
                return None;
            }
            Some(short) => short,
        };

        if short < MIN_SERVICE_CLASS || short == PNP_INFO_SVCLASS_ID {
            continue;
        }

        // Field header plus the next UUID must still fit
        if used + 2 + 2 > EIR_LEN {
            truncated = true;
            break;
        }

        if !list.contains(&short) {
            list.push(short);
            used += 2;
        }
    }

    if !list.is_empty() {
        eir[pos] = (list.len() * 2 + 1) as u8;
        eir[pos + 1] = if truncated {
            EIR_UUID16_SOME
        } else {
            EIR_UUID16_ALL
        };
        pos += 2;
        for short in list {
            eir[pos..pos + 2].copy_from_slice(&short.to_le_bytes());
            pos += 2;
        }
    }

    Some(eir)
}

/// Builds the class of device: `[minor, major, service classes]`.
#[must_use]
pub fn build_class(major: u8, minor: u8, uuids: &[ServiceUuid]) -> [u8; 3] {
    let services = uuids.iter().fold(0u8, |acc, s| acc | s.svc_hint);
    [minor, major, services]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Uuid128;

    fn service(short: u16, hint: u8) -> ServiceUuid {
        ServiceUuid {
            uuid: Uuid128::from_u16(short),
            svc_hint: hint,
        }
    }

    #[test]
    fn test_complete_name() {
        let eir = build_eir(b"box", &[], DEFAULT_MAX_NAME_LEN).unwrap();
        assert_eq!(&eir[..5], &[4, EIR_NAME_COMPLETE, b'b', b'o', b'x']);
        assert!(eir[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_short_name() {
        let name = [b'a'; 60];
        let eir = build_eir(&name, &[], DEFAULT_MAX_NAME_LEN).unwrap();
        assert_eq!(eir[0], 49);
        assert_eq!(eir[1], EIR_NAME_SHORT);
        assert_eq!(eir[50], 0);
    }

    #[test]
    fn test_uuid_list_dedup_and_filter() {
        let uuids = [
            service(0x110B, 0),
            service(0x110B, 0),
            service(0x1000, 0), // below service classes
            service(PNP_INFO_SVCLASS_ID, 0),
            service(0x111F, 0),
        ];
        let eir = build_eir(b"", &uuids, DEFAULT_MAX_NAME_LEN).unwrap();
        assert_eq!(&eir[..6], &[5, EIR_UUID16_ALL, 0x0B, 0x11, 0x1F, 0x11]);
    }

    #[test]
    fn test_non_base_uuid_aborts() {
        let mut bytes = *Uuid128::from_u16(0x110B).as_bytes();
        bytes[0] ^= 0xFF;
        let uuids = [
            service(0x110B, 0),
            ServiceUuid {
                uuid: Uuid128::new(bytes),
                svc_hint: 0,
            },
        ];
        assert!(build_eir(b"box", &uuids, DEFAULT_MAX_NAME_LEN).is_none());
    }

    #[test]
    fn test_truncated_list_marked_some() {
        let uuids: Vec<_> = (0..130u16).map(|i| service(0x1100 + i, 0)).collect();
        let eir = build_eir(b"", &uuids, DEFAULT_MAX_NAME_LEN).unwrap();
        assert_eq!(eir[1], EIR_UUID16_SOME);
        let count = (usize::from(eir[0]) - 1) / 2;
        assert_eq!(count, 119);
        assert_eq!(2 + count * 2, EIR_LEN);
    }

    #[test]
    fn test_class() {
        let uuids = [service(0x110B, 0x20), service(0x111F, 0x40)];
        assert_eq!(build_class(0x04, 0x14, &uuids), [0x14, 0x04, 0x60]);
        assert_eq!(build_class(0x01, 0x00, &[]), [0x00, 0x01, 0x00]);
    }
}
