use authbeat_client::{hour_bucket, AuthError, ObfuscationContext, SLACK_HOURS};
use pretty_assertions::assert_eq;

const NOW: i64 = 1_700_000_000;
const HOUR: i64 = 3_600;
const PAYLOAD: &[u8] = br#"{"a":true,"m":"ok","c":1700000000,"l":1700000000}"#;

fn ctx(validity_days: u32) -> ObfuscationContext {
    ObfuscationContext::new("https://license.test", "device-1", "TestApp", validity_days)
}

#[test]
fn same_hour_round_trip() {
    let ctx = ctx(7);
    let blob = ctx.obfuscate(PAYLOAD, NOW).unwrap();
    assert_eq!(ctx.deobfuscate(&blob, NOW).unwrap(), PAYLOAD);
    assert_eq!(ctx.deobfuscate(&blob, NOW + 59).unwrap(), PAYLOAD);
}

#[test]
fn blob_hides_plaintext() {
    let blob = ctx(7).obfuscate(PAYLOAD, NOW).unwrap();
    let text = String::from_utf8_lossy(&blob);
    assert!(!text.contains("\"m\""));
    assert!(!text.contains("ok"));
}

#[test]
fn blob_depends_on_write_hour() {
    let ctx = ctx(7);
    let a = ctx.obfuscate(PAYLOAD, NOW).unwrap();
    let b = ctx.obfuscate(PAYLOAD, NOW + HOUR).unwrap();
    assert_ne!(a, b);
    assert_eq!(a, ctx.obfuscate(PAYLOAD, NOW).unwrap());
}

#[test]
fn slack_window_with_zero_validity() {
    let ctx = ctx(0);
    let blob = ctx.obfuscate(PAYLOAD, NOW).unwrap();

    assert_eq!(ctx.deobfuscate(&blob, NOW + SLACK_HOURS * HOUR).unwrap(), PAYLOAD);
    assert_eq!(ctx.deobfuscate(&blob, NOW - SLACK_HOURS * HOUR).unwrap(), PAYLOAD);
    assert!(matches!(
        ctx.deobfuscate(&blob, NOW + (SLACK_HOURS + 1) * HOUR),
        Err(AuthError::Recovery)
    ));
    assert!(matches!(
        ctx.deobfuscate(&blob, NOW - (SLACK_HOURS + 1) * HOUR),
        Err(AuthError::Recovery)
    ));
}

#[test]
fn window_scales_with_validity() {
    let ctx = ctx(7);
    let blob = ctx.obfuscate(PAYLOAD, NOW).unwrap();
    let edge = ctx.max_hour_offset();
    assert_eq!(edge, 7 * 24 + SLACK_HOURS);

    assert!(ctx.deobfuscate(&blob, NOW + edge * HOUR).is_ok());
    assert!(ctx.deobfuscate(&blob, NOW + (edge + 1) * HOUR).is_err());
}

#[test]
fn wrong_identity_cannot_recover() {
    let blob = ctx(7).obfuscate(PAYLOAD, NOW).unwrap();

    let other_device = ObfuscationContext::new("https://license.test", "device-2", "TestApp", 7);
    let other_software = ObfuscationContext::new("https://license.test", "device-1", "Other", 7);
    let other_server = ObfuscationContext::new("https://other.test", "device-1", "TestApp", 7);

    assert!(matches!(other_device.deobfuscate(&blob, NOW), Err(AuthError::Recovery)));
    assert!(matches!(other_software.deobfuscate(&blob, NOW), Err(AuthError::Recovery)));
    assert!(matches!(other_server.deobfuscate(&blob, NOW), Err(AuthError::Recovery)));
}

#[test]
fn short_input_is_unrecoverable() {
    let ctx = ctx(7);
    assert!(matches!(ctx.deobfuscate(&[], NOW), Err(AuthError::Recovery)));
    assert!(matches!(ctx.deobfuscate(&[0u8; 7], NOW), Err(AuthError::Recovery)));
}

#[test]
fn garbage_is_unrecoverable() {
    let garbage: Vec<u8> = (0..200u16).map(|i| (i * 37 % 251) as u8).collect();
    assert!(matches!(ctx(1).deobfuscate(&garbage, NOW), Err(AuthError::Recovery)));
}

#[test]
fn truncated_blob_is_unrecoverable() {
    let ctx = ctx(7);
    let blob = ctx.obfuscate(PAYLOAD, NOW).unwrap();
    assert!(ctx.deobfuscate(&blob[..blob.len() - 5], NOW).is_err());
}

#[test]
fn trailing_bytes_beyond_length_are_ignored() {
    let ctx = ctx(7);
    let mut blob = ctx.obfuscate(PAYLOAD, NOW).unwrap();
    blob.extend_from_slice(&[0xAA; 16]);
    assert_eq!(ctx.deobfuscate(&blob, NOW).unwrap(), PAYLOAD);
}

#[test]
fn prefix_tag_changes_per_hour() {
    let ctx = ctx(7);
    let bucket = hour_bucket(NOW);
    assert_ne!(ctx.prefix_tag(bucket), ctx.prefix_tag(bucket + 1));
    assert_eq!(ctx.prefix_tag(bucket), ctx.prefix_tag(hour_bucket(NOW + 1)));
}

#[test]
fn empty_plaintext_round_trips() {
    let ctx = ctx(7);
    let blob = ctx.obfuscate(b"", NOW).unwrap();
    assert_eq!(ctx.deobfuscate(&blob, NOW).unwrap(), b"");
}

/// Written by an independent zlib/XOR encoder (compression level 9) at `NOW`
/// for device "device-1", software "TestApp", server "https://license.test".
const FOREIGN_BLOB: &str = "e1f9d9753610d2585cf4b10870c832808cff67ea47d6974aaeb671985f7d913c25fe2dc9676fc68e6e634b8c6bd6d61897e11dbf140167e4989215b5e3bbcedc";
const FOREIGN_PLAINTEXT: &[u8] = br#"{"a":true,"m":"device authorized","c":1700000000,"l":1700000000}"#;

#[test]
fn recovers_blob_from_foreign_encoder() {
    let blob = hex::decode(FOREIGN_BLOB).unwrap();
    let ctx = ctx(7);
    assert_eq!(ctx.deobfuscate(&blob, NOW).unwrap(), FOREIGN_PLAINTEXT);
    assert_eq!(ctx.deobfuscate(&blob, NOW + 5 * 24 * HOUR).unwrap(), FOREIGN_PLAINTEXT);
}

#[test]
fn foreign_blob_header_matches_prefix_tag() {
    use sha2::{Digest, Sha256};

    let blob = hex::decode(FOREIGN_BLOB).unwrap();
    let ctx = ctx(7);
    let tag = ctx.prefix_tag(hour_bucket(NOW));
    let mut seed = ctx.key_material().to_vec();
    seed.extend_from_slice(&tag);
    let outer = Sha256::digest(&seed);

    let head: Vec<u8> = blob[..4].iter().zip(outer.iter()).map(|(b, k)| b ^ k).collect();
    assert_eq!(head, tag);
}
