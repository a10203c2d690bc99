use authbeat_client::{generate_device_id, DeviceFacts, DeviceIdentity, DeviceInfo};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn facts() -> DeviceFacts {
    DeviceFacts {
        system: "linux".into(),
        release: "Debian GNU/Linux 12".into(),
        machine: "x86_64".into(),
        processor: "x86_64".into(),
        hostname: "build-01".into(),
        machine_id: Some("5f2b0c1e9a".into()),
        cpu_count: 8,
        disk_id: "/".into(),
    }
}

fn identity(dir: &TempDir) -> DeviceIdentity {
    DeviceIdentity::new("https://license.test", "TestApp", Some(dir.path().to_path_buf()))
}

#[test]
fn generated_id_is_stable_hex() {
    let id = generate_device_id(&facts(), "TestApp");
    assert_eq!(id.len(), 32);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(id, generate_device_id(&facts(), "TestApp"));
}

#[test]
fn generated_id_depends_on_software_and_hardware() {
    let base = generate_device_id(&facts(), "TestApp");
    assert_ne!(base, generate_device_id(&facts(), "Other"));

    let mut other = facts();
    other.machine_id = Some("different".into());
    assert_ne!(base, generate_device_id(&other, "TestApp"));
}

#[test]
fn hostname_does_not_affect_id() {
    let mut renamed = facts();
    renamed.hostname = "renamed".into();
    assert_eq!(
        generate_device_id(&facts(), "TestApp"),
        generate_device_id(&renamed, "TestApp")
    );
}

#[test]
fn no_facts_falls_back_to_uuid() {
    let id = generate_device_id(&DeviceFacts::default(), "");
    assert!(uuid::Uuid::parse_str(&id).is_ok());
    assert_ne!(id, generate_device_id(&DeviceFacts::default(), ""));
}

#[test]
fn software_name_alone_falls_back_to_uuid() {
    let id = generate_device_id(&DeviceFacts::default(), "TestApp");
    assert!(uuid::Uuid::parse_str(&id).is_ok());
    assert_ne!(id, generate_device_id(&DeviceFacts::default(), "TestApp"));
}

#[test]
fn empty_software_name_still_hashes_hardware() {
    let id = generate_device_id(&facts(), "");
    assert_eq!(id.len(), 32);
    assert!(!id.contains('-'));
    assert_ne!(id, generate_device_id(&facts(), "TestApp"));
}

#[test]
fn store_path_layout() {
    let dir = TempDir::new().unwrap();
    let path = identity(&dir).path();
    let name = path.file_name().unwrap().to_str().unwrap();

    assert_eq!(path.parent().unwrap(), dir.path());
    assert!(name.starts_with("device_"));
    assert!(name.ends_with(".txt"));
    // device_ + 12 + _ + 8 + .txt
    assert_eq!(name.len(), 7 + 12 + 1 + 8 + 4);
}

#[test]
fn empty_software_uses_default_suffix() {
    let dir = TempDir::new().unwrap();
    let identity = DeviceIdentity::new("https://license.test", "", Some(dir.path().to_path_buf()));
    let path = identity.path();
    assert!(path.to_str().unwrap().ends_with("_default.txt"));
}

#[test]
fn generated_id_is_persisted_and_reused() {
    let dir = TempDir::new().unwrap();
    let identity = identity(&dir);
    assert!(identity.load().is_none());

    let first = identity.resolve(None, &facts());
    assert_eq!(identity.load().as_deref(), Some(first.as_str()));

    let mut changed = facts();
    changed.machine_id = Some("new-board".into());
    assert_eq!(identity.resolve(None, &changed), first);
}

#[test]
fn provided_id_wins_and_is_persisted() {
    let dir = TempDir::new().unwrap();
    let identity = identity(&dir);
    identity.persist("old-id").unwrap();

    assert_eq!(identity.resolve(Some("explicit-id"), &facts()), "explicit-id");
    assert_eq!(identity.load().as_deref(), Some("explicit-id"));
}

#[test]
fn empty_provided_id_is_ignored() {
    let dir = TempDir::new().unwrap();
    let identity = identity(&dir);
    identity.persist("stored-id").unwrap();
    assert_eq!(identity.resolve(Some(""), &facts()), "stored-id");
}

#[test]
fn persisted_id_is_trimmed() {
    let dir = TempDir::new().unwrap();
    let identity = identity(&dir);
    std::fs::write(identity.path(), "  padded-id\n").unwrap();
    assert_eq!(identity.load().as_deref(), Some("padded-id"));
}

#[test]
fn identities_are_scoped_per_server_and_software() {
    let dir = TempDir::new().unwrap();
    let a = identity(&dir);
    let b = DeviceIdentity::new("https://other.test", "TestApp", Some(dir.path().to_path_buf()));
    let c = DeviceIdentity::new("https://license.test", "Other", Some(dir.path().to_path_buf()));
    assert_ne!(a.path(), b.path());
    assert_ne!(a.path(), c.path());

    a.persist("a-id").unwrap();
    assert!(b.load().is_none());
    assert!(c.load().is_none());
}

#[test]
fn device_info_from_facts() {
    let info = DeviceInfo::from_facts(&facts());
    assert_eq!(info.hostname, "build-01");
    assert_eq!(info.system, "linux");
    assert_eq!(info.cpu_count, 8);
}

#[test]
fn device_info_skips_empty_fields() {
    let info = DeviceInfo {
        hostname: "h".into(),
        ..Default::default()
    };
    let value = serde_json::to_value(&info).unwrap();
    assert_eq!(value, serde_json::json!({"hostname": "h"}));
}

#[test]
fn collected_facts_are_populated() {
    let facts = DeviceFacts::collect();
    assert!(!facts.system.is_empty());
    assert!(!facts.machine.is_empty());
    assert!(!facts.hostname.is_empty());
}
