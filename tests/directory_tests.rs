//! Transfers through a seeded directory on disk.

use covert_vfs::channel::{ChannelAllocator, Deadline};
use covert_vfs::storage::{clear_all_properties, seed_directory, DirectoryMedium, StorageMedium};
use covert_vfs::{ChecksumTransport, PropertyTransport, TransportConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Helper to create a share with `count` cover files and a zeroed counter.
fn setup_share(count: usize) -> (TempDir, DirectoryMedium) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut rng = StdRng::seed_from_u64(7);
    seed_directory(temp_dir.path(), count, &mut rng).expect("Failed to seed cover files");

    let medium = DirectoryMedium::open(temp_dir.path()).expect("Failed to open share");
    ChannelAllocator::new(medium.clone(), &TransportConfig::fast())
        .and_then(|allocator| allocator.reset_client_count())
        .expect("Failed to reset client count");

    (temp_dir, medium)
}

fn deadline() -> Deadline {
    Deadline::after(Duration::from_secs(30))
}

#[test]
fn test_checksum_transfer_over_directory() {
    let (temp_dir, medium) = setup_share(30);
    let config = TransportConfig::fast();

    let mut sender = ChecksumTransport::checksum(medium.clone(), config.clone()).unwrap();
    let mut receiver = ChecksumTransport::checksum(medium.clone(), config).unwrap();
    sender.connect().unwrap();
    receiver.await_connection_after(0, deadline()).unwrap();
    assert_eq!(sender.channel().sync_object().unwrap(), "a1.txt");

    let original = fs::read(temp_dir.path().join("b0.txt")).unwrap();

    let reader = thread::spawn(move || receiver.read_until(deadline()));
    let message = b"meet at the usual place, bring the key";
    sender.write_until(message, deadline()).expect("Failed to write");

    assert_eq!(reader.join().unwrap().unwrap(), message.to_vec());

    // Cover files only grew by trailing filler; nothing new appeared.
    let carrier = fs::read(temp_dir.path().join("b0.txt")).unwrap();
    assert!(carrier.starts_with(&original));
    assert_eq!(medium.list_objects().unwrap().len(), 30);
}

#[test]
fn test_property_transfer_over_directory() {
    let (temp_dir, medium) = setup_share(12);
    let config = TransportConfig::fast();

    let mut sender = PropertyTransport::property(medium.clone(), config.clone()).unwrap();
    let mut receiver = PropertyTransport::property(medium.clone(), config).unwrap();
    sender.connect().unwrap();
    receiver.await_connection_after(0, deadline()).unwrap();

    let contents_before: Vec<Vec<u8>> = medium
        .list_objects()
        .unwrap()
        .iter()
        .skip(1)
        .map(|object| fs::read(temp_dir.path().join(object)).unwrap())
        .collect();

    let reader = thread::spawn(move || receiver.read_until(deadline()));
    let message: Vec<u8> = b"exfil ".repeat(1000);
    sender.write_until(&message, deadline()).expect("Failed to write");

    assert_eq!(reader.join().unwrap().unwrap(), message);

    // Payload travelled in sidecars; object contents are untouched.
    let contents_after: Vec<Vec<u8>> = medium
        .list_objects()
        .unwrap()
        .iter()
        .skip(1)
        .map(|object| fs::read(temp_dir.path().join(object)).unwrap())
        .collect();
    assert_eq!(contents_before, contents_after);
    assert!(temp_dir.path().join(".c0.txt.props").exists());

    assert!(clear_all_properties(&medium).unwrap() > 0);
    assert!(!temp_dir.path().join(".c0.txt.props").exists());
}

#[test]
fn test_empty_share_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let medium = DirectoryMedium::open(temp_dir.path()).unwrap();

    let result = ChecksumTransport::checksum(medium, TransportConfig::fast());
    assert!(result.is_err());
}
