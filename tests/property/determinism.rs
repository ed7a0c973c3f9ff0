//! Property-based tests for determinism guarantees

use proptest::prelude::*;
use std::fs;
use std::path::PathBuf;
use sumtree::config::ChecksumConfig;
use sumtree::store::ChecksumStore;
use sumtree::strategy::{ChecksumStrategy, ManualStrategy, StrategyKind};
use sumtree::tree::hasher::DigestFunction;
use sumtree::types::HashAlgorithm;
use tempfile::TempDir;

fn children() -> impl Strategy<Value = Vec<(String, Vec<u8>)>> {
    prop::collection::btree_map("[a-z0-9]{1,8}", any::<Vec<u8>>(), 0..12)
        .prop_map(|map| map.into_iter().collect::<Vec<_>>())
}

/// Directory digests do not depend on insertion order
#[test]
fn test_directory_digest_order_independence() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &children().prop_flat_map(|entries| {
                let shuffled = Just(entries.clone()).prop_shuffle();
                (Just(entries), shuffled)
            }),
            |(ordered, shuffled)| {
                let dir = PathBuf::from("/root/dir");
                let digests = DigestFunction::new(HashAlgorithm::Md5);

                let first = ChecksumStore::new();
                for (name, content) in &ordered {
                    first.put(dir.join(name), HashAlgorithm::Md5.digest_bytes(content));
                }
                let second = ChecksumStore::new();
                for (name, content) in &shuffled {
                    second.put(dir.join(name), HashAlgorithm::Md5.digest_bytes(content));
                }

                prop_assert_eq!(
                    digests.directory_digest(&dir, &first),
                    digests.directory_digest(&dir, &second)
                );
                Ok(())
            },
        )
        .unwrap();
}

/// Identical content hashes identically; different content almost never does
#[test]
fn test_content_digest_determinism() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &(any::<Vec<u8>>(), any::<Vec<u8>>()),
            |(content1, content2)| {
                for algorithm in [HashAlgorithm::Md5, HashAlgorithm::Sha256, HashAlgorithm::Blake3] {
                    let hash1 = algorithm.digest_bytes(&content1);
                    prop_assert_eq!(&hash1, &algorithm.digest_bytes(&content1));
                    if content1 != content2 {
                        prop_assert_ne!(&hash1, &algorithm.digest_bytes(&content2));
                    }
                }
                Ok(())
            },
        )
        .unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Two trees written in different orders hash to the same root
    #[test]
    fn test_walk_independent_of_creation_order(
        files in prop::collection::btree_map("[a-z]{1,6}/[a-z]{1,6}\\.txt", any::<Vec<u8>>(), 1..8)
    ) {
        let forward = TempDir::new().unwrap();
        let backward = TempDir::new().unwrap();
        write_tree(&forward, files.iter());
        write_tree(&backward, files.iter().rev());

        let a = ManualStrategy::new(
            &ChecksumConfig::new(forward.path()).with_strategy(StrategyKind::Manual),
        )
        .unwrap();
        let b = ManualStrategy::new(
            &ChecksumConfig::new(backward.path()).with_strategy(StrategyKind::Manual),
        )
        .unwrap();

        prop_assert_eq!(a.checksum(forward.path()), b.checksum(backward.path()));
        prop_assert_eq!(a.store().len(), b.store().len());
    }
}

fn write_tree<'a, I>(temp_dir: &TempDir, files: I)
where
    I: Iterator<Item = (&'a String, &'a Vec<u8>)>,
{
    for (relative, content) in files {
        let path = temp_dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}
