use fileid_log::cache_store::{file_list_hash, CacheStore, FileCacheStore, MemoryCacheStore};
use fileid_log::error::AllocationError;
use fileid_log::id_allocator::IdAllocator;
use fileid_log::module_config::{load_config_from_str, AllocatorConfig, ModuleRange};

fn files(paths: &[&str]) -> Vec<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

#[test]
fn test_allocation_is_stable() {
    let config = AllocatorConfig::default();
    let input = files(&[
        "src/drivers/uart.c",
        "src/app/main.c",
        "src/drivers/spi.c",
        "src/test/test_uart.c",
        "src/demo/blink.c",
    ]);
    let mut reversed = input.clone();
    reversed.reverse();

    let first = IdAllocator::new(&config).allocate(&input);
    let second = IdAllocator::new(&config).allocate(&reversed);
    assert_eq!(first.assignment, second.assignment);
    assert_eq!(first.assignment["src/drivers/spi.c"], 51);
    assert_eq!(first.assignment["src/drivers/uart.c"], 52);
    assert_eq!(first.assignment["src/demo/blink.c"], 301);
}

#[test]
fn test_ids_unique_and_in_range() {
    let config = AllocatorConfig::default();
    let input: Vec<String> = (0..40)
        .map(|i| format!("src/drivers/dev{:02}.c", i))
        .chain((0..10).map(|i| format!("src/app/task{}.c", i)))
        .collect();
    let allocation = IdAllocator::new(&config).allocate(&input);

    let mut ids: Vec<u16> = allocation.assignment.values().copied().collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 50);
    for (path, id) in &allocation.assignment {
        let module = config.module_for_id(*id).unwrap();
        assert!(path.contains(&format!("/{}/", module.name)));
    }
}

#[test]
fn test_overflow_by_one() {
    let config = AllocatorConfig::with_modules(vec![
        ModuleRange::new("brom", 1, 3, ""),
        ModuleRange::new("app", 10, 20, ""),
    ]);
    let input = files(&["brom/a.c", "brom/b.c", "brom/c.c", "brom/d.c", "app/x.c"]);
    let allocation = IdAllocator::new(&config).allocate(&input);

    assert_eq!(
        allocation.overflows,
        vec![AllocationError::Overflow {
            module: "brom".to_string(),
            files: 4,
            capacity: 3,
            start: 1,
            end: 3,
        }]
    );
    assert_eq!(allocation.assignment.len(), 1);
    assert_eq!(allocation.assignment["app/x.c"], 10);
    assert!(!allocation.is_complete());
}

#[test]
fn test_cache_is_idempotent() {
    let config = AllocatorConfig::default();
    let store = MemoryCacheStore::new();
    let input = files(&["src/app/a.c", "src/app/b.c"]);
    let fingerprint = config.fingerprint();

    let allocation = IdAllocator::new(&config).allocate(&input);
    store.store(&input, &fingerprint, &allocation.assignment).unwrap();

    let shuffled = files(&["src/app/b.c", "src/app/a.c"]);
    assert_eq!(store.lookup(&shuffled, &fingerprint), Some(allocation.assignment.clone()));

    let added = files(&["src/app/a.c", "src/app/b.c", "src/app/c.c"]);
    assert!(store.lookup(&added, &fingerprint).is_none());
    let removed = files(&["src/app/a.c"]);
    assert!(store.lookup(&removed, &fingerprint).is_none());
}

#[test]
fn test_cache_misses_on_config_change() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCacheStore::new(dir.path().join(".file_id_cache.json"));
    let input = files(&["src/app/a.c"]);

    let original = AllocatorConfig::default();
    let allocation = IdAllocator::new(&original).allocate(&input);
    store.store(&input, &original.fingerprint(), &allocation.assignment).unwrap();

    let moved = load_config_from_str(
        r#"
        [[modules]]
        name = "app"
        start = 400
        end = 499
        "#,
    )
    .unwrap();
    assert_ne!(original.fingerprint(), moved.fingerprint());
    assert!(store.lookup(&input, &moved.fingerprint()).is_none());
    assert!(store.lookup(&input, &original.fingerprint()).is_some());

    let json = std::fs::read_to_string(store.path()).unwrap();
    assert!(json.contains(&file_list_hash(&input)));
    assert!(json.contains("\"file_id_map\""));
}
