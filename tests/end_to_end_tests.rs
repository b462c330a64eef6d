use std::fs;
use std::path::Path;

use fileid_log::cache_store::{CacheStore, FileCacheStore};
use fileid_log::generator::{Generator, GeneratorOptions};
use fileid_log::header_codec::{format_tokens, LogHeader, LogLevel};
use fileid_log::header_emitter::WriteOutcome;
use fileid_log::log_reader::{Framing, LogReader};
use fileid_log::module_config::load_config;
use fileid_log::FileTable;

const CONFIG: &str = r#"
[[modules]]
name = "drivers"
start = 51
end = 150
description = "Driver layer"

[[modules]]
name = "app"
start = 151
end = 250
"#;

fn write(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

#[test]
fn test_generate_then_decode() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "src/drivers/uart.c", "void uart(void) { TEST_LOG_ERR_MSG(\"tx\", 1); }\n");
    write(root, "src/drivers/spi.c", "void spi(int v) {\n    TEST_LOG_ERR_MSG (\"v=%d\", v);\n}\n");
    write(root, "src/drivers/gpio.c", "/* no logging here */\n");
    write(root, "build/drivers/gen.c", "TEST_LOG_ERR_MSG(\"ignored\");\n");
    write(root, "tools/file_id_config.toml", CONFIG);

    let config = load_config(&root.join("tools/file_id_config.toml")).unwrap();
    let store = FileCacheStore::new(root.join(".file_id_cache.json"));
    let header_path = root.join("include/log_file_id.h");
    let options = GeneratorOptions {
        source: root.to_path_buf(),
        output: header_path.clone(),
    };

    let summary = Generator::new(&config, options.clone(), &store).run(false).unwrap();
    assert_eq!(summary.files_scanned, 2);
    assert_eq!(summary.assignment["src/drivers/spi.c"], 51);
    assert_eq!(summary.assignment["src/drivers/uart.c"], 52);
    assert!(summary.overflows.is_empty());
    assert!(summary.unclassified.is_empty());
    assert_eq!(summary.write, Some(WriteOutcome::Written));
    assert_eq!(summary.stats[0].files, 2);
    assert!(store.load().is_some());

    let header = fs::read_to_string(&header_path).unwrap();
    assert!(header.contains("FILE_ID_SRC_DRIVERS_SPI = 51,"));
    assert!(header.contains("FILE_ID_MAX = 53"));

    // Same tree again: cached, and the header is left untouched.
    let again = Generator::new(&config, options, &store).run(false).unwrap();
    assert!(again.cache_hit);
    assert_eq!(again.write, Some(WriteOutcome::Unchanged));

    // The decoder reads the same table back from the header.
    let table = FileTable::parse_header(&header, config.modules.clone());
    let word = LogHeader::new(51, 42, LogLevel::Err, 1).unwrap().pack();
    let captured = format_tokens(&[word, 0x2A]);
    assert_eq!(captured, "0x03302A04 0x0000002A");

    let records: Vec<_> = LogReader::new(&captured, Framing::Line).collect();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.header.identity, 51);
    assert_eq!(record.header.line, 42);
    assert_eq!(record.header.level, LogLevel::Err);
    assert_eq!(record.params, vec![42]);
    assert_eq!(
        record.format(&table),
        "[ERR][drivers] 51:42 (src/drivers/spi.c) - Params: [0x0000002A (42)]"
    );
}

#[test]
fn test_added_file_shifts_nothing_before_it() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "drivers/a.c", "LOG_INF(\"a\");");
    write(root, "drivers/c.c", "LOG_INF(\"c\");");

    let config = fileid_log::module_config::load_config_from_str(CONFIG).unwrap();
    let store = FileCacheStore::new(root.join("cache.json"));
    let options = GeneratorOptions {
        source: root.to_path_buf(),
        output: root.join("out/ids.h"),
    };

    let before = Generator::new(&config, options.clone(), &store).run(false).unwrap();
    write(root, "drivers/b.c", "LOG_INF(\"b\");");
    let after = Generator::new(&config, options, &store).run(false).unwrap();

    assert!(!after.cache_hit);
    assert_eq!(before.assignment["drivers/a.c"], after.assignment["drivers/a.c"]);
    assert_eq!(after.assignment["drivers/b.c"], 52);
    assert_eq!(after.assignment["drivers/c.c"], 53);
    assert_eq!(after.write, Some(WriteOutcome::Written));
}
