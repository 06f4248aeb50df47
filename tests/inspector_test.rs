#![allow(missing_docs)]

use arbor::{ArchiveInspector, MemoryBackend, OutputArchive};
use std::collections::BTreeMap;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

#[test]
fn test_report_describes_layout() -> arbor::Result<()> {
    init_tracing();

    let mut out = OutputArchive::open(MemoryBackend::new())?;
    out.write("/t", &(1i32, -1.0f64, String::from("test string")))?;
    out.write("/v", &vec![0i32, 1, 2])?;
    out.write("/m", &BTreeMap::from([(0i32, 0i32), (1, 1)]))?;

    let report = ArchiveInspector::inspect(out.backend())?;
    // Root, /t, /m, /m/0, /m/1.
    assert_eq!(report.groups, 5);
    // /t/0..2, /v, and two datasets per map entry.
    assert_eq!(report.datasets, 8);
    assert_eq!(report.soft_links, 0);

    let rendered = report.to_string();
    println!("{rendered}");
    assert!(rendered.contains("=== ARBOR INSPECTOR REPORT ==="));
    assert!(rendered.contains("v [Dataset] i32 x 3"));
    assert!(rendered.contains("m [Group] {count=2}"));
    assert!(rendered.contains("archive=\"arbor\""));
    Ok(())
}
