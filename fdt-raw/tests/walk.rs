use std::sync::Once;

use fdt_raw::*;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Trace)
            .try_init();
    });
}

fn sample_blob() -> Vec<u8> {
    let mut w = FdtWriter::new(0x400);
    w.begin_node("").unwrap();
    w.property_cells("#address-cells", &[2]).unwrap();
    w.begin_node("cpus").unwrap();
    w.begin_node("PowerPC,POWER7@10").unwrap();
    w.property_string("device_type", "cpu").unwrap();
    w.end_node().unwrap();
    w.end_node().unwrap();
    w.begin_node("memory@0").unwrap();
    w.property("reg", &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0])
        .unwrap();
    w.end_node().unwrap();
    w.end_node().unwrap();
    w.finish().unwrap()
}

#[test]
fn test_walk_items_in_document_order() {
    init_logging();
    let blob = sample_blob();
    let fdt = Fdt::from_bytes(&blob).unwrap();
    let items: Vec<_> = fdt.walk().collect::<Result<_, _>>().unwrap();

    assert_eq!(
        items,
        vec![
            StructItem::BeginNode(""),
            StructItem::Property {
                name: "#address-cells",
                data: &[0, 0, 0, 2]
            },
            StructItem::BeginNode("cpus"),
            StructItem::BeginNode("PowerPC,POWER7@10"),
            StructItem::Property {
                name: "device_type",
                data: b"cpu\0"
            },
            StructItem::EndNode,
            StructItem::EndNode,
            StructItem::BeginNode("memory@0"),
            StructItem::Property {
                name: "reg",
                data: &[0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0]
            },
            StructItem::EndNode,
            StructItem::EndNode,
        ]
    );
}

#[test]
fn test_walk_tracks_depth() {
    let blob = sample_blob();
    let fdt = Fdt::from_bytes(&blob).unwrap();
    let mut walk = fdt.walk();
    walk.next();
    walk.next();
    walk.next();
    assert_eq!(walk.depth(), 2);
    assert_eq!(walk.current_node(), Some("cpus"));
}

#[test]
fn test_walk_rejects_stray_end_node() {
    init_logging();
    let mut blob = sample_blob();
    let header = Header::from_bytes(&blob).unwrap();
    let s = header.off_dt_struct as usize;
    // Replace the root BEGIN_NODE with END_NODE.
    blob[s..s + 4].copy_from_slice(&2u32.to_be_bytes());

    let fdt = Fdt::from_bytes(&blob).unwrap();
    let mut walk = fdt.walk();
    assert_eq!(
        walk.next(),
        Some(Err(FdtError::BadStructure { token: 2, pos: s }))
    );
    assert_eq!(walk.next(), None);
}

#[test]
fn test_walk_skips_nop() {
    let mut blob = sample_blob();
    let header = Header::from_bytes(&blob).unwrap();
    // The last END_NODE before END becomes a NOP, the END then fails.
    let end = (header.off_dt_struct + header.size_dt_struct) as usize;
    blob[end - 8..end - 4].copy_from_slice(&4u32.to_be_bytes());
    let fdt = Fdt::from_bytes(&blob).unwrap();
    let last = fdt.walk().last().unwrap();
    assert!(matches!(last, Err(FdtError::BadStructure { token: 9, .. })));
}

#[test]
fn test_truncated_blob_is_rejected() {
    let blob = sample_blob();
    assert!(matches!(
        Fdt::from_bytes(&blob[..blob.len() - 4]),
        Err(FdtError::BufferTooSmall { .. })
    ));
}
