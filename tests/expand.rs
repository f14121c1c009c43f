use std::sync::Once;

use devtree::*;
use fdt_raw::FdtWriter;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Trace)
            .try_init();
    });
}

fn lpc_tree() -> DeviceTree {
    let mut tree = DeviceTree::new();
    let root = tree.root_id();
    tree.add_property_cell(root, "#address-cells", 2);
    tree.add_property_cell(root, "#size-cells", 2);
    let lpc = tree.new_child_addr(root, "lpc", 0x6030000).unwrap();
    tree.add_property_cell(lpc, "#address-cells", 2);
    tree.add_property_cell(lpc, "#size-cells", 1);
    tree.add_property_strings(lpc, "compatible", &["ibm,power8-lpc"]);
    let uart = tree.new_child_2addr(lpc, "serial", 1, 0x3f8).unwrap();
    tree.add_property_strings(uart, "compatible", &["ns16550", "pnpPNP,501"]);
    tree.add_property_cells(uart, "reg", &[1, 0x3f8, 8]);
    tree.add_property_cell(uart, "current-speed", 115200);
    let ics = tree.new_child(root, "interrupt-controller").unwrap();
    tree.add_property(ics, "interrupt-controller", Vec::<u8>::new());
    let ics_phandle = tree.node(ics).phandle().raw();
    tree.add_property_cell(uart, "interrupt-parent", ics_phandle);
    tree
}

#[test]
fn test_flatten_expand_reproduces_tree() {
    init_logging();
    let tree = lpc_tree();
    let blob = create_dtb(&tree, &FlattenConfig::default(), &[]).unwrap();

    let copy = DeviceTree::from_fdt(&blob).unwrap();
    assert_eq!(
        copy.display(copy.root_id()).to_string(),
        tree.display(tree.root_id()).to_string()
    );

    let root = copy.root_id();
    let uart = copy.find_by_path(root, "/lpc/serial@1,3f8").unwrap();
    let parent = copy.prop_get_u32(uart, "interrupt-parent");
    let ics = copy.find_by_phandle(root, parent).unwrap();
    assert_eq!(copy.path_of(ics), "/interrupt-controller");
    assert_eq!(copy.get_address(uart, 0), (0x1_0000_03f8, 8));
}

#[test]
fn test_expand_twice_is_stable() {
    init_logging();
    let tree = lpc_tree();
    let first = create_dtb(&tree, &FlattenConfig::default(), &[]).unwrap();
    let copy = DeviceTree::from_fdt(&first).unwrap();
    let second = create_dtb(&copy, &FlattenConfig::default(), &[]).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_expand_blob_with_duplicate_child() {
    init_logging();
    let mut w = FdtWriter::new(0x400);
    w.finish_reservations().unwrap();
    w.begin_node("").unwrap();
    w.property_string("model", "firenze").unwrap();
    w.begin_node("vpd").unwrap();
    w.property_u32("phandle", 0x10).unwrap();
    w.end_node().unwrap();
    w.begin_node("vpd").unwrap();
    w.property_string("extra", "lost").unwrap();
    w.end_node().unwrap();
    w.begin_node("ibm,opal").unwrap();
    w.end_node().unwrap();
    w.end_node().unwrap();
    let blob = w.finish().unwrap();

    let tree = DeviceTree::from_fdt(&blob).unwrap();
    let root = tree.root_id();
    assert!(tree.has_node_property(root, "model", Some("firenze")));
    let vpd = tree.find_child(root, "vpd").unwrap();
    assert_eq!(tree.node(vpd).phandle().raw(), 0x10);
    assert!(tree.find_property(vpd, "extra").is_none());
    assert!(tree.find_child(root, "ibm,opal").is_some());
    assert_eq!(tree.node(root).children().len(), 2);
}

#[test]
fn test_expand_under_existing_node() {
    init_logging();
    let mut tree = DeviceTree::new();
    let root = tree.root_id();
    let ipmi = tree.new_child(root, "ipmi").unwrap();
    let items = [
        Ok(StructItem::BeginNode("sensors")),
        Ok(StructItem::Property {
            name: "#address-cells",
            data: &[0, 0, 0, 1],
        }),
        Ok(StructItem::EndNode),
    ];
    tree.expand_into(ipmi, items).unwrap();
    let sensors = tree.find_by_path(root, "/ipmi/sensors").unwrap();
    assert_eq!(tree.prop_get_u32(sensors, "#address-cells"), 1);
}

#[test]
fn test_bad_blobs() {
    init_logging();
    assert!(matches!(
        DeviceTree::from_fdt(&[0u8; 64]),
        Err(DtError::Fdt(FdtError::InvalidMagic(0)))
    ));
    assert!(matches!(
        DeviceTree::from_fdt(&[0xd0, 0x0d, 0xfe, 0xed]),
        Err(DtError::Fdt(_))
    ));
}
