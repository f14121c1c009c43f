use std::error::Error;

use clap::Parser;
use devtree::{DeviceTree, FlattenConfig, create_dtb};
use log::info;

/// Expand a DTB, print it as DTS and optionally flatten it again
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// dtb file path
    #[arg(short, long)]
    input: String,

    /// where to write the re-flattened blob
    #[arg(short, long)]
    output: Option<String>,

    /// properties starting with this are left out of the output blob
    #[arg(short, long, default_value = devtree::flatten::DEFAULT_PRIVATE_PREFIX)]
    private_prefix: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let data = std::fs::read(&args.input)?;
    let fdt = fdt_raw::Fdt::from_bytes(&data)?;
    let tree = DeviceTree::from_fdt(&data)?;
    info!("{}: {} nodes", args.input, tree.node_count());

    let reservations: Vec<_> = fdt.memory_reservations().collect();
    print!(
        "{}",
        tree.display(tree.root_id()).reservations(&reservations)
    );

    if let Some(output) = &args.output {
        let config = FlattenConfig {
            reservations,
            boot_cpuid_phys: fdt.header().boot_cpuid_phys,
            initial_size: data.len(),
            ..FlattenConfig::default()
        }
        .private_prefix(args.private_prefix.as_str());
        let blob = create_dtb(&tree, &config, &[])?;
        std::fs::write(output, &*blob)?;
        info!("wrote {} bytes to {}", blob.len(), output);
    }
    Ok(())
}
