//! Export per-block AuxPoW metadata of a merge-mined chain (Namecoin by default) to CSV.
//!
//! Columns: `height,time,bits,coinbase,address,parent_bits,size,weight`. The `address` column
//! holds the parent-chain miner address converted to Bitcoin's format.
//!
//! Output: `data/all.csv`

use anyhow::Context;
use auxpow_export::config::Args;
use auxpow_export::export::Exporter;
use auxpow_export::rpc::RpcBlockSource;
use auxpow_export::set_up_logging;
use clap::Parser;
use log::info;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    set_up_logging(args.log_level(), args.log_file.as_deref())?;

    let rpc = args.rpc_config();
    let translator = args.translator();
    info!("RPC endpoint: {}", rpc.url);
    info!(
        "Address conversion: {} -> {}",
        translator.from_chain(),
        translator.to_chain()
    );

    let source = RpcBlockSource::new(&rpc).context("RPC client initialization failed")?;
    let exporter = Exporter::new(source, translator, args.export_config());
    exporter.run()?;
    Ok(())
}
