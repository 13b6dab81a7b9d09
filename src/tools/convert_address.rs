//! Convert addresses between chains, e.g. Namecoin `N5bMaf9MznNDCFGidCnEfrEM51KA7DkvMe` to
//! Bitcoin `1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa`.
//!
//! Reads addresses from the arguments, or one per line from stdin if none are given.

use anyhow::bail;
use auxpow_export::address::{AddressTranslator, ChainParams};
use clap::Parser;
use std::io::{self, stdin, stdout, BufRead, Write};

#[derive(Parser)]
struct Args {
    #[arg(long, default_value = "namecoin")]
    from: ChainParams,
    #[arg(long, default_value = "bitcoin")]
    to: ChainParams,
    addresses: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let translator = AddressTranslator::new(args.from, args.to);

    let addresses: Box<dyn Iterator<Item = io::Result<String>>> = match args.addresses {
        x if x.is_empty() => Box::new(stdin().lock().lines()),
        x => Box::new(x.into_iter().map(Ok)),
    };

    let mut out = stdout().lock();
    let mut failed = 0_usize;
    for address in addresses {
        let address = address?;
        let address = address.trim();
        if address.is_empty() {
            continue;
        }
        match translator.translate(address) {
            Ok(converted) => writeln!(out, "{converted}")?,
            Err(e) => {
                eprintln!("{e}");
                failed += 1;
            }
        }
    }
    out.flush()?;

    if failed > 0 {
        bail!("{failed} address(es) could not be converted");
    }
    Ok(())
}
