//! Block-by-block CSV export of a chain, from genesis up to the tip seen at start.
//!
//! Heights are fetched in batches: one `getblockhash` batch, then one `getblock` batch.

use crate::address::AddressTranslator;
use crate::block::{Block, FieldError, Row};
use crate::config::ExportConfig;
use crate::rpc::{BlockSource, RpcError};
use crate::IntervalLogger;
use bitcoin::BlockHash;
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{self, Write};
use std::num::NonZeroU64;
use std::ops::{AddAssign, RangeInclusive};
use std::path::PathBuf;
use std::thread;

/// Splits `0..=tip` into consecutive closed ranges of at most `size` heights.
#[derive(Debug, Clone)]
pub struct HeightBatches {
    next: Option<u64>,
    tip: u64,
    size: NonZeroU64,
}

impl HeightBatches {
    pub fn new(tip: u64, size: NonZeroU64) -> Self {
        Self {
            next: Some(0),
            tip,
            size,
        }
    }
}

impl Iterator for HeightBatches {
    type Item = RangeInclusive<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next.filter(|&x| x <= self.tip)?;
        let end = start.saturating_add(self.size.get() - 1).min(self.tip);
        self.next = end.checked_add(1);
        Some(start..=end)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("cannot query the chain tip")]
    Tip(#[source] RpcError),
    #[error("fetching blocks #{start}..=#{end} failed")]
    Rpc {
        start: u64,
        end: u64,
        source: RpcError,
    },
    #[error("batch #{start}..=#{end} is misaligned: {reason}")]
    Misaligned { start: u64, end: u64, reason: String },
    #[error("block #{height}: cannot extract `{column}`")]
    Field {
        height: u64,
        column: &'static str,
        source: FieldError,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("cannot write {path:?}")]
    Io { path: PathBuf, source: io::Error },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchStats {
    pub rows: u64,
    pub auxpow_rows: u64,
    /// AuxPoW fields written empty because they could not be extracted
    pub field_warnings: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub tip: u64,
    pub rows: u64,
    pub auxpow_rows: u64,
    pub field_warnings: u64,
}

impl AddAssign<BatchStats> for ExportSummary {
    fn add_assign(&mut self, rhs: BatchStats) {
        self.rows += rhs.rows;
        self.auxpow_rows += rhs.auxpow_rows;
        self.field_warnings += rhs.field_warnings;
    }
}

pub struct Exporter<S> {
    source: S,
    translator: AddressTranslator,
    config: ExportConfig,
}

impl<S: BlockSource> Exporter<S> {
    pub fn new(source: S, translator: AddressTranslator, config: ExportConfig) -> Self {
        Self {
            source,
            translator,
            config,
        }
    }

    /// Writes every block from genesis to the current tip into the configured output file.
    ///
    /// The tip is queried once; blocks mined during the run are not exported. The output is
    /// flushed on every return path, so a failed run leaves the rows written so far.
    pub fn run(&self) -> Result<ExportSummary, ExportError> {
        let tip = self
            .with_retry("getblockcount", || self.source.block_count())
            .map_err(ExportError::Tip)?;
        info!("Chain tip: #{tip}");

        let path = &self.config.output;
        let io_error = |source| ExportError::Io {
            path: path.clone(),
            source,
        };
        if let Some(dir) = path.parent().filter(|x| !x.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_error)?;
        }
        let file = File::create(path).map_err(io_error)?;
        let mut csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        let result = self.export(tip, &mut csv);
        let flushed = csv.flush().map_err(io_error);
        let summary = result?;
        flushed?;

        info!(
            "Exported {} blocks ({} with AuxPoW, {} empty fields) to {}",
            summary.rows,
            summary.auxpow_rows,
            summary.field_warnings,
            path.display()
        );
        Ok(summary)
    }

    /// Writes the header line and the rows of `0..=tip`.
    pub fn export<W: Write>(
        &self,
        tip: u64,
        csv: &mut csv::Writer<W>,
    ) -> Result<ExportSummary, ExportError> {
        csv.write_record(Row::HEADER)?;
        let mut summary = ExportSummary {
            tip,
            ..Default::default()
        };
        let mut progress = IntervalLogger::new();
        for heights in HeightBatches::new(tip, self.config.batch_size) {
            let end = *heights.end();
            summary += self.export_batch(heights, csv)?;
            progress.log(|| info!("Block: #{end} / #{tip}"));
        }
        Ok(summary)
    }

    /// Fetches one batch of heights and writes a row per block.
    pub fn export_batch<W: Write>(
        &self,
        heights: RangeInclusive<u64>,
        csv: &mut csv::Writer<W>,
    ) -> Result<BatchStats, ExportError> {
        let blocks = self.fetch_batch(heights)?;
        let mut stats = BatchStats::default();
        for block in &blocks {
            let row = self.row(block, &mut stats)?;
            csv.serialize(&row)?;
            stats.rows += 1;
        }
        Ok(stats)
    }

    /// Blocks of `heights`, in height order.
    pub fn fetch_batch(&self, heights: RangeInclusive<u64>) -> Result<Vec<Block>, ExportError> {
        let (start, end) = (*heights.start(), *heights.end());
        let heights = heights.collect::<Vec<_>>();
        let (hashes, blocks) = self
            .with_retry("batch", || {
                let hashes = self.source.block_hashes(&heights)?;
                let blocks = self.source.blocks(&hashes)?;
                Ok((hashes, blocks))
            })
            .map_err(|source| ExportError::Rpc { start, end, source })?;
        debug!("Fetched blocks #{start}..=#{end}");

        check_alignment(&heights, &hashes, &blocks)
            .map_err(|reason| ExportError::Misaligned { start, end, reason })?;
        Ok(blocks)
    }

    fn row(&self, block: &Block, stats: &mut BatchStats) -> Result<Row, ExportError> {
        let mut row = Row::new(block);
        let Some(auxpow) = &block.auxpow else {
            return Ok(row);
        };
        stats.auxpow_rows += 1;

        let mut field = |column, value| self.field(block.height, column, value, stats);
        row.coinbase = field("coinbase", auxpow.coinbase())?;
        row.address = field("address", auxpow.translated_address(&self.translator))?;
        row.parent_bits = field("parent_bits", auxpow.parent_bits())?;
        Ok(row)
    }

    fn field(
        &self,
        height: u64,
        column: &'static str,
        value: Result<String, FieldError>,
        stats: &mut BatchStats,
    ) -> Result<String, ExportError> {
        match value {
            Ok(x) => Ok(x),
            Err(source) if self.config.strict => Err(ExportError::Field {
                height,
                column,
                source,
            }),
            Err(e) => {
                warn!("Block #{height}: leaving `{column}` empty: {e}");
                stats.field_warnings += 1;
                Ok(String::new())
            }
        }
    }

    /// Retries transient RPC failures with exponential backoff.
    fn with_retry<T, F>(&self, what: &str, mut f: F) -> Result<T, RpcError>
    where
        F: FnMut() -> Result<T, RpcError>,
    {
        let mut delay = self.config.retry_delay;
        let mut attempt = 0;
        loop {
            match f() {
                Ok(x) => return Ok(x),
                Err(e) if e.is_transient() && attempt < self.config.retries => {
                    attempt += 1;
                    warn!(
                        "RPC {what} failed: {e}; retry {attempt}/{} in {}",
                        self.config.retries,
                        humantime::format_duration(delay)
                    );
                    thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn check_alignment(heights: &[u64], hashes: &[BlockHash], blocks: &[Block]) -> Result<(), String> {
    if hashes.len() != heights.len() {
        return Err(format!(
            "{} hashes for {} heights",
            hashes.len(),
            heights.len()
        ));
    }
    if blocks.len() != hashes.len() {
        return Err(format!(
            "{} blocks for {} hashes",
            blocks.len(),
            hashes.len()
        ));
    }
    for ((&height, hash), block) in heights.iter().zip(hashes).zip(blocks) {
        if block.height != height || block.hash != *hash {
            return Err(format!(
                "expected block #{height} ({hash}), got #{} ({})",
                block.height, block.hash
            ));
        }
    }
    Ok(())
}
