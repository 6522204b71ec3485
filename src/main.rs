#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::cargo)]
#![warn(
    clippy::nursery,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::module_name_repetitions, clippy::significant_drop_tightening)]

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use csv::{Writer, WriterBuilder};
use fixed_map::{Key, Map};
use glob::GlobError;
use lazy_static::lazy_static;
use rayon::prelude::*;
use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use pbp_chadwick::event_file::config::GameConfig;
use pbp_chadwick::event_file::game_container::GameContainer;
use pbp_chadwick::event_file::schemas::Game;

const ABOUT: &str = "Reconstructs Chadwick event files from scraped play-by-play accounts.";

lazy_static! {
    static ref OUTPUT_ROOT: PathBuf = get_output_root(&Opt::parse());
    static ref WRITER_MAP: WriterMap = WriterMap::new(&OUTPUT_ROOT);
}

#[derive(Debug, Eq, PartialEq, Copy, Clone, Ord, PartialOrd, Hash, Display, EnumIter, Key)]
#[strum(serialize_all = "snake_case")]
enum OutputSchema {
    Event,
    BattingLine,
    Game,
}

struct ThreadSafeCsvWriter {
    csv: Mutex<Writer<File>>,
}

impl ThreadSafeCsvWriter {
    #[allow(clippy::expect_used)]
    pub fn new(output_root: &Path, schema: OutputSchema) -> Self {
        let output_path = output_root.join(format!("{schema}.csv"));
        debug!("Creating file {}", output_path.display());
        let csv = WriterBuilder::new()
            .has_headers(true)
            .from_path(output_path)
            .expect("Failed to create file");
        Self {
            csv: Mutex::new(csv),
        }
    }

    pub fn csv(&self) -> Result<MutexGuard<Writer<File>>> {
        self.csv
            .lock()
            .map_err(|e| anyhow!("Failed to acquire writer lock: {}", e))
    }
}

struct WriterMap {
    map: Map<OutputSchema, ThreadSafeCsvWriter>,
}

impl WriterMap {
    fn new(output_root: &Path) -> Self {
        let mut map = Map::new();
        for schema in OutputSchema::iter() {
            map.insert(schema, ThreadSafeCsvWriter::new(output_root, schema));
        }
        Self { map }
    }

    fn flush_all(&self) -> Result<Vec<()>> {
        self.map
            .iter()
            .par_bridge()
            .map(|(_, writer)| {
                writer
                    .csv()?
                    .flush()
                    .map_err(|e| anyhow!("Failed to flush writer: {}", e))
            })
            .collect::<Result<Vec<()>>>()
    }

    fn get_csv(&self, schema: OutputSchema) -> Result<MutexGuard<Writer<File>>> {
        self.map
            .get(schema)
            .context("Failed to initialize writer for schema")?
            .csv()
    }

    /// Rows of one game go out under a single lock so games never interleave.
    fn write_rows<T: Serialize>(&self, schema: OutputSchema, rows: &[T]) -> Result<()> {
        let mut csv = self.get_csv(schema)?;
        for row in rows {
            csv.serialize(row)?;
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(name = "pbp-chadwick", about = ABOUT)]
struct Opt {
    /// Directory of game container JSON files
    #[arg(short, long)]
    input: PathBuf,

    #[arg(short, long)]
    output_dir: PathBuf,

    /// Engine settings and extra base/position synonyms (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

#[allow(clippy::expect_used)]
fn get_output_root(opt: &Opt) -> PathBuf {
    std::fs::create_dir_all(&opt.output_dir).expect("Error occurred on output dir check");
    opt.output_dir
        .canonicalize()
        .expect("Error occurred on output dir canonicalization")
}

struct FileProcessor {
    opt: Opt,
    config: Arc<GameConfig>,
    game_ids: Mutex<HashSet<String>>,
    written: AtomicUsize,
    failed: AtomicUsize,
}

impl FileProcessor {
    pub fn new(opt: Opt) -> Result<Self> {
        let config = match &opt.config {
            Some(path) => GameConfig::from_path(path)?,
            None => GameConfig::default(),
        };
        Ok(Self {
            opt,
            config: Arc::new(config),
            game_ids: Mutex::new(HashSet::with_capacity(2_500)),
            written: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        })
    }

    fn is_new_game(&self, game_id: &str) -> Result<bool> {
        let mut seen = self
            .game_ids
            .lock()
            .map_err(|e| anyhow!("Failed to acquire game id lock: {}", e))?;
        Ok(seen.insert(game_id.to_string()))
    }

    fn process_file(&self, input_path: &Path) -> Result<()> {
        debug!("Processing file {}", input_path.display());
        let container = GameContainer::from_path(input_path)?;
        if !self.is_new_game(&container.game_id)? {
            warn!(
                "File {} contains already-processed game {}, ignoring",
                input_path.display(),
                container.game_id
            );
            return Ok(());
        }
        let state = container
            .play(Arc::clone(&self.config))
            .with_context(|| format!("Failed to replay game {}", container.game_id))?;
        let batting_lines = state.batting_lines();
        WRITER_MAP.write_rows(OutputSchema::Event, state.events())?;
        WRITER_MAP.write_rows(OutputSchema::BattingLine, &batting_lines)?;
        WRITER_MAP.write_rows(OutputSchema::Game, &[Game::from(&state)])?;
        Ok(())
    }

    pub fn process_files(&self) -> Result<()> {
        let pattern = self.opt.input.join("*.json");
        let pattern = pattern
            .to_str()
            .with_context(|| {
                format!("Input path {} is not valid UTF-8", self.opt.input.display())
            })?;
        let mut files = glob::glob(pattern)?.collect::<Result<Vec<PathBuf>, GlobError>>()?;
        files.par_sort();
        info!("Replaying {} game files", files.len());

        files.par_iter().for_each(|f| match self.process_file(f) {
            Ok(()) => {
                self.written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!("{}: {:?}", f.display(), e);
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
        });

        WRITER_MAP.flush_all()?;
        info!(
            "Processed {} games, {} failed",
            self.written.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed)
        );
        Ok(())
    }
}

#[allow(clippy::expect_used)]
fn main() {
    let opt: Opt = Opt::parse();
    let level = if opt.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to initialize trace");

    let start = Instant::now();
    FileProcessor::new(opt)
        .and_then(|processor| processor.process_files())
        .expect("Error occurred while processing files");

    let end = start.elapsed();
    info!("Elapsed: {:?}", end);
}
