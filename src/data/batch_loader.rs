//! Ordered, prefetching batch loader.
//!
//! A producer thread walks the source in fixed-size batches and decodes the
//! images of each batch on a dedicated rayon pool. Finished batches go through
//! a bounded channel, so at most `prefetch` batches wait in memory.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use anyhow::Result;
use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use rayon::prelude::*;
use crate::common::{XrayBatch, XraySample};
use crate::data::{ImageSource, TimeCalc};

pub struct BatchLoader {
    source: Arc<dyn ImageSource>,
    batch_size: usize,
    num_workers: usize,
    prefetch: usize,
    load_time: Arc<Mutex<TimeCalc>>,
}

impl BatchLoader {
    pub fn new(source: Arc<dyn ImageSource>, batch_size: usize) -> Self {
        Self {
            source,
            batch_size: batch_size.max(1),
            num_workers: 8,
            prefetch: 2,
            load_time: Arc::new(Mutex::new(TimeCalc::default())),
        }
    }

    pub fn with_num_workers(mut self, n: usize) -> Self {
        self.num_workers = n.max(1);
        self
    }

    pub fn with_prefetch(mut self, n: usize) -> Self {
        self.prefetch = n.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.source.len().div_ceil(self.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Time spent decoding and transforming each batch so far.
    pub fn load_time(&self) -> TimeCalc {
        self.load_time.lock().clone()
    }

    /// Starts the producer. Batches come out in source order; the first load
    /// error is yielded and ends the stream.
    pub fn iter(&self) -> Result<Batches> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_workers)
            .thread_name(|i| format!("loader-{i}"))
            .build()?;
        let (tx, rx) = bounded::<Result<XrayBatch>>(self.prefetch);

        let source = Arc::clone(&self.source);
        let load_time = Arc::clone(&self.load_time);
        let batch_size = self.batch_size;
        let total = source.len();

        let handle = std::thread::Builder::new()
            .name("batch-loader".to_string())
            .spawn(move || {
                for start in (0..total).step_by(batch_size) {
                    let end = (start + batch_size).min(total);
                    let t = Instant::now();
                    let batch = pool
                        .install(|| {
                            (start..end)
                                .into_par_iter()
                                .map(|i| source.get(i))
                                .collect::<Result<Vec<XraySample>>>()
                        })
                        .and_then(XrayBatch::stack);
                    load_time.lock().add_or_push(0, t.elapsed());

                    let failed = batch.is_err();
                    if tx.send(batch).is_err() || failed {
                        break;
                    }
                }
                log::debug!("Batch loader finished");
            })?;

        Ok(Batches {
            rx,
            handle: Some(handle),
        })
    }
}

/// Iterator over loaded batches.
pub struct Batches {
    rx: Receiver<Result<XrayBatch>>,
    handle: Option<JoinHandle<()>>,
}

impl Iterator for Batches {
    type Item = Result<XrayBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

impl Drop for Batches {
    fn drop(&mut self) {
        // unblock a producer stuck on a full channel before joining it
        drop(std::mem::replace(&mut self.rx, crossbeam_channel::never()));
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Batch loader thread panicked");
            }
        }
    }
}
