//! Background bounds sampling.
//!
//! Bounds queries may be slow, so they can run on worker threads. Each
//! worker sends its [`SampleResult`] back over a channel; the owner thread
//! drains the channel and hands results to the tracker that issued the
//! request, which drops any result older than one already applied.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use voxstack_core::{Result, ValueRange};

use crate::bounds::{SampleRequest, SampleTicket};

/// Outcome of one background sample.
#[derive(Debug)]
pub struct SampleResult<K> {
    /// Caller-chosen routing key, e.g. `(member key, slot)`.
    pub key: K,
    pub ticket: SampleTicket,
    pub generation: u64,
    pub result: Result<ValueRange>,
    pub elapsed: Duration,
}

/// Runs [`SampleRequest`]s on background threads.
#[derive(Debug)]
pub struct BoundsSampler<K> {
    tx: Sender<SampleResult<K>>,
    rx: Receiver<SampleResult<K>>,
    in_flight: usize,
}

impl<K: Send + 'static> BoundsSampler<K> {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Starts `request` on a worker thread.
    pub fn submit(&mut self, key: K, request: SampleRequest) {
        let tx = self.tx.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            let start = Instant::now();
            let result = request.run();
            // The receiver only disappears with the sampler itself.
            let _ = tx.send(SampleResult {
                key,
                ticket: request.ticket,
                generation: request.generation,
                result,
                elapsed: start.elapsed(),
            });
        });
    }

    /// Number of submitted requests whose results were not yet received.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Returns every result that has arrived, without blocking.
    pub fn try_drain(&mut self) -> Vec<SampleResult<K>> {
        let mut results = Vec::new();
        while let Ok(result) = self.rx.try_recv() {
            results.push(result);
        }
        self.in_flight -= results.len();
        results
    }

    /// Blocks until every submitted request has reported.
    pub fn wait_all(&mut self) -> Vec<SampleResult<K>> {
        let mut results = Vec::with_capacity(self.in_flight);
        while self.in_flight > 0 {
            match self.rx.recv() {
                Ok(result) => {
                    log::trace!("sample {:?} finished in {:?}", result.ticket, result.elapsed);
                    self.in_flight -= 1;
                    results.push(result);
                }
                // unreachable while `self.tx` is alive
                Err(_) => break,
            }
        }
        results
    }
}

impl<K: Send + 'static> Default for BoundsSampler<K> {
    fn default() -> Self {
        Self::new()
    }
}
