use std::io::Read;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use digest::DynDigest;
use tracing::{debug, info};

use crate::checksum::{ChecksumResult, HashAlgorithm};
use crate::error::{Error, Result};

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Minimum interval between progress log lines.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Fetch `url` once and compute a digest per requested algorithm in a single
/// streaming pass.
///
/// One accumulator is constructed per algorithm and every accumulator
/// consumes the same byte stream inside one copy loop, so the body is never
/// re-read or buffered whole. The copy runs on a background thread; the
/// caller blocks on a single-shot channel that delivers either the finished
/// result or an error, whichever the copy produces first. No partial digests
/// are ever returned, and there is no timeout: a hung connection blocks
/// until the peer gives up.
pub fn fetch_and_hash(url: &str, algorithms: &[HashAlgorithm]) -> Result<ChecksumResult> {
    let agent = ureq::Agent::new_with_defaults();
    let response = match agent.get(url).call() {
        Ok(response) => response,
        Err(ureq::Error::StatusCode(status)) => {
            return Err(Error::Status {
                status,
                url: url.to_string(),
            })
        }
        Err(e) => {
            return Err(Error::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })
        }
    };

    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        return Err(Error::Status {
            status,
            url: url.to_string(),
        });
    }

    let total = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());
    debug!("fetching {url} ({} bytes declared)", total.unwrap_or(0));

    let mut hashers = Vec::with_capacity(algorithms.len());
    for &algorithm in algorithms {
        hashers.push((algorithm, algorithm.hasher()?));
    }

    let reader = response.into_body().into_reader();
    let (tx, rx) = mpsc::channel();
    let task_url = url.to_string();
    thread::spawn(move || {
        let _ = tx.send(copy_and_digest(reader, hashers, total, &task_url));
    });

    // Rendezvous: the task sends exactly one message, success or failure.
    match rx.recv() {
        Ok(outcome) => outcome,
        Err(_) => Err(Error::Transport {
            url: url.to_string(),
            reason: "checksum task ended without a result".to_string(),
        }),
    }
}

/// The sequential copy loop: read a chunk, feed every accumulator, track
/// progress. Hex-encodes the digests once the stream is exhausted.
fn copy_and_digest(
    mut reader: impl Read,
    mut hashers: Vec<(HashAlgorithm, Box<dyn DynDigest + Send>)>,
    total: Option<u64>,
    url: &str,
) -> Result<ChecksumResult> {
    let mut progress = Progress::new(total);
    let mut buf = [0u8; COPY_BUF_SIZE];
    let mut size: u64 = 0;

    loop {
        let n = reader.read(&mut buf).map_err(|e| Error::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if n == 0 {
            break;
        }
        for (_, hasher) in &mut hashers {
            hasher.update(&buf[..n]);
        }
        progress.update(n as u64);
        size += n as u64;
    }

    let digests = hashers
        .into_iter()
        .map(|(algorithm, hasher)| (algorithm, hex::encode(hasher.finalize())))
        .collect();

    Ok(ChecksumResult {
        size: size as i64,
        digests,
    })
}

/// Throttled transfer progress reporting.
///
/// Emits at most one log line per [`PROGRESS_INTERVAL`], with percent and an
/// overall duration estimate when the response declared a content length and
/// `unknown` markers otherwise. Purely observational.
struct Progress {
    total: Option<u64>,
    seen: u64,
    start: Instant,
    tick: Instant,
}

impl Progress {
    fn new(total: Option<u64>) -> Progress {
        let now = Instant::now();
        Progress {
            total,
            seen: 0,
            start: now,
            tick: now,
        }
    }

    fn update(&mut self, n: u64) {
        self.seen += n;
        let now = Instant::now();
        if now.duration_since(self.tick) < PROGRESS_INTERVAL {
            return;
        }
        self.tick = now;

        let elapsed = now.duration_since(self.start).as_secs();
        let mut percent = "unknown%".to_string();
        let mut total = "unknown".to_string();
        let mut estimate = "unknown".to_string();
        if let Some(declared) = self.total {
            percent = format!("{:03}%", 100 * self.seen / declared.max(1));
            total = format!("{} kb", declared / 1024);
            if elapsed > 0 {
                let rate = self.seen / elapsed;
                if rate > 0 {
                    estimate = format!("{}s", declared / rate);
                }
            }
        }
        info!(
            "{percent} {} kb / {total} ({elapsed}s / {estimate})",
            self.seen / 1024
        );
    }
}
