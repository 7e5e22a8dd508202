//! Matching-key derivation.
//!
//! Keys are `|`-joined normalized fields:
//! - `exact_key`: name, address, zip
//! - `loose_key`: name, city
//!
//! Normalized text never contains the separator, so segment counts are fixed.
//! The core only emits keys; deciding which records are duplicates is left to
//! the consumer.

use std::num::NonZeroUsize;
use std::thread;

use crossbeam_channel::bounded;

use crate::normalize::normalize;
use crate::record::{NormalizedRecord, PracticeRecord};
use crate::rules::NormalizationRules;

/// Separator between key segments.
pub const KEY_SEPARATOR: char = '|';

/// Fewest records worth a worker thread; smaller batches are derived inline.
const MIN_PARALLEL_BATCH: usize = 256;

/// Derives normalized fields and matching keys for one record.
///
/// Never fails: absent fields become empty segments, so two records that
/// are both missing an address and otherwise equal share an `exact_key`.
///
/// # Examples
///
/// ```
/// use practice_dedupe::{derive_keys, NormalizationRules, PracticeRecord};
///
/// let rules = NormalizationRules::default();
/// let mut record = PracticeRecord::new("Acme", "", "Austin", " 78701 ");
/// record.address = None;
///
/// let normalized = derive_keys(&record, &rules);
/// assert_eq!(normalized.exact_key, "acme||78701");
/// assert_eq!(normalized.loose_key, "acme|austin");
/// ```
#[must_use]
pub fn derive_keys(record: &PracticeRecord, rules: &NormalizationRules) -> NormalizedRecord {
    let name_norm = normalize(record.name.as_deref(), rules);
    let address_norm = normalize(record.address.as_deref(), rules);
    let city_norm = normalize(record.city.as_deref(), rules);
    // Zip is compared verbatim after trimming; only the separator is masked.
    let zip_norm = record
        .zip
        .as_deref()
        .map(|zip| zip.replace(KEY_SEPARATOR, " ").trim().to_string())
        .unwrap_or_default();

    let exact_key = join_key(&[&name_norm, &address_norm, &zip_norm]);
    let loose_key = join_key(&[&name_norm, &city_norm]);

    NormalizedRecord {
        record: record.clone(),
        name_norm,
        address_norm,
        city_norm,
        zip_norm,
        exact_key,
        loose_key,
    }
}

fn join_key(segments: &[&str]) -> String {
    let mut key = String::with_capacity(segments.iter().map(|s| s.len() + 1).sum());
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(segment);
    }
    key
}

/// Derives keys for a batch, preserving input order.
///
/// With `workers > 1` and a large enough batch, records are split into chunks
/// that scoped worker threads pull from a bounded queue. Results are
/// reassembled by chunk index, so the output is identical to sequential
/// derivation. All workers are joined before this returns.
///
/// `workers` is an upper bound: no more threads are spawned than the machine
/// has cores, and each thread gets at least [`MIN_PARALLEL_BATCH`] records.
#[must_use]
pub fn derive_all(
    records: &[PracticeRecord],
    rules: &NormalizationRules,
    workers: usize,
) -> Vec<NormalizedRecord> {
    let workers = worker_count(records.len(), workers);
    if workers <= 1 {
        return records.iter().map(|r| derive_keys(r, rules)).collect();
    }

    let chunk_size = records.len().div_ceil(workers.saturating_mul(4)).max(1);
    let chunk_count = records.len().div_ceil(chunk_size);
    let (job_tx, job_rx) = bounded::<(usize, &[PracticeRecord])>(workers.saturating_mul(2));
    let (done_tx, done_rx) = bounded::<(usize, Vec<NormalizedRecord>)>(chunk_count);

    thread::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || {
                for (idx, chunk) in job_rx {
                    let derived = chunk.iter().map(|r| derive_keys(r, rules)).collect();
                    if done_tx.send((idx, derived)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(done_tx);

        for job in records.chunks(chunk_size).enumerate() {
            if job_tx.send(job).is_err() {
                break;
            }
        }
        drop(job_tx);
    });

    let mut chunks: Vec<Option<Vec<NormalizedRecord>>> = vec![None; chunk_count];
    for (idx, derived) in done_rx.try_iter() {
        chunks[idx] = Some(derived);
    }

    let mut out = Vec::with_capacity(records.len());
    for chunk in chunks {
        match chunk {
            Some(derived) => out.extend(derived),
            None => unreachable!("every chunk is derived before the scope joins"),
        }
    }
    out
}

fn worker_count(records: usize, requested: usize) -> usize {
    let cores = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    requested.min(cores).min(records / MIN_PARALLEL_BATCH)
}
