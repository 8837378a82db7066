//! Property-based test generators using proptest.
//!
//! Journals are generated by simulating a target stream: each operation
//! mutates an in-memory target and logs the undo record a correct writer
//! would have appended before the mutation. The result carries the target
//! length each record was written against, so forward scans can be checked
//! with the exact expected length.

use crate::fixtures::{BuiltJournal, JournalBuilder};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use undojournal_core::{Record, RecordKind, JOURNAL_START, MAX_HEADER_LEN};

/// Largest single write, append or growth produced by the generators.
pub const MAX_CHUNK: usize = 256;

/// A mutation of the simulated target stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOp {
    /// Overwrite bytes inside the target.
    Overwrite {
        /// Picks the offset within the current length.
        offset_seed: u16,
        /// Picks the length within the remaining bytes.
        len_seed: u16,
    },
    /// Append bytes past the end.
    Append {
        /// Picks the number of bytes appended.
        len_seed: u16,
    },
    /// Cut the target short.
    Truncate {
        /// Picks the new length below the current one.
        len_seed: u16,
    },
    /// Extend the target with zeros.
    Grow {
        /// Picks the growth, possibly zero.
        len_seed: u16,
    },
}

/// A journal produced by [`simulate`].
#[derive(Debug, Clone)]
pub struct GeneratedJournal {
    /// The journal image.
    pub journal: BuiltJournal,
    /// Target length before each record's mutation, in append order.
    pub lengths_before: Vec<u64>,
    /// Target contents before the first mutation.
    pub initial_target: Vec<u8>,
    /// Target contents after the last mutation.
    pub final_target: Vec<u8>,
}

impl GeneratedJournal {
    /// Records in append order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.journal.records
    }

    /// Journal bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.journal.bytes
    }
}

/// Strategy for a single target mutation.
pub fn target_op_strategy() -> impl Strategy<Value = TargetOp> {
    (0u8..4, any::<u16>(), any::<u16>()).prop_map(|(kind, a, b)| match kind {
        0 => TargetOp::Overwrite {
            offset_seed: a,
            len_seed: b,
        },
        1 => TargetOp::Append { len_seed: b },
        2 => TargetOp::Truncate { len_seed: a },
        _ => TargetOp::Grow { len_seed: b },
    })
}

/// Strategy for a sequence of mutations.
pub fn target_ops_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<TargetOp>> {
    prop::collection::vec(target_op_strategy(), min_ops..max_ops)
}

/// Strategy for a whole generated journal.
pub fn generated_journal_strategy(max_ops: usize) -> impl Strategy<Value = GeneratedJournal> {
    (0usize..512, any::<u8>(), target_ops_strategy(0, max_ops + 1))
        .prop_map(|(initial_len, fill, ops)| simulate(initial_len, fill, &ops))
}

/// Strategy for a cut point inside the last record of a non-empty journal.
///
/// Yields the journal and a length strictly between the last record's start
/// and its end.
pub fn torn_journal_strategy(max_ops: usize) -> impl Strategy<Value = (GeneratedJournal, usize)> {
    generated_journal_strategy(max_ops)
        .prop_filter("needs at least one record", |g| !g.records().is_empty())
        .prop_flat_map(|g| {
            let last = g.records()[g.records().len() - 1];
            let start = last.journal_offset as usize + 1;
            let end = last.end_offset() as usize;
            (Just(g), start..end)
        })
}

/// Strategy for a cut point anywhere in a journal's records.
///
/// Yields the journal and a length from the end of the header through the
/// full journal, record boundaries included.
pub fn cut_journal_strategy(max_ops: usize) -> impl Strategy<Value = (GeneratedJournal, usize)> {
    generated_journal_strategy(max_ops).prop_flat_map(|g| {
        let len = g.bytes().len();
        (Just(g), JOURNAL_START as usize..=len)
    })
}

/// Runs `ops` against a target of `initial_len` bytes and logs every
/// mutation.
///
/// Degenerate operations are redirected: an overwrite or truncation of an
/// empty target becomes an append or a growth.
#[must_use]
pub fn simulate(initial_len: usize, fill: u8, ops: &[TargetOp]) -> GeneratedJournal {
    let initial_target: Vec<u8> = (0..initial_len)
        .map(|i| fill.wrapping_add(i as u8))
        .collect();
    let mut target = initial_target.clone();
    let mut builder = JournalBuilder::new();
    let mut lengths_before = Vec::with_capacity(ops.len());

    for (step, op) in ops.iter().enumerate() {
        let len = target.len();
        lengths_before.push(len as u64);
        let stamp = fill.wrapping_add(step as u8).wrapping_mul(31);

        match *op {
            TargetOp::Overwrite {
                offset_seed,
                len_seed,
            } if len > 0 => {
                let offset = usize::from(offset_seed) % len;
                let span = (len - offset).min(MAX_CHUNK);
                let count = 1 + usize::from(len_seed) % span;
                builder.write(offset as u64, &target[offset..offset + count]);
                target[offset..offset + count].fill(stamp);
            }
            TargetOp::Truncate { len_seed } if len > 0 => {
                let new_len = usize::from(len_seed) % len;
                builder.length(len as u64, new_len as u64, &target[new_len..]);
                target.truncate(new_len);
            }
            TargetOp::Overwrite { len_seed, .. } | TargetOp::Append { len_seed } => {
                let count = 1 + usize::from(len_seed) % MAX_CHUNK;
                builder.write(len as u64, &[]);
                target.resize(len + count, stamp);
            }
            TargetOp::Truncate { len_seed } | TargetOp::Grow { len_seed } => {
                let growth = usize::from(len_seed) % (MAX_CHUNK + 1);
                builder.length(len as u64, (len + growth) as u64, &[]);
                target.resize(len + growth, 0);
            }
        }
    }

    GeneratedJournal {
        journal: builder.finish(),
        lengths_before,
        initial_target,
        final_target: target,
    }
}

/// Returns the target length a record leaves behind, when the record alone
/// determines it.
///
/// Pure appends do not record how much was appended and yield `None`.
#[must_use]
pub fn length_after(record: &Record, length_before: u64) -> Option<u64> {
    match record.kind {
        RecordKind::Write { data_length: 0, .. } => None,
        RecordKind::Write { .. } => Some(length_before),
        RecordKind::Length { new_length, .. } => Some(new_length),
    }
}

/// Strategy for bytes that are not a valid record header: an arbitrary
/// blob of at most a header's length.
pub fn header_noise_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=MAX_HEADER_LEN)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
