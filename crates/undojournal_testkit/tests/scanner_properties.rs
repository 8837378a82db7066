//! Integration tests for forward and backward scanning over generated
//! journals.

use proptest::prelude::*;
use undojournal_core::{
    encode_record, scan_backward, scan_backward_async, scan_forward, scan_forward_async,
    AsyncJournalReader, CoreError, JournalReader, Record, RecordKind, ScanBuffer, Scanned,
    JOURNAL_MAGIC, JOURNAL_START,
};
use undojournal_storage::InMemoryBackend;
use undojournal_testkit::prelude::*;

fn forward_all(generated: &GeneratedJournal) -> Vec<Scanned> {
    let backend = generated.journal.backend();
    let mut scratch = ScanBuffer::new();
    let mut cursor = JOURNAL_START;
    let mut out = Vec::new();
    for &expected in &generated.lengths_before {
        let scanned = scan_forward(&backend, cursor, expected, Some(&mut scratch))
            .unwrap()
            .unwrap();
        cursor = scanned.cursor;
        out.push(scanned);
    }
    let final_len = generated.final_target.len() as u64;
    assert_eq!(
        scan_forward(&backend, cursor, final_len, Some(&mut scratch)).unwrap(),
        None
    );
    out
}

fn backward_all(bytes: &[u8]) -> Vec<Scanned> {
    let backend = InMemoryBackend::with_data(bytes.to_vec());
    let mut scratch = ScanBuffer::new();
    let mut cursor = bytes.len() as u64;
    let mut out = Vec::new();
    while let Some(scanned) = scan_backward(&backend, cursor, Some(&mut scratch)).unwrap() {
        cursor = scanned.cursor;
        out.push(scanned);
    }
    assert_eq!(cursor, JOURNAL_START);
    out
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn forward_yields_records_in_order(generated in generated_journal_strategy(32)) {
        let scanned = forward_all(&generated);
        prop_assert_eq!(scanned.len(), generated.records().len());
        for (s, record) in scanned.iter().zip(generated.records()) {
            prop_assert_eq!(&s.record, record);
            prop_assert_eq!(s.cursor, record.end_offset());
        }
    }

    #[test]
    fn backward_yields_records_in_reverse(generated in generated_journal_strategy(32)) {
        let scanned = backward_all(generated.bytes());
        let expected: Vec<&Record> = generated.records().iter().rev().collect();
        prop_assert_eq!(scanned.len(), expected.len());
        for (s, record) in scanned.iter().zip(expected) {
            prop_assert_eq!(&s.record, record);
            prop_assert_eq!(s.cursor, record.journal_offset);
        }
    }

    #[test]
    fn backward_payloads_restore_target(generated in generated_journal_strategy(32)) {
        let mut reader = JournalReader::new(generated.journal.backend());
        reader.seek_end().unwrap();
        let newest_first: Vec<Record> = reader.backward().map(Result::unwrap).collect();
        let mut target = generated.final_target.clone();
        for record in &newest_first {
            let payload = reader.read_payload(record).unwrap();
            apply_undo(&mut target, record, &payload);
        }
        prop_assert_eq!(target, generated.initial_target);
    }

    #[test]
    fn async_scans_match_sync(generated in generated_journal_strategy(16)) {
        let sync_forward = forward_all(&generated);
        let sync_backward = backward_all(generated.bytes());

        let (async_forward, async_backward) = runtime().block_on(async {
            let backend = generated.journal.backend();
            let mut forward = Vec::new();
            let mut cursor = JOURNAL_START;
            for &expected in &generated.lengths_before {
                let scanned = scan_forward_async(&backend, cursor, expected, None)
                    .await
                    .unwrap()
                    .unwrap();
                cursor = scanned.cursor;
                forward.push(scanned);
            }

            let mut backward = Vec::new();
            let mut cursor = generated.journal.len();
            while let Some(scanned) = scan_backward_async(&backend, cursor, None).await.unwrap() {
                cursor = scanned.cursor;
                backward.push(scanned);
            }
            (forward, backward)
        });

        prop_assert_eq!(async_forward, sync_forward);
        prop_assert_eq!(async_backward, sync_backward);
    }

    #[test]
    fn torn_tail_is_truncated((generated, cut) in torn_journal_strategy(16)) {
        let bytes = generated.journal.torn_at(cut);
        let backend = InMemoryBackend::with_data(bytes);
        let last = generated.records().len() - 1;
        let start = generated.records()[last].journal_offset;

        let err = scan_forward(&backend, start, generated.lengths_before[last], None).unwrap_err();
        let is_truncated = matches!(err, CoreError::TruncatedJournal { offset, .. } if offset == start);
        prop_assert!(is_truncated, "unexpected error: {:?}", err);

        // the intact prefix still scans backward from the last good boundary
        let before = scan_backward(&backend, start, None).unwrap();
        match last.checked_sub(1) {
            Some(prev) => {
                let scanned = before.unwrap();
                prop_assert_eq!(&scanned.record, &generated.records()[prev]);
            }
            None => prop_assert!(before.is_none()),
        }
    }

    #[test]
    fn backward_from_any_cut_never_invents_a_record((generated, cut) in cut_journal_strategy(16)) {
        let backend = InMemoryBackend::with_data(generated.journal.torn_at(cut));
        let cut = cut as u64;

        match scan_backward(&backend, cut, None) {
            Ok(Some(scanned)) => {
                let known = generated
                    .records()
                    .iter()
                    .any(|r| *r == scanned.record && r.end_offset() == cut);
                prop_assert!(known, "scanned {:?} ending at {}", scanned.record, cut);
            }
            Ok(None) => prop_assert_eq!(cut, JOURNAL_START),
            Err(e) => {
                let at_boundary = generated.records().iter().any(|r| r.end_offset() == cut);
                prop_assert!(!at_boundary, "boundary {} failed: {:?}", cut, e);
            }
        }
    }

    #[test]
    fn noise_never_panics(noise in header_noise_strategy(), expected in 0u64..1024) {
        let mut bytes = JOURNAL_MAGIC.to_vec();
        bytes.extend_from_slice(&noise);
        let len = bytes.len() as u64;
        let backend = InMemoryBackend::with_data(bytes);

        if let Ok(Some(scanned)) = scan_forward(&backend, JOURNAL_START, expected, None) {
            prop_assert!(scanned.cursor > JOURNAL_START && scanned.cursor <= len);
        }
        if let Ok(Some(scanned)) = scan_backward(&backend, len, None) {
            prop_assert!(scanned.cursor >= JOURNAL_START && scanned.cursor < len);
        }
    }
}

#[test]
fn reader_walks_both_directions() {
    let generated = simulate(
        64,
        3,
        &[
            TargetOp::Overwrite {
                offset_seed: 10,
                len_seed: 5,
            },
            TargetOp::Append { len_seed: 20 },
            TargetOp::Truncate { len_seed: 40 },
            TargetOp::Grow { len_seed: 8 },
        ],
    );
    let mut reader = JournalReader::new(generated.journal.backend());

    for (record, &expected) in generated.records().iter().zip(&generated.lengths_before) {
        assert_eq!(reader.next_forward(expected).unwrap().as_ref(), Some(record));
    }
    assert_eq!(reader.position(), generated.journal.len());

    let newest_first: Vec<Record> = reader.backward().map(Result::unwrap).collect();
    let expected: Vec<Record> = generated.records().iter().rev().copied().collect();
    assert_eq!(newest_first, expected);
    assert_eq!(reader.position(), JOURNAL_START);
}

#[test]
fn file_backend_matches_memory() {
    let generated = simulate(
        200,
        9,
        &[
            TargetOp::Truncate { len_seed: 150 },
            TargetOp::Overwrite {
                offset_seed: 3,
                len_seed: 100,
            },
            TargetOp::Append { len_seed: 255 },
        ],
    );

    with_temp_journal(generated.bytes(), |file| {
        let backend = file.open();
        let mut cursor = generated.journal.len();
        let mut records = Vec::new();
        while let Some(scanned) = scan_backward(&backend, cursor, None).unwrap() {
            cursor = scanned.cursor;
            records.push(scanned.record);
        }
        records.reverse();
        assert_eq!(records, generated.records());
    });
}

#[tokio::test]
async fn async_file_backend_reads_generated_journal() {
    let generated = simulate(
        32,
        1,
        &[
            TargetOp::Grow { len_seed: 100 },
            TargetOp::Overwrite {
                offset_seed: 40,
                len_seed: 60,
            },
            TargetOp::Truncate { len_seed: 7 },
        ],
    );
    let file = TempJournal::with_bytes(generated.bytes());
    let mut reader = AsyncJournalReader::new(file.open_async().await);

    for (record, &expected) in generated.records().iter().zip(&generated.lengths_before) {
        let scanned = reader.next_forward(expected).await.unwrap().unwrap();
        assert_eq!(&scanned, record);
    }
    assert!(reader
        .next_forward(generated.final_target.len() as u64)
        .await
        .unwrap()
        .is_none());

    let mut count = 0;
    while let Some(record) = reader.next_backward().await.unwrap() {
        let payload = reader.read_payload(&record).await.unwrap();
        let index = generated.records().iter().position(|r| *r == record).unwrap();
        assert_eq!(payload, generated.journal.payloads[index]);
        count += 1;
    }
    assert_eq!(count, generated.records().len());
}

#[test]
fn truncated_payload_reports_record_end() {
    let mut builder = JournalBuilder::new();
    builder.write(0, &[0xEE; 100]);
    let journal = builder.finish();
    let record = journal.records[0];

    // header plus 40 payload bytes
    let cut = record.payload_offset() as usize + 40;
    let backend = InMemoryBackend::with_data(journal.torn_at(cut));
    let err = scan_forward(&backend, JOURNAL_START, 100, None).unwrap_err();
    match err {
        CoreError::TruncatedJournal {
            offset,
            record_end,
            journal_len,
        } => {
            assert_eq!(offset, JOURNAL_START);
            assert_eq!(record_end, record.end_offset());
            assert_eq!(journal_len, cut as u64);
        }
        other => panic!("expected truncation, got {other:?}"),
    }
}

#[test]
fn record_copied_into_a_pre_image_is_rejected_at_a_torn_tail() {
    // a complete record, as it would sit at the start of another journal
    let copied = encode_record(
        JOURNAL_START,
        &RecordKind::Write {
            target_offset: 5,
            data_length: 4,
        },
        timestamp(0),
        &[0x44; 4],
    )
    .unwrap();
    let mut pre_image = vec![0x11; 16];
    pre_image.extend_from_slice(&copied);
    pre_image.resize(73, 0x22);

    let mut builder = JournalBuilder::new();
    builder.write(0, &pre_image);
    let journal = builder.finish();
    let record = journal.records[0];

    // torn right after the copy's trailer
    let cut = record.payload_offset() as usize + 16 + copied.len();
    let backend = InMemoryBackend::with_data(journal.torn_at(cut));

    let err = scan_forward(&backend, JOURNAL_START, 73, None).unwrap_err();
    assert!(matches!(
        err,
        CoreError::TruncatedJournal { offset, record_end, .. }
            if offset == JOURNAL_START && record_end == record.end_offset()
    ));

    let err = scan_backward(&backend, cut as u64, None).unwrap_err();
    assert!(err.is_corruption(), "unexpected {err:?}");

    let mut reader = JournalReader::new(backend);
    reader.seek_end().unwrap();
    assert!(reader.next_backward().is_err());
    assert_eq!(reader.position(), cut as u64);
}
