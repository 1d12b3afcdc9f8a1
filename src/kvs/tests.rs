//! Key-Value Store Tests
//!
//! ## Test Scopes
//! - **Row codec**: encoding of rows and row streams.
//! - **Datastore**: versioning, conditional writes, scans, table metadata, persistence.
//! - **Routing**: worker list parsing and key/range assignment.
//! - **HTTP**: the storage surface driven through `KvsClient` on an ephemeral port.

#[cfg(test)]
mod tests {
    use crate::error::KvsError;
    use crate::kvs::client::{WorkerEntry, parse_worker_list, plan_scan, worker_index};
    use crate::kvs::handlers::router;
    use crate::kvs::replication::{ReplicationHook, WriteEvent};
    use crate::kvs::row::{decode_stream, write_stream_record};
    use crate::kvs::{Datastore, Kvs, KvsClient, LocalKvs, PutOutcome, Row};

    use axum::routing::get;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn open_store() -> (tempfile::TempDir, Arc<Datastore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Datastore::open(dir.path()).unwrap());
        (dir, store)
    }

    fn keys(rows: impl Iterator<Item = Row>) -> Vec<String> {
        rows.map(|r| r.key().to_string()).collect()
    }

    fn worker(id: &str) -> WorkerEntry {
        WorkerEntry {
            id: id.to_string(),
            address: format!("127.0.0.1:{}", 8000 + id.len()),
        }
    }

    // ============================================================
    // ROW CODEC TESTS
    // ============================================================

    #[test]
    fn test_row_bytes_roundtrip_with_binary_and_spaces() {
        let mut row = Row::new("k1");
        row.put("text", "hello world\nsecond line");
        row.put("raw", vec![0u8, 255, b' ', b'\n']);
        row.put("empty", Vec::new());

        let restored = Row::from_bytes(&row.to_bytes()).unwrap();

        assert_eq!(restored, row);
        assert_eq!(restored.get("text").as_deref(), Some("hello world\nsecond line"));
        assert_eq!(restored.get_bytes("empty"), Some(&[][..]));
    }

    #[test]
    fn test_row_encoding_is_self_describing() {
        let mut row = Row::new("r");
        row.put("a", "xy");

        assert_eq!(row.to_bytes(), b"1 r 1 a 2 xy ".to_vec());
    }

    #[test]
    fn test_stream_stops_at_blank_line() {
        let mut first = Row::new("a");
        first.put("value", "1");
        let mut second = Row::new("b");
        second.put("value", "2 2");

        let mut buf = Vec::new();
        write_stream_record(&first, &mut buf);
        write_stream_record(&second, &mut buf);
        buf.push(b'\n');
        buf.extend_from_slice(b"garbage after terminator");

        let rows = decode_stream(&buf).unwrap();
        assert_eq!(rows, vec![first, second]);
    }

    #[test]
    fn test_truncated_row_is_codec_error() {
        let result = Row::from_bytes(b"1 k 3 col 10 short ");
        assert!(matches!(result, Err(KvsError::Codec(_))));
    }

    #[test]
    fn test_oversized_length_is_codec_error() {
        // A length near usize::MAX must not wrap the read position.
        let result = Row::from_bytes(b"1 r 1 c 18446744073709551615 x ");
        assert!(matches!(result, Err(KvsError::Codec(_))));

        let result = Row::from_bytes(b"18446744073709551615 r ");
        assert!(matches!(result, Err(KvsError::Codec(_))));
    }

    #[test]
    fn test_keys_and_columns_with_separators_survive_a_stream() {
        let mut first = Row::new("hello world");
        first.put("two words", "v 1");
        let mut second = Row::new("line\nbreak");
        second.put("col\n", "\n");

        let mut buf = Vec::new();
        write_stream_record(&first, &mut buf);
        write_stream_record(&second, &mut buf);
        buf.push(b'\n');

        assert_eq!(decode_stream(&buf).unwrap(), vec![first, second]);
    }

    // ============================================================
    // VERSIONING TESTS
    // ============================================================

    #[test]
    fn test_versions_start_at_one_and_increase() {
        let (_dir, store) = open_store();

        let v1 = store.put("t", "r", "a", b"1").unwrap();
        let v2 = store.put("t", "r", "b", b"2").unwrap();
        let v3 = store.put("t", "r", "a", b"3").unwrap();

        assert_eq!((v1, v2, v3), (1, 2, 3));
        // Versions are per row.
        assert_eq!(store.put("t", "other", "a", b"x").unwrap(), 1);
    }

    #[test]
    fn test_historical_reads_see_state_after_that_write() {
        let (_dir, store) = open_store();
        store.put("t", "r", "a", b"1").unwrap();
        store.put("t", "r", "b", b"2").unwrap();
        store.put("t", "r", "a", b"3").unwrap();

        let (value, version) = store.get("t", "r", "a", Some(1)).unwrap();
        assert_eq!((value.as_slice(), version), (&b"1"[..], 1));

        // Column b did not exist yet at version 1.
        assert!(matches!(
            store.get("t", "r", "b", Some(1)),
            Err(KvsError::ColumnNotFound { .. })
        ));

        let (row, version) = store.get_row("t", "r", Some(2)).unwrap();
        assert_eq!(version, 2);
        assert_eq!(row.get("a").as_deref(), Some("1"));
        assert_eq!(row.get("b").as_deref(), Some("2"));

        let (latest, version) = store.get("t", "r", "a", None).unwrap();
        assert_eq!((latest.as_slice(), version), (&b"3"[..], 3));
    }

    #[test]
    fn test_missing_version_row_and_table_are_not_found() {
        let (_dir, store) = open_store();
        store.put("t", "r", "a", b"1").unwrap();

        assert!(matches!(
            store.get("t", "r", "a", Some(2)),
            Err(KvsError::VersionNotFound { version: 2, .. })
        ));
        assert!(matches!(
            store.get("t", "r", "a", Some(0)),
            Err(KvsError::VersionNotFound { .. })
        ));
        assert!(matches!(
            store.get_row("t", "nope", None),
            Err(KvsError::RowNotFound { .. })
        ));
        assert!(matches!(
            store.get_row("missing", "r", None),
            Err(KvsError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_put_row_counts_one_version_per_column() {
        let (_dir, store) = open_store();
        let mut row = Row::new("r");
        row.put("a", "1");
        row.put("b", "2");
        row.put("c", "3");

        assert_eq!(store.put_row("t", &row).unwrap(), 3);
        let (first, _) = store.get_row("t", "r", Some(1)).unwrap();
        assert_eq!(first.column_count(), 1);
    }

    #[test]
    fn test_append_creates_then_extends() {
        let (_dir, store) = open_store();

        assert_eq!(store.append("t", "r", "urls", b"a", ",").unwrap(), 1);
        assert_eq!(store.append("t", "r", "urls", b"b", ",").unwrap(), 2);

        let (value, _) = store.get("t", "r", "urls", None).unwrap();
        assert_eq!(value, b"a,b".to_vec());
    }

    #[test]
    fn test_keys_with_separators_are_stored() {
        let (_dir, store) = open_store();

        store.put("t", "two words", "a b", b"1").unwrap();
        store.put("t", "line\nbreak", "col\n", b"2").unwrap();

        assert_eq!(store.get("t", "two words", "a b", None).unwrap().0, b"1".to_vec());
        let (row, _) = store.get_row("t", "line\nbreak", None).unwrap();
        assert_eq!(row.get("col\n").as_deref(), Some("2"));
    }

    #[test]
    fn test_empty_key_or_column_is_rejected() {
        let (_dir, store) = open_store();

        assert!(matches!(store.put("t", "", "a", b"1"), Err(KvsError::BadRequest(_))));
        assert!(matches!(store.put("t", "r", "", b"1"), Err(KvsError::BadRequest(_))));
        assert!(matches!(
            store.append("t", "", "a", b"1", ","),
            Err(KvsError::BadRequest(_))
        ));
        assert!(!store.exists_row("t", ""));
    }

    #[test]
    fn test_keys_with_separators_survive_replay() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = Datastore::open(dir.path()).unwrap();
            store.put("pt-t", "two words", "a\nb", b"x y").unwrap();
            store.put("pt-t", "next", "value", b"z").unwrap();
        }

        let store = Datastore::open(dir.path()).unwrap();
        assert_eq!(store.get("pt-t", "two words", "a\nb", None).unwrap().0, b"x y".to_vec());
        assert_eq!(store.count("pt-t").unwrap(), 2);
    }

    // ============================================================
    // CONDITIONAL WRITE TESTS
    // ============================================================

    #[test]
    fn test_conditional_put_checks_current_value() {
        let (_dir, store) = open_store();
        store.put("t", "r", "state", b"free").unwrap();

        let failed = store
            .conditional_put("t", "r", "owner", b"x", "state", b"busy")
            .unwrap();
        assert_eq!(failed, PutOutcome::PreconditionFailed);

        let written = store
            .conditional_put("t", "r", "owner", b"x", "state", b"free")
            .unwrap();
        assert_eq!(written, PutOutcome::Written(2));
    }

    #[test]
    fn test_conditional_put_on_missing_row_fails_without_creating_it() {
        let (_dir, store) = open_store();
        store.put("t", "other", "a", b"1").unwrap();

        let outcome = store
            .conditional_put("t", "r", "a", b"1", "a", b"")
            .unwrap();

        assert_eq!(outcome, PutOutcome::PreconditionFailed);
        assert!(!store.exists_row("t", "r"));
        assert_eq!(store.count("t").unwrap(), 1);
    }

    #[test]
    fn test_conditional_put_race_has_single_winner() {
        let (_dir, store) = open_store();
        store.put("t", "lock", "state", b"free").unwrap();

        // ARRANGE: 16 writers race to flip the same precondition.
        let winners = AtomicUsize::new(0);

        // ACT
        std::thread::scope(|scope| {
            for i in 0..16 {
                let store = store.clone();
                let winners = &winners;
                scope.spawn(move || {
                    let mine = format!("taken-{}", i);
                    let outcome = store
                        .conditional_put("t", "lock", "state", mine.as_bytes(), "state", b"free")
                        .unwrap();
                    if let PutOutcome::Written(_) = outcome {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        // ASSERT
        assert_eq!(winners.load(Ordering::SeqCst), 1);
        let (_, version) = store.get_row("t", "lock", None).unwrap();
        assert_eq!(version, 2);
    }

    // ============================================================
    // SCAN TESTS
    // ============================================================

    #[test]
    fn test_scan_half_open_range() {
        let (_dir, store) = open_store();
        for key in ["d", "a", "c", "b"] {
            store.put("t", key, "value", key.as_bytes()).unwrap();
        }

        assert_eq!(keys(store.scan("t", Some("b"), Some("d")).unwrap()), vec!["b", "c"]);
        assert_eq!(keys(store.scan("t", None, None).unwrap()), vec!["a", "b", "c", "d"]);
        assert_eq!(keys(store.scan("t", Some("c"), None).unwrap()), vec!["c", "d"]);
    }

    #[test]
    fn test_scan_empty_and_inverted_ranges_yield_nothing() {
        let (_dir, store) = open_store();
        store.put("t", "a", "value", b"1").unwrap();

        assert!(keys(store.scan("t", Some("b"), Some("b")).unwrap()).is_empty());
        assert!(keys(store.scan("t", Some("z"), Some("b")).unwrap()).is_empty());
        assert!(keys(store.scan("t", Some("x"), None).unwrap()).is_empty());
    }

    #[test]
    fn test_scan_spans_many_batches_in_order() {
        let (_dir, store) = open_store();
        for i in 0..300 {
            store.put("t", &format!("k{:04}", i), "value", b"v").unwrap();
        }

        let scanned = keys(store.scan("t", Some("k0010"), Some("k0290")).unwrap());

        assert_eq!(scanned.len(), 280);
        assert_eq!(scanned.first().map(String::as_str), Some("k0010"));
        assert_eq!(scanned.last().map(String::as_str), Some("k0289"));
        assert!(scanned.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_scan_of_missing_table() {
        let (_dir, store) = open_store();
        assert!(matches!(
            store.scan("missing", None, None),
            Err(KvsError::TableNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_local_kvs_scans_missing_table_as_empty() {
        let (_dir, store) = open_store();
        let kvs = LocalKvs::new(store);

        let rows = kvs.scan("missing", None, None).await.unwrap();
        assert_eq!(rows.count(), 0);
        assert_eq!(kvs.get_row("missing", "r").await.unwrap(), None);
    }

    #[test]
    fn test_page_returns_next_key() {
        let (_dir, store) = open_store();
        for i in 0..12 {
            store.put("t", &format!("r{:02}", i), "value", b"v").unwrap();
        }

        let (rows, next) = store.page("t", None, 10).unwrap();
        assert_eq!(rows.len(), 10);
        assert_eq!(next.as_deref(), Some("r10"));

        let (rows, next) = store.page("t", Some("r10"), 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(next, None);
    }

    // ============================================================
    // TABLE METADATA TESTS
    // ============================================================

    #[test]
    fn test_count_distinguishes_missing_table() {
        let (_dir, store) = open_store();
        store.put("t", "a", "value", b"1").unwrap();
        store.put("t", "b", "value", b"1").unwrap();

        assert_eq!(store.count("t").unwrap(), 2);
        assert!(matches!(store.count("missing"), Err(KvsError::TableNotFound(_))));
    }

    #[test]
    fn test_rename_to_existing_table_conflicts_and_changes_nothing() {
        let (_dir, store) = open_store();
        store.put("a", "r", "value", b"from-a").unwrap();
        store.put("b", "r", "value", b"from-b").unwrap();

        let result = store.rename("a", "b");

        assert!(matches!(result, Err(KvsError::TableExists(ref t)) if t == "b"));
        assert_eq!(store.get("a", "r", "value", None).unwrap().0, b"from-a".to_vec());
        assert_eq!(store.get("b", "r", "value", None).unwrap().0, b"from-b".to_vec());
    }

    #[test]
    fn test_rename_failures_are_distinct() {
        let (_dir, store) = open_store();
        store.put("a", "r", "value", b"1").unwrap();

        assert!(matches!(store.rename("missing", "x"), Err(KvsError::TableNotFound(_))));
        assert!(matches!(store.rename("a", "bad/name"), Err(KvsError::InvalidTableName(_))));
        assert!(matches!(store.rename("a", "pt-a"), Err(KvsError::InvalidTableName(_))));

        store.rename("a", "c").unwrap();
        assert!(matches!(store.count("a"), Err(KvsError::TableNotFound(_))));
        assert_eq!(store.count("c").unwrap(), 1);
    }

    #[test]
    fn test_delete_missing_table_is_not_found() {
        let (_dir, store) = open_store();
        store.put("t", "r", "value", b"1").unwrap();

        assert!(matches!(store.delete("missing"), Err(KvsError::TableNotFound(_))));
        assert_eq!(store.tables(), vec![("t".to_string(), 1)]);

        store.delete("t").unwrap();
        assert!(store.tables().is_empty());
    }

    #[derive(Default)]
    struct RecordingHook {
        events: Mutex<Vec<String>>,
    }

    impl ReplicationHook for RecordingHook {
        fn after_write(&self, event: &WriteEvent<'_>) {
            self.events.lock().push(format!("{:?}", event));
        }
    }

    #[test]
    fn test_replication_hook_sees_successful_writes_only() {
        let dir = tempfile::tempdir().unwrap();
        let hook = Arc::new(RecordingHook::default());
        let store = Datastore::open_with_replication(dir.path(), hook.clone()).unwrap();

        store.put("t", "r", "a", b"1").unwrap();
        store
            .conditional_put("t", "r", "a", b"2", "a", b"wrong")
            .unwrap();
        store.rename("t", "u").unwrap();
        store.delete("u").unwrap();

        let events = hook.events.lock();
        assert_eq!(events.len(), 3);
        assert!(events[0].starts_with("Put"));
        assert!(events[1].starts_with("Rename"));
        assert!(events[2].starts_with("Delete"));
    }

    // ============================================================
    // PERSISTENCE TESTS
    // ============================================================

    #[test]
    fn test_persistent_tables_survive_reopen_with_history() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = Datastore::open(dir.path()).unwrap();
            store.put("pt-crawl", "r", "a", b"1").unwrap();
            store.put("pt-crawl", "r", "a", b"two words").unwrap();
            store.put("scratch", "r", "a", b"gone").unwrap();
        }

        let store = Datastore::open(dir.path()).unwrap();

        assert_eq!(store.get("pt-crawl", "r", "a", Some(1)).unwrap().0, b"1".to_vec());
        let (latest, version) = store.get("pt-crawl", "r", "a", None).unwrap();
        assert_eq!((latest, version), (b"two words".to_vec(), 2));
        assert!(matches!(store.count("scratch"), Err(KvsError::TableNotFound(_))));
    }

    #[test]
    fn test_persistent_rename_and_delete_move_files() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = Datastore::open(dir.path()).unwrap();
            store.put("pt-a", "r", "value", b"1").unwrap();
            store.put("pt-gone", "r", "value", b"1").unwrap();
            store.rename("pt-a", "pt-b").unwrap();
            store.delete("pt-gone").unwrap();
        }

        assert!(dir.path().join("pt-b.table").exists());
        assert!(!dir.path().join("pt-a.table").exists());
        assert!(!dir.path().join("pt-gone.table").exists());

        let store = Datastore::open(dir.path()).unwrap();
        assert_eq!(store.count("pt-b").unwrap(), 1);
    }

    #[test]
    fn test_damaged_log_tail_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = Datastore::open(dir.path()).unwrap();
            store.put("pt-t", "r", "value", b"ok").unwrap();
        }
        let path = dir.path().join("pt-t.table");
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.extend_from_slice(b"r value 99 trunc");
        std::fs::write(&path, bytes).unwrap();

        let store = Datastore::open(dir.path()).unwrap();
        assert_eq!(store.get("pt-t", "r", "value", None).unwrap().0, b"ok".to_vec());
    }

    // ============================================================
    // ROUTING TESTS
    // ============================================================

    #[test]
    fn test_parse_worker_list() {
        let workers = parse_worker_list("2\nbbbbb,10.0.0.2:8001\naaaaa,10.0.0.1:8001\n").unwrap();

        assert_eq!(workers.len(), 2);
        assert_eq!(workers[0].id, "bbbbb");
        assert_eq!(workers[1].address, "10.0.0.1:8001");
        assert!(parse_worker_list("3\na,1.1.1.1:1\n").is_err());
        assert!(parse_worker_list("").is_err());
    }

    #[test]
    fn test_worker_index_wraps_below_smallest_id() {
        let workers = vec![worker("f"), worker("m"), worker("t")];

        assert_eq!(worker_index(&workers, "g"), 0);
        assert_eq!(worker_index(&workers, "m"), 1);
        assert_eq!(worker_index(&workers, "zzz"), 2);
        assert_eq!(worker_index(&workers, "a"), 2);
    }

    #[test]
    fn test_plan_scan_slices_in_key_order() {
        let workers = vec![worker("f"), worker("m")];

        let all = plan_scan(&workers, None, None);
        let bounds: Vec<(usize, Option<&str>, Option<&str>)> = all
            .iter()
            .map(|s| (s.worker, s.from.as_deref(), s.to_exclusive.as_deref()))
            .collect();
        assert_eq!(
            bounds,
            vec![
                (1, None, Some("f")),
                (0, Some("f"), Some("m")),
                (1, Some("m"), None)
            ]
        );

        let narrow = plan_scan(&workers, Some("g"), Some("h"));
        assert_eq!(narrow.len(), 1);
        assert_eq!(narrow[0].worker, 0);
        assert_eq!(narrow[0].from.as_deref(), Some("g"));
        assert_eq!(narrow[0].to_exclusive.as_deref(), Some("h"));
    }

    // ============================================================
    // HTTP TESTS
    // ============================================================

    /// Serves the storage routes plus a coordinator `/workers` listing that
    /// points back at the same listener.
    async fn spawn_worker(store: Arc<Datastore>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let listing = format!("1\naaaaa,{}\n", addr);

        let app = router(store).route(
            "/workers",
            get(move || {
                let listing = listing.clone();
                async move { listing }
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_client_roundtrip_over_http() {
        let (_dir, store) = open_store();
        let addr = spawn_worker(store.clone()).await;
        let client = KvsClient::new(&addr);

        // Writes
        assert_eq!(client.put("t", "k1", "value", b"hello world").await.unwrap(), 1);
        assert_eq!(client.put("t", "k2", "value", b"x").await.unwrap(), 1);
        let mut row = Row::new("k3");
        row.put("a", "1");
        row.put("b", "2");
        client.put_row("t", &row).await.unwrap();
        client.append("t", "k2", "value", b"y", "|").await.unwrap();

        // Reads
        assert_eq!(
            client.get("t", "k1", "value").await.unwrap(),
            Some(b"hello world".to_vec())
        );
        assert_eq!(client.get("t", "k2", "value").await.unwrap(), Some(b"x|y".to_vec()));
        assert_eq!(client.get_row("t", "k3").await.unwrap(), Some(row));
        assert_eq!(client.get("t", "nope", "value").await.unwrap(), None);
        assert!(client.exists_row("t", "k1").await.unwrap());

        let scanned = keys(client.scan("t", Some("k2"), None).await.unwrap());
        assert_eq!(scanned, vec!["k2", "k3"]);
        assert_eq!(client.count("t").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_client_conditional_put_and_metadata_errors() {
        let (_dir, store) = open_store();
        let addr = spawn_worker(store.clone()).await;
        let client = KvsClient::new(&addr);

        client.put("t", "r", "state", b"free").await.unwrap();
        client.put("u", "r", "state", b"free").await.unwrap();

        let won = client
            .conditional_put("t", "r", "state", b"taken", "state", "free")
            .await
            .unwrap();
        let lost = client
            .conditional_put("t", "r", "state", b"taken", "state", "free")
            .await
            .unwrap();
        assert_eq!((won, lost), (Some(2), None));

        assert!(matches!(client.rename("t", "u").await, Err(KvsError::TableExists(ref t)) if t == "u"));
        assert!(matches!(client.delete("missing").await, Err(KvsError::TableNotFound(_))));
        assert!(matches!(client.count("missing").await, Err(KvsError::TableNotFound(_))));

        client.rename("t", "v").await.unwrap();
        assert_eq!(client.count("v").await.unwrap(), 1);
        assert_eq!(keys(client.scan("t", None, None).await.unwrap()).len(), 0);
    }

    #[tokio::test]
    async fn test_http_version_header_and_bad_version() {
        let (_dir, store) = open_store();
        let addr = spawn_worker(store.clone()).await;
        store.put("t", "r", "a", b"1").unwrap();
        store.put("t", "r", "a", b"2").unwrap();
        let http = reqwest::Client::new();

        let response = http
            .get(format!("http://{}/data/t/r/a?version=1", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.headers()["Version"], "1");
        assert_eq!(response.text().await.unwrap(), "1");

        let response = http
            .get(format!("http://{}/data/t/r/a?version=abc", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let response = http
            .get(format!("http://{}/data/t/r/a?version=9", addr))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_http_listing_and_view_pages() {
        let (_dir, store) = open_store();
        let addr = spawn_worker(store.clone()).await;
        for i in 0..11 {
            store.put("t", &format!("r{:02}", i), "value", b"v").unwrap();
        }
        let http = reqwest::Client::new();

        let tables: serde_json::Value = http
            .get(format!("http://{}/", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(tables["tables"][0]["name"], "t");
        assert_eq!(tables["tables"][0]["rows"], 11);

        let page: serde_json::Value = http
            .get(format!("http://{}/view/t", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(page["rows"].as_array().map(Vec::len), Some(10));
        assert_eq!(page["next"], "r10");
    }

    #[tokio::test]
    async fn test_http_malformed_row_body_is_bad_request() {
        let (_dir, store) = open_store();
        let addr = spawn_worker(store.clone()).await;
        let http = reqwest::Client::new();

        let response = http
            .put(format!("http://{}/data/t/r", addr))
            .body(&b"1 r 1 c 18446744073709551615 x "[..])
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        assert!(!store.exists_row("t", "r"));
    }
}
