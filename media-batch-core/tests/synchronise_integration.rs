use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use tempfile::tempdir;

use media_batch_core::contract::{
    ListPage, Location, MockAudioExtractor, MockMetadataExtractor, MockTranscriber,
    ObjectStore, ObjectSummary,
};
use media_batch_core::error::{EngineError, StoreError, ToolError};
use media_batch_core::item::{FailureStage, Outcome};
use media_batch_core::synchronise::{synchronise, SynchroniseConfig};
use media_batch_core::trace::{failure_line, FailureLog};
use media_batch_core::transform::{AudioStrategy, MetadataStrategy, TranscriptStrategy};

/// In-memory object store with deterministic, key-ordered pagination.
struct MemoryStore {
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    page_size: usize,
    puts: Mutex<Vec<String>>,
    gets: Mutex<Vec<String>>,
    failing_listings: HashSet<String>,
    failing_gets: HashSet<String>,
    failing_puts: Mutex<HashSet<String>>,
}

impl MemoryStore {
    fn new(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size,
            puts: Mutex::new(Vec::new()),
            gets: Mutex::new(Vec::new()),
            failing_listings: HashSet::new(),
            failing_gets: HashSet::new(),
            failing_puts: Mutex::new(HashSet::new()),
        }
    }

    fn with(self, bucket: &str, key: &str, body: &[u8]) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), body.to_vec());
        self
    }

    fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    fn fail_puts_to(&self, key: &str) {
        self.failing_puts.lock().unwrap().insert(key.to_string());
    }

    fn clear_put_failures(&self) {
        self.failing_puts.lock().unwrap().clear();
    }

    fn put_count(&self) -> usize {
        self.puts.lock().unwrap().len()
    }

    fn get_count(&self) -> usize {
        self.gets.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        location: &Location,
        continuation: Option<String>,
    ) -> Result<ListPage, StoreError> {
        if self.failing_listings.contains(&location.bucket) {
            return Err(StoreError::list_failed("access denied"));
        }
        let start: usize = continuation
            .map(|t| t.parse().expect("token is an offset"))
            .unwrap_or(0);
        let prefix = location.normalized_prefix().unwrap_or("");
        let keys: Vec<(String, u64)> = self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((bucket, key), _)| *bucket == location.bucket && key.starts_with(prefix))
            .map(|((_, key), body)| (key.clone(), body.len() as u64))
            .collect();
        let end = (start + self.page_size).min(keys.len());
        Ok(ListPage {
            objects: keys[start..end]
                .iter()
                .map(|(key, size)| ObjectSummary {
                    key: key.clone(),
                    size: *size,
                    last_modified: None,
                })
                .collect(),
            next_token: (end < keys.len()).then(|| end.to_string()),
        })
    }

    async fn get_object(
        &self,
        location: &Location,
        key: &str,
        destination: &Path,
    ) -> Result<(), StoreError> {
        self.gets.lock().unwrap().push(key.to_string());
        if self.failing_gets.contains(key) {
            // Leave a partial file behind, as an interrupted transfer would.
            std::fs::write(destination, b"partial").unwrap();
            return Err(StoreError::download_failed("connection reset"));
        }
        let body = self
            .object(&location.bucket, key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        tokio::fs::write(destination, body).await?;
        Ok(())
    }

    async fn put_object(
        &self,
        location: &Location,
        key: &str,
        source: &Path,
        _content_type: Option<String>,
    ) -> Result<(), StoreError> {
        if self.failing_puts.lock().unwrap().contains(key) {
            return Err(StoreError::upload_failed("service unavailable"));
        }
        let body = tokio::fs::read(source).await?;
        self.puts.lock().unwrap().push(key.to_string());
        self.objects
            .lock()
            .unwrap()
            .insert((location.bucket.clone(), key.to_string()), body);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingFailureLog {
    lines: Mutex<Vec<String>>,
}

impl RecordingFailureLog {
    fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl FailureLog for RecordingFailureLog {
    fn record(&self, stage: FailureStage, key: &str) {
        self.lines.lock().unwrap().push(failure_line(stage, key));
    }
}

fn config(scratch: &Path, source: Location, destination: Location) -> SynchroniseConfig {
    SynchroniseConfig {
        source,
        destination,
        scratch_dir: scratch.to_path_buf(),
    }
}

fn videos_to_audio(scratch: &Path) -> SynchroniseConfig {
    config(
        scratch,
        Location::new("videos", None),
        Location::new("audio", None),
    )
}

/// Extractor that writes a small audio file for every input, except the
/// inputs named in `failing`.
fn extractor(failing: &'static [&'static str]) -> MockAudioExtractor {
    let mut extractor = MockAudioExtractor::new();
    extractor.expect_extract_audio().returning(move |input, output| {
        let name = input.file_name().unwrap().to_string_lossy().to_string();
        if failing.contains(&name.as_str()) {
            std::fs::write(output, b"half").unwrap();
            return Err(ToolError::Failed {
                tool: "ffmpeg".into(),
                status: "exit status: 1".into(),
                stderr: "Invalid data found when processing input".into(),
            });
        }
        std::fs::write(output, format!("audio of {name}")).unwrap();
        Ok(())
    });
    extractor
}

fn scratch_is_empty(scratch: &Path) -> bool {
    std::fs::read_dir(scratch).unwrap().next().is_none()
}

#[tokio::test]
async fn test_skips_completed_and_processes_the_rest() {
    let tmp = tempdir().unwrap();
    let scratch = tmp.path().join("scratch");
    let store = MemoryStore::new(1000)
        .with("videos", "clip1.mp4", b"v1")
        .with("videos", "clip2.mp4", b"v2")
        .with("videos", "notes.txt", b"n")
        .with("audio", "clip1.m4a", b"existing");
    let mut extractor = MockAudioExtractor::new();
    extractor
        .expect_extract_audio()
        .times(1)
        .returning(|input, output| {
            assert_eq!(input.file_name().unwrap(), "clip2.mp4");
            std::fs::write(output, b"a2").unwrap();
            Ok(())
        });
    let strategy = AudioStrategy::new(extractor);
    let failures = RecordingFailureLog::default();

    let report = synchronise(&store, &strategy, &videos_to_audio(&scratch), &failures)
        .await
        .expect("run should complete");

    let outcomes: Vec<(&str, Outcome)> = report
        .items
        .iter()
        .map(|i| (i.key.as_str(), i.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![("clip1.mp4", Outcome::Skipped), ("clip2.mp4", Outcome::Succeeded)]
    );
    assert_eq!(store.object("audio", "clip2.m4a").unwrap(), b"a2");
    assert_eq!(store.object("audio", "clip1.m4a").unwrap(), b"existing");
    assert_eq!(store.get_count(), 1, "skipped items must not be downloaded");
    assert!(failures.lines().is_empty());
    assert!(scratch_is_empty(&scratch));
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let tmp = tempdir().unwrap();
    let store = MemoryStore::new(2)
        .with("videos", "a.mp4", b"a")
        .with("videos", "b.mp4", b"b")
        .with("videos", "c.mp4", b"c");
    let strategy = AudioStrategy::new(extractor(&[]));
    let failures = RecordingFailureLog::default();
    let cfg = videos_to_audio(tmp.path());

    let first = synchronise(&store, &strategy, &cfg, &failures).await.unwrap();
    assert_eq!(first.succeeded(), 3);
    let puts_after_first = store.put_count();

    let second = synchronise(&store, &strategy, &cfg, &failures).await.unwrap();
    assert_eq!(second.skipped(), 3);
    assert_eq!(second.succeeded(), 0);
    assert_eq!(store.put_count(), puts_after_first);
}

#[tokio::test]
async fn test_completion_match_ignores_case() {
    let tmp = tempdir().unwrap();
    let store = MemoryStore::new(10)
        .with("videos", "foo.MP4", b"f")
        .with("audio", "Foo.m4a", b"done");
    let mut extractor = MockAudioExtractor::new();
    extractor.expect_extract_audio().never();
    let strategy = AudioStrategy::new(extractor);

    let report = synchronise(
        &store,
        &strategy,
        &videos_to_audio(tmp.path()),
        &RecordingFailureLog::default(),
    )
    .await
    .unwrap();

    assert_eq!(report.skipped(), 1);
    assert_eq!(store.put_count(), 0);
}

#[tokio::test]
async fn test_one_failing_item_does_not_stop_the_batch() {
    let tmp = tempdir().unwrap();
    let mut store = MemoryStore::new(2);
    for n in 1..=5 {
        store = store.with("videos", &format!("clip{n}.mp4"), b"v");
    }
    let strategy = AudioStrategy::new(extractor(&["clip3.mp4"]));
    let failures = RecordingFailureLog::default();

    let report = synchronise(&store, &strategy, &videos_to_audio(tmp.path()), &failures)
        .await
        .unwrap();

    assert_eq!(report.items.len(), 5);
    assert_eq!(report.succeeded(), 4);
    let failed = report.failed_at(FailureStage::Transform);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].key, "clip3.mp4");
    assert!(store.object("audio", "clip3.m4a").is_none());
    assert_eq!(failures.lines(), vec!["EXTRACTION_FAILED: clip3.mp4"]);
    assert!(scratch_is_empty(tmp.path()));
}

#[tokio::test]
async fn test_download_failure_reclaims_partial_file() {
    let tmp = tempdir().unwrap();
    let mut store = MemoryStore::new(10)
        .with("videos", "a.mp4", b"a")
        .with("videos", "b.mp4", b"b");
    store.failing_gets.insert("a.mp4".to_string());
    let strategy = AudioStrategy::new(extractor(&[]));
    let failures = RecordingFailureLog::default();

    let report = synchronise(&store, &strategy, &videos_to_audio(tmp.path()), &failures)
        .await
        .unwrap();

    assert_eq!(report.items[0].outcome, Outcome::Failed(FailureStage::Download));
    assert_eq!(report.items[1].outcome, Outcome::Succeeded);
    assert_eq!(failures.lines(), vec!["DOWNLOAD_FAILED: a.mp4"]);
    assert!(scratch_is_empty(tmp.path()));
}

#[tokio::test]
async fn test_publish_failure_reclaims_input_and_output() {
    let tmp = tempdir().unwrap();
    let store = MemoryStore::new(10).with("videos", "a.mp4", b"a");
    store.fail_puts_to("a.m4a");
    let strategy = AudioStrategy::new(extractor(&[]));
    let failures = RecordingFailureLog::default();

    let report = synchronise(&store, &strategy, &videos_to_audio(tmp.path()), &failures)
        .await
        .unwrap();

    assert_eq!(report.items[0].outcome, Outcome::Failed(FailureStage::Publish));
    assert!(report.has_failures());
    assert_eq!(failures.lines(), vec!["UPLOAD_FAILED: a.mp4"]);
    assert!(scratch_is_empty(tmp.path()));
}

#[tokio::test]
async fn test_unreadable_destination_degrades_to_empty_inventory() {
    let tmp = tempdir().unwrap();
    let mut store = MemoryStore::new(10)
        .with("videos", "a.mp4", b"a")
        .with("audio", "a.m4a", b"old");
    store.failing_listings.insert("audio".to_string());
    let strategy = AudioStrategy::new(extractor(&[]));

    let report = synchronise(
        &store,
        &strategy,
        &videos_to_audio(tmp.path()),
        &RecordingFailureLog::default(),
    )
    .await
    .expect("destination listing failure is not fatal");

    assert_eq!(report.succeeded(), 1);
    assert_eq!(store.object("audio", "a.m4a").unwrap(), b"audio of a.mp4");
}

#[tokio::test]
async fn test_unreadable_source_aborts_the_run() {
    let tmp = tempdir().unwrap();
    let mut store = MemoryStore::new(10).with("videos", "a.mp4", b"a");
    store.failing_listings.insert("videos".to_string());
    let mut extractor = MockAudioExtractor::new();
    extractor.expect_extract_audio().never();
    let strategy = AudioStrategy::new(extractor);

    let result = synchronise(
        &store,
        &strategy,
        &videos_to_audio(tmp.path()),
        &RecordingFailureLog::default(),
    )
    .await;

    match result {
        Err(EngineError::ListingUnavailable { location, .. }) => {
            assert_eq!(location, "s3://videos")
        }
        other => panic!("expected ListingUnavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_metadata_flavor_publishes_pretty_json() {
    let tmp = tempdir().unwrap();
    let store = MemoryStore::new(10)
        .with("videos", "talks/intro.mp4", b"v")
        .with("videos", "talks/readme.md", b"r");
    let mut probe = MockMetadataExtractor::new();
    probe
        .expect_extract_metadata()
        .times(1)
        .returning(|_| Ok(json!({"format": {"duration": "12.5"}})));
    let strategy = MetadataStrategy::new(probe);
    let cfg = config(
        tmp.path(),
        Location::new("videos", Some("talks/".to_string())),
        Location::new("metadata", None),
    );

    let report = synchronise(&store, &strategy, &cfg, &RecordingFailureLog::default())
        .await
        .unwrap();

    assert_eq!(report.succeeded(), 1);
    let body = store.object("metadata", "intro_metadata.json").unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["format"]["duration"], "12.5");
    assert!(String::from_utf8(body).unwrap().contains("\n  \"format\""));
}

#[tokio::test]
async fn test_transcript_flavor_publishes_under_transcripts_prefix() {
    let tmp = tempdir().unwrap();
    let store = MemoryStore::new(10).with("audio", "talk.m4a", b"a");
    let mut transcriber = MockTranscriber::new();
    transcriber.expect_transcribe().times(1).returning(|_, _| {
        Ok(json!({
            "language": "en",
            "segments": [{"text": "hello"}],
            "word_segments": [{"word": "hello", "start": 0.0, "end": 0.4}]
        }))
    });
    let strategy = TranscriptStrategy::new(transcriber);
    let cfg = config(
        tmp.path(),
        Location::new("audio", None),
        Location::new("text", Some("output".to_string())),
    );
    let failures = RecordingFailureLog::default();

    let first = synchronise(&store, &strategy, &cfg, &failures).await.unwrap();
    assert_eq!(first.succeeded(), 1);
    assert_eq!(
        first.items[0].output.as_str(),
        "output/transcripts/talk_transcript.txt"
    );
    for name in [
        "talk_transcript.txt",
        "talk_word_timestamps.txt",
        "talk_30sec_timestamps.txt",
        "talk_60sec_timestamps.txt",
    ] {
        assert!(
            store
                .object("text", &format!("output/transcripts/{name}"))
                .is_some(),
            "missing {name}"
        );
    }

    let second = synchronise(&store, &strategy, &cfg, &failures).await.unwrap();
    assert_eq!(second.skipped(), 1);
    assert!(scratch_is_empty(tmp.path()));
}

#[tokio::test]
async fn test_same_output_twice_in_one_run_is_processed_once() {
    let tmp = tempdir().unwrap();
    let store = MemoryStore::new(10)
        .with("videos", "a/clip.mp4", b"first")
        .with("videos", "b/clip.mp4", b"second");
    let mut extractor = MockAudioExtractor::new();
    extractor
        .expect_extract_audio()
        .times(1)
        .returning(|_, output| {
            std::fs::write(output, b"clip audio").unwrap();
            Ok(())
        });
    let strategy = AudioStrategy::new(extractor);

    let report = synchronise(
        &store,
        &strategy,
        &videos_to_audio(tmp.path()),
        &RecordingFailureLog::default(),
    )
    .await
    .unwrap();

    let outcomes: Vec<(&str, Outcome)> = report
        .items
        .iter()
        .map(|i| (i.key.as_str(), i.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![("a/clip.mp4", Outcome::Succeeded), ("b/clip.mp4", Outcome::Skipped)]
    );
    assert_eq!(store.put_count(), 1);
    assert_eq!(store.get_count(), 1);
}

#[tokio::test]
async fn test_partially_published_transcript_is_retried_on_next_run() {
    let tmp = tempdir().unwrap();
    let store = MemoryStore::new(10).with("audio", "talk.m4a", b"a");
    store.fail_puts_to("transcripts/talk_word_timestamps.txt");
    let mut transcriber = MockTranscriber::new();
    transcriber.expect_transcribe().times(2).returning(|_, _| {
        Ok(json!({
            "language": "en",
            "segments": [{"text": "hello"}],
            "word_segments": [{"word": "hello", "start": 0.0, "end": 0.4}]
        }))
    });
    let strategy = TranscriptStrategy::new(transcriber);
    let cfg = config(
        tmp.path(),
        Location::new("audio", None),
        Location::new("text", None),
    );
    let failures = RecordingFailureLog::default();

    let first = synchronise(&store, &strategy, &cfg, &failures).await.unwrap();
    assert_eq!(first.items[0].outcome, Outcome::Failed(FailureStage::Publish));
    assert!(
        store.object("text", "transcripts/talk_transcript.txt").is_none(),
        "completion file must not be published before the others"
    );
    assert_eq!(failures.lines(), vec!["UPLOAD_FAILED: talk.m4a"]);

    store.clear_put_failures();
    let second = synchronise(&store, &strategy, &cfg, &failures).await.unwrap();
    assert_eq!(second.items[0].outcome, Outcome::Succeeded);
    for name in [
        "talk_transcript.txt",
        "talk_word_timestamps.txt",
        "talk_30sec_timestamps.txt",
        "talk_60sec_timestamps.txt",
    ] {
        assert!(
            store.object("text", &format!("transcripts/{name}")).is_some(),
            "missing {name}"
        );
    }
    assert!(scratch_is_empty(tmp.path()));
}
