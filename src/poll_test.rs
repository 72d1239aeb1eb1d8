use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::json;
use tokio::time::Instant;

use super::*;
use crate::config::MIN_POLL_DELAY;

/// Replays scripted responses; once the script runs out every fetch
/// reports `pending`.
struct Scripted {
    script: Mutex<VecDeque<Result<Diagnosis, ApiError>>>,
    fetches: Mutex<Vec<(DiagnosisId, Instant)>>,
}

impl Scripted {
    fn new(script: Vec<Result<Diagnosis, ApiError>>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script.into()), fetches: Mutex::new(Vec::new()) })
    }

    fn fetch_times(&self) -> Vec<Instant> {
        self.fetches.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl DiagnosisSource for Scripted {
    async fn fetch_diagnosis(&self, id: DiagnosisId) -> Result<Diagnosis, ApiError> {
        self.fetches.lock().unwrap().push((id, Instant::now()));
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(diagnosis(id.0, "pending")))
    }
}

fn diagnosis(id: i64, status: &str) -> Diagnosis {
    serde_json::from_value(json!({
        "id": id,
        "image_url": format!("https://cdn.example.test/scans/{id}.png"),
        "status": status,
    }))
    .unwrap()
}

fn config() -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(2000),
        max_retries: 3,
        retry_base: Duration::from_millis(500),
        retry_max: Duration::from_millis(8000),
    }
}

fn transport() -> ApiError {
    ApiError::Transport("connection reset".to_owned())
}

#[tokio::test(start_paused = true)]
async fn polls_until_completed_at_fixed_interval() {
    let source = Scripted::new(vec![
        Ok(diagnosis(7, "pending")),
        Ok(diagnosis(7, "processing")),
        Ok(diagnosis(7, "completed")),
    ]);
    let handle = spawn_poll(source.clone(), DiagnosisId(7), config());

    let state = handle.wait().await;
    assert!(matches!(state, PollState::Completed(ref d) if d.id == DiagnosisId(7)));

    let times = source.fetch_times();
    assert_eq!(times.len(), 3);
    assert_eq!(times[1] - times[0], Duration::from_millis(2000));
    assert_eq!(times[2] - times[1], Duration::from_millis(2000));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(source.fetch_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn first_fetch_is_immediate() {
    let source = Scripted::new(vec![Ok(diagnosis(1, "completed"))]);
    let started = Instant::now();
    let handle = spawn_poll(source.clone(), DiagnosisId(1), config());
    handle.wait().await;
    assert_eq!(source.fetch_times()[0] - started, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn teardown_after_first_response_stops_fetching() {
    let source = Scripted::new(Vec::new());
    let handle = spawn_poll(source.clone(), DiagnosisId(3), config());

    let mut rx = handle.subscribe();
    rx.wait_for(|s| matches!(s, PollState::InProgress(_))).await.unwrap();
    assert_eq!(source.fetch_count(), 1);

    drop(handle);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(source.fetch_count(), 1);
    assert!(matches!(*rx.borrow(), PollState::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_then_recover() {
    let source = Scripted::new(vec![
        Err(transport()),
        Err(ApiError::Http { status: 503, message: "Service Unavailable".to_owned(), fields: None }),
        Ok(diagnosis(9, "completed")),
    ]);
    let handle = spawn_poll(source.clone(), DiagnosisId(9), config());

    assert!(matches!(handle.wait().await, PollState::Completed(_)));
    let times = source.fetch_times();
    assert_eq!(times.len(), 3);
    // 500ms then 1000ms base delays, each with at most 25% jitter.
    let first = times[1] - times[0];
    let second = times[2] - times[1];
    assert!(first >= Duration::from_millis(500) && first <= Duration::from_millis(625), "{first:?}");
    assert!(second >= Duration::from_millis(1000) && second <= Duration::from_millis(1250), "{second:?}");
}

#[tokio::test(start_paused = true)]
async fn retries_are_bounded() {
    let source = Scripted::new(vec![
        Ok(diagnosis(4, "processing")),
        Err(transport()),
        Err(transport()),
        Err(transport()),
        Err(transport()),
    ]);
    let handle = spawn_poll(source.clone(), DiagnosisId(4), config());

    let state = handle.wait().await;
    match state {
        PollState::Error { last, session_expired, .. } => {
            assert!(!session_expired);
            assert_eq!(last.map(|d| d.status), Some(DiagnosisStatus::Processing));
        }
        other => panic!("unexpected state {other:?}"),
    }
    // One success, then the first failure plus three retries.
    assert_eq!(source.fetch_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn expired_session_is_not_retried() {
    let source = Scripted::new(vec![Err(ApiError::Unauthorized { message: "Token expired".to_owned() })]);
    let handle = spawn_poll(source.clone(), DiagnosisId(5), config());

    assert!(matches!(handle.wait().await, PollState::Error { session_expired: true, .. }));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_analysis_is_terminal() {
    let source = Scripted::new(vec![Ok(diagnosis(6, "processing")), Ok(diagnosis(6, "failed"))]);
    let handle = spawn_poll(source.clone(), DiagnosisId(6), config());

    assert!(matches!(handle.wait().await, PollState::Failed(_)));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn starting_a_new_poll_cancels_the_previous_one() {
    let source = Scripted::new(Vec::new());
    let mut poller = Poller::new(source.clone(), config());

    let mut first = poller.start(DiagnosisId(1));
    first.wait_for(|s| matches!(s, PollState::InProgress(_))).await.unwrap();

    let mut second = poller.start(DiagnosisId(2));
    assert!(matches!(*first.borrow(), PollState::Cancelled));
    second.wait_for(|s| matches!(s, PollState::InProgress(_))).await.unwrap();

    tokio::time::sleep(Duration::from_millis(4500)).await;
    let fetches = source.fetches.lock().unwrap().clone();
    let for_first = fetches.iter().filter(|(id, _)| *id == DiagnosisId(1)).count();
    let for_second = fetches.iter().filter(|(id, _)| *id == DiagnosisId(2)).count();
    assert_eq!(for_first, 1);
    assert_eq!(for_second, 3);

    poller.stop();
    assert!(poller.current().is_none());
}

#[test]
fn retry_delay_is_capped() {
    let config = config();
    for attempt in 1..=10 {
        let delay = retry_delay(&config, attempt);
        assert!(delay <= config.retry_max);
        assert!(delay >= config.retry_base);
    }
    assert_eq!(retry_delay(&config, 10), config.retry_max);
}

#[tokio::test(start_paused = true)]
async fn zero_interval_still_waits_between_fetches() {
    let source = Scripted::new(vec![
        Ok(diagnosis(8, "pending")),
        Ok(diagnosis(8, "processing")),
        Ok(diagnosis(8, "completed")),
    ]);
    let zero = PollConfig { interval: Duration::ZERO, retry_base: Duration::ZERO, ..config() };
    let handle = spawn_poll(source.clone(), DiagnosisId(8), zero);

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(source.fetch_count(), 1);

    assert!(matches!(handle.wait().await, PollState::Completed(_)));
    let times = source.fetch_times();
    assert_eq!(times.len(), 3);
    assert_eq!(times[1] - times[0], MIN_POLL_DELAY);
    assert_eq!(times[2] - times[1], MIN_POLL_DELAY);
}

#[tokio::test(start_paused = true)]
async fn zero_retry_base_still_backs_off() {
    let source = Scripted::new(vec![Err(transport()), Ok(diagnosis(2, "completed"))]);
    let zero = PollConfig { retry_base: Duration::ZERO, retry_max: Duration::ZERO, ..config() };
    let handle = spawn_poll(source.clone(), DiagnosisId(2), zero);

    assert!(matches!(handle.wait().await, PollState::Completed(_)));
    let times = source.fetch_times();
    assert!(times[1] - times[0] >= MIN_POLL_DELAY);
}
