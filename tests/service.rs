use std::sync::Arc;

use concentration_grader::{
    ConcentrationGrader, GraderConfig, GraderError, GraderHandle, GraderService, Interval,
    IntervalLog, ManualClock, Timestamp,
};

const T0: Timestamp = 1_700_000_000;

fn config() -> GraderConfig {
    GraderConfig {
        // ticks are driven by hand
        tick_interval_ms: 3_600_000,
        ..GraderConfig::default()
    }
}

async fn attentive_minute(handle: &GraderHandle, clock: &ManualClock, start: Timestamp) -> Vec<Interval> {
    let mut emitted = Vec::new();
    for elapsed in 0..65 {
        clock.set(start + elapsed);
        handle.add_frame().unwrap();
        handle.add_face().unwrap();
        handle.add_body_concentration().unwrap();
        handle.add_face_center(320.0, 240.0).unwrap();
        if elapsed % 3 == 0 {
            handle.add_blink().unwrap();
        }
        emitted.extend(handle.tick_now().await.unwrap());
    }
    emitted
}

#[tokio::test]
async fn test_service_broadcasts_and_persists_intervals() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("intervals.json");
    let clock = ManualClock::new(T0);
    let grader = ConcentrationGrader::new(config(), Arc::new(clock.clone())).unwrap();
    let (handle, task) = GraderService::spawn(grader, Some(IntervalLog::new(&log_path)));

    let mut first = handle.subscribe();
    let mut second = handle.subscribe();
    handle.start_grading().await.unwrap();

    let emitted = attentive_minute(&handle, &clock, T0).await;
    assert_eq!(emitted, vec![Interval::new(T0, T0 + 60)]);

    let received = first.recv().await.unwrap();
    assert_eq!(received, Interval::new(T0, T0 + 60));
    assert_eq!(received.grade, Some(1.0));
    assert_eq!(second.recv().await.unwrap(), received);

    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.emitted, 1);
    assert_eq!(stats.pending, 0);

    handle.shutdown();
    task.await.unwrap();

    let stored = IntervalLog::new(&log_path).read_all().await.unwrap();
    assert_eq!(stored, vec![Interval::new(T0, T0 + 60)]);
    assert_eq!(stored[0].grade, Some(1.0));
}

#[tokio::test]
async fn test_unwritable_log_keeps_intervals_until_repaired() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("state");
    std::fs::write(&blocker, "not a directory").unwrap();
    let log_path = blocker.join("intervals.json");
    let clock = ManualClock::new(T0);
    let (handle, task) = GraderService::from_config(
        GraderConfig {
            log_path: log_path.clone(),
            ..config()
        },
        Arc::new(clock.clone()),
    )
    .unwrap();
    handle.start_grading().await.unwrap();

    let first = attentive_minute(&handle, &clock, T0).await;
    assert_eq!(first, vec![Interval::new(T0, T0 + 60)]);

    std::fs::remove_file(&blocker).unwrap();
    std::fs::create_dir(&blocker).unwrap();

    let second = attentive_minute(&handle, &clock, T0 + 65).await;
    assert_eq!(second, vec![Interval::new(T0 + 60, T0 + 120)]);

    handle.shutdown();
    task.await.unwrap();

    let stored = IntervalLog::new(&log_path).read_all().await.unwrap();
    assert_eq!(stored, vec![first[0], second[0]]);
    assert_eq!(stored[0].grade, Some(1.0));
}

#[tokio::test]
async fn test_stopped_service_ignores_intake() {
    let clock = ManualClock::new(T0);
    let grader = ConcentrationGrader::new(config(), Arc::new(clock.clone())).unwrap();
    let (handle, task) = GraderService::spawn(grader, None);

    let emitted = attentive_minute(&handle, &clock, T0).await;
    assert!(emitted.is_empty());

    handle.start_grading().await.unwrap();
    handle.stop_grading().await.unwrap();
    let stats = handle.stats().await.unwrap();
    assert_eq!(stats.emitted, 0);

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn test_bad_landmarks_do_not_kill_the_service() {
    let clock = ManualClock::new(T0);
    let grader = ConcentrationGrader::new(config(), Arc::new(clock.clone())).unwrap();
    let (handle, task) = GraderService::spawn(grader, None);
    handle.start_grading().await.unwrap();

    handle.detect_blink(&[(0.0, 0.0); 7]).unwrap();
    handle.detect_blink(&[(1.0, 1.0); 6]).unwrap();
    assert!(handle.stats().await.is_ok());

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test]
async fn test_handle_reports_closed_service() {
    let clock = ManualClock::new(T0);
    let grader = ConcentrationGrader::new(config(), Arc::new(clock)).unwrap();
    let (handle, task) = GraderService::spawn(grader, None);

    handle.shutdown();
    task.await.unwrap();

    assert!(matches!(handle.add_frame(), Err(GraderError::ServiceClosed)));
    assert!(matches!(handle.stats().await, Err(GraderError::ServiceClosed)));
}
