use concentration_grader::{Interval, IntervalLog};

#[tokio::test]
async fn test_appended_intervals_read_back_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let log = IntervalLog::new(dir.path().join("intervals.json"));
    log.init().await.unwrap();

    let first = Interval::new(100, 160).with_grade(0.82);
    let second = Interval::new(160, 200).with_grade(0.4);
    let ungraded = Interval::new(200, 260);
    log.append(&first).await.unwrap();
    log.append_all(&[second, ungraded]).await.unwrap();

    let stored = log.read_all().await.unwrap();
    assert_eq!(stored, vec![first, second, ungraded]);
    assert_eq!(stored[0].grade, Some(0.82));
    assert_eq!(stored[1].grade, Some(0.4));
    assert_eq!(stored[2].grade, None);
}

#[tokio::test]
async fn test_file_is_a_plain_json_array() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("intervals.json");
    let log = IntervalLog::new(&path);
    log.init().await.unwrap();
    log.append(&Interval::new(0, 60).with_grade(1.0)).await.unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        value,
        serde_json::json!([{ "start": 0, "end": 60, "grade": 1.0 }])
    );
}

#[tokio::test]
async fn test_init_truncates_previous_session() {
    let dir = tempfile::tempdir().unwrap();
    let log = IntervalLog::new(dir.path().join("intervals.json"));
    log.init().await.unwrap();
    log.append(&Interval::new(0, 60).with_grade(0.9)).await.unwrap();

    log.init().await.unwrap();
    assert!(log.read_all().await.unwrap().is_empty());
}
