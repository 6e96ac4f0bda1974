use super::*;

use std::sync::atomic::Ordering;

#[tokio::test]
async fn delete_is_idempotent() {
    let (backend, queue) = probe_queue();
    queue.push("X", json!(null), None).await.unwrap();

    let mut job = queue.pop(None).await.unwrap().expect("job is due");
    assert!(!job.is_deleted());

    // One ack from the pull itself, one from the delete.
    job.delete().await.unwrap();
    assert!(job.is_deleted());
    assert_eq!(backend.count("acknowledge"), 2);

    job.delete().await.unwrap();
    assert_eq!(backend.count("acknowledge"), 2);
}

#[tokio::test]
async fn release_increments_attempts_and_keeps_job_id() {
    let queue = test_queue();
    let id = queue.push("X", json!(null), None).await.unwrap();

    let mut job = queue.pop(None).await.unwrap().expect("first delivery");
    assert_eq!(job.attempts(), 0);
    job.release(Delay::none()).await.unwrap();
    assert!(job.is_released());

    let mut job = queue.pop(None).await.unwrap().expect("second delivery");
    assert_eq!(job.attempts(), 1);
    assert_eq!(job.job_id(), id);
    job.release(Delay::none()).await.unwrap();

    let job = queue.pop(None).await.unwrap().expect("third delivery");
    assert_eq!(job.attempts(), 2);
    assert_eq!(job.job_id(), id);
}

#[tokio::test]
async fn release_with_delay_hides_the_job() {
    let queue = test_queue();
    queue.push("X", json!(null), None).await.unwrap();

    let mut job = queue.pop(None).await.unwrap().expect("job is due");
    job.release(Delay::Seconds(3600)).await.unwrap();

    assert!(queue.pop(None).await.unwrap().is_none());
}

#[tokio::test]
async fn release_is_idempotent() {
    let (backend, queue) = probe_queue();
    queue.push("X", json!(null), None).await.unwrap();

    let mut job = queue.pop(None).await.unwrap().expect("job is due");
    job.release(Delay::none()).await.unwrap();
    job.release(Delay::none()).await.unwrap();

    // One publish from the push, one from the single effective release.
    assert_eq!(backend.count("publish"), 2);
}

#[tokio::test]
async fn publish_failure_after_ack_loses_the_message() {
    let (backend, queue) = probe_queue();
    queue.push("X", json!(null), None).await.unwrap();

    let mut job = queue.pop(None).await.unwrap().expect("job is due");
    backend.fail_publish.store(true, Ordering::SeqCst);
    assert!(job.release(Delay::none()).await.is_err());
    backend.fail_publish.store(false, Ordering::SeqCst);

    // The original was acknowledged before the failed publish, so nothing
    // comes back even after the ack deadline. This is the documented
    // non-transactional window of the requeue path.
    tokio::time::sleep(TEST_ACK_DEADLINE * 3).await;
    assert!(queue.pop(None).await.unwrap().is_none());
}
