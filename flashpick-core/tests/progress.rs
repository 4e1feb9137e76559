use flashpick_core::progress::{SMOOTHING_FACTOR, TICK_INTERVAL};
use flashpick_core::{Error, Estimator, EstimatorOptions, EstimatorState, ProgressSnapshot};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type Reports = Arc<Mutex<Vec<ProgressSnapshot>>>;

fn estimator(options: EstimatorOptions) -> (Estimator, Reports) {
    let reports: Reports = Arc::default();
    let sink = reports.clone();
    let estimator = Estimator::new(options, move |snapshot| sink.lock().unwrap().push(snapshot));
    (estimator, reports)
}

fn last(reports: &Reports) -> ProgressSnapshot {
    *reports.lock().unwrap().last().unwrap()
}

#[test]
fn never_reports_one_hundred_before_complete() {
    let (mut estimator, reports) = estimator(EstimatorOptions::default().total_size(1000));
    let start = Instant::now();
    estimator.start_update_at(start).unwrap();
    estimator.update(500).unwrap();
    estimator.advance_to(start + Duration::from_secs(3));
    assert!(last(&reports).percentage <= 99);

    estimator.update(500).unwrap();
    estimator.advance_to(start + Duration::from_secs(4));
    assert_eq!(last(&reports).percentage, 99);

    estimator.complete().unwrap();
    assert_eq!(
        last(&reports),
        ProgressSnapshot {
            percentage: 100,
            eta: Some(0),
            speed: Some(0.0),
        }
    );
    assert_eq!(estimator.state(), EstimatorState::Completed);
}

#[test]
fn complete_from_idle_still_reports_done() {
    let (mut estimator, reports) = estimator(EstimatorOptions::default().total_size(1000));
    estimator.complete().unwrap();
    assert_eq!(last(&reports).percentage, 100);
    assert_eq!(reports.lock().unwrap().len(), 1);
}

#[test]
fn abort_stops_ticks() {
    let (mut estimator, reports) = estimator(EstimatorOptions::default().total_size(1000));
    let start = Instant::now();
    estimator.start_update_at(start).unwrap();
    estimator.update(300).unwrap();
    estimator.advance_to(start + Duration::from_secs(3));
    let percentage = last(&reports).percentage;

    estimator.abort().unwrap();
    let count = reports.lock().unwrap().len();
    assert_eq!(
        last(&reports),
        ProgressSnapshot {
            percentage,
            eta: None,
            speed: None,
        }
    );

    estimator.advance_to(start + Duration::from_secs(60));
    assert_eq!(reports.lock().unwrap().len(), count);
    assert!(matches!(
        estimator.update(1),
        Err(Error::LifecycleViolation { state: "aborted", .. })
    ));
}

#[test]
fn reports_once_per_interval_regardless_of_updates() {
    let (mut estimator, reports) = estimator(EstimatorOptions::default().total_size(1_000_000));
    let start = Instant::now();
    estimator.start_update_at(start).unwrap();
    for _ in 0..1000 {
        estimator.update(10).unwrap();
    }
    estimator.advance_to(start + Duration::from_secs(2));
    assert_eq!(reports.lock().unwrap().len(), 2);

    let mut now = start + Duration::from_secs(2);
    for _ in 0..5 {
        for _ in 0..37 {
            estimator.update(100).unwrap();
        }
        now += TICK_INTERVAL;
        estimator.advance_to(now);
    }
    assert_eq!(reports.lock().unwrap().len(), 7);
}

#[test]
fn smoothed_speed_drives_eta() {
    let (mut estimator, reports) = estimator(
        EstimatorOptions::default()
            .total_size(100_000)
            .initial_update_delay(Duration::from_secs(1)),
    );
    let start = Instant::now();
    estimator.start_update_at(start).unwrap();
    estimator.update(1000).unwrap();
    estimator.advance_to(start + Duration::from_secs(1));
    assert_eq!(last(&reports).speed, Some(1000.0));
    assert_eq!(last(&reports).eta, Some(99));

    estimator.update(3000).unwrap();
    estimator.advance_to(start + Duration::from_secs(2));
    let average = SMOOTHING_FACTOR * 3000.0 + (1.0 - SMOOTHING_FACTOR) * 1000.0;
    let report = last(&reports);
    assert_eq!(report.speed, Some(average));
    assert_eq!(report.eta, Some((96_000.0 / average).floor() as u64));
    assert_eq!(report.percentage, 4);
}

#[test]
fn percentage_never_decreases() {
    let (mut estimator, reports) = estimator(EstimatorOptions::default().total_size(1000));
    let start = Instant::now();
    estimator.start_update_at(start).unwrap();
    estimator.update(400).unwrap();
    estimator.advance_to(start + Duration::from_secs(10));
    let percentages: Vec<u8> = reports.lock().unwrap().iter().map(|r| r.percentage).collect();
    assert!(percentages.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*percentages.last().unwrap(), 40);
}

#[test]
fn resume_offset_counts_towards_progress() {
    let (mut estimator, reports) = estimator(EstimatorOptions::default().start_size(500));
    estimator.set_total_size(2000).unwrap();
    estimator.start_update_at(Instant::now()).unwrap();
    assert_eq!(last(&reports).percentage, 25);
    assert_eq!(estimator.updated_size(), 500);
}
