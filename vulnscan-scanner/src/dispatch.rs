use crate::detect::{Detector, run_form};
use crate::error::{Result, ScanError};
use crate::finding::Finding;
use crate::form::Form;
use crate::progress::Sinks;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 50;

/// Cooperative stop flag shared between a scan and whoever may cancel it.
///
/// Setting it never interrupts a request already in flight. Forms that have
/// not started yet are skipped and the session leaves at its next phase
/// boundary.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn validate_workers(workers: usize) -> Result<()> {
    if (MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
        Ok(())
    } else {
        Err(ScanError::InvalidWorkerCount(workers))
    }
}

/// Run `detector` over every form with at most `workers` forms in flight.
///
/// Each form is handled end to end by one task. A task that panics counts as
/// zero findings for its form. Results come back in no particular order and
/// are not deduplicated here.
pub async fn run_concurrent(
    detector: Arc<dyn Detector>,
    forms: Vec<Form>,
    workers: usize,
    sinks: Sinks,
    stop: StopHandle,
) -> Result<Vec<Finding>> {
    validate_workers(workers)?;

    info!(
        "Running {} detector on {} forms with {} workers",
        detector.name(),
        forms.len(),
        workers
    );

    let semaphore = Arc::new(Semaphore::new(workers));
    let mut handles = Vec::with_capacity(forms.len());

    for form in forms {
        let detector = detector.clone();
        let semaphore = semaphore.clone();
        let sinks = sinks.clone();
        let stop = stop.clone();

        let handle = tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return Vec::new();
            };
            if stop.is_stopped() {
                debug!("Stop requested, skipping form at {}", form.action);
                return Vec::new();
            }
            run_form(detector.as_ref(), &form, &sinks).await
        });

        handles.push(handle);
    }

    let mut findings = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(mut local) => findings.append(&mut local),
            Err(e) if e.is_panic() => warn!("Detector worker panicked: {}", e),
            Err(e) => warn!("Detector worker failed: {}", e),
        }
    }

    Ok(findings)
}
