//! Periodic background jobs

mod upcoming;

pub use upcoming::{tomorrow, UpcomingPayment, UpcomingPaymentScanner};

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Start the cron scheduler running the upcoming-payment scan.
///
/// The returned scheduler must be kept alive; call `shutdown` on it to stop
/// the job.
pub async fn start_scheduler(
    scanner: UpcomingPaymentScanner,
    cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let sched = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let scanner = scanner.clone();
        Box::pin(async move {
            scanner.run_once().await;
        })
    })?;
    sched.add(job).await?;
    sched.start().await?;

    tracing::info!(cron = %cron, "Upcoming payment scan scheduled");
    Ok(sched)
}
