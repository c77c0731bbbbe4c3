// In-memory job scheduler store

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ControllerError;
use crate::models::{JobHistoryRecord, JobRecord};
use crate::services::controllers::{ControllerResult, JobRunner, JobsController, NewJob};
use crate::sql::JsonMap;

/// Period of an `every ...` schedule
///
/// Accepts `every [N] <unit>` where unit is minute, hour, day, week or month
/// (singular or plural); a month counts as 30 days.
pub fn parse_schedule(schedule: &str) -> ControllerResult<Duration> {
    let invalid = || ControllerError::Invalid(format!("Wrong repeat interval: {}", schedule));

    let lowered = schedule.trim().to_lowercase();
    let mut words = lowered.split_whitespace();
    if words.next() != Some("every") {
        return Err(invalid());
    }

    let (count, unit) = match (words.next(), words.next(), words.next()) {
        (Some(unit), None, None) => (1, unit),
        (Some(count), Some(unit), None) => (count.parse::<i64>().map_err(|_| invalid())?, unit),
        _ => return Err(invalid()),
    };
    if count <= 0 {
        return Err(invalid());
    }

    let unit = unit.strip_suffix('s').unwrap_or(unit);
    let period = match unit {
        "minute" => Duration::minutes(count),
        "hour" => Duration::hours(count),
        "day" => Duration::days(count),
        "week" => Duration::weeks(count),
        "month" => Duration::days(30 * count),
        _ => return Err(invalid()),
    };
    Ok(period)
}

#[derive(Default)]
pub struct InMemoryJobsController {
    jobs: RwLock<Vec<JobRecord>>,
    history: RwLock<Vec<JobHistoryRecord>>,
}

fn same_job(job: &JobRecord, project: &str, name: &str) -> bool {
    job.project.eq_ignore_ascii_case(project) && job.name.eq_ignore_ascii_case(name)
}

/// Next run after `job` ran at its scheduled time, or `None` when it is done
fn reschedule(job: &JobRecord) -> ControllerResult<Option<DateTime<Utc>>> {
    let (Some(schedule), Some(last)) = (&job.schedule_str, job.next_run_at) else {
        return Ok(None);
    };
    let next = last + parse_schedule(schedule)?;
    Ok(match job.end_at {
        Some(end) if next > end => None,
        _ => Some(next),
    })
}

#[async_trait]
impl JobsController for InMemoryJobsController {
    async fn list(&self, project: Option<&str>) -> ControllerResult<Vec<JobRecord>> {
        Ok(self
            .jobs
            .read()
            .await
            .iter()
            .filter(|j| project.map_or(true, |p| j.project.eq_ignore_ascii_case(p)))
            .cloned()
            .collect())
    }

    async fn get(&self, project: &str, name: &str) -> ControllerResult<Option<JobRecord>> {
        Ok(self.jobs.read().await.iter().find(|j| same_job(j, project, name)).cloned())
    }

    async fn add(&self, job: NewJob) -> ControllerResult<JobRecord> {
        if let Some(schedule) = &job.schedule_str {
            parse_schedule(schedule)?;
        }

        let mut jobs = self.jobs.write().await;
        if jobs.iter().any(|j| same_job(j, &job.project, &job.name)) {
            return Err(ControllerError::AlreadyExists(format!("Job already exists: {}", job.name)));
        }

        let now = Utc::now();
        let start_at = job.start_at.unwrap_or(now);
        if let Some(end_at) = job.end_at {
            if end_at <= start_at {
                return Err(ControllerError::Invalid("Wrong end date: it is before start date".to_string()));
            }
        }

        let record = JobRecord {
            id: Uuid::new_v4().to_string(),
            project: job.project,
            name: job.name,
            query: job.query,
            start_at,
            end_at: job.end_at,
            next_run_at: Some(start_at),
            schedule_str: job.schedule_str,
            active: true,
            variables: JsonMap::new(),
            created_at: now,
        };
        jobs.push(record.clone());
        info!(project = %record.project, job = %record.name, "Job created");
        Ok(record)
    }

    async fn delete(&self, project: &str, name: &str) -> ControllerResult<()> {
        let mut jobs = self.jobs.write().await;
        let pos = jobs
            .iter()
            .position(|j| same_job(j, project, name))
            .ok_or_else(|| ControllerError::NotFound(format!("Job does not exists: {}", name)))?;
        jobs.remove(pos);
        Ok(())
    }

    async fn history(&self, project: Option<&str>) -> ControllerResult<Vec<JobHistoryRecord>> {
        Ok(self
            .history
            .read()
            .await
            .iter()
            .filter(|h| project.map_or(true, |p| h.project.eq_ignore_ascii_case(p)))
            .cloned()
            .collect())
    }

    async fn run_pending(&self, now: DateTime<Utc>, runner: &dyn JobRunner) -> ControllerResult<usize> {
        let due: Vec<JobRecord> = self
            .jobs
            .read()
            .await
            .iter()
            .filter(|j| j.active && j.next_run_at.is_some_and(|at| at <= now))
            .cloned()
            .collect();

        for job in &due {
            let run_start = Utc::now();
            let error = runner.run_job(job).await.err();
            if let Some(error) = &error {
                warn!(project = %job.project, job = %job.name, error = %error, "Job run failed");
            } else {
                debug!(project = %job.project, job = %job.name, "Job run finished");
            }

            self.history.write().await.push(JobHistoryRecord {
                name: job.name.clone(),
                project: job.project.clone(),
                run_start,
                run_end: Some(Utc::now()),
                error,
                query: job.query.clone(),
            });

            let next = reschedule(job)?;
            let mut jobs = self.jobs.write().await;
            if let Some(stored) = jobs.iter_mut().find(|j| j.id == job.id) {
                stored.next_run_at = next;
                stored.active = next.is_some();
            }
        }
        Ok(due.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        ran: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl JobRunner for RecordingRunner {
        async fn run_job(&self, job: &JobRecord) -> Result<(), String> {
            self.ran.lock().unwrap().push(job.name.clone());
            if job.query.contains("fail") {
                return Err("boom".to_string());
            }
            Ok(())
        }
    }

    fn new_job(name: &str, schedule: Option<&str>) -> NewJob {
        NewJob {
            project: "proj".to_string(),
            name: name.to_string(),
            query: "select 1".to_string(),
            start_at: None,
            end_at: None,
            schedule_str: schedule.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_schedule() {
        assert_eq!(parse_schedule("every hour").unwrap(), Duration::hours(1));
        assert_eq!(parse_schedule("EVERY 2 days").unwrap(), Duration::days(2));
        assert_eq!(parse_schedule("every 1 month").unwrap(), Duration::days(30));
        let err = parse_schedule("every blue moon").unwrap_err();
        assert_eq!(err.to_string(), "Wrong repeat interval: every blue moon");
        assert!(parse_schedule("hourly").is_err());
    }

    #[tokio::test]
    async fn test_one_off_and_repeating_jobs() {
        let jobs = InMemoryJobsController::default();
        jobs.add(new_job("once", None)).await.unwrap();
        let hourly = jobs.add(new_job("hourly", Some("every hour"))).await.unwrap();
        let runner = RecordingRunner::default();

        let ran = jobs.run_pending(Utc::now(), &runner).await.unwrap();
        assert_eq!(ran, 2);

        let once = jobs.get("proj", "once").await.unwrap().unwrap();
        assert!(!once.active);
        assert!(once.next_run_at.is_none());

        let after = jobs.get("proj", "hourly").await.unwrap().unwrap();
        assert!(after.active);
        assert_eq!(after.next_run_at, Some(hourly.start_at + Duration::hours(1)));

        assert_eq!(jobs.run_pending(Utc::now(), &runner).await.unwrap(), 0);
        assert_eq!(jobs.history(Some("proj")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_run_is_recorded() {
        let jobs = InMemoryJobsController::default();
        let mut job = new_job("bad", None);
        job.query = "select fail".to_string();
        jobs.add(job).await.unwrap();
        jobs.run_pending(Utc::now(), &RecordingRunner::default()).await.unwrap();

        let history = jobs.history(None).await.unwrap();
        assert_eq!(history[0].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_duplicate_and_missing_jobs() {
        let jobs = InMemoryJobsController::default();
        jobs.add(new_job("j", None)).await.unwrap();
        let err = jobs.add(new_job("J", None)).await.unwrap_err();
        assert_eq!(err.to_string(), "Job already exists: J");
        let err = jobs.delete("proj", "nope").await.unwrap_err();
        assert_eq!(err.to_string(), "Job does not exists: nope");
        assert!(jobs.add(new_job("x", Some("sometimes"))).await.is_err());
    }
}
