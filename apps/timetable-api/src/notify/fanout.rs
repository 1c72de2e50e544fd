//! Emails the students of every group whose timetable changed.
//!
//! Recipients are processed one at a time with a pause between consecutive
//! sends inside a group, to stay under the mail relay's rate limit. A failed
//! send is recorded and skipped; only directory (database) errors abort.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;

use super::directory::GroupDirectory;
use super::mailer::Mailer;

/// Upper bound on addresses listed in `errors`. Counts stay exact.
pub const MAX_REPORTED_FAILURES: usize = 100;

/// Aggregate result of one notification batch.
#[derive(Debug, Default, Clone, PartialEq, Serialize, ToSchema)]
pub struct NotificationReport {
    pub groups_notified: usize,
    pub total_students: usize,
    pub emails_sent: usize,
    pub emails_failed: usize,
    /// Codes of groups that were resolved but have no students.
    pub groups_without_students: Vec<String>,
    /// Addresses whose send failed.
    pub errors: Vec<String>,
}

impl NotificationReport {
    fn record_failure(&mut self, address: &str) {
        self.emails_failed += 1;
        if self.errors.len() < MAX_REPORTED_FAILURES {
            self.errors.push(address.to_string());
        }
    }
}

pub struct NotificationFanout {
    directory: Arc<dyn GroupDirectory>,
    mailer: Arc<dyn Mailer>,
    send_delay: Duration,
}

impl NotificationFanout {
    pub fn new(
        directory: Arc<dyn GroupDirectory>,
        mailer: Arc<dyn Mailer>,
        send_delay: Duration,
    ) -> Self {
        Self {
            directory,
            mailer,
            send_delay,
        }
    }

    pub async fn notify(&self, group_ids: &HashSet<i32>) -> Result<NotificationReport, ApiError> {
        let mut report = NotificationReport::default();

        for &group_id in group_ids {
            let Some(group_code) = self.directory.resolve_group_code(group_id).await? else {
                tracing::debug!(group_id, "skipping unknown group");
                continue;
            };

            let students = self.directory.list_students(group_id).await?;
            if students.is_empty() {
                report.groups_without_students.push(group_code);
                continue;
            }

            report.total_students += students.len();
            let (sent, failed) = self.notify_group(&group_code, &students, &mut report).await;
            report.groups_notified += 1;

            tracing::info!(%group_code, sent, failed, total = students.len(), "group notified");
        }

        if report.emails_failed > 0 {
            tracing::warn!(
                failed = report.emails_failed,
                first = ?report.errors.iter().take(5).collect::<Vec<_>>(),
                "some schedule notices could not be sent"
            );
        }

        Ok(report)
    }

    async fn notify_group(
        &self,
        group_code: &str,
        students: &[String],
        report: &mut NotificationReport,
    ) -> (usize, usize) {
        let (mut sent, mut failed) = (0, 0);

        for (i, address) in students.iter().enumerate() {
            if i > 0 && !self.send_delay.is_zero() {
                tokio::time::sleep(self.send_delay).await;
            }

            match self.mailer.send_schedule_notice(address, group_code).await {
                Ok(()) => {
                    report.emails_sent += 1;
                    sent += 1;
                }
                Err(e) => {
                    tracing::debug!(%address, %group_code, error = %e, "schedule notice failed");
                    report.record_failure(address);
                    failed += 1;
                }
            }
        }

        (sent, failed)
    }
}
