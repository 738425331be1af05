use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::job_schedules;

/// The single pending next-fire-time row for an active job.
///
/// A row exists iff the job has a pending future firing: created with the
/// job, advanced by the completion handler, deleted when a non-recurring
/// job finishes or a recurring job is soft-deleted.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = job_schedules)]
pub struct JobSchedule {
    pub id: i32,
    pub job_id: i32,
    pub next_execution_time: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = job_schedules)]
pub struct NewJobSchedule {
    pub job_id: i32,
    pub next_execution_time: NaiveDateTime,
}
