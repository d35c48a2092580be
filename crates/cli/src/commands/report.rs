//! `hourbot report`: the roster joined with the latest stored hours.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hourbot_core::domain::hours::HoursRecord;
use hourbot_core::domain::user::{RegisteredUser, UserId};
use hourbot_db::repositories::{HoursRepository, RosterRepository};
use hourbot_db::{migrations, SqlHoursRepository, SqlRosterRepository};
use serde::Serialize;

use crate::commands::{
    connect, current_thread_runtime, load_config, serialize_json, CommandFailure, CommandResult,
};

#[derive(Debug, Serialize)]
struct HoursReport {
    command: &'static str,
    status: &'static str,
    users: Vec<UserHours>,
}

#[derive(Debug, PartialEq, Serialize)]
struct UserHours {
    user_id: UserId,
    registered_at: DateTime<Utc>,
    /// `None` until the user answers a prompt.
    hours: Option<String>,
    revision: Option<i64>,
    updated_at: Option<DateTime<Utc>>,
}

pub fn run() -> CommandResult {
    let config = match load_config("report") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match current_thread_runtime("report") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config).await?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let roster = SqlRosterRepository::new(pool.clone());
        let hours = SqlHoursRepository::new(pool.clone());
        let users = roster.list_all().await.map_err(store_failure)?;
        let records = hours.list_all().await.map_err(store_failure)?;
        pool.close().await;

        Ok::<_, CommandFailure>(join_roster(users, records))
    });

    match result {
        Ok(users) => {
            serialize_json("report", &HoursReport { command: "report", status: "ok", users })
        }
        Err(failure) => CommandResult::from_failure("report", failure),
    }
}

fn store_failure(error: hourbot_db::RepositoryError) -> CommandFailure {
    ("store", error.to_string(), 6)
}

fn join_roster(users: Vec<RegisteredUser>, records: Vec<HoursRecord>) -> Vec<UserHours> {
    let mut by_user: HashMap<_, _> =
        records.into_iter().map(|record| (record.user_key, record)).collect();

    users
        .into_iter()
        .map(|user| {
            let record = by_user.remove(&user.key);
            UserHours {
                user_id: user.user_id,
                registered_at: user.registered_at,
                hours: record.as_ref().map(|record| record.hours.to_string()),
                revision: record.as_ref().map(|record| record.revision),
                updated_at: record.map(|record| record.updated_at),
            }
        })
        .collect()
}
