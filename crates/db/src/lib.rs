//! SQLite persistence for the hours roster: connection pool, embedded
//! migrations and the roster/hours repositories.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use repositories::{
    HoursRepository, InMemoryHoursRepository, InMemoryRosterRepository, RepositoryError,
    RosterRepository, SqlHoursRepository, SqlRosterRepository,
};
