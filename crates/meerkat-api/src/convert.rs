//! Row-to-response conversion helpers. SQLite hands everything back as
//! text; a corrupt column is logged and replaced with a neutral default
//! rather than failing the whole request.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use meerkat_db::models::{BoardRow, PostRow, ReplyRow, UserRow};
use meerkat_types::api::{BoardResponse, PostResponse, ReplyResponse, UserResponse};
use meerkat_types::models::{AccountStatus, Role};

pub(crate) fn parse_uuid(field: &'static str, value: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {field} '{value}': {e}");
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(field: &'static str, value: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without a
            // timezone. Parse as naive UTC and convert.
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt {field} '{value}': {e}");
            DateTime::default()
        })
}

pub(crate) fn parse_role(value: &str) -> Role {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt role column: {e}");
        Role::User
    })
}

pub(crate) fn parse_status(value: &str) -> AccountStatus {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt status column: {e}");
        AccountStatus::Pending
    })
}

pub(crate) fn user_response(row: UserRow) -> UserResponse {
    UserResponse {
        id: parse_uuid("user id", &row.id),
        username: row.username,
        email: row.email,
        role: parse_role(&row.role),
        status: parse_status(&row.status),
        created_at: parse_timestamp("created_at", &row.created_at),
        updated_at: parse_timestamp("updated_at", &row.updated_at),
    }
}

pub(crate) fn board_response(row: BoardRow) -> BoardResponse {
    BoardResponse {
        id: parse_uuid("board id", &row.id),
        name: row.name,
        description: row.description,
        created_at: parse_timestamp("created_at", &row.created_at),
    }
}

pub(crate) fn post_response(row: PostRow) -> PostResponse {
    PostResponse {
        id: parse_uuid("post id", &row.id),
        board_id: parse_uuid("board_id", &row.board_id),
        author_id: parse_uuid("author_id", &row.author_id),
        author_username: row.author_username,
        title: row.title,
        content: row.content,
        edited: row.edited,
        created_at: parse_timestamp("created_at", &row.created_at),
        updated_at: parse_timestamp("updated_at", &row.updated_at),
    }
}

pub(crate) fn reply_response(row: ReplyRow) -> ReplyResponse {
    ReplyResponse {
        id: parse_uuid("reply id", &row.id),
        post_id: parse_uuid("post_id", &row.post_id),
        author_id: parse_uuid("author_id", &row.author_id),
        author_username: row.author_username,
        content: row.content,
        edited: row.edited,
        created_at: parse_timestamp("created_at", &row.created_at),
        updated_at: parse_timestamp("updated_at", &row.updated_at),
    }
}
