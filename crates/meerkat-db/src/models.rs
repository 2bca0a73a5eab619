/// Database row types — these map directly to SQLite rows.
/// Distinct from the meerkat-types API models to keep the DB layer
/// independent of the HTTP surface.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub status: String,
    pub confirmation_code: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct BoardRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: String,
}

pub struct PostRow {
    pub id: String,
    pub board_id: String,
    pub author_id: String,
    pub author_username: String,
    pub title: String,
    pub content: String,
    pub edited: bool,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ReplyRow {
    pub id: String,
    pub post_id: String,
    pub author_id: String,
    pub author_username: String,
    pub content: String,
    pub edited: bool,
    pub created_at: String,
    pub updated_at: String,
}
