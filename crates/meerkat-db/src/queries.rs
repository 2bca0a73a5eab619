use crate::Database;
use crate::models::{BoardRow, PostRow, ReplyRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

const USER_COLUMNS: &str =
    "id, username, email, password, role, status, confirmation_code, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        role: &str,
        confirmation_code: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, role, confirmation_code)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, username, email, password_hash, role, confirmation_code],
            )?;
            Ok(())
        })
    }

    pub fn username_exists(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                [username],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn email_exists(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                [email],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "username = ?1", username)
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    pub fn get_user_by_confirmation_code(&self, code: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "confirmation_code = ?1", code))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Partial update of a user's own fields. `None` leaves a column as-is.
    /// Returns the number of rows touched (0 when the user is gone).
    pub fn update_user(
        &self,
        id: &str,
        username: Option<&str>,
        email: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET
                    username   = COALESCE(?2, username),
                    email      = COALESCE(?3, email),
                    password   = COALESCE(?4, password),
                    updated_at = datetime('now')
                 WHERE id = ?1",
                params![id, username, email, password_hash],
            )?;
            Ok(changed)
        })
    }

    pub fn delete_user(&self, id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(changed)
        })
    }

    /// Pending → Active transition, keyed on the confirmation code.
    ///
    /// The status guard in the WHERE clause makes the write conditional:
    /// two concurrent confirms with the same code cannot both succeed, and
    /// a code belonging to an already-active account matches nothing.
    pub fn activate_user(&self, code: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET status = 'active', updated_at = datetime('now')
                 WHERE confirmation_code = ?1 AND status = 'pending'",
                [code],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Boards --

    pub fn create_board(&self, id: &str, name: &str, description: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO boards (id, name, description) VALUES (?1, ?2, ?3)",
                params![id, name, description],
            )?;
            Ok(())
        })
    }

    pub fn board_name_exists(&self, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let exists = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM boards WHERE name = ?1)",
                [name],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    pub fn list_boards(&self) -> Result<Vec<BoardRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, description, created_at FROM boards ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([], map_board)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_board(&self, id: &str) -> Result<Option<BoardRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, description, created_at FROM boards WHERE id = ?1",
                    [id],
                    map_board,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn update_board(
        &self,
        id: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE boards SET
                    name        = COALESCE(?2, name),
                    description = COALESCE(?3, description)
                 WHERE id = ?1",
                params![id, name, description],
            )?;
            Ok(changed)
        })
    }

    pub fn delete_board(&self, id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM boards WHERE id = ?1", [id])?;
            Ok(changed)
        })
    }

    // -- Posts --

    pub fn insert_post(
        &self,
        id: &str,
        board_id: &str,
        author_id: &str,
        title: &str,
        content: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, board_id, author_id, title, content)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, board_id, author_id, title, content],
            )?;
            Ok(())
        })
    }

    pub fn get_posts_by_board(&self, board_id: &str) -> Result<Vec<PostRow>> {
        self.with_conn(|conn| {
            // JOIN users to fetch author_username in a single query
            let mut stmt = conn.prepare(
                "SELECT p.id, p.board_id, p.author_id, u.username, p.title, p.content,
                        p.edited, p.created_at, p.updated_at
                 FROM posts p
                 LEFT JOIN users u ON p.author_id = u.id
                 WHERE p.board_id = ?1
                 ORDER BY p.created_at",
            )?;
            let rows = stmt
                .query_map([board_id], map_post)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT p.id, p.board_id, p.author_id, u.username, p.title, p.content,
                            p.edited, p.created_at, p.updated_at
                     FROM posts p
                     LEFT JOIN users u ON p.author_id = u.id
                     WHERE p.id = ?1",
                    [id],
                    map_post,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Edit a post's title/content. Marks the post edited and bumps
    /// `updated_at`; the author column is never touched.
    pub fn update_post(
        &self,
        id: &str,
        title: Option<&str>,
        content: Option<&str>,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET
                    title      = COALESCE(?2, title),
                    content    = COALESCE(?3, content),
                    edited     = 1,
                    updated_at = datetime('now')
                 WHERE id = ?1",
                params![id, title, content],
            )?;
            Ok(changed)
        })
    }

    pub fn delete_post(&self, id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(changed)
        })
    }

    // -- Replies --

    pub fn insert_reply(
        &self,
        id: &str,
        post_id: &str,
        author_id: &str,
        content: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO replies (id, post_id, author_id, content)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, post_id, author_id, content],
            )?;
            Ok(())
        })
    }

    pub fn get_replies_by_post(&self, post_id: &str) -> Result<Vec<ReplyRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.post_id, r.author_id, u.username, r.content,
                        r.edited, r.created_at, r.updated_at
                 FROM replies r
                 LEFT JOIN users u ON r.author_id = u.id
                 WHERE r.post_id = ?1
                 ORDER BY r.created_at",
            )?;
            let rows = stmt
                .query_map([post_id], map_reply)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_reply(&self, id: &str) -> Result<Option<ReplyRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT r.id, r.post_id, r.author_id, u.username, r.content,
                            r.edited, r.created_at, r.updated_at
                     FROM replies r
                     LEFT JOIN users u ON r.author_id = u.id
                     WHERE r.id = ?1",
                    [id],
                    map_reply,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn update_reply(&self, id: &str, content: Option<&str>) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE replies SET
                    content    = COALESCE(?2, content),
                    edited     = 1,
                    updated_at = datetime('now')
                 WHERE id = ?1",
                params![id, content],
            )?;
            Ok(changed)
        })
    }

    pub fn delete_reply(&self, id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM replies WHERE id = ?1", [id])?;
            Ok(changed)
        })
    }
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}");
    let row = conn.query_row(&sql, [value], map_user).optional()?;
    Ok(row)
}

fn map_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        role: row.get(4)?,
        status: row.get(5)?,
        confirmation_code: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn map_board(row: &rusqlite::Row<'_>) -> rusqlite::Result<BoardRow> {
    Ok(BoardRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn map_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        board_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "unknown".to_string()),
        title: row.get(4)?,
        content: row.get(5)?,
        edited: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn map_reply(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReplyRow> {
    Ok(ReplyRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        author_id: row.get(2)?,
        author_username: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "unknown".to_string()),
        content: row.get(4)?,
        edited: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_db() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn seed_user(db: &Database, id: &str, username: &str, code: &str) {
        db.create_user(
            id,
            username,
            &format!("{username}@example.com"),
            "$argon2id$fake-hash",
            "user",
            code,
        )
        .unwrap();
    }

    #[test]
    fn new_account_starts_pending() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "alice", "code-alice");

        let user = db.get_user_by_username("alice").unwrap().unwrap();
        assert_eq!(user.status, "pending");
        assert_eq!(user.role, "user");
        assert_eq!(user.confirmation_code, "code-alice");
    }

    #[test]
    fn confirmation_code_is_single_use() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "alice", "code-alice");

        assert!(db.activate_user("code-alice").unwrap());
        let user = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(user.status, "active");

        // The code only matches a pending account, so the second attempt
        // finds nothing and the account never leaves active.
        assert!(!db.activate_user("code-alice").unwrap());
        let user = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(user.status, "active");
    }

    #[test]
    fn unknown_confirmation_code_matches_nothing() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "alice", "code-alice");

        assert!(!db.activate_user("no-such-code").unwrap());
        let user = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(user.status, "pending");
    }

    #[test]
    fn duplicate_username_rejected_by_constraint() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "alice", "code-1");

        let dup = db.create_user("u2", "alice", "other@example.com", "hash", "user", "code-2");
        assert!(dup.is_err());
        assert!(db.username_exists("alice").unwrap());
        assert!(!db.username_exists("bob").unwrap());
    }

    #[test]
    fn duplicate_email_rejected_by_constraint() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "alice", "code-1");

        let dup = db.create_user("u2", "bob", "alice@example.com", "hash", "user", "code-2");
        assert!(dup.is_err());
        assert!(db.email_exists("alice@example.com").unwrap());
    }

    #[test]
    fn editing_a_post_sets_the_edited_flag() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "alice", "code-1");
        db.create_board("b1", "general", "anything goes").unwrap();
        db.insert_post("p1", "b1", "u1", "hello", "first post").unwrap();

        let post = db.get_post("p1").unwrap().unwrap();
        assert!(!post.edited);
        assert_eq!(post.author_username, "alice");

        // Partial edit: only the title changes, content survives COALESCE.
        assert_eq!(db.update_post("p1", Some("hello again"), None).unwrap(), 1);
        let post = db.get_post("p1").unwrap().unwrap();
        assert!(post.edited);
        assert_eq!(post.title, "hello again");
        assert_eq!(post.content, "first post");
    }

    #[test]
    fn deleting_a_board_cascades_to_posts_and_replies() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "alice", "code-1");
        db.create_board("b1", "general", "anything goes").unwrap();
        db.insert_post("p1", "b1", "u1", "hello", "first post").unwrap();
        db.insert_reply("r1", "p1", "u1", "nice post").unwrap();

        assert_eq!(db.delete_board("b1").unwrap(), 1);
        assert!(db.get_post("p1").unwrap().is_none());
        assert!(db.get_reply("r1").unwrap().is_none());
    }

    #[test]
    fn deleting_a_user_cascades_to_owned_content() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "alice", "code-1");
        db.create_board("b1", "general", "anything goes").unwrap();
        db.insert_post("p1", "b1", "u1", "hello", "first post").unwrap();
        db.insert_reply("r1", "p1", "u1", "nice post").unwrap();

        assert_eq!(db.delete_user("u1").unwrap(), 1);
        assert!(db.get_post("p1").unwrap().is_none());
        assert!(db.get_reply("r1").unwrap().is_none());
        assert!(db.get_user_by_id("u1").unwrap().is_none());
    }

    #[test]
    fn partial_user_update_leaves_other_columns() {
        let (_dir, db) = test_db();
        seed_user(&db, "u1", "alice", "code-1");

        assert_eq!(
            db.update_user("u1", None, Some("new@example.com"), None).unwrap(),
            1
        );
        let user = db.get_user_by_id("u1").unwrap().unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "new@example.com");

        assert_eq!(db.update_user("missing", Some("x"), None, None).unwrap(), 0);
    }
}
