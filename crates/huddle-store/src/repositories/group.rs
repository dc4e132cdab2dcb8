//! Group repository: `study_groups` plus the `group_members` relation.
//!
//! The creator is always inserted as the first member, in the same
//! transaction as the group row.

use huddle_core::{Group, GroupId, StoreError, UserId, format_timestamp};
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::{Result, is_constraint};
use crate::repositories::parse_timestamp;

/// Options for creating a group.
pub struct CreateGroupOptions<'a> {
    /// Display name.
    pub name: &'a str,
    /// Free-text description.
    pub description: &'a str,
    /// Creating user; becomes the first member.
    pub creator_id: UserId,
}

/// Group repository.
pub struct GroupRepo;

impl GroupRepo {
    /// Create a group and add its creator as a member.
    pub fn create(conn: &Connection, opts: &CreateGroupOptions<'_>) -> Result<Group> {
        let now = chrono::Utc::now();
        let stamp = format_timestamp(now);
        let tx = conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT INTO study_groups (name, description, creator_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![opts.name, opts.description, opts.creator_id.get(), stamp],
        );
        match inserted {
            Ok(_) => {}
            Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                return Err(StoreError::UserNotFound(opts.creator_id).into());
            }
            Err(e) => return Err(e.into()),
        }
        let id = GroupId(tx.last_insert_rowid());
        let _ = tx.execute(
            "INSERT INTO group_members (group_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
            params![id.get(), opts.creator_id.get(), stamp],
        )?;
        tx.commit()?;

        Ok(Group {
            id,
            name: opts.name.to_string(),
            description: opts.description.to_string(),
            creator_id: opts.creator_id,
            member_ids: vec![opts.creator_id],
            created_at: parse_timestamp(&stamp)?,
        })
    }

    /// Get a group with its member ids.
    pub fn get(conn: &Connection, group_id: GroupId) -> Result<Option<Group>> {
        let row = conn
            .query_row(
                "SELECT id, name, description, creator_id, created_at
                 FROM study_groups WHERE id = ?1",
                params![group_id.get()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;
        let Some((id, name, description, creator_id, created_at)) = row else {
            return Ok(None);
        };
        Ok(Some(Group {
            id: GroupId(id),
            name,
            description,
            creator_id: UserId(creator_id),
            member_ids: Self::member_ids(conn, GroupId(id))?,
            created_at: parse_timestamp(&created_at)?,
        }))
    }

    /// All groups, newest first.
    pub fn list(conn: &Connection) -> Result<Vec<Group>> {
        let mut stmt =
            conn.prepare("SELECT id FROM study_groups ORDER BY created_at DESC, id DESC")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let mut groups = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(group) = Self::get(conn, GroupId(id))? {
                groups.push(group);
            }
        }
        Ok(groups)
    }

    /// Check if a group exists.
    pub fn exists(conn: &Connection, group_id: GroupId) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM study_groups WHERE id = ?1)",
            params![group_id.get()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Member ids, ascending.
    pub fn member_ids(conn: &Connection, group_id: GroupId) -> Result<Vec<UserId>> {
        let mut stmt = conn
            .prepare("SELECT user_id FROM group_members WHERE group_id = ?1 ORDER BY user_id")?;
        let ids = stmt
            .query_map(params![group_id.get()], |row| row.get::<_, i64>(0).map(UserId))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Add a member. Fails if the group is missing or the user already belongs.
    pub fn join(conn: &Connection, group_id: GroupId, user_id: UserId) -> Result<()> {
        if !Self::exists(conn, group_id)? {
            return Err(StoreError::GroupNotFound(group_id).into());
        }
        let now = format_timestamp(chrono::Utc::now());
        let inserted = conn.execute(
            "INSERT INTO group_members (group_id, user_id, joined_at) VALUES (?1, ?2, ?3)",
            params![group_id.get(), user_id.get(), now],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => {
                Err(StoreError::Conflict("already a member".into()).into())
            }
            Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                Err(StoreError::UserNotFound(user_id).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a member. Fails if the group is missing or the user is not a member.
    pub fn leave(conn: &Connection, group_id: GroupId, user_id: UserId) -> Result<()> {
        if !Self::exists(conn, group_id)? {
            return Err(StoreError::GroupNotFound(group_id).into());
        }
        let changed = conn.execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
            params![group_id.get(), user_id.get()],
        )?;
        if changed == 0 {
            return Err(StoreError::Conflict("not a member".into()).into());
        }
        Ok(())
    }

    /// Delete a group and, by cascade, its members and messages.
    pub fn delete(conn: &Connection, group_id: GroupId) -> Result<bool> {
        let changed = conn.execute(
            "DELETE FROM study_groups WHERE id = ?1",
            params![group_id.get()],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DbError;
    use crate::repositories::UserRepo;
    use crate::repositories::testutil::setup;
    use assert_matches::assert_matches;

    fn group(conn: &Connection, creator: UserId, name: &str) -> Group {
        GroupRepo::create(
            conn,
            &CreateGroupOptions {
                name,
                description: "",
                creator_id: creator,
            },
        )
        .unwrap()
    }

    #[test]
    fn creator_is_first_member() {
        let conn = setup();
        let a = UserRepo::create(&conn, "A").unwrap();
        let g = GroupRepo::create(
            &conn,
            &CreateGroupOptions {
                name: "Rust study",
                description: "weekly",
                creator_id: a.id,
            },
        )
        .unwrap();
        assert_eq!(g.member_ids, vec![a.id]);
        let fetched = GroupRepo::get(&conn, g.id).unwrap().unwrap();
        assert_eq!(fetched, g);
    }

    #[test]
    fn create_with_unknown_creator_fails() {
        let conn = setup();
        assert_matches!(
            GroupRepo::create(
                &conn,
                &CreateGroupOptions {
                    name: "x",
                    description: "",
                    creator_id: UserId(77),
                },
            ),
            Err(DbError::Domain(StoreError::UserNotFound(UserId(77))))
        );
    }

    #[test]
    fn join_and_leave() {
        let conn = setup();
        let a = UserRepo::create(&conn, "A").unwrap();
        let b = UserRepo::create(&conn, "B").unwrap();
        let g = group(&conn, a.id, "g");

        GroupRepo::join(&conn, g.id, b.id).unwrap();
        assert_eq!(GroupRepo::member_ids(&conn, g.id).unwrap(), vec![a.id, b.id]);
        assert_matches!(
            GroupRepo::join(&conn, g.id, b.id),
            Err(DbError::Domain(StoreError::Conflict(_)))
        );

        GroupRepo::leave(&conn, g.id, b.id).unwrap();
        assert_eq!(GroupRepo::member_ids(&conn, g.id).unwrap(), vec![a.id]);
        assert_matches!(
            GroupRepo::leave(&conn, g.id, b.id),
            Err(DbError::Domain(StoreError::Conflict(_)))
        );
    }

    #[test]
    fn join_missing_group() {
        let conn = setup();
        let a = UserRepo::create(&conn, "A").unwrap();
        assert_matches!(
            GroupRepo::join(&conn, GroupId(5), a.id),
            Err(DbError::Domain(StoreError::GroupNotFound(GroupId(5))))
        );
    }

    #[test]
    fn list_newest_first() {
        let conn = setup();
        let a = UserRepo::create(&conn, "A").unwrap();
        let first = group(&conn, a.id, "first");
        let second = group(&conn, a.id, "second");
        let ids: Vec<GroupId> = GroupRepo::list(&conn).unwrap().iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn delete_group() {
        let conn = setup();
        let a = UserRepo::create(&conn, "A").unwrap();
        let g = group(&conn, a.id, "g");
        assert!(GroupRepo::exists(&conn, g.id).unwrap());
        assert!(GroupRepo::delete(&conn, g.id).unwrap());
        assert!(!GroupRepo::exists(&conn, g.id).unwrap());
        assert!(GroupRepo::member_ids(&conn, g.id).unwrap().is_empty());
    }
}
