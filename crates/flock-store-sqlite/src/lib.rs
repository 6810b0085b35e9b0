//! SQLite backend for the flock store.

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;

use flock_storage::{
    Action, ActionDetail, ActionId, ActionKind, ActionPayload, CreateActionParams,
    CreateFlockParams, CreatePostParams, CreateUserParams, DetailVoteRow, Flock, FlockId,
    MemberVoteRow, OutstandingInvite, Post, PostId, Store, StoreError, UpdateProfileParams, User,
    UserId, VoteTally, VoteUpsert,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }
}

fn unique_err(e: sqlx::Error) -> StoreError {
    let s = e.to_string();
    if s.contains("UNIQUE") {
        StoreError::AlreadyExists
    } else {
        StoreError::Backend(s)
    }
}

fn parse_id(s: &str) -> Result<Uuid, StoreError> {
    Uuid::try_parse(s).map_err(|e| StoreError::Backend(e.to_string()))
}

fn ts(secs: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::Backend(format!("bad timestamp {secs}")))
}

fn decode_pictures(raw: &str) -> Result<Vec<String>, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Backend(e.to_string()))
}

fn encode_pictures(pictures: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(pictures).map_err(|e| StoreError::Backend(e.to_string()))
}

type UserRow = (String, String, String, Vec<u8>, Option<String>, Option<String>, i64);

fn user_from_row(row: UserRow) -> Result<User, StoreError> {
    let (id, username, email, public_key, picture, bio, joined_at) = row;
    Ok(User {
        id: UserId(parse_id(&id)?),
        username,
        email,
        public_key,
        picture,
        bio,
        joined_at: ts(joined_at)?,
    })
}

type FlockRow = (String, String, String, Option<String>, i64);

fn flock_from_row(row: FlockRow) -> Result<Flock, StoreError> {
    let (id, name, description, picture, created_at) = row;
    Ok(Flock {
        id: FlockId(parse_id(&id)?),
        name,
        description,
        picture,
        created_at: ts(created_at)?,
    })
}

type PostRow = (String, String, String, Option<String>, String, i64);

fn post_from_row(row: PostRow) -> Result<Post, StoreError> {
    let (id, public_id, flock_id, description, pictures, created_at) = row;
    Ok(Post {
        id: PostId(parse_id(&id)?),
        public_id,
        flock_id: FlockId(parse_id(&flock_id)?),
        description,
        pictures: decode_pictures(&pictures)?,
        created_at: ts(created_at)?,
    })
}

impl SqliteStore {
    /// Assemble the kind-specific payload of an action from its side table.
    async fn load_detail(&self, id: &ActionId, kind: ActionKind) -> Result<ActionDetail, StoreError> {
        match kind {
            ActionKind::Invite | ActionKind::Kick => {
                let row = sqlx::query_as::<_, (String, i64)>(
                    "SELECT user_id, outstanding FROM flock_member_actions WHERE action_id=?",
                )
                .bind(id.0.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
                let (user_id, outstanding) = row.ok_or(StoreError::NotFound)?;
                let target = UserId(parse_id(&user_id)?);
                Ok(match kind {
                    ActionKind::Invite => ActionDetail::Invite {
                        target,
                        outstanding: outstanding != 0,
                    },
                    _ => ActionDetail::Kick { target },
                })
            }
            _ => {
                let row = sqlx::query_as::<_, (Option<String>, String, Option<String>)>(
                    "SELECT description, pictures, post_id FROM flock_detail_actions WHERE action_id=?",
                )
                .bind(id.0.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
                let (description, pictures, post_id) = row.ok_or(StoreError::NotFound)?;
                Ok(match kind {
                    ActionKind::UpdatePicture => ActionDetail::UpdatePicture {
                        pictures: decode_pictures(&pictures)?,
                    },
                    ActionKind::UpdateDescription => ActionDetail::UpdateDescription {
                        description: description.unwrap_or_default(),
                    },
                    ActionKind::CreatePost => ActionDetail::CreatePost {
                        description,
                        pictures: decode_pictures(&pictures)?,
                    },
                    _ => ActionDetail::DeletePost {
                        post: PostId(parse_id(&post_id.ok_or_else(|| {
                            StoreError::Backend("DELETE_POST action without post_id".into())
                        })?)?),
                    },
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Users ─────────────────────────────

    async fn create_user(&self, params: &CreateUserParams) -> Result<UserId, StoreError> {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO users(id,username,email,public_key,picture,joined_at) VALUES(?,?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(&params.username)
        .bind(&params.email)
        .bind(&params.public_key)
        .bind(&params.picture)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(unique_err)?;
        Ok(UserId(id))
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id,username,email,public_key,picture,bio,joined_at FROM users WHERE id=?",
        )
        .bind(user_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        user_from_row(row.ok_or(StoreError::NotFound)?)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id,username,email,public_key,picture,bio,joined_at FROM users WHERE username=?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        user_from_row(row.ok_or(StoreError::NotFound)?)
    }

    async fn update_profile(
        &self,
        user_id: &UserId,
        params: &UpdateProfileParams,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE users SET username = COALESCE(?, username), bio = COALESCE(?, bio) WHERE id=?",
        )
        .bind(&params.username)
        .bind(&params.bio)
        .bind(user_id.0.to_string())
        .execute(&self.pool)
        .await
        .map_err(unique_err)?;
        Ok(())
    }

    // ───────────────────────────── Flocks ─────────────────────────────

    async fn create_flock(&self, params: &CreateFlockParams) -> Result<FlockId, StoreError> {
        let id = Uuid::now_v7();
        sqlx::query("INSERT INTO flocks(id,name,description,picture,created_at) VALUES(?,?,?,?,?)")
            .bind(id.to_string())
            .bind(&params.name)
            .bind(&params.description)
            .bind(&params.picture)
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(unique_err)?;
        Ok(FlockId(id))
    }

    async fn get_flock(&self, flock_id: &FlockId) -> Result<Flock, StoreError> {
        let row = sqlx::query_as::<_, FlockRow>(
            "SELECT id,name,description,picture,created_at FROM flocks WHERE id=?",
        )
        .bind(flock_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        flock_from_row(row.ok_or(StoreError::NotFound)?)
    }

    async fn get_flock_by_name(&self, name: &str) -> Result<Flock, StoreError> {
        let row = sqlx::query_as::<_, FlockRow>(
            "SELECT id,name,description,picture,created_at FROM flocks WHERE name=?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        flock_from_row(row.ok_or(StoreError::NotFound)?)
    }

    async fn set_flock_description(
        &self,
        flock_id: &FlockId,
        description: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE flocks SET description=? WHERE id=?")
            .bind(description)
            .bind(flock_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn set_flock_picture(&self, flock_id: &FlockId, url: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE flocks SET picture=? WHERE id=?")
            .bind(url)
            .bind(flock_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    // ───────────────────────────── Membership ─────────────────────────────

    async fn add_member(&self, flock_id: &FlockId, user_id: &UserId) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO flock_members(flock_id,user_id) VALUES(?,?)")
            .bind(flock_id.0.to_string())
            .bind(user_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(unique_err)?;
        Ok(())
    }

    async fn remove_member(&self, user_id: &UserId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM flock_members WHERE user_id=?")
            .bind(user_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn transfer_member(
        &self,
        flock_id: &FlockId,
        user_id: &UserId,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query("DELETE FROM flock_members WHERE user_id=?")
            .bind(user_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        sqlx::query("INSERT INTO flock_members(flock_id,user_id) VALUES(?,?)")
            .bind(flock_id.0.to_string())
            .bind(user_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(unique_err)?;
        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn flock_for_user(&self, user_id: &UserId) -> Result<Option<Flock>, StoreError> {
        let row = sqlx::query_as::<_, FlockRow>(
            "SELECT f.id,f.name,f.description,f.picture,f.created_at
             FROM flocks f
             INNER JOIN flock_members m ON m.flock_id = f.id
             WHERE m.user_id=?",
        )
        .bind(user_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(flock_from_row).transpose()
    }

    async fn count_members(&self, flock_id: &FlockId) -> Result<u32, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM flock_members WHERE flock_id=?")
                .bind(flock_id.0.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(count as u32)
    }

    async fn list_members(&self, flock_id: &FlockId) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT u.id,u.username,u.email,u.public_key,u.picture,u.bio,u.joined_at
             FROM users u
             INNER JOIN flock_members m ON m.user_id = u.id
             WHERE m.flock_id=?
             ORDER BY u.username",
        )
        .bind(flock_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(user_from_row).collect()
    }

    // ───────────────────────────── Actions ─────────────────────────────

    async fn create_action(&self, params: &CreateActionParams) -> Result<ActionId, StoreError> {
        let id = Uuid::now_v7();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            "INSERT INTO flock_actions(id,public_id,flock_id,kind,creator,open,accepted,created_at)
             VALUES(?,?,?,?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(&params.public_id)
        .bind(params.flock_id.0.to_string())
        .bind(params.payload.kind().as_str())
        .bind(params.creator.0.to_string())
        .bind(params.open)
        .bind(params.accepted)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .map_err(unique_err)?;

        match &params.payload {
            ActionPayload::Invite { target } | ActionPayload::Kick { target } => {
                sqlx::query("INSERT INTO flock_member_actions(action_id,user_id) VALUES(?,?)")
                    .bind(id.to_string())
                    .bind(target.0.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            ActionPayload::UpdatePicture => {
                sqlx::query("INSERT INTO flock_detail_actions(action_id) VALUES(?)")
                    .bind(id.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            ActionPayload::UpdateDescription { description } => {
                sqlx::query("INSERT INTO flock_detail_actions(action_id,description) VALUES(?,?)")
                    .bind(id.to_string())
                    .bind(description)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            ActionPayload::CreatePost { description } => {
                sqlx::query("INSERT INTO flock_detail_actions(action_id,description) VALUES(?,?)")
                    .bind(id.to_string())
                    .bind(description)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            ActionPayload::DeletePost { post } => {
                sqlx::query("INSERT INTO flock_detail_actions(action_id,post_id) VALUES(?,?)")
                    .bind(id.to_string())
                    .bind(post.0.to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(ActionId(id))
    }

    async fn find_open_action(
        &self,
        flock_id: &FlockId,
        public_id: &str,
    ) -> Result<Action, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, i64, i64, i64)>(
            "SELECT id,kind,creator,open,accepted,created_at FROM flock_actions
             WHERE public_id=? AND flock_id=? AND open=1",
        )
        .bind(public_id)
        .bind(flock_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        let (id, kind, creator, open, accepted, created_at) = row.ok_or(StoreError::NotFound)?;
        let kind = ActionKind::parse(&kind)
            .ok_or_else(|| StoreError::Backend(format!("unknown action kind {kind}")))?;
        let action_id = ActionId(parse_id(&id)?);
        let detail = self.load_detail(&action_id, kind).await?;
        Ok(Action {
            id: action_id,
            public_id: public_id.to_string(),
            flock_id: flock_id.clone(),
            creator: UserId(parse_id(&creator)?),
            open: open != 0,
            accepted: accepted != 0,
            created_at: ts(created_at)?,
            detail,
        })
    }

    async fn has_pending_invite(
        &self,
        flock_id: &FlockId,
        target: &UserId,
    ) -> Result<bool, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM flock_actions a
             INNER JOIN flock_member_actions ma ON ma.action_id = a.id
             WHERE a.flock_id=? AND ma.user_id=? AND a.kind='INVITE'
               AND (a.open=1 OR ma.outstanding=1)",
        )
        .bind(flock_id.0.to_string())
        .bind(target.0.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(count > 0)
    }

    async fn has_open_kick(
        &self,
        flock_id: &FlockId,
        target: &UserId,
    ) -> Result<bool, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM flock_actions a
             INNER JOIN flock_member_actions ma ON ma.action_id = a.id
             WHERE a.flock_id=? AND ma.user_id=? AND a.kind='KICK' AND a.open=1",
        )
        .bind(flock_id.0.to_string())
        .bind(target.0.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(count > 0)
    }

    async fn has_open_action_by_creator(
        &self,
        flock_id: &FlockId,
        creator: &UserId,
        kind: ActionKind,
    ) -> Result<bool, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM flock_actions WHERE flock_id=? AND creator=? AND kind=? AND open=1",
        )
        .bind(flock_id.0.to_string())
        .bind(creator.0.to_string())
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(count > 0)
    }

    async fn has_open_post_deletion(&self, post_id: &PostId) -> Result<bool, StoreError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM flock_actions a
             INNER JOIN flock_detail_actions d ON d.action_id = a.id
             WHERE a.kind='DELETE_POST' AND a.open=1 AND d.post_id=?",
        )
        .bind(post_id.0.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(count > 0)
    }

    async fn close_action(&self, action_id: &ActionId) -> Result<bool, StoreError> {
        let res = sqlx::query("UPDATE flock_actions SET open=0 WHERE id=? AND open=1")
            .bind(action_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(res.rows_affected() == 1)
    }

    async fn mark_accepted(&self, action_id: &ActionId) -> Result<(), StoreError> {
        sqlx::query("UPDATE flock_actions SET accepted=1 WHERE id=?")
            .bind(action_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn clear_outstanding(&self, action_id: &ActionId) -> Result<(), StoreError> {
        sqlx::query("UPDATE flock_member_actions SET outstanding=0 WHERE action_id=?")
            .bind(action_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn append_staged_picture(
        &self,
        action_id: &ActionId,
        url: &str,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let row: Option<(String,)> =
            sqlx::query_as("SELECT pictures FROM flock_detail_actions WHERE action_id=?")
                .bind(action_id.0.to_string())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        let (raw,) = row.ok_or(StoreError::NotFound)?;
        let mut pictures = decode_pictures(&raw)?;
        pictures.push(url.to_string());
        sqlx::query("UPDATE flock_detail_actions SET pictures=? WHERE action_id=?")
            .bind(encode_pictures(&pictures)?)
            .bind(action_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    // ───────────────────────────── Votes ─────────────────────────────

    async fn upsert_vote(
        &self,
        action_id: &ActionId,
        user_id: &UserId,
        vote: bool,
    ) -> Result<VoteUpsert, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let prev: Option<(i64,)> = sqlx::query_as(
            "SELECT vote FROM flock_member_votes WHERE action_id=? AND user_id=?",
        )
        .bind(action_id.0.to_string())
        .bind(user_id.0.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        match prev {
            Some((v,)) if (v != 0) == vote => return Ok(VoteUpsert::Unchanged),
            Some(_) => {
                sqlx::query(
                    "UPDATE flock_member_votes SET vote=? WHERE action_id=? AND user_id=?",
                )
                .bind(vote)
                .bind(action_id.0.to_string())
                .bind(user_id.0.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
            None => {
                sqlx::query("INSERT INTO flock_member_votes(action_id,user_id,vote) VALUES(?,?,?)")
                    .bind(action_id.0.to_string())
                    .bind(user_id.0.to_string())
                    .bind(vote)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StoreError::Backend(e.to_string()))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(VoteUpsert::Recorded)
    }

    async fn tally_votes(&self, action_id: &ActionId) -> Result<VoteTally, StoreError> {
        let (yes, no): (Option<i64>, Option<i64>) = sqlx::query_as(
            "SELECT SUM(CASE WHEN vote=1 THEN 1 ELSE 0 END),
                    SUM(CASE WHEN vote=0 THEN 1 ELSE 0 END)
             FROM flock_member_votes WHERE action_id=?",
        )
        .bind(action_id.0.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(VoteTally {
            yes: yes.unwrap_or(0) as u32,
            no: no.unwrap_or(0) as u32,
        })
    }

    async fn list_member_vote_rows(
        &self,
        flock_id: &FlockId,
    ) -> Result<Vec<MemberVoteRow>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String, String, String, i64, i64)>(
            "SELECT a.kind, inv.username, cre.username, a.public_id,
                    (SELECT COUNT(*) FROM flock_member_votes v WHERE v.action_id = a.id AND v.vote = 1),
                    (SELECT COUNT(*) FROM flock_member_votes v WHERE v.action_id = a.id AND v.vote = 0)
             FROM flock_actions a
             INNER JOIN flock_member_actions ma ON ma.action_id = a.id
             INNER JOIN users inv ON inv.id = ma.user_id
             INNER JOIN users cre ON cre.id = a.creator
             WHERE a.open=1 AND a.flock_id=? AND a.kind IN ('INVITE','KICK')
             ORDER BY inv.username",
        )
        .bind(flock_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for (kind, involving, creator, public_id, yes, no) in rows {
            let kind = ActionKind::parse(&kind)
                .ok_or_else(|| StoreError::Backend(format!("unknown action kind {kind}")))?;
            out.push(MemberVoteRow {
                kind,
                involving,
                creator,
                yes: yes as u32,
                no: no as u32,
                public_id,
            });
        }
        Ok(out)
    }

    async fn list_detail_vote_rows(
        &self,
        flock_id: &FlockId,
    ) -> Result<Vec<DetailVoteRow>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String, String, Option<String>, String, i64, i64)>(
            "SELECT a.kind, u.username, a.public_id, d.description, d.pictures,
                    (SELECT COUNT(*) FROM flock_member_votes v WHERE v.action_id = a.id AND v.vote = 1),
                    (SELECT COUNT(*) FROM flock_member_votes v WHERE v.action_id = a.id AND v.vote = 0)
             FROM flock_actions a
             INNER JOIN flock_detail_actions d ON d.action_id = a.id
             INNER JOIN users u ON u.id = a.creator
             WHERE a.open=1 AND a.flock_id=?
               AND a.kind IN ('UPDATE_PICTURE','UPDATE_DESCRIPTION','CREATE_POST','DELETE_POST')
             ORDER BY a.created_at DESC",
        )
        .bind(flock_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for (kind, creator, public_id, description, pictures, yes, no) in rows {
            let kind = ActionKind::parse(&kind)
                .ok_or_else(|| StoreError::Backend(format!("unknown action kind {kind}")))?;
            out.push(DetailVoteRow {
                kind,
                creator,
                yes: yes as u32,
                no: no as u32,
                public_id,
                description,
                pictures: decode_pictures(&pictures)?,
            });
        }
        Ok(out)
    }

    // ───────────────────────────── Invites (target side) ─────────────────────────────

    async fn list_outstanding_invites(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<OutstandingInvite>, StoreError> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT f.name FROM flock_actions a
             INNER JOIN flock_member_actions ma ON ma.action_id = a.id
             INNER JOIN flocks f ON f.id = a.flock_id
             WHERE a.kind='INVITE' AND a.accepted=1 AND ma.outstanding=1 AND ma.user_id=?",
        )
        .bind(user_id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(rows
            .into_iter()
            .map(|(flock_name,)| OutstandingInvite { flock_name })
            .collect())
    }

    async fn find_outstanding_invite(
        &self,
        user_id: &UserId,
        flock_name: &str,
    ) -> Result<(ActionId, FlockId), StoreError> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT a.id, f.id FROM flock_actions a
             INNER JOIN flock_member_actions ma ON ma.action_id = a.id
             INNER JOIN flocks f ON f.id = a.flock_id
             WHERE a.kind='INVITE' AND a.accepted=1 AND ma.outstanding=1
               AND ma.user_id=? AND f.name=?",
        )
        .bind(user_id.0.to_string())
        .bind(flock_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        let (action_id, flock_id) = row.ok_or(StoreError::NotFound)?;
        Ok((ActionId(parse_id(&action_id)?), FlockId(parse_id(&flock_id)?)))
    }

    async fn resolve_outstanding_invite(
        &self,
        action_id: &ActionId,
        joined: bool,
    ) -> Result<(), StoreError> {
        let sql = if joined {
            "UPDATE flock_member_actions SET outstanding=0, accepted=1 WHERE action_id=?"
        } else {
            "UPDATE flock_member_actions SET outstanding=0 WHERE action_id=?"
        };
        sqlx::query(sql)
            .bind(action_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    // ───────────────────────────── Posts ─────────────────────────────

    async fn create_post(&self, params: &CreatePostParams) -> Result<PostId, StoreError> {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO posts(id,public_id,flock_id,description,pictures,created_at) VALUES(?,?,?,?,?,?)",
        )
        .bind(id.to_string())
        .bind(&params.public_id)
        .bind(params.flock_id.0.to_string())
        .bind(&params.description)
        .bind(encode_pictures(&params.pictures)?)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(unique_err)?;
        Ok(PostId(id))
    }

    async fn get_post_by_public_id(
        &self,
        flock_id: &FlockId,
        public_id: &str,
    ) -> Result<Post, StoreError> {
        let row = sqlx::query_as::<_, PostRow>(
            "SELECT id,public_id,flock_id,description,pictures,created_at FROM posts
             WHERE flock_id=? AND public_id=?",
        )
        .bind(flock_id.0.to_string())
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        post_from_row(row.ok_or(StoreError::NotFound)?)
    }

    async fn get_post(&self, post_id: &PostId) -> Result<Post, StoreError> {
        let row = sqlx::query_as::<_, PostRow>(
            "SELECT id,public_id,flock_id,description,pictures,created_at FROM posts WHERE id=?",
        )
        .bind(post_id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        post_from_row(row.ok_or(StoreError::NotFound)?)
    }

    async fn delete_post(&self, post_id: &PostId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM posts WHERE id=?")
            .bind(post_id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn append_post_picture(&self, post_id: &PostId, url: &str) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let row: Option<(String,)> = sqlx::query_as("SELECT pictures FROM posts WHERE id=?")
            .bind(post_id.0.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let (raw,) = row.ok_or(StoreError::NotFound)?;
        let mut pictures = decode_pictures(&raw)?;
        pictures.push(url.to_string());
        sqlx::query("UPDATE posts SET pictures=? WHERE id=?")
            .bind(encode_pictures(&pictures)?)
            .bind(post_id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn list_posts(&self, flock_name: &str) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query_as::<_, PostRow>(
            "SELECT p.id,p.public_id,p.flock_id,p.description,p.pictures,p.created_at
             FROM posts p
             INNER JOIN flocks f ON f.id = p.flock_id
             WHERE f.name=?
             ORDER BY p.created_at DESC",
        )
        .bind(flock_name)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter().map(post_from_row).collect()
    }
}
