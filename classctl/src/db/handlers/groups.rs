//! Database repository for student groups.

use crate::db::{
    errors::Result,
    models::groups::{GroupCreateDBRequest, GroupDBResponse},
};
use crate::types::{GroupId, UserId, abbrev_uuid};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct Groups<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Groups<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    pub async fn create(&mut self, request: &GroupCreateDBRequest) -> Result<GroupDBResponse> {
        let group = sqlx::query_as::<_, GroupDBResponse>("INSERT INTO groups (id, name, teacher_id) VALUES ($1, $2, $3) RETURNING id, name, teacher_id, created_at")
            .bind(Uuid::new_v4())
            .bind(&request.name)
            .bind(request.teacher_id)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(group)
    }

    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: GroupId) -> Result<Option<GroupDBResponse>> {
        let group = sqlx::query_as::<_, GroupDBResponse>("SELECT id, name, teacher_id, created_at FROM groups WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(group)
    }

    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&group_id), student_id = %abbrev_uuid(&student_id)), err)]
    pub async fn add_member(&mut self, group_id: GroupId, student_id: UserId) -> Result<()> {
        sqlx::query("INSERT INTO group_members (group_id, student_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(group_id)
            .bind(student_id)
            .execute(&mut *self.db)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(group_id = %abbrev_uuid(&group_id)), err)]
    pub async fn member_ids(&mut self, group_id: GroupId) -> Result<Vec<UserId>> {
        let ids: Vec<UserId> = sqlx::query_scalar("SELECT student_id FROM group_members WHERE group_id = $1 ORDER BY joined_at, student_id")
            .bind(group_id)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(ids)
    }
}
