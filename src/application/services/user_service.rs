//! User listing and profile updates.

use std::sync::Arc;

use serde_json::json;

use crate::domain::entities::{User, UserPatch};
use crate::domain::repositories::UserRepository;
use crate::error::AppError;

pub struct UserService<U: UserRepository> {
    repository: Arc<U>,
}

impl<U: UserRepository> UserService<U> {
    pub fn new(repository: Arc<U>) -> Self {
        Self { repository }
    }

    /// Admins see every account, everyone else only their own.
    pub async fn list(
        &self,
        viewer: &User,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<User>, i64), AppError> {
        if !viewer.is_admin {
            let own = if offset == 0 { vec![viewer.clone()] } else { vec![] };
            return Ok((own, 1));
        }

        tokio::try_join!(
            self.repository.list(offset, limit),
            self.repository.count()
        )
    }

    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown ids and for other users'
    /// ids when the viewer is not an admin.
    pub async fn get(&self, viewer: &User, id: i64) -> Result<User, AppError> {
        if !viewer.can_access(id) {
            return Err(AppError::not_found("User not found", json!({ "id": id })));
        }

        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found", json!({ "id": id })))
    }

    /// Updates the caller's own name and avatar.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] when `id` is not the caller's.
    pub async fn update_profile(
        &self,
        viewer: &User,
        id: i64,
        name: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<User, AppError> {
        if viewer.id != id {
            return Err(AppError::forbidden(
                "You can only update your own profile",
                json!({ "id": id }),
            ));
        }

        self.repository
            .update(
                id,
                UserPatch {
                    name,
                    avatar_url,
                    google_id: None,
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::user::test_user;
    use crate::domain::repositories::MockUserRepository;

    #[tokio::test]
    async fn test_non_admin_lists_only_self() {
        let mut repo = MockUserRepository::new();
        repo.expect_list().times(0);

        let service = UserService::new(Arc::new(repo));
        let (users, count) = service.list(&test_user(3), 0, 20).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(users[0].id, 3);
    }

    #[tokio::test]
    async fn test_admin_lists_everyone() {
        let mut repo = MockUserRepository::new();
        repo.expect_list()
            .times(1)
            .returning(|_, _| Ok(vec![test_user(1), test_user(2)]));
        repo.expect_count().returning(|| Ok(2));

        let mut admin = test_user(1);
        admin.is_admin = true;

        let service = UserService::new(Arc::new(repo));
        let (users, count) = service.list(&admin, 0, 20).await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_get_other_user_is_hidden() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id().times(0);

        let service = UserService::new(Arc::new(repo));
        assert!(matches!(
            service.get(&test_user(1), 2).await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_other_profile_forbidden() {
        let mut repo = MockUserRepository::new();
        repo.expect_update().times(0);

        let service = UserService::new(Arc::new(repo));
        let result = service
            .update_profile(&test_user(1), 2, Some("x".to_string()), None)
            .await;
        assert!(matches!(result, Err(AppError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_update_own_profile() {
        let mut repo = MockUserRepository::new();
        repo.expect_update()
            .withf(|id, patch| *id == 1 && patch.name.as_deref() == Some("New") && patch.google_id.is_none())
            .times(1)
            .returning(|id, _| Ok(test_user(id)));

        let service = UserService::new(Arc::new(repo));
        service
            .update_profile(&test_user(1), 1, Some("New".to_string()), None)
            .await
            .unwrap();
    }
}
