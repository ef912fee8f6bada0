//! Category use-case service.
//!
//! Owner-scoped listing lives on the membership service
//! (`categories_owned_by`), next to the other category projections.

use crate::model::category::{Category, CategoryId, NewCategory};
use crate::model::UserId;
use crate::repo::category_repo::CategoryRepository;
use crate::repo::{EntityRef, RepoError, RepoResult};
use log::info;

/// Category service facade over repository implementations.
pub struct CategoryService<R: CategoryRepository> {
    repo: R,
}

impl<R: CategoryRepository> CategoryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a category with a trimmed name.
    pub fn create_category(
        &self,
        user_id: impl Into<UserId>,
        name: &str,
    ) -> RepoResult<Category> {
        let id = self.repo.create_category(&NewCategory::new(user_id, name))?;
        info!("event=category_create module=category status=ok category_id={id}");
        self.get_category(id)
    }

    pub fn rename_category(&self, id: CategoryId, name: &str) -> RepoResult<Category> {
        self.repo.rename_category(id, name)?;
        self.get_category(id)
    }

    /// Gets one category, failing with `NotFound` when absent.
    pub fn get_category(&self, id: CategoryId) -> RepoResult<Category> {
        self.repo
            .get_category(id)?
            .ok_or(RepoError::NotFound(EntityRef::Category(id)))
    }

    /// Deletes a category and, by cascade, all its memberships.
    pub fn delete_category(&self, id: CategoryId) -> RepoResult<()> {
        self.repo.delete_category(id)?;
        info!("event=category_delete module=category status=ok category_id={id}");
        Ok(())
    }
}
