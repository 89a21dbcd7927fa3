//! User account service.

use common::{Role, User, UserId};
use store::Store;

use crate::auth::{Action, Caller, authorize};
use crate::error::DomainError;

const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 150;

/// Service for user accounts.
///
/// Credentials arrive already hashed; this service never sees a plain password.
#[derive(Clone)]
pub struct AccountService<S: Store> {
    store: S,
}

impl<S: Store> AccountService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Registers a new account with the `USER` role.
    ///
    /// Emails are unique regardless of case.
    #[tracing::instrument(skip(self, name, email, password_hash))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, DomainError> {
        let name = name.trim();
        let email = email.trim();

        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::Validation(format!(
                "name must be between 1 and {MAX_NAME_LEN} characters"
            )));
        }
        if email.chars().count() > MAX_EMAIL_LEN || !email.contains('@') {
            return Err(DomainError::Validation(format!(
                "email must be a valid address of at most {MAX_EMAIL_LEN} characters"
            )));
        }
        if password_hash.is_empty() {
            return Err(DomainError::Validation(
                "password hash is required".to_string(),
            ));
        }

        if self.store.get_user_by_email(email).await?.is_some() {
            return Err(DomainError::Conflict(format!(
                "Email already exists: {email}"
            )));
        }

        let user = User::new(
            name.to_string(),
            email.to_string(),
            password_hash.to_string(),
        );
        self.store.insert_user(&user).await?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Reads an account. Users may only read their own.
    pub async fn get_user(&self, caller: &Caller, id: UserId) -> Result<User, DomainError> {
        authorize(caller, Action::ViewAccount, Some(id))?;
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id))
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<User, DomainError> {
        self.store
            .get_user_by_email(email.trim())
            .await?
            .ok_or_else(|| DomainError::not_found("User", email))
    }

    pub async fn list_users(&self, caller: &Caller) -> Result<Vec<User>, DomainError> {
        authorize(caller, Action::ManageAccounts, None)?;
        Ok(self.store.list_users().await?)
    }

    #[tracing::instrument(skip(self, caller))]
    pub async fn promote_to_admin(&self, caller: &Caller, id: UserId) -> Result<User, DomainError> {
        authorize(caller, Action::ManageAccounts, None)?;
        let user = self
            .store
            .set_user_role(id, Role::Admin)
            .await?
            .ok_or_else(|| DomainError::not_found("User", id))?;

        tracing::info!(user_id = %user.id, promoted_by = %caller.user_id, "user promoted to admin");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use store::InMemoryStore;

    use super::*;

    fn service() -> AccountService<InMemoryStore> {
        AccountService::new(InMemoryStore::new())
    }

    /// Collects the name and declared fields of every span opened.
    #[derive(Clone, Default)]
    struct SpanFields(std::sync::Arc<std::sync::Mutex<Vec<(String, Vec<String>)>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for SpanFields {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let fields = attrs.fields().iter().map(|f| f.name().to_string()).collect();
            self.0
                .lock()
                .unwrap()
                .push((attrs.metadata().name().to_string(), fields));
        }
    }

    #[tokio::test]
    async fn register_span_keeps_email_out() {
        use tracing_subscriber::layer::SubscriberExt;

        let spans = SpanFields::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(spans.clone()));

        service()
            .register("Ada", "ada@example.com", "hash")
            .await
            .unwrap();

        let spans = spans.0.lock().unwrap();
        let (_, fields) = spans
            .iter()
            .find(|(name, _)| name == "register")
            .expect("register span");
        assert!(!fields.iter().any(|f| f == "email"));
    }

    #[tokio::test]
    async fn register_assigns_user_role() {
        let service = service();
        let user = service
            .register("Ada", "ada@example.com", "$argon2$hash")
            .await
            .unwrap();
        assert_eq!(user.role, Role::User);

        let found = service.get_user_by_email("ADA@example.com").await.unwrap();
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let service = service();
        service
            .register("Ada", "ada@example.com", "hash")
            .await
            .unwrap();

        let result = service.register("Other", "Ada@Example.com", "hash").await;
        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn register_validates_fields() {
        let service = service();
        assert!(matches!(
            service.register("", "a@b.c", "hash").await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            service.register("Ada", "not-an-email", "hash").await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            service.register("Ada", "a@b.c", "").await,
            Err(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn users_read_only_their_own_account() {
        let service = service();
        let ada = service.register("Ada", "ada@example.com", "hash").await.unwrap();
        let bob = service.register("Bob", "bob@example.com", "hash").await.unwrap();

        let me = Caller::user(ada.id);
        assert_eq!(service.get_user(&me, ada.id).await.unwrap().id, ada.id);
        assert!(matches!(
            service.get_user(&me, bob.id).await,
            Err(DomainError::Unauthorized(_))
        ));
        assert!(service.list_users(&me).await.is_err());
    }

    #[tokio::test]
    async fn admin_promotes_user() {
        let service = service();
        let ada = service.register("Ada", "ada@example.com", "hash").await.unwrap();
        let admin = Caller::admin(UserId::new());

        let promoted = service.promote_to_admin(&admin, ada.id).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);
        assert_eq!(service.list_users(&admin).await.unwrap().len(), 1);

        let missing = service.promote_to_admin(&admin, UserId::new()).await;
        assert!(matches!(missing, Err(DomainError::NotFound { .. })));
    }
}
