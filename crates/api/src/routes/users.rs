//! Route definitions for the `/users` resource.

use axum::routing::{delete, get, patch, post};
use axum::Router;
use natours_db::models::User;

use crate::factory;
use crate::handlers::{auth, users};
use crate::middleware::rbac::RequireAdmin;
use crate::state::AppState;

/// Routes mounted at `/users`.
///
/// ```text
/// POST   /signup              create account, returns token (public)
/// POST   /login               returns token (public)
/// GET    /logout              clear the session cookie
/// PATCH  /updateMyPassword    change password, returns new token (auth)
/// GET    /me                  own profile (auth)
/// PATCH  /updateMe            change name / email (auth)
/// DELETE /deleteMe            deactivate own account (auth)
///
/// GET    /                    list (admin)
/// POST   /                    not available, use /signup
/// GET    /{id}                get (admin)
/// PATCH  /{id}                update (admin)
/// DELETE /{id}                delete (admin)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/updateMyPassword", patch(auth::update_my_password))
        .route("/me", get(users::get_me))
        .route("/updateMe", patch(users::update_me))
        .route("/deleteMe", delete(users::delete_me))
        .route(
            "/",
            get(factory::get_all::<User, RequireAdmin>).post(users::create_user),
        )
        .route(
            "/{id}",
            get(factory::get_one::<User, RequireAdmin>)
                .patch(factory::update_one::<User, RequireAdmin>)
                .delete(factory::delete_one::<User, RequireAdmin>),
        )
}
