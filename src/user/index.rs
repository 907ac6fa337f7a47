use super::controller::{
    get_authenticated_user, get_user_by_username, login_user, logout_user,
    request_email_verification_code, request_password_reset_code, reset_password, sign_up,
    update_authenticated_user,
};
use actix_web::web;

pub fn user_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("/signup", web::post().to(sign_up))
            .route(
                "/verification-code",
                web::post().to(request_email_verification_code),
            )
            .route(
                "/reset-password-code",
                web::post().to(request_password_reset_code),
            )
            .route("/reset-password", web::post().to(reset_password))
            .route("/login", web::post().to(login_user))
            .route("/logout", web::post().to(logout_user))
            .route("/me", web::get().to(get_authenticated_user))
            .route("/me", web::patch().to(update_authenticated_user))
            .route("/profile/{username}", web::get().to(get_user_by_username)),
    );
}
