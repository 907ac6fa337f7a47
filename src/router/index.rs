use crate::comment::index::comment_routes;
use crate::post::post_index::post_routes;
use crate::user::index::user_routes;
use actix_web::web;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(user_routes);
    // Comment routes go first: /posts/{id}/comments must win over the
    // /posts scope below.
    cfg.configure(comment_routes);
    cfg.configure(post_routes);
}
