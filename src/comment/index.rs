use super::controller::{
    create_comment, delete_comment, get_comment_replies, get_comments_for_blog_post,
    update_comment,
};
use actix_web::web;

pub fn comment_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/posts/{blog_post_id}/comments")
            .route(web::get().to(get_comments_for_blog_post))
            .route(web::post().to(create_comment)),
    )
    .service(
        web::resource("/comments/{comment_id}/replies")
            .route(web::get().to(get_comment_replies)),
    )
    .service(
        web::resource("/comments/{comment_id}")
            .route(web::patch().to(update_comment))
            .route(web::delete().to(delete_comment)),
    );
}
