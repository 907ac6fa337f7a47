use super::post_controller::{
    create_blog_post, delete_blog_post, get_all_blog_post_slugs, get_blog_post_by_slug,
    get_blog_posts, update_blog_post,
};
use actix_web::web;

pub fn post_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/posts")
            .route("", web::get().to(get_blog_posts))
            .route("", web::post().to(create_blog_post))
            .route("/slugs", web::get().to(get_all_blog_post_slugs))
            .route("/post/{slug}", web::get().to(get_blog_post_by_slug))
            .route("/{blog_post_id}", web::patch().to(update_blog_post))
            .route("/{blog_post_id}", web::delete().to(delete_blog_post)),
    );
}
