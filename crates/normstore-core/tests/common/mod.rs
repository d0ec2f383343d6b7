use normstore_core::{Database, DatabaseConfig, Item, ModelSchema, Relation};
use serde_json::{json, Value};

/// Every model of the blog fixture
///
/// - `users` own `posts`, one `profile`, `roles` through `role_user` and
///   polymorphic `images`
/// - `posts` belong to an `author` and own `comments` and `images`
/// - `images` point back at either owner through `imageable`
#[allow(dead_code)]
pub fn blog_models() -> Vec<ModelSchema> {
    vec![
        ModelSchema::new("users")
            .increment("id")
            .attr("name", "")
            .attr("age", 0)
            .relation("posts", Relation::has_many("posts", "user_id"))
            .relation("profile", Relation::has_one("profiles", "user_id"))
            .relation(
                "roles",
                Relation::belongs_to_many("roles", "role_user", "user_id", "role_id"),
            )
            .relation(
                "images",
                Relation::morph_many("images", "imageable_id", "imageable_type"),
            ),
        ModelSchema::new("posts")
            .increment("id")
            .attr("user_id", Value::Null)
            .attr("title", "")
            .relation("author", Relation::belongs_to("users", "user_id"))
            .relation("comments", Relation::has_many("comments", "post_id"))
            .relation(
                "images",
                Relation::morph_many("images", "imageable_id", "imageable_type"),
            ),
        ModelSchema::new("comments")
            .increment("id")
            .attr("post_id", Value::Null)
            .attr("body", ""),
        ModelSchema::new("profiles")
            .increment("id")
            .attr("user_id", Value::Null)
            .attr("bio", ""),
        ModelSchema::new("roles").attr("id", Value::Null).attr("name", ""),
        ModelSchema::new("role_user")
            .attr("role_id", Value::Null)
            .attr("user_id", Value::Null)
            .composite_key(["role_id", "user_id"]),
        ModelSchema::new("images")
            .increment("id")
            .attr("url", "")
            .attr("imageable_id", Value::Null)
            .attr("imageable_type", Value::Null)
            .relation(
                "imageable",
                Relation::morph_to("imageable_id", "imageable_type"),
            ),
    ]
}

/// Empty database with the blog models registered
#[allow(dead_code)]
pub fn blog_db() -> Database {
    Database::from_models(DatabaseConfig::default(), blog_models()).unwrap()
}

/// Empty database returning plain records
#[allow(dead_code)]
pub fn plain_blog_db() -> Database {
    let config = DatabaseConfig {
        wrap: false,
        ..DatabaseConfig::default()
    };
    Database::from_models(config, blog_models()).unwrap()
}

/// Blog database populated with a small nested graph
///
/// - user 1 "Ada": posts 1 and 2 (post 1 has two comments), a profile,
///   roles 1 and 2, one image
/// - user 2 "Bob": post 3, role 1
/// - user 3 "Cy": nothing related
#[allow(dead_code)]
pub fn seeded_blog_db() -> Database {
    let db = blog_db();
    db.query("users")
        .unwrap()
        .insert(&json!([
            {
                "id": 1,
                "name": "Ada",
                "age": 36,
                "posts": [
                    {"id": 1, "title": "Engines", "comments": [{"body": "first"}, {"body": "second"}]},
                    {"id": 2, "title": "Notes"}
                ],
                "profile": {"bio": "mathematician"},
                "roles": [{"id": 1, "name": "admin"}, {"id": 2, "name": "editor"}],
                "images": [{"url": "ada.png"}]
            },
            {
                "id": 2,
                "name": "Bob",
                "age": 25,
                "posts": [{"id": 3, "title": "Hello"}],
                "roles": [{"id": 1, "name": "admin"}]
            },
            {"id": 3, "name": "Cy", "age": 19}
        ]))
        .unwrap();
    db
}

/// Values of `field` across items, in result order
#[allow(dead_code)]
pub fn values_of(items: &[Item], field: &str) -> Vec<Value> {
    items
        .iter()
        .map(|item| item.get(field).cloned().unwrap_or(Value::Null))
        .collect()
}

/// Identity strings of items, in result order
#[allow(dead_code)]
pub fn ids_of(items: &[Item]) -> Vec<String> {
    items
        .iter()
        .filter_map(Item::id)
        .map(|id| id.as_str().to_string())
        .collect()
}
