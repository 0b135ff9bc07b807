//! Property-based test generators using proptest.
//!
//! Provides strategies for generating entity graphs that satisfy the
//! fixture schemas.

use crate::harness::Harness;
use proptest::prelude::*;
use unitflow_core::{Entity, EntityId};

/// Strategy for generating entity IDs.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    prop::array::uniform16(any::<u8>()).prop_map(EntityId::from_bytes)
}

/// Strategy for generating short display names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9]{0,11}").expect("Invalid regex")
}

/// A blog graph: users, and posts each pointing at one of them.
#[derive(Debug, Clone)]
pub struct BlogGraph {
    /// User names.
    pub users: Vec<String>,
    /// Post titles with the index of their author in `users`.
    pub posts: Vec<(String, usize)>,
    /// Whether users also list their posts.
    pub with_collections: bool,
}

/// Ids of a loaded [`BlogGraph`].
#[derive(Debug, Clone)]
pub struct LoadedGraph {
    /// User ids, in graph order.
    pub users: Vec<EntityId>,
    /// Post ids with the id of their author.
    pub posts: Vec<(EntityId, EntityId)>,
}

impl BlogGraph {
    /// Adds the graph to the harness heap as new entities.
    pub fn load(&self, harness: &mut Harness) -> LoadedGraph {
        let users: Vec<EntityId> = self
            .users
            .iter()
            .map(|name| harness.insert(Entity::new("user").with("name", name.as_str())))
            .collect();

        let mut posts = Vec::with_capacity(self.posts.len());
        for (title, author) in &self.posts {
            let author = users[*author];
            let post = harness.insert(
                Entity::new("post")
                    .with("title", title.as_str())
                    .with_one("author", Some(author)),
            );
            if self.with_collections {
                harness.entity_mut(author).push_related("posts", post);
            }
            posts.push((post, author));
        }

        LoadedGraph { users, posts }
    }
}

/// Strategy for generating blog graphs with 1..=`max_users` users and up
/// to `max_posts` posts.
pub fn blog_graph_strategy(max_users: usize, max_posts: usize) -> impl Strategy<Value = BlogGraph> {
    prop::collection::vec(name_strategy(), 1..=max_users.max(1)).prop_flat_map(move |users| {
        let count = users.len();
        (
            Just(users),
            prop::collection::vec((name_strategy(), 0..count), 0..=max_posts),
            any::<bool>(),
        )
            .prop_map(|(users, posts, with_collections)| BlogGraph {
                users,
                posts,
                with_collections,
            })
    })
}
