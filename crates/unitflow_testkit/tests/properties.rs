//! Property tests over generated entity graphs.

use proptest::prelude::*;
use unitflow_storage::StatementKind;
use unitflow_testkit::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_entity_is_inserted_once_after_its_master(graph in blog_graph_strategy(4, 10)) {
        let mut h = Harness::new(blog());
        let loaded = graph.load(&mut h);

        let mut ids: Vec<_> = loaded.users.clone();
        ids.extend(loaded.posts.iter().map(|(post, _)| *post));
        let result = h.persist(&ids);
        prop_assert!(result.is_success(), "{:?}", result.error());

        prop_assert_eq!(h.count(StatementKind::Insert, "users"), graph.users.len());
        prop_assert_eq!(h.count(StatementKind::Insert, "posts"), graph.posts.len());
        prop_assert_eq!(h.data_statements().len(), graph.users.len() + graph.posts.len());

        for (post, author) in &loaded.posts {
            let author_key = h.field(*author, "id");
            prop_assert!(!author_key.is_null());
            prop_assert_eq!(h.field(*post, "user_id"), author_key.clone());

            let author_at = h.position(StatementKind::Insert, "users", "id", &author_key);
            let post_at = h.position(StatementKind::Insert, "posts", "id", &h.field(*post, "id"));
            prop_assert!(author_at < post_at, "post inserted before its author");
        }
    }

    #[test]
    fn second_run_is_idempotent(graph in blog_graph_strategy(3, 6)) {
        let mut h = Harness::new(blog());
        let loaded = graph.load(&mut h);
        let result = h.persist(&loaded.users);
        prop_assert!(result.is_success(), "{:?}", result.error());
        h.clear_statements();

        let ids: Vec<_> = loaded.posts.iter().map(|(post, _)| *post).collect();
        let result = h.persist(&ids);
        prop_assert!(result.is_success(), "{:?}", result.error());
        let posts_written = if graph.with_collections { 0 } else { graph.posts.len() };
        prop_assert_eq!(h.data_statements().len(), posts_written);

        h.clear_statements();
        let result = h.persist(&loaded.users);
        prop_assert!(result.is_success(), "{:?}", result.error());
        prop_assert!(h.statements().is_empty());
    }

    #[test]
    fn cascade_delete_removes_everything(graph in blog_graph_strategy(3, 6)) {
        let graph = BlogGraph { with_collections: true, ..graph };
        let mut h = Harness::new(blog());
        let loaded = graph.load(&mut h);
        prop_assert!(h.persist(&loaded.users).is_success());
        h.clear_statements();

        let result = h.delete(&loaded.users, true);
        prop_assert!(result.is_success(), "{:?}", result.error());

        let db = h.schema.database();
        prop_assert_eq!(db.count("users"), 0);
        prop_assert_eq!(db.count("posts"), 0);

        // Every post goes before the user it belonged to.
        for (post, author) in &loaded.posts {
            let post_at = h.position(StatementKind::Delete, "posts", "id", &h.field(*post, "id"));
            let author_at = h.position(StatementKind::Delete, "users", "id", &h.field(*author, "id"));
            prop_assert!(post_at.is_some());
            prop_assert!(post_at < author_at);
        }
    }
}
